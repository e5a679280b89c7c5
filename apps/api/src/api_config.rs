
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use ipnet::IpNet;
use shopfloor_application::AuditRetryPolicy;
use shopfloor_core::AppError;
use tracing_subscriber::EnvFilter;

/// Gateways trusted when `TRUSTED_PROXY_CIDRS` is unset: loopback only.
pub const DEFAULT_TRUSTED_PROXY_CIDRS: &str = "127.0.0.0/8,::1/128";

/// Backing store for access-control and audit data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStoreKind {
    Postgres,
    Memory,
}

impl FromStr for AccessStoreKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::Validation(format!(
                "ACCESS_STORE must be either 'postgres' or 'memory', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub access_store: AccessStoreKind,
    pub database_url: Option<String>,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub audit_retry: AuditRetryPolicy,
    pub access_check_deadline: Option<Duration>,
    pub access_cache_enabled: bool,
    pub trusted_proxies: Vec<IpNet>,
    pub bootstrap_admin_subject: Option<String>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let access_store = env::var("ACCESS_STORE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .parse::<AccessStoreKind>()?;
        let database_url = match access_store {
            AccessStoreKind::Postgres => Some(required_non_empty_env("DATABASE_URL")?),
            AccessStoreKind::Memory => optional_env("DATABASE_URL"),
        };
        if migrate_only && database_url.is_none() {
            return Err(AppError::Validation(
                "DATABASE_URL is required to run migrations".to_owned(),
            ));
        }

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let defaults = AuditRetryPolicy::default();
        let audit_retry = AuditRetryPolicy {
            max_retries: parsed_env("AUDIT_CRITICAL_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            base_delay: parsed_env::<u64>("AUDIT_CRITICAL_BASE_DELAY_MS")?
                .map_or(defaults.base_delay, Duration::from_millis),
        };

        let access_check_deadline = parsed_env::<u64>("ACCESS_CHECK_DEADLINE_MS")?
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis);
        let access_cache_enabled = optional_env("ACCESS_CACHE_ENABLED")
            .map(|value| parse_flag("ACCESS_CACHE_ENABLED", value.as_str()))
            .transpose()?
            .unwrap_or(true);

        let trusted_proxies = parse_trusted_proxies(
            optional_env("TRUSTED_PROXY_CIDRS")
                .as_deref()
                .unwrap_or(DEFAULT_TRUSTED_PROXY_CIDRS),
        )?;
        let bootstrap_admin_subject = optional_env("BOOTSTRAP_ADMIN_SUBJECT");

        Ok(Self {
            migrate_only,
            access_store,
            database_url,
            frontend_url,
            api_host,
            api_port,
            audit_retry,
            access_check_deadline,
            access_cache_enabled,
            trusted_proxies,
            bootstrap_admin_subject,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Parses a comma-separated list of CIDR blocks or bare addresses.
pub fn parse_trusted_proxies(value: &str) -> Result<Vec<IpNet>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if let Ok(network) = entry.parse::<IpNet>() {
                return Ok(network);
            }

            let address = entry.parse::<IpAddr>().map_err(|error| {
                AppError::Validation(format!("invalid TRUSTED_PROXY_CIDRS entry '{entry}': {error}"))
            })?;
            let prefix = if address.is_ipv4() { 32 } else { 128 };
            IpNet::new(address, prefix).map_err(|error| {
                AppError::Validation(format!("invalid TRUSTED_PROXY_CIDRS entry '{entry}': {error}"))
            })
        })
        .collect()
}

fn parse_flag(name: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(AppError::Validation(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}

fn parsed_env<T>(name: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
        })
        .transpose()
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
