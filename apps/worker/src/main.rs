//! Shopfloor background worker expiring time-boxed grants.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use shopfloor_application::{
    AccessCache, AccessRepositories, AuditLog, AuditRetryPolicy, AuditSink, GrantService,
    PermissionEngine,
};
use shopfloor_core::{AppError, AppResult};
use shopfloor_infrastructure::{PostgresAccessRepository, PostgresAuditStore};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    worker_id: String,
    sweep_interval_seconds: u64,
    audit_retry: AuditRetryPolicy,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let (grant_service, audit_sink) = build_grant_service(pool, config.audit_retry);

    info!(
        worker_id = %config.worker_id,
        sweep_interval_seconds = config.sweep_interval_seconds,
        "shopfloor-worker started"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.sweep_interval_seconds));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_sweep(&grant_service, config.worker_id.as_str()).await;
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(worker_id = %config.worker_id, %error, "failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    if let Err(error) = audit_sink.flush().await {
        warn!(worker_id = %config.worker_id, %error, "audit sink did not drain before shutdown");
    }
    info!(worker_id = %config.worker_id, "shopfloor-worker stopped");

    Ok(())
}

/// Runs one expiry sweep, returning how many grants it deactivated.
async fn run_sweep(grant_service: &GrantService, worker_id: &str) -> usize {
    match grant_service.sweep_expired_grants().await {
        Ok(0) => 0,
        Ok(swept) => {
            info!(worker_id, swept, "expired grants swept");
            swept
        }
        Err(sweep_error) if sweep_error.is_transient() => {
            warn!(worker_id, error = %sweep_error, "grant sweep skipped, store unavailable");
            0
        }
        Err(sweep_error) => {
            error!(worker_id, error = %sweep_error, "grant sweep failed");
            0
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_grant_service(pool: PgPool, audit_retry: AuditRetryPolicy) -> (GrantService, AuditSink) {
    let repositories =
        AccessRepositories::from_shared(Arc::new(PostgresAccessRepository::new(pool.clone())));
    let audit_sink = AuditSink::spawn(AuditLog::new(
        Arc::new(PostgresAuditStore::new(pool)),
        audit_retry,
    ));
    let cache = Arc::new(AccessCache::disabled());
    let engine = PermissionEngine::new(repositories.clone(), cache.clone(), audit_sink.clone());

    (
        GrantService::new(repositories, cache, engine, audit_sink.clone()),
        audit_sink,
    )
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let worker_id = env::var("WORKER_ID")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));
        let sweep_interval_seconds = parse_env_u64("WORKER_SWEEP_INTERVAL_SECONDS", 60)?;

        if sweep_interval_seconds == 0 {
            return Err(AppError::Validation(
                "WORKER_SWEEP_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        let defaults = AuditRetryPolicy::default();
        let audit_retry = AuditRetryPolicy {
            max_retries: parse_env_u32("AUDIT_CRITICAL_MAX_RETRIES", defaults.max_retries)?,
            base_delay: Duration::from_millis(parse_env_u64(
                "AUDIT_CRITICAL_BASE_DELAY_MS",
                u64::try_from(defaults.base_delay.as_millis()).unwrap_or(u64::MAX),
            )?),
        };

        Ok(Self {
            database_url,
            worker_id,
            sweep_interval_seconds,
            audit_retry,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
