
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use ipnet::IpNet;
use shopfloor_core::{AppError, RequestOrigin, UserIdentity};

use crate::error::ApiResult;
use crate::state::AppState;

pub const SUBJECT_HEADER: &str = "x-shopfloor-subject";
pub const EMAIL_HEADER: &str = "x-shopfloor-email";
pub const NAME_HEADER: &str = "x-shopfloor-name";
pub const SESSION_HEADER: &str = "x-shopfloor-session";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Resolves the gateway-authenticated actor and attaches it to the request.
pub async fn require_actor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip());
    let identity = actor_from_headers(request.headers(), peer, &state.trusted_proxies)?;
    let correlation_id = identity.origin().correlation_id.clone();

    request.extensions_mut().insert(identity);
    let mut response = next.run(request).await;

    if let Some(correlation_id) = correlation_id
        && let Ok(value) = HeaderValue::from_str(correlation_id.as_str())
    {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    Ok(response)
}

pub async fn require_same_origin_for_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if is_state_changing_method(request.method()) {
        let headers = request.headers();

        if let Some(fetch_site) = headers.get("sec-fetch-site")
            && fetch_site == HeaderValue::from_static("cross-site")
        {
            return Err(AppError::Unauthorized("cross-site request blocked".to_owned()).into());
        }

        if let Some(origin) = header_value(headers, header::ORIGIN.as_str())
            && origin != state.frontend_url
        {
            return Err(AppError::Unauthorized("origin validation failed".to_owned()).into());
        }
    }

    Ok(next.run(request).await)
}

/// Builds the acting identity from trusted gateway headers.
///
/// Identity headers are honoured only when the socket peer is a trusted proxy.
pub fn actor_from_headers(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted_proxies: &[IpNet],
) -> Result<UserIdentity, AppError> {
    let from_gateway = peer.is_some_and(|peer| is_trusted(trusted_proxies, &peer));
    if !from_gateway {
        tracing::warn!(
            peer = ?peer,
            has_subject = headers.contains_key(SUBJECT_HEADER),
            "rejecting request that did not pass through a trusted gateway"
        );
        return Err(AppError::Unauthorized("authentication required".to_owned()));
    }

    let subject = header_value(headers, SUBJECT_HEADER)
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;
    let email = header_value(headers, EMAIL_HEADER);
    let display_name = header_value(headers, NAME_HEADER)
        .or_else(|| email.clone())
        .unwrap_or_else(|| subject.clone());

    let origin = RequestOrigin {
        ip_address: client_ip(headers, peer, trusted_proxies).map(|address| address.to_string()),
        user_agent: header_value(headers, header::USER_AGENT.as_str()),
        session_id: header_value(headers, SESSION_HEADER),
        correlation_id: Some(
            header_value(headers, REQUEST_ID_HEADER)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        ),
    };

    Ok(UserIdentity::new(subject, display_name, email).with_origin(origin))
}

/// Returns the client address, honouring `x-forwarded-for` only behind a trusted proxy.
///
/// Forwarded hops are read right to left and trusted proxies are skipped, so a
/// client cannot spoof its address by prepending entries.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted_proxies: &[IpNet],
) -> Option<IpAddr> {
    let trusted = |address: &IpAddr| is_trusted(trusted_proxies, address);

    let peer = peer?;
    if !trusted(&peer) {
        return Some(peer);
    }

    let Some(forwarded) = header_value(headers, FORWARDED_FOR_HEADER) else {
        return Some(peer);
    };

    let hops = forwarded
        .split(',')
        .map(|hop| hop.trim().parse::<IpAddr>().ok())
        .collect::<Option<Vec<_>>>();
    let Some(hops) = hops else {
        tracing::debug!(forwarded, "ignoring malformed x-forwarded-for header");
        return Some(peer);
    };

    hops.iter()
        .rev()
        .find(|hop| !trusted(hop))
        .or_else(|| hops.first())
        .copied()
        .or(Some(peer))
}

fn is_trusted(trusted_proxies: &[IpNet], address: &IpAddr) -> bool {
    trusted_proxies
        .iter()
        .any(|network| network.contains(address))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn is_state_changing_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
