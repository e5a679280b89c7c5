use axum::Json;
use axum::extract::{Extension, State};
use shopfloor_application::AccessRequest;
use shopfloor_core::UserIdentity;
use shopfloor_domain::{PermissionAction, SECURITY_RESOURCE};

use crate::dto::{AccessDecisionResponse, CheckAccessRequest};
use crate::error::ApiResult;
use crate::state::AppState;

/// Evaluates one permission check.
///
/// Checking on behalf of another principal requires `security:manage`; the
/// caller's subject and request origin are recorded with any denial.
pub async fn check_access_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CheckAccessRequest>,
) -> ApiResult<Json<AccessDecisionResponse>> {
    let action = payload.action.parse::<PermissionAction>()?;

    let request = match payload
        .principal
        .as_deref()
        .map(str::trim)
        .filter(|principal| !principal.is_empty())
    {
        Some(principal) if principal != user.subject() => {
            state
                .permission_engine
                .require_permission(&user, SECURITY_RESOURCE, PermissionAction::Manage)
                .await?;
            let identity =
                UserIdentity::new(principal, principal, None).with_origin(user.origin().clone());
            AccessRequest::for_identity(identity, payload.resource, action)
                .requested_by(user.subject())
        }
        _ => AccessRequest::for_identity(user, payload.resource, action),
    }
    .with_context(payload.context);
    let decision = state.permission_engine.check(&request).await;

    Ok(Json(AccessDecisionResponse::from(decision)))
}
