use super::*;

pub async fn list_principal_grants_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(principal): Path<String>,
) -> ApiResult<Json<Vec<GrantResponse>>> {
    let grants = state
        .grant_service
        .active_grants_for(&user, principal.as_str())
        .await?
        .into_iter()
        .map(GrantResponse::from)
        .collect();

    Ok(Json(grants))
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<(StatusCode, Json<GrantResponse>)> {
    let grant = state
        .grant_service
        .assign_role(&user, AssignGrantInput::try_from(payload)?)
        .await?;

    Ok((StatusCode::CREATED, Json(GrantResponse::from(grant))))
}

pub async fn assign_permission_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<AssignPermissionRequest>,
) -> ApiResult<(StatusCode, Json<GrantResponse>)> {
    let grant = state
        .grant_service
        .assign_permission(&user, AssignGrantInput::try_from(payload)?)
        .await?;

    Ok((StatusCode::CREATED, Json(GrantResponse::from(grant))))
}

pub async fn revoke_grant_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<RevokeGrantRequest>,
) -> ApiResult<Json<Vec<GrantResponse>>> {
    let revoked = state
        .grant_service
        .revoke(&user, payload.principal.as_str(), payload.target_id.as_str())
        .await?
        .into_iter()
        .map(GrantResponse::from)
        .collect();

    Ok(Json(revoked))
}
