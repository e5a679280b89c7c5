use super::*;

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let roles = state
        .catalog_service
        .list_roles(&user)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let role = state
        .catalog_service
        .create_role(&user, RoleDefinitionInput::try_from(payload)?)
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let (input, expected_version) = payload.into_input(role_id)?;
    let role = state
        .catalog_service
        .update_role(&user, input, expected_version)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn deactivate_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state
        .catalog_service
        .deactivate_role(&user, role_id.as_str())
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn role_permissions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<String>,
) -> ApiResult<Json<Vec<ResolvedPermissionResponse>>> {
    let permissions = state
        .catalog_service
        .role_permissions(&user, role_id.as_str())
        .await?
        .into_iter()
        .map(ResolvedPermissionResponse::from)
        .collect();

    Ok(Json(permissions))
}
