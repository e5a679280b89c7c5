use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use shopfloor_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route(
            "/api/access/check",
            post(handlers::access::check_access_handler),
        )
        .route(
            "/api/security/permissions",
            get(handlers::security::list_permissions_handler)
                .post(handlers::security::create_permission_handler),
        )
        .route(
            "/api/security/permissions/integrity",
            get(handlers::security::permission_integrity_handler),
        )
        .route(
            "/api/security/roles",
            get(handlers::security::list_roles_handler)
                .post(handlers::security::create_role_handler),
        )
        .route(
            "/api/security/roles/{role_id}",
            put(handlers::security::update_role_handler),
        )
        .route(
            "/api/security/roles/{role_id}/deactivate",
            post(handlers::security::deactivate_role_handler),
        )
        .route(
            "/api/security/roles/{role_id}/permissions",
            get(handlers::security::role_permissions_handler),
        )
        .route(
            "/api/security/principals/{principal}/grants",
            get(handlers::security::list_principal_grants_handler),
        )
        .route(
            "/api/security/grants/roles",
            post(handlers::security::assign_role_handler),
        )
        .route(
            "/api/security/grants/permissions",
            post(handlers::security::assign_permission_handler),
        )
        .route(
            "/api/security/grants/revoke",
            post(handlers::security::revoke_grant_handler),
        )
        .route(
            "/api/security/audit-log",
            get(handlers::security::list_audit_log_handler),
        )
        .route(
            "/api/security/audit-log/search",
            get(handlers::security::search_audit_log_handler),
        )
        .route(
            "/api/security/audit-log/statistics",
            get(handlers::security::audit_log_statistics_handler),
        )
        .route(
            "/api/security/audit-log/export",
            get(handlers::security::export_audit_log_handler),
        )
        .route(
            "/api/security/audit-log/purge",
            post(handlers::security::purge_audit_log_handler),
        )
        .route(
            "/api/security/audit-log/{entry_id}",
            get(handlers::security::audit_log_entry_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_actor,
        ));

    let cors_layer = cors::build_cors_layer(app_state.frontend_url.as_str())?;

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state))
}
