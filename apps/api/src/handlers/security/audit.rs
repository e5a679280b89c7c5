use axum::http::header;
use axum::response::IntoResponse;
use shopfloor_application::{AuditCursor, AuditLogFilter, AuditLogQuery, DEFAULT_AUDIT_PAGE_LIMIT};
use shopfloor_core::AppError;
use shopfloor_domain::{AuditAction, AuditCategory, AuditOutcome, AuditSeverity};

use crate::dto::common::parse_timestamp;

use super::*;

#[derive(Debug, Default, serde::Deserialize)]
pub struct AuditLogQueryParams {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
    pub subject: Option<String>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub outcome: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub q: Option<String>,
}

impl AuditLogQueryParams {
    fn filter(&self) -> Result<AuditLogFilter, AppError> {
        Ok(AuditLogFilter {
            subject: present(&self.subject).map(ToOwned::to_owned),
            action: present(&self.action)
                .map(str::parse::<AuditAction>)
                .transpose()?,
            resource: present(&self.resource).map(ToOwned::to_owned),
            category: present(&self.category)
                .map(str::parse::<AuditCategory>)
                .transpose()?,
            severity: present(&self.severity)
                .map(str::parse::<AuditSeverity>)
                .transpose()?,
            outcome: present(&self.outcome)
                .map(str::parse::<AuditOutcome>)
                .transpose()?,
            from: present(&self.from)
                .map(|from| parse_timestamp("from", from))
                .transpose()?,
            to: present(&self.to)
                .map(|to| parse_timestamp("to", to))
                .transpose()?,
            search: None,
        })
    }

    fn query(&self) -> Result<AuditLogQuery, AppError> {
        Ok(AuditLogQuery {
            filter: self.filter()?,
            limit: self.limit.unwrap_or(DEFAULT_AUDIT_PAGE_LIMIT),
            cursor: present(&self.cursor).map(AuditCursor::decode).transpose()?,
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<AuditLogQueryParams>,
) -> ApiResult<Json<AuditLogPageResponse>> {
    let page = state
        .audit_log_service
        .query(&user, params.query()?)
        .await?;

    Ok(Json(AuditLogPageResponse::from(page)))
}

pub async fn search_audit_log_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<AuditLogQueryParams>,
) -> ApiResult<Json<AuditLogPageResponse>> {
    let term = params.q.clone().unwrap_or_default();
    let page = state
        .audit_log_service
        .search(&user, term.as_str(), params.query()?)
        .await?;

    Ok(Json(AuditLogPageResponse::from(page)))
}

pub async fn audit_log_statistics_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<AuditLogQueryParams>,
) -> ApiResult<Json<AuditStatisticsResponse>> {
    let filter = params.filter()?;
    let statistics = state
        .audit_log_service
        .statistics(&user, filter.from, filter.to)
        .await?;

    Ok(Json(AuditStatisticsResponse::from(statistics)))
}

pub async fn audit_log_entry_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(entry_id): Path<String>,
) -> ApiResult<Json<AuditLogEntryResponse>> {
    let entry = state
        .audit_log_service
        .get(&user, entry_id.as_str())
        .await?;

    Ok(Json(AuditLogEntryResponse::from(entry)))
}

pub async fn export_audit_log_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<AuditLogQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let mut filter = params.filter()?;
    filter.search = present(&params.q).map(ToOwned::to_owned);
    let csv = state.audit_log_service.export(&user, filter).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"audit-log.csv\"",
            ),
        ],
        csv,
    ))
}

pub async fn purge_audit_log_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<AuditPurgeRequest>,
) -> ApiResult<Json<AuditPurgeResultResponse>> {
    let deleted_count = state
        .audit_log_service
        .purge_older_than(&user, payload.retention_days)
        .await?;

    Ok(Json(AuditPurgeResultResponse {
        retention_days: payload.retention_days,
        deleted_count,
    }))
}
