mod event;
mod query;
mod statistics;
mod store;

pub use event::AuditEvent;
pub use query::{
    AuditCursor, AuditLogFilter, AuditLogPage, AuditLogQuery, AuditOrder,
    DEFAULT_AUDIT_PAGE_LIMIT, MAX_AUDIT_PAGE_LIMIT,
};
pub use statistics::{
    AuditStatistics, AuditStatisticsBuilder, PrincipalActivity, TOP_PRINCIPAL_LIMIT,
};
pub use store::AuditStore;
