mod conversions;
mod types;

pub use types::{
    AuditLogEntryResponse, AuditLogPageResponse, AuditPurgeRequest, AuditPurgeResultResponse,
    AuditStatisticsResponse, PrincipalActivityResponse,
};
