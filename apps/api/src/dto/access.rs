use serde::{Deserialize, Serialize};
use shopfloor_application::AccessDecision;
use shopfloor_domain::AccessContext;
use ts_rs::TS;

/// Incoming permission check.
///
/// `principal` defaults to the calling actor.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/check-access-request.ts"
)]
pub struct CheckAccessRequest {
    pub principal: Option<String>,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    #[ts(type = "Record<string, boolean | number | string | Array<unknown>>")]
    pub context: AccessContext,
}

/// API representation of an access decision.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-decision-response.ts"
)]
pub struct AccessDecisionResponse {
    pub granted: bool,
    pub reason: String,
    pub source: String,
    pub role_id: Option<String>,
    pub permission_id: Option<String>,
    pub grant_id: Option<String>,
    pub denial: Option<String>,
}

impl From<AccessDecision> for AccessDecisionResponse {
    fn from(value: AccessDecision) -> Self {
        Self {
            granted: value.granted,
            reason: value.reason,
            source: value.source.as_str().to_owned(),
            role_id: value.role_id,
            permission_id: value.permission_id,
            grant_id: value.grant_id,
            denial: value.denial.map(|denial| denial.as_str().to_owned()),
        }
    }
}
