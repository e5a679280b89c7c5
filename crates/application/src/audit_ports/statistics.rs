use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use shopfloor_domain::{AuditAction, AuditCategory, AuditLogEntry, AuditOutcome, AuditSeverity};

/// Number of principals reported in [`AuditStatistics::top_principals`].
pub const TOP_PRINCIPAL_LIMIT: usize = 10;

/// Event count attributed to one principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalActivity {
    /// Actor subject.
    pub subject: String,
    /// Number of matching entries.
    pub event_count: u64,
}

/// Aggregate counts over a time range of the audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditStatistics {
    /// Inclusive lower bound of the aggregated range.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound of the aggregated range.
    pub to: Option<DateTime<Utc>>,
    /// Number of aggregated entries.
    pub total_entries: u64,
    /// Counts per category.
    pub by_category: BTreeMap<AuditCategory, u64>,
    /// Counts per action.
    pub by_action: BTreeMap<AuditAction, u64>,
    /// Counts per severity.
    pub by_severity: BTreeMap<AuditSeverity, u64>,
    /// Counts per outcome.
    pub by_outcome: BTreeMap<AuditOutcome, u64>,
    /// Most active principals, highest count first.
    pub top_principals: Vec<PrincipalActivity>,
    /// Entries in the security or authentication category.
    pub security_events: u64,
    /// Failed authentication attempts.
    pub failed_logins: u64,
}

/// Incremental accumulator behind [`AuditStatistics`].
#[derive(Debug, Default)]
pub struct AuditStatisticsBuilder {
    statistics: AuditStatistics,
    principals: HashMap<String, u64>,
}

impl AuditStatisticsBuilder {
    /// Starts an accumulator for the given range.
    #[must_use]
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self {
            statistics: AuditStatistics {
                from,
                to,
                ..AuditStatistics::default()
            },
            principals: HashMap::new(),
        }
    }

    /// Adds one entry to every counter.
    pub fn record(&mut self, entry: &AuditLogEntry) {
        let statistics = &mut self.statistics;
        statistics.total_entries += 1;
        *statistics.by_category.entry(entry.category).or_default() += 1;
        *statistics.by_action.entry(entry.action).or_default() += 1;
        *statistics.by_severity.entry(entry.severity).or_default() += 1;
        *statistics.by_outcome.entry(entry.outcome).or_default() += 1;

        if entry.is_security_event() {
            statistics.security_events += 1;
        }
        if entry.is_failed_authentication() {
            statistics.failed_logins += 1;
        }

        *self
            .principals
            .entry(entry.actor.subject.clone())
            .or_default() += 1;
    }

    /// Finalizes the counters, ranking principals by count then subject.
    #[must_use]
    pub fn finish(self) -> AuditStatistics {
        let mut top_principals: Vec<PrincipalActivity> = self
            .principals
            .into_iter()
            .map(|(subject, event_count)| PrincipalActivity {
                subject,
                event_count,
            })
            .collect();
        top_principals.sort_by(|left, right| {
            right
                .event_count
                .cmp(&left.event_count)
                .then_with(|| left.subject.cmp(&right.subject))
        });
        top_principals.truncate(TOP_PRINCIPAL_LIMIT);

        AuditStatistics {
            top_principals,
            ..self.statistics
        }
    }
}
