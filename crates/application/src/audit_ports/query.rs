use chrono::{DateTime, Utc};

use shopfloor_core::{AppError, AppResult};
use shopfloor_domain::{AuditAction, AuditCategory, AuditLogEntry, AuditOutcome, AuditSeverity};

/// Default page size for audit listings.
pub const DEFAULT_AUDIT_PAGE_LIMIT: usize = 50;

/// Largest page size an audit listing returns.
pub const MAX_AUDIT_PAGE_LIMIT: usize = 200;

/// Structured audit filter; every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogFilter {
    /// Actor subject.
    pub subject: Option<String>,
    /// Action taken.
    pub action: Option<AuditAction>,
    /// Target resource label.
    pub resource: Option<String>,
    /// Event grouping.
    pub category: Option<AuditCategory>,
    /// Event severity.
    pub severity: Option<AuditSeverity>,
    /// Action result.
    pub outcome: Option<AuditOutcome>,
    /// Inclusive lower time bound.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper time bound.
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive free-text term.
    pub search: Option<String>,
}

impl AuditLogFilter {
    /// Returns whether the entry satisfies every populated criterion.
    #[must_use]
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.subject
            .as_deref()
            .is_none_or(|subject| entry.actor.subject == subject)
            && self.action.is_none_or(|action| entry.action == action)
            && self
                .resource
                .as_deref()
                .is_none_or(|resource| entry.resource == resource)
            && self.category.is_none_or(|category| entry.category == category)
            && self.severity.is_none_or(|severity| entry.severity == severity)
            && self.outcome.is_none_or(|outcome| entry.outcome == outcome)
            && self.from.is_none_or(|from| entry.occurred_at >= from)
            && self.to.is_none_or(|to| entry.occurred_at <= to)
            && self
                .normalized_search()
                .is_none_or(|term| search_matches(entry, term.as_str()))
    }

    /// Returns the lowercased search term, ignoring blank input.
    #[must_use]
    pub fn normalized_search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    /// Rejects inverted time ranges.
    pub fn validate(&self) -> AppResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(AppError::Validation(
                "audit filter 'from' must not be after 'to'".to_owned(),
            ));
        }

        Ok(())
    }
}

fn search_matches(entry: &AuditLogEntry, term: &str) -> bool {
    let contains = |value: &str| value.to_lowercase().contains(term);

    contains(entry.actor.subject.as_str())
        || entry.actor.email.as_deref().is_some_and(contains)
        || entry.actor.name.as_deref().is_some_and(contains)
        || contains(entry.description.as_str())
        || contains(entry.action.as_str())
        || contains(entry.resource.as_str())
        || entry.ip_address.as_deref().is_some_and(contains)
}

/// Result ordering of an audit listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuditOrder {
    /// Most recent first, ties broken by descending insertion sequence.
    #[default]
    NewestFirst,
    /// Chronological, ties broken by ascending insertion sequence.
    OldestFirst,
}

impl AuditOrder {
    /// Compares two entries according to this ordering.
    #[must_use]
    pub fn compare(&self, left: &AuditLogEntry, right: &AuditLogEntry) -> std::cmp::Ordering {
        let ascending = (left.occurred_at, left.sequence).cmp(&(right.occurred_at, right.sequence));
        match self {
            Self::NewestFirst => ascending.reverse(),
            Self::OldestFirst => ascending,
        }
    }

    /// Returns whether the entry sorts strictly after the cursor position.
    #[must_use]
    pub fn is_past_cursor(&self, entry: &AuditLogEntry, cursor: &AuditCursor) -> bool {
        let position = (entry.occurred_at, entry.sequence);
        let boundary = (cursor.occurred_at, cursor.sequence);
        match self {
            Self::NewestFirst => position < boundary,
            Self::OldestFirst => position > boundary,
        }
    }
}

/// Keyset position of the last entry a page returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditCursor {
    /// Timestamp of the boundary entry.
    pub occurred_at: DateTime<Utc>,
    /// Sequence of the boundary entry.
    pub sequence: u64,
}

impl AuditCursor {
    /// Creates a cursor positioned on an entry.
    #[must_use]
    pub fn after(entry: &AuditLogEntry) -> Self {
        Self {
            occurred_at: entry.occurred_at,
            sequence: entry.sequence,
        }
    }

    /// Encodes the cursor as an opaque transport token.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}.{}", self.occurred_at.timestamp_micros(), self.sequence)
    }

    /// Decodes a transport token produced by [`AuditCursor::encode`].
    pub fn decode(token: &str) -> AppResult<Self> {
        let invalid = || AppError::Validation(format!("invalid audit cursor '{token}'"));
        let (micros, sequence) = token.split_once('.').ok_or_else(invalid)?;
        let micros = micros.parse::<i64>().map_err(|_| invalid())?;
        let sequence = sequence.parse::<u64>().map_err(|_| invalid())?;
        let occurred_at = DateTime::from_timestamp_micros(micros).ok_or_else(invalid)?;

        Ok(Self {
            occurred_at,
            sequence,
        })
    }
}

/// Paginated audit listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Entry filter.
    pub filter: AuditLogFilter,
    /// Requested page size.
    pub limit: usize,
    /// Continue after this position.
    pub cursor: Option<AuditCursor>,
}

impl AuditLogQuery {
    /// Creates a first-page query with the default page size.
    #[must_use]
    pub fn new(filter: AuditLogFilter) -> Self {
        Self {
            filter,
            limit: DEFAULT_AUDIT_PAGE_LIMIT,
            cursor: None,
        }
    }

    /// Returns the page size clamped to the supported range.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_AUDIT_PAGE_LIMIT)
    }
}

/// One page of audit entries.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogPage {
    /// Entries, most recent first.
    pub entries: Vec<AuditLogEntry>,
    /// Whether more entries match beyond this page.
    pub has_more: bool,
    /// Cursor for the next page when `has_more` is set.
    pub next_cursor: Option<AuditCursor>,
}
