use chrono::{Duration, TimeZone, Utc};

use shopfloor_application::{AuditCursor, AuditEvent, AuditLogFilter, AuditOrder, AuditStore};
use shopfloor_core::UserIdentity;
use shopfloor_domain::{AuditAction, AuditCategory, AuditSeverity};

use super::InMemoryAuditStore;

fn event(subject: &str, minutes_ago: i64) -> AuditEvent {
    AuditEvent::new(
        &UserIdentity::new(subject, subject, None),
        AuditAction::RecordUpdated,
        AuditCategory::Data,
        AuditSeverity::Low,
        "inventory",
        "stock corrected",
    )
    .at(Utc::now() - Duration::minutes(minutes_ago))
}

#[tokio::test]
async fn sequences_increase_and_entries_are_found_by_id() {
    let store = InMemoryAuditStore::new();
    let first = store
        .put(event("alice", 5))
        .await
        .unwrap_or_else(|_| unreachable!());
    let second = store
        .put(event("bob", 5))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(second.sequence > first.sequence);
    let found = store
        .get(first.entry_id.as_str())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(found, Some(first));
}

#[tokio::test]
async fn oldest_first_scan_resumes_after_cursor() {
    let store = InMemoryAuditStore::new();
    for minutes_ago in [30, 20, 10] {
        assert!(store.put(event("alice", minutes_ago)).await.is_ok());
    }

    let first = store
        .query(&AuditLogFilter::default(), AuditOrder::OldestFirst, 2, None)
        .await
        .unwrap_or_else(|_| unreachable!());
    let cursor = first.last().map(shopfloor_application::AuditCursor::after);
    let rest = store
        .query(&AuditLogFilter::default(), AuditOrder::OldestFirst, 2, cursor)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(first.len(), 2);
    assert_eq!(rest.len(), 1);
    assert!(rest[0].occurred_at > first[1].occurred_at);
}

#[tokio::test]
async fn purge_keeps_entries_at_or_after_cutoff() {
    let store = InMemoryAuditStore::new();
    assert!(store.put(event("alice", 120)).await.is_ok());
    assert!(store.put(event("bob", 1)).await.is_ok());

    let purged = store
        .purge_before(Utc::now() - Duration::minutes(60))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(purged, 1);
    let remaining = store
        .query(&AuditLogFilter::default(), AuditOrder::NewestFirst, 10, None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].actor.subject, "bob");
}

#[tokio::test]
async fn decoded_cursor_keeps_entries_sharing_a_microsecond() {
    let store = InMemoryAuditStore::new();
    let microsecond = Utc
        .with_ymd_and_hms(2026, 3, 1, 8, 0, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
        + Duration::microseconds(7);
    for (subject, nanos) in [("older", 200), ("newer", 500)] {
        let mut event = event(subject, 0);
        event.occurred_at = microsecond + Duration::nanoseconds(nanos);
        assert!(store.put(event).await.is_ok());
    }

    let first = store
        .query(&AuditLogFilter::default(), AuditOrder::NewestFirst, 1, None)
        .await
        .unwrap_or_else(|_| unreachable!());
    let token = first
        .last()
        .map(|entry| AuditCursor::after(entry).encode())
        .unwrap_or_else(|| unreachable!());
    let cursor = AuditCursor::decode(token.as_str()).unwrap_or_else(|_| unreachable!());
    let second = store
        .query(&AuditLogFilter::default(), AuditOrder::NewestFirst, 1, Some(cursor))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(first[0].actor.subject, "newer");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].actor.subject, "older");
    assert_eq!(second[0].occurred_at, microsecond);
}
