use chrono::SecondsFormat;

use shopfloor_domain::AuditLogEntry;

/// Header row of the audit CSV export.
pub const AUDIT_EXPORT_COLUMNS: [&str; 13] = [
    "timestamp",
    "actor_email",
    "actor_name",
    "action",
    "resource",
    "resource_id",
    "category",
    "severity",
    "outcome",
    "description",
    "ip_address",
    "session_id",
    "changes",
];

/// Renders entries as CSV, one header row followed by one row per entry.
#[must_use]
pub fn render_audit_csv(entries: &[AuditLogEntry]) -> String {
    let mut output = AUDIT_EXPORT_COLUMNS.join(",");
    output.push('\n');

    for entry in entries {
        let changes = entry
            .changes
            .as_ref()
            .and_then(|changes| serde_json::to_string(changes).ok())
            .unwrap_or_default();

        let row = [
            escape_field(
                entry
                    .occurred_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true)
                    .as_str(),
            ),
            escape_field(entry.actor.email.as_deref().unwrap_or_default()),
            escape_field(entry.actor.name.as_deref().unwrap_or_default()),
            escape_field(entry.action.as_str()),
            escape_field(entry.resource.as_str()),
            escape_field(entry.resource_id.as_deref().unwrap_or_default()),
            escape_field(entry.category.as_str()),
            escape_field(entry.severity.as_str()),
            escape_field(entry.outcome.as_str()),
            escape_field(entry.description.as_str()),
            escape_field(entry.ip_address.as_deref().unwrap_or_default()),
            escape_field(entry.session_id.as_deref().unwrap_or_default()),
            quote(changes.as_str()),
        ];

        output.push_str(row.join(",").as_str());
        output.push('\n');
    }

    output
}

/// Escapes one field, neutralizing spreadsheet formulas with a leading quote.
fn escape_field(field: &str) -> String {
    let mut field = field.to_owned();
    if matches!(field.chars().next(), Some('=' | '+' | '-' | '@')) {
        field.insert(0, '\'');
    }

    let needs_quotes =
        field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r');
    if needs_quotes { quote(field.as_str()) } else { field }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
