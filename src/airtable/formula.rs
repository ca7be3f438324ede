use chrono::{DateTime, Utc};

use super::types::{DATE_FORMAT, FIELD_LAST_MODIFIED};

/// Records modified after `since` whose `status_field` is still empty.
///
/// Airtable compares at day granularity here: `since` is rendered as a date.
pub fn unprocessed_formula(since: DateTime<Utc>, status_field: &str) -> String {
    let date_filter = format!(
        "IS_AFTER({{{FIELD_LAST_MODIFIED}}}, DATETIME_PARSE('{}'))",
        since.format(DATE_FORMAT)
    );
    let is_processed_filter = format!("{{{status_field}}}=''");
    format!("AND({date_filter}, {is_processed_filter})")
}

/// Exact match on a single field.
pub fn match_formula(field: &str, value: &str) -> String {
    format!("{{{field}}}='{}'", escape_string(value))
}

fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
