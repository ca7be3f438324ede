//! Airtable wire types and the shipment record parsed from them.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::StoreError;
use crate::shipit::types::parse_timestamp;

/// Date format used for filter formulas.
pub const DATE_FORMAT: &str = "%m/%d/%Y";
/// Date-time format of text date fields in the shipment table.
pub const DATETIME_FORMAT: &str = "%m/%d/%Y %H:%M";

pub const FIELD_PO: &str = "PO";
pub const FIELD_TRACKING_NUMBER: &str = "Tracking Number";
pub const FIELD_REQUESTED_SHIP_DATE: &str = "Requested Ship Date";
pub const FIELD_SHIP_DATE_DIFF: &str = "Diff in Req'd vs Ship Date";
pub const FIELD_CARRIER_PICKUP: &str = "Carrier Pickup";
pub const FIELD_LAST_MODIFIED: &str = "Record Last Modified DateTime";

/// Fixed projection requested for every unprocessed-shipment query.
pub const SHIPMENT_FIELDS: &[&str] = &[
    FIELD_PO,
    FIELD_TRACKING_NUMBER,
    FIELD_REQUESTED_SHIP_DATE,
    FIELD_SHIP_DATE_DIFF,
];

/// A raw row as returned by the Airtable API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirtableRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
}

impl AirtableRecord {
    /// Read a field as text. Numbers are rendered, blanks count as absent.
    pub fn field_str(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One page of a list-records call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<AirtableRecord>,
    /// Cursor for the next page, absent on the last one.
    pub offset: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateRequest {
    pub fields: Map<String, Value>,
    pub typecast: bool,
}

/// A purchase order row from the shipment tracking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentRecord {
    pub record_id: String,
    pub po_number: String,
    pub tracking_number: String,
    pub requested_ship_date: Option<DateTime<Utc>>,
    pub computed_kpi: Option<Duration>,
}

impl ShipmentRecord {
    /// Delay between the requested ship date and `delivered_at`.
    ///
    /// `None` when the record has no requested ship date.
    pub fn delivery_delta(&self, delivered_at: DateTime<Utc>) -> Option<Duration> {
        self.requested_ship_date.map(|requested| delivered_at - requested)
    }
}

impl TryFrom<&AirtableRecord> for ShipmentRecord {
    type Error = StoreError;

    fn try_from(record: &AirtableRecord) -> Result<Self, Self::Error> {
        let required = |name: &str| {
            record.field_str(name).ok_or_else(|| StoreError::InvalidRecord {
                record_id: record.id.clone(),
                reason: format!("missing field '{name}'"),
            })
        };
        let po_number = required(FIELD_PO)?;
        let tracking_number = required(FIELD_TRACKING_NUMBER)?;

        let requested_ship_date = match record.field_str(FIELD_REQUESTED_SHIP_DATE) {
            Some(raw) => Some(parse_store_datetime(&raw).ok_or_else(|| {
                StoreError::InvalidRecord {
                    record_id: record.id.clone(),
                    reason: format!("unparseable {FIELD_REQUESTED_SHIP_DATE} '{raw}'"),
                }
            })?),
            None => None,
        };

        let computed_kpi = record
            .field_str(FIELD_SHIP_DATE_DIFF)
            .and_then(|raw| parse_duration(&raw));

        Ok(Self {
            record_id: record.id.clone(),
            po_number,
            tracking_number,
            requested_ship_date,
            computed_kpi,
        })
    }
}

/// Parse a date field from the store. Text fields carry no zone and are
/// taken as UTC; ISO values from date-typed fields are accepted too.
pub fn parse_store_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    parse_timestamp(raw)
}

pub fn format_store_datetime(value: DateTime<Utc>) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

const MICROS_PER_SECOND: i128 = 1_000_000;
const MICROS_PER_DAY: i128 = 86_400 * MICROS_PER_SECOND;

/// Render a duration as `"D days, H:MM:SS[.ffffff]"`.
///
/// Days are floored, so the clock part is never negative:
/// minus one hour renders as `"-1 day, 23:00:00"`.
pub fn format_duration(value: Duration) -> String {
    let total = value
        .num_microseconds()
        .map(i128::from)
        .unwrap_or_else(|| value.num_seconds() as i128 * MICROS_PER_SECOND);
    let days = total.div_euclid(MICROS_PER_DAY);
    let rem = total.rem_euclid(MICROS_PER_DAY);

    let micros = rem % MICROS_PER_SECOND;
    let secs = rem / MICROS_PER_SECOND;
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    let mut out = String::new();
    if days != 0 {
        let unit = if days.abs() == 1 { "day" } else { "days" };
        out.push_str(&format!("{days} {unit}, "));
    }
    out.push_str(&format!("{hours}:{minutes:02}:{seconds:02}"));
    if micros != 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    out
}

/// Inverse of [`format_duration`].
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (days, clock) = match raw.split_once(',') {
        Some((day_part, rest)) => {
            let n = day_part
                .trim()
                .trim_end_matches("days")
                .trim_end_matches("day")
                .trim()
                .parse::<i64>()
                .ok()?;
            (n, rest.trim())
        }
        None => (0, raw),
    };

    let mut parts = clock.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let (secs_raw, frac_raw) = match seconds_part.split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (seconds_part, None),
    };
    let seconds: i64 = secs_raw.parse().ok()?;
    let micros: i64 = match frac_raw {
        Some(f) if f.len() == 6 => f.parse().ok()?,
        Some(_) => return None,
        None => 0,
    };

    Duration::try_days(days)?
        .checked_add(&Duration::try_hours(hours)?)?
        .checked_add(&Duration::try_minutes(minutes)?)?
        .checked_add(&Duration::try_seconds(seconds)?)?
        .checked_add(&Duration::microseconds(micros))
}
