use thiserror::Error;

/// Errors raised while talking to the Airtable REST API.
///
/// Everything except [`StoreError::InvalidRecord`] aborts a run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no record with {field} = '{value}'")]
    RecordNotFound { field: String, value: String },

    /// A fetched record lacks a field the job needs.
    #[error("invalid record {record_id}: {reason}")]
    InvalidRecord { record_id: String, reason: String },

    #[error("Airtable API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode Airtable response: {0}")]
    Decode(String),

    #[error("invalid Airtable URL: {0}")]
    InvalidUrl(String),
}
