use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::error::StoreError;
use super::formula::{match_formula, unprocessed_formula};
use super::types::{AirtableRecord, RecordPage, SHIPMENT_FIELDS, UpdateRequest};

pub const API_URL: &str = "https://api.airtable.com/v0";
pub const SHIPMENT_TABLE: &str = "Shipment Tracking";

/// Airtable refuses page sizes above this.
const MAX_PAGE_SIZE: usize = 100;

/// Parameters of a list-records call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub formula: String,
    pub fields: Vec<String>,
    pub page_size: usize,
    pub max_records: Option<usize>,
}

/// Read/write access to the shipment table.
#[allow(async_fn_in_trait)]
pub trait ShipmentStore {
    /// Fetch one page of records, starting at `offset` when given.
    async fn list_page(&self, query: &ListQuery, offset: Option<&str>)
    -> Result<RecordPage, StoreError>;

    /// Set `field` to `value` on the first record where `key_field` equals `key_value`.
    async fn update_field(
        &self,
        key_field: &str,
        key_value: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    /// Lazily page through records modified after `since` whose
    /// `status_field` is empty, `limit` records per page.
    fn fetch_unprocessed(
        &self,
        since: DateTime<Utc>,
        status_field: &str,
        limit: usize,
    ) -> ShipmentPages<'_, Self>
    where
        Self: Sized,
    {
        let query = ListQuery {
            formula: unprocessed_formula(since, status_field),
            fields: SHIPMENT_FIELDS.iter().map(|f| f.to_string()).collect(),
            page_size: limit.clamp(1, MAX_PAGE_SIZE),
            max_records: None,
        };
        ShipmentPages::new(self, query)
    }
}

/// Cursor over the pages of a list query. Nothing is fetched until
/// [`next_page`](ShipmentPages::next_page) is awaited.
pub struct ShipmentPages<'a, S> {
    store: &'a S,
    query: ListQuery,
    offset: Option<String>,
    done: bool,
}

impl<'a, S: ShipmentStore> ShipmentPages<'a, S> {
    pub fn new(store: &'a S, query: ListQuery) -> Self {
        Self {
            store,
            query,
            offset: None,
            done: false,
        }
    }

    /// Next non-empty page, or `None` once the store has no more records.
    pub async fn next_page(&mut self) -> Result<Option<Vec<AirtableRecord>>, StoreError> {
        if self.done {
            return Ok(None);
        }

        let page = self
            .store
            .list_page(&self.query, self.offset.as_deref())
            .await?;

        self.offset = page.offset;
        if self.offset.is_none() {
            self.done = true;
        }
        if page.records.is_empty() {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(page.records))
    }
}

pub struct AirtableClient {
    client: Client,
    token: String,
    table_url: Url,
}

impl AirtableClient {
    /// Create a client pointing at a custom API root (useful for testing).
    pub fn with_base_url(api_url: &str, base_id: &str, token: String) -> Result<Self, StoreError> {
        let mut table_url =
            Url::parse(api_url).map_err(|e| StoreError::InvalidUrl(format!("{api_url}: {e}")))?;
        table_url
            .path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(api_url.to_string()))?
            .pop_if_empty()
            .push(base_id)
            .push(SHIPMENT_TABLE);

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            token,
            table_url,
        })
    }

    fn record_url(&self, record_id: &str) -> Result<Url, StoreError> {
        let mut url = self.table_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.table_url.to_string()))?
            .push(record_id);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl ShipmentStore for AirtableClient {
    async fn list_page(
        &self,
        query: &ListQuery,
        offset: Option<&str>,
    ) -> Result<RecordPage, StoreError> {
        let page_size = query.page_size.to_string();
        let mut request = self.client.get(self.table_url.clone()).query(&[
            ("filterByFormula", query.formula.as_str()),
            ("pageSize", page_size.as_str()),
        ]);
        for field in &query.fields {
            request = request.query(&[("fields[]", field.as_str())]);
        }
        if let Some(max) = query.max_records {
            request = request.query(&[("maxRecords", max.to_string())]);
        }
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        debug!(formula = %query.formula, ?offset, "listing Airtable records");
        self.send_json(request).await
    }

    async fn update_field(
        &self,
        key_field: &str,
        key_value: &str,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let lookup = ListQuery {
            formula: match_formula(key_field, key_value),
            fields: Vec::new(),
            page_size: 1,
            max_records: Some(1),
        };
        let record = self
            .list_page(&lookup, None)
            .await?
            .records
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::RecordNotFound {
                field: key_field.to_string(),
                value: key_value.to_string(),
            })?;

        let mut fields = Map::new();
        fields.insert(field.to_string(), Value::String(value.to_string()));
        let body = UpdateRequest {
            fields,
            typecast: false,
        };

        debug!(record_id = %record.id, field, value, "updating Airtable record");
        let url = self.record_url(&record.id)?;
        let _updated: AirtableRecord = self.send_json(self.client.patch(url).json(&body)).await?;
        Ok(())
    }
}
