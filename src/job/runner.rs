use chrono::{DateTime, Utc};

use crate::airtable::types::{FIELD_PO, format_duration, format_store_datetime};
use crate::airtable::{ShipmentRecord, ShipmentStore};
use crate::config::{JobConfig, JobVariant};
use crate::error::JobError;
use crate::logging::JobLogger;
use crate::shipit::TrackingSource;

use super::summary::{RecordState, RunSummary};

/// Reconciles unprocessed shipment records against carrier tracking data.
pub struct ShippingKpiJob<T, S, L> {
    tracker: T,
    store: S,
    logger: L,
}

impl<T: TrackingSource, S: ShipmentStore, L: JobLogger> ShippingKpiJob<T, S, L> {
    pub fn new(tracker: T, store: S, logger: L) -> Self {
        Self {
            tracker,
            store,
            logger,
        }
    }

    /// Run one full pass over the records modified since `config.last_run`.
    ///
    /// Per-record failures are logged and skipped. Store errors abort the
    /// pass and leave `config` untouched; otherwise the watermark advances
    /// to `started_at` once every page has been processed.
    pub async fn execute(
        &self,
        config: &mut JobConfig,
        started_at: DateTime<Utc>,
    ) -> Result<RunSummary, JobError> {
        let variant = config.job;
        let since = config.last_run;
        self.logger.debug(&format!(
            "Fetching unprocessed shipment data from Airtable since {since} ({variant})..."
        ));

        let mut summary = RunSummary::new(variant, started_at, since);
        let mut pages = self
            .store
            .fetch_unprocessed(since, variant.status_field(), config.page_size);

        while let Some(page) = pages.next_page().await? {
            for raw in &page {
                summary.fetched += 1;
                let record = match ShipmentRecord::try_from(raw) {
                    Ok(record) => record,
                    Err(e) => {
                        self.logger.error(&e.to_string());
                        summary.record(None, RecordState::Invalid);
                        continue;
                    }
                };
                let state = self.process_record(&record, variant).await?;
                summary.record(Some(record.po_number.as_str()), state);
            }
        }

        self.logger.debug(&format!(
            "Successfully processed {} shipment status(es)",
            summary.updated()
        ));

        config.advance_watermark(started_at);
        summary.watermark = config.last_run;
        summary.completed_at = Some(Utc::now());
        Ok(summary)
    }

    async fn process_record(
        &self,
        record: &ShipmentRecord,
        variant: JobVariant,
    ) -> Result<RecordState, JobError> {
        let po = &record.po_number;
        let status = match self.tracker.fetch_status(&record.tracking_number).await {
            Ok(status) => status,
            Err(e) => {
                self.logger.error(&format!("PO {po}: {e}"));
                return Ok(RecordState::LookupFailed);
            }
        };

        let (state, value) = match variant {
            JobVariant::CarrierPickup => {
                let Some(pickup_time) = status.pickup_time() else {
                    return Ok(RecordState::NoEvent);
                };
                self.logger
                    .debug(&format!("PO {po} has been picked up on {pickup_time}"));
                (RecordState::PickedUp, format_store_datetime(pickup_time))
            }
            JobVariant::DeliveryKpi => {
                let Some(delivery_time) = status.delivery_time() else {
                    return Ok(RecordState::NoEvent);
                };
                let Some(delta) = record.delivery_delta(delivery_time) else {
                    self.logger
                        .error(&format!("PO {po}: delivered but has no requested ship date"));
                    return Ok(RecordState::Invalid);
                };
                let kpi = format_duration(delta);
                self.logger
                    .debug(&format!("PO {po} was delivered on {delivery_time} ({kpi} after request)"));
                (RecordState::Delivered, kpi)
            }
        };

        self.store
            .update_field(FIELD_PO, po, variant.status_field(), &value)
            .await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use chrono::TimeZone;
    use serde_json::{Value, json};

    use super::*;
    use crate::airtable::StoreError;
    use crate::airtable::client::ListQuery;
    use crate::airtable::types::{AirtableRecord, RecordPage};
    use crate::logging::testing::RecordingLogger;
    use crate::shipit::TrackingError;
    use crate::shipit::types::{ShipmentStatus, TrackingEvent, classify, parse_timestamp};

    // --- Fakes ---

    #[derive(Default)]
    struct FakeTracker {
        events: HashMap<String, Vec<(&'static str, &'static str)>>,
        outages: HashMap<String, u16>,
        lookups: RefCell<Vec<String>>,
    }

    impl FakeTracker {
        fn with(mut self, tracking_number: &str, events: &[(&'static str, &'static str)]) -> Self {
            self.events.insert(tracking_number.to_string(), events.to_vec());
            self
        }

        fn unavailable(mut self, tracking_number: &str, status: u16) -> Self {
            self.outages.insert(tracking_number.to_string(), status);
            self
        }
    }

    impl TrackingSource for FakeTracker {
        async fn fetch_status(
            &self,
            tracking_number: &str,
        ) -> Result<ShipmentStatus, TrackingError> {
            self.lookups.borrow_mut().push(tracking_number.to_string());
            let carrier = classify(tracking_number)
                .ok_or_else(|| TrackingError::UnknownCarrierFormat(tracking_number.to_string()))?;
            if let Some(&status) = self.outages.get(tracking_number) {
                return Err(TrackingError::Api {
                    status,
                    message: "service unavailable".into(),
                });
            }
            let events = self
                .events
                .get(tracking_number)
                .ok_or_else(|| TrackingError::MalformedResponse("missing activities".into()))?;
            Ok(ShipmentStatus {
                tracking_number: tracking_number.to_string(),
                carrier,
                events: events
                    .iter()
                    .map(|(label, ts)| TrackingEvent {
                        label: label.to_string(),
                        timestamp: parse_timestamp(ts).unwrap(),
                    })
                    .collect(),
            })
        }
    }

    #[derive(Default)]
    struct FakeStore {
        records: Vec<AirtableRecord>,
        queries: RefCell<Vec<ListQuery>>,
        updates: RefCell<Vec<(String, String, String, String)>>,
        fail_listing: bool,
        missing_po: Option<String>,
        list_calls: Cell<usize>,
    }

    impl FakeStore {
        fn with_records(records: Vec<AirtableRecord>) -> Self {
            Self {
                records,
                ..Self::default()
            }
        }
    }

    impl ShipmentStore for FakeStore {
        async fn list_page(
            &self,
            query: &ListQuery,
            offset: Option<&str>,
        ) -> Result<RecordPage, StoreError> {
            self.list_calls.set(self.list_calls.get() + 1);
            self.queries.borrow_mut().push(query.clone());
            if self.fail_listing {
                return Err(StoreError::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            let start: usize = offset.map(|o| o.parse().unwrap()).unwrap_or(0);
            let end = (start + query.page_size).min(self.records.len());
            Ok(RecordPage {
                records: self.records[start..end].to_vec(),
                offset: (end < self.records.len()).then(|| end.to_string()),
            })
        }

        async fn update_field(
            &self,
            key_field: &str,
            key_value: &str,
            field: &str,
            value: &str,
        ) -> Result<(), StoreError> {
            if self.missing_po.as_deref() == Some(key_value) {
                return Err(StoreError::RecordNotFound {
                    field: key_field.to_string(),
                    value: key_value.to_string(),
                });
            }
            self.updates.borrow_mut().push((
                key_field.to_string(),
                key_value.to_string(),
                field.to_string(),
                value.to_string(),
            ));
            Ok(())
        }
    }

    fn record(id: &str, fields: Value) -> AirtableRecord {
        AirtableRecord {
            id: id.into(),
            fields: fields.as_object().cloned().unwrap(),
            created_time: None,
        }
    }

    fn shipment(id: &str, po: &str, tracking: &str) -> AirtableRecord {
        record(
            id,
            json!({"PO": po, "Tracking Number": tracking, "Requested Ship Date": "01/01/2024 00:00"}),
        )
    }

    fn config(variant: JobVariant) -> JobConfig {
        let mut config = JobConfig::new("app123", "key123");
        config.job = variant;
        config.last_run = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        config
    }

    fn run_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 6, 0, 0).unwrap()
    }

    // --- Tests ---

    #[tokio::test]
    async fn pickup_variant_writes_pickup_time() {
        let tracker = FakeTracker::default().with(
            "1Z999AA10123456784",
            &[
                ("Label created", "2024-01-01T08:00:00Z"),
                ("Origin scan", "2024-01-02T10:15:00Z"),
            ],
        );
        let store = FakeStore::with_records(vec![shipment("rec1", "PO-1", "1Z999AA10123456784")]);
        let logger = RecordingLogger::default();
        let job = ShippingKpiJob::new(tracker, store, &logger);

        let mut config = config(JobVariant::CarrierPickup);
        let summary = job.execute(&mut config, run_start()).await.unwrap();

        assert_eq!(summary.updated_po_numbers, vec!["PO-1"]);
        assert_eq!(
            *job.store.updates.borrow(),
            vec![(
                "PO".to_string(),
                "PO-1".to_string(),
                "Carrier Pickup".to_string(),
                "01/02/2024 10:15".to_string()
            )]
        );
        assert!(
            logger
                .debugs()
                .iter()
                .any(|m| m.starts_with("PO PO-1 has been picked up on"))
        );
        assert_eq!(config.last_run, run_start());
        assert_eq!(summary.watermark, run_start());
    }

    #[tokio::test]
    async fn delivery_variant_writes_two_day_kpi() {
        let tracker = FakeTracker::default().with(
            "123456789012",
            &[
                ("Picked up", "2024-01-01T12:00:00Z"),
                ("Delivered", "2024-01-03T00:00:00Z"),
            ],
        );
        let store = FakeStore::with_records(vec![shipment("rec1", "PO-9", "123456789012")]);
        let job = ShippingKpiJob::new(tracker, store, RecordingLogger::default());

        let mut config = config(JobVariant::DeliveryKpi);
        let summary = job.execute(&mut config, run_start()).await.unwrap();

        assert_eq!(summary.updated(), 1);
        let updates = job.store.updates.borrow();
        assert_eq!(updates[0].2, "Diff in Req'd vs Ship Date");
        assert_eq!(updates[0].3, "2 days, 0:00:00");

        let queries = job.store.queries.borrow();
        assert!(queries[0].formula.contains("{Diff in Req'd vs Ship Date}=''"));
        assert!(queries[0].formula.contains("DATETIME_PARSE('01/01/2024')"));
    }

    #[tokio::test]
    async fn unknown_tracking_format_skips_only_that_record() {
        let tracker = FakeTracker::default()
            .with("1Z111", &[("Origin scan", "2024-01-02T10:00:00Z")])
            .with("222222222222", &[("Picked up", "2024-01-03T11:00:00Z")]);
        let store = FakeStore::with_records(vec![
            shipment("rec1", "PO-1", "1Z111"),
            shipment("rec2", "PO-2", "NOT-A-NUMBER"),
            shipment("rec3", "PO-3", "222222222222"),
        ]);
        let logger = RecordingLogger::default();
        let job = ShippingKpiJob::new(tracker, store, &logger);

        let mut config = config(JobVariant::CarrierPickup);
        let summary = job.execute(&mut config, run_start()).await.unwrap();

        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.updated_po_numbers, vec!["PO-1", "PO-3"]);
        assert_eq!(summary.lookup_failed, 1);
        assert_eq!(
            logger.errors(),
            vec!["PO PO-2: unknown tracking number format: NOT-A-NUMBER"]
        );
        assert_eq!(config.last_run, run_start());
    }

    #[tokio::test]
    async fn tracking_api_outage_skips_record_and_advances_watermark() {
        let tracker = FakeTracker::default()
            .unavailable("1Z111", 503)
            .with("222222222222", &[("Picked up", "2024-01-03T11:00:00Z")]);
        let store = FakeStore::with_records(vec![
            shipment("rec1", "PO-1", "1Z111"),
            shipment("rec2", "PO-2", "222222222222"),
        ]);
        let logger = RecordingLogger::default();
        let job = ShippingKpiJob::new(tracker, store, &logger);

        let mut config = config(JobVariant::CarrierPickup);
        let summary = job.execute(&mut config, run_start()).await.unwrap();

        assert_eq!(summary.lookup_failed, 1);
        assert_eq!(summary.updated_po_numbers, vec!["PO-2"]);
        assert_eq!(
            *job.tracker.lookups.borrow(),
            vec!["1Z111".to_string(), "222222222222".to_string()]
        );
        assert_eq!(
            logger.errors(),
            vec!["PO PO-1: ShipIt API error (status 503): service unavailable"]
        );
        assert_eq!(job.store.updates.borrow().len(), 1);
        assert_eq!(config.last_run, run_start());
        assert_eq!(summary.watermark, run_start());
    }

    #[tokio::test]
    async fn record_without_relevant_event_is_skipped() {
        let tracker = FakeTracker::default()
            .with("1Z111", &[("Delivered", "2024-01-05T00:00:00Z")])
            .with("123456789012", &[("In transit", "2024-01-02T00:00:00Z")]);
        let store = FakeStore::with_records(vec![
            shipment("rec1", "PO-1", "1Z111"),
            shipment("rec2", "PO-2", "123456789012"),
        ]);
        let job = ShippingKpiJob::new(tracker, store, RecordingLogger::default());

        let mut config = config(JobVariant::CarrierPickup);
        let summary = job.execute(&mut config, run_start()).await.unwrap();

        assert_eq!(summary.no_event, 2);
        assert!(job.store.updates.borrow().is_empty());
        assert_eq!(config.last_run, run_start());
    }

    #[tokio::test]
    async fn invalid_records_are_isolated() {
        let tracker = FakeTracker::default().with("1Z111", &[("Delivered", "2024-01-05T00:00:00Z")]);
        let store = FakeStore::with_records(vec![
            record("rec1", json!({"PO": "PO-1"})),
            record("rec2", json!({"PO": "PO-2", "Tracking Number": "1Z111"})),
        ]);
        let logger = RecordingLogger::default();
        let job = ShippingKpiJob::new(tracker, store, &logger);

        let mut config = config(JobVariant::DeliveryKpi);
        let summary = job.execute(&mut config, run_start()).await.unwrap();

        assert_eq!(summary.invalid, 2);
        assert_eq!(summary.updated(), 0);
        assert_eq!(logger.errors().len(), 2);
        assert!(logger.errors()[1].contains("no requested ship date"));
    }

    #[tokio::test]
    async fn rerun_without_new_records_is_a_no_op() {
        let job = ShippingKpiJob::new(
            FakeTracker::default(),
            FakeStore::default(),
            RecordingLogger::default(),
        );
        let mut config = config(JobVariant::CarrierPickup);
        config.last_run = run_start();

        let summary = job.execute(&mut config, run_start()).await.unwrap();

        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.updated(), 0);
        assert!(job.store.updates.borrow().is_empty());
        assert!(job.tracker.lookups.borrow().is_empty());
        assert_eq!(config.last_run, run_start());
    }

    #[tokio::test]
    async fn pages_are_walked_with_configured_limit() {
        let tracker = FakeTracker::default();
        let store = FakeStore::with_records(vec![
            shipment("rec1", "PO-1", "1Z1"),
            shipment("rec2", "PO-2", "1Z2"),
            shipment("rec3", "PO-3", "1Z3"),
        ]);
        let job = ShippingKpiJob::new(tracker, store, RecordingLogger::default());

        let mut config = config(JobVariant::CarrierPickup);
        config.page_size = 1;
        let summary = job.execute(&mut config, run_start()).await.unwrap();

        assert_eq!(summary.fetched, 3);
        assert_eq!(job.store.list_calls.get(), 3);
        assert_eq!(*job.tracker.lookups.borrow(), vec!["1Z1", "1Z2", "1Z3"]);
    }

    #[tokio::test]
    async fn store_failure_aborts_without_advancing_watermark() {
        let store = FakeStore {
            fail_listing: true,
            ..FakeStore::default()
        };
        let job = ShippingKpiJob::new(FakeTracker::default(), store, RecordingLogger::default());
        let mut config = config(JobVariant::CarrierPickup);
        let before = config.last_run;

        let err = job.execute(&mut config, run_start()).await.unwrap_err();
        assert!(matches!(err, JobError::Store(StoreError::Api { status: 500, .. })));
        assert_eq!(config.last_run, before);
    }

    #[tokio::test]
    async fn record_not_found_on_update_is_fatal() {
        let tracker = FakeTracker::default().with("1Z111", &[("Origin scan", "2024-01-02T10:00:00Z")]);
        let store = FakeStore {
            records: vec![shipment("rec1", "PO-1", "1Z111")],
            missing_po: Some("PO-1".into()),
            ..FakeStore::default()
        };
        let job = ShippingKpiJob::new(tracker, store, RecordingLogger::default());
        let mut config = config(JobVariant::CarrierPickup);
        let before = config.last_run;

        let err = job.execute(&mut config, run_start()).await.unwrap_err();
        assert!(matches!(err, JobError::Store(StoreError::RecordNotFound { .. })));
        assert_eq!(config.last_run, before);
    }

    #[tokio::test]
    async fn watermark_never_moves_backwards() {
        let job = ShippingKpiJob::new(
            FakeTracker::default(),
            FakeStore::default(),
            RecordingLogger::default(),
        );
        let mut config = config(JobVariant::CarrierPickup);
        let future = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        config.last_run = future;

        let summary = job.execute(&mut config, run_start()).await.unwrap();
        assert_eq!(config.last_run, future);
        assert_eq!(summary.watermark, future);
    }
}
