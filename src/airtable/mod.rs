pub mod client;
pub mod error;
pub mod formula;
pub mod types;

pub use client::{AirtableClient, ShipmentStore};
pub use error::StoreError;
pub use types::ShipmentRecord;
