pub mod client;
pub mod error;
pub mod types;

pub use client::{ShipItClient, TrackingSource};
pub use error::TrackingError;
