//! Core types, enrichment and validation for the Product Pulse ingestion service.

pub mod duration;
pub mod enrich;
pub mod error;
pub mod events;
pub mod limits;

pub use enrich::*;
pub use error::{Error, Result};
pub use events::*;
