//! PostgreSQL (TimescaleDB) storage for the ingestion service.
//!
//! Batches are bulk loaded with `COPY ... FROM STDIN BINARY`, one statement per
//! batch. Dashboard reads go through the [`MetricsStore`] trait against the
//! continuous aggregates created by [`schema::init_schema`].

pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod query;
pub mod schema;

mod error;

pub use client::*;
pub use config::*;
pub use query::*;
