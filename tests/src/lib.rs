//! Shared harness for the HTTP and storage integration tests.

pub mod fixtures;
pub mod setup;
