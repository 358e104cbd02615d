use pulse_core::{Error, Result};
use std::fmt::Display;

/// Maps driver and pool errors into storage errors with a short context.
pub(crate) trait DbResultExt<T> {
    fn db_context(self, context: &str) -> Result<T>;
}

impl<T, E: Display> DbResultExt<T> for std::result::Result<T, E> {
    fn db_context(self, context: &str) -> Result<T> {
        self.map_err(|e| Error::database(format!("{context}: {e}")))
    }
}
