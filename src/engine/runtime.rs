//! Owned tokio runtime for the async drivers.
//!
//! Sessions are synchronous; each network session owns a current-thread
//! runtime and blocks on its driver futures.

use tokio::runtime::{Builder, Runtime};

use crate::error::{CompatError, Result};

pub(crate) fn current_thread(engine: &str) -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CompatError::engine_error(engine, format!("Failed to start runtime: {e}")))
}
