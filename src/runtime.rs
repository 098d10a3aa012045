//! Execution context for the hosted API clients
//!
//! The HTTP clients are async, while every pipeline call is synchronous and
//! runs on the calling thread. The context owns a current-thread runtime that
//! is created once, on first use, and reused for every subsequent call.

use crate::error::{QueryError, Result};
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Runtime};

/// Lazily initialised single-threaded runtime.
///
/// One instance is built at startup and shared (by `Arc`) between the
/// embedding provider and the generator. It must not be driven from inside
/// another async runtime.
#[derive(Default)]
pub struct ExecutionContext {
    runtime: OnceLock<Runtime>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the runtime has already been created.
    pub fn is_ready(&self) -> bool {
        self.runtime.get().is_some()
    }

    /// Create the runtime if it does not exist yet. Idempotent.
    pub fn ensure_ready(&self) -> Result<&Runtime> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }

        tracing::debug!("Creating current-thread runtime for API clients");
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| QueryError::io(e, "Failed to create async runtime"))?;

        // A concurrent initialiser may have won; either runtime is equivalent.
        Ok(self.runtime.get_or_init(|| runtime))
    }

    /// Run a future to completion on the calling thread.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        let runtime = self.ensure_ready()?;
        Ok(runtime.block_on(future))
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("ready", &self.is_ready())
            .finish()
    }
}
