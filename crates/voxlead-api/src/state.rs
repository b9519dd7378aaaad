//! Shared application state for request handlers.

use std::sync::Arc;

use voxlead_core::Clock;
use voxlead_ingest::IngestPipeline;

/// State shared across all HTTP handlers.
///
/// The pipeline arrives fully wired with its collaborators, so handlers
/// stay free of storage concerns and tests can inject in-memory backends.
#[derive(Clone)]
pub struct AppState {
    /// The ingestion pipeline.
    pub pipeline: Arc<IngestPipeline>,

    /// Shared webhook secret; `None` enables the permissive
    /// skip-verification mode.
    pub webhook_secret: Option<String>,

    /// Clock used for the signature replay window.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates handler state over a wired pipeline.
    pub fn new(
        pipeline: Arc<IngestPipeline>,
        webhook_secret: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { pipeline, webhook_secret, clock }
    }
}
