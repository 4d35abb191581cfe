use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::events::EventPublisher;

/// Shared state behind the HTTP routes.
#[derive(Clone)]
pub struct AppState {
    /// Ingested events go here; the pipeline worker consumes the other end.
    pub publisher: Arc<dyn EventPublisher>,

    pub data_path: PathBuf,

    /// Cancelled once shutdown starts; `/ready` reports not ready from then on.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        data_path: impl Into<PathBuf>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            publisher,
            data_path: data_path.into(),
            shutdown,
        }
    }
}
