use std::sync::Arc;

use jigsaw_events::EventBus;
use jigsaw_imagegen::ImageGenerator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind `Arc` or is already a pool handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: jigsaw_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// In-process room change fan-out (SSE subscribers).
    pub event_bus: Arc<EventBus>,
    /// Configured image generation backend.
    pub generator: Arc<dyn ImageGenerator>,
}
