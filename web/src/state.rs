//! Application state for Axum handlers.

use conference_runtime::ConferenceService;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Every conference operation.
    pub service: ConferenceService,
}

impl AppState {
    /// Wrap a service.
    #[must_use]
    pub const fn new(service: ConferenceService) -> Self {
        Self { service }
    }
}
