//! Application state shared across request handlers.

use std::sync::Arc;

use crate::subscriber::Readiness;
use crate::view::ActorView;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    view: ActorView,
    readiness: Readiness,
    enable_test_module: bool,
}

impl AppState {
    pub fn new(view: ActorView, readiness: Readiness, enable_test_module: bool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                view,
                readiness,
                enable_test_module,
            }),
        }
    }

    /// Read handle onto the aggregated actor view.
    pub fn view(&self) -> &ActorView {
        &self.inner.view
    }

    pub fn readiness(&self) -> &Readiness {
        &self.inner.readiness
    }

    pub fn test_module_enabled(&self) -> bool {
        self.inner.enable_test_module
    }
}
