//! Gateway 应用状态

use std::sync::Arc;

use crate::library::ProvocationLibrary;
use crate::relay::ProvocationRelay;

/// Gateway 应用状态
#[derive(Clone)]
pub struct AppState {
    relay: Arc<ProvocationRelay>,
    library: Arc<ProvocationLibrary>,
}

impl AppState {
    pub fn new(relay: ProvocationRelay, library: ProvocationLibrary) -> Self {
        Self {
            relay: Arc::new(relay),
            library: Arc::new(library),
        }
    }

    pub fn relay(&self) -> &ProvocationRelay {
        &self.relay
    }

    pub fn library(&self) -> &ProvocationLibrary {
        &self.library
    }
}
