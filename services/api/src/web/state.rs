//! services/api/src/web/state.rs
//!
//! Defines the application's shared state. Every handler receives it explicitly;
//! there is no global auth or profile state.

use crate::config::Config;
use devlingo_core::ports::{AuthService, CompletionRecorder, CurriculumStore, ProfileStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<dyn AuthService>,
    pub profiles: Arc<dyn ProfileStore>,
    pub curriculum: Arc<dyn CurriculumStore>,
    pub recorder: Arc<dyn CompletionRecorder>,
}
