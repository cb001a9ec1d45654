//! HTTP surface of the relay: one JSON route that turns a request body into a
//! gateway send call.
//!
//! The route carries no authentication. The service is meant for a trusted
//! internal network; do not expose it publicly as-is.

use std::sync::Arc;

use pushqq_core::gateway::Gateway;

pub mod handlers;
pub mod router;

/// Shared state handed to every request handler.
///
/// `gateway` is `None` only before login has completed; handlers answer with a
/// distinct "not ready" error in that window instead of attempting a send.
#[derive(Clone, Default)]
pub struct AppState {
    pub gateway: Option<Arc<dyn Gateway>>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway: Some(gateway),
        }
    }
}
