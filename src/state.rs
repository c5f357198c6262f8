//! Shared state handed to every HTTP handler.

use std::sync::Arc;

use crate::services::{
    polling_controller::PollingController, session::SessionProvider,
    status_synchronizer::StatusSynchronizer,
};

#[derive(Clone)]
pub struct AppState {
    pub poller: PollingController,
    pub sessions: Arc<dyn SessionProvider>,
}

impl AppState {
    pub fn new(poller: PollingController, sessions: Arc<dyn SessionProvider>) -> Self {
        Self { poller, sessions }
    }

    pub fn synchronizer(&self) -> &StatusSynchronizer {
        self.poller.synchronizer()
    }
}
