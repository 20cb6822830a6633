use std::sync::Arc;

use cl_domain::config::Config;

use crate::broker::EventBroker;
use crate::runtime::{AgentRuntime, Session};

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub broker: Arc<EventBroker>,
    pub session: Arc<Session>,
    pub runtime: Arc<AgentRuntime>,
}
