use std::sync::Arc;

use wrench_core::Dispatcher;
use wrench_mcp_runtime::McpServer;

use crate::auth::AuthPolicy;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub mcp: McpServer,
    pub auth: AuthPolicy,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, auth: AuthPolicy) -> Self {
        Self {
            mcp: McpServer::new(dispatcher.clone()),
            dispatcher,
            auth,
        }
    }
}
