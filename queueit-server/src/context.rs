use std::sync::Arc;

use queueit_collab::{CatalogProvider, Coordinator};

use crate::sse::ServerSentEvents;

#[derive(Clone)]
pub struct ServerContext {
    pub coordinator: Arc<Coordinator>,
    pub catalog: Arc<dyn CatalogProvider>,
    pub sse: Arc<ServerSentEvents>,
}
