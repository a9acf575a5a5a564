use std::sync::Arc;

use murmur_store::Store;

use crate::auth::TokenAuthenticator;
use crate::config::ServerConfig;
use crate::locks::RecordLocks;
use crate::pipeline::NotificationPipeline;
use crate::presence::PresenceRegistry;
use crate::router::EventRouter;

/// Everything a handler needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn Store>,
    pub auth: Arc<TokenAuthenticator>,
    pub registry: PresenceRegistry,
    pub router: EventRouter,
    pub pipeline: NotificationPipeline,
    /// Serialises friend and membership edits per user and group.
    pub locks: RecordLocks,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<dyn Store>) -> Self {
        let auth = Arc::new(TokenAuthenticator::new(
            config.session_secret,
            config.session_ttl_hours,
        ));
        let registry = PresenceRegistry::new();
        let router = EventRouter::new(registry.clone());
        let pipeline = NotificationPipeline::new(store.clone(), router.clone());
        Self {
            config: Arc::new(config),
            store,
            auth,
            registry,
            router,
            pipeline,
            locks: RecordLocks::new(),
        }
    }
}
