use std::sync::Arc;

use crate::auth::AuthService;
use crate::clock::Clock;
use crate::config::Config;
use crate::store::Store;

/// Shared by every worker through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, auth: AuthService) -> Self {
        Self { store, auth }
    }

    pub fn from_config(config: &Config, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let auth = AuthService::from_config(config, Arc::clone(&store), clock);
        Self::new(store, auth)
    }
}
