use std::sync::Arc;

use tokio::sync::RwLock;

use super::{
    broadcast::Hub,
    config::Config,
    error::ServerError,
    pages::Pages,
    storage::{Storage, TokenPolicy},
    utils::TokenHasher,
};

pub struct AppState {
    pub config: Config,
    pub storage: RwLock<Storage>,
    pub hub: Hub,
    pub pages: Pages,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, ServerError> {
        let hasher = TokenHasher::new(&config.secret_key)?;
        let storage = Storage::new(
            hasher,
            TokenPolicy {
                token_length: config.token_length,
                expire_buffer_minutes: config.token_expire_buffer_minutes,
            },
        );

        Ok(Arc::new(Self {
            config,
            storage: RwLock::new(storage),
            hub: Hub::new(),
            pages: Pages::new()?,
        }))
    }
}
