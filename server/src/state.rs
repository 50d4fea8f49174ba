use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::staging::Staging;
use crate::storage::{MeiliStore, TicketStore, UserStore};

pub struct AppState {
    pub config: Config,
    pub staging: Staging,
    pub tickets: Arc<dyn TicketStore>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        info!("Connecting to document store at {}", config.meili_url);
        let store = Arc::new(
            MeiliStore::connect(&config.meili_url, config.meili_key.as_deref())
                .await
                .expect("Document store misconfigured!"),
        );

        Self::with_stores(config, store.clone(), store)
    }

    /// Builds a state around externally constructed stores; tests run the
    /// full router against an in-memory store this way.
    pub fn with_stores(
        config: Config,
        tickets: Arc<dyn TicketStore>,
        users: Arc<dyn UserStore>,
    ) -> Arc<Self> {
        let staging = Staging::new(&config.staging_dir);

        Arc::new(Self {
            config,
            staging,
            tickets,
            users,
        })
    }
}
