use std::sync::{Arc, Mutex};

use log::info;

use crate::billing::BillingCalculator;
use crate::configuration::{Config, StorageBackend};
use crate::error_handling::types::*;
use crate::session_management::SessionStore;
use crate::storage::{FileStorage, MemoryStorage, Storage};
use crate::web_interface::WebServer;

/// Wires configuration, storage and the session store together.
pub struct Controller {
    pub config: Config,
    store: Arc<Mutex<SessionStore>>,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        let storage = Self::build_storage(&config)?;
        let store = SessionStore::with_options(
            storage,
            config.storage_key.clone(),
            BillingCalculator::new(config.rate_per_hour),
        );
        info!(
            "Session store ready (key {:?}, rate {:.2}/h)",
            config.storage_key, config.rate_per_hour
        );
        Ok(Self {
            config,
            store: Arc::new(Mutex::new(store)),
        })
    }

    fn build_storage(config: &Config) -> Result<Arc<dyn Storage>, StorageError> {
        Ok(match config.storage_backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage, sessions will not survive a restart");
                Arc::new(MemoryStorage::new())
            }
            StorageBackend::File => match &config.storage_path {
                Some(path) => Arc::new(FileStorage::new(path)?),
                None => Arc::new(FileStorage::new_default()?),
            },
        })
    }

    /// Shared handle on the store, for the presentation layers.
    pub fn store(&self) -> Arc<Mutex<SessionStore>> {
        self.store.clone()
    }

    /// Serves the web interface until the process is stopped.
    pub async fn run(&self) -> Result<(), ControllerError> {
        info!(
            "Starting web interface on {}:{}",
            self.config.bind_address, self.config.web_ui_port
        );
        let server = WebServer::new(self.store.clone());
        server
            .start((self.config.bind_address, self.config.web_ui_port).into())
            .await?;
        Ok(())
    }
}
