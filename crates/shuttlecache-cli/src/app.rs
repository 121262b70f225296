//! Per-invocation wiring: config, store, connectivity and the clients
//! built on top of them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use shuttlecache_core::{
    ApiClient, Config, Connectivity, DataManager, Store, SyncConfig, SyncManager,
};

pub struct App {
    pub config: Config,
    pub store: Arc<Mutex<Store>>,
    pub connectivity: Connectivity,
    json: bool,
}

impl App {
    pub fn open(config: Config, data_dir: Option<PathBuf>, offline: bool, json: bool) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => Config::data_dir()?,
        };
        debug!(dir = %data_dir.display(), "Opening store");
        let store = Store::open(data_dir.clone())
            .with_context(|| format!("Failed to open store in {}", data_dir.display()))?;

        let online = !(offline || config.offline_mode);
        Ok(Self {
            config,
            store: Arc::new(Mutex::new(store)),
            connectivity: Connectivity::new(online),
            json,
        })
    }

    pub fn client(&self) -> Result<ApiClient> {
        ApiClient::new(self.config.endpoint().unwrap_or_default(), self.connectivity.clone())
    }

    pub fn data_manager(&self) -> Result<DataManager> {
        Ok(DataManager::new(self.store.clone(), self.client()?)
            .with_fallback_facility(self.config.default_facility.clone()))
    }

    /// The sync manager, or `None` when no endpoint is configured. Check-ins
    /// still queue without one.
    pub fn sync_manager(&self) -> Option<SyncManager> {
        match self.client() {
            Ok(client) => Some(SyncManager::new(
                self.store.clone(),
                Arc::new(client),
                self.connectivity.clone(),
                SyncConfig::default(),
            )),
            Err(e) => {
                warn!(error = %e, "Sync unavailable");
                None
            }
        }
    }

    pub fn json(&self) -> bool {
        self.json
    }

    /// Print `value` as JSON when `--json` is set, otherwise run `human`.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }
}
