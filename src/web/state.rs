use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    config::AppConfig,
    store::{MySqlStore, Store},
};

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.upload.static_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to ensure static directory at {}",
                    config.upload.static_dir.display()
                )
            })?;

        let store = MySqlStore::connect(&config)
            .await
            .context("failed to initialise MySQL store")?;

        Ok(Self::with_store(config, Arc::new(store)))
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn Store>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }
}

#[cfg(test)]
pub(crate) fn test_state(static_dir: &std::path::Path) -> (AppState, Arc<crate::store::memory::MemoryStore>) {
    let store = Arc::new(crate::store::memory::MemoryStore::default());
    let state = AppState::with_store(crate::config::test_config(static_dir), store.clone());
    (state, store)
}
