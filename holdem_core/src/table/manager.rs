//! Table manager: the shared engine registry keyed by table id.
//!
//! Tables are created lazily on first join and live until their owning
//! tournament (if any) ends. The registry lock is held only for map
//! lookups; all table state is guarded by each table's actor inbox.

use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use super::actor::{TableActor, TableHandle};
use super::config::TableConfig;
use super::messages::TableEvent;
use crate::game::TableError;

#[derive(Clone)]
pub struct TableManager {
    tables: Arc<RwLock<HashMap<String, TableHandle>>>,
    defaults: TableConfig,
}

impl TableManager {
    pub fn new(defaults: TableConfig) -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            defaults,
        }
    }

    pub fn defaults(&self) -> &TableConfig {
        &self.defaults
    }

    pub async fn get(&self, table_id: &str) -> Option<TableHandle> {
        self.tables.read().await.get(table_id).cloned()
    }

    /// Fetch a table, creating it with the default configuration if it
    /// does not exist yet.
    pub async fn get_or_create(&self, table_id: &str) -> TableHandle {
        if let Some(handle) = self.get(table_id).await {
            return handle;
        }
        let mut tables = self.tables.write().await;
        if let Some(handle) = tables.get(table_id) {
            return handle.clone();
        }
        let handle = spawn_table(table_id, self.defaults.clone(), None);
        tables.insert(table_id.to_string(), handle.clone());
        info!("created table {table_id}");
        handle
    }

    /// Create a table with an explicit configuration, wired to an event
    /// sink (used by the tournament coordinator).
    pub async fn create_with(
        &self,
        table_id: &str,
        config: TableConfig,
        events: Option<mpsc::UnboundedSender<TableEvent>>,
    ) -> Result<TableHandle, TableError> {
        config.validate()?;
        let mut tables = self.tables.write().await;
        if tables.contains_key(table_id) {
            return Err(TableError::TableExists);
        }
        let handle = spawn_table(table_id, config, events);
        tables.insert(table_id.to_string(), handle.clone());
        info!("created table {table_id}");
        Ok(handle)
    }

    /// Close a table's actor and drop it from the registry.
    pub async fn close(&self, table_id: &str) {
        let handle = self.tables.write().await.remove(table_id);
        if let Some(handle) = handle {
            let _ = handle.close().await;
            info!("closed table {table_id}");
        }
    }

    pub async fn active_count(&self) -> usize {
        self.tables.read().await.len()
    }
}

fn spawn_table(
    table_id: &str,
    config: TableConfig,
    events: Option<mpsc::UnboundedSender<TableEvent>>,
) -> TableHandle {
    let (actor, handle) = TableActor::new(table_id, config, events);
    tokio::spawn(actor.run());
    handle
}
