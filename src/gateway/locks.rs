use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per table name, created on first use and dropped again
/// once nobody holds or waits on it.
///
/// Holding the guard serializes header-mutating sequences for that table
/// within this process; other tables proceed independently.
#[derive(Debug, Default)]
pub struct TableLocks {
    map: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, table: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
            // The map's own clone is the only reference left on an idle lock.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(table.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Tables with a live lock entry.
    pub fn len(&self) -> usize {
        self.map.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
