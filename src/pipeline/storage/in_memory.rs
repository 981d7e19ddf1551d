use super::Storage;
use crate::error::{GradeError, Result};
use crate::types::Measurement;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// In-memory storage implementation for development/testing
#[derive(Clone)]
pub struct InMemoryStorage {
    forages: Arc<Mutex<BTreeMap<i64, Measurement>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            forages: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Pre-populate the store, e.g. for tests that need existing identifiers.
    pub fn with_measurements(rows: Vec<Measurement>) -> Self {
        let forages = rows.into_iter().map(|m| (m.id, m)).collect();
        Self {
            forages: Arc::new(Mutex::new(forages)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<i64, Measurement>>> {
        self.forages
            .lock()
            .map_err(|_| GradeError::Storage("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn existing_ids(&self) -> Result<HashSet<i64>> {
        Ok(self.lock()?.keys().copied().collect())
    }

    async fn insert_batch(&self, rows: &[Measurement]) -> Result<()> {
        let mut forages = self.lock()?;

        // Mirror the primary-key constraint: check everything before writing anything
        let mut batch_ids = HashSet::with_capacity(rows.len());
        for row in rows {
            if forages.contains_key(&row.id) || !batch_ids.insert(row.id) {
                return Err(GradeError::StoreWrite(format!(
                    "UNIQUE constraint failed: forages.id ({})",
                    row.id
                )));
            }
        }

        for row in rows {
            forages.insert(row.id, row.clone());
        }

        debug!("Inserted {} forages", rows.len());
        Ok(())
    }

    async fn all_grades(&self) -> Result<Vec<f64>> {
        Ok(self.lock()?.values().map(|m| m.teneur).collect())
    }

    async fn list_measurements(&self, limit: usize) -> Result<Vec<Measurement>> {
        Ok(self.lock()?.values().take(limit).cloned().collect())
    }

    async fn get_measurement(&self, id: i64) -> Result<Option<Measurement>> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(id: i64, teneur: f64) -> Measurement {
        Measurement {
            id,
            x_coord: 1.0,
            y_coord: 2.0,
            z_coord: 3.0,
            teneur,
        }
    }

    #[tokio::test]
    async fn conflicting_batch_leaves_store_untouched() {
        let store = InMemoryStorage::with_measurements(vec![m(1, 0.5)]);

        let err = store.insert_batch(&[m(2, 0.1), m(1, 0.2)]).await.unwrap_err();
        assert!(matches!(err, GradeError::StoreWrite(_)));
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get_measurement(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_ids_inside_one_batch_are_rejected() {
        let store = InMemoryStorage::new();
        assert!(store.insert_batch(&[m(4, 0.1), m(4, 0.2)]).await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn listing_is_ordered_and_limited() {
        let store = InMemoryStorage::new();
        store.insert_batch(&[m(3, 0.3), m(1, 0.1), m(2, 0.2)]).await.unwrap();

        let listed: Vec<i64> = store.list_measurements(2).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(listed, vec![1, 2]);
        assert_eq!(store.all_grades().await.unwrap(), vec![0.1, 0.2, 0.3]);
        assert_eq!(store.existing_ids().await.unwrap(), HashSet::from([1, 2, 3]));
    }
}
