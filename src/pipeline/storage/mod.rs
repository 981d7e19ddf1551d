use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::Result;
use crate::types::Measurement;

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

/// Storage trait for persisted forage measurements
#[async_trait]
pub trait Storage: Send + Sync {
    /// Every identifier currently stored
    async fn existing_ids(&self) -> Result<HashSet<i64>>;

    /// Insert all rows or none. A failure leaves the store untouched and
    /// surfaces as `GradeError::StoreWrite`.
    async fn insert_batch(&self, rows: &[Measurement]) -> Result<()>;

    /// All stored `teneur` values, used by the baseline predictor
    async fn all_grades(&self) -> Result<Vec<f64>>;

    /// Up to `limit` measurements ordered by id
    async fn list_measurements(&self, limit: usize) -> Result<Vec<Measurement>>;

    async fn get_measurement(&self, id: i64) -> Result<Option<Measurement>>;

    async fn count(&self) -> Result<usize>;
}
