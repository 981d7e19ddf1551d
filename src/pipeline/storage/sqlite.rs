use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

use super::Storage;
use crate::error::{GradeError, Result};
use crate::types::Measurement;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS forages (
        id       INTEGER PRIMARY KEY,
        x_coord  REAL NOT NULL,
        y_coord  REAL NOT NULL,
        z_coord  REAL NOT NULL,
        teneur   REAL NOT NULL
    );
"#;

/// SQLite-backed store. One connection, serialised behind a mutex; every
/// batch insert runs inside a single transaction.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        info!("Opened forage store at {}", db_path.display());
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GradeError::Storage("sqlite connection lock poisoned".to_string()))
    }

    fn write_batch(conn: &mut Connection, rows: &[Measurement]) -> rusqlite::Result<()> {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO forages (id, x_coord, y_coord, z_coord, teneur) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for row in rows {
                stmt.execute(params![row.id, row.x_coord, row.y_coord, row.z_coord, row.teneur])?;
            }
        }
        // Dropping an uncommitted transaction rolls it back
        tx.commit()
    }
}

fn measurement_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Measurement> {
    Ok(Measurement {
        id: row.get(0)?,
        x_coord: row.get(1)?,
        y_coord: row.get(2)?,
        z_coord: row.get(3)?,
        teneur: row.get(4)?,
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn existing_ids(&self) -> Result<HashSet<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM forages")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<HashSet<i64>>>()?;
        Ok(ids)
    }

    async fn insert_batch(&self, rows: &[Measurement]) -> Result<()> {
        let mut conn = self.lock()?;
        Self::write_batch(&mut conn, rows).map_err(|e| {
            error!("Batch insert of {} forages rolled back: {}", rows.len(), e);
            GradeError::StoreWrite(e.to_string())
        })?;
        debug!("Inserted {} forages", rows.len());
        Ok(())
    }

    async fn all_grades(&self) -> Result<Vec<f64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT teneur FROM forages")?;
        let grades = stmt
            .query_map([], |row| row.get::<_, f64>(0))?
            .collect::<rusqlite::Result<Vec<f64>>>()?;
        Ok(grades)
    }

    async fn list_measurements(&self, limit: usize) -> Result<Vec<Measurement>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, x_coord, y_coord, z_coord, teneur FROM forages ORDER BY id LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], measurement_from_row)?
            .collect::<rusqlite::Result<Vec<Measurement>>>()?;
        Ok(rows)
    }

    async fn get_measurement(&self, id: i64) -> Result<Option<Measurement>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, x_coord, y_coord, z_coord, teneur FROM forages WHERE id = ?1",
                params![id],
                measurement_from_row,
            )
            .optional()?;
        Ok(row)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM forages", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn m(id: i64) -> Measurement {
        Measurement {
            id,
            x_coord: id as f64,
            y_coord: 0.5,
            z_coord: -12.0,
            teneur: 1.25,
        }
    }

    #[tokio::test]
    async fn batch_round_trips_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("forages.db");

        {
            let store = SqliteStorage::open(&path).unwrap();
            store.insert_batch(&[m(1), m(5)]).await.unwrap();
        }

        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        assert_eq!(reopened.get_measurement(5).await.unwrap(), Some(m(5)));
        assert_eq!(reopened.existing_ids().await.unwrap(), HashSet::from([1, 5]));
    }

    #[tokio::test]
    async fn primary_key_violation_rolls_back_whole_batch() {
        let store = SqliteStorage::open_in_memory().unwrap();
        store.insert_batch(&[m(2)]).await.unwrap();

        let err = store.insert_batch(&[m(3), m(4), m(2)]).await.unwrap_err();
        assert!(matches!(err, GradeError::StoreWrite(_)));
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get_measurement(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_respects_limit_and_order() {
        let store = SqliteStorage::open_in_memory().unwrap();
        store.insert_batch(&[m(9), m(1), m(4)]).await.unwrap();

        let ids: Vec<i64> = store.list_measurements(2).await.unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(store.all_grades().await.unwrap().len(), 3);
    }
}
