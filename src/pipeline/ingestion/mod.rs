//! Pipeline ingestion: raw table intake and the end-to-end ingest call.
//!
//! `RawTable → ColumnNormalizer → RowCoercer → IdentityReconciler → Storage::insert_batch`

pub mod raw_table;

pub use raw_table::{RawRow, RawTable, RawValue};

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::error::{GradeError, Result};
use crate::metrics::IngestMetrics;
use crate::pipeline::processing::{ColumnNormalizer, IdentifierPool, IdentityReconciler, RowCoercer};
use crate::pipeline::storage::Storage;
use crate::types::IngestReport;

/// Runs one ingest call against a store. Holds no state between calls.
#[derive(Clone)]
pub struct Ingestor {
    storage: Arc<dyn Storage>,
    normalizer: ColumnNormalizer,
    coercer: RowCoercer,
    reconciler: IdentityReconciler,
}

impl Ingestor {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            normalizer: ColumnNormalizer::new(),
            coercer: RowCoercer::new(),
            reconciler: IdentityReconciler::new(),
        }
    }

    pub async fn ingest_csv(&self, bytes: &[u8]) -> Result<IngestReport> {
        let table = RawTable::from_csv_bytes(bytes).map_err(|e| {
            IngestMetrics::record_rejected_upload("unreadable");
            e
        })?;
        self.ingest(table).await
    }

    /// Normalize, coerce, reconcile and commit one table.
    ///
    /// A schema error aborts before the store is read. A store failure aborts
    /// with nothing persisted. Rows that fail coercion are dropped and counted.
    pub async fn ingest(&self, table: RawTable) -> Result<IngestReport> {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("ingest", batch = %batch_id, rows = table.len());
        self.ingest_inner(table).instrument(span).await
    }

    async fn ingest_inner(&self, table: RawTable) -> Result<IngestReport> {
        let started = Instant::now();

        let normalized = match self.normalizer.normalize_table(&table) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Rejecting upload: {}", e);
                IngestMetrics::record_rejected_upload("schema");
                return Err(e);
            }
        };

        let outcome = self.coercer.coerce(&normalized);
        let received = outcome.received;
        let dropped = outcome.dropped();
        if dropped > 0 {
            info!("Dropped {} of {} rows that failed numeric coercion", dropped, received);
        }

        let pool = IdentifierPool::seeded(self.storage.existing_ids().await?);
        let batch = match self.reconciler.reconcile(outcome.rows, pool) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Rejecting upload: {}", e);
                IngestMetrics::record_rejected_upload("identifier_space");
                return Err(e);
            }
        };

        if !batch.measurements.is_empty() {
            if let Err(e) = self.storage.insert_batch(&batch.measurements).await {
                error!("Ingest aborted, no rows persisted: {}", e);
                IngestMetrics::record_rejected_upload("store_write");
                return Err(match e {
                    GradeError::StoreWrite(_) => e,
                    other => GradeError::StoreWrite(other.to_string()),
                });
            }
        }

        let report = IngestReport {
            rows_received: received,
            rows_inserted: batch.measurements.len(),
            rows_dropped: dropped,
            duplicate_ids_handled: batch.duplicates_handled,
            next_available_id: batch.next_available_id,
        };

        IngestMetrics::record_batch(&report, started.elapsed().as_secs_f64());
        info!(
            inserted = report.rows_inserted,
            dropped = report.rows_dropped,
            duplicates = report.duplicate_ids_handled,
            next_id = ?report.next_available_id,
            "Ingest committed"
        );
        Ok(report)
    }
}
