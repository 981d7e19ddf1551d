//! Ingest Phase Metrics
//!
//! Row counts per committed batch and rejected uploads by reason.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use crate::types::IngestReport;

pub struct IngestMetrics;

impl IngestMetrics {
    /// Record a committed batch
    pub fn record_batch(report: &IngestReport, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "batches")).increment(1);
        ::metrics::counter!(phase_metric!(counter, "ingest", "rows_received")).increment(report.rows_received as u64);
        ::metrics::counter!(phase_metric!(counter, "ingest", "rows_inserted")).increment(report.rows_inserted as u64);
        ::metrics::counter!(phase_metric!(counter, "ingest", "rows_dropped")).increment(report.rows_dropped as u64);
        ::metrics::counter!(phase_metric!(counter, "ingest", "duplicate_ids"))
            .increment(report.duplicate_ids_handled as u64);
        ::metrics::histogram!(phase_metric!(histogram, "ingest", "duration_seconds")).record(duration_secs);
        if let Some(next_id) = report.next_available_id {
            ::metrics::gauge!(phase_metric!(gauge, "ingest", "next_available_id")).set(next_id as f64);
        }
    }

    /// Record an upload that persisted nothing
    pub fn record_rejected_upload(reason: &str) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "rejected_uploads"), "reason" => reason.to_string())
            .increment(1);
    }
}

impl PhaseMetrics for IngestMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "ingest", "batches"));
        let _ = counter!(phase_metric!(counter, "ingest", "rows_received"));
        let _ = counter!(phase_metric!(counter, "ingest", "rows_inserted"));
        let _ = counter!(phase_metric!(counter, "ingest", "rows_dropped"));
        let _ = counter!(phase_metric!(counter, "ingest", "duplicate_ids"));
        let _ = counter!(phase_metric!(counter, "ingest", "rejected_uploads"));

        let _ = histogram!(phase_metric!(histogram, "ingest", "duration_seconds"));

        let _ = gauge!(phase_metric!(gauge, "ingest", "next_available_id"));
    }

    fn phase_name() -> &'static str {
        "ingest"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "ingest", "batches"),
                metric_type: MetricType::Counter,
                help: "Total number of committed ingest batches",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "rows_received"),
                metric_type: MetricType::Counter,
                help: "Data rows read from uploads that reached the store",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "rows_inserted"),
                metric_type: MetricType::Counter,
                help: "Rows persisted to the forage store",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "rows_dropped"),
                metric_type: MetricType::Counter,
                help: "Rows dropped for failing numeric coercion",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "duplicate_ids"),
                metric_type: MetricType::Counter,
                help: "Rows whose identifier collided and was reassigned",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "rejected_uploads"),
                metric_type: MetricType::Counter,
                help: "Uploads rejected with nothing persisted",
                labels: vec!["reason"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "ingest", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of a committed ingest call",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "ingest", "next_available_id"),
                metric_type: MetricType::Gauge,
                help: "Next identifier the reconciler would assign after the last batch",
                labels: vec![],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        IngestMetrics::register_metrics();
        IngestMetrics::record_rejected_upload("schema");
    }

    #[test]
    fn documentation_uses_phase_prefix() {
        let docs = IngestMetrics::metrics_documentation();
        assert_eq!(docs.len(), 8);
        assert!(docs.iter().all(|d| d.name.starts_with("smp_ingest_")));
    }
}
