//! Registration of all phase metrics, with early conflict detection.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::ingest::IngestMetrics>(&mut all_metrics);
    register_phase_metrics::<super::predict::PredictMetrics>(&mut all_metrics);

    info!("Registered {} metrics across all phases", all_metrics.len());
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<String, MetricDoc>) {
    T::register_metrics();
    for problem in catalog_phase_docs(T::phase_name(), T::metrics_documentation(), all_metrics) {
        warn!("{}", problem);
    }
}

/// Add a phase's documented metrics to the catalog. Returns one message per
/// name that is already taken or that carries another phase's prefix.
fn catalog_phase_docs(
    phase_name: &str,
    docs: Vec<MetricDoc>,
    all_metrics: &mut HashMap<String, MetricDoc>,
) -> Vec<String> {
    let mut problems = Vec::new();
    for doc in docs {
        let owner = phase_of_metric(doc.name);
        if owner != phase_name {
            problems.push(format!(
                "Metric '{}' registered by phase '{}' is named for phase '{}'",
                doc.name, phase_name, owner
            ));
        }
        if all_metrics.contains_key(doc.name) {
            problems.push(format!("Metric name conflict: '{}' redefined by phase '{}'", doc.name, phase_name));
        } else {
            debug!("  - {} ({:?}): {}", doc.name, doc.metric_type, doc.help);
            all_metrics.insert(doc.name.to_string(), doc);
        }
    }
    problems
}

/// e.g. "smp_ingest_rows_dropped_total" -> "ingest"
fn phase_of_metric(metric_name: &str) -> &str {
    metric_name
        .strip_prefix("smp_")
        .and_then(|rest| rest.split('_').next())
        .unwrap_or("unknown")
}
