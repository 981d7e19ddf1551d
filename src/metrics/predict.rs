//! Prediction Phase Metrics

use crate::error::GradeError;
use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct PredictMetrics;

impl PredictMetrics {
    pub fn record_success(model: &str, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "predict", "requests"), "model" => model.to_string()).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "predict", "duration_seconds"), "model" => model.to_string())
            .record(duration_secs);
    }

    pub fn record_failure(error: &GradeError) {
        ::metrics::counter!(phase_metric!(counter, "predict", "failures"), "kind" => error.kind()).increment(1);
    }
}

impl PhaseMetrics for PredictMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "predict", "requests"));
        let _ = counter!(phase_metric!(counter, "predict", "failures"));
        let _ = histogram!(phase_metric!(histogram, "predict", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "predict"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "predict", "requests"),
                metric_type: MetricType::Counter,
                help: "Successful predictions by model",
                labels: vec!["model"],
            },
            MetricDoc {
                name: phase_metric!(counter, "predict", "failures"),
                metric_type: MetricType::Counter,
                help: "Failed predictions by error kind",
                labels: vec!["kind"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "predict", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time spent producing one prediction",
                labels: vec!["model"],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documentation_uses_phase_prefix() {
        let docs = PredictMetrics::metrics_documentation();
        assert_eq!(docs.len(), 3);
        assert!(docs.iter().all(|d| d.name.starts_with("smp_predict_")));
    }
}
