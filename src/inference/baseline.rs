use std::time::Instant;

use crate::constants::BASELINE_MODEL_NAME;
use crate::error::{GradeError, Result};
use crate::metrics::PredictMetrics;
use crate::pipeline::storage::Storage;
use crate::types::{FeaturePoint, Prediction};

/// Arithmetic mean of the stored grades.
pub fn mean_grade(grades: &[f64]) -> Result<f64> {
    if grades.is_empty() {
        return Err(GradeError::NoBaselineData);
    }
    Ok(grades.iter().sum::<f64>() / grades.len() as f64)
}

/// Mean-grade prediction. The point is accepted for symmetry with the chain
/// but does not influence the result.
pub async fn predict_baseline(storage: &dyn Storage, _point: FeaturePoint) -> Result<Prediction> {
    let started = Instant::now();
    let result = match storage.all_grades().await {
        Ok(grades) => mean_grade(&grades),
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => {
            PredictMetrics::record_success(BASELINE_MODEL_NAME, started.elapsed().as_secs_f64());
            Ok(Prediction {
                predicted_value: value,
                model_name: BASELINE_MODEL_NAME.to_string(),
            })
        }
        Err(e) => {
            PredictMetrics::record_failure(&e);
            Err(e)
        }
    }
}
