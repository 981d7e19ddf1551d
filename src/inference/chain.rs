use ndarray::Array1;
use tracing::debug;

use super::artifacts::{KNeighborsRegressor, Pca, PolynomialFeatures, Regressor, StandardScaler, Transform};
use super::Stage;
use crate::error::{GradeError, Result};
use crate::types::FeaturePoint;

/// The four fitted artifacts, borrowed from a loaded `ModelContext`.
///
/// `poly → scaler → pca → knn`, each stage consuming the previous output.
#[derive(Debug, Clone, Copy)]
pub struct TransformChain<'a> {
    pub poly: &'a PolynomialFeatures,
    pub scaler: &'a StandardScaler,
    pub pca: &'a Pca,
    pub knn: &'a KNeighborsRegressor,
}

fn stage_failure(stage: Stage) -> impl Fn(super::TransformError) -> GradeError {
    move |e| GradeError::TransformFailure {
        stage,
        reason: e.to_string(),
    }
}

impl<'a> TransformChain<'a> {
    pub fn predict(&self, point: FeaturePoint) -> Result<f64> {
        let input = Array1::from(point.to_vec());

        let i1 = self.poly.transform(input.view()).map_err(stage_failure(Stage::Poly))?;
        let i2 = self.scaler.transform(i1.view()).map_err(stage_failure(Stage::Scaler))?;
        let i3 = self.pca.transform(i2.view()).map_err(stage_failure(Stage::Pca))?;
        let value = self.knn.predict(i3.view()).map_err(stage_failure(Stage::Knn))?;

        debug!(
            poly_width = i1.len(),
            pca_width = i3.len(),
            value,
            "Transform chain evaluated"
        );
        Ok(value)
    }
}
