//! Grade prediction: the fixed four-stage transform chain and the mean baseline.

pub mod artifacts;
pub mod baseline;
pub mod chain;
pub mod context;

pub use artifacts::{
    KNeighborsRegressor, NeighborWeights, Pca, PolynomialFeatures, Regressor, StandardScaler, Transform,
    TransformError,
};
pub use baseline::{mean_grade, predict_baseline};
pub use chain::TransformChain;
pub use context::{ArtifactStatus, ModelContext, ModelStatus};

use serde::Serialize;
use std::fmt;

use crate::constants::{artifact_file_name, ARTIFACT_KNN, ARTIFACT_PCA, ARTIFACT_POLY, ARTIFACT_SCALER};

/// One stage of the prediction chain, named after its artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Poly,
    Scaler,
    Pca,
    Knn,
}

impl Stage {
    /// Execution order. Never reordered.
    pub const ORDER: [Stage; 4] = [Stage::Poly, Stage::Scaler, Stage::Pca, Stage::Knn];

    pub fn artifact_name(self) -> &'static str {
        match self {
            Stage::Poly => ARTIFACT_POLY,
            Stage::Scaler => ARTIFACT_SCALER,
            Stage::Pca => ARTIFACT_PCA,
            Stage::Knn => ARTIFACT_KNN,
        }
    }

    pub fn file_name(self) -> String {
        artifact_file_name(self.artifact_name())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.artifact_name())
    }
}
