// Canonical column names
pub const COL_ID: &str = "id";
pub const COL_X: &str = "x_coord";
pub const COL_Y: &str = "y_coord";
pub const COL_Z: &str = "z_coord";
pub const COL_TENEUR: &str = "teneur";

// Artifact names, in chain order
pub const ARTIFACT_POLY: &str = "poly";
pub const ARTIFACT_SCALER: &str = "scaler";
pub const ARTIFACT_PCA: &str = "pca";
pub const ARTIFACT_KNN: &str = "knn";

pub const ARTIFACT_EXTENSION: &str = "json";

// Model names reported with predictions
pub const CHAIN_MODEL_NAME: &str = "poly_scaler_pca_knn";
pub const BASELINE_MODEL_NAME: &str = "baseline_mean";

// Listing limits for GET /forages
pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 1000;

/// File name an artifact is loaded from, e.g. `poly.json`.
pub fn artifact_file_name(artifact: &str) -> String {
    format!("{artifact}.{ARTIFACT_EXTENSION}")
}
