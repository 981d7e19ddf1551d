//! Loaded artifact set shared read-only across requests.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use super::artifacts::{KNeighborsRegressor, Pca, PolynomialFeatures, StandardScaler};
use super::chain::TransformChain;
use super::Stage;
use crate::error::{GradeError, Result};
use crate::metrics::PredictMetrics;
use crate::types::{FeaturePoint, Prediction};

/// Load outcome of one artifact file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactStatus {
    pub name: String,
    pub file: String,
    pub exists: bool,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Snapshot reported by `GET /model/status` and `model-status`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub model: String,
    pub dir: String,
    pub ready: bool,
    pub loaded_at: DateTime<Utc>,
    pub missing: Vec<String>,
    pub artifacts: Vec<ArtifactStatus>,
}

pub struct ModelContext {
    dir: PathBuf,
    model_name: String,
    poly: Option<PolynomialFeatures>,
    scaler: Option<StandardScaler>,
    pca: Option<Pca>,
    knn: Option<KNeighborsRegressor>,
    statuses: Vec<ArtifactStatus>,
    loaded_at: DateTime<Utc>,
}

fn load_artifact<T: DeserializeOwned>(dir: &Path, stage: Stage) -> (Option<T>, ArtifactStatus) {
    let file = stage.file_name();
    let path = dir.join(&file);
    let mut status = ArtifactStatus {
        name: stage.artifact_name().to_string(),
        file,
        exists: path.is_file(),
        loaded: false,
        error: None,
        sha256: None,
    };

    if !status.exists {
        warn!("Artifact {} not found at {}", stage, path.display());
        status.error = Some("file not found".to_string());
        return (None, status);
    }

    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) => {
            warn!("Artifact {} unreadable: {}", stage, e);
            status.error = Some(e.to_string());
            return (None, status);
        }
    };
    status.sha256 = Some(hex::encode(Sha256::digest(&bytes)));

    match serde_json::from_slice::<T>(&bytes) {
        Ok(artifact) => {
            status.loaded = true;
            (Some(artifact), status)
        }
        Err(e) => {
            warn!("Artifact {} failed to load: {}", stage, e);
            status.error = Some(e.to_string());
            (None, status)
        }
    }
}

impl ModelContext {
    /// Load every artifact from `dir`. Never fails as a whole: each artifact
    /// reports its own status and a partial set simply is not ready.
    pub fn load(dir: impl AsRef<Path>, model_name: impl Into<String>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let (poly, poly_status) = load_artifact::<PolynomialFeatures>(&dir, Stage::Poly);
        let (scaler, scaler_status) = load_artifact::<StandardScaler>(&dir, Stage::Scaler);
        let (pca, pca_status) = load_artifact::<Pca>(&dir, Stage::Pca);
        let (knn, knn_status) = load_artifact::<KNeighborsRegressor>(&dir, Stage::Knn);

        let ctx = Self {
            dir,
            model_name: model_name.into(),
            poly,
            scaler,
            pca,
            knn,
            statuses: vec![poly_status, scaler_status, pca_status, knn_status],
            loaded_at: Utc::now(),
        };

        if ctx.is_ready() {
            info!("Model '{}' ready from {}", ctx.model_name, ctx.dir.display());
        } else {
            warn!(
                "Model '{}' unavailable, missing: {}",
                ctx.model_name,
                ctx.missing_artifacts().join(", ")
            );
        }
        ctx
    }

    /// A context with no artifacts; every chain prediction is unavailable.
    pub fn empty(model_name: impl Into<String>) -> Self {
        let statuses = Stage::ORDER
            .iter()
            .map(|stage| ArtifactStatus {
                name: stage.artifact_name().to_string(),
                file: stage.file_name(),
                exists: false,
                loaded: false,
                error: None,
                sha256: None,
            })
            .collect();
        Self {
            dir: PathBuf::new(),
            model_name: model_name.into(),
            poly: None,
            scaler: None,
            pca: None,
            knn: None,
            statuses,
            loaded_at: Utc::now(),
        }
    }

    /// Build from artifacts already in memory.
    pub fn from_artifacts(
        model_name: impl Into<String>,
        poly: PolynomialFeatures,
        scaler: StandardScaler,
        pca: Pca,
        knn: KNeighborsRegressor,
    ) -> Self {
        let mut ctx = Self::empty(model_name);
        for status in &mut ctx.statuses {
            status.exists = true;
            status.loaded = true;
        }
        ctx.poly = Some(poly);
        ctx.scaler = Some(scaler);
        ctx.pca = Some(pca);
        ctx.knn = Some(knn);
        ctx
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn statuses(&self) -> &[ArtifactStatus] {
        &self.statuses
    }

    pub fn is_ready(&self) -> bool {
        self.poly.is_some() && self.scaler.is_some() && self.pca.is_some() && self.knn.is_some()
    }

    /// File names of every artifact that is absent or failed to load, in
    /// chain order.
    pub fn missing_artifacts(&self) -> Vec<String> {
        let present = [
            self.poly.is_some(),
            self.scaler.is_some(),
            self.pca.is_some(),
            self.knn.is_some(),
        ];
        Stage::ORDER
            .iter()
            .zip(present)
            .filter(|(_, loaded)| !loaded)
            .map(|(stage, _)| stage.file_name())
            .collect()
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            model: self.model_name.clone(),
            dir: self.dir.display().to_string(),
            ready: self.is_ready(),
            loaded_at: self.loaded_at,
            missing: self.missing_artifacts(),
            artifacts: self.statuses.clone(),
        }
    }

    /// The full chain, or `PipelineUnavailable` naming every missing file.
    pub fn chain(&self) -> Result<TransformChain<'_>> {
        match (&self.poly, &self.scaler, &self.pca, &self.knn) {
            (Some(poly), Some(scaler), Some(pca), Some(knn)) => Ok(TransformChain { poly, scaler, pca, knn }),
            _ => Err(GradeError::PipelineUnavailable {
                missing: self.missing_artifacts(),
            }),
        }
    }

    pub fn predict(&self, point: FeaturePoint) -> Result<Prediction> {
        let started = Instant::now();
        let result = self.chain().and_then(|chain| chain.predict(point));

        match result {
            Ok(value) => {
                PredictMetrics::record_success(&self.model_name, started.elapsed().as_secs_f64());
                Ok(Prediction {
                    predicted_value: value,
                    model_name: self.model_name.clone(),
                })
            }
            Err(e) => {
                PredictMetrics::record_failure(&e);
                Err(e)
            }
        }
    }
}
