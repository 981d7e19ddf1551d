use std::path::PathBuf;

use smart_mining::constants::CHAIN_MODEL_NAME;
use smart_mining::error::GradeError;
use smart_mining::inference::{ModelContext, Stage};
use smart_mining::types::FeaturePoint;

fn fixture_models() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/resources/models")
}

fn copy_fixtures(names: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        std::fs::copy(fixture_models().join(name), dir.path().join(name)).unwrap();
    }
    dir
}

#[test]
fn fixture_chain_matches_reference_value() {
    let ctx = ModelContext::load(fixture_models(), CHAIN_MODEL_NAME);
    assert!(ctx.is_ready(), "missing: {:?}", ctx.missing_artifacts());

    let prediction = ctx.predict(FeaturePoint::new(10.0, 20.0, 5.0)).unwrap();

    // poly → [1, 10, 20, 5, 100, 200, 50, 400, 100, 25]
    // scaler → [0, .5, .5, .5, .2, .2, .4, .1, .2, .5]
    // pca → [0.52, 0.48]; nearest fitted points 1 and 0, inverse-distance weighted
    assert!((prediction.predicted_value - 0.9169474529258366).abs() < 1e-9);
    assert_eq!(prediction.model_name, CHAIN_MODEL_NAME);
}

#[test]
fn identical_inputs_give_identical_outputs() {
    let ctx = ModelContext::load(fixture_models(), CHAIN_MODEL_NAME);
    let point = FeaturePoint::new(-3.5, 12.25, 80.0);

    let first = ctx.predict(point).unwrap();
    let second = ctx.predict(point).unwrap();
    assert_eq!(first, second);
}

#[test]
fn every_missing_artifact_is_named() {
    let dir = copy_fixtures(&["poly.json", "pca.json"]);
    let ctx = ModelContext::load(dir.path(), CHAIN_MODEL_NAME);

    match ctx.predict(FeaturePoint::new(1.0, 1.0, 1.0)).unwrap_err() {
        GradeError::PipelineUnavailable { missing } => {
            assert_eq!(missing, vec!["scaler.json".to_string(), "knn.json".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn mismatched_artifact_fails_at_its_stage() {
    let dir = copy_fixtures(&["poly.json", "scaler.json", "knn.json"]);
    // Three-wide projection where the scaler emits ten features
    std::fs::write(
        dir.path().join("pca.json"),
        r#"{"mean": [0.0, 0.0, 0.0], "components": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]}"#,
    )
    .unwrap();

    let ctx = ModelContext::load(dir.path(), CHAIN_MODEL_NAME);
    assert!(ctx.is_ready());

    match ctx.predict(FeaturePoint::new(1.0, 2.0, 3.0)).unwrap_err() {
        GradeError::TransformFailure { stage, reason } => {
            assert_eq!(stage, Stage::Pca);
            assert!(reason.contains("expected 3"), "{reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn status_reports_fingerprints_for_loaded_artifacts() {
    let ctx = ModelContext::load(fixture_models(), CHAIN_MODEL_NAME);
    let status = ctx.status();

    assert!(status.ready);
    assert!(status.missing.is_empty());
    let names: Vec<&str> = status.artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["poly", "scaler", "pca", "knn"]);
    assert!(status.artifacts.iter().all(|a| a.exists && a.loaded && a.sha256.is_some()));
}
