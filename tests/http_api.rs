use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

use smart_mining::constants::CHAIN_MODEL_NAME;
use smart_mining::inference::ModelContext;
use smart_mining::pipeline::storage::InMemoryStorage;
use smart_mining::server::{create_server, AppState};

fn app_with(model: ModelContext) -> (axum::Router, Arc<InMemoryStorage>) {
    let storage = Arc::new(InMemoryStorage::new());
    let state = AppState::new(storage.clone(), Arc::new(model));
    (create_server(state), storage)
}

fn ready_model() -> ModelContext {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/resources/models");
    ModelContext::load(dir, CHAIN_MODEL_NAME)
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(field: &str, csv: &str) -> Request<Body> {
    let boundary = "smp-test-boundary";
    let csv = csv.trim_end();
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"forages.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/forages/upload-csv")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_service() {
    let (app, _) = app_with(ModelContext::empty(CHAIN_MODEL_NAME));
    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn csv_upload_then_list_and_fetch() {
    let (app, _) = app_with(ModelContext::empty(CHAIN_MODEL_NAME));

    let (status, report) = send(&app, multipart_request("file", "X,Y,Z,Teneur%\n1,2,3,4.5\n4,5,6,oops\n")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["rows_received"], 2);
    assert_eq!(report["rows_inserted"], 1);
    assert_eq!(report["rows_dropped"], 1);
    assert_eq!(report["next_available_id"], 2);

    let (status, listed) = send(&app, get("/forages?limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, one) = send(&app, get("/forages/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["teneur"], 4.5);

    let (status, missing) = send(&app, get("/forages/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(missing["detail"].as_str().unwrap().contains("42"));
}

#[tokio::test]
async fn upload_accepts_first_field_when_not_named_file() {
    let (app, storage) = app_with(ModelContext::empty(CHAIN_MODEL_NAME));

    let (status, _) = send(&app, multipart_request("upload", "x;y;z;teneur\n1;2;3;0.5\n")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(smart_mining::pipeline::Storage::count(storage.as_ref()).await.unwrap(), 1);
}

#[tokio::test]
async fn schema_error_is_bad_request_with_detail() {
    let (app, _) = app_with(ModelContext::empty(CHAIN_MODEL_NAME));

    let (status, body) = send(&app, multipart_request("file", "x,y,teneur\n1,2,3\n")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Missing required columns: z_coord");
}

#[tokio::test]
async fn bulk_json_records_are_ingested() {
    let (app, _) = app_with(ModelContext::empty(CHAIN_MODEL_NAME));

    let records = json!([
        {"id": 3, "x": 1.0, "y": 2.0, "z": 3.0, "teneur": 0.7},
        {"x": "4", "y": "5", "z": "6", "teneur": "1.1"},
        {"x": 7.0, "y": null, "z": 9.0, "teneur": 2.0}
    ]);
    let (status, report) = send(&app, json_request("POST", "/forages/bulk", records)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["rows_received"], 3);
    assert_eq!(report["rows_inserted"], 2);
    assert_eq!(report["rows_dropped"], 1);

    let (status, body) = send(&app, json_request("POST", "/forages/bulk", json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn predict_without_artifacts_is_unavailable() {
    let (app, _) = app_with(ModelContext::empty(CHAIN_MODEL_NAME));

    let point = json!({"x_coord": 1.0, "y_coord": 2.0, "z_coord": 3.0});
    let (status, body) = send(&app, json_request("POST", "/predict", point)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let detail = body["detail"].as_str().unwrap();
    for file in ["poly.json", "scaler.json", "pca.json", "knn.json"] {
        assert!(detail.contains(file), "{detail}");
    }
}

#[tokio::test]
async fn predict_with_loaded_chain() {
    let (app, _) = app_with(ready_model());

    let point = json!({"x_coord": 10.0, "y_coord": 20.0, "z_coord": 5.0});
    let (status, body) = send(&app, json_request("POST", "/predict", point)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], CHAIN_MODEL_NAME);
    assert!((body["predicted_teneur"].as_f64().unwrap() - 0.9169474529258366).abs() < 1e-9);

    let (status, status_body) = send(&app, get("/model/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_body["ready"], true);
}

#[tokio::test]
async fn baseline_route_is_separate_from_chain() {
    let (app, _) = app_with(ModelContext::empty(CHAIN_MODEL_NAME));
    let point = json!({"x_coord": 0.0, "y_coord": 0.0, "z_coord": 0.0});

    let (status, _) = send(&app, json_request("POST", "/predict/baseline", point.clone())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    send(&app, multipart_request("file", "x,y,z,teneur\n0,0,0,1\n0,0,1,3\n")).await;
    let (status, body) = send(&app, json_request("POST", "/predict/baseline", point)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_teneur"], 2.0);
    assert_eq!(body["model"], "baseline_mean");
}

#[tokio::test]
async fn malformed_json_bodies_get_detail_responses() {
    let (app, _) = app_with(ready_model());

    let missing_field = json!({"x_coord": 1.0, "y_coord": 2.0});
    let (status, body) = send(&app, json_request("POST", "/predict", missing_field)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("z_coord"));

    let not_json = Request::builder()
        .method("POST")
        .uri("/predict/baseline")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{x_coord: 1"))
        .unwrap();
    let (status, body) = send(&app, not_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, body) = send(&app, json_request("POST", "/forages/bulk", json!({"x": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn bulk_ids_beyond_float_precision_are_kept_exactly() {
    let (app, _) = app_with(ModelContext::empty(CHAIN_MODEL_NAME));

    let body = r#"[{"id": 9007199254740993, "x": 1, "y": 2, "z": 3, "teneur": 0.5}]"#;
    let request = Request::builder()
        .method("POST")
        .uri("/forages/bulk")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    let (status, report) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["rows_inserted"], 1);

    let (status, stored) = send(&app, get("/forages/9007199254740993")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["id"].as_i64(), Some(9007199254740993));
    let (status, _) = send(&app, get("/forages/9007199254740992")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
