//! Router tests for the inference HTTP surface
//!
//! These drive the axum router in-process with a stub classifier, so no model file is needed.
//!
//! Run: cargo test --package leafdoc-api --test router_tests

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgb, RgbImage};
use leafdoc_api::{ApiState, api_router};
use leafdoc_core::{
    ClassCatalog, ClassRecord, Classifier, Error, ImageTensor, InferenceService, ModelInfo,
    Preprocessor,
};
use serde_json::{Value, json};
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

const CLASSES: [&str; 5] = [
    "Healthy",
    "Powdery Mildew",
    "Leaf Spot",
    "Root Rot",
    "Bacterial Blight",
];

/// Softmax over per-channel means, so the answer depends on the pixels.
struct ChannelMeans;

impl Classifier for ChannelMeans {
    fn info(&self) -> ModelInfo {
        ModelInfo {
            input_shape: vec![1, 160, 160, 3],
            output_shape: vec![1, CLASSES.len()],
        }
    }

    fn predict(&self, input: &ImageTensor) -> leafdoc_core::Result<Vec<f32>> {
        let mut sums = [0f32; 3];
        for (i, v) in input.array().iter().enumerate() {
            sums[i % 3] += v;
        }
        let pixels = (160 * 160) as f32 * 255.0;
        let [r, g, b] = sums.map(|s| s / pixels);
        let logits = [g * 4.0, r * 4.0, b * 4.0, (r + b) * 1.5, 0.1];
        let max = logits.iter().cloned().fold(f32::MIN, f32::max);
        let exp: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f32 = exp.iter().sum();
        Ok(exp.into_iter().map(|e| e / total).collect())
    }
}

/// Ways a forward pass can go wrong inside the blocking task.
enum Failure {
    Error,
    NanScores,
    Panic,
}

struct Broken(Failure);

impl Classifier for Broken {
    fn info(&self) -> ModelInfo {
        ChannelMeans.info()
    }

    fn predict(&self, _input: &ImageTensor) -> leafdoc_core::Result<Vec<f32>> {
        match self.0 {
            Failure::Error => Err(Error::Inference("forward pass exploded".into())),
            Failure::NanScores => Ok(vec![0.2, f32::NAN, 0.3, 0.1, 0.4]),
            Failure::Panic => panic!("tensor kernel panicked"),
        }
    }
}

fn app_with(classifier: Arc<dyn Classifier>) -> Router {
    let catalog = ClassCatalog::new(
        CLASSES
            .iter()
            .map(|name| ClassRecord {
                name: name.to_string(),
                cause: format!("{name} is caused by something"),
                cure: format!("Treat {name} carefully"),
            })
            .collect(),
    )
    .unwrap();
    let service = InferenceService::new(classifier, catalog, Preprocessor::default()).unwrap();
    api_router(ApiState::new(Arc::new(service)))
}

fn app() -> Router {
    app_with(Arc::new(ChannelMeans))
}

fn png_base64(color: [u8; 3]) -> String {
    let img = RgbImage::from_pixel(64, 48, Rgb(color));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    STANDARD.encode(buf)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn post_json(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_always_healthy() {
    let (status, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn debug_reports_catalog_and_model() {
    let (status, body) = send(&app(), get("/debug")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["num_classes"], CLASSES.len());
    assert_eq!(body["model_output_shape"], json!([1, CLASSES.len()]));
    assert_eq!(body["model_input_shape"], json!([1, 160, 160, 3]));
    assert_eq!(body["classes"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn predict_returns_full_contract() {
    let app = app();
    let (status, body) = send(&app, post_json(json!({ "image": png_base64([10, 230, 20]) }))).await;
    assert_eq!(status, StatusCode::OK);

    let disease = body["disease"].as_str().unwrap();
    assert_eq!(disease, "Healthy");
    assert!(CLASSES.contains(&disease));

    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));
    assert!(["mild", "moderate", "severe"].contains(&body["severity"].as_str().unwrap()));
    assert_eq!(body["cause"], "Healthy is caused by something");
    assert_eq!(body["cure"], "Treat Healthy carefully");

    let all = body["all_predictions"].as_object().unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn all_predictions_are_sorted_and_headed_by_disease() {
    let app = app();
    let payload = png_base64([200, 30, 120]);
    let raw = send(&app, post_json(json!({ "image": payload })))
        .await
        .1;

    // serde_json::Map does not keep insertion order; read the raw pairs back in rank order.
    let response = app
        .clone()
        .oneshot(post_json(json!({ "image": payload })))
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let section = &text[text.find("\"all_predictions\"").unwrap()..];

    let mut ranked: Vec<(usize, &str, f64)> = raw["all_predictions"]
        .as_object()
        .unwrap()
        .iter()
        .map(|(label, score)| {
            let pos = section.find(&format!("\"{label}\"")).unwrap();
            (pos, label.as_str(), score.as_f64().unwrap())
        })
        .collect();
    ranked.sort_by_key(|(pos, _, _)| *pos);

    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].1, raw["disease"].as_str().unwrap());
    assert!(ranked[0].2 >= ranked[1].2 && ranked[1].2 >= ranked[2].2);
    assert_eq!(ranked[0].2, raw["confidence"].as_f64().unwrap());
}

#[tokio::test]
async fn identical_images_give_identical_responses() {
    let app = app();
    let payload = png_base64([90, 90, 200]);
    let first = send(&app, post_json(json!({ "image": payload }))).await;
    let second = send(&app, post_json(json!({ "image": payload }))).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn missing_image_is_bad_request() {
    let (status, body) = send(&app(), post_json(json!({ "picture": "abc" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image provided");
    assert!(body.get("disease").is_none());
}

#[tokio::test]
async fn non_json_body_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("image=abc"))
        .unwrap();
    let (status, body) = send(&app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn bad_images_fail_without_taking_the_service_down() {
    let app = app();

    let (status, body) = send(&app, post_json(json!({ "image": "@@not-base64@@" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("base64"));

    let garbage = STANDARD.encode(b"these bytes are not a jpeg");
    let (status, body) = send(&app, post_json(json!({ "image": garbage }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("disease").is_none());

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = send(&app, post_json(json!({ "image": png_base64([1, 2, 3]) }))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let catalog = ClassCatalog::new(
        CLASSES
            .iter()
            .map(|name| ClassRecord {
                name: name.to_string(),
                cause: String::new(),
                cure: String::new(),
            })
            .collect(),
    )
    .unwrap();
    let service =
        InferenceService::new(Arc::new(ChannelMeans), catalog, Preprocessor::default()).unwrap();
    let app = api_router(ApiState::new(Arc::new(service)).with_body_limit(1024));

    let (status, _) = send(&app, post_json(json!({ "image": "A".repeat(4096) }))).await;
    assert!(status.is_client_error());
}

async fn assert_internal_error(app: &Router, expected: &str) {
    let (status, body) = send(app, post_json(json!({ "image": png_base64([40, 160, 40]) }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains(expected), "unexpected error text: {message}");
    assert!(body.get("disease").is_none());

    let (status, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn inference_failure_is_internal_error() {
    let app = app_with(Arc::new(Broken(Failure::Error)));
    assert_internal_error(&app, "forward pass exploded").await;
}

#[tokio::test]
async fn non_finite_scores_are_internal_error() {
    let app = app_with(Arc::new(Broken(Failure::NanScores)));
    assert_internal_error(&app, "not finite").await;
}

#[tokio::test]
async fn panicking_model_is_internal_error() {
    let app = app_with(Arc::new(Broken(Failure::Panic)));
    assert_internal_error(&app, "prediction task failed").await;
    // The same router keeps serving after the panic.
    assert_internal_error(&app, "prediction task failed").await;
}
