#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use dotenv::dotenv;
use leafdoc_api::{ApiState, api_router};
use leafdoc_core::{ClassCatalog, Classifier, DemoClassifier, InferenceService, TractClassifier};
use std::sync::Arc;
use std::time::Instant;

mod config;
mod metrics;

/// Route template for metric labels, never the raw URI, so label cardinality stays bounded.
fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = route_label(&request);

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request(&method, &path, response.status().as_u16(), duration);

    response
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    metrics::init_telemetry()?;

    tracing::info!("Starting Leafdoc inference server");

    let config = config::Config::from_env()?;
    tracing::info!(
        "Loaded configuration: port={}, demo_mode={}, input={}x{}, filter={}",
        config.port,
        config.demo_mode,
        config.input_size.width,
        config.input_size.height,
        config.resize_filter
    );

    let service = build_service(&config)?;
    let debug_info = service.debug_info();
    tracing::info!(
        classes = debug_info.num_classes,
        output_shape = ?debug_info.model_output_shape,
        "Inference service ready"
    );

    let state = ApiState::new(Arc::new(service)).with_body_limit(config.max_body_bytes);
    let app = api_router(state)
        .route("/metrics", get(metrics::handler))
        .route_layer(middleware::from_fn(metrics_middleware));

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Loads the catalog and the classifier; any failure here aborts startup.
fn build_service(config: &config::Config) -> Result<InferenceService, leafdoc_core::Error> {
    let catalog = ClassCatalog::from_path(&config.catalog_path)?;
    let preprocessor = config.preprocessor();

    let classifier: Arc<dyn Classifier> = if config.demo_mode {
        tracing::warn!(label = %config.demo_label, "DEMO MODE: serving a fixed mock prediction");
        Arc::new(DemoClassifier::for_catalog(
            &catalog,
            &config.demo_label,
            preprocessor.input_size(),
        ))
    } else {
        Arc::new(TractClassifier::load(
            &config.model_path,
            preprocessor.input_size(),
        )?)
    };

    let service = InferenceService::new(classifier, catalog, preprocessor)?;
    Ok(if config.demo_mode {
        service
    } else {
        service.with_model_path(config.model_path.clone())
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    async fn echo_label(request: Request<Body>, next: Next) -> Response {
        let label = route_label(&request);
        let mut response = next.run(request).await;
        response
            .headers_mut()
            .insert("x-route", label.parse().unwrap());
        response
    }

    #[tokio::test]
    async fn labels_use_the_route_template() {
        let app = Router::new()
            .route("/items/{id}", get(|| async { "ok" }))
            .route_layer(middleware::from_fn(echo_label));

        for id in ["1", "42", "abc"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/items/{id}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["x-route"], "/items/{id}");
        }
    }

    #[test]
    fn requests_without_a_route_are_unmatched() {
        let request = Request::builder()
            .uri("/wp-login.php?x=1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&request), "unmatched");
    }
}
