//! Leafdoc API
//!
//! Axum routes in front of a shared [`leafdoc_core::InferenceService`]:
//!
//! - `GET /health`  fixed liveness payload
//! - `GET /debug`   model and catalog introspection
//! - `POST /predict` `{ "image": "<base64>" }` to a disease prediction
//!
//! ```rust,ignore
//! let state = ApiState::new(Arc::new(service));
//! let app = api_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod router;
pub mod types;

pub use error::ApiError;
pub use router::{ApiState, DEFAULT_BODY_LIMIT, api_router};
pub use types::{HealthResponse, PredictRequest, PredictResponse};
