use leafdoc_core::{PredictionResult, Severity, TopK};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            message: "ML backend is running".to_string(),
        }
    }
}

/// `image` is optional at the type level so a missing field maps to a 400, not a
/// deserialization rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub disease: String,
    pub confidence: f32,
    pub severity: Severity,
    pub cause: String,
    pub cure: String,
    pub all_predictions: TopK,
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            disease: result.label,
            confidence: result.confidence,
            severity: result.severity,
            cause: result.cause,
            cure: result.cure,
            all_predictions: result.top_k,
        }
    }
}
