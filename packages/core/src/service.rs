//! # Inference service
//! Immutable per-process context: classifier, catalog and preprocessing settings.
//! Built once at startup, then shared read-only by every request.

use crate::catalog::ClassCatalog;
use crate::error::{Error, Result};
use crate::model::Classifier;
use crate::prediction::{PredictionResult, Severity, TOP_K, TopK, argmax, top_k_indices};
use crate::preprocess::{ImageTensor, Preprocessor};
use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;

const DEBUG_CLASS_SAMPLE: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub model_loaded: bool,
    pub model_input_shape: Vec<usize>,
    pub model_output_shape: Vec<usize>,
    pub num_classes: usize,
    pub classes: Vec<String>,
    pub model_path: Option<String>,
}

#[derive(Clone)]
pub struct InferenceService {
    classifier: Arc<dyn Classifier>,
    catalog: ClassCatalog,
    preprocessor: Preprocessor,
    model_path: Option<String>,
}

impl InferenceService {
    /// Fails when the model's output space and the catalog disagree, so a mismatch is
    /// caught at startup rather than on the first request.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        catalog: ClassCatalog,
        preprocessor: Preprocessor,
    ) -> Result<Self> {
        let model = classifier.info().num_outputs();
        if model != catalog.len() {
            return Err(Error::ClassCountMismatch {
                catalog: catalog.len(),
                model,
            });
        }
        if catalog.len() < TOP_K {
            return Err(Error::InvalidCatalog(format!(
                "at least {TOP_K} classes are required, found {}",
                catalog.len()
            )));
        }

        Ok(Self {
            classifier,
            catalog,
            preprocessor,
            model_path: None,
        })
    }

    pub fn with_model_path(mut self, path: impl Into<String>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    pub fn debug_info(&self) -> DebugInfo {
        let info = self.classifier.info();
        DebugInfo {
            model_loaded: true,
            model_input_shape: info.input_shape,
            model_output_shape: info.output_shape,
            num_classes: self.catalog.len(),
            classes: self
                .catalog
                .names()
                .take(DEBUG_CLASS_SAMPLE)
                .map(str::to_string)
                .collect(),
            model_path: self.model_path.clone(),
        }
    }

    pub fn predict_base64(&self, payload: &str) -> Result<PredictionResult> {
        let tensor = self.preprocessor.tensor_from_base64(payload)?;
        self.classify(&tensor)
    }

    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let tensor = self.preprocessor.tensor_from_bytes(bytes)?;
        self.classify(&tensor)
    }

    pub fn predict_image(&self, image: &DynamicImage) -> Result<PredictionResult> {
        self.classify(&self.preprocessor.tensor_from_image(image))
    }

    pub fn classify(&self, tensor: &ImageTensor) -> Result<PredictionResult> {
        let scores = self.classifier.predict(tensor)?;
        self.interpret(&scores)
    }

    /// Turns a raw score vector into the response contract.
    pub fn interpret(&self, scores: &[f32]) -> Result<PredictionResult> {
        if scores.len() != self.catalog.len() {
            return Err(Error::Inference(format!(
                "model returned {} scores for {} classes",
                scores.len(),
                self.catalog.len()
            )));
        }
        if let Some(bad) = scores.iter().position(|s| !s.is_finite()) {
            return Err(Error::Inference(format!(
                "score at index {bad} is not finite"
            )));
        }

        let index = argmax(scores).ok_or_else(|| Error::Inference("empty score vector".into()))?;
        let confidence = scores[index];
        let label = self
            .catalog
            .get(index)
            .map(|r| r.name.clone())
            .ok_or_else(|| Error::MetadataMissing(format!("class index {index}")))?;
        let record = self
            .catalog
            .lookup(&label)
            .ok_or_else(|| Error::MetadataMissing(label.clone()))?;

        let mut top_k = Vec::with_capacity(TOP_K);
        for i in top_k_indices(scores, TOP_K) {
            let name = self
                .catalog
                .get(i)
                .ok_or_else(|| Error::MetadataMissing(format!("class index {i}")))?;
            top_k.push((name.name.clone(), scores[i]));
        }

        Ok(PredictionResult {
            index,
            confidence,
            severity: Severity::from_confidence(confidence),
            cause: record.cause.clone(),
            cure: record.cure.clone(),
            top_k: TopK(top_k),
            label,
        })
    }
}
