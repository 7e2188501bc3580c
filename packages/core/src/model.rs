//! # Classifier backends
//! The model is an opaque `tensor -> scores` function behind [`Classifier`].
//! [`TractClassifier`] runs an exported ONNX graph; [`DemoClassifier`] serves a canned answer.

use crate::catalog::ClassCatalog;
use crate::error::{Error, Result};
use crate::preprocess::{ImageTensor, InputSize};
use serde::Serialize;
use std::path::Path;
use tract_onnx::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
}

impl ModelInfo {
    /// Number of per-class scores in one output row (batch axis excluded).
    pub fn num_outputs(&self) -> usize {
        self.output_shape.iter().skip(1).product()
    }
}

/// Forward-pass-only image classifier.
///
/// Implementations are shared across request threads and must not mutate state in `predict`.
pub trait Classifier: Send + Sync {
    fn info(&self) -> ModelInfo;

    /// Per-class scores for a single-image batch, already normalized by the model.
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>>;
}

pub struct TractClassifier {
    plan: TypedRunnableModel<TypedModel>,
    info: ModelInfo,
}

impl TractClassifier {
    /// Loads an ONNX model and pins its first input to `[1, height, width, 3]` f32.
    pub fn load(path: impl AsRef<Path>, size: InputSize) -> Result<Self> {
        let path = path.as_ref();
        let load_error = |reason: String| Error::ModelLoad {
            path: path.display().to_string(),
            reason,
        };

        if !path.exists() {
            return Err(load_error("file does not exist".into()));
        }

        let [n, h, w, c] = size.tensor_shape();
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| {
                m.with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(n, h, w, c)))
            })
            .and_then(|m| m.into_optimized())
            .map_err(|e| load_error(format!("{e:#}")))?;

        let output_shape = model
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().map(|s| s.to_vec()))
            .ok_or_else(|| load_error("model output shape is not fully known".into()))?;

        let plan = model
            .into_runnable()
            .map_err(|e| load_error(format!("{e:#}")))?;

        let info = ModelInfo {
            input_shape: vec![n, h, w, c],
            output_shape,
        };
        tracing::info!(
            path = %path.display(),
            input_shape = ?info.input_shape,
            output_shape = ?info.output_shape,
            "Loaded ONNX model"
        );

        Ok(Self { plan, info })
    }
}

impl Classifier for TractClassifier {
    fn info(&self) -> ModelInfo {
        self.info.clone()
    }

    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        if input.shape() != self.info.input_shape.as_slice() {
            return Err(Error::Inference(format!(
                "input shape {:?} does not match model input {:?}",
                input.shape(),
                self.info.input_shape
            )));
        }

        let data = input
            .as_slice()
            .ok_or_else(|| Error::Inference("input tensor is not contiguous".into()))?;
        let tensor = Tensor::from_shape(input.shape(), data)
            .map_err(|e| Error::Inference(format!("{e:#}")))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| Error::Inference(format!("{e:#}")))?;

        let first = outputs
            .first()
            .ok_or_else(|| Error::Inference("model produced no outputs".into()))?;
        let scores = first
            .to_array_view::<f32>()
            .map_err(|e| Error::Inference(format!("output is not f32: {e:#}")))?;

        Ok(scores.iter().copied().collect())
    }
}

/// Demo variant: always answers with the same favoured class at 0.87 confidence.
pub struct DemoClassifier {
    scores: Vec<f32>,
    input_shape: Vec<usize>,
}

pub const DEMO_CONFIDENCE: f32 = 0.87;

impl DemoClassifier {
    pub fn new(num_classes: usize, favoured: usize, size: InputSize) -> Self {
        let favoured = if favoured < num_classes { favoured } else { 0 };
        let rest = if num_classes > 1 {
            (1.0 - DEMO_CONFIDENCE) / (num_classes - 1) as f32
        } else {
            0.0
        };
        let scores = (0..num_classes)
            .map(|i| if i == favoured { DEMO_CONFIDENCE } else { rest })
            .collect();

        Self {
            scores,
            input_shape: size.tensor_shape().to_vec(),
        }
    }

    /// Favours `label` when the catalog knows it, otherwise the first class.
    pub fn for_catalog(catalog: &ClassCatalog, label: &str, size: InputSize) -> Self {
        let favoured = catalog.index_of(label).unwrap_or_else(|| {
            tracing::warn!(label, "Demo label not in catalog, favouring the first class");
            0
        });
        Self::new(catalog.len(), favoured, size)
    }
}

impl Classifier for DemoClassifier {
    fn info(&self) -> ModelInfo {
        ModelInfo {
            input_shape: self.input_shape.clone(),
            output_shape: vec![1, self.scores.len()],
        }
    }

    fn predict(&self, _input: &ImageTensor) -> Result<Vec<f32>> {
        Ok(self.scores.clone())
    }
}
