//! Leafdoc core
//!
//! Everything needed to turn an encoded leaf photo into a disease prediction:
//!
//! - [`catalog`]: the ordered class table (name, cause, cure) loaded from JSON
//! - [`preprocess`]: base64 / image decoding and the fixed resize-to-tensor pipeline
//! - [`model`]: the [`Classifier`] seam, an ONNX backed implementation and the demo variant
//! - [`prediction`]: argmax, top-k and severity derivation
//! - [`service`]: the immutable [`InferenceService`] shared by every request
//!
//! ```rust,ignore
//! let catalog = ClassCatalog::from_path("plant_disease.json")?;
//! let preprocessor = Preprocessor::default();
//! let classifier = TractClassifier::load("models/plant_model.onnx", preprocessor.input_size())?;
//! let service = InferenceService::new(Arc::new(classifier), catalog, preprocessor)?;
//! let result = service.predict_base64(&payload)?;
//! ```

pub mod catalog;
pub mod error;
pub mod model;
pub mod prediction;
pub mod preprocess;
pub mod service;

pub use catalog::{ClassCatalog, ClassRecord};
pub use error::{Error, Result};
pub use model::{Classifier, DemoClassifier, ModelInfo, TractClassifier};
pub use prediction::{PredictionResult, Severity, TOP_K, TopK};
pub use preprocess::{ImageTensor, InputSize, PixelScale, Preprocessor, ResizeFilter};
pub use service::{DebugInfo, InferenceService};
