use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Payload was not valid base64 or the bytes are not a decodable raster image
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// Predicted label has no catalog record
    #[error("no catalog entry for predicted class '{0}'")]
    MetadataMissing(String),
    /// Forward pass failed or produced unusable scores
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("failed to load model '{path}': {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("failed to load class catalog '{path}': {reason}")]
    CatalogLoad { path: String, reason: String },
    #[error("invalid class catalog: {0}")]
    InvalidCatalog(String),
    #[error("class catalog has {catalog} entries but the model outputs {model} scores")]
    ClassCountMismatch { catalog: usize, model: usize },
}

impl Error {
    /// Stable short name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidImage(_) => "invalid_image",
            Error::MetadataMissing(_) => "metadata_missing",
            Error::Inference(_) => "inference",
            Error::ModelLoad { .. } => "model_load",
            Error::CatalogLoad { .. } => "catalog_load",
            Error::InvalidCatalog(_) => "invalid_catalog",
            Error::ClassCountMismatch { .. } => "class_count_mismatch",
        }
    }
}
