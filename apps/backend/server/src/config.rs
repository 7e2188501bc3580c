use leafdoc_core::{InputSize, PixelScale, Preprocessor, ResizeFilter};
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub model_path: String,
    pub catalog_path: String,
    pub input_size: InputSize,
    pub resize_filter: ResizeFilter,
    pub pixel_scale: PixelScale,
    /// Serve the canned demo classifier instead of loading a model file
    pub demo_mode: bool,
    /// Class the demo classifier favours
    pub demo_label: String,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Config {
            port: parse_or(&lookup, "PORT", 5000)?,
            model_path: lookup("MODEL_PATH")
                .unwrap_or_else(|| "models/plant_model.onnx".to_string()),
            catalog_path: lookup("CATALOG_PATH")
                .unwrap_or_else(|| "plant_disease.json".to_string()),
            input_size: InputSize {
                width: parse_or(&lookup, "MODEL_INPUT_WIDTH", 160)?,
                height: parse_or(&lookup, "MODEL_INPUT_HEIGHT", 160)?,
            },
            resize_filter: parse_or(&lookup, "RESIZE_FILTER", ResizeFilter::Nearest)?,
            pixel_scale: parse_or(&lookup, "PIXEL_SCALE", PixelScale::Raw)?,
            demo_mode: lookup("DEMO_MODE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            demo_label: lookup("DEMO_LABEL").unwrap_or_else(|| "Powdery Mildew".to_string()),
            max_body_bytes: parse_or(
                &lookup,
                "MAX_BODY_BYTES",
                leafdoc_api::DEFAULT_BODY_LIMIT,
            )?,
        })
        .and_then(Config::validate)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.input_size.width == 0 {
            return Err(ConfigError::InvalidValue("MODEL_INPUT_WIDTH".to_string()));
        }
        if self.input_size.height == 0 {
            return Err(ConfigError::InvalidValue("MODEL_INPUT_HEIGHT".to_string()));
        }
        Ok(self)
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.input_size, self.resize_filter, self.pixel_scale)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(var) => write!(f, "Invalid value for: {}", var),
        }
    }
}

impl std::error::Error for ConfigError {}
