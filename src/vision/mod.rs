//! Receipt field extraction via a vision-language model

mod client;
mod config;
mod loader;
mod prompt;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::naming::FieldMapping;

pub use client::GeminiClient;
pub use config::{ConfigError, GeminiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use loader::{is_supported_image, load_image, InlineImage, SUPPORTED_EXTENSIONS};
pub use prompt::{parse_fields, strip_code_fence, EXTRACTION_PROMPT};

/// Extraction failures; the batch records them as `Error Details`
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to open image {path:?}: {source}")]
    ReadImage {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to open image {path:?}: {source}")]
    UnknownFormat {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Gemini API request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gemini API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Gemini API returned no text")]
    EmptyResponse,
    #[error("Model reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Model reply is not a JSON object")]
    NotAnObject,
}

/// Turns one receipt image into a field mapping
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, image_path: &Path) -> Result<FieldMapping, ExtractError>;
}
