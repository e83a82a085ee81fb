//! Gemini API client

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::GeminiConfig;
use super::loader::{load_image, InlineImage};
use super::prompt::{parse_fields, EXTRACTION_PROMPT};
use super::{ExtractError, Extractor};
use crate::naming::{FieldMapping, FILE_NAME_KEY};

/// Gemini client
pub struct GeminiClient {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new client
    pub fn new(config: GeminiConfig) -> Result<Self, ExtractError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, http_client })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Send the image with the extraction prompt and return the reply text
    pub async fn generate(&self, image: &InlineImage) -> Result<String, ExtractError> {
        let request = build_request(image);

        let response = self
            .http_client
            .post(self.config.endpoint())
            .header("x-goog-api-key", self.config.api_key.as_str())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response.json().await?;
        reply.text().ok_or(ExtractError::EmptyResponse)
    }
}

#[async_trait]
impl Extractor for GeminiClient {
    async fn extract(&self, image_path: &Path) -> Result<FieldMapping, ExtractError> {
        let image = load_image(image_path)?;
        debug!(path = ?image_path, mime = image.mime_type, bytes = image.data.len(), "Sending image");

        let reply = self.generate(&image).await?;
        let mut fields = parse_fields(&reply)?;

        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        fields.insert(FILE_NAME_KEY, file_name);

        info!(path = ?image_path, model = %self.config.model, "Extracted receipt fields");
        Ok(fields)
    }
}

fn build_request(image: &InlineImage) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: EXTRACTION_PROMPT.to_string(),
                },
                Part::InlineData {
                    inline_data: Blob {
                        mime_type: image.mime_type.to_string(),
                        data: image.to_base64(),
                    },
                },
            ],
        }],
    }
}

// generateContent request/response

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Serialize)]
struct Blob {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ReplyContent>,
}

#[derive(Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    text: Option<String>,
}
