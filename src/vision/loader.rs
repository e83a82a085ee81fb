//! Receipt image loading

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};

use super::ExtractError;

/// File extensions picked up when scanning a folder
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Whether `path` has one of the supported image extensions
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
}

/// Image bytes ready to be sent inline
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

/// Read an image file and detect its format from the content
pub fn load_image(path: &Path) -> Result<InlineImage, ExtractError> {
    let data = std::fs::read(path).map_err(|source| ExtractError::ReadImage {
        path: path.to_path_buf(),
        source,
    })?;

    let format = image::guess_format(&data).map_err(|source| ExtractError::UnknownFormat {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(InlineImage {
        mime_type: format.to_mime_type(),
        data,
    })
}
