//! Self-describing image payloads.
//!
//! Images cross every boundary of this crate as MIME-prefixed base64
//! (`data:image/png;base64,...`). Adapters strip the prefix before talking to
//! a backend and re-add one on the way out, so both providers return the same
//! shape.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::str::FromStr;

use crate::error::GenerationError;

const DEFAULT_MIME: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    /// Base64 payload without any prefix.
    pub data: String,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parse either a data URI or a bare base64 string (assumed PNG).
    pub fn parse(input: &str) -> Result<Self, GenerationError> {
        let input = input.trim();
        if let Some(rest) = input.strip_prefix("data:") {
            let (mime, data) = rest.split_once(";base64,").ok_or_else(|| {
                GenerationError::InvalidImage("data URI is not base64 encoded".to_string())
            })?;
            if !mime.starts_with("image/") {
                return Err(GenerationError::InvalidImage(format!(
                    "unexpected MIME type '{}'",
                    mime
                )));
            }
            return Ok(Self::new(mime, data));
        }
        if input.is_empty() {
            return Err(GenerationError::InvalidImage("empty payload".to_string()));
        }
        Ok(Self::new(DEFAULT_MIME, input))
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, STANDARD.encode(bytes))
    }

    pub fn decode(&self) -> Result<Vec<u8>, GenerationError> {
        STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| GenerationError::InvalidImage(e.to_string()))
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// File extension matching the MIME type, used when uploading.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

impl FromStr for EncodedImage {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}
