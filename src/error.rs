use thiserror::Error;

/// Coarse failure classes. The fallback chains branch on these, not on the
/// concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Content-policy rejection, or a model that answered without an image.
    Safety,
    /// HTTP 429 and other quota markers.
    Quota,
    /// 5xx responses and network-level failures.
    Transient,
    /// A response that parsed but lacked the expected payload.
    Malformed,
    /// Missing credential or endpoint. Never retried, never falls back.
    Configuration,
    Other,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Generation blocked by safety settings ({0}).")]
    SafetyBlocked(String),

    #[error("Generation blocked by content filters ({0}).")]
    ContentFiltered(String),

    #[error("Model returned text instead of image: \"{0}...\"")]
    TextInsteadOfImage(String),

    #[error("No image data received from {0}.")]
    NoImageData(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid image payload: {0}")]
    InvalidImage(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Execution engine error: {0}")]
    ExecutionError(String),

    #[error("Unsupported node type: {0}")]
    UnsupportedNode(String),

    #[error("Workflow error: {0}")]
    WorkflowError(String),

    #[error("Timed out after {0}s waiting for job completion")]
    Timeout(u64),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),
}

#[cfg(feature = "local")]
impl From<tokio_tungstenite::tungstenite::Error> for GenerationError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        GenerationError::WebSocketError(err.to_string())
    }
}

const SAFETY_MARKERS: &[&str] = &[
    "safety",
    "policy",
    "violates",
    "sexually",
    "blocked",
    "content filters",
    "returned text instead of image",
    "no image data",
];

const QUOTA_MARKERS: &[&str] = &["429", "resource_exhausted", "quota"];

const TRANSIENT_MARKERS: &[&str] = &[
    "500",
    "503",
    "internal server error",
    "overloaded",
    "unavailable",
    "network",
    "failed to fetch",
    "econnreset",
];

impl GenerationError {
    /// Classify this error for fallback sequencing.
    ///
    /// Typed variants decide first; free-form messages (HTTP bodies, engine
    /// payloads) fall through to the marker tables.
    pub fn class(&self) -> ErrorClass {
        match self {
            GenerationError::SafetyBlocked(_)
            | GenerationError::ContentFiltered(_)
            | GenerationError::TextInsteadOfImage(_)
            | GenerationError::NoImageData(_) => ErrorClass::Safety,
            GenerationError::ProviderNotConfigured(_) | GenerationError::InvalidConfig(_) => {
                ErrorClass::Configuration
            }
            GenerationError::HttpError(err) => {
                if err.status().map(|s| s.as_u16()) == Some(429) {
                    ErrorClass::Quota
                } else if err.status().is_some_and(|s| s.is_server_error())
                    || err.is_connect()
                    || err.is_timeout()
                    || err.is_request()
                {
                    ErrorClass::Transient
                } else if err.is_decode() {
                    ErrorClass::Malformed
                } else {
                    ErrorClass::Other
                }
            }
            GenerationError::Status { status, body } => match status {
                429 => ErrorClass::Quota,
                500..=599 => ErrorClass::Transient,
                _ => classify_message(body),
            },
            GenerationError::InvalidResponse(_)
            | GenerationError::SerializationError(_)
            | GenerationError::InvalidImage(_) => ErrorClass::Malformed,
            GenerationError::WebSocketError(_) | GenerationError::Timeout(_) => {
                ErrorClass::Transient
            }
            GenerationError::ExecutionError(msg) | GenerationError::AnalysisFailed(msg) => {
                classify_message(msg)
            }
            GenerationError::UnsupportedNode(_) | GenerationError::WorkflowError(_) => {
                ErrorClass::Other
            }
        }
    }

    pub fn is_safety(&self) -> bool {
        self.class() == ErrorClass::Safety
    }

    /// Quota and transient failures are worth retrying in place.
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Quota | ErrorClass::Transient)
    }

    pub fn is_configuration(&self) -> bool {
        self.class() == ErrorClass::Configuration
    }
}

fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::Quota
    } else if SAFETY_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::Safety
    } else if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::Transient
    } else {
        ErrorClass::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_variants_classify_as_safety() {
        assert!(GenerationError::SafetyBlocked("m".into()).is_safety());
        assert!(GenerationError::ContentFiltered("m".into()).is_safety());
        assert!(GenerationError::TextInsteadOfImage("hello".into()).is_safety());
        assert!(GenerationError::NoImageData("m".into()).is_safety());
    }

    #[test]
    fn test_status_codes() {
        let quota = GenerationError::Status {
            status: 429,
            body: "slow down".into(),
        };
        assert_eq!(quota.class(), ErrorClass::Quota);
        assert!(quota.is_retryable());

        let server = GenerationError::Status {
            status: 503,
            body: String::new(),
        };
        assert_eq!(server.class(), ErrorClass::Transient);

        let bad_request = GenerationError::Status {
            status: 400,
            body: "invalid argument".into(),
        };
        assert_eq!(bad_request.class(), ErrorClass::Other);
        assert!(!bad_request.is_retryable());
    }

    #[test]
    fn test_status_body_markers() {
        let blocked = GenerationError::Status {
            status: 400,
            body: "Request violates the usage policy".into(),
        };
        assert!(blocked.is_safety());

        let exhausted = GenerationError::Status {
            status: 400,
            body: "RESOURCE_EXHAUSTED: quota exceeded".into(),
        };
        assert_eq!(exhausted.class(), ErrorClass::Quota);
    }

    #[test]
    fn test_configuration_errors() {
        let err = GenerationError::ProviderNotConfigured("Gemini API key is missing".into());
        assert!(err.is_configuration());
        assert!(!err.is_retryable());
        assert!(!err.is_safety());
    }

    #[test]
    fn test_display_is_plain_text() {
        let err = GenerationError::NoImageData("imagen-4.0-generate-001".into());
        assert_eq!(
            err.to_string(),
            "No image data received from imagen-4.0-generate-001."
        );
    }
}
