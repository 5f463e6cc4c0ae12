use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API returned error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("VM {vmid} not found")]
    NotFound { vmid: u32 },

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::ParseError(err.to_string())
    }
}
