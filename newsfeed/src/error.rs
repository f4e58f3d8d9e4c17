use thiserror::Error;

/// Failure of a call to the news service.
///
/// The coordinator treats every variant the same way: the call failed and the
/// affected state degrades inline. The split exists for logging.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error("no chat session established")]
    NoSession,
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Payload(e.to_string())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
