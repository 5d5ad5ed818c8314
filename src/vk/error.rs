use thiserror::Error;

#[derive(Error, Debug)]
pub enum VkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("VK API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("Long poll session invalidated (failed={0})")]
    LongPollInvalidated(u8),
    #[error("Malformed VK response: {0}")]
    Malformed(String),
}

pub type Result<T, E = VkError> = std::result::Result<T, E>;
