use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Load(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Failed to read catalog file {path}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to fetch catalog from {url}: {source}")]
    HttpFetch {
        url: String,
        source: reqwest::Error,
    },
    #[error("Failed to parse catalog: {0}")]
    Parse(String),
    #[error("Catalog source misconfigured: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read snapshot file {path}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to write snapshot file {path}: {source}")]
    FileWrite {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse snapshot: {0}")]
    Parse(String),
    #[error("An unfinished session already exists for chat {0}")]
    SessionConflict(i64),
    #[error("No persisted session with id {0}")]
    MissingSession(uuid::Uuid),
    #[error("No participant {user_id} in session {session_id}")]
    MissingParticipant {
        session_id: uuid::Uuid,
        user_id: i64,
    },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Question catalog error: {0}")]
    Content(#[from] ContentError),
    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),
    #[error("VK transport error: {0}")]
    Vk(#[from] crate::vk::VkError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
