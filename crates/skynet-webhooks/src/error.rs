use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("webhook definition not found: {id}")]
    NotFound { id: String },

    #[error("path suffix already in use: {path_suffix}")]
    DuplicatePathSuffix { path_suffix: String },

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("request body of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("malformed JSON body: {0}")]
    MalformedBody(String),
}

pub type Result<T> = std::result::Result<T, WebhookError>;
