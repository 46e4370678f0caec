use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential not found: {name}")]
    NotFound { name: String },

    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed — wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CredentialError>;
