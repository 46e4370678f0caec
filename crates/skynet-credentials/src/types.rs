use serde::{Deserialize, Serialize};

/// A named secret as exposed to callers — plaintext only exists transiently
/// in memory after a successful `get`, never persisted or logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,
    pub plaintext: String,
    pub created_at: String,
    pub updated_at: String,
}

/// The persisted row shape: only ciphertext and the nonce ("salt") ever
/// touch disk.
#[derive(Debug, Clone)]
pub(crate) struct EncryptedRow {
    pub name: String,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub created_at: String,
    pub updated_at: String,
}
