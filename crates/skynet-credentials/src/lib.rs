//! `skynet-credentials` — Fernet-equivalent (AES-256-GCM) encrypted secret
//! store backing the configuration plane's credential layer.

pub mod crypto;
pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::{CredentialError, Result};
pub use manager::CredentialStore;
pub use types::Credential;
