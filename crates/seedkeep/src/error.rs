//! Error kinds surfaced by seedkeep
//!
//! Library functions return `anyhow::Result` and raise these with `bail!`,
//! so callers that care about the kind can `downcast_ref::<SeedkeepError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeedkeepError {
    #[error("{}: cannot read: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("{}: cannot decrypt: {message}", path.display())]
    Decryption { path: PathBuf, message: String },

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("{}: invalid account file: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("{name}: unknown partner. Choose from {choices}.")]
    UnknownPartner { name: String, choices: String },

    #[error("{}: already exists", .0.display())]
    Exists(PathBuf),
}
