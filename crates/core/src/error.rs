use thiserror::Error;

/// Errors shared across the engine crates.
#[derive(Error, Debug)]
pub enum SieveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid rule '{id}': {reason}")]
    InvalidRule { id: String, reason: String },
}
