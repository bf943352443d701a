use shared::error::AppError;
use thiserror::Error;

/// Errors that stop the server from starting or running
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Initialization failed: {0}")]
    Init(#[from] AppError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
