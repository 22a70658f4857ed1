use domain::song::SongError;
use domain::user::UserError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Repository error: {0}: {1}")]
    RepositoryError(String, String),
    #[error("Song error: {0}")]
    SongError(#[from] SongError),
    #[error("User error: {0}")]
    UserError(#[from] UserError),
    #[error("Aggregate not found: {0}: {1}")]
    AggregateNotFound(String, String),

    #[error("Queue is empty: {0}")]
    EmptyQueue(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Unknown error: {0}")]
    UnknownError(String),
}
