use mongodb::error::Error as DbError;
use reqwest::Error as HttpError;
use rocket::serde::json::serde_json::Error as JsonError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Remote endpoint unreachable: {0}")]
    Http(#[from] HttpError),
    #[error("Malformed data: {0}")]
    Json(#[from] JsonError),
    #[error("Local store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The remote endpoint answered with `success: false`.
    #[error("{0}")]
    Remote(String),
    #[error("You have already used your vote")]
    AlreadyVoted,
    #[error("Voting has closed")]
    VotingClosed,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// Another action from the same session is still in flight.
    #[error("Another request is still in progress, please wait")]
    Busy,
}

impl Error {
    pub fn not_found<S: AsRef<str>>(what: S) -> Self {
        Self::NotFound(what.as_ref().to_string())
    }
}
