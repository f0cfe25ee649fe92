use std::path::PathBuf;

use hyper::StatusCode;
use thiserror::Error;

use crate::client::AUTH_COOKIE;

/// Setup failures. Anything reported here aborts every worker, scenario
/// failures never end up in this type.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown scenario {name:?}, supported: {supported}")]
    UnknownScenario { name: String, supported: String },

    #[error("{available} credentials configured for {jobs} jobs")]
    InsufficientCredentials { available: usize, jobs: usize },

    #[error("Failed to read jobs config {path:?}: {source}")]
    CredentialsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse jobs config {path:?}: {source}")]
    CredentialsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read password: {0}")]
    Password(#[source] std::io::Error),

    #[error("Worker {worker} failed to open a session: {error:#}")]
    Session { worker: usize, error: anyhow::Error },

    #[error("Worker {worker} failed to log in as {username:?}: {source}")]
    Login {
        worker: usize,
        username: String,
        #[source]
        source: LoginError,
    },

    #[error("Worker {worker} failed to enter contest {contest_id}: {error:#}")]
    EnterContest {
        worker: usize,
        contest_id: u64,
        error: anyhow::Error,
    },

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Why a login attempt was refused.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error(transparent)]
    Transport(#[from] anyhow::Error),

    #[error("unable to login: {} {:?}", .0.as_u16(), .0.to_string())]
    ServerError(StatusCode),

    #[error("unable to login: {:?} cookie not found", AUTH_COOKIE)]
    MissingCookie,
}
