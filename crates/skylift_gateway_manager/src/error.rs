use thiserror::Error;

use crate::{compute::BackendError, tunnel::SshError};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid user input, surfaced to the API caller.
    #[error("{0}")]
    ClientError(String),
    /// Named gateway or default gateway missing. Surfaced as 404.
    #[error("{0}")]
    NotFound(String),
    /// Semantic failure reported by the gateway daemon.
    #[error("gateway error: {0}")]
    Remote(String),
    #[error(transparent)]
    Ssh(#[from] SshError),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Crypto(#[from] ssh_key::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
}
