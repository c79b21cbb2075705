use thiserror::Error;

/// Failures talking to the prediction service or validating caller input.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network unreachable, connection refused or timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// Reachable but answered with a non-success status, an error payload
    /// or a body that could not be decoded.
    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Caller-supplied input rejected before any network activity.
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ApiError::Service {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        if err.is_decode() {
            return ApiError::Service {
                status: 200,
                message: format!("undecodable body: {err}"),
            };
        }
        ApiError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
