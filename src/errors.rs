use thiserror::Error;

/// Failure taxonomy for a matchday session.
///
/// Everything except [`AppError::UserAbort`] is caught at the shell
/// boundary, rendered as a one-line message, and the loop continues.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("sports API error: {0}")]
    UpstreamFetch(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("model backend error: {0}")]
    ModelBackend(String),

    #[error("{0} is not set in the environment")]
    MissingCredential(&'static str),

    #[error("terminated by user")]
    UserAbort,
}

impl AppError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        AppError::UpstreamFetch(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        AppError::ModelBackend(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
