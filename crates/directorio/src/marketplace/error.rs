use super::accounts::AuthError;
use super::media::MediaError;
use super::status::TransitionError;
use super::store::RepositoryError;
use super::validation::ValidationError;

/// Error raised by the marketplace services.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("export failed: {0}")]
    Export(String),
}

impl DirectoryError {
    pub(crate) fn forbidden(reason: impl Into<String>) -> Self {
        Self::Auth(AuthError::Forbidden(reason.into()))
    }

    /// A uniqueness clash reported by the store becomes a duplicate with a readable message.
    pub(crate) fn duplicate_on_conflict(
        err: RepositoryError,
        message: impl FnOnce() -> String,
    ) -> Self {
        match err {
            RepositoryError::Conflict { .. } => Self::Duplicate(message()),
            other => Self::Repository(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repository(RepositoryError::NotFound { .. }))
    }
}
