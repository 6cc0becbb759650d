use thiserror::Error;

use crate::application::collaborators::GatewayError;
use crate::application::repos::RepoError;
use crate::application::webhook::EventParseError;
use crate::domain::error::DomainError;

/// Top-level service error. Domain failures keep their taxonomy; repository
/// and gateway failures are carried through unflattened so callers (and the
/// HTTP layer) can distinguish "you asked wrong" from "we broke".
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    EventParse(#[from] EventParseError),
}

impl AppError {
    /// Repo-level uniqueness and missing-row outcomes expressed in domain
    /// vocabulary, for paths where they are caller-visible contract rather
    /// than an internal fault.
    pub fn from_repo_as_domain(err: RepoError, entity: &'static str) -> Self {
        match err {
            RepoError::NotFound => DomainError::not_found(entity).into(),
            RepoError::Duplicate { constraint } => DomainError::conflict(constraint).into(),
            other => AppError::Repo(other),
        }
    }
}
