use domain::{DomainError, RepositoryError};
use thiserror::Error;

/// 应用层统一错误。领域与仓储错误透传，其余按来源分类。
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("authentication failed")]
    Authentication,

    #[error("authorization failed")]
    Authorization,

    #[error("infrastructure error: {message}")]
    Infrastructure { message: String },
}

impl ApplicationError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure {
            message: message.into(),
        }
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
