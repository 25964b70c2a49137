use thiserror::Error;

/// 仓储层统一错误。存储细节（sqlx 等）不向上层泄露，只保留消息文本。
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("requested row not found")]
    NotFound,

    #[error("row already exists")]
    Conflict,

    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
