//! HTTP 边界错误。
//!
//! 响应体是纯文本（状态码 + 一句话），与实时通道上的错误帧区分。

use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::DomainError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(domain_err) => match domain_err {
                DomainError::InvalidArgument { .. }
                | DomainError::SelfFollow
                | DomainError::MembershipNotPending
                | DomainError::CannotLeaveAsCreator => {
                    ApiError::bad_request(domain_err.to_string())
                }
                DomainError::UserNotFound
                | DomainError::GroupNotFound
                | DomainError::MessageNotFound
                | DomainError::NotificationNotFound
                | DomainError::EventNotFound
                | DomainError::PostNotFound
                | DomainError::FollowRequestNotFound
                | DomainError::NotFollowing => ApiError::not_found(domain_err.to_string()),
                DomainError::AlreadyFollowing
                | DomainError::FollowRequestPending
                | DomainError::MembershipExists => {
                    ApiError::new(StatusCode::CONFLICT, domain_err.to_string())
                }
                DomainError::NotGroupMember
                | DomainError::MessagingNotAllowed
                | DomainError::OperationNotAllowed => ApiError::forbidden(domain_err.to_string()),
            },
            ApplicationError::Repository(repo_err) => match repo_err {
                domain::RepositoryError::NotFound => {
                    ApiError::not_found("requested resource not found")
                }
                domain::RepositoryError::Conflict => {
                    ApiError::new(StatusCode::CONFLICT, "resource already exists")
                }
                domain::RepositoryError::Storage { .. } => {
                    // 不向客户端泄露存储细节
                    tracing::error!(error = %repo_err, "storage failure");
                    ApiError::internal_server_error("Database error")
                }
            },
            ApplicationError::Authentication => ApiError::unauthorized("Unauthorized"),
            ApplicationError::Authorization => ApiError::forbidden("Forbidden"),
            ApplicationError::Infrastructure { message } => {
                tracing::error!(error = %message, "infrastructure failure");
                ApiError::internal_server_error("Internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}
