use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::application::collaborators::GatewayError;
use crate::application::error::AppError;
use crate::domain::error::DomainError;

pub mod codes {
    pub const VALIDATION: &str = "validation";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const CYCLE: &str = "cycle";
    pub const STATE: &str = "state";
    pub const GATEWAY: &str = "gateway_error";
    pub const INTERNAL: &str = "internal";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "credential required",
        )
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "internal error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Domain(domain) => domain_to_api(domain),
            AppError::Gateway(GatewayError::Timeout) => ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                codes::GATEWAY,
                "payment provider timed out; charge may still settle",
            ),
            AppError::Gateway(gateway) => {
                error!(error = %gateway, "payment gateway failure");
                ApiError::new(
                    StatusCode::BAD_GATEWAY,
                    codes::GATEWAY,
                    "payment provider request failed",
                )
            }
            AppError::EventParse(parse) => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::VALIDATION,
                parse.to_string(),
            ),
            AppError::Repo(repo) => {
                error!(error = %repo, "repository failure");
                ApiError::internal()
            }
        }
    }
}

fn domain_to_api(err: DomainError) -> ApiError {
    let message = err.to_string();
    match err {
        DomainError::Validation { .. } => {
            ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, codes::VALIDATION, message)
        }
        DomainError::Authorization { .. } => {
            ApiError::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message)
        }
        DomainError::Authentication { .. } => {
            ApiError::new(StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, message)
        }
        DomainError::NotFound { .. } => {
            ApiError::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
        }
        DomainError::Conflict { .. } => {
            ApiError::new(StatusCode::CONFLICT, codes::CONFLICT, message)
        }
        DomainError::Cycle { .. } => ApiError::new(StatusCode::CONFLICT, codes::CYCLE, message),
        DomainError::State { .. } => ApiError::new(StatusCode::CONFLICT, codes::STATE, message),
        DomainError::Invariant { .. } => {
            error!(error = message, "domain invariant violated");
            ApiError::internal()
        }
    }
}
