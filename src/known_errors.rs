use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::rejection::PathRejection;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KnownErrors {
    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("{reason}")]
    Unauthorized { reason: String },

    #[error("{reason}")]
    Conflict { reason: String },

    #[error("{reason}")]
    Validation { reason: String },

    #[error("missing or invalid bearer token")]
    NotLoggedIn,

    #[error("invalid id")]
    InvalidId,

    #[error("instructor candidate lookup failed: {context}")]
    ExternalLookup { context: String },

    #[error("internal error: {context}")]
    InternalError { context: String },
}

pub type AppResult<T> = Result<T, KnownErrors>;

impl KnownErrors {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn internal(context: impl ToString) -> Self {
        Self::InternalError {
            context: context.to_string(),
        }
    }

    /// Policy denials are 403; a missing credential is the only 401.
    pub fn status_code(&self) -> StatusCode {
        match self {
            KnownErrors::NotFound { .. } => StatusCode::NOT_FOUND,
            KnownErrors::Unauthorized { .. } => StatusCode::FORBIDDEN,
            KnownErrors::Conflict { .. } => StatusCode::CONFLICT,
            KnownErrors::Validation { .. } | KnownErrors::InvalidId => StatusCode::BAD_REQUEST,
            KnownErrors::NotLoggedIn => StatusCode::UNAUTHORIZED,
            KnownErrors::ExternalLookup { .. } => StatusCode::BAD_GATEWAY,
            KnownErrors::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for KnownErrors {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<tokio::task::JoinError> for KnownErrors {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::internal(value)
    }
}

impl From<JsonRejection> for KnownErrors {
    fn from(value: JsonRejection) -> Self {
        Self::invalid(value.body_text())
    }
}

impl From<PathRejection> for KnownErrors {
    fn from(value: PathRejection) -> Self {
        Self::invalid(value.body_text())
    }
}

impl From<QueryRejection> for KnownErrors {
    fn from(value: QueryRejection) -> Self {
        Self::invalid(value.body_text())
    }
}

impl From<bcrypt::BcryptError> for KnownErrors {
    fn from(value: bcrypt::BcryptError) -> Self {
        Self::internal(value)
    }
}
