use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{error, warn};

use crate::{
    auth::error::{AuthError, TokenError},
    db::RepoError,
    state::AppState,
};

/// Records addressable by id, used to tell missing parents from missing children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Client,
    Product,
    Class,
    Inscription,
}

impl Resource {
    fn kind(self) -> &'static str {
        match self {
            Resource::User => "user_not_found",
            Resource::Client => "client_not_found",
            Resource::Product => "product_not_found",
            Resource::Class => "class_not_found",
            Resource::Inscription => "inscription_not_found",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Resource::User => "User not found",
            Resource::Client => "Client not found",
            Resource::Product => "Product not found",
            Resource::Class => "Class not found",
            Resource::Inscription => "Inscription not found",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("malformed identifier")]
    InvalidId,
    #[error("duplicate value for {field}")]
    DuplicateKey { field: &'static str },
    #[error("email already registered")]
    DuplicateEmail,
    #[error("client already has an active inscription for this product")]
    DuplicateActiveEnrollment,
    #[error("client already has an inscription for this product")]
    DuplicatePairConstraint,
    #[error("progress must be between 0 and 100")]
    OutOfRange,
    #[error("inscription can no longer change progress")]
    InvalidTransition,
    #[error("{}", .0.message())]
    NotFound(Resource),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidId
            | AppError::DuplicateKey { .. }
            | AppError::DuplicateEmail
            | AppError::DuplicateActiveEnrollment
            | AppError::DuplicatePairConstraint
            | AppError::OutOfRange
            | AppError::InvalidTransition
            | AppError::Auth(AuthError::InvalidCredentials) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Auth(AuthError::MissingToken | AuthError::IdentityNotFound) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Auth(AuthError::Token(_)) | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code carried in every error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InvalidId => "invalid_id",
            AppError::DuplicateKey { .. } => "duplicate_key",
            AppError::DuplicateEmail => "duplicate_email",
            AppError::DuplicateActiveEnrollment => "duplicate_active_enrollment",
            AppError::DuplicatePairConstraint => "duplicate_pair",
            AppError::OutOfRange => "out_of_range",
            AppError::InvalidTransition => "invalid_transition",
            AppError::NotFound(resource) => resource.kind(),
            AppError::Auth(AuthError::MissingToken) => "missing_token",
            AppError::Auth(AuthError::IdentityNotFound) => "identity_not_found",
            AppError::Auth(AuthError::InvalidCredentials) => "invalid_credentials",
            AppError::Auth(AuthError::Token(TokenError::Malformed)) => "token_malformed",
            AppError::Auth(AuthError::Token(TokenError::Expired)) => "token_expired",
            AppError::Auth(AuthError::Token(TokenError::SignatureInvalid)) => {
                "token_signature_invalid"
            }
            AppError::Forbidden => "forbidden",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Validation(_) => "Validation error".into(),
            AppError::InvalidId => "Invalid ID".into(),
            AppError::DuplicateKey { .. } => "Duplicate value".into(),
            AppError::DuplicateEmail => "Email is already registered".into(),
            AppError::DuplicateActiveEnrollment | AppError::DuplicatePairConstraint => {
                "Client is already enrolled in this course".into()
            }
            AppError::OutOfRange => "Progress must be between 0 and 100".into(),
            AppError::InvalidTransition => "Cancelled inscriptions cannot record progress".into(),
            AppError::NotFound(resource) => resource.message().into(),
            AppError::Auth(AuthError::MissingToken) => "Access token required".into(),
            AppError::Auth(AuthError::IdentityNotFound) => "User not found".into(),
            AppError::Auth(AuthError::InvalidCredentials) => "Invalid credentials".into(),
            AppError::Auth(AuthError::Token(TokenError::Expired)) => "Token expired".into(),
            AppError::Auth(AuthError::Token(_)) => "Invalid token".into(),
            AppError::Forbidden => "Access denied. Administrator permissions required".into(),
            AppError::Internal(_) => "Internal server error".into(),
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            AppError::Validation(msg) => Some(msg.clone()),
            AppError::InvalidId => Some("The provided ID is not in a valid format".into()),
            AppError::DuplicateKey { field } => Some(format!("{field} already exists")),
            AppError::DuplicatePairConstraint => {
                Some("An inscription for this client and product already exists".into())
            }
            _ => None,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Conflict { field } => AppError::DuplicateKey { field },
            RepoError::MissingReference { entity: "client" } => AppError::NotFound(Resource::Client),
            RepoError::MissingReference { entity: "product" } => {
                AppError::NotFound(Resource::Product)
            }
            RepoError::MissingReference { entity } => {
                AppError::Validation(format!("referenced {entity} does not exist"))
            }
            RepoError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: String,
}

/// Attached to error responses so the boundary can log and enrich them once.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    pub internal: Option<String>,
    body: ErrorBodyParts,
}

#[derive(Debug, Clone)]
struct ErrorBodyParts {
    error: String,
    kind: &'static str,
    details: Option<String>,
    timestamp: String,
}

impl ErrorBodyParts {
    fn render(&self, details: Option<String>) -> ErrorBody {
        ErrorBody {
            success: false,
            error: self.error.clone(),
            kind: self.kind,
            details: details.or_else(|| self.details.clone()),
            timestamp: self.timestamp.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let parts = ErrorBodyParts {
            error: self.message(),
            kind: self.kind(),
            details: self.details(),
            timestamp,
        };
        let internal = match &self {
            AppError::Internal(e) => Some(format!("{e:#}")),
            _ => None,
        };
        let report = ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            internal,
            body: parts.clone(),
        };
        let mut res = (status, Json(parts.render(None))).into_response();
        res.extensions_mut().insert(report);
        res
    }
}

/// Logs every failed request once with its caller context and, in development,
/// echoes the internal cause of 500s back in `details`.
pub async fn error_boundary(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".into());

    let mut res = next.run(req).await;
    let Some(report) = res.extensions_mut().remove::<ErrorReport>() else {
        return res;
    };

    let status = res.status();
    if status.is_server_error() {
        error!(%method, %path, %ip, %status, kind = report.kind, error = %report.message,
            cause = report.internal.as_deref().unwrap_or(""), "request failed");
    } else {
        warn!(%method, %path, %ip, %status, kind = report.kind, error = %report.message,
            "request rejected");
    }

    match report.internal {
        Some(cause) if state.config.expose_error_details() => {
            (status, Json(report.body.render(Some(cause)))).into_response()
        }
        _ => res,
    }
}
