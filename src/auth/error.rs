use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

/// Why a bearer token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Malformed,
    #[error("token expired")]
    Expired,
    #[error("token signature is invalid")]
    SignatureInvalid,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            _ => TokenError::Malformed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("access token required")]
    MissingToken,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("user not found")]
    IdentityNotFound,
    /// Same variant for unknown email and wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
}
