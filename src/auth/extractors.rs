use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use tracing::warn;

use super::{
    claims::Role, error::AuthError, jwt::JwtKeys, repo::UserRepo, repo_types::User,
};
use crate::{error::AppError, state::AppState};

/// Authenticated caller, re-read from the user store on every request.
pub struct AuthUser(pub User);

/// Authenticated caller whose current role is admin.
pub struct AdminUser(pub User);

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Verifies the token and resolves its subject to the user as stored now.
/// A valid token for a deleted user fails with `IdentityNotFound`.
pub async fn authenticate(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    token: &str,
) -> Result<User, AppError> {
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        AuthError::Token(e)
    })?;

    users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %claims.sub, "token subject no longer exists");
            AuthError::IdentityNotFound.into()
        })
}

pub fn require_role(identity: &User, role: Role) -> Result<(), AppError> {
    if identity.role != role {
        warn!(user_id = %identity.id, required = role.as_str(), "role check failed");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(AuthUser(user.clone()));
        }

        let token = bearer_token(&parts.headers)?;
        let keys = JwtKeys::from_ref(state);
        let user = authenticate(state.users.as_ref(), &keys, token).await?;

        parts.extensions.insert(user.clone());
        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        require_role(&user, Role::Admin)?;
        Ok(AdminUser(user))
    }
}
