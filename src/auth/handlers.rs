use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            AuthResponse, EmailQuery, LoginRequest, PublicUser, RegisterRequest,
            UpdateUserRequest, UserEnvelope, VerifyResponse,
        },
        extractors::{AdminUser, AuthUser},
        jwt::JwtKeys,
        repo_types::UserPatch,
        services::{issue_session, normalize_email, register, update_user, verify_credentials},
    },
    error::{AppError, Resource},
    extract::{parse_id, ApiJson, ApiQuery},
    response::MessageResponse,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(register_user).get(list_users))
        .route("/api/users/login", post(login))
        .route("/api/users/profile", get(profile))
        .route("/api/users/verify", get(verify))
        .route("/api/users/by-email", get(find_by_email))
        .route(
            "/api/users/:id",
            get(get_user).put(put_user).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = register(state.users.as_ref(), payload).await?;
    let keys = JwtKeys::from_ref(&state);
    let token = issue_session(state.users.as_ref(), &keys, &user).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.into(),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if payload.password.is_empty() {
        return Err(AppError::Validation("password is required".into()));
    }
    let user = verify_credentials(state.users.as_ref(), &payload.email, &payload.password).await?;
    let keys = JwtKeys::from_ref(&state);
    let token = issue_session(state.users.as_ref(), &keys, &user).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        user: user.into(),
        token,
    }))
}

#[instrument(skip_all)]
pub async fn profile(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all)]
pub async fn verify(AuthUser(user): AuthUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        success: true,
        valid: true,
        user: user.into(),
    })
}

#[instrument(skip(state, _caller))]
pub async fn find_by_email(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiQuery(q): ApiQuery<EmailQuery>,
) -> Result<Json<UserEnvelope>, AppError> {
    let email = q
        .email
        .map(|e| normalize_email(&e))
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("email query parameter is required".into()))?;

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AppError::NotFound(Resource::User))?;
    Ok(Json(UserEnvelope {
        success: true,
        user: user.into(),
    }))
}

#[instrument(skip(state, _caller))]
pub async fn list_users(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, _caller))]
pub async fn get_user(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, AppError> {
    let id = parse_id(&id)?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(Resource::User))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, caller, payload))]
pub async fn put_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let id = parse_id(&id)?;
    let patch = UserPatch {
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        role: payload.role,
    };
    let user = update_user(state.users.as_ref(), &caller, id, patch).await?;
    info!(user_id = %user.id, by = %caller.id, "user updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id)?;
    if !state.users.delete(id).await? {
        return Err(AppError::NotFound(Resource::User));
    }
    info!(user_id = %id, by = %admin.id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted")))
}
