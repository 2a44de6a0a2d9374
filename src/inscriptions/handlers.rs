use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{CreateInscriptionRequest, InscriptionListQuery, ProgressRequest, UpdateInscriptionRequest},
    repo_types::{InscriptionDetails, InscriptionStats},
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::{parse_id, ApiJson, ApiQuery},
    response::MessageResponse,
    state::AppState,
};

pub fn inscription_routes() -> Router<AppState> {
    Router::new()
        .route("/api/inscriptions", post(create_inscription).get(list))
        .route("/api/inscriptions/stats/overview", get(stats_overview))
        .route(
            "/api/inscriptions/:id",
            get(get_inscription)
                .put(put_inscription)
                .delete(delete_inscription),
        )
        .route("/api/inscriptions/:id/progress", patch(patch_progress))
}

/// Open enrollment; no bearer token required.
#[instrument(skip(state, payload))]
pub async fn create_inscription(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateInscriptionRequest>,
) -> Result<(StatusCode, Json<InscriptionDetails>), AppError> {
    let inscription = services::create(
        state.clients.as_ref(),
        state.products.as_ref(),
        state.inscriptions.as_ref(),
        payload,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(inscription)))
}

#[instrument(skip(state, _caller))]
pub async fn list(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    ApiQuery(q): ApiQuery<InscriptionListQuery>,
) -> Result<Json<Vec<InscriptionDetails>>, AppError> {
    Ok(Json(services::list(state.inscriptions.as_ref(), q).await?))
}

#[instrument(skip(state, _caller))]
pub async fn get_inscription(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<InscriptionDetails>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(services::get(state.inscriptions.as_ref(), id).await?))
}

#[instrument(skip(state, caller, payload))]
pub async fn put_inscription(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateInscriptionRequest>,
) -> Result<Json<InscriptionDetails>, AppError> {
    let id = parse_id(&id)?;
    let inscription = services::update(state.inscriptions.as_ref(), id, payload).await?;
    info!(inscription_id = %id, by = %caller.id, status = ?inscription.status, "inscription updated");
    Ok(Json(inscription))
}

#[instrument(skip(state, _caller, payload))]
pub async fn patch_progress(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<ProgressRequest>,
) -> Result<Json<InscriptionDetails>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(
        services::update_progress(state.inscriptions.as_ref(), id, payload.progress).await?,
    ))
}

#[instrument(skip(state, caller))]
pub async fn delete_inscription(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id)?;
    services::remove(state.inscriptions.as_ref(), id).await?;
    info!(inscription_id = %id, by = %caller.id, "inscription removed via api");
    Ok(Json(MessageResponse::new("Inscription deleted")))
}

#[instrument(skip(state, _caller))]
pub async fn stats_overview(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<InscriptionStats>, AppError> {
    Ok(Json(services::stats_overview(state.inscriptions.as_ref()).await?))
}
