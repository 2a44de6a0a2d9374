use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{ClientCreated, ClientListQuery, ClientPage, ClientView, CreateClientRequest, UpdateClientRequest},
    repo_types::ClientPatch,
    services::{list_clients, register_client, update_client},
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, Resource},
    extract::{parse_id, ApiJson, ApiQuery},
    response::MessageResponse,
    state::AppState,
};

pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/api/clients", post(create_client).get(list))
        .route(
            "/api/clients/:id",
            get(get_client).put(put_client).delete(delete_client),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_client(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateClientRequest>,
) -> Result<(StatusCode, Json<ClientCreated>), AppError> {
    let mut client = register_client(state.clients.as_ref(), payload).await?;
    let token = client.token.take().unwrap_or_default();
    Ok((
        StatusCode::CREATED,
        Json(ClientCreated {
            client: client.into(),
            token,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ClientListQuery>,
) -> Result<Json<ClientPage>, AppError> {
    Ok(Json(list_clients(state.clients.as_ref(), q).await?))
}

#[instrument(skip(state))]
pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClientView>, AppError> {
    let id = parse_id(&id)?;
    let client = state
        .clients
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(Resource::Client))?;
    Ok(Json(client.into()))
}

#[instrument(skip(state, caller, payload))]
pub async fn put_client(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateClientRequest>,
) -> Result<Json<ClientView>, AppError> {
    let id = parse_id(&id)?;
    let patch = ClientPatch {
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        birthdate: payload.birthdate,
    };
    let client = update_client(state.clients.as_ref(), id, patch).await?;
    info!(client_id = %client.id, by = %caller.id, "client updated");
    Ok(Json(client.into()))
}

#[instrument(skip(state, caller))]
pub async fn delete_client(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id)?;
    if !state.clients.delete(id).await? {
        return Err(AppError::NotFound(Resource::Client));
    }
    info!(client_id = %id, by = %caller.id, "client deleted");
    Ok(Json(MessageResponse::new("Client deleted")))
}
