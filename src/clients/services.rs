use rand::{distributions::Alphanumeric, Rng};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{ClientListQuery, ClientPage, ClientView, CreateClientRequest},
    repo::ClientRepo,
    repo_types::{Client, ClientFilter, ClientPatch, NewClient},
};
use crate::{
    auth::services::{is_valid_email, normalize_email},
    db::RepoError,
    error::{AppError, Resource},
};

const TOKEN_LEN: usize = 26;
const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;
const MAX_PAGE: i64 = 1_000_000;

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_owned())
}

fn checked_email(raw: &str) -> Result<String, AppError> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    Ok(email)
}

fn conflict_as_duplicate_email(e: RepoError) -> AppError {
    match e {
        RepoError::Conflict { field: "email" } => AppError::DuplicateEmail,
        other => other.into(),
    }
}

/// Self-service registration; no caller identity involved.
pub async fn register_client(
    clients: &dyn ClientRepo,
    req: CreateClientRequest,
) -> Result<Client, AppError> {
    let new_client = NewClient {
        id: Uuid::new_v4(),
        first_name: required(&req.first_name, "firstName")?,
        last_name: required(&req.last_name, "lastName")?,
        email: checked_email(&req.email)?,
        birthdate: req.birthdate,
        token: generate_token(),
    };

    if clients.find_by_email(&new_client.email).await?.is_some() {
        warn!(email = %new_client.email, "client email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let client = clients
        .insert(new_client)
        .await
        .map_err(conflict_as_duplicate_email)?;
    info!(client_id = %client.id, "client registered");
    Ok(client)
}

pub async fn list_clients(
    clients: &dyn ClientRepo,
    query: ClientListQuery,
) -> Result<ClientPage, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    if page > MAX_PAGE {
        return Err(AppError::Validation(format!("page must be at most {MAX_PAGE}")));
    }
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::Validation("page is out of range".into()))?;
    let search = query
        .search
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());

    let (rows, total) = clients
        .list(ClientFilter {
            search,
            limit,
            offset,
        })
        .await?;

    Ok(ClientPage {
        clients: rows.into_iter().map(ClientView::from).collect(),
        total_pages: (total + limit - 1) / limit,
        current_page: page,
        total,
    })
}

pub async fn update_client(
    clients: &dyn ClientRepo,
    id: Uuid,
    mut patch: ClientPatch,
) -> Result<Client, AppError> {
    if let Some(name) = patch.first_name.take() {
        patch.first_name = Some(required(&name, "firstName")?);
    }
    if let Some(name) = patch.last_name.take() {
        patch.last_name = Some(required(&name, "lastName")?);
    }
    if let Some(email) = patch.email.take() {
        patch.email = Some(checked_email(&email)?);
    }

    clients
        .update(id, patch)
        .await
        .map_err(conflict_as_duplicate_email)?
        .ok_or(AppError::NotFound(Resource::Client))
}
