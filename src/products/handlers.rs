use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{ClassInput, CreateProductRequest, ProductListQuery, UpdateClassRequest, UpdateProductRequest},
    repo_types::Product,
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, Resource},
    extract::{parse_id, ApiJson, ApiQuery},
    response::MessageResponse,
    state::AppState,
};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route(
            "/api/products/:id",
            get(get_product).put(put_product).delete(delete_product),
        )
        .route("/api/products/:id/classes", post(add_class))
        .route(
            "/api/products/:id/classes/:class_id",
            put(update_class).delete(remove_class),
        )
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ProductListQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(services::list_products(state.products.as_ref(), q).await?))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    let id = parse_id(&id)?;
    let product = state
        .products
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(Resource::Product))?;
    Ok(Json(product))
}

#[instrument(skip(state, caller, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiJson(payload): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = services::create_product(state.products.as_ref(), payload).await?;
    info!(product_id = %product.id, by = %caller.id, "product created via api");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, _caller, payload))]
pub async fn put_product(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(
        services::update_product(state.products.as_ref(), id, payload).await?,
    ))
}

#[instrument(skip(state, caller))]
pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id)?;
    if !state.products.delete(id).await? {
        return Err(AppError::NotFound(Resource::Product));
    }
    info!(product_id = %id, by = %caller.id, "product deleted");
    Ok(Json(MessageResponse::new("Product deleted")))
}

#[instrument(skip(state, _caller, payload))]
pub async fn add_class(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<ClassInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let id = parse_id(&id)?;
    let product = services::add_class(state.products.as_ref(), id, payload).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, _caller, payload))]
pub async fn update_class(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path((id, class_id)): Path<(String, String)>,
    ApiJson(payload): ApiJson<UpdateClassRequest>,
) -> Result<Json<Product>, AppError> {
    let (id, class_id) = (parse_id(&id)?, parse_id(&class_id)?);
    Ok(Json(
        services::update_class(state.products.as_ref(), id, class_id, payload).await?,
    ))
}

#[instrument(skip(state, _caller))]
pub async fn remove_class(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path((id, class_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    let (id, class_id) = (parse_id(&id)?, parse_id(&class_id)?);
    services::remove_class(state.products.as_ref(), id, class_id).await?;
    Ok(Json(MessageResponse::new("Class deleted")))
}
