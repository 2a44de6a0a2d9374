use tracing::info;
use uuid::Uuid;

use super::{
    dto::{ClassInput, CreateProductRequest, ProductListQuery, UpdateClassRequest, UpdateProductRequest},
    repo::ProductRepo,
    repo_types::{ClassSession, NewProduct, Product, ProductFilter},
};
use crate::error::{AppError, Resource};

pub const MAX_NAME_LEN: usize = 100;

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_owned())
}

fn product_name(value: &str) -> Result<String, AppError> {
    let name = required(value, "name")?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

fn class_session(input: ClassInput) -> Result<ClassSession, AppError> {
    Ok(ClassSession {
        id: Uuid::new_v4(),
        name: required(&input.name, "class name")?,
        date: input.date,
    })
}

async fn load(products: &dyn ProductRepo, id: Uuid) -> Result<Product, AppError> {
    products
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(Resource::Product))
}

/// Persists the mutated aggregate. The row can vanish between load and save.
async fn store(products: &dyn ProductRepo, product: &Product) -> Result<Product, AppError> {
    products
        .save(product)
        .await?
        .ok_or(AppError::NotFound(Resource::Product))
}

pub async fn create_product(
    products: &dyn ProductRepo,
    req: CreateProductRequest,
) -> Result<Product, AppError> {
    let classes = req
        .classes
        .into_iter()
        .map(class_session)
        .collect::<Result<Vec<_>, _>>()?;

    let product = products
        .insert(NewProduct {
            id: Uuid::new_v4(),
            name: product_name(&req.name)?,
            duration: required(&req.duration, "duration")?,
            level: req.level,
            description: required(&req.description, "description")?,
            classes,
        })
        .await?;
    info!(product_id = %product.id, "product created");
    Ok(product)
}

pub async fn list_products(
    products: &dyn ProductRepo,
    query: ProductListQuery,
) -> Result<Vec<Product>, AppError> {
    let search = query
        .search
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());
    Ok(products
        .list(ProductFilter {
            level: query.level,
            search,
        })
        .await?)
}

pub async fn update_product(
    products: &dyn ProductRepo,
    id: Uuid,
    req: UpdateProductRequest,
) -> Result<Product, AppError> {
    let mut product = load(products, id).await?;
    if let Some(name) = req.name {
        product.name = product_name(&name)?;
    }
    if let Some(duration) = req.duration {
        product.duration = required(&duration, "duration")?;
    }
    if let Some(level) = req.level {
        product.level = level;
    }
    if let Some(description) = req.description {
        product.description = required(&description, "description")?;
    }
    store(products, &product).await
}

pub async fn add_class(
    products: &dyn ProductRepo,
    id: Uuid,
    input: ClassInput,
) -> Result<Product, AppError> {
    let mut product = load(products, id).await?;
    let name = required(&input.name, "class name")?;
    let class_id = product.add_class(name, input.date);
    let product = store(products, &product).await?;
    info!(product_id = %product.id, %class_id, "class added");
    Ok(product)
}

pub async fn update_class(
    products: &dyn ProductRepo,
    id: Uuid,
    class_id: Uuid,
    req: UpdateClassRequest,
) -> Result<Product, AppError> {
    let mut product = load(products, id).await?;
    let name = req
        .name
        .as_deref()
        .map(|n| required(n, "class name"))
        .transpose()?;
    let class = product
        .class_mut(class_id)
        .ok_or(AppError::NotFound(Resource::Class))?;
    if let Some(name) = name {
        class.name = name;
    }
    if let Some(date) = req.date {
        class.date = date;
    }
    store(products, &product).await
}

pub async fn remove_class(
    products: &dyn ProductRepo,
    id: Uuid,
    class_id: Uuid,
) -> Result<Product, AppError> {
    let mut product = load(products, id).await?;
    product
        .remove_class(class_id)
        .ok_or(AppError::NotFound(Resource::Class))?;
    let product = store(products, &product).await?;
    info!(product_id = %product.id, %class_id, "class removed");
    Ok(product)
}
