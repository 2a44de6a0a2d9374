use serde::Deserialize;
use time::OffsetDateTime;

use super::repo_types::ProductLevel;

#[derive(Debug, Deserialize)]
pub struct ClassInput {
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub duration: String,
    pub level: ProductLevel,
    pub description: String,
    #[serde(default)]
    pub classes: Vec<ClassInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub duration: Option<String>,
    pub level: Option<ProductLevel>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateClassRequest {
    pub name: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub level: Option<ProductLevel>,
    pub search: Option<String>,
}
