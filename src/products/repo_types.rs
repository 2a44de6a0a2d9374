use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_level")]
pub enum ProductLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// One scheduled session. Only exists inside its product's `classes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSession {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub duration: String,
    pub level: ProductLevel,
    pub description: String,
    pub classes: Json<Vec<ClassSession>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Course aggregate. Class sessions are mutated here and persisted by saving
/// the whole product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub duration: String,
    pub level: ProductLevel,
    pub description: String,
    pub classes: Vec<ClassSession>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            duration: r.duration,
            level: r.level,
            description: r.description,
            classes: r.classes.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl Product {
    /// Appends a session under a fresh sub-id and returns that id.
    pub fn add_class(&mut self, name: String, date: OffsetDateTime) -> Uuid {
        let id = Uuid::new_v4();
        self.classes.push(ClassSession { id, name, date });
        id
    }

    pub fn class_mut(&mut self, class_id: Uuid) -> Option<&mut ClassSession> {
        self.classes.iter_mut().find(|c| c.id == class_id)
    }

    pub fn remove_class(&mut self, class_id: Uuid) -> Option<ClassSession> {
        let idx = self.classes.iter().position(|c| c.id == class_id)?;
        Some(self.classes.remove(idx))
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub id: Uuid,
    pub name: String,
    pub duration: String,
    pub level: ProductLevel,
    pub description: String,
    pub classes: Vec<ClassSession>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub level: Option<ProductLevel>,
    pub search: Option<String>,
}
