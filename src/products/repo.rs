use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use super::repo_types::{NewProduct, Product, ProductFilter, ProductRow};
use crate::db::{like_pattern, PgStore, RepoResult};

#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn insert(&self, product: NewProduct) -> RepoResult<Product>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Product>>;
    async fn list(&self, filter: ProductFilter) -> RepoResult<Vec<Product>>;
    /// Re-saves the whole aggregate, class sessions included, and bumps `updated_at`.
    /// Returns `None` when the product no longer exists.
    async fn save(&self, product: &Product) -> RepoResult<Option<Product>>;
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

const PRODUCT_COLUMNS: &str =
    "id, name, duration, level, description, classes, created_at, updated_at";

#[async_trait]
impl ProductRepo for PgStore {
    async fn insert(&self, product: NewProduct) -> RepoResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (id, name, duration, level, description, classes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.duration)
        .bind(product.level)
        .bind(&product.description)
        .bind(Json(&product.classes))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    async fn list(&self, filter: ProductFilter) -> RepoResult<Vec<Product>> {
        let pattern = filter.search.as_deref().map(like_pattern);
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
              FROM products
             WHERE ($1::product_level IS NULL OR level = $1)
               AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)
             ORDER BY created_at DESC
            "#
        ))
        .bind(filter.level)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn save(&self, product: &Product) -> RepoResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products
               SET name        = $2,
                   duration    = $3,
                   level       = $4,
                   description = $5,
                   classes     = $6,
                   updated_at  = now()
             WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.duration)
        .bind(product.level)
        .bind(&product.description)
        .bind(Json(&product.classes))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let done = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
