use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{Client, ClientFilter, ClientPatch, NewClient};
use crate::db::{like_pattern, PgStore, RepoResult};

#[async_trait]
pub trait ClientRepo: Send + Sync {
    async fn insert(&self, client: NewClient) -> RepoResult<Client>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Client>>;
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Client>>;
    /// One page of matches plus the total number of matches.
    async fn list(&self, filter: ClientFilter) -> RepoResult<(Vec<Client>, i64)>;
    async fn update(&self, id: Uuid, patch: ClientPatch) -> RepoResult<Option<Client>>;
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

const CLIENT_COLUMNS: &str =
    "id, first_name, last_name, email, birthdate, token, created_at, updated_at";

const SEARCH_CLAUSE: &str = r#"
    ($1::text IS NULL
        OR first_name ILIKE $1
        OR last_name  ILIKE $1
        OR email      ILIKE $1)
"#;

#[async_trait]
impl ClientRepo for PgStore {
    async fn insert(&self, client: NewClient) -> RepoResult<Client> {
        let row = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (id, first_name, last_name, email, birthdate, token)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(client.id)
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(client.birthdate)
        .bind(&client.token)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(client)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(client)
    }

    async fn list(&self, filter: ClientFilter) -> RepoResult<(Vec<Client>, i64)> {
        let pattern = filter.search.as_deref().map(like_pattern);

        let rows = sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {CLIENT_COLUMNS}
              FROM clients
             WHERE {SEARCH_CLAUSE}
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(&pattern)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM clients WHERE {SEARCH_CLAUSE}"))
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;

        Ok((rows, total))
    }

    async fn update(&self, id: Uuid, patch: ClientPatch) -> RepoResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients
               SET first_name = COALESCE($2, first_name),
                   last_name  = COALESCE($3, last_name),
                   email      = COALESCE($4, email),
                   birthdate  = COALESCE($5, birthdate),
                   updated_at = now()
             WHERE id = $1
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.first_name)
        .bind(patch.last_name)
        .bind(patch.email)
        .bind(patch.birthdate)
        .fetch_optional(&self.pool)
        .await?;
        Ok(client)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let done = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
