use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{
    Inscription, InscriptionDetails, InscriptionDetailsRow, InscriptionFilter, InscriptionPatch,
    InscriptionStats, InscriptionStatus, NewInscription, StatusCount,
};
use crate::db::{PgStore, RepoResult};

#[async_trait]
pub trait InscriptionRepo: Send + Sync {
    /// Fails with `RepoError::Conflict` when the (client, product) pair is taken.
    async fn insert(&self, inscription: NewInscription) -> RepoResult<Inscription>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Inscription>>;
    async fn find_by_pair(&self, client_id: Uuid, product_id: Uuid)
        -> RepoResult<Option<Inscription>>;
    async fn find_details(&self, id: Uuid) -> RepoResult<Option<InscriptionDetails>>;
    async fn list(&self, filter: InscriptionFilter) -> RepoResult<Vec<InscriptionDetails>>;
    /// Single-statement progress write; 100 also completes the inscription.
    /// `None` when the row is missing or cancelled.
    async fn set_progress(&self, id: Uuid, progress: i32) -> RepoResult<Option<Inscription>>;
    async fn update(&self, id: Uuid, patch: InscriptionPatch) -> RepoResult<Option<Inscription>>;
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
    async fn stats(&self) -> RepoResult<InscriptionStats>;
}

const INSCRIPTION_COLUMNS: &str = "id, client_id, product_id, status, enrollment_date, \
     completion_date, progress, created_at, updated_at";

const DETAILS_SELECT: &str = r#"
    SELECT i.id, i.status, i.enrollment_date, i.completion_date, i.progress,
           i.created_at, i.updated_at,
           c.id         AS client_id,
           c.first_name AS client_first_name,
           c.last_name  AS client_last_name,
           c.email      AS client_email,
           p.id         AS product_id,
           p.name       AS product_name,
           p.duration   AS product_duration,
           p.level      AS product_level
      FROM inscriptions i
      JOIN clients  c ON c.id = i.client_id
      JOIN products p ON p.id = i.product_id
"#;

#[async_trait]
impl InscriptionRepo for PgStore {
    async fn insert(&self, inscription: NewInscription) -> RepoResult<Inscription> {
        let row = sqlx::query_as::<_, Inscription>(&format!(
            r#"
            INSERT INTO inscriptions (id, client_id, product_id, enrollment_date)
            VALUES ($1, $2, $3, $4)
            RETURNING {INSCRIPTION_COLUMNS}
            "#
        ))
        .bind(inscription.id)
        .bind(inscription.client_id)
        .bind(inscription.product_id)
        .bind(inscription.enrollment_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Inscription>> {
        let row = sqlx::query_as::<_, Inscription>(&format!(
            "SELECT {INSCRIPTION_COLUMNS} FROM inscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_pair(
        &self,
        client_id: Uuid,
        product_id: Uuid,
    ) -> RepoResult<Option<Inscription>> {
        let row = sqlx::query_as::<_, Inscription>(&format!(
            "SELECT {INSCRIPTION_COLUMNS} FROM inscriptions WHERE client_id = $1 AND product_id = $2"
        ))
        .bind(client_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_details(&self, id: Uuid) -> RepoResult<Option<InscriptionDetails>> {
        let row = sqlx::query_as::<_, InscriptionDetailsRow>(&format!(
            "{DETAILS_SELECT} WHERE i.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(InscriptionDetails::from))
    }

    async fn list(&self, filter: InscriptionFilter) -> RepoResult<Vec<InscriptionDetails>> {
        let rows = sqlx::query_as::<_, InscriptionDetailsRow>(&format!(
            r#"
            {DETAILS_SELECT}
             WHERE ($1::inscription_status IS NULL OR i.status = $1)
               AND ($2::uuid IS NULL OR i.client_id = $2)
               AND ($3::uuid IS NULL OR i.product_id = $3)
             ORDER BY i.created_at DESC
            "#
        ))
        .bind(filter.status)
        .bind(filter.client_id)
        .bind(filter.product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(InscriptionDetails::from).collect())
    }

    async fn set_progress(&self, id: Uuid, progress: i32) -> RepoResult<Option<Inscription>> {
        let row = sqlx::query_as::<_, Inscription>(&format!(
            r#"
            UPDATE inscriptions
               SET progress        = $2,
                   status          = CASE WHEN $2 = 100 THEN 'completed'::inscription_status
                                          ELSE status END,
                   completion_date = CASE WHEN $2 = 100 THEN COALESCE(completion_date, now())
                                          ELSE completion_date END,
                   updated_at      = now()
             WHERE id = $1 AND status <> 'cancelled'
            RETURNING {INSCRIPTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(progress)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, patch: InscriptionPatch) -> RepoResult<Option<Inscription>> {
        let row = sqlx::query_as::<_, Inscription>(&format!(
            r#"
            UPDATE inscriptions
               SET status          = COALESCE($2, status),
                   progress        = COALESCE($3, progress),
                   enrollment_date = COALESCE($4, enrollment_date),
                   completion_date = COALESCE($5, completion_date),
                   updated_at      = now()
             WHERE id = $1
            RETURNING {INSCRIPTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.status)
        .bind(patch.progress)
        .bind(patch.enrollment_date)
        .bind(patch.completion_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let done = sqlx::query("DELETE FROM inscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn stats(&self) -> RepoResult<InscriptionStats> {
        let groups: Vec<(InscriptionStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM inscriptions GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let (total, average): (i64, f64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(AVG(progress), 0)::float8 FROM inscriptions",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(InscriptionStats {
            total_inscriptions: total,
            status_distribution: groups
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
            average_progress: average,
        })
    }
}
