use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::products::repo_types::ProductLevel;

pub const MAX_PROGRESS: i32 = 100;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "inscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InscriptionStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, FromRow)]
pub struct Inscription {
    pub id: Uuid,
    pub client_id: Uuid,
    pub product_id: Uuid,
    pub status: InscriptionStatus,
    pub enrollment_date: OffsetDateTime,
    pub completion_date: Option<OffsetDateTime>,
    pub progress: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewInscription {
    pub id: Uuid,
    pub client_id: Uuid,
    pub product_id: Uuid,
    pub enrollment_date: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct InscriptionPatch {
    pub status: Option<InscriptionStatus>,
    pub progress: Option<i32>,
    pub enrollment_date: Option<OffsetDateTime>,
    pub completion_date: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct InscriptionFilter {
    pub status: Option<InscriptionStatus>,
    pub client_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub duration: String,
    pub level: ProductLevel,
}

/// Inscription joined with the summary fields of its client and product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionDetails {
    pub id: Uuid,
    pub client: ClientSummary,
    pub product: ProductSummary,
    pub status: InscriptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub enrollment_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completion_date: Option<OffsetDateTime>,
    pub progress: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct InscriptionDetailsRow {
    pub id: Uuid,
    pub status: InscriptionStatus,
    pub enrollment_date: OffsetDateTime,
    pub completion_date: Option<OffsetDateTime>,
    pub progress: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub client_id: Uuid,
    pub client_first_name: String,
    pub client_last_name: String,
    pub client_email: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_duration: String,
    pub product_level: ProductLevel,
}

impl From<InscriptionDetailsRow> for InscriptionDetails {
    fn from(r: InscriptionDetailsRow) -> Self {
        Self {
            id: r.id,
            client: ClientSummary {
                id: r.client_id,
                first_name: r.client_first_name,
                last_name: r.client_last_name,
                email: r.client_email,
            },
            product: ProductSummary {
                id: r.product_id,
                name: r.product_name,
                duration: r.product_duration,
                level: r.product_level,
            },
            status: r.status,
            enrollment_date: r.enrollment_date,
            completion_date: r.completion_date,
            progress: r.progress,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// One bucket of the status distribution, on the wire as `{"_id": status, "count": n}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    #[serde(rename = "_id")]
    pub status: InscriptionStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionStats {
    pub total_inscriptions: i64,
    pub status_distribution: Vec<StatusCount>,
    /// Mean over every inscription, cancelled and completed included.
    pub average_progress: f64,
}
