use serde::Deserialize;
use time::OffsetDateTime;

use super::repo_types::InscriptionStatus;

/// Older clients send the product reference as `course`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInscriptionRequest {
    pub client: String,
    #[serde(alias = "course")]
    pub product: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub enrollment_date: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInscriptionRequest {
    pub status: Option<InscriptionStatus>,
    pub progress: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub enrollment_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completion_date: Option<OffsetDateTime>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionListQuery {
    pub status: Option<InscriptionStatus>,
    pub client_id: Option<String>,
    pub course_id: Option<String>,
    pub product_id: Option<String>,
}
