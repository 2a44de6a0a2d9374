use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Enrollee contact record. Independent from `User`.
#[derive(Debug, Clone, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub birthdate: OffsetDateTime,
    pub token: Option<String>, // opaque, not a JWT
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewClient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub birthdate: OffsetDateTime,
    pub token: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClientPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub birthdate: Option<OffsetDateTime>,
}

/// Case-insensitive match on names and email, newest first.
#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}
