use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::config::AppConfig;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Failures surfaced by the repositories.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A unique index rejected the write.
    #[error("duplicate value for {field}")]
    Conflict { field: &'static str },
    /// A foreign key pointed at a row that does not exist.
    #[error("referenced {entity} does not exist")]
    MissingReference { entity: &'static str },
    #[error(transparent)]
    Database(sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default();
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    return RepoError::Conflict {
                        field: field_for_constraint(constraint),
                    }
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    return RepoError::MissingReference {
                        entity: entity_for_constraint(constraint),
                    }
                }
                _ => {}
            }
        }
        RepoError::Database(err)
    }
}

fn field_for_constraint(constraint: &str) -> &'static str {
    match constraint {
        "users_email_key" | "clients_email_key" => "email",
        "inscriptions_client_product_key" => "client, product",
        _ => "id",
    }
}

fn entity_for_constraint(constraint: &str) -> &'static str {
    match constraint {
        "inscriptions_client_id_fkey" => "client",
        "inscriptions_product_id_fkey" => "product",
        _ => "record",
    }
}

/// Postgres-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run migrations")
}

/// Escapes LIKE wildcards so user search text matches literally.
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
