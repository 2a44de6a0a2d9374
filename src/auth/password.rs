use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tokio::sync::OnceCell;
use tracing::error;

/// Verified against when the email is unknown so both login failures cost the same.
static DECOY_HASH: OnceCell<String> = OnceCell::const_new();

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Hashes off the async workers; argon2 is deliberately slow.
pub async fn hash_in_background(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("hash task failed")?
}

pub async fn verify_in_background(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("verify task failed")?
}

async fn decoy_hash() -> anyhow::Result<&'static str> {
    let hash = DECOY_HASH
        .get_or_try_init(|| hash_in_background("fenix-decoy-password".into()))
        .await
        .context("decoy hash unavailable")?;
    Ok(hash)
}

/// Computes the decoy hash at startup so the first unknown-email login
/// costs the same as every later one.
pub async fn warm_decoy() -> anyhow::Result<()> {
    decoy_hash().await.map(|_| ())
}

/// Burns one verification against the decoy hash. Result is always a mismatch.
pub async fn verify_decoy(plain: String) -> anyhow::Result<()> {
    let decoy = decoy_hash().await?.to_owned();
    verify_in_background(plain, decoy).await?;
    Ok(())
}
