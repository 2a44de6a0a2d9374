use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateInscriptionRequest, InscriptionListQuery, UpdateInscriptionRequest},
    repo::InscriptionRepo,
    repo_types::{
        InscriptionDetails, InscriptionFilter, InscriptionPatch, InscriptionStats,
        InscriptionStatus, NewInscription, MAX_PROGRESS,
    },
};
use crate::{
    clients::repo::ClientRepo,
    db::RepoError,
    error::{AppError, Resource},
    extract::{parse_id, parse_optional_id},
    products::repo::ProductRepo,
};

fn checked_progress(progress: i64) -> Result<i32, AppError> {
    if !(0..=i64::from(MAX_PROGRESS)).contains(&progress) {
        return Err(AppError::OutOfRange);
    }
    i32::try_from(progress).map_err(|_| AppError::OutOfRange)
}

async fn details(
    inscriptions: &dyn InscriptionRepo,
    id: Uuid,
) -> Result<InscriptionDetails, AppError> {
    inscriptions
        .find_details(id)
        .await?
        .ok_or(AppError::NotFound(Resource::Inscription))
}

/// Enrolls a client in a product. The pair lookup only produces the nicer
/// error; the unique constraint on (client, product) is what rejects races.
pub async fn create(
    clients: &dyn ClientRepo,
    products: &dyn ProductRepo,
    inscriptions: &dyn InscriptionRepo,
    req: CreateInscriptionRequest,
) -> Result<InscriptionDetails, AppError> {
    let client_id = parse_id(&req.client)?;
    let product_id = parse_id(&req.product)?;

    if clients.find_by_id(client_id).await?.is_none() {
        return Err(AppError::NotFound(Resource::Client));
    }
    if products.find_by_id(product_id).await?.is_none() {
        return Err(AppError::NotFound(Resource::Product));
    }

    if let Some(existing) = inscriptions.find_by_pair(client_id, product_id).await? {
        warn!(
            %client_id,
            %product_id,
            status = ?existing.status,
            "client already enrolled in product"
        );
        return Err(match existing.status {
            InscriptionStatus::Active => AppError::DuplicateActiveEnrollment,
            _ => AppError::DuplicatePairConstraint,
        });
    }

    let inscription = inscriptions
        .insert(NewInscription {
            id: Uuid::new_v4(),
            client_id,
            product_id,
            enrollment_date: req.enrollment_date.unwrap_or_else(OffsetDateTime::now_utc),
        })
        .await
        .map_err(|e| match e {
            RepoError::Conflict { .. } => AppError::DuplicatePairConstraint,
            other => other.into(),
        })?;
    info!(inscription_id = %inscription.id, %client_id, %product_id, "inscription created");

    details(inscriptions, inscription.id).await
}

pub async fn list(
    inscriptions: &dyn InscriptionRepo,
    query: InscriptionListQuery,
) -> Result<Vec<InscriptionDetails>, AppError> {
    let product_raw = query.product_id.as_deref().or(query.course_id.as_deref());
    let filter = InscriptionFilter {
        status: query.status,
        client_id: parse_optional_id(query.client_id.as_deref())?,
        product_id: parse_optional_id(product_raw)?,
    };
    Ok(inscriptions.list(filter).await?)
}

pub async fn get(
    inscriptions: &dyn InscriptionRepo,
    id: Uuid,
) -> Result<InscriptionDetails, AppError> {
    details(inscriptions, id).await
}

/// Range is checked before anything is read, so a rejected value never
/// touches the record.
pub async fn update_progress(
    inscriptions: &dyn InscriptionRepo,
    id: Uuid,
    progress: i64,
) -> Result<InscriptionDetails, AppError> {
    let progress = checked_progress(progress)?;

    let current = inscriptions
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(Resource::Inscription))?;
    if current.status == InscriptionStatus::Cancelled {
        warn!(inscription_id = %id, "progress update on cancelled inscription");
        return Err(AppError::InvalidTransition);
    }

    let Some(updated) = inscriptions.set_progress(id, progress).await? else {
        // Cancelled or deleted between the read and the write.
        return Err(match inscriptions.find_by_id(id).await? {
            Some(row) if row.status == InscriptionStatus::Cancelled => {
                warn!(inscription_id = %id, "progress update on cancelled inscription");
                AppError::InvalidTransition
            }
            _ => AppError::NotFound(Resource::Inscription),
        });
    };
    if current.status != InscriptionStatus::Completed
        && updated.status == InscriptionStatus::Completed
    {
        info!(inscription_id = %id, "inscription completed");
    }

    details(inscriptions, id).await
}

/// Administrative full update. Progress 100 still completes the inscription
/// and an existing completion date is never moved implicitly.
pub async fn update(
    inscriptions: &dyn InscriptionRepo,
    id: Uuid,
    req: UpdateInscriptionRequest,
) -> Result<InscriptionDetails, AppError> {
    let progress = req.progress.map(checked_progress).transpose()?;

    let current = inscriptions
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(Resource::Inscription))?;

    let mut patch = InscriptionPatch {
        status: req.status,
        progress,
        enrollment_date: req.enrollment_date,
        completion_date: req.completion_date,
    };
    if progress == Some(MAX_PROGRESS) {
        patch.status = Some(InscriptionStatus::Completed);
    }
    if patch.status == Some(InscriptionStatus::Completed)
        && current.completion_date.is_none()
        && patch.completion_date.is_none()
    {
        patch.completion_date = Some(OffsetDateTime::now_utc());
    }

    inscriptions
        .update(id, patch)
        .await?
        .ok_or(AppError::NotFound(Resource::Inscription))?;
    details(inscriptions, id).await
}

pub async fn remove(inscriptions: &dyn InscriptionRepo, id: Uuid) -> Result<(), AppError> {
    if !inscriptions.delete(id).await? {
        return Err(AppError::NotFound(Resource::Inscription));
    }
    info!(inscription_id = %id, "inscription deleted");
    Ok(())
}

pub async fn stats_overview(inscriptions: &dyn InscriptionRepo) -> Result<InscriptionStats, AppError> {
    Ok(inscriptions.stats().await?)
}
