//! In-memory repositories for tests. Every write takes the single lock, so the
//! unique and foreign-key checks behave like the database constraints.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::{
    repo::UserRepo,
    repo_types::{NewUser, User, UserPatch},
};
use crate::clients::{
    repo::ClientRepo,
    repo_types::{Client, ClientFilter, ClientPatch, NewClient},
};
use crate::db::{RepoError, RepoResult};
use crate::inscriptions::{
    repo::InscriptionRepo,
    repo_types::{
        ClientSummary, Inscription, InscriptionDetails, InscriptionFilter, InscriptionPatch,
        InscriptionStats, InscriptionStatus, NewInscription, ProductSummary, StatusCount,
        MAX_PROGRESS,
    },
};
use crate::products::{
    repo::ProductRepo,
    repo_types::{NewProduct, Product, ProductFilter},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    clients: Vec<Client>,
    products: Vec<Product>,
    inscriptions: Vec<Inscription>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Newest first, like `ORDER BY created_at DESC` over insertion order.
fn newest_first<T: Clone>(rows: &[T], keep: impl Fn(&T) -> bool) -> Vec<T> {
    rows.iter().rev().filter(|r| keep(r)).cloned().collect()
}

/// Same effect as the `set_progress` UPDATE: 100 completes, and the first
/// completion date sticks.
fn apply_progress(row: &mut Inscription, progress: i32, now: OffsetDateTime) {
    row.progress = progress;
    if progress == MAX_PROGRESS {
        row.status = InscriptionStatus::Completed;
        row.completion_date.get_or_insert(now);
    }
    row.updated_at = now;
}

/// Same effect as the COALESCE update: unset fields stay as they are.
fn apply_patch(row: &mut Inscription, patch: &InscriptionPatch, now: OffsetDateTime) {
    if let Some(status) = patch.status {
        row.status = status;
    }
    if let Some(progress) = patch.progress {
        row.progress = progress;
    }
    if let Some(date) = patch.enrollment_date {
        row.enrollment_date = date;
    }
    if let Some(date) = patch.completion_date {
        row.completion_date = Some(date);
    }
    row.updated_at = now;
}

impl Tables {
    fn details(&self, i: &Inscription) -> Option<InscriptionDetails> {
        let client = self.clients.iter().find(|c| c.id == i.client_id)?;
        let product = self.products.iter().find(|p| p.id == i.product_id)?;
        Some(InscriptionDetails {
            id: i.id,
            client: ClientSummary {
                id: client.id,
                first_name: client.first_name.clone(),
                last_name: client.last_name.clone(),
                email: client.email.clone(),
            },
            product: ProductSummary {
                id: product.id,
                name: product.name.clone(),
                duration: product.duration.clone(),
                level: product.level,
            },
            status: i.status,
            enrollment_date: i.enrollment_date,
            completion_date: i.completion_date,
            progress: i.progress,
            created_at: i.created_at,
            updated_at: i.updated_at,
        })
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn insert(&self, user: NewUser) -> RepoResult<User> {
        let mut t = self.lock();
        if t.users.iter().any(|u| same_email(&u.email, &user.email)) {
            return Err(RepoError::Conflict { field: "email" });
        }
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            token: None,
            created_at: now,
            updated_at: now,
        };
        t.users.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| same_email(&u.email, email))
            .cloned())
    }

    async fn list(&self) -> RepoResult<Vec<User>> {
        Ok(newest_first(&self.lock().users, |_| true))
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> RepoResult<Option<User>> {
        let mut t = self.lock();
        if let Some(email) = &patch.email {
            if t.users.iter().any(|u| u.id != id && same_email(&u.email, email)) {
                return Err(RepoError::Conflict { field: "email" });
            }
        }
        let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = patch.first_name {
            user.first_name = v;
        }
        if let Some(v) = patch.last_name {
            user.last_name = v;
        }
        if let Some(v) = patch.email {
            user.email = v;
        }
        if let Some(v) = patch.role {
            user.role = v;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn set_token(&self, id: Uuid, token: &str) -> RepoResult<()> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            user.token = Some(token.to_owned());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut t = self.lock();
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        Ok(t.users.len() != before)
    }
}

#[async_trait]
impl ClientRepo for MemoryStore {
    async fn insert(&self, client: NewClient) -> RepoResult<Client> {
        let mut t = self.lock();
        if t.clients.iter().any(|c| same_email(&c.email, &client.email)) {
            return Err(RepoError::Conflict { field: "email" });
        }
        let now = OffsetDateTime::now_utc();
        let row = Client {
            id: client.id,
            first_name: client.first_name,
            last_name: client.last_name,
            email: client.email,
            birthdate: client.birthdate,
            token: Some(client.token),
            created_at: now,
            updated_at: now,
        };
        t.clients.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Client>> {
        Ok(self.lock().clients.iter().find(|c| c.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<Client>> {
        Ok(self
            .lock()
            .clients
            .iter()
            .find(|c| same_email(&c.email, email))
            .cloned())
    }

    async fn list(&self, filter: ClientFilter) -> RepoResult<(Vec<Client>, i64)> {
        let matches = newest_first(&self.lock().clients, |c| match &filter.search {
            None => true,
            Some(s) => {
                contains_ci(&c.first_name, s) || contains_ci(&c.last_name, s) || contains_ci(&c.email, s)
            }
        });
        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update(&self, id: Uuid, patch: ClientPatch) -> RepoResult<Option<Client>> {
        let mut t = self.lock();
        if let Some(email) = &patch.email {
            if t.clients.iter().any(|c| c.id != id && same_email(&c.email, email)) {
                return Err(RepoError::Conflict { field: "email" });
            }
        }
        let Some(client) = t.clients.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(v) = patch.first_name {
            client.first_name = v;
        }
        if let Some(v) = patch.last_name {
            client.last_name = v;
        }
        if let Some(v) = patch.email {
            client.email = v;
        }
        if let Some(v) = patch.birthdate {
            client.birthdate = v;
        }
        client.updated_at = OffsetDateTime::now_utc();
        Ok(Some(client.clone()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut t = self.lock();
        let before = t.clients.len();
        t.clients.retain(|c| c.id != id);
        t.inscriptions.retain(|i| i.client_id != id);
        Ok(t.clients.len() != before)
    }
}

#[async_trait]
impl ProductRepo for MemoryStore {
    async fn insert(&self, product: NewProduct) -> RepoResult<Product> {
        let now = OffsetDateTime::now_utc();
        let row = Product {
            id: product.id,
            name: product.name,
            duration: product.duration,
            level: product.level,
            description: product.description,
            classes: product.classes,
            created_at: now,
            updated_at: now,
        };
        self.lock().products.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Product>> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, filter: ProductFilter) -> RepoResult<Vec<Product>> {
        Ok(newest_first(&self.lock().products, |p| {
            filter.level.map_or(true, |l| p.level == l)
                && filter.search.as_deref().map_or(true, |s| {
                    contains_ci(&p.name, s) || contains_ci(&p.description, s)
                })
        }))
    }

    async fn save(&self, product: &Product) -> RepoResult<Option<Product>> {
        let mut t = self.lock();
        let Some(row) = t.products.iter_mut().find(|p| p.id == product.id) else {
            return Ok(None);
        };
        let created_at = row.created_at;
        *row = product.clone();
        row.created_at = created_at;
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut t = self.lock();
        let before = t.products.len();
        t.products.retain(|p| p.id != id);
        t.inscriptions.retain(|i| i.product_id != id);
        Ok(t.products.len() != before)
    }
}

#[async_trait]
impl InscriptionRepo for MemoryStore {
    async fn insert(&self, inscription: NewInscription) -> RepoResult<Inscription> {
        let mut t = self.lock();
        if !t.clients.iter().any(|c| c.id == inscription.client_id) {
            return Err(RepoError::MissingReference { entity: "client" });
        }
        if !t.products.iter().any(|p| p.id == inscription.product_id) {
            return Err(RepoError::MissingReference { entity: "product" });
        }
        if t.inscriptions.iter().any(|i| {
            i.client_id == inscription.client_id && i.product_id == inscription.product_id
        }) {
            return Err(RepoError::Conflict {
                field: "client, product",
            });
        }
        let now = OffsetDateTime::now_utc();
        let row = Inscription {
            id: inscription.id,
            client_id: inscription.client_id,
            product_id: inscription.product_id,
            status: InscriptionStatus::Active,
            enrollment_date: inscription.enrollment_date,
            completion_date: None,
            progress: 0,
            created_at: now,
            updated_at: now,
        };
        t.inscriptions.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Inscription>> {
        Ok(self.lock().inscriptions.iter().find(|i| i.id == id).cloned())
    }

    async fn find_by_pair(
        &self,
        client_id: Uuid,
        product_id: Uuid,
    ) -> RepoResult<Option<Inscription>> {
        Ok(self
            .lock()
            .inscriptions
            .iter()
            .find(|i| i.client_id == client_id && i.product_id == product_id)
            .cloned())
    }

    async fn find_details(&self, id: Uuid) -> RepoResult<Option<InscriptionDetails>> {
        let t = self.lock();
        Ok(t.inscriptions
            .iter()
            .find(|i| i.id == id)
            .and_then(|i| t.details(i)))
    }

    async fn list(&self, filter: InscriptionFilter) -> RepoResult<Vec<InscriptionDetails>> {
        let t = self.lock();
        Ok(t.inscriptions
            .iter()
            .rev()
            .filter(|i| filter.status.map_or(true, |s| i.status == s))
            .filter(|i| filter.client_id.map_or(true, |c| i.client_id == c))
            .filter(|i| filter.product_id.map_or(true, |p| i.product_id == p))
            .filter_map(|i| t.details(i))
            .collect())
    }

    async fn set_progress(&self, id: Uuid, progress: i32) -> RepoResult<Option<Inscription>> {
        let mut t = self.lock();
        let Some(row) = t
            .inscriptions
            .iter_mut()
            .find(|i| i.id == id && i.status != InscriptionStatus::Cancelled)
        else {
            return Ok(None);
        };
        apply_progress(row, progress, OffsetDateTime::now_utc());
        Ok(Some(row.clone()))
    }

    async fn update(&self, id: Uuid, patch: InscriptionPatch) -> RepoResult<Option<Inscription>> {
        let mut t = self.lock();
        let Some(row) = t.inscriptions.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        apply_patch(row, &patch, OffsetDateTime::now_utc());
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut t = self.lock();
        let before = t.inscriptions.len();
        t.inscriptions.retain(|i| i.id != id);
        Ok(t.inscriptions.len() != before)
    }

    async fn stats(&self) -> RepoResult<InscriptionStats> {
        let t = self.lock();
        let mut groups: BTreeMap<InscriptionStatus, i64> = BTreeMap::new();
        for i in &t.inscriptions {
            *groups.entry(i.status).or_default() += 1;
        }
        let total = t.inscriptions.len() as i64;
        let sum: i64 = t.inscriptions.iter().map(|i| i64::from(i.progress)).sum();
        Ok(InscriptionStats {
            total_inscriptions: total,
            status_distribution: groups
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
            average_progress: if total == 0 {
                0.0
            } else {
                sum as f64 / total as f64
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn inscription() -> Inscription {
        let t = datetime!(2025-01-01 00:00 UTC);
        Inscription {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            status: InscriptionStatus::Active,
            enrollment_date: t,
            completion_date: None,
            progress: 0,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn partial_progress_keeps_status() {
        let mut i = inscription();
        apply_progress(&mut i, 40, datetime!(2025-01-02 00:00 UTC));
        assert_eq!(i.progress, 40);
        assert_eq!(i.status, InscriptionStatus::Active);
        assert!(i.completion_date.is_none());
    }

    #[test]
    fn reaching_full_progress_completes_once() {
        let mut i = inscription();
        let first = datetime!(2025-01-02 00:00 UTC);
        apply_progress(&mut i, 100, first);
        assert_eq!(i.status, InscriptionStatus::Completed);
        assert_eq!(i.completion_date, Some(first));

        apply_progress(&mut i, 100, datetime!(2025-01-09 00:00 UTC));
        assert_eq!(i.completion_date, Some(first));
    }

    #[test]
    fn patch_leaves_unset_fields_alone() {
        let mut i = inscription();
        let patch = InscriptionPatch {
            status: Some(InscriptionStatus::Cancelled),
            ..InscriptionPatch::default()
        };
        apply_patch(&mut i, &patch, datetime!(2025-01-03 00:00 UTC));
        assert_eq!(i.status, InscriptionStatus::Cancelled);
        assert_eq!(i.progress, 0);
        assert_eq!(i.enrollment_date, datetime!(2025-01-01 00:00 UTC));
    }
}
