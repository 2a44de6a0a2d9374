use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    claims::Role,
    dto::RegisterRequest,
    error::AuthError,
    jwt::JwtKeys,
    password::{hash_in_background, verify_decoy, verify_in_background},
    repo::UserRepo,
    repo_types::{NewUser, User, UserPatch},
};
use crate::{
    db::RepoError,
    error::{AppError, Resource},
};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    let mut problems = Vec::new();
    if req.first_name.trim().chars().count() < MIN_NAME_LEN {
        problems.push("first name must be at least 2 characters");
    }
    if req.last_name.trim().chars().count() < MIN_NAME_LEN {
        problems.push("last name must be at least 2 characters");
    }
    if !is_valid_email(&normalize_email(&req.email)) {
        problems.push("invalid email");
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        problems.push("password must be at least 6 characters");
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(problems.join(", ")))
    }
}

/// Creates a user with a freshly salted hash. The email pre-check only gives a
/// friendlier error; the unique index is what actually rejects duplicates.
pub async fn register(users: &dyn UserRepo, req: RegisterRequest) -> Result<User, AppError> {
    validate_registration(&req)?;
    let email = normalize_email(&req.email);

    if users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_in_background(req.password).await?;
    let new_user = NewUser {
        id: Uuid::new_v4(),
        first_name: req.first_name.trim().to_owned(),
        last_name: req.last_name.trim().to_owned(),
        email,
        password_hash,
        role: req.role.unwrap_or_default(),
    };

    let user = users.insert(new_user).await.map_err(|e| match e {
        RepoError::Conflict { field: "email" } => AppError::DuplicateEmail,
        other => other.into(),
    })?;
    info!(user_id = %user.id, role = user.role.as_str(), "user registered");
    Ok(user)
}

/// Unknown email and wrong password fail the same way and take the same time.
pub async fn verify_credentials(
    users: &dyn UserRepo,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    let Some(user) = users.find_by_email(&email).await? else {
        verify_decoy(password.to_owned()).await?;
        warn!("login failed");
        return Err(AuthError::InvalidCredentials.into());
    };

    let ok = verify_in_background(password.to_owned(), user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = %user.id, "login failed");
        return Err(AuthError::InvalidCredentials.into());
    }
    Ok(user)
}

/// Signs a token for `user` and records it on the user row.
pub async fn issue_session(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    user: &User,
) -> Result<String, AppError> {
    let token = keys.issue(user)?;
    users.set_token(user.id, &token).await?;
    Ok(token)
}

/// Applies a user update. Changing a role is reserved to admins.
pub async fn update_user(
    users: &dyn UserRepo,
    actor: &User,
    id: Uuid,
    patch: UserPatch,
) -> Result<User, AppError> {
    if patch.role.is_some() {
        super::extractors::require_role(actor, Role::Admin)?;
    }
    let mut patch = patch;
    if let Some(email) = patch.email.as_deref() {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::Validation("invalid email".into()));
        }
        patch.email = Some(email);
    }
    for name in [&mut patch.first_name, &mut patch.last_name].into_iter().flatten() {
        *name = name.trim().to_owned();
        if name.chars().count() < MIN_NAME_LEN {
            return Err(AppError::Validation("names must be at least 2 characters".into()));
        }
    }

    users
        .update(id, patch)
        .await
        .map_err(|e| match e {
            RepoError::Conflict { field: "email" } => AppError::DuplicateEmail,
            other => other.into(),
        })?
        .ok_or(AppError::NotFound(Resource::User))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn registration(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Bruno".into(),
            last_name: "Perez".into(),
            email: email.into(),
            password: password.into(),
            role: None,
        }
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("a b@c.d"));
    }

    #[tokio::test]
    async fn register_defaults_role_and_hashes_password() {
        let store = MemoryStore::default();
        let user = register(&store, registration("Bruno@Mail.com", "123123123"))
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(user.email, "bruno@mail.com");
        assert_ne!(user.password_hash, "123123123");
        assert!(user.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn duplicate_email_fails_regardless_of_case() {
        let store = MemoryStore::default();
        register(&store, registration("paula@mail.com", "123123123"))
            .await
            .unwrap();
        let err = register(&store, registration("  PAULA@Mail.COM", "another-pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn storage_conflict_is_reported_as_duplicate_email() {
        let store = MemoryStore::default();
        let user = register(&store, registration("x@mail.com", "123123123"))
            .await
            .unwrap();
        // Bypass the pre-check to exercise the index.
        let err = store
            .insert(NewUser {
                id: Uuid::new_v4(),
                first_name: "Other".into(),
                last_name: "Person".into(),
                email: "X@MAIL.COM".into(),
                password_hash: user.password_hash.clone(),
                role: Role::User,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Conflict { field: "email" }));
    }

    #[tokio::test]
    async fn registration_input_is_validated() {
        let store = MemoryStore::default();
        let err = register(&store, registration("not-an-email", "123"))
            .await
            .unwrap_err();
        let AppError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.contains("invalid email"));
        assert!(msg.contains("password"));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_fail_identically() {
        let store = MemoryStore::default();
        register(&store, registration("test@test.com", "123123123"))
            .await
            .unwrap();

        let unknown = verify_credentials(&store, "ghost@test.com", "123123123")
            .await
            .unwrap_err();
        let wrong = verify_credentials(&store, "test@test.com", "bad-password")
            .await
            .unwrap_err();
        assert_eq!(unknown.kind(), wrong.kind());
        assert_eq!(unknown.status(), wrong.status());
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(unknown, AppError::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn valid_credentials_return_the_user() {
        let store = MemoryStore::default();
        let created = register(&store, registration("ok@test.com", "123123123"))
            .await
            .unwrap();
        let user = verify_credentials(&store, " OK@test.com ", "123123123")
            .await
            .unwrap();
        assert_eq!(user.id, created.id);
    }

    #[tokio::test]
    async fn only_admins_change_roles() {
        let store = MemoryStore::default();
        let plain = register(&store, registration("u@test.com", "123123123"))
            .await
            .unwrap();
        let mut admin_req = registration("admin@test.com", "123123123");
        admin_req.role = Some(Role::Admin);
        let admin = register(&store, admin_req).await.unwrap();

        let escalate = UserPatch {
            role: Some(Role::Admin),
            ..UserPatch::default()
        };
        let err = update_user(&store, &plain, plain.id, escalate.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let promoted = update_user(&store, &admin, plain.id, escalate).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }

    #[tokio::test]
    async fn update_of_missing_user_is_not_found() {
        let store = MemoryStore::default();
        let actor = register(&store, registration("me@test.com", "123123123"))
            .await
            .unwrap();
        let patch = UserPatch {
            first_name: Some("Renamed".into()),
            ..UserPatch::default()
        };
        let err = update_user(&store, &actor, Uuid::new_v4(), patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::User)));
    }
}
