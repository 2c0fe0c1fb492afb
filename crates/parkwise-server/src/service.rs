use crate::auth::{PasswordHasher, TokenError, TokenIssuer};
use crate::config::{AuthConfig, InitialAdminConfig};
use crate::store::{CredentialStore, NewUser, StoreError, UserRecord};
use anyhow::Context;
use parkwise_common::models::auth::{Claims, Role, UserSummary};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Plaintext hashed once at startup; unknown-email logins verify against it
/// so both login failure branches pay the same hashing cost.
const TIMING_EQUALIZER_PASSWORD: &str = "parkwise-timing-equalizer";

/// Outcome kinds of the auth flows
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("User already exists")]
    AlreadyExists,
    #[error("User not found")]
    NotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token")]
    TokenInvalid,
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey => AuthError::AlreadyExists,
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid(_) => AuthError::TokenInvalid,
        }
    }
}

/// Admin edit of another account. `None` fields are left unchanged and an
/// empty password counts as unchanged.
#[derive(Default)]
pub struct UserUpdate<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub role: Option<Role>,
    pub password: Option<&'a str>,
}

/// Successful register/login result
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: UserSummary,
}

/// Registration, login and account maintenance over a [`CredentialStore`].
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
    equalizer_hash: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, config: &AuthConfig) -> anyhow::Result<Self> {
        let hasher =
            PasswordHasher::new(&config.hashing).context("Failed to build password hasher")?;
        let equalizer_hash = hasher.hash(TIMING_EQUALIZER_PASSWORD)?;
        Ok(Self {
            store,
            hasher,
            tokens: TokenIssuer::new(&config.jwt_secret, config.token_ttl_secs),
            equalizer_hash,
        })
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("Password hashing task failed")??;
        Ok(hash)
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .context("Password verification task failed")??;
        Ok(matches)
    }

    fn issue_session(&self, user: &UserRecord) -> Result<AuthSession, AuthError> {
        let token = self.tokens.issue(user.id, user.role)?;
        Ok(AuthSession {
            token,
            user: user.summary(),
        })
    }

    /// Create an account with role `user` and sign it in.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let user = self
            .create_account(name, email, password, Role::default())
            .await?;
        tracing::info!(user_id = %user.id, "Registered user");
        self.issue_session(&user)
    }

    async fn create_account(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<UserRecord, AuthError> {
        if self.store.find_by_email(email).await?.is_some() {
            return Err(AuthError::AlreadyExists);
        }

        let password_hash = self.hash_password(password).await?;
        // A concurrent registration that wins the race shows up as DuplicateKey
        let user = self
            .store
            .create(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
                role,
            })
            .await?;
        Ok(user)
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = match self.store.find_by_email(email).await? {
            Some(user) => user,
            None => {
                self.verify_password(password, &self.equalizer_hash).await?;
                return Err(AuthError::NotFound);
            }
        };

        if !self.verify_password(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_session(&user)
    }

    /// Check a bearer token, keeping expiry and invalidity apart
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.tokens.verify(token)?)
    }

    /// Resolve the live user behind verified claims.
    pub async fn current_user(&self, claims: &Claims) -> Result<UserSummary, AuthError> {
        let user_id = claims.user_id().ok_or(AuthError::TokenInvalid)?;
        match self.store.find_by_id(user_id).await? {
            Some(user) => Ok(user.summary()),
            None => Err(AuthError::TokenInvalid),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<UserSummary, AuthError> {
        if let Some(email) = email {
            if let Some(existing) = self.store.find_by_email(email).await? {
                if existing.id != user_id {
                    return Err(AuthError::AlreadyExists);
                }
            }
        }

        match self.store.update_profile(user_id, name, email).await? {
            Some(user) => Ok(user.summary()),
            None => Err(AuthError::NotFound),
        }
    }

    #[tracing::instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !self
            .verify_password(current_password, &user.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = self.hash_password(new_password).await?;
        if !self.store.update_password(user_id, &password_hash).await? {
            return Err(AuthError::NotFound);
        }
        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Admin-created account with an explicit role. Unlike `register`, no
    /// session is issued.
    #[tracing::instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<UserSummary, AuthError> {
        let user = self.create_account(name, email, password, role).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "Created user");
        Ok(user.summary())
    }

    #[tracing::instrument(skip(self, changes))]
    pub async fn update_user(
        &self,
        user_id: Uuid,
        changes: UserUpdate<'_>,
    ) -> Result<UserSummary, AuthError> {
        if let Some(email) = changes.email {
            if let Some(existing) = self.store.find_by_email(email).await? {
                if existing.id != user_id {
                    return Err(AuthError::AlreadyExists);
                }
            }
        }

        // Hashed up front; a hashing fault leaves the record untouched
        let password_hash = match changes.password.filter(|p| !p.is_empty()) {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };

        let mut user = self
            .store
            .update_profile(user_id, changes.name, changes.email)
            .await?
            .ok_or(AuthError::NotFound)?;
        if let Some(role) = changes.role {
            user = self
                .store
                .set_role(user_id, role)
                .await?
                .ok_or(AuthError::NotFound)?;
        }
        if let Some(password_hash) = password_hash {
            if !self.store.update_password(user_id, &password_hash).await? {
                return Err(AuthError::NotFound);
            }
        }

        tracing::info!(user_id = %user_id, "Updated user");
        Ok(user.summary())
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_role(&self, user_id: Uuid, role: Role) -> Result<UserSummary, AuthError> {
        let user = self
            .store
            .set_role(user_id, role)
            .await?
            .ok_or(AuthError::NotFound)?;
        tracing::info!(user_id = %user_id, role = %role, "Role changed");
        Ok(user.summary())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        if !self.store.delete(user_id).await? {
            return Err(AuthError::NotFound);
        }
        tracing::info!(user_id = %user_id, "Deleted user");
        Ok(())
    }

    /// Seed the configured admin account. Any failure is returned so startup
    /// can abort instead of running without it.
    pub async fn seed_initial_admin(&self, admin: &InitialAdminConfig) -> anyhow::Result<()> {
        let seeded = self
            .ensure_user(&admin.name, &admin.email, &admin.password, Role::Admin)
            .await
            .context("Failed to seed initial admin")?;
        match seeded {
            Some(user) => tracing::info!("Created initial admin: {}", user.email),
            None => tracing::info!(
                "Initial admin '{}' already exists, skipping seed",
                admin.email
            ),
        }
        Ok(())
    }

    /// Create a user with an explicit role unless the email is already taken.
    /// Returns `None` when the user already existed.
    pub async fn ensure_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Option<UserSummary>, AuthError> {
        if self.store.find_by_email(email).await?.is_some() {
            return Ok(None);
        }
        let user = self.create_account(name, email, password, role).await?;
        Ok(Some(user.summary()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HashingConfig;
    use crate::store::InMemoryCredentialStore;

    const SECRET: &str = "service-test-secret";

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: SECRET.to_string(),
            token_ttl_secs: 86400,
            hashing: HashingConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            initial_admin: None,
        }
    }

    fn service() -> (AuthService, Arc<InMemoryCredentialStore>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let service = AuthService::new(store.clone(), &test_config()).unwrap();
        (service, store)
    }

    #[tokio::test]
    async fn test_register_then_login_end_to_end() {
        let (svc, _store) = service();

        let registered = svc.register("Alice", "a@x.com", "secret1").await.unwrap();
        assert_eq!(registered.user.name, "Alice");
        assert_eq!(registered.user.role, Role::User);
        let claims = svc.verify_token(&registered.token).unwrap();
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.user_id(), Some(registered.user.id));

        let logged_in = svc.login("a@x.com", "secret1").await.unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);

        let err = svc.login("a@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (svc, store) = service();
        svc.register("Alice", "a@x.com", "secret1").await.unwrap();

        let err = svc.register("Alice 2", "a@x.com", "other").await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists));
        assert_eq!(store.user_count().await, 1);

        // Original password still works
        svc.login("a@x.com", "secret1").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_registration_yields_already_exists() {
        let (svc, store) = service();
        let svc = Arc::new(svc);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let svc = svc.clone();
                let name = format!("racer-{}", i);
                tokio::spawn(async move { svc.register(&name, "race@x.com", "pw").await })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(AuthError::AlreadyExists) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let (svc, _store) = service();
        let err = svc.login("nobody@x.com", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_login_email_is_case_sensitive() {
        let (svc, _store) = service();
        svc.register("Alice", "Alice@x.com", "pw").await.unwrap();
        let err = svc.login("alice@x.com", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_session_never_contains_hash() {
        let (svc, store) = service();
        let session = svc.register("Alice", "a@x.com", "secret1").await.unwrap();
        let stored = store.find_by_email("a@x.com").await.unwrap().unwrap();

        let json = serde_json::to_value(&session).unwrap();
        let text = json.to_string();
        assert!(!text.contains(&stored.password_hash));
        assert!(json["user"].get("password_hash").is_none());
        assert!(json["user"].get("passwordHash").is_none());
        assert!(json["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_token_reflects_role_at_issuance() {
        let (svc, _store) = service();
        svc.ensure_user("Boss", "boss@x.com", "pw", Role::Admin)
            .await
            .unwrap()
            .unwrap();
        let session = svc.login("boss@x.com", "pw").await.unwrap();
        assert_eq!(session.user.role, Role::Admin);
        assert_eq!(svc.verify_token(&session.token).unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn test_verify_token_distinguishes_expired_and_invalid() {
        let (svc, _store) = service();
        let expired = svc
            .tokens()
            .issue_at(Uuid::new_v4(), Role::User, chrono::Utc::now().timestamp() - 90_000)
            .unwrap();
        assert!(matches!(
            svc.verify_token(&expired),
            Err(AuthError::TokenExpired)
        ));
        assert!(matches!(
            svc.verify_token("not.a.token"),
            Err(AuthError::TokenInvalid)
        ));

        let foreign = TokenIssuer::new("other-secret", 86400)
            .issue(Uuid::new_v4(), Role::User)
            .unwrap();
        assert!(matches!(
            svc.verify_token(&foreign),
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_current_user() {
        let (svc, _store) = service();
        let session = svc.register("Alice", "a@x.com", "pw").await.unwrap();
        let claims = svc.verify_token(&session.token).unwrap();
        let me = svc.current_user(&claims).await.unwrap();
        assert_eq!(me, session.user);

        // Token for a user that does not exist
        let ghost = svc.tokens().issue(Uuid::new_v4(), Role::User).unwrap();
        let claims = svc.verify_token(&ghost).unwrap();
        assert!(matches!(
            svc.current_user(&claims).await,
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (svc, _store) = service();
        let a = svc.register("Alice", "a@x.com", "pw").await.unwrap();
        svc.register("Bob", "b@x.com", "pw").await.unwrap();

        let updated = svc
            .update_profile(a.user.id, Some("Alicia"), Some("alicia@x.com"))
            .await
            .unwrap();
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.email, "alicia@x.com");
        svc.login("alicia@x.com", "pw").await.unwrap();

        let err = svc
            .update_profile(a.user.id, None, Some("b@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists));

        let err = svc
            .update_profile(Uuid::new_v4(), Some("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_change_password() {
        let (svc, _store) = service();
        let a = svc.register("Alice", "a@x.com", "old-pw").await.unwrap();

        let err = svc
            .change_password(a.user.id, "not-it", "new-pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        svc.change_password(a.user.id, "old-pw", "new-pw")
            .await
            .unwrap();
        assert!(matches!(
            svc.login("a@x.com", "old-pw").await,
            Err(AuthError::InvalidCredentials)
        ));
        svc.login("a@x.com", "new-pw").await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let (svc, store) = service();
        assert!(
            svc.ensure_user("Admin", "admin@x.com", "pw", Role::Admin)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            svc.ensure_user("Admin", "admin@x.com", "pw", Role::Admin)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_admin_create_user_with_role() {
        let (svc, _store) = service();
        let created = svc
            .create_user("Mia", "mia@x.com", "pw", Role::Manager)
            .await
            .unwrap();
        assert_eq!(created.role, Role::Manager);

        let session = svc.login("mia@x.com", "pw").await.unwrap();
        assert_eq!(session.user, created);
        let claims = svc.verify_token(&session.token).unwrap();
        assert_eq!(claims.role, Role::Manager);

        assert!(matches!(
            svc.create_user("Other", "mia@x.com", "pw", Role::User).await,
            Err(AuthError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_admin_update_user() {
        let (svc, _store) = service();
        let a = svc.register("A", "a@x.com", "old-pw").await.unwrap();
        svc.register("B", "b@x.com", "pw").await.unwrap();

        let updated = svc
            .update_user(
                a.user.id,
                UserUpdate {
                    name: Some("Ann"),
                    role: Some(Role::Admin),
                    password: Some("new-pw"),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ann");
        assert_eq!(updated.email, "a@x.com");
        assert_eq!(updated.role, Role::Admin);
        svc.login("a@x.com", "new-pw").await.unwrap();

        // Empty password leaves the current one in place
        svc.update_user(
            a.user.id,
            UserUpdate {
                password: Some(""),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        svc.login("a@x.com", "new-pw").await.unwrap();

        let err = svc
            .update_user(
                a.user.id,
                UserUpdate {
                    email: Some("b@x.com"),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists));

        let err = svc
            .update_user(Uuid::new_v4(), UserUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_set_role_and_delete_user() {
        let (svc, store) = service();
        let a = svc.register("A", "a@x.com", "pw").await.unwrap();

        let promoted = svc.set_role(a.user.id, Role::Manager).await.unwrap();
        assert_eq!(promoted.role, Role::Manager);
        assert!(matches!(
            svc.set_role(Uuid::new_v4(), Role::Admin).await,
            Err(AuthError::NotFound)
        ));

        svc.delete_user(a.user.id).await.unwrap();
        assert_eq!(store.user_count().await, 0);
        assert!(matches!(
            svc.delete_user(a.user.id).await,
            Err(AuthError::NotFound)
        ));
        assert!(matches!(
            svc.login("a@x.com", "pw").await,
            Err(AuthError::NotFound)
        ));

        // Outstanding tokens no longer resolve to a user
        let claims = svc.verify_token(&a.token).unwrap();
        assert!(matches!(
            svc.current_user(&claims).await,
            Err(AuthError::TokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_seed_initial_admin() {
        let (svc, store) = service();
        let admin = InitialAdminConfig {
            name: "Admin".to_string(),
            email: "admin@x.com".to_string(),
            password: "admin-pw".to_string(),
        };
        svc.seed_initial_admin(&admin).await.unwrap();
        svc.seed_initial_admin(&admin).await.unwrap();
        assert_eq!(store.user_count().await, 1);

        let session = svc.login("admin@x.com", "admin-pw").await.unwrap();
        assert_eq!(session.user.role, Role::Admin);
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            AuthError::from(StoreError::DuplicateKey),
            AuthError::AlreadyExists
        ));
        assert!(matches!(
            AuthError::from(StoreError::Backend(anyhow::anyhow!("connection refused"))),
            AuthError::Internal(_)
        ));
    }
}
