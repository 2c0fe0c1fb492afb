use anyhow::Result;
use async_trait::async_trait;
use parkwise_common::models::auth::{Role, UserSummary};
use parkwise_db::{UserRepo, UserRow, is_unique_violation};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A stored user, including the password hash. Never serialized to clients.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl UserRecord {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

impl TryFrom<UserRow> for UserRecord {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = row.role()?;
        Ok(Self {
            id: row.user_id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
        })
    }
}

/// Fields for a user about to be created
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    DuplicateKey,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Durable user storage keyed by email. Emails are compared exactly
/// (case-sensitive).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;
    /// Fails with `DuplicateKey` if the email is taken; nothing is written then.
    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError>;
    /// `None` fields are left unchanged. Returns `Ok(None)` for an unknown id.
    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, StoreError>;
    /// Returns `false` for an unknown id.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError>;
    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<UserRecord>, StoreError>;
    /// Returns `false` for an unknown id.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

fn map_write_error(err: anyhow::Error) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::DuplicateKey
    } else {
        StoreError::Backend(err)
    }
}

/// PostgreSQL-backed store. The `UNIQUE` constraint on email settles
/// concurrent registrations of the same address.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = UserRepo::get_by_email(&self.pool, email).await?;
        Ok(row.map(UserRecord::try_from).transpose()?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = UserRepo::get_by_id(&self.pool, id).await?;
        Ok(row.map(UserRecord::try_from).transpose()?)
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let row = UserRepo::create(
            &self.pool,
            Uuid::new_v4(),
            &user.name,
            &user.email,
            &user.password_hash,
            user.role,
        )
        .await
        .map_err(map_write_error)?;
        Ok(UserRecord::try_from(row)?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, StoreError> {
        let row = UserRepo::update_profile(&self.pool, id, name, email)
            .await
            .map_err(map_write_error)?;
        Ok(row.map(UserRecord::try_from).transpose()?)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        Ok(UserRepo::update_password(&self.pool, id, password_hash).await?)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<UserRecord>, StoreError> {
        let row = UserRepo::set_role(&self.pool, id, role).await?;
        Ok(row.map(UserRecord::try_from).transpose()?)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(UserRepo::delete(&self.pool, id).await?)
    }
}

/// In-memory store for tests and local experiments
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateKey);
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        if let Some(email) = email {
            if users.values().any(|u| u.email == email && u.id != id) {
                return Err(StoreError::DuplicateKey);
            }
        }
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            user.name = name.to_string();
        }
        if let Some(email) = email {
            user.email = email.to_string();
        }
        Ok(Some(user.clone()))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_in_memory_create_and_find() {
        let store = InMemoryCredentialStore::new();
        let created = store.create(new_user("a@x.com")).await.unwrap();

        let by_email = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@x.com");

        assert!(store.find_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_duplicate_email_does_not_mutate() {
        let store = InMemoryCredentialStore::new();
        store.create(new_user("a@x.com")).await.unwrap();

        let mut second = new_user("a@x.com");
        second.password_hash = "other".to_string();
        let err = store.create(second).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));

        assert_eq!(store.user_count().await, 1);
        let stored = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_in_memory_email_is_case_sensitive() {
        let store = InMemoryCredentialStore::new();
        store.create(new_user("Alice@x.com")).await.unwrap();
        assert!(store.find_by_email("alice@x.com").await.unwrap().is_none());
        // Differently-cased address is a distinct key
        store.create(new_user("alice@x.com")).await.unwrap();
        assert_eq!(store.user_count().await, 2);
    }

    #[tokio::test]
    async fn test_in_memory_update_profile() {
        let store = InMemoryCredentialStore::new();
        let a = store.create(new_user("a@x.com")).await.unwrap();
        store.create(new_user("b@x.com")).await.unwrap();

        let updated = store
            .update_profile(a.id, Some("Renamed"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.email, "a@x.com");

        let err = store
            .update_profile(a.id, None, Some("b@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));

        // Re-submitting your own email is not a conflict
        assert!(
            store
                .update_profile(a.id, None, Some("a@x.com"))
                .await
                .unwrap()
                .is_some()
        );

        assert!(
            store
                .update_profile(Uuid::new_v4(), Some("x"), None)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_in_memory_update_password() {
        let store = InMemoryCredentialStore::new();
        let a = store.create(new_user("a@x.com")).await.unwrap();
        assert!(store.update_password(a.id, "new-hash").await.unwrap());
        assert_eq!(
            store.find_by_id(a.id).await.unwrap().unwrap().password_hash,
            "new-hash"
        );
        assert!(!store.update_password(Uuid::new_v4(), "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_set_role_and_delete() {
        let store = InMemoryCredentialStore::new();
        let a = store.create(new_user("a@x.com")).await.unwrap();

        let promoted = store.set_role(a.id, Role::Manager).await.unwrap().unwrap();
        assert_eq!(promoted.role, Role::Manager);
        assert_eq!(
            store.find_by_id(a.id).await.unwrap().unwrap().role,
            Role::Manager
        );
        assert!(
            store
                .set_role(Uuid::new_v4(), Role::Admin)
                .await
                .unwrap()
                .is_none()
        );

        assert!(store.delete(a.id).await.unwrap());
        assert!(!store.delete(a.id).await.unwrap());
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
        assert_eq!(store.user_count().await, 0);
    }

    #[test]
    fn test_summary_drops_hash() {
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            password_hash: "secret-hash".to_string(),
            role: Role::Admin,
        };
        let json = serde_json::to_string(&record.summary()).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
