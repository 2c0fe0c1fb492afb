use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parkwise_common::models::auth::{Role, UserSummary};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "user_id, name, email, password_hash, role, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn role(&self) -> Result<Role> {
        self.role
            .parse::<Role>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid role stored for user {}", self.user_id))
    }

    /// Client-safe view of the row (drops the password hash)
    pub fn to_summary(&self) -> Result<UserSummary> {
        Ok(UserSummary {
            id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role()?,
        })
    }
}

pub struct UserRepo;

impl UserRepo {
    /// Insert a user. A duplicate email surfaces as a unique violation
    /// (see [`crate::is_unique_violation`]).
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"INSERT INTO "user" (user_id, name, email, password_hash, role) VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(pool)
        .await
        .context("Failed to create user")?;
        Ok(row)
    }

    pub async fn get_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" WHERE email = $1"#
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;
        Ok(row)
    }

    pub async fn get_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" WHERE user_id = $1"#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by id")?;
        Ok(row)
    }

    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<UserRow>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" ORDER BY created_at DESC LIMIT $1 OFFSET $2"#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;
        Ok(rows)
    }

    /// Update name and/or email. `None` leaves the column unchanged.
    /// Returns `None` if the user does not exist.
    pub async fn update_profile(
        pool: &PgPool,
        user_id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE "user"
            SET name = COALESCE($2, name), email = COALESCE($3, email), updated_at = NOW()
            WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(name)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to update user profile")?;
        Ok(row)
    }

    /// Returns `false` if the user does not exist.
    pub async fn update_password(
        pool: &PgPool,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE "user" SET password_hash = $2, updated_at = NOW() WHERE user_id = $1"#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .await
        .context("Failed to update password")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_role(pool: &PgPool, user_id: Uuid, role: Role) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"UPDATE "user" SET role = $2, updated_at = NOW() WHERE user_id = $1 RETURNING {USER_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(pool)
        .await
        .context("Failed to set user role")?;
        Ok(row)
    }

    /// Returns `false` if the user does not exist. Their bookings go with them.
    pub async fn delete(pool: &PgPool, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM "user" WHERE user_id = $1"#)
            .bind(user_id)
            .execute(pool)
            .await
            .context("Failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }
}
