//! User records and the `users` table.

pub mod validation;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::{fmt, time::Duration};
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::db::{with_timeout, StoreResult, QUERY_TIMEOUT};

/// The public view of a user. Never carries the password digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What login needs to check a password.
#[derive(Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub password_digest: String,
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("id", &self.id)
            .field("password_digest", &"***")
            .finish()
    }
}

#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_digest: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. A taken email or username fails with `Conflict`.
    async fn insert(&self, user: NewUser) -> StoreResult<User>;

    async fn find_credentials_by_email(&self, email: &str) -> StoreResult<Option<UserCredentials>>;

    async fn find_public(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Returns `false` if no such user exists.
    async fn mark_verified(&self, id: Uuid) -> StoreResult<bool>;

    /// Remove a user. Returns `false` if no such user exists.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: QUERY_TIMEOUT,
        }
    }
}

const PUBLIC_COLUMNS: &str = "id, username, email, verified, created_at, updated_at";

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let verified: i32 = row.try_get("verified")?;

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        verified: verified != 0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let query = format!(
            r"
            INSERT INTO users (username, email, password)
            VALUES ($1, $2, $3)
            RETURNING {PUBLIC_COLUMNS}
        "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );

        with_timeout(self.timeout, async {
            let row = sqlx::query(&query)
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.password_digest)
                .fetch_one(&self.pool)
                .instrument(span)
                .await?;
            user_from_row(&row)
        })
        .await
    }

    async fn find_credentials_by_email(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        let query = "SELECT id, password FROM users WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );

        with_timeout(self.timeout, async {
            let row = sqlx::query(query)
                .bind(email)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await?;

            match row {
                Some(row) => Ok(Some(UserCredentials {
                    id: row.try_get("id")?,
                    password_digest: row.try_get("password")?,
                })),
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_public(&self, id: Uuid) -> StoreResult<Option<User>> {
        let query = format!("SELECT {PUBLIC_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );

        with_timeout(self.timeout, async {
            let row = sqlx::query(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await?;
            row.as_ref().map(user_from_row).transpose()
        })
        .await
    }

    async fn mark_verified(&self, id: Uuid) -> StoreResult<bool> {
        let query = "UPDATE users SET verified = 1, updated_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );

        with_timeout(self.timeout, async {
            let result = sqlx::query(query)
                .bind(id)
                .execute(&self.pool)
                .instrument(span)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let query = "DELETE FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );

        with_timeout(self.timeout, async {
            let result = sqlx::query(query)
                .bind(id)
                .execute(&self.pool)
                .instrument(span)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}
