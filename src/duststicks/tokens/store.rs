//! Typed access to the `tokens` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use super::{NewToken, Token, TokenKind};
use crate::duststicks::db::{with_timeout, StoreError, StoreResult, QUERY_TIMEOUT};

const RETURNING: &str = "id, user_id, token_type, token, expires_at, created_at, updated_at";

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a row. A duplicate secret fails with [`StoreError::Conflict`].
    async fn insert(&self, token: NewToken) -> StoreResult<Token>;

    /// Replace the owner's token of `token.kind` with `token` atomically.
    /// Only a duplicate secret fails with [`StoreError::Conflict`].
    async fn rotate(&self, token: NewToken) -> StoreResult<Token>;

    async fn delete_by_kind_and_owner(&self, kind: TokenKind, owner_id: Uuid) -> StoreResult<u64>;

    async fn delete_by_secret(&self, kind: TokenKind, secret: &str) -> StoreResult<u64>;

    /// Delete every token whose `expires_at` is before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Find a token of `kind` with this secret that is still live at `now`.
    async fn find_live(
        &self,
        kind: TokenKind,
        secret: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Token>>;
}

/// PostgreSQL-backed [`TokenStore`].
///
/// Request-scoped calls are bounded by `timeout`. `delete_expired` is left to
/// the caller (the sweeper applies its own, longer bound).
#[derive(Clone, Debug)]
pub struct PgTokenStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: QUERY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn token_from_row(row: &PgRow) -> StoreResult<Token> {
    let kind: String = row.try_get("token_type")?;
    let kind = kind
        .parse::<TokenKind>()
        .map_err(|err| StoreError::InvalidRow(err.to_string()))?;

    Ok(Token {
        id: row.try_get("id")?,
        owner_id: row.try_get("user_id")?,
        kind,
        secret: row.try_get("token")?,
        issued_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn insert_query() -> String {
    format!(
        r"
        INSERT INTO tokens (user_id, token_type, token, expires_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING {RETURNING}
    "
    )
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, token: NewToken) -> StoreResult<Token> {
        let query = insert_query();
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );

        with_timeout(self.timeout, async {
            let row = sqlx::query(&query)
                .bind(token.owner_id)
                .bind(token.kind.as_str())
                .bind(&token.secret)
                .bind(token.expires_at)
                .bind(token.issued_at)
                .fetch_one(&self.pool)
                .instrument(span)
                .await?;
            token_from_row(&row)
        })
        .await
    }

    async fn rotate(&self, token: NewToken) -> StoreResult<Token> {
        // Upsert on the partial unique index (user_id, token_type). Concurrent
        // rotations for one owner serialize on it and the last writer wins.
        // The fresh id retires the previous token.
        let query = format!(
            r"
            INSERT INTO tokens (user_id, token_type, token, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (user_id, token_type) WHERE token_type IN ('session', 'csrf')
            DO UPDATE SET
                id = EXCLUDED.id,
                token = EXCLUDED.token,
                expires_at = EXCLUDED.expires_at,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            RETURNING {RETURNING}
        "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPSERT",
            db.statement = query.as_str()
        );

        with_timeout(self.timeout, async {
            let row = sqlx::query(&query)
                .bind(token.owner_id)
                .bind(token.kind.as_str())
                .bind(&token.secret)
                .bind(token.expires_at)
                .bind(token.issued_at)
                .fetch_one(&self.pool)
                .instrument(span)
                .await?;
            token_from_row(&row)
        })
        .await
    }

    async fn delete_by_kind_and_owner(&self, kind: TokenKind, owner_id: Uuid) -> StoreResult<u64> {
        let query = "DELETE FROM tokens WHERE token_type = $1 AND user_id = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );

        with_timeout(self.timeout, async {
            let result = sqlx::query(query)
                .bind(kind.as_str())
                .bind(owner_id)
                .execute(&self.pool)
                .instrument(span)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn delete_by_secret(&self, kind: TokenKind, secret: &str) -> StoreResult<u64> {
        let query = "DELETE FROM tokens WHERE token_type = $1 AND token = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );

        with_timeout(self.timeout, async {
            let result = sqlx::query(query)
                .bind(kind.as_str())
                .bind(secret)
                .execute(&self.pool)
                .instrument(span)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let query = "DELETE FROM tokens WHERE expires_at < $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );

        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_live(
        &self,
        kind: TokenKind,
        secret: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Token>> {
        let query = format!(
            r"
            SELECT {RETURNING}
            FROM tokens
            WHERE token_type = $1
              AND token = $2
              AND expires_at > $3
            LIMIT 1
        "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );

        with_timeout(self.timeout, async {
            let row = sqlx::query(&query)
                .bind(kind.as_str())
                .bind(secret)
                .bind(now)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await?;
            row.as_ref().map(token_from_row).transpose()
        })
        .await
    }
}
