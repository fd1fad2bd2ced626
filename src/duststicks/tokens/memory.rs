//! In-memory [`TokenStore`] used by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, MutexGuard,
};
use uuid::Uuid;

use super::{NewToken, Token, TokenKind, TokenStore};
use crate::duststicks::db::{StoreError, StoreResult};

#[derive(Debug, Default)]
pub(crate) struct MemoryTokenStore {
    rows: Mutex<Vec<Token>>,
    forced_conflicts: AtomicUsize,
}

impl MemoryTokenStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail as if the secret collided.
    pub(crate) fn force_conflicts(&self, count: usize) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }

    pub(crate) fn rows(&self) -> Vec<Token> {
        self.lock().clone()
    }

    /// Insert a row verbatim, bypassing the uniqueness checks.
    pub(crate) fn seed(&self, token: Token) {
        self.lock().push(token);
    }

    pub(crate) fn live_count(&self, kind: TokenKind, owner_id: Uuid) -> usize {
        let now = Utc::now();
        self.lock()
            .iter()
            .filter(|row| row.kind == kind && row.owner_id == owner_id && row.is_live_at(now))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Token>> {
        self.rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn take_forced_conflict(&self) -> bool {
        self.forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn push(rows: &mut Vec<Token>, token: NewToken) -> StoreResult<Token> {
        if rows.iter().any(|row| row.secret == token.secret) {
            return Err(StoreError::Conflict);
        }
        if token.kind.rotates()
            && rows
                .iter()
                .any(|row| row.kind == token.kind && row.owner_id == token.owner_id)
        {
            return Err(StoreError::Conflict);
        }
        let stored = Token {
            id: Uuid::new_v4(),
            owner_id: token.owner_id,
            kind: token.kind,
            secret: token.secret,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
            updated_at: token.issued_at,
        };
        rows.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, token: NewToken) -> StoreResult<Token> {
        if self.take_forced_conflict() {
            return Err(StoreError::Conflict);
        }
        Self::push(&mut self.lock(), token)
    }

    async fn rotate(&self, token: NewToken) -> StoreResult<Token> {
        if self.take_forced_conflict() {
            return Err(StoreError::Conflict);
        }
        let mut rows = self.lock();
        rows.retain(|row| !(row.kind == token.kind && row.owner_id == token.owner_id));
        Self::push(&mut rows, token)
    }

    async fn delete_by_kind_and_owner(&self, kind: TokenKind, owner_id: Uuid) -> StoreResult<u64> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|row| !(row.kind == kind && row.owner_id == owner_id));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_by_secret(&self, kind: TokenKind, secret: &str) -> StoreResult<u64> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|row| !(row.kind == kind && row.secret == secret));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|row| row.expires_at >= now);
        Ok((before - rows.len()) as u64)
    }

    async fn find_live(
        &self,
        kind: TokenKind,
        secret: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Token>> {
        Ok(self
            .lock()
            .iter()
            .find(|row| row.kind == kind && row.secret == secret && row.is_live_at(now))
            .cloned())
    }
}
