//! In-memory [`UserStore`] used by unit tests.

use async_trait::async_trait;
use chrono::Utc;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use uuid::Uuid;

use super::{NewUser, User, UserCredentials, UserStore};
use crate::duststicks::db::{StoreError, StoreResult};

#[derive(Clone)]
struct Row {
    user: User,
    password_digest: String,
}

#[derive(Default)]
pub(crate) struct MemoryUserStore {
    rows: Mutex<Vec<Row>>,
    fail_mark_verified: AtomicBool,
}

impl MemoryUserStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, id: Uuid) -> Option<User> {
        self.lock()
            .iter()
            .find(|row| row.user.id == id)
            .map(|row| row.user.clone())
    }

    /// While set, `mark_verified` times out without touching any row.
    pub(crate) fn fail_mark_verified(&self, fail: bool) {
        self.fail_mark_verified.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let mut rows = self.lock();
        if rows
            .iter()
            .any(|row| row.user.email == user.email || row.user.username == user.username)
        {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let stored = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            verified: false,
            created_at: now,
            updated_at: now,
        };
        rows.push(Row {
            user: stored.clone(),
            password_digest: user.password_digest,
        });
        Ok(stored)
    }

    async fn find_credentials_by_email(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        Ok(self
            .lock()
            .iter()
            .find(|row| row.user.email == email)
            .map(|row| UserCredentials {
                id: row.user.id,
                password_digest: row.password_digest.clone(),
            }))
    }

    async fn find_public(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.get(id))
    }

    async fn mark_verified(&self, id: Uuid) -> StoreResult<bool> {
        if self.fail_mark_verified.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout(Duration::from_secs(2)));
        }

        let mut rows = self.lock();
        match rows.iter_mut().find(|row| row.user.id == id) {
            Some(row) => {
                row.user.verified = true;
                row.user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|row| row.user.id != id);
        Ok(rows.len() < before)
    }
}
