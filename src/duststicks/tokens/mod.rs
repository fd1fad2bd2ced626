//! Token issuance, storage and expiry.
//!
//! Flow Overview:
//! - registration issues a `verification` token (8 chars, 12 h),
//! - login issues a `session` token and a `csrf` token (32 chars, 24 h each),
//!   each rotating out the owner's previous token of the same kind,
//! - the sweeper deletes rows whose `expires_at` has passed.
//!
//! Lookups never trust the sweeper: they filter on `expires_at > now` themselves.

pub mod issuer;
pub mod kind;
pub mod secret;
pub mod store;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod memory;

pub use issuer::TokenIssuer;
pub use kind::TokenKind;
pub use store::{PgTokenStore, TokenStore};
pub use sweeper::{spawn_sweeper, SweeperConfig};

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use super::db::StoreError;

/// A persisted credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: TokenKind,
    pub secret: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Token {
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("kind", &self.kind)
            .field("secret", &"***")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Values for a row about to be inserted.
#[derive(Clone)]
pub struct NewToken {
    pub owner_id: Uuid,
    pub kind: TokenKind,
    pub secret: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewToken {
    /// Stamp a secret with `issued_at` and `issued_at + ttl(kind)`.
    #[must_use]
    pub fn new(owner_id: Uuid, kind: TokenKind, secret: String, issued_at: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            kind,
            secret,
            issued_at,
            expires_at: issued_at + kind.ttl(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to generate token secret: {0}")]
    Generation(#[source] rand::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
