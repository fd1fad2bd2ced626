//! Issues and revokes tokens on behalf of the auth handlers.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{secret, NewToken, Token, TokenError, TokenKind, TokenStore};
use crate::duststicks::db::StoreError;

/// Attempts per issuance before a uniqueness conflict is reported.
pub const MAX_ISSUE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn TokenStore>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Issue the 8-character email verification code (12 h).
    ///
    /// # Errors
    /// `Generation` if the OS RNG fails, `Store` if persistence fails.
    pub async fn issue_verification_token(&self, owner_id: Uuid) -> Result<Token, TokenError> {
        self.issue(owner_id, TokenKind::Verification).await
    }

    /// Revoke the owner's session token and issue a new one (32 chars, 24 h).
    ///
    /// # Errors
    /// `Generation` if the OS RNG fails, `Store` if persistence fails.
    pub async fn issue_session_token(&self, owner_id: Uuid) -> Result<Token, TokenError> {
        self.issue(owner_id, TokenKind::Session).await
    }

    /// Revoke the owner's CSRF token and issue a new one (32 chars, 24 h).
    ///
    /// # Errors
    /// `Generation` if the OS RNG fails, `Store` if persistence fails.
    pub async fn issue_csrf_token(&self, owner_id: Uuid) -> Result<Token, TokenError> {
        self.issue(owner_id, TokenKind::Csrf).await
    }

    /// Generate a secret for `kind` and persist it, rotating when the kind says so.
    ///
    /// Uniqueness conflicts (a colliding secret, or a concurrent rotation for
    /// the same owner) are retried with a fresh secret.
    ///
    /// # Errors
    /// `Generation` if the OS RNG fails, `Store` if persistence fails or every
    /// attempt conflicted.
    pub async fn issue(&self, owner_id: Uuid, kind: TokenKind) -> Result<Token, TokenError> {
        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let secret = secret::generate(kind.secret_length()).map_err(TokenError::Generation)?;
            let token = NewToken::new(owner_id, kind, secret, Utc::now());

            let result = if kind.rotates() {
                self.store.rotate(token).await
            } else {
                self.store.insert(token).await
            };

            match result {
                Ok(token) => {
                    debug!(token_id = %token.id, %owner_id, %kind, "issued token");
                    return Ok(token);
                }
                Err(StoreError::Conflict) => {
                    warn!(%owner_id, %kind, attempt, "token insert conflicted, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(StoreError::Conflict.into())
    }

    /// Revoke a session by its secret, along with the owner's CSRF token.
    ///
    /// # Errors
    /// Returns a store error if either delete fails.
    pub async fn revoke_session(&self, owner_id: Uuid, session_secret: &str) -> Result<(), TokenError> {
        let sessions = self
            .store
            .delete_by_secret(TokenKind::Session, session_secret)
            .await?;
        let csrf = self
            .store
            .delete_by_kind_and_owner(TokenKind::Csrf, owner_id)
            .await?;

        debug!(%owner_id, sessions, csrf, "revoked session");

        Ok(())
    }

    /// Owner of a live verification code, if any. Nothing is deleted.
    ///
    /// # Errors
    /// Returns a store error if the lookup fails.
    pub async fn verification_owner(&self, secret: &str) -> Result<Option<Uuid>, TokenError> {
        let token = self
            .store
            .find_live(TokenKind::Verification, secret, Utc::now())
            .await?;

        Ok(token.map(|token| token.owner_id))
    }

    /// Delete every verification code of `owner_id`. Run once the owner is
    /// marked verified, so a failed update leaves the code usable.
    ///
    /// # Errors
    /// Returns a store error if the delete fails.
    pub async fn clear_verification(&self, owner_id: Uuid) -> Result<u64, TokenError> {
        let removed = self
            .store
            .delete_by_kind_and_owner(TokenKind::Verification, owner_id)
            .await?;

        debug!(%owner_id, removed, "cleared verification codes");

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duststicks::tokens::{memory::MemoryTokenStore, secret::ALPHABET};
    use anyhow::Result;
    use chrono::Duration;

    fn issuer() -> (Arc<MemoryTokenStore>, TokenIssuer) {
        let store = Arc::new(MemoryTokenStore::new());
        (store.clone(), TokenIssuer::new(store))
    }

    fn assert_secret_shape(token: &Token, length: usize) {
        assert_eq!(token.secret.len(), length);
        assert!(token.secret.bytes().all(|byte| ALPHABET.contains(&byte)));
    }

    #[tokio::test]
    async fn verification_token_shape() -> Result<()> {
        let (_store, issuer) = issuer();
        let owner = Uuid::new_v4();
        let token = issuer.issue_verification_token(owner).await?;

        assert_eq!(token.kind, TokenKind::Verification);
        assert_eq!(token.owner_id, owner);
        assert_secret_shape(&token, 8);
        assert_eq!(token.expires_at - token.issued_at, Duration::hours(12));
        Ok(())
    }

    #[tokio::test]
    async fn session_and_csrf_are_distinct_rows() -> Result<()> {
        let (store, issuer) = issuer();
        let owner = Uuid::new_v4();
        let session = issuer.issue_session_token(owner).await?;
        let csrf = issuer.issue_csrf_token(owner).await?;

        assert_secret_shape(&session, 32);
        assert_secret_shape(&csrf, 32);
        assert_eq!(session.kind, TokenKind::Session);
        assert_eq!(csrf.kind, TokenKind::Csrf);
        assert_ne!(session.id, csrf.id);
        assert_ne!(session.secret, csrf.secret);
        assert_eq!(csrf.expires_at - csrf.issued_at, Duration::hours(24));
        assert_eq!(store.rows().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn reissuing_session_rotates_previous() -> Result<()> {
        let (store, issuer) = issuer();
        let owner = Uuid::new_v4();
        let first = issuer.issue_session_token(owner).await?;
        let second = issuer.issue_session_token(owner).await?;

        assert_eq!(store.live_count(TokenKind::Session, owner), 1);
        let rows = store.rows();
        assert!(rows.iter().all(|row| row.id != first.id));
        assert!(rows.iter().any(|row| row.id == second.id));
        Ok(())
    }

    #[tokio::test]
    async fn rotation_is_scoped_to_owner_and_kind() -> Result<()> {
        let (store, issuer) = issuer();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        issuer.issue_session_token(alice).await?;
        issuer.issue_csrf_token(alice).await?;
        issuer.issue_session_token(bob).await?;
        issuer.issue_session_token(alice).await?;

        assert_eq!(store.live_count(TokenKind::Session, alice), 1);
        assert_eq!(store.live_count(TokenKind::Csrf, alice), 1);
        assert_eq!(store.live_count(TokenKind::Session, bob), 1);
        Ok(())
    }

    #[tokio::test]
    async fn verification_tokens_do_not_rotate() -> Result<()> {
        let (store, issuer) = issuer();
        let owner = Uuid::new_v4();
        issuer.issue_verification_token(owner).await?;
        issuer.issue_verification_token(owner).await?;

        assert_eq!(store.live_count(TokenKind::Verification, owner), 2);
        Ok(())
    }

    #[tokio::test]
    async fn conflicts_are_retried() -> Result<()> {
        let (store, issuer) = issuer();
        store.force_conflicts(MAX_ISSUE_ATTEMPTS - 1);

        let token = issuer.issue_session_token(Uuid::new_v4()).await?;
        assert_secret_shape(&token, 32);
        Ok(())
    }

    #[tokio::test]
    async fn persistent_conflict_is_a_store_error() {
        let (store, issuer) = issuer();
        store.force_conflicts(MAX_ISSUE_ATTEMPTS);

        let result = issuer.issue_verification_token(Uuid::new_v4()).await;
        assert!(matches!(
            result,
            Err(TokenError::Store(StoreError::Conflict))
        ));
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn revoke_session_removes_session_and_csrf() -> Result<()> {
        let (store, issuer) = issuer();
        let owner = Uuid::new_v4();
        let session = issuer.issue_session_token(owner).await?;
        issuer.issue_csrf_token(owner).await?;
        issuer.issue_verification_token(owner).await?;

        issuer.revoke_session(owner, &session.secret).await?;

        assert_eq!(store.live_count(TokenKind::Session, owner), 0);
        assert_eq!(store.live_count(TokenKind::Csrf, owner), 0);
        assert_eq!(store.live_count(TokenKind::Verification, owner), 1);
        Ok(())
    }

    #[tokio::test]
    async fn verification_owner_keeps_code_until_cleared() -> Result<()> {
        let (store, issuer) = issuer();
        let owner = Uuid::new_v4();
        let token = issuer.issue_verification_token(owner).await?;
        issuer.issue_verification_token(owner).await?;

        assert_eq!(issuer.verification_owner(&token.secret).await?, Some(owner));
        assert_eq!(issuer.verification_owner(&token.secret).await?, Some(owner));

        assert_eq!(issuer.clear_verification(owner).await?, 2);
        assert_eq!(issuer.verification_owner(&token.secret).await?, None);
        assert!(store.rows().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn verification_owner_ignores_expired() -> Result<()> {
        let (store, issuer) = issuer();
        let owner = Uuid::new_v4();
        let issued_at = Utc::now() - Duration::hours(13);
        store.seed(Token {
            id: Uuid::new_v4(),
            owner_id: owner,
            kind: TokenKind::Verification,
            secret: "Expired1".to_string(),
            issued_at,
            expires_at: issued_at + TokenKind::Verification.ttl(),
            updated_at: issued_at,
        });

        assert_eq!(issuer.verification_owner("Expired1").await?, None);
        Ok(())
    }
}
