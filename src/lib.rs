//! # Duststicks backend
//!
//! `duststicks` serves the accounts side of the Duststicks game: registration,
//! email verification, cookie sessions and CSRF-protected state changes.
//!
//! ## Tokens
//!
//! Every credential is a row in the `tokens` table with a kind
//! (`verification`, `session`, `csrf`). Each kind has its own secret length and
//! time-to-live. Issuing a new `session` or `csrf` token revokes the previous
//! one of the same kind for the same user (rotate-on-reissue); expired rows are
//! removed hourly by a background sweeper, and every lookup filters on
//! `expires_at > now` so an expired row is dead even before it is swept.
//!
//! ## Request pipeline
//!
//! Routes are composed from an ordered list of middlewares around a terminal
//! handler. The first middleware listed is the outermost one, so panic
//! recovery is always listed first and covers the session and CSRF guards.
//!
//! ## CSRF
//!
//! State-changing authenticated routes use the double-submit cookie pattern:
//! the `csrf_token` cookie must be echoed in the `X-CSRF-Token` header and
//! must still exist (unexpired) in the store.

pub mod cli;
pub mod duststicks;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
