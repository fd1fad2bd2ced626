//! Token kinds and the per-kind issuance policy.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

/// Closed set of credentials stored in the `tokens` table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Email verification code sent after registration.
    Verification,
    /// Bearer value of the `session_token` cookie.
    Session,
    /// Bearer value of the `csrf_token` cookie, echoed in `X-CSRF-Token`.
    Csrf,
}

/// Length, lifetime and reissue behavior for one kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KindPolicy {
    pub secret_length: usize,
    pub ttl_hours: i64,
    /// Reissuing deletes the owner's previous token of this kind.
    pub rotates: bool,
}

const VERIFICATION_POLICY: KindPolicy = KindPolicy {
    secret_length: 8,
    ttl_hours: 12,
    rotates: false,
};

const SESSION_POLICY: KindPolicy = KindPolicy {
    secret_length: 32,
    ttl_hours: 24,
    rotates: true,
};

// Same width as session secrets; a separate row with its own TTL.
const CSRF_POLICY: KindPolicy = KindPolicy {
    secret_length: 32,
    ttl_hours: 24,
    rotates: true,
};

impl TokenKind {
    pub const ALL: [Self; 3] = [Self::Verification, Self::Session, Self::Csrf];

    #[must_use]
    pub const fn policy(self) -> KindPolicy {
        match self {
            Self::Verification => VERIFICATION_POLICY,
            Self::Session => SESSION_POLICY,
            Self::Csrf => CSRF_POLICY,
        }
    }

    #[must_use]
    pub const fn secret_length(self) -> usize {
        self.policy().secret_length
    }

    #[must_use]
    pub fn ttl(self) -> Duration {
        Duration::hours(self.policy().ttl_hours)
    }

    #[must_use]
    pub const fn rotates(self) -> bool {
        self.policy().rotates
    }

    /// Value stored in the `token_type` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Session => "session",
            Self::Csrf => "csrf",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown token kind: {0}")]
pub struct UnknownTokenKind(pub String);

impl FromStr for TokenKind {
    type Err = UnknownTokenKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "verification" => Ok(Self::Verification),
            "session" => Ok(Self::Session),
            "csrf" => Ok(Self::Csrf),
            other => Err(UnknownTokenKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_table_matches_kinds() {
        assert_eq!(TokenKind::Verification.secret_length(), 8);
        assert_eq!(TokenKind::Verification.ttl(), Duration::hours(12));
        assert!(!TokenKind::Verification.rotates());

        assert_eq!(TokenKind::Session.secret_length(), 32);
        assert_eq!(TokenKind::Session.ttl(), Duration::hours(24));
        assert!(TokenKind::Session.rotates());

        assert_eq!(TokenKind::Csrf.secret_length(), 32);
        assert_eq!(TokenKind::Csrf.ttl(), Duration::hours(24));
        assert!(TokenKind::Csrf.rotates());
    }

    #[test]
    fn column_values_parse_back() {
        for kind in TokenKind::ALL {
            assert_eq!(kind.as_str().parse::<TokenKind>().ok(), Some(kind));
        }
        assert!("email_verification".parse::<TokenKind>().is_err());
    }

    #[test]
    fn serde_uses_column_names() -> serde_json::Result<()> {
        assert_eq!(serde_json::to_string(&TokenKind::Csrf)?, "\"csrf\"");
        Ok(())
    }
}
