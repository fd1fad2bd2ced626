//! Request bodies for the auth endpoints and their input rules.

use regex::Regex;
use serde::Deserialize;
use std::{fmt, sync::LazyLock};
use utoipa::ToSchema;

use crate::duststicks::error::ValidationErrors;

pub const USERNAME_LENGTH: std::ops::RangeInclusive<usize> = 4..=12;
pub const PASSWORD_LENGTH: std::ops::RangeInclusive<usize> = 8..=72;
const EMAIL_MIN_LENGTH: usize = 4;

static USERNAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").ok());

const CONTAINS_WHITESPACE: &str = "contains whitespace";

#[derive(Clone, Deserialize, ToSchema)]
pub struct RegistrationRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl RegistrationRequest {
    /// Check every field and collect every failed rule.
    ///
    /// # Errors
    /// Returns the reasons, keyed by field, when any rule fails.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_username(&self.username, &mut errors);
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        errors.into_result()
    }
}

#[derive(Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl LoginRequest {
    /// # Errors
    /// Returns the reasons, keyed by field, when any rule fails.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        errors.into_result()
    }
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub token: String,
}

/// Lowercase an email for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

fn check_whitespace(field: &str, value: &str, errors: &mut ValidationErrors) {
    if value.chars().any(char::is_whitespace) {
        errors.add(field, CONTAINS_WHITESPACE);
    }
}

fn check_username(username: &str, errors: &mut ValidationErrors) {
    check_whitespace("username", username, errors);

    if !USERNAME_LENGTH.contains(&username.chars().count()) {
        errors.add(
            "username",
            format!(
                "must be between {} and {} characters",
                USERNAME_LENGTH.start(),
                USERNAME_LENGTH.end()
            ),
        );
    }

    let alphanumeric = USERNAME_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(username));
    if !alphanumeric {
        errors.add("username", "must contain only letters and digits");
    }
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    check_whitespace("email", email, errors);

    if !email.contains('@') || email.chars().count() < EMAIL_MIN_LENGTH {
        errors.add("email", "must be a valid email address");
    }
}

fn check_password(password: &str, errors: &mut ValidationErrors) {
    check_whitespace("password", password, errors);

    if !PASSWORD_LENGTH.contains(&password.chars().count()) {
        errors.add(
            "password",
            format!(
                "must be between {} and {} characters",
                PASSWORD_LENGTH.start(),
                PASSWORD_LENGTH.end()
            ),
        );
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.add("password", "must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.add("password", "must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.add("password", "must contain a digit");
    }
}
