use utoipa::{
    openapi::{Contact, Info, InfoBuilder, License, Tag},
    OpenApi,
};

use super::{
    error::ErrorBody,
    handlers::{health, login, logout, me, register, verify},
    users::{
        validation::{LoginRequest, RegistrationRequest, VerifyRequest},
        User,
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        register::register,
        login::login,
        verify::verify,
        logout::logout,
        me::me,
    ),
    components(schemas(
        health::Health,
        register::Registered,
        RegistrationRequest,
        LoginRequest,
        VerifyRequest,
        User,
        ErrorBody,
    ))
)]
struct ApiDoc;

/// The `OpenAPI` document served at `/openapi.json`.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info = cargo_info();

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Registration, verification, login and logout".to_string());

    let mut me_tag = Tag::new("me");
    me_tag.description = Some("The authenticated user".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and database reachability".to_string());

    doc.tags = Some(vec![auth_tag, me_tag, health_tag]);
    doc
}

fn cargo_info() -> Info {
    // Cargo.toml metadata instead of the utoipa defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(value: &str) -> Option<&str> {
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    }

    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}
