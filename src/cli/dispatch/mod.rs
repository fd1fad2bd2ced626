//! Map parsed CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, mailer, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    validate_dsn(&dsn)?;

    let auth_opts = auth::Options::parse(matches)?;
    let mail_opts = mailer::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        secure_cookies: auth_opts.secure_cookies,
        sweep_interval_seconds: auth_opts.sweep_interval_seconds,
        sweep_timeout_seconds: auth_opts.sweep_timeout_seconds,
        config_poll_seconds: auth_opts.config_poll_seconds,
        app_name: mail_opts.app_name,
        mail_from: mail_opts.from_email,
        mailjet_key: mail_opts.mailjet_key,
        mailjet_secret: mail_opts.mailjet_secret,
    }))
}

fn validate_dsn(dsn: &str) -> Result<()> {
    let parsed = Url::parse(dsn).context("invalid DUSTSTICKS_DSN")?;
    match parsed.scheme() {
        "postgres" | "postgresql" => Ok(()),
        scheme => anyhow::bail!("invalid DUSTSTICKS_DSN: unsupported scheme {scheme}"),
    }
}
