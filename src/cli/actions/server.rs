use crate::{
    cli::telemetry,
    duststicks::{self, mailer::MailerConfig, tokens::SweeperConfig, MailjetCredentials, ServerConfig},
};
use anyhow::Result;
use secrecy::SecretString;
use std::{fmt::Write, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub secure_cookies: bool,
    pub sweep_interval_seconds: u64,
    pub sweep_timeout_seconds: u64,
    pub config_poll_seconds: u64,
    pub app_name: String,
    pub mail_from: String,
    pub mailjet_key: Option<String>,
    pub mailjet_secret: Option<SecretString>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let result = duststicks::new(server_config(args)).await;

    telemetry::shutdown_tracer();

    result
}

fn server_config(args: Args) -> ServerConfig {
    let mailjet = match (args.mailjet_key, args.mailjet_secret) {
        (Some(key), Some(secret)) => Some(MailjetCredentials { key, secret }),
        _ => None,
    };

    ServerConfig {
        port: args.port,
        dsn: args.dsn,
        secure_cookies: args.secure_cookies,
        sweeper: SweeperConfig::new()
            .with_interval_seconds(args.sweep_interval_seconds)
            .with_sweep_timeout_seconds(args.sweep_timeout_seconds),
        config_poll_interval: Duration::from_secs(args.config_poll_seconds),
        mailer: MailerConfig {
            app_name: args.app_name,
            from_email: args.mail_from,
        },
        mailjet,
    }
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("secure_cookies", args.secure_cookies.to_string()),
        ("sweep_interval_seconds", args.sweep_interval_seconds.to_string()),
        ("sweep_timeout_seconds", args.sweep_timeout_seconds.to_string()),
        ("config_poll_seconds", args.config_poll_seconds.to_string()),
        ("app_name", args.app_name.clone()),
        ("mail_from", args.mail_from.clone()),
        ("mailjet_key_set", args.mailjet_key.is_some().to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ = write!(message, "\n  {key}:{padding} {value}");
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
