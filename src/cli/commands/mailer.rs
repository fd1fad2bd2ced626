use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_APP_NAME: &str = "app-name";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_MAILJET_KEY: &str = "mailjet-key";
pub const ARG_MAILJET_SECRET: &str = "mailjet-secret";

#[derive(Debug, Clone)]
pub struct Options {
    pub app_name: String,
    pub from_email: String,
    pub mailjet_key: Option<String>,
    pub mailjet_secret: Option<SecretString>,
}

impl Options {
    /// Parse mail arguments from matches.
    ///
    /// # Errors
    /// Returns an error if only half of the Mailjet key pair is set.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // Env vars set to "" count as unset.
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let mailjet_key = get_non_empty(ARG_MAILJET_KEY);
        let mailjet_secret = get_non_empty(ARG_MAILJET_SECRET).map(SecretString::from);
        if mailjet_key.is_some() != mailjet_secret.is_some() {
            anyhow::bail!("--{ARG_MAILJET_KEY} and --{ARG_MAILJET_SECRET} must be set together");
        }

        Ok(Self {
            app_name: get_non_empty(ARG_APP_NAME)
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_APP_NAME}"))?,
            from_email: get_non_empty(ARG_MAIL_FROM)
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_MAIL_FROM}"))?,
            mailjet_key,
            mailjet_secret,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_APP_NAME)
                .long(ARG_APP_NAME)
                .help("Product name used in outgoing mail")
                .env("DUSTSTICKS_APP_NAME")
                .default_value("Duststicks"),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address for verification mail")
                .env("DUSTSTICKS_MAIL_FROM")
                .default_value("noreply@duststicks.dev"),
        )
        .arg(
            Arg::new(ARG_MAILJET_KEY)
                .long(ARG_MAILJET_KEY)
                .help("Mailjet API key; verification mail is only logged when unset")
                .env("DUSTSTICKS_MAILJET_KEY"),
        )
        .arg(
            Arg::new(ARG_MAILJET_SECRET)
                .long(ARG_MAILJET_SECRET)
                .help("Mailjet API secret")
                .env("DUSTSTICKS_MAILJET_SECRET")
                .hide_env_values(true),
        )
}
