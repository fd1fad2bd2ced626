use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};

pub const ARG_SECURE_COOKIES: &str = "secure-cookies";
pub const ARG_SWEEP_INTERVAL_SECONDS: &str = "sweep-interval-seconds";
pub const ARG_SWEEP_TIMEOUT_SECONDS: &str = "sweep-timeout-seconds";
pub const ARG_CONFIG_POLL_SECONDS: &str = "config-poll-seconds";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub secure_cookies: bool,
    pub sweep_interval_seconds: u64,
    pub sweep_timeout_seconds: u64,
    pub config_poll_seconds: u64,
}

impl Options {
    /// Parse token and worker arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a value is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_seconds = |id: &str| -> anyhow::Result<u64> {
            matches
                .get_one::<u64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            secure_cookies: matches.get_flag(ARG_SECURE_COOKIES),
            sweep_interval_seconds: read_seconds(ARG_SWEEP_INTERVAL_SECONDS)?,
            sweep_timeout_seconds: read_seconds(ARG_SWEEP_TIMEOUT_SECONDS)?,
            config_poll_seconds: read_seconds(ARG_CONFIG_POLL_SECONDS)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SECURE_COOKIES)
                .long(ARG_SECURE_COOKIES)
                .help("Mark the session and CSRF cookies Secure (serve behind TLS)")
                .env("DUSTSTICKS_SECURE_COOKIES")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL_SECONDS)
                .long(ARG_SWEEP_INTERVAL_SECONDS)
                .help("Seconds between expired-token sweeps")
                .env("DUSTSTICKS_SWEEP_INTERVAL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SWEEP_TIMEOUT_SECONDS)
                .long(ARG_SWEEP_TIMEOUT_SECONDS)
                .help("Upper bound in seconds for a single sweep")
                .env("DUSTSTICKS_SWEEP_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_CONFIG_POLL_SECONDS)
                .long(ARG_CONFIG_POLL_SECONDS)
                .help("Seconds between reads of the app config table")
                .env("DUSTSTICKS_CONFIG_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
}
