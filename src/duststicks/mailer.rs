//! Outbound verification mail.
//!
//! Delivery is best effort: registration hands the message to
//! [`dispatch_verification_email`], which sends it on a spawned task and only
//! logs failures. `MailjetMailer` talks to the Mailjet v3.1 send API and stays
//! quiet while `config.mailing_active` is off; `LogMailer` is the local dev
//! stand-in used when no Mailjet key is configured.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::app_config::AppSettings;

pub const MAILJET_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";
pub const MAIL_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct VerificationEmail {
    pub to_email: String,
    pub username: String,
    pub code: String,
}

impl std::fmt::Debug for VerificationEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationEmail")
            .field("to_email", &self.to_email)
            .field("username", &self.username)
            .field("code", &"***")
            .finish()
    }
}

/// Sender identity and branding for outgoing mail.
#[derive(Clone, Debug)]
pub struct MailerConfig {
    pub app_name: String,
    pub from_email: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a verification code or return why it could not be delivered.
    async fn send_verification_email(&self, message: &VerificationEmail) -> Result<()>;
}

/// Logs the message instead of sending it.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_email(&self, message: &VerificationEmail) -> Result<()> {
        info!(
            to_email = %message.to_email,
            username = %message.username,
            code = %message.code,
            "verification email send stub"
        );
        Ok(())
    }
}

pub struct MailjetMailer {
    client: Client,
    key: String,
    secret: SecretString,
    config: MailerConfig,
    settings: Arc<AppSettings>,
}

impl MailjetMailer {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        key: String,
        secret: SecretString,
        config: MailerConfig,
        settings: Arc<AppSettings>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(MAIL_TIMEOUT)
            .build()
            .context("Failed to build mail HTTP client")?;

        Ok(Self {
            client,
            key,
            secret,
            config,
            settings,
        })
    }
}

#[async_trait]
impl Mailer for MailjetMailer {
    async fn send_verification_email(&self, message: &VerificationEmail) -> Result<()> {
        if !self.settings.mailing_active() {
            debug!(to_email = %message.to_email, "mailing inactive, skipping verification email");
            return Ok(());
        }

        let response = self
            .client
            .post(MAILJET_SEND_URL)
            .basic_auth(&self.key, Some(self.secret.expose_secret()))
            .json(&verification_payload(&self.config, message))
            .send()
            .await
            .context("Failed to reach Mailjet")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Mailjet responded with {status}: {body}");
        }

        debug!(to_email = %message.to_email, %status, "verification email sent");
        Ok(())
    }
}

/// Mailjet v3.1 request body for a verification code.
#[must_use]
pub fn verification_payload(config: &MailerConfig, message: &VerificationEmail) -> Value {
    let app_name = &config.app_name;
    let username = &message.username;
    let code = &message.code;

    json!({
        "Messages": [{
            "From": {
                "Email": config.from_email,
                "Name": format!("{app_name} - Email Verification"),
            },
            "To": [{
                "Email": message.to_email,
                "Name": username,
            }],
            "Subject": "Your Email-Verification Code",
            "HTMLPart": format!(
                "<h3>Hey {username}, welcome to {app_name}!</h3><br />Your verification code is: {code}!"
            ),
            "TextPart": format!(
                "Hey {username}, welcome to {app_name}! Your verification code is: {code}!"
            ),
        }]
    })
}

/// Send on a background task. Failures are logged, never returned.
pub fn dispatch_verification_email(
    mailer: Arc<dyn Mailer>,
    message: VerificationEmail,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = mailer.send_verification_email(&message).await {
            error!(to_email = %message.to_email, "failed to send verification email: {err:#}");
        }
    })
}
