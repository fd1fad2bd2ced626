pub mod app_config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod openapi;
pub mod password;
pub mod routes;
pub mod tokens;
pub mod users;

pub use openapi::openapi;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    http::{HeaderName, HeaderValue},
    response::Json,
    routing::get,
    Extension,
};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

use self::{
    app_config::{spawn_config_poller, AppSettings, PgConfigStore},
    handlers::{health, AuthState},
    mailer::{LogMailer, Mailer, MailerConfig, MailjetMailer},
    tokens::{spawn_sweeper, PgTokenStore, SweeperConfig, TokenIssuer},
    users::PgUserStore,
};

/// Mailjet API key pair.
#[derive(Debug, Clone)]
pub struct MailjetCredentials {
    pub key: String,
    pub secret: SecretString,
}

/// Everything the server needs to start.
#[derive(Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: String,
    pub secure_cookies: bool,
    pub sweeper: SweeperConfig,
    pub config_poll_interval: Duration,
    pub mailer: MailerConfig,
    /// Without credentials verification mail is only logged.
    pub mailjet: Option<MailjetCredentials>,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(config: ServerConfig) -> Result<()> {
    let pool = db::connect(&config.dsn).await?;
    db::apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;

    let shutdown = CancellationToken::new();

    let settings = Arc::new(AppSettings::default());
    let poller = spawn_config_poller(
        Arc::new(PgConfigStore::new(pool.clone())),
        settings.clone(),
        config.config_poll_interval,
        shutdown.clone(),
    );

    let mailer: Arc<dyn Mailer> = match config.mailjet {
        Some(credentials) => Arc::new(MailjetMailer::new(
            credentials.key,
            credentials.secret,
            config.mailer,
            settings,
        )?),
        None => {
            info!("No Mailjet credentials configured, verification mail will only be logged");
            Arc::new(LogMailer)
        }
    };

    let token_store = Arc::new(PgTokenStore::new(pool.clone()));
    let sweeper = spawn_sweeper(token_store.clone(), config.sweeper, shutdown.clone());

    let state = Arc::new(AuthState::new(
        TokenIssuer::new(token_store),
        Arc::new(PgUserStore::new(pool.clone())),
        mailer,
        config.secure_cookies,
    ));

    let app = routes::router(state)
        .route("/health", get(health::health).head(health::health))
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
        .layer(Extension(pool.clone()));

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("Listening on [::]:{}", config.port);

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Stop the workers before the pool goes away.
    shutdown.cancel();
    for (name, handle) in [("sweeper", sweeper), ("config poller", poller)] {
        if let Err(err) = handle.await {
            error!("{name} task failed: {err}");
        }
    }
    pool.close().await;

    info!("Server exited");

    served.context("Server error")
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}
