//! Slack OAuth gateway
//!
//! Single-binary Rust service that:
//! 1. Loads Slack app credentials from config
//! 2. Serves the /login and /oauth endpoints of the authorization flow
//! 3. Exchanges the authorization code for a bot token in the background
//! 4. Persists the token for reuse across restarts

mod config;
mod metrics;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use slack_auth::{Authenticator, CallbackOutcome, FileStore, TokenStore};

use crate::config::Config;

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    auth: Authenticator,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/login", get(login_handler))
        .route("/oauth", get(oauth_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting slack-oauth-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        client_id = %config.slack.client_id,
        token_file = %config.storage.token_file.display(),
        "configuration loaded"
    );

    let store = FileStore::load(config.storage.token_file.clone())
        .await
        .context("failed to open token store")?;
    let tokens = TokenStore::new(Arc::new(store));

    let client_secret = config
        .slack
        .client_secret
        .clone()
        .context("client secret missing after config validation")?;

    let auth = Authenticator::new(
        config.slack.client_id.clone(),
        client_secret,
        reqwest::Client::new(),
        tokens,
    );

    // A persisted token resolves immediately; otherwise the operator is
    // directed to /login and the handlers below drive the flow to completion.
    auth.authenticate(
        |_token| info!("slack authorization complete, bot token available"),
        |err| error!(error = %err, "slack authorization failed"),
    )
    .await;

    let app_state = AppState {
        auth,
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };
    let app = build_router(app_state, config.server.max_connections);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;

    info!(addr = %config.server.listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

/// GET /login — redirect the operator's browser to Slack's authorize page.
///
/// 404 when no authorization attempt is pending: an unsolicited login
/// request must not produce a redirect.
async fn login_handler(State(state): State<AppState>) -> Response {
    match state.auth.login_redirect().await {
        Ok(Some(url)) => {
            metrics::record_login("redirected");
            (StatusCode::FOUND, [(axum::http::header::LOCATION, url)]).into_response()
        }
        Ok(None) => {
            metrics::record_login("no_session");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to build authorize URL");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// GET /oauth — the provider's redirect target.
///
/// Ignored callbacks (absent/empty/mismatched state) get 404 with no side
/// effect; a provider-reported error gets 400 with the literal reason; an
/// accepted callback gets an empty 200 while the exchange proceeds in the
/// background.
async fn oauth_handler(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let query = query.unwrap_or_default();
    match state.auth.handle_callback(&query).await {
        Ok(CallbackOutcome::Accepted) => {
            metrics::record_callback("accepted");
            StatusCode::OK.into_response()
        }
        Ok(CallbackOutcome::Ignored) => {
            metrics::record_callback("ignored");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(slack_auth::Error::OAuth(reason)) => {
            metrics::record_callback("provider_error");
            warn!(reason = %reason, "provider reported an authorization error");
            error_response(StatusCode::BAD_REQUEST, &reason)
        }
        Err(e) => {
            error!(error = %e, "callback handling failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// Health endpoint: authorization status plus uptime.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();
    let authenticated = state.auth.is_authenticated().await;
    let pending = state.auth.authorization_pending().await;

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "status": "healthy",
            "authenticated": authenticated,
            "authorization_pending": pending,
            "uptime_seconds": uptime,
        })
        .to_string(),
    )
}

/// Prometheus metrics endpoint — returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// JSON error body for the synchronous error paths.
fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "error": message }).to_string(),
    )
        .into_response()
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use common::Secret;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Create a PrometheusHandle for tests without installing a global
    /// recorder. build_recorder() avoids the "recorder already installed"
    /// panic when multiple tests run in the same process.
    fn test_prometheus_handle() -> PrometheusHandle {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        recorder.handle()
    }

    /// Build test app state with a tempdir-backed token store and the
    /// exchange pointed at the given endpoint.
    async fn test_app_state(dir: &tempfile::TempDir, access_endpoint: &str) -> AppState {
        let store = FileStore::load(dir.path().join("tokens.json")).await.unwrap();
        let auth = Authenticator::new(
            "1234.5678",
            Secret::new("s3cret".to_string()),
            reqwest::Client::new(),
            TokenStore::new(Arc::new(store)),
        )
        .with_endpoints(slack_auth::AUTHORIZE_ENDPOINT, access_endpoint);

        AppState {
            auth,
            started_at: Instant::now(),
            prometheus: test_prometheus_handle(),
        }
    }

    async fn get(state: AppState, uri: &str) -> axum::response::Response {
        build_router(state, 1000)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn login_without_pending_session_returns_404() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_app_state(&dir, "http://127.0.0.1:1").await;

        let response = get(state, "/login").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn login_with_pending_session_redirects_to_authorize_url() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_app_state(&dir, "http://127.0.0.1:1").await;
        state.auth.authenticate(|_| {}, |_| {}).await;

        let response = get(state, "/login").await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let location = response
            .headers()
            .get(axum::http::header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.starts_with(slack_auth::AUTHORIZE_ENDPOINT));
        assert!(location.contains("scope=bot"));
        assert!(location.contains("state="));
    }

    #[tokio::test]
    async fn oauth_with_unknown_state_returns_404() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_app_state(&dir, "http://127.0.0.1:1").await;

        let response = get(state, "/oauth?state=482913&code=ABC").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oauth_without_query_returns_404() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_app_state(&dir, "http://127.0.0.1:1").await;
        state.auth.authenticate(|_| {}, |_| {}).await;

        let response = get(state, "/oauth").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oauth_error_param_returns_400_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_app_state(&dir, "http://127.0.0.1:1").await;
        state.auth.authenticate(|_| {}, |_| {}).await;

        // Fish the state token out of the login redirect
        let response = get(state.clone(), "/login").await;
        let location = response
            .headers()
            .get(axum::http::header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        let session_state = url::Url::parse(location)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let response = get(
            state,
            &format!("/oauth?state={session_state}&code=ABC&error=access_denied"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "access_denied");
    }

    #[tokio::test]
    async fn end_to_end_flow_persists_the_bot_token() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/oauth.access"))
            .and(query_param("code", "ABC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "bot": { "bot_access_token": "xoxb-1" }
            })))
            .mount(&server)
            .await;

        let state =
            test_app_state(&dir, &format!("{}/api/oauth.access", server.uri())).await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        state
            .auth
            .authenticate(
                move |token| {
                    let _ = tx.send(token);
                },
                |e| panic!("authorization must succeed, got: {e}"),
            )
            .await;

        // Operator visits /login and is redirected to the provider
        let response = get(state.clone(), "/login").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response
            .headers()
            .get(axum::http::header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        let session_state = url::Url::parse(location)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        // Provider redirects back with the code; the handler returns at once
        let response = get(
            state.clone(),
            &format!("/oauth?state={session_state}&code=ABC"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // The background exchange completes and delivers the token
        let token = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("success handler must fire")
            .unwrap();
        assert_eq!(token, "xoxb-1");
        assert!(state.auth.is_authenticated().await);

        // A replayed callback with the now-stale state is ignored
        let response = get(
            state,
            &format!("/oauth?state={session_state}&code=ABC"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_endpoint_reports_authorization_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_app_state(&dir, "http://127.0.0.1:1").await;
        state.auth.authenticate(|_| {}, |_| {}).await;

        let response = get(state, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["authenticated"], false);
        assert_eq!(json["authorization_pending"], true);
        assert!(json["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_format() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_app_state(&dir, "http://127.0.0.1:1").await;

        let response = get(state, "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(
            content_type.contains("text/plain"),
            "metrics endpoint must return text/plain Prometheus format"
        );
    }
}
