//! The authentication state machine
//!
//! Drives one browser-redirect authorization attempt at a time:
//!
//! ```text
//! Idle --authenticate--> Pending --valid /oauth callback--> Exchanging
//!   ^                                                           |
//!   +---- exactly one of on_success / on_failure fires ---------+
//! ```
//!
//! The login and callback handlers run on the router's request tasks and
//! never block on provider I/O; the code exchange runs as a spawned task
//! whose outcome is delivered only through the session's completion
//! handlers. The session slot's generation counter is the serialization
//! point that keeps duplicate or late completions from resolving an
//! attempt twice.

use std::collections::HashMap;
use std::sync::Arc;

use common::Secret;
use tracing::{debug, info, warn};

use crate::constants::{ACCESS_ENDPOINT, AUTHORIZE_ENDPOINT};
use crate::error::{Error, Result};
use crate::exchange;
use crate::session::SessionSlot;
use crate::store::TokenStore;
use crate::urls;

/// What the callback handler decided to do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// State and code validated; the exchange is running in the background.
    Accepted,
    /// Missing/empty/mismatched state, or no code. Stale, replayed, and
    /// forged callbacks are dropped without acknowledgement rather than
    /// treated as errors.
    Ignored,
}

/// Drives the authorization flow for one installed Slack app.
///
/// Cheap to clone: clones share the session slot and token store, so the
/// router handlers and spawned exchange tasks all observe the same state.
#[derive(Clone)]
pub struct Authenticator {
    client_id: String,
    client_secret: Secret<String>,
    http: reqwest::Client,
    session: Arc<SessionSlot>,
    tokens: TokenStore,
    authorize_endpoint: String,
    access_endpoint: String,
}

impl Authenticator {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        http: reqwest::Client,
        tokens: TokenStore,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            http,
            session: Arc::new(SessionSlot::new()),
            tokens,
            authorize_endpoint: AUTHORIZE_ENDPOINT.to_owned(),
            access_endpoint: ACCESS_ENDPOINT.to_owned(),
        }
    }

    /// Point the flow at non-default provider endpoints. Tests use this to
    /// run the exchange against a local mock server.
    pub fn with_endpoints(
        mut self,
        authorize: impl Into<String>,
        access: impl Into<String>,
    ) -> Self {
        self.authorize_endpoint = authorize.into();
        self.access_endpoint = access.into();
        self
    }

    /// Start (or short-circuit) an authorization attempt.
    ///
    /// With a persisted token, `on_success` fires synchronously and no
    /// session is allocated. Otherwise a fresh state token is generated and
    /// the attempt waits for the operator to visit the login endpoint;
    /// completion is reported later through exactly one of the handlers.
    /// Beginning a new attempt displaces any pending one.
    pub async fn authenticate(
        &self,
        on_success: impl FnOnce(String) + Send + 'static,
        on_failure: impl FnOnce(Error) + Send + 'static,
    ) {
        if let Some(token) = self.tokens.token().await {
            debug!("found persisted token, skipping authorization flow");
            on_success(token);
            return;
        }

        let state = generate_state();
        let generation = self
            .session
            .begin(state, Box::new(on_success), Box::new(on_failure))
            .await;
        info!(generation, "authorization pending — direct the operator to the login endpoint");
    }

    /// Forget the persisted token. A pending session is unaffected.
    pub async fn disconnected(&self) -> Result<()> {
        self.tokens.clear().await?;
        info!("persisted token removed");
        Ok(())
    }

    /// Authorize URL for the login redirect, or None when no attempt is
    /// pending — an unsolicited login request must not produce a redirect.
    pub async fn login_redirect(&self) -> Result<Option<String>> {
        let Some(state) = self.session.pending_state().await else {
            return Ok(None);
        };
        let url = urls::authorize_url(&self.authorize_endpoint, &self.client_id, &state)?;
        Ok(Some(url))
    }

    /// Validate the provider's redirect and launch the exchange.
    ///
    /// Checks run in order: `state` present and non-empty and `code`
    /// present; `state` equal to the pending session's state; no `error`
    /// parameter. An `error` parameter with a matching state fails
    /// synchronously with the provider's literal reason, before any
    /// network call. On acceptance the exchange is spawned and this
    /// returns immediately.
    pub async fn handle_callback(&self, query: &str) -> Result<CallbackOutcome> {
        let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        let Some(state) = params.get("state").filter(|s| !s.is_empty()) else {
            return Ok(CallbackOutcome::Ignored);
        };
        let Some(code) = params.get("code") else {
            return Ok(CallbackOutcome::Ignored);
        };

        let Some(generation) = self.session.matches(state).await else {
            debug!("callback state does not match the pending session, ignoring");
            return Ok(CallbackOutcome::Ignored);
        };

        if let Some(reason) = params.get("error") {
            return Err(Error::OAuth(reason.clone()));
        }

        self.spawn_exchange(generation, code.clone());
        Ok(CallbackOutcome::Accepted)
    }

    /// Whether a token is currently persisted.
    pub async fn is_authenticated(&self) -> bool {
        self.tokens.token().await.is_some()
    }

    /// Whether an authorization attempt is waiting on the operator.
    pub async fn authorization_pending(&self) -> bool {
        self.session.is_pending().await
    }

    /// Run the code exchange off the request path. Failures in here cannot
    /// reach the HTTP layer; they are delivered through the session's
    /// failure handler only.
    fn spawn_exchange(&self, generation: u64, code: String) {
        let auth = self.clone();
        tokio::spawn(async move {
            let result = exchange::exchange_code(
                &auth.http,
                &auth.access_endpoint,
                &auth.client_id,
                auth.client_secret.expose(),
                &code,
            )
            .await;
            auth.finish_exchange(generation, result).await;
        });
    }

    /// Deliver an exchange outcome: persist on success, then resolve the
    /// session and fire its handler. A completion whose generation is no
    /// longer current is dropped — the session was already resolved or
    /// displaced.
    async fn finish_exchange(&self, generation: u64, result: Result<String>) {
        let outcome = match result {
            Ok(token) => self.tokens.put(&token).await.map(|()| token),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(token) => match self.session.resolve(generation).await {
                Some(session) => {
                    info!("token exchange complete, bot token persisted");
                    metrics::counter!("oauth_exchanges_total", "outcome" => "success")
                        .increment(1);
                    (session.on_success)(token);
                }
                None => debug!(generation, "exchange completed for a stale session, dropping"),
            },
            Err(e) => match self.session.resolve(generation).await {
                Some(session) => {
                    warn!(error = %e, "token exchange failed");
                    metrics::counter!("oauth_exchanges_total", "outcome" => "failure")
                        .increment(1);
                    (session.on_failure)(e);
                }
                None => {
                    warn!(generation, error = %e, "exchange failed for a stale session, dropping")
                }
            },
        }
    }
}

/// Random anti-forgery state token: a uniformly chosen `u32`, stringified.
/// Collisions across overlapping attempts are treated as negligible; the
/// single-session slot overwrites rather than deduplicates.
fn generate_state() -> String {
    use rand::RngExt;
    rand::rng().random::<u32>().to_string()
}
