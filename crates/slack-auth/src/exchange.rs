//! Authorization-code exchange against Slack's token endpoint
//!
//! One interaction: GET `oauth.access` with the client credentials and the
//! authorization code. The exchange runs inside a background task, so every
//! failure here reaches the caller through the session's failure handler,
//! never through the HTTP layer.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::urls;

/// Response body of `oauth.access`.
///
/// Slack wraps Web API responses in an envelope with an `ok` flag and an
/// optional `error` string; the bot grant is nested under `bot`. Only
/// `bot.bot_access_token` matters to this flow.
#[derive(Debug, Deserialize)]
pub struct AccessResponse {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub bot: Option<BotGrant>,
}

/// The bot-user portion of an `oauth.access` response.
#[derive(Debug, Deserialize)]
pub struct BotGrant {
    pub bot_access_token: String,
}

/// Exchange an authorization code for the bot access token.
///
/// Returns the token value on success. Transport failures map to
/// [`Error::Http`]; non-2xx statuses, an `ok: false` envelope, and a
/// missing or malformed `bot.bot_access_token` field all map to
/// [`Error::TokenExchange`].
pub async fn exchange_code(
    client: &reqwest::Client,
    endpoint: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<String> {
    let url = urls::access_url(endpoint, client_id, client_secret, code)?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let body: AccessResponse = response
        .json()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid access response: {e}")))?;

    if body.ok == Some(false) {
        let reason = body.error.unwrap_or_else(|| String::from("unknown_error"));
        return Err(Error::TokenExchange(format!(
            "provider rejected exchange: {reason}"
        )));
    }

    body.bot
        .map(|bot| bot.bot_access_token)
        .ok_or_else(|| Error::TokenExchange("response missing bot.bot_access_token".into()))
}
