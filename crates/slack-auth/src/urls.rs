//! Provider URL construction
//!
//! Pure constructors for the two URLs the flow touches: the authorize URL
//! the operator's browser is sent to, and the access URL the exchange
//! calls. Parameter values are query-encoded by `url`; a base that fails to
//! parse surfaces as [`Error::InvalidUrl`].

use url::Url;

use crate::constants::BOT_SCOPE;
use crate::error::{Error, Result};

/// Build the authorize URL the login endpoint redirects to.
///
/// Query parameters: `client_id`, `scope=bot`, `state`. The state value is
/// round-tripped through the provider and checked on the callback.
pub fn authorize_url(endpoint: &str, client_id: &str, state: &str) -> Result<String> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| Error::InvalidUrl(format!("authorize endpoint {endpoint}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("scope", BOT_SCOPE)
        .append_pair("state", state);
    Ok(url.to_string())
}

/// Build the token-exchange URL called by the background exchange.
///
/// Query parameters: `client_id`, `client_secret`, `code`. The secret
/// appears only here; it is never logged or persisted.
pub fn access_url(endpoint: &str, client_id: &str, client_secret: &str, code: &str) -> Result<String> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| Error::InvalidUrl(format!("access endpoint {endpoint}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("client_secret", client_secret)
        .append_pair("code", code);
    Ok(url.to_string())
}
