//! Slack OAuth constants
//!
//! Fixed provider endpoints and storage coordinates. The client ID and
//! secret are configuration, not constants — they identify the installed
//! Slack app and are supplied at construction.

/// Authorization endpoint the operator's browser is redirected to
pub const AUTHORIZE_ENDPOINT: &str = "https://slack.com/oauth/authorize";

/// Token endpoint for the authorization-code exchange (legacy `oauth.access`)
pub const ACCESS_ENDPOINT: &str = "https://slack.com/api/oauth.access";

/// OAuth scope requested during authorization. `bot` grants a bot user and
/// the `bot_access_token` this flow exists to obtain.
pub const BOT_SCOPE: &str = "bot";

/// Namespace the persisted token lives under in the key/value store
pub const OAUTH_NAMESPACE: &str = "oauth";

/// Key of the persisted token within [`OAUTH_NAMESPACE`]
pub const TOKEN_KEY: &str = "token";
