//! Slack OAuth authentication library
//!
//! Implements the browser-redirect Authorization-Code flow a host
//! application uses to obtain and persist a Slack bot access token. This
//! crate is a standalone library with no dependency on the gateway binary —
//! it can be tested and used independently.
//!
//! Authorization flow:
//! 1. Host calls [`Authenticator::authenticate`]; a persisted token
//!    short-circuits the flow, otherwise a state token is generated
//! 2. Operator visits the login endpoint; [`Authenticator::login_redirect`]
//!    yields the provider authorize URL carrying the state token
//! 3. Slack redirects back; [`Authenticator::handle_callback`] validates the
//!    state and launches `exchange::exchange_code` in the background
//! 4. On success the bot token is persisted via [`TokenStore`] and the
//!    caller's completion handler fires; exactly one handler fires per
//!    attempt

pub mod authenticator;
pub mod constants;
pub mod error;
pub mod exchange;
mod session;
pub mod store;
pub mod urls;

pub use authenticator::{Authenticator, CallbackOutcome};
pub use constants::*;
pub use error::{Error, Result};
pub use exchange::exchange_code;
pub use store::{FileStore, TokenStore};
