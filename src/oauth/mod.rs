//! Usage: OAuth 2.0 Authorization Code + PKCE client for the custodial wallet.

pub mod callback;
pub mod client;
pub mod pkce;
pub(crate) mod token_exchange;
