//! Usage: Infrastructure adapters (credential persistence, HTTP transport, settings).

pub mod credential_store;
pub mod http;
pub mod settings;
