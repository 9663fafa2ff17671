//! Lightning wallet connectivity core.
//!
//! Negotiates with an in-page WebLN provider, falls back to an OAuth (PKCE) custodial account,
//! and exposes both through one [`WalletCapability`]. Payment helpers (Lightning addresses,
//! scroll payments, fiat conversion) sit on top of that capability.

pub mod app;
pub mod domain;
pub mod infra;
pub mod oauth;
mod shared;
pub mod test_support;
pub mod wallet;

pub use app::bootstrap::{bootstrap, bootstrap_with, open_credential_store, WalletRuntime};
pub use app::orchestrator::{ConnectionOrchestrator, ConnectionPhase, ConnectionState};
pub use app::user_agent::{ChannelUserAgent, Navigation, UserAgent};
pub use infra::credential_store::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
pub use infra::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use infra::settings::{LoggingSettings, WalletSettings};
pub use oauth::client::{ApiRequest, AuthPhase, OAuthClient, OAuthConfig};
pub use shared::error::{WalletError, WalletResult};
pub use wallet::capability::{CapabilityKind, WalletCapability, NO_WALLET_MESSAGE};
pub use wallet::extension::{ExtensionProviderLocator, ProviderError, ProviderSlot, WebLnProvider};
pub use wallet::types::{
    Balance, Invoice, InvoiceRequest, KeysendRequest, NodeInfo, PaymentReceipt, PaymentTarget,
    SignedMessage,
};
