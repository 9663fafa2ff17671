//! Usage: Wire settings into a running connector (store, transport, OAuth client, orchestrator).

use crate::app::orchestrator::ConnectionOrchestrator;
use crate::app::user_agent::UserAgent;
use crate::domain::fiat::{spawn_rate_poller, FiatRateFeed, RatePoller};
use crate::infra::credential_store::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
use crate::infra::http::{HttpTransport, ReqwestTransport};
use crate::infra::settings::WalletSettings;
use crate::oauth::client::{OAuthClient, OAuthConfig};
use crate::shared::error::WalletResult;
use crate::wallet::extension::{ExtensionProviderLocator, ProviderSlot};
use std::sync::Arc;

#[derive(Clone)]
pub struct WalletRuntime {
    pub orchestrator: Arc<ConnectionOrchestrator>,
    pub oauth: Arc<OAuthClient>,
    pub transport: Arc<dyn HttpTransport>,
    pub fiat: Arc<FiatRateFeed>,
    /// Shared by clones; the last clone dropped stops the poller.
    pub fiat_poller: Option<Arc<RatePoller>>,
}

impl std::fmt::Debug for WalletRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRuntime")
            .field("orchestrator", &self.orchestrator)
            .field("fiat", &self.fiat)
            .field("fiat_polling", &self.fiat_poller.is_some())
            .finish_non_exhaustive()
    }
}

/// SQLite when `credential_db_path` is set, otherwise an in-memory store.
pub fn open_credential_store(settings: &WalletSettings) -> WalletResult<Arc<dyn CredentialStore>> {
    match settings.credential_db_path.as_deref() {
        Some(path) => Ok(Arc::new(SqliteCredentialStore::open(path, settings.origin.clone())?)),
        None => {
            tracing::warn!("no credential_db_path configured; sessions will not survive a restart");
            Ok(Arc::new(MemoryCredentialStore::new()))
        }
    }
}

pub async fn bootstrap(
    settings: &WalletSettings,
    slot: ProviderSlot,
    user_agent: Arc<dyn UserAgent>,
) -> WalletResult<WalletRuntime> {
    settings.validate()?;
    let store = open_credential_store(settings)?;
    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(settings.http_connect_timeout())?);
    Ok(bootstrap_with(settings, store, transport, slot, user_agent).await)
}

/// Same as `bootstrap` with caller-supplied store and transport.
pub async fn bootstrap_with(
    settings: &WalletSettings,
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn HttpTransport>,
    slot: ProviderSlot,
    user_agent: Arc<dyn UserAgent>,
) -> WalletRuntime {
    let oauth = Arc::new(OAuthClient::new(
        OAuthConfig::from_settings(settings),
        store,
        transport.clone(),
        user_agent.clone(),
    ));
    let locator = ExtensionProviderLocator::new(
        slot,
        settings.extension_discovery_timeout(),
        settings.extension_poll_interval(),
    );
    let orchestrator =
        Arc::new(ConnectionOrchestrator::activate(locator, oauth.clone(), user_agent).await);
    let fiat = Arc::new(FiatRateFeed::new(
        transport.clone(),
        settings.fiat_rates_url.clone(),
    ));
    let fiat_poller = settings.fiat_refresh_interval().map(|interval| {
        tracing::debug!(interval_secs = interval.as_secs(), "starting exchange rate poller");
        Arc::new(spawn_rate_poller(fiat.clone(), interval))
    });

    WalletRuntime {
        orchestrator,
        oauth,
        transport,
        fiat,
        fiat_poller,
    }
}
