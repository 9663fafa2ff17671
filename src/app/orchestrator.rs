//! Usage: Picks the active wallet (extension, then silent custodial resume, then unavailable)
//! and owns the connection state consumers read.
//!
//! Contract:
//! - `enable()` is a no-op while already enabled or while an attempt is in flight.
//! - `is_loading` is cleared on every exit path of an attempt.
//! - Only `start_manual_oauth_connect()` and `logout()` navigate the host page.

use crate::app::user_agent::UserAgent;
use crate::oauth::client::OAuthClient;
use crate::shared::error::{WalletError, WalletResult};
use crate::shared::mutex_ext::MutexExt;
use crate::wallet::capability::{no_wallet_error, CapabilityKind, WalletCapability};
use crate::wallet::custodial::CustodialWallet;
use crate::wallet::extension::ExtensionProviderLocator;
use reqwest::Url;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    Connected(CapabilityKind),
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    pub capability: WalletCapability,
    pub is_enabled: bool,
    pub is_alby_fallback: bool,
    pub is_loading: bool,
    pub last_error: Option<WalletError>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            capability: WalletCapability::Unavailable,
            is_enabled: false,
            is_alby_fallback: false,
            is_loading: false,
            last_error: None,
        }
    }
}

impl ConnectionState {
    /// A manual "connect with Alby" action makes sense whenever no wallet is enabled.
    pub fn oauth_connect_available(&self) -> bool {
        !self.is_enabled && !self.is_loading
    }

    pub fn kind(&self) -> CapabilityKind {
        self.capability.kind()
    }
}

struct LoadingGuard<'a> {
    state: &'a Mutex<ConnectionState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock_or_recover();
        state.is_loading = false;
        if state.phase == ConnectionPhase::Connecting {
            state.phase = ConnectionPhase::Disconnected;
        }
    }
}

pub struct ConnectionOrchestrator {
    locator: ExtensionProviderLocator,
    oauth: Arc<OAuthClient>,
    user_agent: Arc<dyn UserAgent>,
    state: Mutex<ConnectionState>,
}

impl std::fmt::Debug for ConnectionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionOrchestrator")
            .field("state", &*self.state.lock_or_recover())
            .finish()
    }
}

impl ConnectionOrchestrator {
    /// Idle orchestrator; call `enable()` (or use `activate`) to pick a wallet.
    pub fn new(
        locator: ExtensionProviderLocator,
        oauth: Arc<OAuthClient>,
        user_agent: Arc<dyn UserAgent>,
    ) -> Self {
        Self {
            locator,
            oauth,
            user_agent,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    /// Construct and run the initial `enable()` attempt.
    pub async fn activate(
        locator: ExtensionProviderLocator,
        oauth: Arc<OAuthClient>,
        user_agent: Arc<dyn UserAgent>,
    ) -> Self {
        let orchestrator = Self::new(locator, oauth, user_agent);
        orchestrator.enable().await;
        orchestrator
    }

    pub fn snapshot(&self) -> ConnectionState {
        self.state.lock_or_recover().clone()
    }

    pub fn capability(&self) -> WalletCapability {
        self.state.lock_or_recover().capability.clone()
    }

    pub fn oauth_client(&self) -> &Arc<OAuthClient> {
        &self.oauth
    }

    pub async fn enable(&self) -> ConnectionState {
        {
            let mut state = self.state.lock_or_recover();
            if state.is_enabled || state.is_loading {
                tracing::debug!(
                    is_enabled = state.is_enabled,
                    is_loading = state.is_loading,
                    "wallet enable skipped"
                );
                return state.clone();
            }
            state.is_loading = true;
            state.last_error = None;
            state.phase = ConnectionPhase::Connecting;
        }

        {
            let _loading = LoadingGuard { state: &self.state };
            let capability = self.resolve_capability().await;
            self.install(capability);
        }

        self.snapshot()
    }

    async fn resolve_capability(&self) -> WalletCapability {
        match self.locator.try_enable().await {
            Ok(provider) => return WalletCapability::Extension(provider),
            Err(err) => tracing::debug!("extension unavailable, trying custodial resume: {}", err),
        }

        if self.oauth.is_authenticated() {
            tracing::info!("resuming custodial wallet from stored session");
            return WalletCapability::Custodial(CustodialWallet::new(self.oauth.clone()));
        }

        tracing::info!("no wallet available; manual alby connect offered");
        WalletCapability::Unavailable
    }

    fn install(&self, capability: WalletCapability) {
        let kind = capability.kind();
        let mut state = self.state.lock_or_recover();
        match kind {
            CapabilityKind::Extension | CapabilityKind::Custodial => {
                state.is_enabled = true;
                state.is_alby_fallback = kind == CapabilityKind::Custodial;
                state.last_error = None;
                state.phase = ConnectionPhase::Connected(kind);
            }
            CapabilityKind::Unavailable => {
                state.is_enabled = false;
                state.is_alby_fallback = false;
                state.last_error = Some(no_wallet_error());
                state.phase = ConnectionPhase::Disconnected;
            }
        }
        state.capability = capability;
    }

    /// Always redirects through the OAuth client, even when an extension exists.
    pub fn start_manual_oauth_connect(&self) -> WalletResult<Url> {
        match self.oauth.start_authorization_flow() {
            Ok(url) => Ok(url),
            Err(err) => {
                tracing::warn!("manual alby connect failed: {}", err);
                self.state.lock_or_recover().last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Ends a custodial session and reloads the page; extension sessions are left alone.
    pub fn logout(&self) -> WalletResult<()> {
        if !self.state.lock_or_recover().is_alby_fallback {
            tracing::debug!("logout ignored outside custodial mode");
            return Ok(());
        }

        self.oauth.logout();
        *self.state.lock_or_recover() = ConnectionState {
            phase: ConnectionPhase::Disconnected,
            ..ConnectionState::default()
        };
        tracing::info!("custodial wallet logged out; reloading page");
        self.user_agent.reload()
    }
}
