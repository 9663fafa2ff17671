//! Usage: In-page WebLN provider discovery and enablement.
//!
//! A browser extension injects its provider asynchronously; the host mirrors that into a
//! `ProviderSlot` and the locator polls the slot for a short discovery window.

use crate::shared::error::{WalletError, WalletResult};
use crate::shared::mutex_ext::MutexExt;
use crate::wallet::types::{
    Balance, Invoice, InvoiceRequest, KeysendRequest, NodeInfo, PaymentReceipt, SignedMessage,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Rejection reported by an injected provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait WebLnProvider: Send + Sync {
    async fn enable(&self) -> Result<(), ProviderError>;
    async fn get_info(&self) -> Result<NodeInfo, ProviderError>;
    async fn get_balance(&self) -> Result<Balance, ProviderError>;
    async fn make_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, ProviderError>;
    async fn send_payment(&self, payment_request: &str) -> Result<PaymentReceipt, ProviderError>;
    async fn keysend(&self, request: &KeysendRequest) -> Result<PaymentReceipt, ProviderError>;
    async fn sign_message(&self, message: &str) -> Result<SignedMessage, ProviderError>;
    async fn verify_message(&self, signature: &str, message: &str) -> Result<(), ProviderError>;
}

/// Where the host publishes an injected provider once it appears.
#[derive(Clone, Default)]
pub struct ProviderSlot {
    inner: Arc<Mutex<Option<Arc<dyn WebLnProvider>>>>,
}

impl std::fmt::Debug for ProviderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSlot")
            .field("occupied", &self.get().is_some())
            .finish()
    }
}

impl ProviderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, provider: Arc<dyn WebLnProvider>) {
        *self.inner.lock_or_recover() = Some(provider);
    }

    pub fn clear(&self) {
        *self.inner.lock_or_recover() = None;
    }

    pub fn get(&self) -> Option<Arc<dyn WebLnProvider>> {
        self.inner.lock_or_recover().clone()
    }
}

#[derive(Debug, Clone)]
pub struct ExtensionProviderLocator {
    slot: ProviderSlot,
    discovery_timeout: Duration,
    poll_interval: Duration,
}

impl ExtensionProviderLocator {
    pub fn new(slot: ProviderSlot, discovery_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            slot,
            discovery_timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Find the injected provider and ask it to enable. Absence and rejection both fail with
    /// `Connect`; callers treat that as the signal to fall back.
    pub async fn try_enable(&self) -> WalletResult<Arc<dyn WebLnProvider>> {
        let provider = self.discover().await.ok_or_else(|| {
            WalletError::Connect("no in-page wallet provider found".to_string())
        })?;

        provider.enable().await.map_err(|err| {
            tracing::info!("wallet extension declined enable: {}", err);
            WalletError::Connect(format!("wallet extension rejected enable: {err}"))
        })?;

        tracing::info!("wallet extension enabled");
        Ok(provider)
    }

    async fn discover(&self) -> Option<Arc<dyn WebLnProvider>> {
        if let Some(provider) = self.slot.get() {
            return Some(provider);
        }

        let poll = async {
            let mut ticker = tokio::time::interval(self.poll_interval);
            loop {
                ticker.tick().await;
                if let Some(provider) = self.slot.get() {
                    return provider;
                }
            }
        };

        match tokio::time::timeout(self.discovery_timeout, poll).await {
            Ok(provider) => Some(provider),
            Err(_) => {
                tracing::debug!(
                    timeout_ms = self.discovery_timeout.as_millis() as u64,
                    "no wallet extension injected within discovery window"
                );
                None
            }
        }
    }
}
