//! Usage: The single wallet surface consumers call, whichever backend is active.

use crate::shared::error::{WalletError, WalletResult};
use crate::wallet::custodial::CustodialWallet;
use crate::wallet::extension::{ProviderError, WebLnProvider};
use crate::wallet::types::{
    Balance, Invoice, InvoiceRequest, KeysendRequest, NodeInfo, PaymentReceipt, PaymentTarget,
    SignedMessage,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NO_WALLET_MESSAGE: &str = "No Lightning wallet detected. Please install the Alby browser extension or connect with your Alby account.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Extension,
    Custodial,
    Unavailable,
}

#[derive(Clone)]
pub enum WalletCapability {
    Extension(Arc<dyn WebLnProvider>),
    Custodial(CustodialWallet),
    /// Every call fails with the no-wallet error; a manual OAuth connect is still possible.
    Unavailable,
}

impl std::fmt::Debug for WalletCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extension(_) => f.write_str("WalletCapability::Extension"),
            Self::Custodial(wallet) => f.debug_tuple("WalletCapability::Custodial").field(wallet).finish(),
            Self::Unavailable => f.write_str("WalletCapability::Unavailable"),
        }
    }
}

pub fn no_wallet_error() -> WalletError {
    WalletError::Connect(NO_WALLET_MESSAGE.to_string())
}

impl WalletCapability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Extension(_) => CapabilityKind::Extension,
            Self::Custodial(_) => CapabilityKind::Custodial,
            Self::Unavailable => CapabilityKind::Unavailable,
        }
    }

    pub async fn enable(&self) -> WalletResult<()> {
        match self {
            Self::Extension(provider) => provider
                .enable()
                .await
                .map_err(|e| WalletError::Connect(e.message)),
            Self::Custodial(wallet) => wallet.enable(),
            Self::Unavailable => Err(no_wallet_error()),
        }
    }

    pub async fn get_info(&self) -> WalletResult<NodeInfo> {
        match self {
            Self::Extension(provider) => provider.get_info().await.map_err(provider_failure),
            Self::Custodial(wallet) => wallet.get_info().await,
            Self::Unavailable => Err(no_wallet_error()),
        }
    }

    pub async fn get_balance(&self) -> WalletResult<Balance> {
        match self {
            Self::Extension(provider) => provider.get_balance().await.map_err(provider_failure),
            Self::Custodial(wallet) => wallet.get_balance().await,
            Self::Unavailable => Err(no_wallet_error()),
        }
    }

    pub async fn make_invoice(
        &self,
        amount_sats: u64,
        memo: Option<&str>,
        expiry_seconds: Option<u64>,
    ) -> WalletResult<Invoice> {
        let request = InvoiceRequest {
            amount_sats,
            memo: memo.map(str::to_string),
            expiry_seconds,
        };
        match self {
            Self::Extension(provider) => provider
                .make_invoice(&request)
                .await
                .map_err(provider_failure),
            Self::Custodial(wallet) => wallet.make_invoice(&request).await,
            Self::Unavailable => Err(no_wallet_error()),
        }
    }

    pub async fn send_payment(
        &self,
        target: impl Into<PaymentTarget>,
    ) -> WalletResult<PaymentReceipt> {
        let target = target.into();
        match self {
            Self::Extension(provider) => provider
                .send_payment(target.payment_request())
                .await
                .map_err(|e| WalletError::Payment(e.message)),
            Self::Custodial(wallet) => wallet.send_payment(&target).await,
            Self::Unavailable => Err(no_wallet_error()),
        }
    }

    pub async fn keysend(
        &self,
        destination: &str,
        amount_sats: u64,
        custom_records: Option<BTreeMap<String, String>>,
    ) -> WalletResult<PaymentReceipt> {
        let request = KeysendRequest {
            destination: destination.to_string(),
            amount_sats,
            custom_records: custom_records.unwrap_or_default(),
        };
        match self {
            Self::Extension(provider) => provider
                .keysend(&request)
                .await
                .map_err(|e| WalletError::Payment(e.message)),
            Self::Custodial(wallet) => wallet.keysend(&request).await,
            Self::Unavailable => Err(no_wallet_error()),
        }
    }

    pub async fn sign_message(&self, message: &str) -> WalletResult<SignedMessage> {
        match self {
            Self::Extension(provider) => provider
                .sign_message(message)
                .await
                .map_err(provider_failure),
            Self::Custodial(wallet) => wallet.sign_message(message),
            Self::Unavailable => Err(no_wallet_error()),
        }
    }

    pub async fn verify_message(&self, signature: &str, message: &str) -> WalletResult<()> {
        match self {
            Self::Extension(provider) => provider
                .verify_message(signature, message)
                .await
                .map_err(provider_failure),
            Self::Custodial(wallet) => wallet.verify_message(signature, message),
            Self::Unavailable => Err(no_wallet_error()),
        }
    }
}

fn provider_failure(err: ProviderError) -> WalletError {
    WalletError::transport(err.message)
}
