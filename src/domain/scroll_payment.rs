//! Usage: Scroll-triggered micropayments to a Lightning address.
//!
//! The host reports scroll positions; the session decides when a payment is due and pays it
//! through the active wallet capability. Any failed payment switches the session off.

use crate::domain::lightning::is_valid_lightning_address;
use crate::domain::lightning_address::pay_lightning_address;
use crate::infra::http::HttpTransport;
use crate::shared::error::{WalletError, WalletResult};
use crate::wallet::capability::WalletCapability;
use crate::wallet::types::PaymentReceipt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollPaymentConfig {
    pub recipient: String,
    pub amount_per_scroll: u64,
    /// Pixels scrolled past the last trigger before the next payment is due.
    pub scroll_threshold: u64,
    pub max_payments: u32,
}

impl Default for ScrollPaymentConfig {
    fn default() -> Self {
        Self {
            recipient: String::new(),
            amount_per_scroll: 10,
            scroll_threshold: 1000,
            max_payments: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrollPaymentSession {
    config: ScrollPaymentConfig,
    enabled: bool,
    payment_due: bool,
    payment_count: u32,
    last_trigger_position: u64,
    last_error: Option<WalletError>,
}

impl ScrollPaymentSession {
    pub fn new(config: ScrollPaymentConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ScrollPaymentConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn payment_count(&self) -> u32 {
        self.payment_count
    }

    pub fn last_error(&self) -> Option<&WalletError> {
        self.last_error.as_ref()
    }

    pub fn start(&mut self, position: u64) -> WalletResult<()> {
        let recipient = self.config.recipient.trim();
        if recipient.is_empty() {
            return Err(WalletError::Payment(
                "Please enter a recipient Lightning address".to_string(),
            ));
        }
        if !is_valid_lightning_address(recipient) {
            return Err(WalletError::Payment(
                "Invalid Lightning address format".to_string(),
            ));
        }

        self.enabled = true;
        self.payment_due = false;
        self.payment_count = 0;
        self.last_trigger_position = position;
        self.last_error = None;
        tracing::info!(max_payments = self.config.max_payments, "scroll payments enabled");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.enabled = false;
        self.payment_due = false;
    }

    /// Record a scroll position; true when it makes a payment due.
    pub fn on_scroll(&mut self, position: u64) -> bool {
        if !self.enabled || self.payment_due || self.payment_count >= self.config.max_payments {
            return false;
        }
        if position > self.last_trigger_position.saturating_add(self.config.scroll_threshold) {
            self.last_trigger_position = position;
            self.payment_due = true;
            return true;
        }
        false
    }

    pub async fn pay_due(
        &mut self,
        capability: &WalletCapability,
        transport: &dyn HttpTransport,
    ) -> WalletResult<PaymentReceipt> {
        if !self.enabled || self.payment_count >= self.config.max_payments {
            self.payment_due = false;
            return Err(WalletError::Payment(
                "scroll payments are not active".to_string(),
            ));
        }

        let memo = format!("Scroll payment #{}", self.payment_count + 1);
        let result = pay_lightning_address(
            capability,
            transport,
            self.config.recipient.trim(),
            self.config.amount_per_scroll,
            Some(&memo),
        )
        .await;
        self.payment_due = false;

        match result {
            Ok(receipt) => {
                self.payment_count += 1;
                tracing::info!(
                    payment = self.payment_count,
                    max_payments = self.config.max_payments,
                    "scroll payment sent"
                );
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!("scroll payment failed; disabling: {}", err);
                self.enabled = false;
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }
}
