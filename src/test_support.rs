//! Usage: Public test doubles (scripted HTTP transport, recording user agent, fake WebLN provider).

use crate::app::user_agent::UserAgent;
use crate::infra::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::shared::error::{WalletError, WalletResult};
use crate::shared::mutex_ext::MutexExt;
use crate::wallet::extension::{ProviderError, WebLnProvider};
use crate::wallet::types::{
    Balance, Invoice, InvoiceRequest, KeysendRequest, NodeInfo, PaymentReceipt, SignedMessage,
};
use reqwest::Url;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Answers requests from a FIFO script and records every request it sees.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<WalletResult<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: HttpResponse) {
        self.responses.lock_or_recover().push_back(Ok(response));
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push_response(HttpResponse::json(status, body));
    }

    pub fn push_error(&self, err: WalletError) {
        self.responses.lock_or_recover().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock_or_recover().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock_or_recover().len()
    }
}

#[async_trait::async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> WalletResult<HttpResponse> {
        let url = request.url.clone();
        self.requests.lock_or_recover().push(request);
        self.responses
            .lock_or_recover()
            .pop_front()
            .unwrap_or_else(|| Err(WalletError::transport(format!("no scripted response for {url}"))))
    }
}

#[derive(Debug, Default)]
pub struct RecordingUserAgent {
    redirects: Mutex<Vec<String>>,
    reloads: AtomicUsize,
}

impl RecordingUserAgent {
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock_or_recover().clone()
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl UserAgent for RecordingUserAgent {
    fn navigate(&self, url: &Url) -> WalletResult<()> {
        self.redirects.lock_or_recover().push(url.to_string());
        Ok(())
    }

    fn reload(&self) -> WalletResult<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scriptable stand-in for an extension-injected provider.
#[derive(Debug, Default)]
pub struct FakeWebLnProvider {
    enable_error: Option<String>,
    enable_delay: Option<Duration>,
    payment_error: Option<String>,
    balance: Balance,
    info: NodeInfo,
    enable_calls: AtomicUsize,
    payments: Mutex<Vec<String>>,
    invoice_requests: Mutex<Vec<InvoiceRequest>>,
    keysends: Mutex<Vec<KeysendRequest>>,
}

impl FakeWebLnProvider {
    pub fn new() -> Self {
        Self {
            info: NodeInfo {
                alias: "fake-node".to_string(),
                pubkey: format!("02{}", "ab".repeat(32)),
                methods: vec![
                    "getInfo".to_string(),
                    "makeInvoice".to_string(),
                    "sendPayment".to_string(),
                    "keysend".to_string(),
                ],
                ..NodeInfo::default()
            },
            ..Self::default()
        }
    }

    pub fn rejecting_enable(mut self, message: impl Into<String>) -> Self {
        self.enable_error = Some(message.into());
        self
    }

    pub fn with_enable_delay(mut self, delay: Duration) -> Self {
        self.enable_delay = Some(delay);
        self
    }

    pub fn failing_payments(mut self, message: impl Into<String>) -> Self {
        self.payment_error = Some(message.into());
        self
    }

    pub fn with_balance(mut self, balance: Balance) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_info(mut self, info: NodeInfo) -> Self {
        self.info = info;
        self
    }

    pub fn enable_calls(&self) -> usize {
        self.enable_calls.load(Ordering::SeqCst)
    }

    pub fn payments(&self) -> Vec<String> {
        self.payments.lock_or_recover().clone()
    }

    pub fn invoice_requests(&self) -> Vec<InvoiceRequest> {
        self.invoice_requests.lock_or_recover().clone()
    }

    pub fn keysends(&self) -> Vec<KeysendRequest> {
        self.keysends.lock_or_recover().clone()
    }

    fn payment_result(&self, seed: &str) -> Result<PaymentReceipt, ProviderError> {
        if let Some(message) = self.payment_error.as_deref() {
            return Err(ProviderError::new(message));
        }
        Ok(PaymentReceipt {
            preimage: format!("preimage-{seed}"),
            payment_hash: Some(format!("hash-{seed}")),
        })
    }
}

#[async_trait::async_trait]
impl WebLnProvider for FakeWebLnProvider {
    async fn enable(&self) -> Result<(), ProviderError> {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.enable_delay {
            tokio::time::sleep(delay).await;
        }
        match self.enable_error.as_deref() {
            Some(message) => Err(ProviderError::new(message)),
            None => Ok(()),
        }
    }

    async fn get_info(&self) -> Result<NodeInfo, ProviderError> {
        Ok(self.info.clone())
    }

    async fn get_balance(&self) -> Result<Balance, ProviderError> {
        Ok(self.balance)
    }

    async fn make_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, ProviderError> {
        self.invoice_requests.lock_or_recover().push(request.clone());
        Ok(Invoice {
            payment_request: format!("lnbc{}n1fake", request.amount_sats * 10),
        })
    }

    async fn send_payment(&self, payment_request: &str) -> Result<PaymentReceipt, ProviderError> {
        self.payments
            .lock_or_recover()
            .push(payment_request.to_string());
        self.payment_result(payment_request)
    }

    async fn keysend(&self, request: &KeysendRequest) -> Result<PaymentReceipt, ProviderError> {
        self.keysends.lock_or_recover().push(request.clone());
        self.payment_result(&request.destination)
    }

    async fn sign_message(&self, message: &str) -> Result<SignedMessage, ProviderError> {
        Ok(SignedMessage {
            message: message.to_string(),
            signature: format!("sig:{message}"),
        })
    }

    async fn verify_message(&self, signature: &str, message: &str) -> Result<(), ProviderError> {
        if signature == format!("sig:{message}") {
            Ok(())
        } else {
            Err(ProviderError::new("signature does not match message"))
        }
    }
}
