//! Usage: Shapes shared by every wallet capability (node info, balances, invoices, receipts).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_INVOICE_MEMO: &str = "Invoice from Lightning App";
pub const DEFAULT_INVOICE_EXPIRY_SECS: u64 = 3600;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub alias: String,
    pub pubkey: String,
    pub connected_peers: Option<u32>,
    pub active_channels: Option<u32>,
    pub pending_channels: Option<u32>,
    pub version: Option<String>,
    pub methods: Vec<String>,
}

impl NodeInfo {
    pub fn supports(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

/// Amounts in satoshis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total: u64,
    pub confirmed: u64,
    pub unconfirmed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub amount_sats: u64,
    pub memo: Option<String>,
    pub expiry_seconds: Option<u64>,
}

impl InvoiceRequest {
    pub fn new(amount_sats: u64) -> Self {
        Self {
            amount_sats,
            memo: None,
            expiry_seconds: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_expiry(mut self, expiry_seconds: u64) -> Self {
        self.expiry_seconds = Some(expiry_seconds);
        self
    }

    /// Blank memos fall back to the default description.
    pub fn description(&self) -> &str {
        self.memo
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_INVOICE_MEMO)
    }

    pub fn expiry(&self) -> u64 {
        self.expiry_seconds
            .filter(|e| *e > 0)
            .unwrap_or(DEFAULT_INVOICE_EXPIRY_SECS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub payment_request: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub preimage: String,
    pub payment_hash: Option<String>,
}

/// What `send_payment` accepts: a bare BOLT11 string or a structured request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentTarget {
    Invoice(String),
    Request {
        payment_request: String,
        amount_sats: Option<u64>,
        memo: Option<String>,
    },
}

impl PaymentTarget {
    pub fn payment_request(&self) -> &str {
        match self {
            Self::Invoice(invoice) => invoice,
            Self::Request {
                payment_request, ..
            } => payment_request,
        }
    }
}

impl From<&str> for PaymentTarget {
    fn from(value: &str) -> Self {
        Self::Invoice(value.to_string())
    }
}

impl From<String> for PaymentTarget {
    fn from(value: String) -> Self {
        Self::Invoice(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysendRequest {
    pub destination: String,
    pub amount_sats: u64,
    /// TLV record type (decimal string) to value.
    pub custom_records: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub message: String,
    pub signature: String,
}
