//! Usage: Lightning input helpers (validation, BOLT11 amount sniffing, display formatting).
//!
//! These are shallow checks for form input; nothing here decodes or verifies an invoice.

use regex::Regex;
use std::sync::OnceLock;

pub const MAX_MEMO_CHARS: usize = 280;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Amount is required")]
    AmountRequired,
    #[error("Amount must be a number")]
    AmountNotNumeric,
    #[error("Amount must be greater than 0")]
    AmountNotPositive,
    #[error("Amount must be a whole number")]
    AmountNotWhole,
    #[error("Memo must be less than 280 characters")]
    MemoTooLong,
    #[error("Lightning address is required")]
    AddressRequired,
    #[error("Invalid Lightning address format")]
    AddressInvalid,
    #[error("Node public key is required")]
    PubkeyRequired,
    #[error("Invalid node public key format")]
    PubkeyInvalid,
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex pattern"))
}

fn invoice_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"^(lnbc|lntb|lnbcrt)[0-9]+[a-zA-Z0-9]+$")
}

fn invoice_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?i)^(lnbc|lntb|lnbcrt)([0-9]+)([munp])")
}

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
}

fn pubkey_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?i)^[0-9a-f]{66}$")
}

pub fn is_valid_lightning_invoice(invoice: &str) -> bool {
    invoice_re().is_match(invoice)
}

pub fn is_valid_lightning_address(address: &str) -> bool {
    address_re().is_match(address)
}

pub fn is_valid_node_pubkey(pubkey: &str) -> bool {
    pubkey_re().is_match(pubkey)
}

/// Amount in sats encoded in the BOLT11 human-readable part. Sub-satoshi units yield fractions.
pub fn extract_amount_from_invoice(invoice: &str) -> Option<f64> {
    let captures = invoice_amount_re().captures(invoice)?;
    let amount: f64 = captures.get(2)?.as_str().parse().ok()?;
    let multiplier = match captures.get(3)?.as_str().to_ascii_lowercase().as_str() {
        "m" => 100_000.0,
        "u" => 100.0,
        "n" => 0.1,
        "p" => 0.0001,
        _ => return None,
    };
    Some(amount * multiplier)
}

pub fn format_satoshis(sats: u64) -> String {
    if sats >= 1_000_000 {
        format!("{:.2}M sats", sats as f64 / 1_000_000.0)
    } else if sats >= 1_000 {
        format!("{:.2}K sats", sats as f64 / 1_000.0)
    } else {
        format!("{sats} sats")
    }
}

pub fn format_duration(seconds: u64) -> String {
    match seconds {
        s if s < 60 => format!("{s} seconds"),
        s if s < 3_600 => format!("{} minutes", s / 60),
        s if s < 86_400 => format!("{} hours", s / 3_600),
        s => format!("{} days", s / 86_400),
    }
}

pub fn truncate_middle(value: &str, start_chars: usize, end_chars: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= start_chars + end_chars {
        return value.to_string();
    }
    let head: String = chars[..start_chars].iter().collect();
    let tail: String = chars[chars.len() - end_chars..].iter().collect();
    format!("{head}...{tail}")
}

pub fn validate_amount(raw: &str) -> Result<u64, InputError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(InputError::AmountRequired);
    }
    let value: f64 = raw.parse().map_err(|_| InputError::AmountNotNumeric)?;
    if value.is_nan() {
        return Err(InputError::AmountNotNumeric);
    }
    if value <= 0.0 {
        return Err(InputError::AmountNotPositive);
    }
    if value.fract() != 0.0 || value > u64::MAX as f64 {
        return Err(InputError::AmountNotWhole);
    }
    Ok(value as u64)
}

pub fn validate_memo(memo: &str) -> Result<(), InputError> {
    if memo.chars().count() > MAX_MEMO_CHARS {
        return Err(InputError::MemoTooLong);
    }
    Ok(())
}

pub fn validate_lightning_address(address: &str) -> Result<(), InputError> {
    if address.is_empty() {
        return Err(InputError::AddressRequired);
    }
    if !is_valid_lightning_address(address) {
        return Err(InputError::AddressInvalid);
    }
    Ok(())
}

pub fn validate_node_pubkey(pubkey: &str) -> Result<(), InputError> {
    if pubkey.is_empty() {
        return Err(InputError::PubkeyRequired);
    }
    if !is_valid_node_pubkey(pubkey) {
        return Err(InputError::PubkeyInvalid);
    }
    Ok(())
}
