//! Usage: Pay a Lightning address (`user@domain`) via the LNURL-pay call sequence.

use crate::infra::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::shared::error::{WalletError, WalletResult};
use crate::wallet::capability::WalletCapability;
use crate::wallet::types::PaymentReceipt;
use reqwest::Url;
use serde_json::Value;

/// Pay parameters published at `/.well-known/lnurlp/{user}`. Bounds are in millisatoshis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LnurlPayParams {
    pub callback: String,
    pub min_sendable: u64,
    pub max_sendable: u64,
    pub metadata: String,
    pub comment_allowed: Option<u64>,
}

fn lnurl_error(message: impl Into<String>) -> WalletError {
    WalletError::Api {
        status: None,
        message: message.into(),
    }
}

pub async fn resolve_lightning_address(
    transport: &dyn HttpTransport,
    address: &str,
) -> WalletResult<LnurlPayParams> {
    let (user, domain) = address
        .trim()
        .split_once('@')
        .filter(|(user, domain)| !user.is_empty() && !domain.is_empty())
        .ok_or_else(|| {
            lnurl_error("Invalid Lightning address format. Should be user@domain.com")
        })?;

    let url = format!("https://{domain}/.well-known/lnurlp/{user}");
    let data = fetch_lnurl_json(transport, &url, "Failed to resolve Lightning address").await?;

    let callback = data
        .get("callback")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| lnurl_error("Invalid LNURL data: missing callback URL"))?;

    tracing::debug!(domain, "lightning address resolved");
    Ok(LnurlPayParams {
        callback: callback.to_string(),
        min_sendable: number_field(&data, "minSendable").unwrap_or(1_000),
        max_sendable: number_field(&data, "maxSendable").unwrap_or(u64::MAX),
        metadata: data
            .get("metadata")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        comment_allowed: number_field(&data, "commentAllowed"),
    })
}

/// Ask the LNURL callback for an invoice of `amount_sats`; returns the BOLT11 string.
pub async fn request_invoice(
    transport: &dyn HttpTransport,
    params: &LnurlPayParams,
    amount_sats: u64,
    comment: Option<&str>,
) -> WalletResult<String> {
    let amount_msat = amount_sats
        .checked_mul(1_000)
        .ok_or_else(|| lnurl_error("Amount too large"))?;
    if amount_msat < params.min_sendable {
        return Err(lnurl_error(format!(
            "Amount too small. Minimum is {} sats",
            format_msat_as_sats(params.min_sendable)
        )));
    }
    if amount_msat > params.max_sendable {
        return Err(lnurl_error(format!(
            "Amount too large. Maximum is {} sats",
            format_msat_as_sats(params.max_sendable)
        )));
    }

    let mut url = Url::parse(&params.callback)
        .map_err(|e| lnurl_error(format!("Invalid LNURL callback URL: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("amount", &amount_msat.to_string());
        if let Some(comment) = comment.map(str::trim).filter(|c| !c.is_empty()) {
            query.append_pair("comment", comment);
        }
    }

    let data = fetch_lnurl_json(
        transport,
        url.as_str(),
        "Failed to get invoice from Lightning address",
    )
    .await?;
    data.get("pr")
        .and_then(Value::as_str)
        .filter(|pr| !pr.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| lnurl_error("No invoice received from Lightning address"))
}

pub async fn pay_lightning_address(
    capability: &WalletCapability,
    transport: &dyn HttpTransport,
    address: &str,
    amount_sats: u64,
    comment: Option<&str>,
) -> WalletResult<PaymentReceipt> {
    let params = resolve_lightning_address(transport, address).await?;
    let invoice = request_invoice(transport, &params, amount_sats, comment).await?;
    let receipt = capability.send_payment(invoice).await?;
    tracing::info!(amount_sats, "lightning address paid");
    Ok(receipt)
}

async fn fetch_lnurl_json(
    transport: &dyn HttpTransport,
    url: &str,
    failure: &str,
) -> WalletResult<Value> {
    let response: HttpResponse = transport.send(HttpRequest::get(url)).await?;
    if !response.is_success() {
        return Err(WalletError::api(response.status, failure));
    }
    let data = response.json_body()?;
    if data.get("status").and_then(Value::as_str) == Some("ERROR") {
        let reason = data
            .get("reason")
            .and_then(Value::as_str)
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("Error from Lightning address provider");
        return Err(lnurl_error(reason));
    }
    Ok(data)
}

fn number_field(data: &Value, key: &str) -> Option<u64> {
    let value = data.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

fn format_msat_as_sats(msat: u64) -> String {
    if msat % 1_000 == 0 {
        (msat / 1_000).to_string()
    } else {
        format!("{}", msat as f64 / 1_000.0)
    }
}
