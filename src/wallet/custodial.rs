//! Usage: WalletCapability surface over the custodian REST API (one authenticated call per method).

use crate::oauth::client::{ApiRequest, OAuthClient};
use crate::shared::error::{WalletError, WalletResult};
use crate::wallet::types::{
    Balance, Invoice, InvoiceRequest, KeysendRequest, NodeInfo, PaymentReceipt, PaymentTarget,
    SignedMessage,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const CUSTODIAL_VERSION: &str = "Alby OAuth";
const CUSTODIAL_METHODS: &[&str] = &["makeInvoice", "sendPayment", "getBalance"];

#[derive(Debug, Clone)]
pub struct CustodialWallet {
    client: Arc<OAuthClient>,
}

impl CustodialWallet {
    pub fn new(client: Arc<OAuthClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<OAuthClient> {
        &self.client
    }

    /// Nothing to negotiate; the session either exists or it does not.
    pub fn enable(&self) -> WalletResult<()> {
        if self.client.is_authenticated() {
            Ok(())
        } else {
            Err(WalletError::Connect(
                "not authenticated with Alby".to_string(),
            ))
        }
    }

    pub async fn get_info(&self) -> WalletResult<NodeInfo> {
        let data = self.call(ApiRequest::get("/user/me")).await?;
        Ok(NodeInfo {
            alias: str_field(&data, "name").unwrap_or_default(),
            pubkey: str_field(&data, "lightning_address").unwrap_or_default(),
            connected_peers: None,
            active_channels: None,
            pending_channels: None,
            version: Some(CUSTODIAL_VERSION.to_string()),
            methods: CUSTODIAL_METHODS.iter().map(|m| m.to_string()).collect(),
        })
    }

    pub async fn get_balance(&self) -> WalletResult<Balance> {
        let data = self.call(ApiRequest::get("/balance")).await?;
        let balance = u64_field(&data, "balance");
        Ok(Balance {
            total: balance,
            confirmed: balance,
            unconfirmed: 0,
        })
    }

    pub async fn make_invoice(&self, request: &InvoiceRequest) -> WalletResult<Invoice> {
        let body = json!({
            "amount": request.amount_sats,
            "description": request.description(),
            "expiry": request.expiry(),
        });
        let data = self.call(ApiRequest::post("/invoices", body)).await?;
        let payment_request = str_field(&data, "payment_request").ok_or_else(|| {
            WalletError::Api {
                status: None,
                message: "custodian invoice response missing payment_request".to_string(),
            }
        })?;
        tracing::info!(amount_sats = request.amount_sats, "custodial invoice created");
        Ok(Invoice { payment_request })
    }

    pub async fn send_payment(&self, target: &PaymentTarget) -> WalletResult<PaymentReceipt> {
        let body = json!({ "invoice": target.payment_request() });
        let data = self
            .call(ApiRequest::post("/payments", body))
            .await
            .map_err(payment_failure)?;
        receipt_from(&data)
    }

    pub async fn keysend(&self, request: &KeysendRequest) -> WalletResult<PaymentReceipt> {
        let body = json!({
            "destination": request.destination,
            "amount": request.amount_sats,
            "custom_records": request.custom_records,
        });
        let data = self
            .call(ApiRequest::post("/payments/keysend", body))
            .await
            .map_err(payment_failure)?;
        receipt_from(&data)
    }

    pub fn sign_message(&self, _message: &str) -> WalletResult<SignedMessage> {
        Err(WalletError::UnsupportedOperation(
            "message signing is not supported via Alby OAuth".to_string(),
        ))
    }

    pub fn verify_message(&self, _signature: &str, _message: &str) -> WalletResult<()> {
        Err(WalletError::UnsupportedOperation(
            "message verification is not supported via Alby OAuth".to_string(),
        ))
    }

    async fn call(&self, request: ApiRequest) -> WalletResult<Value> {
        let response = self.client.authenticated_request(request).await?;
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        response.json_body()
    }
}

/// Custodian rejections of a payment surface as `Payment`; auth and transport failures keep their kind.
fn payment_failure(err: WalletError) -> WalletError {
    match err {
        WalletError::Api {
            status: Some(status),
            message,
        } if status != 401 => WalletError::Payment(message),
        other => other,
    }
}

fn receipt_from(data: &Value) -> WalletResult<PaymentReceipt> {
    let preimage = str_field(data, "payment_preimage").ok_or_else(|| {
        WalletError::Payment("custodian response missing payment_preimage".to_string())
    })?;
    Ok(PaymentReceipt {
        preimage,
        payment_hash: str_field(data, "payment_hash"),
    })
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn u64_field(data: &Value, key: &str) -> u64 {
    match data.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::credential_store::{
        CredentialStore, MemoryCredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
    };
    use crate::infra::http::{HttpMethod, RequestBody};
    use crate::oauth::client::OAuthConfig;
    use crate::test_support::{RecordingUserAgent, ScriptedTransport};
    use std::collections::BTreeMap;

    fn wallet(transport: Arc<ScriptedTransport>) -> (CustodialWallet, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        store.save(ACCESS_TOKEN_KEY, "at").unwrap();
        store.save(REFRESH_TOKEN_KEY, "rt").unwrap();
        let client = OAuthClient::new(
            OAuthConfig {
                client_id: "client-1".to_string(),
                redirect_uri: "http://localhost:3000/callback".to_string(),
                authorize_url: "https://getalby.com/oauth".to_string(),
                token_url: "https://api.getalby.com/oauth/token".to_string(),
                api_base_url: "https://api.getalby.com".to_string(),
                scopes: vec!["account:read".to_string()],
            },
            store.clone(),
            transport,
            Arc::new(RecordingUserAgent::default()),
        );
        (CustodialWallet::new(Arc::new(client)), store)
    }

    #[tokio::test]
    async fn make_invoice_posts_amount_description_expiry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"payment_request": "lnbc10u1pcoffee"}));
        let (wallet, _) = wallet(transport.clone());

        let invoice = wallet
            .make_invoice(&InvoiceRequest::new(1000).with_memo("coffee").with_expiry(3600))
            .await
            .unwrap();

        assert_eq!(invoice.payment_request, "lnbc10u1pcoffee");
        let requests = transport.requests();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].url, "https://api.getalby.com/invoices");
        assert_eq!(
            requests[0].body,
            RequestBody::Json(json!({"amount": 1000, "description": "coffee", "expiry": 3600}))
        );
    }

    #[tokio::test]
    async fn get_info_maps_user_profile() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"name": "satoshi", "lightning_address": "satoshi@getalby.com"}));
        let (wallet, _) = wallet(transport);

        let info = wallet.get_info().await.unwrap();
        assert_eq!(info.alias, "satoshi");
        assert_eq!(info.pubkey, "satoshi@getalby.com");
        assert_eq!(info.version.as_deref(), Some(CUSTODIAL_VERSION));
        assert!(info.supports("sendPayment"));
    }

    #[tokio::test]
    async fn balance_defaults_missing_numbers_to_zero() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"balance": 2100}));
        transport.push_json(200, json!({}));
        let (wallet, _) = wallet(transport);

        assert_eq!(
            wallet.get_balance().await.unwrap(),
            Balance { total: 2100, confirmed: 2100, unconfirmed: 0 }
        );
        assert_eq!(wallet.get_balance().await.unwrap(), Balance::default());
    }

    #[tokio::test]
    async fn send_payment_accepts_structured_request() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"payment_preimage": "pre", "payment_hash": "hash"}));
        let (wallet, _) = wallet(transport.clone());

        let receipt = wallet
            .send_payment(&PaymentTarget::Request {
                payment_request: "lnbc1abc".to_string(),
                amount_sats: None,
                memo: None,
            })
            .await
            .unwrap();
        assert_eq!(receipt.preimage, "pre");
        assert_eq!(receipt.payment_hash.as_deref(), Some("hash"));
        assert_eq!(
            transport.requests()[0].body,
            RequestBody::Json(json!({"invoice": "lnbc1abc"}))
        );
    }

    #[tokio::test]
    async fn custodian_rejection_is_a_payment_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(400, json!({"message": "insufficient balance"}));
        let (wallet, _) = wallet(transport);

        let err = wallet.send_payment(&"lnbc1abc".into()).await.unwrap_err();
        assert_eq!(err, WalletError::Payment("insufficient balance".to_string()));
    }

    #[tokio::test]
    async fn keysend_posts_custom_records() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"payment_preimage": "pre"}));
        let (wallet, _) = wallet(transport.clone());

        let mut custom_records = BTreeMap::new();
        custom_records.insert("696969".to_string(), "hello".to_string());
        let receipt = wallet
            .keysend(&KeysendRequest {
                destination: "02".repeat(33),
                amount_sats: 21,
                custom_records,
            })
            .await
            .unwrap();

        assert_eq!(receipt.payment_hash, None);
        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://api.getalby.com/payments/keysend");
        assert_eq!(
            request.body,
            RequestBody::Json(json!({
                "destination": "02".repeat(33),
                "amount": 21,
                "custom_records": {"696969": "hello"},
            }))
        );
    }

    #[tokio::test]
    async fn refreshes_once_then_retries() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(401, json!({"message": "token expired"}));
        transport.push_json(200, json!({"access_token": "at-2", "refresh_token": "rt-2"}));
        transport.push_json(200, json!({"balance": 5}));
        let (wallet, store) = wallet(transport.clone());

        assert_eq!(wallet.get_balance().await.unwrap().total, 5);
        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].bearer.as_deref(), Some("at"));
        assert_eq!(requests[1].form_value("grant_type"), Some("refresh_token"));
        assert_eq!(requests[2].bearer.as_deref(), Some("at-2"));
        assert_eq!(store.load(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("at-2"));
    }

    #[tokio::test]
    async fn second_unauthorized_is_an_api_error_without_another_refresh() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(401, json!({}));
        transport.push_json(200, json!({"access_token": "at-2"}));
        transport.push_json(401, json!({"message": "still unauthorized"}));
        let (wallet, _) = wallet(transport.clone());

        let err = wallet.send_payment(&"lnbc1abc".into()).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn signing_is_unsupported() {
        let (wallet, _) = wallet(Arc::new(ScriptedTransport::new()));
        assert_eq!(
            wallet.sign_message("hello").unwrap_err().code(),
            "UNSUPPORTED_OPERATION"
        );
        assert_eq!(
            wallet.verify_message("sig", "hello").unwrap_err().code(),
            "UNSUPPORTED_OPERATION"
        );
    }
}
