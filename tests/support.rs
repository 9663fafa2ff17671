#![allow(dead_code)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use lnwallet_connect::WalletSettings;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn settings_for(base_url: &str) -> WalletSettings {
    WalletSettings {
        client_id: "test-client".to_string(),
        redirect_uri: "http://localhost:3000/callback".to_string(),
        token_url: format!("{base_url}/oauth/token"),
        api_base_url: base_url.to_string(),
        extension_discovery_timeout_ms: 20,
        extension_poll_interval_ms: 5,
        fiat_rates_url: format!("{base_url}/rates"),
        fiat_refresh_interval_secs: 0,
        ..WalletSettings::default()
    }
}

#[derive(Debug, Default)]
pub struct CustodianState {
    pub access_token: String,
    pub refresh_token: String,
    pub authorization_code: String,
    pub reject_refresh: bool,
    /// Answer the next N bearer calls with 401 regardless of the token.
    pub force_unauthorized: u32,
    pub balance: u64,
    pub token_grants: Vec<HashMap<String, String>>,
    pub api_calls: Vec<(String, Option<String>)>,
    pub invoice_bodies: Vec<Value>,
    pub rate_requests: u32,
}

/// Minimal custodian: token endpoint plus the bearer-protected REST routes.
pub struct FakeCustodian {
    pub addr: SocketAddr,
    state: Arc<Mutex<CustodianState>>,
    handle: JoinHandle<()>,
}

impl FakeCustodian {
    pub async fn start(state: CustodianState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let router = Router::new()
            .route("/oauth/token", post(token))
            .route("/user/me", get(user_me))
            .route("/balance", get(balance))
            .route("/invoices", post(invoices))
            .route("/payments", post(payments))
            .route("/rates", get(rates))
            .with_state(state.clone());

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn state(&self) -> MutexGuard<'_, CustodianState> {
        self.state.lock().expect("custodian state")
    }
}

impl Drop for FakeCustodian {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

type Shared = State<Arc<Mutex<CustodianState>>>;

async fn token(State(state): Shared, Form(form): Form<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().expect("custodian state");
    state.token_grants.push(form.clone());

    let granted = match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") => form.get("code") == Some(&state.authorization_code),
        Some("refresh_token") => {
            !state.reject_refresh && form.get("refresh_token") == Some(&state.refresh_token)
        }
        _ => false,
    };
    if !granted {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "grant rejected"})),
        );
    }

    let generation = state.token_grants.len();
    state.access_token = format!("access-{generation}");
    state.refresh_token = format!("refresh-{generation}");
    (
        StatusCode::OK,
        Json(json!({
            "access_token": state.access_token,
            "refresh_token": state.refresh_token,
            "token_type": "bearer",
            "expires_in": 7200
        })),
    )
}

fn authorize(state: &mut CustodianState, path: &str, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    state.api_calls.push((path.to_string(), bearer.clone()));

    if state.force_unauthorized > 0 {
        state.force_unauthorized -= 1;
        return Err((StatusCode::UNAUTHORIZED, Json(json!({"message": "token expired"}))));
    }
    if bearer.as_deref() != Some(state.access_token.as_str()) {
        return Err((StatusCode::UNAUTHORIZED, Json(json!({"message": "invalid token"}))));
    }
    Ok(())
}

async fn user_me(State(state): Shared, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().expect("custodian state");
    if let Err(denied) = authorize(&mut state, "/user/me", &headers) {
        return denied;
    }
    (
        StatusCode::OK,
        Json(json!({"name": "Satoshi", "lightning_address": "satoshi@getalby.com"})),
    )
}

async fn balance(State(state): Shared, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().expect("custodian state");
    if let Err(denied) = authorize(&mut state, "/balance", &headers) {
        return denied;
    }
    (StatusCode::OK, Json(json!({"balance": state.balance, "currency": "BTC", "unit": "sat"})))
}

async fn invoices(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().expect("custodian state");
    if let Err(denied) = authorize(&mut state, "/invoices", &headers) {
        return denied;
    }
    state.invoice_bodies.push(body.clone());
    let amount = body.get("amount").and_then(Value::as_u64).unwrap_or(0);
    (
        StatusCode::CREATED,
        Json(json!({"payment_request": format!("lnbc{}n1custodian", amount * 10), "payment_hash": "h"})),
    )
}

async fn payments(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().expect("custodian state");
    if let Err(denied) = authorize(&mut state, "/payments", &headers) {
        return denied;
    }
    if body.get("invoice").and_then(Value::as_str) == Some("lnbc1unpayable") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "insufficient balance"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"payment_preimage": "preimage-1", "payment_hash": "hash-1"})),
    )
}

async fn rates(State(state): Shared) -> Json<Value> {
    state.lock().expect("custodian state").rate_requests += 1;
    Json(json!({"bitcoin": {"usd": 100000, "eur": 90000}}))
}
