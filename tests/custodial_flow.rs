mod support;

use lnwallet_connect::infra::credential_store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use lnwallet_connect::oauth::callback::{complete_callback, parse_callback_target};
use lnwallet_connect::test_support::RecordingUserAgent;
use lnwallet_connect::{
    bootstrap_with, CapabilityKind, CredentialStore, HttpTransport, ProviderSlot, ReqwestTransport,
    SqliteCredentialStore, WalletError, WalletRuntime,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use support::{settings_for, CustodianState, FakeCustodian};

const ORIGIN: &str = "http://localhost:3000";

async fn runtime(custodian: &FakeCustodian, db: &Path) -> (WalletRuntime, Arc<SqliteCredentialStore>) {
    let store = Arc::new(SqliteCredentialStore::open(db, ORIGIN).unwrap());
    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(Duration::from_secs(5)).unwrap());
    let runtime = bootstrap_with(
        &settings_for(&custodian.base_url()),
        store.clone(),
        transport,
        ProviderSlot::new(),
        Arc::new(RecordingUserAgent::default()),
    )
    .await;
    (runtime, store)
}

async fn connect(runtime: &WalletRuntime) {
    let url = runtime.orchestrator.start_manual_oauth_connect().unwrap();
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    let payload =
        parse_callback_target(&format!("/callback?code=auth-code&state={state}")).unwrap();
    complete_callback(&runtime.oauth, &payload).await.unwrap();
}

fn custodian_state() -> CustodianState {
    CustodianState {
        authorization_code: "auth-code".to_string(),
        balance: 2_100,
        ..CustodianState::default()
    }
}

#[tokio::test]
async fn connect_then_resume_after_reload_and_refresh_once() {
    let custodian = FakeCustodian::start(custodian_state()).await;
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("credentials.db");

    let (first, store) = runtime(&custodian, &db).await;
    assert_eq!(first.orchestrator.snapshot().kind(), CapabilityKind::Unavailable);
    connect(&first).await;
    assert_eq!(store.load(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("access-1"));

    let (second, _) = runtime(&custodian, &db).await;
    let state = second.orchestrator.snapshot();
    assert_eq!(state.kind(), CapabilityKind::Custodial);
    assert!(state.is_alby_fallback);

    custodian.state().force_unauthorized = 1;
    let balance = second.orchestrator.capability().get_balance().await.unwrap();
    assert_eq!(balance.total, 2_100);
    assert_eq!(balance.unconfirmed, 0);

    let custodian_state = custodian.state();
    let grants: Vec<&str> = custodian_state
        .token_grants
        .iter()
        .map(|g| g["grant_type"].as_str())
        .collect();
    assert_eq!(grants, vec!["authorization_code", "refresh_token"]);
    let bearers: Vec<Option<&str>> = custodian_state
        .api_calls
        .iter()
        .map(|(_, bearer)| bearer.as_deref())
        .collect();
    assert_eq!(bearers, vec![Some("access-1"), Some("access-2")]);
    assert_eq!(custodian_state.token_grants[0]["client_id"], "test-client");
    assert!(custodian_state.token_grants[0]["code_verifier"].len() >= 43);
}

#[tokio::test]
async fn rejected_refresh_clears_persisted_tokens() {
    let custodian = FakeCustodian::start(custodian_state()).await;
    let dir = tempfile::tempdir().unwrap();
    let (runtime, store) = runtime(&custodian, &dir.path().join("credentials.db")).await;
    connect(&runtime).await;

    {
        let mut state = custodian.state();
        state.reject_refresh = true;
        state.force_unauthorized = 1;
    }
    let capability = lnwallet_connect::WalletCapability::Custodial(
        lnwallet_connect::wallet::custodial::CustodialWallet::new(runtime.oauth.clone()),
    );
    let err = capability.get_info().await.unwrap_err();

    assert_eq!(err.code(), "REFRESH_ERROR");
    assert!(!runtime.oauth.is_authenticated());
    assert_eq!(store.load(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(store.load(REFRESH_TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn second_unauthorized_does_not_refresh_again() {
    let custodian = FakeCustodian::start(custodian_state()).await;
    let dir = tempfile::tempdir().unwrap();
    let (runtime, _) = runtime(&custodian, &dir.path().join("credentials.db")).await;
    connect(&runtime).await;
    custodian.state().force_unauthorized = 2;

    let wallet = lnwallet_connect::wallet::custodial::CustodialWallet::new(runtime.oauth.clone());
    let err = wallet.get_info().await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    let state = custodian.state();
    assert_eq!(state.token_grants.len(), 2);
    assert_eq!(state.api_calls.len(), 2);
}

#[tokio::test]
async fn invoice_and_payment_round_trip_over_http() {
    let custodian = FakeCustodian::start(custodian_state()).await;
    let dir = tempfile::tempdir().unwrap();
    let (runtime, _) = runtime(&custodian, &dir.path().join("credentials.db")).await;
    connect(&runtime).await;
    let wallet = lnwallet_connect::WalletCapability::Custodial(
        lnwallet_connect::wallet::custodial::CustodialWallet::new(runtime.oauth.clone()),
    );

    let invoice = wallet
        .make_invoice(1000, Some("coffee"), Some(3600))
        .await
        .unwrap();
    assert_eq!(invoice.payment_request, "lnbc10000n1custodian");
    assert_eq!(
        custodian.state().invoice_bodies,
        vec![json!({"amount": 1000, "description": "coffee", "expiry": 3600})]
    );

    let receipt = wallet.send_payment("lnbc10u1payable").await.unwrap();
    assert_eq!(receipt.preimage, "preimage-1");

    let err = wallet.send_payment("lnbc1unpayable").await.unwrap_err();
    assert_eq!(err, WalletError::Payment("insufficient balance".to_string()));

    let info = wallet.get_info().await.unwrap();
    assert_eq!(info.alias, "Satoshi");
}

#[tokio::test]
async fn concurrent_unauthorized_calls_share_one_refresh() {
    let custodian = FakeCustodian::start(custodian_state()).await;
    let dir = tempfile::tempdir().unwrap();
    let (runtime, store) = runtime(&custodian, &dir.path().join("credentials.db")).await;
    connect(&runtime).await;
    // Every call carrying the issued token is now rejected until a refresh succeeds.
    custodian.state().access_token = "revoked".to_string();

    let wallet = lnwallet_connect::WalletCapability::Custodial(
        lnwallet_connect::wallet::custodial::CustodialWallet::new(runtime.oauth.clone()),
    );
    let (a, b) = tokio::join!(wallet.get_balance(), wallet.get_balance());

    assert_eq!(a.unwrap().total, 2_100);
    assert_eq!(b.unwrap().total, 2_100);
    assert!(runtime.oauth.is_authenticated());
    assert_eq!(store.load(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("access-2"));
    assert_eq!(store.load(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("refresh-2"));

    let state = custodian.state();
    let grants: Vec<&str> = state
        .token_grants
        .iter()
        .map(|g| g["grant_type"].as_str())
        .collect();
    assert_eq!(grants, vec!["authorization_code", "refresh_token"]);
}

#[tokio::test]
async fn runtime_polls_exchange_rates_when_interval_configured() {
    let custodian = FakeCustodian::start(custodian_state()).await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteCredentialStore::open(&dir.path().join("credentials.db"), ORIGIN).unwrap());
    let settings = lnwallet_connect::WalletSettings {
        fiat_refresh_interval_secs: 3600,
        ..settings_for(&custodian.base_url())
    };
    let runtime = bootstrap_with(
        &settings,
        store,
        Arc::new(ReqwestTransport::new(Duration::from_secs(5)).unwrap()),
        ProviderSlot::new(),
        Arc::new(RecordingUserAgent::default()),
    )
    .await;
    assert!(runtime.fiat_poller.is_some());

    for _ in 0..200 {
        if !runtime.fiat.rates().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(runtime.fiat.available_currencies(), vec!["EUR", "USD"]);
    assert_eq!(runtime.fiat.fiat_to_sats(1.0), 1_000);
    assert_eq!(custodian.state().rate_requests, 1);
}

#[tokio::test]
async fn zero_interval_leaves_rate_poller_off() {
    let custodian = FakeCustodian::start(custodian_state()).await;
    let dir = tempfile::tempdir().unwrap();
    let (runtime, _) = runtime(&custodian, &dir.path().join("credentials.db")).await;

    assert!(runtime.fiat_poller.is_none());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(custodian.state().rate_requests, 0);
    assert!(runtime.fiat.rates().is_empty());
}
