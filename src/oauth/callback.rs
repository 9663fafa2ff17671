//! Usage: OAuth redirect landing route (query parsing, state check, code exchange, HTML answer).

use crate::oauth::client::OAuthClient;
use crate::shared::error::{WalletError, WalletResult};
use crate::shared::security::constant_time_eq;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use std::sync::Arc;

const SUCCESS_HTML: &str = "<html><body><h1>Wallet connected</h1><p>Your Alby account is connected. You may return to the app.</p></body></html>";
const MISSING_CODE_MESSAGE: &str = "No authorization code found in the URL";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackPayload {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Parse a request target such as `/callback?code=abc&state=xyz`.
pub fn parse_callback_target(target: &str) -> WalletResult<CallbackPayload> {
    let url = Url::parse(&format!("http://localhost{target}")).map_err(|e| {
        WalletError::TokenExchange(format!("invalid oauth callback target: {e}"))
    })?;

    let mut payload = CallbackPayload::default();
    for (key, value) in url.query_pairs() {
        let value = Some(value.to_string()).filter(|v| !v.is_empty());
        match key.as_ref() {
            "code" => payload.code = value,
            "state" => payload.state = value,
            "error" => payload.error = value,
            "error_description" => payload.error_description = value,
            _ => {}
        }
    }
    Ok(payload)
}

pub async fn complete_callback(client: &OAuthClient, payload: &CallbackPayload) -> WalletResult<()> {
    if let Some(error) = payload.error.as_deref() {
        let detail = payload.error_description.as_deref().unwrap_or(error);
        tracing::warn!(error, "alby authorization was not granted");
        return Err(WalletError::TokenExchange(format!(
            "authorization denied: {detail}"
        )));
    }

    let code = payload.code.as_deref().ok_or(WalletError::MissingCode)?;

    if let Some(expected) = client.pending_state() {
        let matches = payload
            .state
            .as_deref()
            .is_some_and(|state| constant_time_eq(state.as_bytes(), expected.as_bytes()));
        if !matches {
            tracing::warn!("oauth callback state mismatch; ignoring authorization code");
            return Err(WalletError::TokenExchange(
                "oauth callback state mismatch".to_string(),
            ));
        }
    }

    client.handle_callback(code).await
}

/// GET route at `path` that completes the authorization and answers with a small HTML page.
pub fn callback_router(client: Arc<OAuthClient>, path: &str) -> Router {
    Router::new()
        .route(path, get(callback_handler))
        .with_state(client)
}

async fn callback_handler(
    State(client): State<Arc<OAuthClient>>,
    uri: Uri,
) -> (StatusCode, Html<String>) {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let result = match parse_callback_target(&target) {
        Ok(payload) => complete_callback(&client, &payload).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => (StatusCode::OK, Html(SUCCESS_HTML.to_string())),
        Err(err) => {
            let message = match err {
                WalletError::MissingCode => MISSING_CODE_MESSAGE.to_string(),
                other => other.to_string(),
            };
            (StatusCode::BAD_REQUEST, Html(error_page(&message)))
        }
    }
}

fn error_page(message: &str) -> String {
    format!(
        "<html><body><h1>Connection failed</h1><p>{}</p><p>Return to the app and try connecting again.</p></body></html>",
        escape_html(message)
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
