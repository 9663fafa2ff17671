//! Usage: OAuth client for the custodial wallet (PKCE authorization, token lifecycle, bearer calls).
//!
//! Session material lives in memory and is mirrored to the injected `CredentialStore`
//! so a reload can resume without another redirect.

use crate::app::user_agent::UserAgent;
use crate::infra::credential_store::{
    CredentialStore, ACCESS_TOKEN_KEY, OAUTH_STATE_KEY, PKCE_VERIFIER_KEY, REFRESH_TOKEN_KEY,
};
use crate::infra::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody};
use crate::infra::settings::WalletSettings;
use crate::oauth::pkce;
use crate::oauth::token_exchange::{
    self, parse_oauth_error_details, OAuthTokenSet, TokenExchangeRequest, TokenRefreshRequest,
};
use crate::shared::error::{WalletError, WalletResult};
use crate::shared::mutex_ext::MutexExt;
use crate::shared::security::{mask_token, sanitize_error_body};
use reqwest::Url;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// A 401 earns one refresh and one replay of the request, never more.
const MAX_REFRESH_RETRIES: u32 = 1;
const NOT_AUTHENTICATED_MESSAGE: &str = "not authenticated with Alby; connect your account again";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    pub fn from_settings(settings: &WalletSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            authorize_url: settings.authorize_url.clone(),
            token_url: settings.token_url.clone(),
            api_base_url: settings.api_base_url.clone(),
            scopes: settings.scopes.clone(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    AwaitingRedirect,
    Authenticated,
    Refreshing,
}

#[derive(Clone, Default)]
struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    pkce_verifier: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &self.access_token.as_deref().map(mask_token))
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_pkce_verifier", &self.pkce_verifier.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct SessionState {
    session: Session,
    phase: AuthPhase,
}

/// Custodian API call description; the base URL and bearer token are added by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

pub struct OAuthClient {
    config: OAuthConfig,
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn HttpTransport>,
    user_agent: Arc<dyn UserAgent>,
    state: Mutex<SessionState>,
    /// Serializes refresh grants; the custodian rotates refresh tokens on every use.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.config.client_id)
            .field("state", &*self.state.lock_or_recover())
            .finish()
    }
}

impl OAuthClient {
    /// Builds the client and restores any persisted session.
    pub fn new(
        config: OAuthConfig,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn HttpTransport>,
        user_agent: Arc<dyn UserAgent>,
    ) -> Self {
        let session = Session {
            access_token: load_lossy(store.as_ref(), ACCESS_TOKEN_KEY),
            refresh_token: load_lossy(store.as_ref(), REFRESH_TOKEN_KEY),
            pkce_verifier: load_lossy(store.as_ref(), PKCE_VERIFIER_KEY),
        };
        let phase = if session.access_token.is_some() {
            AuthPhase::Authenticated
        } else if session.pkce_verifier.is_some() {
            AuthPhase::AwaitingRedirect
        } else {
            AuthPhase::Unauthenticated
        };
        tracing::debug!(?phase, "oauth session restored");

        Self {
            config,
            store,
            transport,
            user_agent,
            state: Mutex::new(SessionState { session, phase }),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn phase(&self) -> AuthPhase {
        self.state.lock_or_recover().phase
    }

    /// True iff an access token is held. Expiry is discovered reactively through 401s.
    pub fn is_authenticated(&self) -> bool {
        self.state.lock_or_recover().session.access_token.is_some()
    }

    /// Generate and persist a fresh verifier + state, and return the authorization URL.
    pub fn authorization_url(&self) -> WalletResult<Url> {
        let pair = pkce::generate_pkce_pair();
        let state = pkce::generate_state();

        self.store.save(PKCE_VERIFIER_KEY, &pair.code_verifier)?;
        self.store.save(OAUTH_STATE_KEY, &state)?;

        let mut url = Url::parse(&self.config.authorize_url)
            .map_err(|e| WalletError::Config(format!("invalid authorize url: {e}")))?;
        {
            let scope = self.config.scopes.join(" ");
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("response_type", "code");
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("scope", &scope);
            query.append_pair("code_challenge", &pair.code_challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("state", &state);
        }

        let mut guard = self.state.lock_or_recover();
        guard.session.pkce_verifier = Some(pair.code_verifier);
        if guard.session.access_token.is_none() {
            guard.phase = AuthPhase::AwaitingRedirect;
        }
        Ok(url)
    }

    /// Persist PKCE material and send the user agent to the authorization endpoint.
    pub fn start_authorization_flow(&self) -> WalletResult<Url> {
        let url = self.authorization_url()?;
        tracing::info!(authorize_url = %self.config.authorize_url, "redirecting to alby authorization");
        self.user_agent.navigate(&url)?;
        Ok(url)
    }

    /// The `state` value issued with the last authorization redirect, if one is pending.
    pub(crate) fn pending_state(&self) -> Option<String> {
        load_lossy(self.store.as_ref(), OAUTH_STATE_KEY)
    }

    pub async fn handle_callback(&self, code: &str) -> WalletResult<()> {
        let verifier = load_lossy(self.store.as_ref(), PKCE_VERIFIER_KEY)
            .ok_or(WalletError::MissingVerifier)?;

        let request = TokenExchangeRequest {
            token_url: &self.config.token_url,
            client_id: &self.config.client_id,
            code,
            redirect_uri: &self.config.redirect_uri,
            code_verifier: &verifier,
        };
        let tokens =
            match token_exchange::exchange_authorization_code(self.transport.as_ref(), &request)
                .await
            {
                Ok(tokens) => tokens,
                Err(err) => {
                    tracing::warn!("alby authorization code exchange failed: {}", err);
                    return Err(err);
                }
            };

        self.install_tokens(tokens)?;
        self.store.remove(PKCE_VERIFIER_KEY)?;
        self.store.remove(OAUTH_STATE_KEY)?;
        self.state.lock_or_recover().session.pkce_verifier = None;

        tracing::info!("alby account connected");
        Ok(())
    }

    /// Refresh failure is terminal: the session is destroyed and `Refresh` is returned.
    pub async fn refresh_access_token(&self) -> WalletResult<()> {
        let _refresh = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh after `rejected` drew a 401, unless a concurrent refresh already replaced it.
    async fn refresh_after_rejection(&self, rejected: &str) -> WalletResult<()> {
        let _refresh = self.refresh_lock.lock().await;
        let current = self.state.lock_or_recover().session.access_token.clone();
        if current.as_deref() != Some(rejected) {
            tracing::debug!("access token already replaced by a concurrent refresh");
            return Ok(());
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> WalletResult<()> {
        let refresh_token = {
            let mut guard = self.state.lock_or_recover();
            guard.phase = AuthPhase::Refreshing;
            guard.session.refresh_token.clone()
        };

        let Some(refresh_token) = refresh_token else {
            tracing::warn!("alby token refresh impossible without a refresh token; logging out");
            self.logout();
            return Err(WalletError::Refresh(
                "no refresh token available".to_string(),
            ));
        };

        let request = TokenRefreshRequest {
            token_url: &self.config.token_url,
            client_id: &self.config.client_id,
            refresh_token: &refresh_token,
        };
        match token_exchange::refresh_access_token(self.transport.as_ref(), &request).await {
            Ok(tokens) => {
                self.install_tokens(tokens)?;
                tracing::info!("alby access token refreshed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!("alby token refresh failed; logging out: {}", err);
                self.logout();
                Err(err)
            }
        }
    }

    /// Bearer-authenticated custodian call with one refresh-and-replay on 401.
    pub async fn authenticated_request(&self, request: ApiRequest) -> WalletResult<HttpResponse> {
        let url = self.config.api_url(&request.path);
        let mut refreshes = 0;

        loop {
            let token = self
                .state
                .lock_or_recover()
                .session
                .access_token
                .clone()
                .ok_or_else(|| WalletError::api(401, NOT_AUTHENTICATED_MESSAGE))?;

            let http_request = HttpRequest {
                method: request.method,
                url: url.clone(),
                bearer: None,
                body: request
                    .body
                    .clone()
                    .map_or(RequestBody::None, RequestBody::Json),
            }
            .with_bearer(token.as_str());
            let response = self.transport.send(http_request).await?;

            if response.status == 401 {
                if refreshes < MAX_REFRESH_RETRIES {
                    refreshes += 1;
                    tracing::debug!(path = %request.path, "custodian returned 401; refreshing token");
                    self.refresh_after_rejection(&token).await?;
                    continue;
                }
                tracing::warn!(path = %request.path, "custodian rejected refreshed token");
            }

            if !response.is_success() {
                return Err(api_error_from_response(&response));
            }
            return Ok(response);
        }
    }

    /// Unconditional and idempotent; storage failures are logged, not returned.
    pub fn logout(&self) {
        {
            let mut guard = self.state.lock_or_recover();
            guard.session = Session::default();
            guard.phase = AuthPhase::Unauthenticated;
        }
        for key in [
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            PKCE_VERIFIER_KEY,
            OAUTH_STATE_KEY,
        ] {
            if let Err(err) = self.store.remove(key) {
                tracing::warn!(key, "failed to clear persisted credential: {}", err);
            }
        }
        tracing::info!("alby session cleared");
    }

    fn install_tokens(&self, tokens: OAuthTokenSet) -> WalletResult<()> {
        let (access_token, refresh_token) = {
            let mut guard = self.state.lock_or_recover();
            guard.session.access_token = Some(tokens.access_token);
            // Providers that do not rotate refresh tokens omit them from refresh responses.
            if tokens.refresh_token.is_some() {
                guard.session.refresh_token = tokens.refresh_token;
            }
            guard.phase = AuthPhase::Authenticated;
            (
                guard.session.access_token.clone(),
                guard.session.refresh_token.clone(),
            )
        };

        if let Some(token) = access_token.as_deref() {
            self.store.save(ACCESS_TOKEN_KEY, token)?;
        }
        match refresh_token.as_deref() {
            Some(token) => self.store.save(REFRESH_TOKEN_KEY, token)?,
            None => self.store.remove(REFRESH_TOKEN_KEY)?,
        }
        Ok(())
    }
}

fn load_lossy(store: &dyn CredentialStore, key: &str) -> Option<String> {
    match store.load(key) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(err) => {
            tracing::warn!(key, "credential store unavailable; treating as absent: {}", err);
            None
        }
    }
}

/// Map a non-2xx custodian response to `Api`, preferring the provider's own message.
pub(crate) fn api_error_from_response(response: &HttpResponse) -> WalletError {
    let (code, message) = parse_oauth_error_details(&response.body);
    let message = match (code, message) {
        (_, Some(message)) => message,
        (Some(code), None) => code,
        (None, None) if response.body.trim().is_empty() => "empty response body".to_string(),
        (None, None) => sanitize_error_body(&response.body),
    };
    WalletError::api(response.status, message)
}
