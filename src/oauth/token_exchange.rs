//! Usage: OAuth token endpoint helpers (authorization_code + refresh_token grants).

use crate::infra::http::{HttpRequest, HttpTransport};
use crate::shared::error::{WalletError, WalletResult};
use crate::shared::security::sanitize_error_body;
use serde_json::Value;

#[derive(Debug, Clone)]
pub(crate) struct TokenExchangeRequest<'a> {
    pub(crate) token_url: &'a str,
    pub(crate) client_id: &'a str,
    pub(crate) code: &'a str,
    pub(crate) redirect_uri: &'a str,
    pub(crate) code_verifier: &'a str,
}

#[derive(Debug, Clone)]
pub(crate) struct TokenRefreshRequest<'a> {
    pub(crate) token_url: &'a str,
    pub(crate) client_id: &'a str,
    pub(crate) refresh_token: &'a str,
}

#[derive(Clone, PartialEq, Eq)]
pub(crate) struct OAuthTokenSet {
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
}

impl std::fmt::Debug for OAuthTokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenSet")
            .field("access_token", &crate::shared::security::mask_token(&self.access_token))
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

pub(crate) async fn exchange_authorization_code(
    transport: &dyn HttpTransport,
    req: &TokenExchangeRequest<'_>,
) -> WalletResult<OAuthTokenSet> {
    let request = HttpRequest::post_form(
        req.token_url,
        vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", req.code.trim().to_string()),
            ("redirect_uri", req.redirect_uri.trim().to_string()),
            ("code_verifier", req.code_verifier.trim().to_string()),
            ("client_id", req.client_id.trim().to_string()),
        ],
    );
    request_tokens(transport, request)
        .await
        .map_err(WalletError::TokenExchange)
}

pub(crate) async fn refresh_access_token(
    transport: &dyn HttpTransport,
    req: &TokenRefreshRequest<'_>,
) -> WalletResult<OAuthTokenSet> {
    let request = HttpRequest::post_form(
        req.token_url,
        vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", req.refresh_token.trim().to_string()),
            ("client_id", req.client_id.trim().to_string()),
        ],
    );
    request_tokens(transport, request)
        .await
        .map_err(WalletError::Refresh)
}

async fn request_tokens(
    transport: &dyn HttpTransport,
    request: HttpRequest,
) -> Result<OAuthTokenSet, String> {
    let response = transport
        .send(request)
        .await
        .map_err(|e| format!("token endpoint unreachable: {e}"))?;

    if !response.is_success() {
        let (error_code, error_description) = parse_oauth_error_details(&response.body);
        let mut msg = format!("token endpoint returned status={}", response.status);
        if let Some(code) = error_code {
            msg.push_str(" code=");
            msg.push_str(&code);
        }
        match error_description {
            Some(detail) => {
                msg.push_str(" message=");
                msg.push_str(&detail.chars().take(240).collect::<String>());
            }
            None if !response.body.trim().is_empty() => {
                msg.push_str(" body=");
                msg.push_str(&sanitize_error_body(&response.body));
            }
            None => {}
        }
        return Err(msg);
    }

    parse_token_body(&response.body)
}

fn parse_token_body(body: &str) -> Result<OAuthTokenSet, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("token response json invalid: {e}"))?;

    let access_token = non_empty_str(&value, "access_token")
        .ok_or_else(|| "token response missing access_token".to_string())?;
    let refresh_token = non_empty_str(&value, "refresh_token");

    Ok(OAuthTokenSet {
        access_token,
        refresh_token,
    })
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Extract `(error, error_description)` from standard or nested provider error payloads.
pub(crate) fn parse_oauth_error_details(body: &str) -> (Option<String>, Option<String>) {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return (None, None),
    };

    let mut code = non_empty_str(&value, "code");
    let mut message = non_empty_str(&value, "error_description")
        .or_else(|| non_empty_str(&value, "message"));

    match value.get("error") {
        Some(Value::String(err)) => {
            if code.is_none() && !err.trim().is_empty() {
                code = Some(err.trim().to_string());
            }
        }
        Some(Value::Object(err_obj)) => {
            if code.is_none() {
                code = err_obj
                    .get("code")
                    .or_else(|| err_obj.get("type"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
            }
            if message.is_none() {
                message = err_obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
            }
        }
        _ => {}
    }

    (code, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_token_body_requires_access_token() {
        let tokens = parse_token_body(r#"{"access_token":" at ","refresh_token":""}"#).unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.refresh_token, None);

        let err = parse_token_body(r#"{"refresh_token":"rt"}"#).unwrap_err();
        assert!(err.contains("missing access_token"));
    }

    #[test]
    fn parse_oauth_error_details_supports_standard_fields() {
        let (code, message) = parse_oauth_error_details(
            r#"{"error":"invalid_grant","error_description":"code expired"}"#,
        );
        assert_eq!(code.as_deref(), Some("invalid_grant"));
        assert_eq!(message.as_deref(), Some("code expired"));
    }

    #[test]
    fn parse_oauth_error_details_supports_nested_payload() {
        let (code, message) = parse_oauth_error_details(
            r#"{"error":{"type":"invalid_request_error","message":"bad verifier"}}"#,
        );
        assert_eq!(code.as_deref(), Some("invalid_request_error"));
        assert_eq!(message.as_deref(), Some("bad verifier"));
    }

    #[test]
    fn parse_oauth_error_details_ignores_non_json() {
        assert_eq!(parse_oauth_error_details("<html>"), (None, None));
    }

    #[test]
    fn token_set_debug_masks_access_token() {
        let tokens = OAuthTokenSet {
            access_token: "abcdef1234567890".to_string(),
            refresh_token: Some("rt".to_string()),
        };
        let rendered = format!("{tokens:?}");
        assert!(!rendered.contains("abcdef1234567890"));
        assert!(rendered.contains("abcdef...7890"));
    }
}
