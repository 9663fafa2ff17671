//! Usage: Unified wallet error model (every failure renders as `CODE: message`).

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// No wallet reachable by any means.
    #[error("CONNECT_ERROR: {0}")]
    Connect(String),
    /// The PKCE verifier is gone (restarted session or forged callback).
    #[error("MISSING_VERIFIER: no pending authorization; start the connect flow again")]
    MissingVerifier,
    /// The callback route was reached without an authorization code.
    #[error("MISSING_CODE: no authorization code found in the callback url")]
    MissingCode,
    #[error("TOKEN_EXCHANGE_ERROR: {0}")]
    TokenExchange(String),
    #[error("REFRESH_ERROR: {0}")]
    Refresh(String),
    /// Non-2xx from the custodian (or the transport failed before a status arrived).
    #[error("API_ERROR: {}", format_api_message(*.status, .message))]
    Api { status: Option<u16>, message: String },
    #[error("PAYMENT_ERROR: {0}")]
    Payment(String),
    #[error("UNSUPPORTED_OPERATION: {0}")]
    UnsupportedOperation(String),
    #[error("STORAGE_ERROR: {0}")]
    Storage(String),
    #[error("CONFIG_ERROR: {0}")]
    Config(String),
}

fn format_api_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("status={status} {message}"),
        None => message.to_string(),
    }
}

impl WalletError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Api {
            status: None,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "CONNECT_ERROR",
            Self::MissingVerifier => "MISSING_VERIFIER",
            Self::MissingCode => "MISSING_CODE",
            Self::TokenExchange(_) => "TOKEN_EXCHANGE_ERROR",
            Self::Refresh(_) => "REFRESH_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::Payment(_) => "PAYMENT_ERROR",
            Self::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// HTTP status carried by an `Api` error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for WalletError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(format!("sqlite: {value}"))
    }
}

impl From<r2d2::Error> for WalletError {
    fn from(value: r2d2::Error) -> Self {
        Self::Storage(format!("connection pool: {value}"))
    }
}
