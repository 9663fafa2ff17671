//! Usage: Sat/fiat conversion backed by a periodically refreshed BTC price feed.

use crate::infra::http::{HttpRequest, HttpTransport};
use crate::shared::error::{WalletError, WalletResult};
use crate::shared::mutex_ext::RwLockExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const SATS_PER_BTC: f64 = 100_000_000.0;
pub const DEFAULT_FIAT_CURRENCY: &str = "USD";

/// Price of one satoshi per upper-case currency code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRates {
    per_sat: BTreeMap<String, f64>,
}

impl ExchangeRates {
    /// Parse a `{"bitcoin": {"usd": 65000.0, ...}}` price body.
    pub fn from_btc_prices(body: &Value) -> WalletResult<Self> {
        let prices = body
            .get("bitcoin")
            .and_then(Value::as_object)
            .ok_or_else(|| WalletError::transport("exchange rate response missing bitcoin prices"))?;

        let per_sat = prices
            .iter()
            .filter_map(|(currency, price)| {
                let price = price.as_f64().filter(|p| p.is_finite() && *p >= 0.0)?;
                Some((currency.to_ascii_uppercase(), price / SATS_PER_BTC))
            })
            .collect();
        Ok(Self { per_sat })
    }

    pub fn rate(&self, currency: &str) -> Option<f64> {
        self.per_sat.get(&currency.to_ascii_uppercase()).copied()
    }

    pub fn sats_to_fiat(&self, sats: u64, currency: &str) -> f64 {
        match self.rate(currency) {
            Some(rate) => sats as f64 * rate,
            None => 0.0,
        }
    }

    /// Rounded to the nearest sat; 0 when the currency has no usable rate.
    pub fn fiat_to_sats(&self, amount: f64, currency: &str) -> u64 {
        match self.rate(currency) {
            Some(rate) if rate > 0.0 && amount > 0.0 => (amount / rate).round() as u64,
            _ => 0,
        }
    }

    pub fn currencies(&self) -> Vec<String> {
        self.per_sat.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.per_sat.is_empty()
    }
}

#[derive(Debug)]
struct FeedState {
    rates: ExchangeRates,
    currency: String,
    last_error: Option<WalletError>,
}

/// Shared rate cache; readers never wait on the network.
pub struct FiatRateFeed {
    transport: Arc<dyn HttpTransport>,
    url: String,
    state: RwLock<FeedState>,
}

impl std::fmt::Debug for FiatRateFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiatRateFeed")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl FiatRateFeed {
    pub fn new(transport: Arc<dyn HttpTransport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            state: RwLock::new(FeedState {
                rates: ExchangeRates::default(),
                currency: DEFAULT_FIAT_CURRENCY.to_string(),
                last_error: None,
            }),
        }
    }

    pub async fn fetch_rates(&self) -> WalletResult<ExchangeRates> {
        let response = self.transport.send(HttpRequest::get(&self.url)).await?;
        if !response.is_success() {
            return Err(WalletError::api(
                response.status,
                "Failed to fetch exchange rates",
            ));
        }
        ExchangeRates::from_btc_prices(&response.json_body()?)
    }

    /// Fetch and install new rates. On failure the previous rates stay in place.
    pub async fn refresh(&self) -> WalletResult<()> {
        match self.fetch_rates().await {
            Ok(rates) => {
                let mut state = self.state.write_or_recover();
                tracing::debug!(currencies = rates.per_sat.len(), "exchange rates refreshed");
                state.rates = rates;
                state.last_error = None;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("exchange rate refresh failed: {}", err);
                let mut state = self.state.write_or_recover();
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn rates(&self) -> ExchangeRates {
        self.read(|state| state.rates.clone())
    }

    pub fn currency(&self) -> String {
        self.read(|state| state.currency.clone())
    }

    pub fn last_error(&self) -> Option<WalletError> {
        self.read(|state| state.last_error.clone())
    }

    pub fn available_currencies(&self) -> Vec<String> {
        self.read(|state| state.rates.currencies())
    }

    /// Only currencies with a known rate are accepted; returns whether the switch happened.
    pub fn set_preferred_currency(&self, currency: &str) -> bool {
        let mut state = self.state.write_or_recover();
        let code = currency.to_ascii_uppercase();
        if state.rates.rate(&code).is_none() {
            return false;
        }
        state.currency = code;
        true
    }

    pub fn sats_to_fiat(&self, sats: u64) -> f64 {
        self.read(|state| state.rates.sats_to_fiat(sats, &state.currency))
    }

    pub fn fiat_to_sats(&self, amount: f64) -> u64 {
        self.read(|state| state.rates.fiat_to_sats(amount, &state.currency))
    }

    fn read<T>(&self, f: impl FnOnce(&FeedState) -> T) -> T {
        let state = self.state.read_or_recover();
        f(&state)
    }
}

/// Background refresh task; aborted when dropped.
#[derive(Debug)]
pub struct RatePoller {
    handle: JoinHandle<()>,
}

impl Drop for RatePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Refresh immediately, then every `interval`, until the poller is dropped.
pub fn spawn_rate_poller(feed: Arc<FiatRateFeed>, interval: Duration) -> RatePoller {
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = feed.refresh().await {
                tracing::debug!(url = %feed.url, "rate poller keeps previous rates: {}", err);
            }
        }
    });
    RatePoller { handle }
}
