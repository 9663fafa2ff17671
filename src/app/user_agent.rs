//! Usage: Navigation seam between the connector and its host page (redirects and reloads).

use crate::shared::error::{WalletError, WalletResult};
use reqwest::Url;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Redirect(Url),
    Reload,
}

pub trait UserAgent: Send + Sync {
    fn navigate(&self, url: &Url) -> WalletResult<()>;
    fn reload(&self) -> WalletResult<()>;
}

/// Forwards navigation requests to the host over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelUserAgent {
    tx: mpsc::UnboundedSender<Navigation>,
}

impl ChannelUserAgent {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Navigation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, navigation: Navigation) -> WalletResult<()> {
        self.tx
            .send(navigation)
            .map_err(|_| WalletError::Connect("host stopped listening for navigation".to_string()))
    }
}

impl UserAgent for ChannelUserAgent {
    fn navigate(&self, url: &Url) -> WalletResult<()> {
        tracing::debug!(host = url.host_str().unwrap_or_default(), "navigation requested");
        self.send(Navigation::Redirect(url.clone()))
    }

    fn reload(&self) -> WalletResult<()> {
        tracing::debug!("page reload requested");
        self.send(Navigation::Reload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_navigation_in_order() {
        let (agent, mut rx) = ChannelUserAgent::new();
        let url = Url::parse("https://getalby.com/oauth?client_id=x").unwrap();

        agent.navigate(&url).unwrap();
        agent.reload().unwrap();

        assert_eq!(rx.try_recv().unwrap(), Navigation::Redirect(url));
        assert_eq!(rx.try_recv().unwrap(), Navigation::Reload);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_is_an_error() {
        let (agent, rx) = ChannelUserAgent::new();
        drop(rx);
        let err = agent.reload().unwrap_err();
        assert_eq!(err.code(), "CONNECT_ERROR");
    }
}
