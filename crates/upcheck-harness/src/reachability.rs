//! Management web service reachability.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::Result;

#[async_trait]
pub trait ServiceProbe: Send + Sync {
    /// Whether the host's management web service answers HTTP 200.
    async fn reachable(&self, host: &str) -> bool;
}

/// Probes `http://<host>:<port>` with a plain GET.
pub struct HttpServiceProbe {
    port: u16,
    http_client: reqwest::Client,
}

impl HttpServiceProbe {
    pub fn new(port: u16) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("upcheck/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { port, http_client })
    }

    pub fn url(&self, host: &str) -> String {
        format!("http://{}:{}", host, self.port)
    }
}

#[async_trait]
impl ServiceProbe for HttpServiceProbe {
    async fn reachable(&self, host: &str) -> bool {
        let url = self.url(host);
        match self.http_client.get(&url).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                info!(url = %url, "management service reachable");
                true
            }
            Ok(response) => {
                error!(url = %url, status = %response.status(), "management service cannot be connected");
                false
            }
            Err(e) => {
                error!(url = %url, error = %e, "management service cannot be connected");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url() {
        let probe = HttpServiceProbe::new(9090).unwrap();
        assert_eq!(probe.url("10.66.8.12"), "http://10.66.8.12:9090");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_false() {
        let probe = HttpServiceProbe::new(9).unwrap();
        assert!(!probe.reachable("127.0.0.1").await);
    }
}
