// src/services/probe.rs

//! Lightweight existence checks against listing URLs.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::CrawlerConfig;
use crate::utils::http;

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The listing answered with a success status
    Live,
    /// Non-success status, timeout or transport error
    Gone(String),
}

impl ProbeOutcome {
    pub fn is_live(&self) -> bool {
        matches!(self, ProbeOutcome::Live)
    }
}

/// Checks whether a listing URL is still reachable.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// HEAD-request probe. Redirects are followed; anything but a 2xx final
/// status counts as gone.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
        })
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.client.head(url).send().await {
            Ok(response) if response.status().is_success() => ProbeOutcome::Live,
            Ok(response) => ProbeOutcome::Gone(format!("status {}", response.status())),
            Err(e) if e.is_timeout() => ProbeOutcome::Gone("timeout".to_string()),
            Err(e) => ProbeOutcome::Gone(e.to_string()),
        }
    }
}
