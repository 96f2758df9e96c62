use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use thermostat_core::{
    config::is_plausible_temp_f, fahrenheit_to_celsius, ControlConfig, PersistedSettings,
    StationRecord, StatusFlags,
};

const MAX_READ_PERIOD_SECS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("request to {server} failed: {reason}")]
    Connect { server: String, reason: String },
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("response exceeded {0} bytes")]
    Overflow(usize),
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("temperature {0:.1}F outside sanity band")]
    OutOfRange(f32),
}

impl FetchError {
    pub fn status_flag(&self) -> StatusFlags {
        match self {
            Self::Connect { .. } | Self::Status(_) => StatusFlags::EXT_GET,
            Self::Overflow(_) | Self::Parse(_) => StatusFlags::EXT_JSON,
            Self::OutOfRange(_) => StatusFlags::EXT_TEMP,
        }
    }
}

#[async_trait]
pub trait TemperatureSource: Send + Sync {
    async fn fetch(&self, server: &str) -> Result<f32, FetchError>;
}

#[derive(Debug, Deserialize)]
struct RemoteStatus {
    temp_f: f32,
}

#[derive(Debug, Clone)]
pub struct HttpTemperatureSource {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl HttpTemperatureSource {
    pub fn new(config: &ControlConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.ext_timeout_ms))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            client,
            max_response_bytes: config.ext_max_response_bytes,
        })
    }
}

#[async_trait]
impl TemperatureSource for HttpTemperatureSource {
    async fn fetch(&self, server: &str) -> Result<f32, FetchError> {
        let connect = |err: reqwest::Error| FetchError::Connect {
            server: server.to_string(),
            reason: err.to_string(),
        };

        let url = format!("http://{server}/json");
        let mut response = self.client.get(&url).send().await.map_err(connect)?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(connect)? {
            body.extend_from_slice(&chunk);
            if body.len() > self.max_response_bytes {
                return Err(FetchError::Overflow(self.max_response_bytes));
            }
        }

        let remote: RemoteStatus =
            serde_json::from_slice(&body).map_err(|err| FetchError::Parse(err.to_string()))?;
        Ok(remote.temp_f)
    }
}

/// Where and how often to poll. `read_secs == 0` disables polling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollerSettings {
    pub server: String,
    pub read_secs: u32,
}

impl PollerSettings {
    pub fn from_settings(settings: &PersistedSettings) -> Self {
        Self {
            server: settings.ext_server.clone(),
            read_secs: settings.ext_read_sec,
        }
    }

    pub fn enabled(&self) -> bool {
        self.read_secs > 0 && !self.server.is_empty()
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(u64::from(self.read_secs.clamp(1, MAX_READ_PERIOD_SECS)))
    }
}

pub struct ExternalPoller<S> {
    source: S,
    station: Arc<StationRecord>,
    settings: watch::Receiver<PollerSettings>,
    retry_count: u32,
    retry_delay: Duration,
}

impl<S: TemperatureSource> ExternalPoller<S> {
    pub fn new(
        source: S,
        station: Arc<StationRecord>,
        settings: watch::Receiver<PollerSettings>,
        config: &ControlConfig,
    ) -> Self {
        Self {
            source,
            station,
            settings,
            retry_count: config.ext_retry_count.max(1),
            retry_delay: Duration::from_millis(config.ext_retry_delay_ms),
        }
    }

    pub async fn run(mut self) {
        loop {
            let current = self.settings.borrow_and_update().clone();

            if !current.enabled() {
                self.station.invalidate_external();
                debug!("external polling disabled");
                if self.settings.changed().await.is_err() {
                    return;
                }
                continue;
            }

            self.poll_once(&current.server).await;

            tokio::select! {
                _ = tokio::time::sleep(current.period()) => {}
                changed = self.settings.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    info!("external poller settings changed");
                }
            }
        }
    }

    /// One polling round with bounded retries. Returns whether a valid
    /// reading was published; after the last failed attempt the external
    /// source is marked invalid.
    pub async fn poll_once(&self, server: &str) -> bool {
        for attempt in 1..=self.retry_count {
            match self.fetch_checked(server).await {
                Ok(temp_f) => {
                    self.station
                        .publish_external(fahrenheit_to_celsius(temp_f), temp_f);
                    return true;
                }
                Err(err) => {
                    self.station.raise(err.status_flag());
                    warn!(
                        attempt,
                        retries = self.retry_count,
                        "external temperature fetch failed: {err}"
                    );
                    if attempt < self.retry_count {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        self.station.invalidate_external();
        false
    }

    async fn fetch_checked(&self, server: &str) -> Result<f32, FetchError> {
        let temp_f = self.source.fetch(server).await?;
        if !is_plausible_temp_f(temp_f) {
            return Err(FetchError::OutOfRange(temp_f));
        }
        Ok(temp_f)
    }
}
