//! LuisNluClient - REST implementation of the NLU boundary.
//!
//! Talks to a LUIS-v2-style endpoint:
//! `GET {endpoint}/{app_id}?subscription-key={key}&q={utterance}`.
//! Configuration priority: ~/.config/hestia/secret.json > environment variables.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use hestia_core::error::{HestiaError, Result};
use hestia_core::nlu::{NluClient, NluResponse};

const DEFAULT_ENDPOINT: &str = "https://westus.api.cognitive.microsoft.com/luis/v2.0/apps";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the NLU service.
///
/// Credentials are resolved once at construction and injected; they are
/// never part of dialog or session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuisConfig {
    pub app_id: String,
    pub subscription_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

/// Shape of `~/.config/hestia/secret.json`.
#[derive(Debug, Clone, Deserialize)]
struct SecretFile {
    luis: Option<LuisConfig>,
}

impl LuisConfig {
    /// Loads configuration from the secret file or environment variables.
    ///
    /// Priority:
    /// 1. `~/.config/hestia/secret.json` (`{"luis": {"app_id": ..., "subscription_key": ...}}`)
    /// 2. `HESTIA_LUIS_APP_ID`, `HESTIA_LUIS_KEY`, `HESTIA_LUIS_ENDPOINT`
    pub fn try_from_env() -> Result<Self> {
        if let Some(config) = Self::from_secret_file(Self::default_secret_path()) {
            return Ok(config);
        }

        let app_id = env::var("HESTIA_LUIS_APP_ID").map_err(|_| {
            HestiaError::config(
                "LUIS credentials not found in ~/.config/hestia/secret.json or HESTIA_LUIS_APP_ID/HESTIA_LUIS_KEY environment variables",
            )
        })?;
        let subscription_key = env::var("HESTIA_LUIS_KEY").map_err(|_| {
            HestiaError::config("HESTIA_LUIS_KEY not set while HESTIA_LUIS_APP_ID is")
        })?;
        let endpoint = env::var("HESTIA_LUIS_ENDPOINT").unwrap_or_else(|_| default_endpoint());

        Ok(Self {
            app_id,
            subscription_key,
            endpoint,
        })
    }

    fn default_secret_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hestia").join("secret.json"))
    }

    fn from_secret_file(path: Option<PathBuf>) -> Option<Self> {
        let raw = std::fs::read_to_string(path?).ok()?;
        let secret: SecretFile = serde_json::from_str(&raw).ok()?;
        secret.luis
    }
}

/// NLU client implementation that talks to the LUIS HTTP API.
#[derive(Clone)]
pub struct LuisNluClient {
    client: Client,
    config: LuisConfig,
}

impl LuisNluClient {
    pub fn new(config: LuisConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Creates a client from file/environment configuration.
    pub fn try_from_env() -> Result<Self> {
        Ok(Self::new(LuisConfig::try_from_env()?))
    }

    fn app_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.app_id
        )
    }
}

#[async_trait]
impl NluClient for LuisNluClient {
    async fn classify(&self, utterance: &str) -> Result<NluResponse> {
        let response = self
            .client
            .get(self.app_url())
            .query(&[
                ("subscription-key", self.config.subscription_key.as_str()),
                ("q", utterance),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|err| HestiaError::nlu(format!("LUIS request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read LUIS error body".to_string());
            return Err(HestiaError::nlu(format!(
                "LUIS returned {status}: {body}"
            )));
        }

        let parsed: NluResponse = response
            .json()
            .await
            .map_err(|err| HestiaError::nlu(format!("failed to parse LUIS response: {err}")))?;

        tracing::debug!(
            intent = %parsed.top_scoring_intent.intent,
            entities = parsed.entities.len(),
            "LUIS classification"
        );
        Ok(parsed)
    }
}
