use std::path::Path;
use std::time::Duration;

use serde_derive::Deserialize;

use crate::error::Error;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub api: ApiConfig,
    pub reconnect: Option<ReconnectConfig>,
    pub subscription: Option<SubscriptionConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub topic_path: Option<String>,
    pub keep_alive_seconds: Option<u64>,
}

impl MqttConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(1883)
    }

    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| "tracker-monitor".to_string())
    }

    pub fn topic_path(&self) -> String {
        self.topic_path
            .clone()
            .unwrap_or_else(|| "tracking".to_string())
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds.unwrap_or(5))
    }
}

/// REST registry the tracker list is fetched from.
#[derive(Deserialize, Debug, Clone)]
pub struct ApiConfig {
    pub url: String,
    pub access_token: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ReconnectConfig {
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    /// Consecutive failed attempts before giving up. Unlimited when unset.
    pub max_attempts: Option<u32>,
}

impl ReconnectConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms.unwrap_or(500))
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.unwrap_or(30_000))
    }
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnsubscribePolicy {
    /// Unsubscribe only the tracker that is actually subscribed.
    #[default]
    Previous,
    /// Unsubscribe every tracker in the fetched list before subscribing.
    AllKnown,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct SubscriptionConfig {
    pub unsubscribe: Option<UnsubscribePolicy>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::de::from_str(&contents)?)
    }

    pub fn reconnect(&self) -> ReconnectConfig {
        self.reconnect.clone().unwrap_or_default()
    }

    pub fn unsubscribe_policy(&self) -> UnsubscribePolicy {
        self.subscription
            .as_ref()
            .and_then(|s| s.unsubscribe)
            .unwrap_or_default()
    }
}
