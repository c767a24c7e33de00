use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::trace;

const MQTT_BROKER_HOST: &str = "MQTT_BROKER_HOST";
const MQTT_BROKER_PORT: &str = "MQTT_BROKER_PORT";
const MQTT_USERNAME: &str = "MQTT_USERNAME";
const MQTT_PASSWORD: &str = "MQTT_PASSWORD";
const MQTT_CLIENT_ID: &str = "MQTT_CLIENT_ID";
const MQTT_TOPIC_PREFIX: &str = "MQTT_TOPIC_PREFIX";
const PING_INTERVAL: &str = "PING_INTERVAL";
const PING_COUNT: &str = "PING_COUNT";
const PING_TARGETS: &str = "PING_TARGETS";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 1883;
const DEFAULT_INTERVAL: u64 = 60;
const DEFAULT_COUNT: u32 = 5;
const DEFAULT_TOPIC_PREFIX: &str = "pingping";

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Seconds between the starts of two cycles
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Echo requests per target and cycle
    #[serde(default = "default_count")]
    pub count: u32,

    #[serde(default)]
    pub targets: Vec<String>,

    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Generated when absent
    pub client_id: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            client_id: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            interval: default_interval(),
            count: default_count(),
            targets: Vec::new(),
            topic_prefix: default_topic_prefix(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL
}

fn default_count() -> u32 {
    DEFAULT_COUNT
}

fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.to_string()
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// Call `dotenv::dotenv()` beforehand to pick up a `.env` file.
    pub fn from_env() -> anyhow::Result<Config> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source using the
    /// environment variable names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Config {
            broker: BrokerConfig {
                host: non_empty(MQTT_BROKER_HOST).unwrap_or(defaults.broker.host),
                port: parse_var(MQTT_BROKER_PORT, non_empty(MQTT_BROKER_PORT))?
                    .unwrap_or(defaults.broker.port),
                username: non_empty(MQTT_USERNAME),
                password: non_empty(MQTT_PASSWORD),
                client_id: non_empty(MQTT_CLIENT_ID),
            },
            interval: parse_var(PING_INTERVAL, non_empty(PING_INTERVAL))?
                .unwrap_or(defaults.interval),
            count: parse_var(PING_COUNT, non_empty(PING_COUNT))?.unwrap_or(defaults.count),
            targets: lookup(PING_TARGETS)
                .map(|raw| parse_targets(&raw))
                .unwrap_or_default(),
            topic_prefix: non_empty(MQTT_TOPIC_PREFIX).unwrap_or(defaults.topic_prefix),
        };

        trace!("loaded config from environment: {config:?}");
        Ok(config)
    }

    /// Reject values the prober cannot work with
    pub fn validate(mut self) -> anyhow::Result<Config> {
        if self.count == 0 {
            bail!("ping count must be at least 1");
        }

        self.topic_prefix = self.topic_prefix.trim_matches('/').to_string();
        if self.topic_prefix.is_empty() {
            bail!("topic prefix must not be empty");
        }

        self.targets = self
            .targets
            .iter()
            .map(|target| target.trim().to_string())
            .filter(|target| !target.is_empty())
            .collect();

        Ok(self)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

fn parse_var<T>(key: &str, value: Option<String>) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|value| {
            value
                .trim()
                .parse()
                .with_context(|| format!("invalid value for {key}: '{value}'"))
        })
        .transpose()
}

/// Split a comma separated target list, dropping blank entries
pub fn parse_targets(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(String::from)
        .collect()
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {}", path.display()))?;
    serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file {}", path.display()))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
