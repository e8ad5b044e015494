use std::{path::Path, time::Duration};

use anyhow::Context;

/// Timing knobs of the client. Serialized with all durations in milliseconds.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    /// Delay between a lost push channel connection and the next attempt
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,

    /// How long a comment id stays in the local echo set
    #[serde(rename = "echo_window_ms", with = "millis")]
    pub echo_window: Duration,

    /// How long new and updated comments stay highlighted
    #[serde(rename = "emphasis_duration_ms", with = "millis")]
    pub emphasis_duration: Duration,

    /// How long a deleted comment stays on screen, fading out
    #[serde(rename = "removal_delay_ms", with = "millis")]
    pub removal_delay: Duration,

    #[serde(rename = "ping_interval_ms", with = "millis")]
    pub ping_interval: Duration,

    /// Connections that stay silent this long are considered dead
    #[serde(rename = "disconnect_interval_ms", with = "millis")]
    pub disconnect_interval: Duration,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            retry_delay: Duration::from_secs(5),
            echo_window: Duration::from_secs(3),
            emphasis_duration: Duration::from_secs(2),
            removal_delay: Duration::from_millis(500),
            ping_interval: Duration::from_secs(10),
            disconnect_interval: Duration::from_secs(20),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> anyhow::Result<Config> {
        serde_json::from_str(json).context("parsing client configuration")
    }

    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {path:?}"))?;
        Config::from_json(&json)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
