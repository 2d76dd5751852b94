use bon::Builder;
use serde::Deserialize;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_UNARY_CALLS_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_SERVER_STREAM_CALLS_TIMEOUT: Duration = Duration::from_millis(10000);

/// Resolved configuration of a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct BridgeConfig {
    /// Whether unary methods are exposed as events.
    #[builder(default = true)]
    pub proxy_unary_calls: bool,

    /// Whether server-streaming methods are exposed as events.
    #[builder(default = true)]
    pub proxy_server_stream_calls: bool,

    /// Deadline for a unary call, measured from dispatch.
    #[builder(default = DEFAULT_UNARY_CALLS_TIMEOUT)]
    pub unary_calls_timeout: Duration,

    /// Deadline for a whole server-streaming call, end of stream included.
    #[builder(default = DEFAULT_SERVER_STREAM_CALLS_TIMEOUT)]
    pub server_stream_calls_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            proxy_unary_calls: true,
            proxy_server_stream_calls: true,
            unary_calls_timeout: DEFAULT_UNARY_CALLS_TIMEOUT,
            server_stream_calls_timeout: DEFAULT_SERVER_STREAM_CALLS_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    /// Apply overrides on top of this config. Set fields in `options` win.
    pub fn merge(self, options: BridgeOptions) -> Self {
        Self {
            proxy_unary_calls: options.proxy_unary_calls.unwrap_or(self.proxy_unary_calls),
            proxy_server_stream_calls: options
                .proxy_server_stream_calls
                .unwrap_or(self.proxy_server_stream_calls),
            unary_calls_timeout: options
                .unary_calls_timeout
                .map(Duration::from_millis)
                .unwrap_or(self.unary_calls_timeout),
            server_stream_calls_timeout: options
                .server_stream_calls_timeout
                .map(Duration::from_millis)
                .unwrap_or(self.server_stream_calls_timeout),
        }
    }
}

/// Partial configuration, as supplied per instance or by a config source.
///
/// Deserializes from camelCase keys with timeouts in milliseconds:
/// `{"proxyUnaryCalls": false, "unaryCallsTimeout": 2000}`. Keys it does not
/// know are ignored, so a shared config document can carry other settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeOptions {
    pub proxy_unary_calls: Option<bool>,
    pub proxy_server_stream_calls: Option<bool>,
    pub unary_calls_timeout: Option<u64>,
    pub server_stream_calls_timeout: Option<u64>,
}

impl BridgeOptions {
    /// Read options from `{prefix}_*` environment variables.
    ///
    /// Recognized: `{prefix}_PROXY_UNARY_CALLS`, `{prefix}_PROXY_SERVER_STREAM_CALLS`,
    /// `{prefix}_UNARY_CALLS_TIMEOUT`, `{prefix}_SERVER_STREAM_CALLS_TIMEOUT`.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Read options through an arbitrary key lookup.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            let key = format!("{prefix}_{name}");
            lookup(&key).map(|value| (key, value))
        };

        Ok(Self {
            proxy_unary_calls: read("PROXY_UNARY_CALLS")
                .map(|(k, v)| parse_bool(k, v))
                .transpose()?,
            proxy_server_stream_calls: read("PROXY_SERVER_STREAM_CALLS")
                .map(|(k, v)| parse_bool(k, v))
                .transpose()?,
            unary_calls_timeout: read("UNARY_CALLS_TIMEOUT")
                .map(|(k, v)| parse_millis(k, v))
                .transpose()?,
            server_stream_calls_timeout: read("SERVER_STREAM_CALLS_TIMEOUT")
                .map(|(k, v)| parse_millis(k, v))
                .transpose()?,
        })
    }
}

fn parse_bool(key: String, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value }),
    }
}

fn parse_millis(key: String, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
