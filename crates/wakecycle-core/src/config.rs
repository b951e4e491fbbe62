//! Runtime configuration
//!
//! Every option is looked up by name through a caller-supplied function, so the
//! firmware can feed build-time `option_env!` values and the simulator can feed
//! the process environment through the same parser.

use embassy_time::Duration;
use thiserror_no_std::Error;

pub const DEFAULT_BROKER_URI: &str = "mqtt://server";
pub const DEFAULT_SUBSCRIBE_TOPIC: &str = "/temperature/dummy/test";
pub const DEFAULT_PUBLISH_TOPIC: &str = "/temperature/dummy/timers";
pub const DEFAULT_CLIENT_ID: &str = "wakecycle";
pub const DEFAULT_SLEEP_SECONDS: u32 = 30;
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Longest SSID accepted by the Wi-Fi stack
pub const MAX_SSID_LEN: usize = 32;
/// Longest WPA passphrase accepted by the Wi-Fi stack
pub const MAX_PASSWORD_LEN: usize = 64;

/// Names of the recognized options
pub mod keys {
    pub const WIFI_SSID: &str = "WIFI_SSID";
    pub const WIFI_PASSWORD: &str = "WIFI_PASSWORD";
    pub const BROKER_URI: &str = "BROKER_URI";
    pub const SUBSCRIBE_TOPIC: &str = "SUBSCRIBE_TOPIC";
    pub const PUBLISH_TOPIC: &str = "PUBLISH_TOPIC";
    pub const SLEEP_SECONDS: &str = "SLEEP_SECONDS";
    pub const WAIT_TIMEOUT_SECS: &str = "WAIT_TIMEOUT_SECS";
    pub const MQTT_CLIENT_ID: &str = "MQTT_CLIENT_ID";

    pub const ALL: [&str; 8] = [
        WIFI_SSID,
        WIFI_PASSWORD,
        BROKER_URI,
        SUBSCRIBE_TOPIC,
        PUBLISH_TOPIC,
        SLEEP_SECONDS,
        WAIT_TIMEOUT_SECS,
        MQTT_CLIENT_ID,
    ];
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required option {0}")]
    Missing(&'static str),
    #[error("option {0} is not a valid number")]
    InvalidNumber(&'static str),
    #[error("option {0} is out of range")]
    OutOfRange(&'static str),
    #[error("broker URI scheme is not supported (expected mqtt://)")]
    UnsupportedScheme,
    #[error("broker URI is malformed")]
    InvalidUri,
    #[error("option {0} must not contain MQTT wildcards")]
    WildcardTopic(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config<'a> {
    pub wifi: WifiConfig<'a>,
    pub broker_uri: &'a str,
    pub subscribe_topic: &'a str,
    pub publish_topic: &'a str,
    pub client_id: &'a str,
    pub sleep_seconds: u32,
    /// Bound for the join and publish waits; `None` waits forever
    pub wait_timeout_secs: Option<u32>,
}

impl<'a> Config<'a> {
    /// Build and validate a config from named values
    ///
    /// Unset and empty values both fall back to the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<&'a str>,
    {
        let get = |key: &'static str| lookup(key).filter(|v| !v.is_empty());

        let config = Self {
            wifi: WifiConfig {
                ssid: get(keys::WIFI_SSID).ok_or(ConfigError::Missing(keys::WIFI_SSID))?,
                password: get(keys::WIFI_PASSWORD).unwrap_or(""),
            },
            broker_uri: get(keys::BROKER_URI).unwrap_or(DEFAULT_BROKER_URI),
            subscribe_topic: get(keys::SUBSCRIBE_TOPIC).unwrap_or(DEFAULT_SUBSCRIBE_TOPIC),
            publish_topic: get(keys::PUBLISH_TOPIC).unwrap_or(DEFAULT_PUBLISH_TOPIC),
            client_id: get(keys::MQTT_CLIENT_ID).unwrap_or(DEFAULT_CLIENT_ID),
            sleep_seconds: match get(keys::SLEEP_SECONDS) {
                Some(v) => parse_u32(keys::SLEEP_SECONDS, v)?,
                None => DEFAULT_SLEEP_SECONDS,
            },
            wait_timeout_secs: get(keys::WAIT_TIMEOUT_SECS)
                .map(|v| parse_u32(keys::WAIT_TIMEOUT_SECS, v))
                .transpose()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi.ssid.is_empty() {
            return Err(ConfigError::Missing(keys::WIFI_SSID));
        }
        if self.wifi.ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::OutOfRange(keys::WIFI_SSID));
        }
        if self.wifi.password.len() > MAX_PASSWORD_LEN {
            return Err(ConfigError::OutOfRange(keys::WIFI_PASSWORD));
        }
        if self.subscribe_topic.is_empty() {
            return Err(ConfigError::Missing(keys::SUBSCRIBE_TOPIC));
        }
        if self.publish_topic.is_empty() {
            return Err(ConfigError::Missing(keys::PUBLISH_TOPIC));
        }
        if self.publish_topic.contains(['+', '#']) {
            return Err(ConfigError::WildcardTopic(keys::PUBLISH_TOPIC));
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::Missing(keys::MQTT_CLIENT_ID));
        }
        if self.sleep_seconds == 0 {
            return Err(ConfigError::OutOfRange(keys::SLEEP_SECONDS));
        }
        if self.wait_timeout_secs == Some(0) {
            return Err(ConfigError::OutOfRange(keys::WAIT_TIMEOUT_SECS));
        }
        self.broker()?;
        Ok(())
    }

    pub fn broker(&self) -> Result<BrokerUri<'a>, ConfigError> {
        BrokerUri::parse(self.broker_uri)
    }

    pub fn sleep_duration(&self) -> Duration {
        Duration::from_secs(self.sleep_seconds as u64)
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs
            .map(|secs| Duration::from_secs(secs as u64))
    }
}

fn parse_u32(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidNumber(key))
}

/// Broker address parsed from an `mqtt://host[:port][/]` URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerUri<'a> {
    pub host: &'a str,
    pub port: u16,
}

impl<'a> BrokerUri<'a> {
    pub fn parse(uri: &'a str) -> Result<Self, ConfigError> {
        let rest = match uri.split_once("://") {
            Some(("mqtt", rest)) => rest,
            Some(_) => return Err(ConfigError::UnsupportedScheme),
            None => return Err(ConfigError::InvalidUri),
        };

        // Anything after the authority is a path, which plain MQTT ignores
        let authority = rest.split('/').next().unwrap_or(rest);
        if authority.contains('@') {
            // Credentials in the URI are not supported
            return Err(ConfigError::InvalidUri);
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidUri)?;
                if port == 0 {
                    return Err(ConfigError::InvalidUri);
                }
                (host, port)
            }
            None => (authority, DEFAULT_MQTT_PORT),
        };

        if host.is_empty() {
            return Err(ConfigError::InvalidUri);
        }

        Ok(Self { host, port })
    }
}
