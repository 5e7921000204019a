use crate::chat::DEFAULT_CHAT_TIMEOUT;
use crate::errors::{Error, Result};
use std::env;
use std::time::Duration;

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_addr: String,
    pub rtdb_url: String,
    pub rtdb_auth: Option<String>,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub chat_url: String,
    pub chat_n_results: u32,
    /// Applies to chat requests instead of `http_timeout`.
    pub chat_timeout: Duration,
    pub weather_base_url: String,
    pub weather_api_key: Option<String>,
    pub weather_location: String,
    pub market_base_url: String,
    pub market_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            rtdb_url: "http://localhost:9000".to_string(),
            rtdb_auth: None,
            poll_interval: Duration::from_secs(60),
            http_timeout: Duration::from_secs(10),
            chat_url: "http://localhost:8000/api/query".to_string(),
            chat_n_results: 3,
            chat_timeout: DEFAULT_CHAT_TIMEOUT,
            weather_base_url: "https://api.weatherapi.com/v1".to_string(),
            weather_api_key: None,
            weather_location: "Tirupati".to_string(),
            market_base_url:
                "https://api.data.gov.in/resource/9ef84268-d588-465a-a308-a864a43d0070"
                    .to_string(),
            market_api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let poll_secs = parse_var("POLL_INTERVAL_SECS", defaults.poll_interval.as_secs())?;
        if poll_secs == 0 {
            return Err(Error::Config(
                "POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            http_addr: env::var("HTTP_ADDR").unwrap_or(defaults.http_addr),
            rtdb_url: env::var("RTDB_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.rtdb_url),
            rtdb_auth: optional_var("RTDB_AUTH"),
            poll_interval: Duration::from_secs(poll_secs),
            http_timeout: Duration::from_secs(parse_var(
                "HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            chat_url: env::var("CHAT_URL").unwrap_or(defaults.chat_url),
            chat_n_results: parse_var("CHAT_N_RESULTS", defaults.chat_n_results)?,
            chat_timeout: Duration::from_secs(parse_var(
                "CHAT_TIMEOUT_SECS",
                defaults.chat_timeout.as_secs(),
            )?),
            weather_base_url: env::var("WEATHER_BASE_URL").unwrap_or(defaults.weather_base_url),
            weather_api_key: optional_var("WEATHER_API_KEY"),
            weather_location: env::var("WEATHER_LOCATION").unwrap_or(defaults.weather_location),
            market_base_url: env::var("MARKET_BASE_URL").unwrap_or(defaults.market_base_url),
            market_api_key: optional_var("MARKET_API_KEY"),
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{} has invalid value {:?}: {}", name, raw, e))),
        Err(_) => Ok(default),
    }
}
