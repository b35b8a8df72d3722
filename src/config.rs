//! YAML configuration with environment overrides.
//!
//! Loading runs in a fixed order: parse, environment overrides, defaults,
//! validation. Only a configuration that passes validation is turned into
//! [`Endpoint`] values.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::http::request::Method;
use crate::proxy::destination::{Destination, Endpoint, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT};

pub const DEFAULT_PORT: i64 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";

const ENV_PREFIX: &str = "WEBHOOK_PROXY_";

const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "text"];
const LOG_OUTPUTS: [&str; 2] = ["stdout", "file"];

pub const DEFAULT_EXPORTER: &str = "stdout";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// debug, info, warn or error
    pub level: String,
    /// json or text
    pub format: String,
    /// stdout or file (file also keeps writing to stdout)
    pub output: String,
    pub file_path: String,
}

/// Span export. Spans are always recorded; this decides whether they are
/// written out when they close.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Only `stdout` is built in; other exporters fall back to it
    pub exporter_type: String,
    /// Collector address for network exporters
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub path: String,
    pub destinations: Vec<DestinationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub timeout: ConfigDuration,
    pub retries: i64,
    pub retry_delay: ConfigDuration,
}

/// Signed duration as written in the file.
///
/// Accepts strings such as `500ms`, `5s`, `1m30s`, `1.5h` or `-1s`, and bare
/// integers meaning seconds. Negative values survive parsing so validation
/// can report them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConfigDuration {
    nanos: i128,
}

impl ConfigDuration {
    pub fn from_std(d: Duration) -> Self {
        Self { nanos: d.as_nanos() as i128 }
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    pub fn is_negative(&self) -> bool {
        self.nanos < 0
    }

    /// Converts to a std duration; negative values become zero.
    pub fn to_std(&self) -> Duration {
        if self.nanos <= 0 {
            return Duration::ZERO;
        }
        let nanos = u64::try_from(self.nanos).unwrap_or(u64::MAX);
        Duration::from_nanos(nanos)
    }
}

impl std::str::FromStr for ConfigDuration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (negative, mut rest) = match s.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        if rest == "0" {
            return Ok(Self::default());
        }
        if rest.is_empty() {
            bail!("invalid duration {s:?}");
        }

        let mut total: f64 = 0.0;
        while !rest.is_empty() {
            let num_end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(rest.len());
            let number: f64 = rest[..num_end]
                .parse()
                .with_context(|| format!("invalid duration {s:?}"))?;
            rest = &rest[num_end..];

            let unit_end = rest
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(rest.len());
            let scale = match &rest[..unit_end] {
                "ns" => 1.0,
                "us" | "µs" => 1e3,
                "ms" => 1e6,
                "s" => 1e9,
                "m" => 60e9,
                "h" => 3600e9,
                "" => bail!("missing unit in duration {s:?}"),
                unit => bail!("unknown unit {unit:?} in duration {s:?}"),
            };
            rest = &rest[unit_end..];
            total += number * scale;
        }

        let nanos = total.round() as i128;
        Ok(Self {
            nanos: if negative { -nanos } else { nanos },
        })
    }
}

impl<'de> Deserialize<'de> for ConfigDuration {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Self {
                nanos: secs as i128 * 1_000_000_000,
            }),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl Config {
    /// Reads, overrides from the process environment, defaults and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("config file does not exist: {}", path.display());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        Self::from_yaml_with_env(&text, |key| std::env::var(key).ok())
    }

    /// Parses and validates `text` without looking at the environment.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Self::from_yaml_with_env(text, |_| None)
    }

    /// Parses `text`, applies overrides from `env`, then defaults and validation.
    pub fn from_yaml_with_env<F>(text: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config =
            serde_yaml::from_str(text).context("failed to parse config file")?;

        config.apply_env_overrides(env);
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| env(&format!("{ENV_PREFIX}{name}"));

        if let Some(port) = var("SERVER_PORT") {
            match port.trim().parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring unparseable port override"),
            }
        }
        if let Some(host) = var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(output) = var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Some(file_path) = var("LOG_FILE_PATH") {
            self.logging.file_path = file_path;
        }

        if let Some(enabled) = var("TELEMETRY_ENABLED") {
            self.telemetry.enabled = parse_flag(&enabled);
        }
        if let Some(exporter) = var("TELEMETRY_EXPORTER_TYPE") {
            self.telemetry.exporter_type = exporter;
        }
        if let Some(endpoint) = var("TELEMETRY_ENDPOINT") {
            self.telemetry.endpoint = endpoint;
        }
    }

    fn apply_defaults(&mut self) {
        if self.server.port == 0 {
            self.server.port = DEFAULT_PORT;
        }
        if self.server.host.is_empty() {
            self.server.host = DEFAULT_HOST.to_string();
        }

        if self.logging.level.is_empty() {
            self.logging.level = "info".to_string();
        }
        if self.logging.format.is_empty() {
            self.logging.format = "json".to_string();
        }
        if self.logging.output.is_empty() {
            self.logging.output = "stdout".to_string();
        }

        if self.telemetry.exporter_type.is_empty() {
            self.telemetry.exporter_type = DEFAULT_EXPORTER.to_string();
        }

        for dest in self.endpoints.iter_mut().flat_map(|e| e.destinations.iter_mut()) {
            if dest.method.is_empty() {
                dest.method = "POST".to_string();
            }
            if dest.timeout.is_zero() {
                dest.timeout = ConfigDuration::from_std(DEFAULT_TIMEOUT);
            }
            if dest.retries < 0 {
                dest.retries = 0;
            }
            // Only meaningful when a retry can actually happen.
            if dest.retry_delay.is_zero() && dest.retries > 0 {
                dest.retry_delay = ConfigDuration::from_std(DEFAULT_RETRY_DELAY);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0..=65535).contains(&self.server.port) {
            bail!("invalid server port: {}", self.server.port);
        }

        let logging = &self.logging;
        if !LOG_LEVELS.contains(&logging.level.as_str()) {
            bail!("invalid logging level: {}", logging.level);
        }
        if !LOG_FORMATS.contains(&logging.format.as_str()) {
            bail!("invalid logging format: {}", logging.format);
        }
        if !LOG_OUTPUTS.contains(&logging.output.as_str()) {
            bail!("invalid logging output: {}", logging.output);
        }
        if logging.output == "file" && logging.file_path.is_empty() {
            bail!("file_path is required when output is file");
        }

        self.build_endpoints().map(|_| ())
    }

    /// Converts the endpoint section into validated domain values.
    pub fn build_endpoints(&self) -> Result<Vec<Endpoint>> {
        if self.endpoints.is_empty() {
            bail!("at least one endpoint is required");
        }

        let mut seen = HashSet::new();
        let mut endpoints = Vec::with_capacity(self.endpoints.len());

        for (i, endpoint) in self.endpoints.iter().enumerate() {
            if endpoint.path.is_empty() {
                bail!("endpoint[{i}]: path is required");
            }
            if !endpoint.path.starts_with('/') {
                bail!("endpoint[{i}]: path must start with /");
            }
            if !seen.insert(endpoint.path.as_str()) {
                bail!("endpoint[{i}]: duplicate path {}", endpoint.path);
            }
            if endpoint.destinations.is_empty() {
                bail!("endpoint[{i}]: at least one destination is required");
            }

            let destinations = endpoint
                .destinations
                .iter()
                .enumerate()
                .map(|(j, dest)| {
                    dest.to_destination()
                        .with_context(|| format!("endpoint[{i}].destination[{j}]"))
                })
                .collect::<Result<Vec<_>>>()?;

            endpoints.push(Endpoint::new(endpoint.path.clone(), destinations));
        }

        Ok(endpoints)
    }

    /// Address the listener binds to.
    pub fn listen_addr(&self) -> String {
        let host = &self.server.host;
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.server.port)
        } else {
            format!("{}:{}", host, self.server.port)
        }
    }
}

/// Boolean environment values: `true`, `1` and `yes` enable, anything else
/// disables.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "true" | "1" | "yes")
}

impl DestinationConfig {
    fn to_destination(&self) -> Result<Destination> {
        if self.url.is_empty() {
            bail!("url is required");
        }
        let url = Url::parse(&self.url).with_context(|| format!("invalid url: {}", self.url))?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            bail!("invalid url: {} (expected absolute http or https URL)", self.url);
        }

        let method = Method::from_str(&self.method.to_ascii_uppercase())
            .with_context(|| format!("invalid method: {}", self.method))?;

        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name: {name}"))?;
            HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name}"))?;
        }

        if self.timeout.is_negative() {
            bail!("timeout cannot be negative");
        }
        if self.retries < 0 {
            bail!("retries cannot be negative");
        }
        if self.retry_delay.is_negative() {
            bail!("retry_delay cannot be negative");
        }

        Ok(Destination {
            url,
            name: self.url.clone(),
            method,
            headers: self.headers.clone(),
            timeout: self.timeout.to_std(),
            retries: u32::try_from(self.retries).unwrap_or(u32::MAX),
            retry_delay: self.retry_delay.to_std(),
        })
    }
}
