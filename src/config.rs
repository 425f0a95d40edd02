use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::ingest::MAX_IMAGE_BYTES;

const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PORT: u16 = 8000;
/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 2 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub engine: EngineSettings,
    pub engine_timeout: Duration,
    pub max_upload_bytes: usize,
    pub host: IpAddr,
    pub port: u16,
}

impl Settings {
    /// Reads the process environment. Call `dotenv` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = non_empty("GROQ_API_KEY").ok_or(ConfigError::Missing("GROQ_API_KEY"))?;
        let engine = EngineSettings {
            api_key,
            base_url: non_empty("GROQ_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: non_empty("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };

        let timeout_secs: u64 = parse_or("ENGINE_TIMEOUT_SECS", non_empty("ENGINE_TIMEOUT_SECS"), DEFAULT_ENGINE_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid { key: "ENGINE_TIMEOUT_SECS", value: "0".into() });
        }

        Ok(Self {
            engine,
            engine_timeout: Duration::from_secs(timeout_secs),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", non_empty("MAX_UPLOAD_BYTES"), MAX_IMAGE_BYTES)?,
            host: parse_or("HOST", non_empty("HOST"), IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or("PORT", non_empty("PORT"), DEFAULT_PORT)?,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Transport limit for request bodies; kept above the upload limit so an
    /// oversized file is still read far enough to be rejected explicitly.
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}
