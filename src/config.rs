use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const DEFAULT_CAPTION_MODEL: &str = "Salesforce/blip-image-captioning-base";
pub const DEFAULT_CAPTION_ENDPOINT: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_ORIGIN: &str = "https://www.myntra.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub temp_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub hf_token: Option<String>,
    pub caption_endpoint: String,
    pub caption_model: String,
    pub caption_timeout: Duration,
    pub origin: String,
    pub render_timeout: Duration,
    pub navigation_timeout: Duration,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
            temp_dir: PathBuf::from("temp"),
            max_upload_bytes: 10 * 1024 * 1024,
            hf_token: None,
            caption_endpoint: DEFAULT_CAPTION_ENDPOINT.to_string(),
            caption_model: DEFAULT_CAPTION_MODEL.to_string(),
            caption_timeout: Duration::from_secs(60),
            origin: DEFAULT_ORIGIN.to_string(),
            render_timeout: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(30),
            chrome_executable: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let origin = match get("SCRAPE_ORIGIN") {
            Some(value) => validate_origin(value)?,
            None => defaults.origin,
        };

        Ok(Self {
            addr: get("OUTFIT_API_ADDR").unwrap_or(defaults.addr),
            temp_dir: get("OUTFIT_API_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            max_upload_bytes: parse_or(
                "OUTFIT_API_MAX_UPLOAD_BYTES",
                get("OUTFIT_API_MAX_UPLOAD_BYTES"),
                defaults.max_upload_bytes,
            )?,
            hf_token: get("HF_TOKEN"),
            caption_endpoint: get("CAPTION_ENDPOINT").unwrap_or(defaults.caption_endpoint),
            caption_model: get("CAPTION_MODEL").unwrap_or(defaults.caption_model),
            caption_timeout: secs_or("CAPTION_TIMEOUT_SECS", get("CAPTION_TIMEOUT_SECS"), defaults.caption_timeout)?,
            origin,
            render_timeout: secs_or(
                "SCRAPE_RENDER_TIMEOUT_SECS",
                get("SCRAPE_RENDER_TIMEOUT_SECS"),
                defaults.render_timeout,
            )?,
            navigation_timeout: secs_or(
                "SCRAPE_NAV_TIMEOUT_SECS",
                get("SCRAPE_NAV_TIMEOUT_SECS"),
                defaults.navigation_timeout,
            )?,
            chrome_executable: get("CHROME_EXECUTABLE").map(PathBuf::from),
        })
    }
}

fn parse_or(name: &'static str, value: Option<String>, default: usize) -> Result<usize, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
            name,
            expected: "a non-negative integer",
            value: v,
        }),
    }
}

fn secs_or(name: &'static str, value: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid {
                name,
                expected: "a whole number of seconds",
                value: v,
            }),
    }
}

fn validate_origin(value: String) -> Result<String, ConfigError> {
    let invalid = || ConfigError::Invalid {
        name: "SCRAPE_ORIGIN",
        expected: "an http(s) origin",
        value: value.clone(),
    };
    let parsed = Url::parse(&value).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(value.trim_end_matches('/').to_string())
}
