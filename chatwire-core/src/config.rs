use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::reducer::{DEFAULT_FALLBACK, ReducerConfig};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EndpointCfg {
    /// Full URL of the streaming chat endpoint, e.g. http://localhost:8000/invoke
    pub url: String,
    /// Sent as `user_id` in every request when present.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total request timeout in milliseconds, body included (default 300000ms)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Longest gap between two body fragments before the turn fails (default 30000ms)
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    300_000
}
fn default_idle_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DisplayCfg {
    #[serde(default = "default_show_tool_notices")]
    pub show_tool_notices: bool,
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            show_tool_notices: default_show_tool_notices(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_show_tool_notices() -> bool {
    true
}
fn default_fallback_message() -> String {
    DEFAULT_FALLBACK.to_string()
}

impl From<&DisplayCfg> for ReducerConfig {
    fn from(d: &DisplayCfg) -> Self {
        Self {
            show_tool_notices: d.show_tool_notices,
            fallback_message: d.fallback_message.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub endpoint: EndpointCfg,
    /// HTTP client configuration (timeouts). Missing → defaults.
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub display: DisplayCfg,
}

impl Config {
    /// Config for `url` with every other setting at its default.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            endpoint: EndpointCfg { url: url.into(), user_id: None },
            http: HttpCfg::default(),
            display: DisplayCfg::default(),
        }
    }

    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(crate::error::ChatWireError::from)?;
        let s = std::str::from_utf8(&bytes)
            .map_err(|e| crate::error::ChatWireError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatWireError::Other(e.into()))?,
            Some("toml") => toml::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatWireError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatWireError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s)
                        .map_err(|e| crate::error::ChatWireError::Other(e.into()))
                })?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> crate::error::CoreResult<()> {
        let url = self.endpoint.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(crate::error::ChatWireError::Validation(format!(
                "endpoint url must be http(s): '{url}'"
            )));
        }
        if self.http.idle_timeout_ms == 0 {
            return Err(crate::error::ChatWireError::Validation(
                "http.idle_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
