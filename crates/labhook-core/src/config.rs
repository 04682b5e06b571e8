//! Configuration for Labhook

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::is_truthy;
use crate::{Error, Result};

/// Webhook route configuration.
///
/// `path` is compared exactly against the request path with the query
/// string removed. An empty `secret` disables token verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub path: String,

    #[serde(default)]
    pub secret: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: "/gitlab/hook".to_string(),
            secret: String::new(),
        }
    }
}

impl WebhookConfig {
    pub fn new(path: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            secret: secret.into(),
        }
    }

    /// Build a configuration from loosely typed options.
    ///
    /// The options must be a JSON object with a string `path`. A missing or
    /// falsy `secret` becomes the empty string.
    pub fn from_value(options: Value) -> Result<Self> {
        let options = options
            .as_object()
            .ok_or_else(|| Error::Config("must provide an options object".into()))?;

        let path = match options.get("path") {
            Some(Value::String(path)) => path.clone(),
            _ => return Err(Error::Config("must provide a 'path' option".into())),
        };

        let secret = match options.get("secret") {
            None => String::new(),
            Some(Value::String(secret)) => secret.clone(),
            Some(other) if !is_truthy(other) => String::new(),
            Some(other) => {
                return Err(Error::Config(format!(
                    "'secret' option must be a string, got {}",
                    other
                )))
            }
        };

        Ok(Self { path, secret })
    }

    /// Whether token verification is enabled
    pub fn verifies_secret(&self) -> bool {
        !self.secret.is_empty()
    }
}

/// Host configuration for the standalone webhook server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabhookConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LabhookConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `LABHOOK_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("LABHOOK_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
        if let Some(port) = var("LABHOOK_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(limit) = var("LABHOOK_MAX_BODY_BYTES") {
            if let Ok(l) = limit.parse() {
                self.server.max_body_bytes = l;
            }
        }
        if let Some(path) = var("LABHOOK_PATH") {
            self.webhook.path = path;
        }
        if let Some(secret) = var("LABHOOK_SECRET") {
            self.webhook.secret = secret;
        }
        if let Some(level) = var("LABHOOK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("LABHOOK_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.webhook.path.is_empty() {
            return Err(Error::Config("webhook path must not be empty".into()));
        }
        if !self.webhook.path.starts_with('/') {
            return Err(Error::Config(format!(
                "webhook path must start with '/': {}",
                self.webhook.path
            )));
        }
        if self.server.port == 0 {
            return Err(Error::Config("server port must not be 0".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Largest webhook body that will be decoded
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            max_body_bytes: crate::DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
