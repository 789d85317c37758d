//! Server configuration.
//!
//! Uses `figment` for layered configuration: defaults, then an optional TOML
//! file, then `OBJSTREAM_`-prefixed environment variables. Nested keys use a
//! double underscore, e.g. `OBJSTREAM_PROVIDER__MODEL=gpt-4o`.

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Default file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "objstream.toml";

/// Everything the server binary reads at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface the listener binds to.
    pub host: String,
    /// Port the listener binds to.
    pub port: u16,
    /// Upper bound on the total duration of one model request.
    pub request_timeout_ms: u64,
    /// Fragments buffered between the provider task and the response body.
    pub channel_capacity: usize,
    /// Model provider settings.
    pub provider: ProviderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_ms: 30_000,
            channel_capacity: 64,
            provider: ProviderConfig::default(),
        }
    }
}

/// Settings of the OpenAI-compatible model provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Root of the chat completions API, without a trailing slash.
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Model used when a request names none.
    pub model: String,
    /// Model used for requests carrying an image.
    pub vision_model: String,
    /// Prefixes a per-request model override must start with.
    pub model_prefixes: Vec<String>,
    /// Sampling temperature sent with every request.
    pub temperature: f64,
    /// Completion length limit unless an endpoint overrides it.
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o".to_string(),
            model_prefixes: vec!["gpt".to_string()],
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

impl ProviderConfig {
    /// The API key, read from the configured environment variable.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }

    /// Whether `model` may be requested from this provider.
    #[must_use]
    pub fn supports_model(&self, model: &str) -> bool {
        self.model_prefixes
            .iter()
            .any(|prefix| model.starts_with(prefix.as_str()))
    }
}

impl ServerConfig {
    /// The configuration sources, lowest priority first.
    ///
    /// `config_file` replaces [`DEFAULT_CONFIG_FILE`]; a missing file is
    /// skipped.
    #[must_use]
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let file = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("OBJSTREAM_").split("__"))
    }

    /// Load configuration from all layers.
    ///
    /// # Errors
    ///
    /// Fails when a source holds a value of the wrong type.
    pub fn load(config_file: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(config_file).extract().map_err(Box::new)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
