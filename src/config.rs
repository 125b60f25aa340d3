//! Runtime configuration, layered as: built-in defaults, an optional TOML file,
//! `CAMSIGHT__<SECTION>__<KEY>` environment variables, and finally `PORT` for
//! the inference service

use ::config::{Config, ConfigError, Environment, File, FileFormat, Source};
use crate::vision::{Preprocessing, TensorLayout};
use serde::Deserialize;
use std::env;

/// Config file read from the working directory unless `CONFIG_ENV` is set
pub const DEFAULT_CONFIG_FILE: &str = "camsight.toml";

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "CAMSIGHT_CONFIG";

const ENV_PREFIX: &str = "CAMSIGHT";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub forwarder: ForwarderSettings,
}

/// The inference service
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,

    /// TorchScript classifier, loaded once at startup
    pub model_file: String,

    /// One label per line; the ImageNet classes when unset
    pub labels_file: Option<String>,
    pub top_n: usize,
    pub preprocessing: Preprocessing,
    pub layout: TensorLayout,
    pub softmax: bool,
}

/// The event forwarder
#[derive(Debug, Clone, Deserialize)]
pub struct ForwarderSettings {
    pub host: String,
    pub port: u16,
    pub inference_url: String,
    pub trigger_event: String,
    pub response_event: String,

    /// Base URL of the event bus (Home Assistant REST API)
    pub bus_url: String,
    pub bus_token: Option<String>,

    /// No timeout unless set
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let file = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::build(
            File::with_name(&file).required(false),
            env::var("PORT").ok(),
        )
    }

    /// Load settings from TOML text instead of a file on disk
    pub fn from_toml(toml: &str, port: Option<String>) -> Result<Self, ConfigError> {
        Self::build(File::from_str(toml, FileFormat::Toml), port)
    }

    fn build<S>(file: S, port: Option<String>) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 2137)?
            .set_default("server.model_file", "models/mobilenet_v2.pt")?
            .set_default("server.top_n", 5)?
            .set_default("server.preprocessing", "imagenet")?
            .set_default("server.layout", "nchw")?
            .set_default("server.softmax", true)?
            .set_default("forwarder.host", "0.0.0.0")?
            .set_default("forwarder.port", 2138)?
            .set_default("forwarder.inference_url", "http://127.0.0.1:2137/")?
            .set_default("forwarder.trigger_event", "esp32_ai_event")?
            .set_default("forwarder.response_event", "esp32_ai_response")?
            .set_default("forwarder.bus_url", "http://127.0.0.1:8123")?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .set_override_option("server.port", port)?
            .build()?
            .try_deserialize()?;

        if settings.server.top_n == 0 {
            return Err(ConfigError::Message("server.top_n must be at least 1".into()));
        }
        Ok(settings)
    }
}
