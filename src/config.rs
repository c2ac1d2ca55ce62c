//! Command-line and layered application configuration.
//!
//! Priority, lowest first: built-in defaults, config file (`--config`, else
//! `./config.yaml` when present), `INSIGHTS_`-prefixed environment variables
//! (`INSIGHTS_SERVER__PORT=8000`), command-line flags and their env aliases.

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::backend::{BackendSettings, BackendVariant};
use crate::replay::ReplayPacing;
use crate::session::DEFAULT_SESSION_TIMEOUT;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Greeting that opens every transcript.
pub const DEFAULT_WELCOME: &str =
    "Hello! I'm your Business Insights Assistant—what business metric can I fetch for you today?";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Answer service endpoint
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Answer service request/response shape
    #[arg(long, env = "BACKEND_VARIANT", value_enum)]
    pub backend_variant: Option<BackendVariant>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub chat: ChatConfig,
    pub replay: ReplayConfig,
    pub sessions: SessionsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Endpoint; the variant's built-in endpoint when unset.
    #[serde(default)]
    pub url: Option<String>,
    pub variant: BackendVariant,
    pub tag_session: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub title: String,
    pub welcome: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayConfig {
    pub typing_delay_ms: u64,
    pub word_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| ConfigError::Message(e.to_string()))?;

        // 1. Defaults
        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("backend.variant", BackendVariant::default().as_str())?
            .set_default("backend.tag_session", false)?
            .set_default("chat.title", "Syncoria AI-powered Chatbot")?
            .set_default("chat.welcome", DEFAULT_WELCOME)?
            .set_default("replay.typing_delay_ms", 500)?
            .set_default("replay.word_delay_ms", 50)?
            .set_default(
                "sessions.idle_timeout_secs",
                DEFAULT_SESSION_TIMEOUT.as_secs(),
            )?
            .set_default("sessions.sweep_interval_secs", 60)?
            .set_default("logging.json", false)?;

        // 2. Config file
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
        }

        // 3. Environment variables (prefixed with INSIGHTS_), e.g. INSIGHTS_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("INSIGHTS")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI flags (and their env aliases) win over everything else
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(url) = cli.backend_url {
            builder = builder.set_override("backend.url", url)?;
        }
        if let Some(variant) = cli.backend_variant {
            builder = builder.set_override("backend.variant", variant.as_str())?;
        }
        if let Some(json) = cli.log_json {
            builder = builder.set_override("logging.json", json)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.backend_settings()?;
        Ok(cfg)
    }

    /// Validated answer service settings.
    pub fn backend_settings(&self) -> Result<BackendSettings, ConfigError> {
        let variant = self.backend.variant;
        let raw = self
            .backend
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| variant.default_url());

        let url = Url::parse(raw)
            .map_err(|e| ConfigError::Message(format!("backend.url `{raw}` is invalid: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Message(format!(
                "backend.url `{raw}` must use http or https"
            )));
        }

        Ok(BackendSettings {
            url,
            variant,
            tag_session: self.backend.tag_session,
        })
    }

    #[must_use]
    pub fn replay_pacing(&self) -> ReplayPacing {
        ReplayPacing {
            typing_delay: Duration::from_millis(self.replay.typing_delay_ms),
            word_delay: Duration::from_millis(self.replay.word_delay_ms),
        }
    }

    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.sessions.idle_timeout_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sessions.sweep_interval_secs.max(1))
    }
}
