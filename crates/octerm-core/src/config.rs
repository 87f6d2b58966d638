//! Configuration management for octerm.
//!
//! Loads configuration from ${OCTERM_HOME}/config.toml with sensible defaults.
//! Command-line flags are layered on top through [`ConfigOverrides`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::{DailyTitleFormat, ResolveError};

/// Returns the default config template with comments.
///
/// Embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for octerm configuration.
    //!
    //! OCTERM_HOME resolution order:
    //! 1. OCTERM_HOME environment variable (if set)
    //! 2. ~/.config/octerm (default)

    use std::path::PathBuf;

    /// Returns the octerm home directory.
    pub fn octerm_home() -> PathBuf {
        if let Ok(home) = std::env::var("OCTERM_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".octerm"),
            |h| h.join(".config").join("octerm"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        octerm_home().join("config.toml")
    }
}

/// Layout of the interactive UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    /// Transcript, status line and input box.
    #[default]
    Full,
    /// Transcript only.
    Output,
    /// Input box only.
    Input,
}

impl UiMode {
    pub fn display_name(self) -> &'static str {
        match self {
            UiMode::Full => "full",
            UiMode::Output => "output",
            UiMode::Input => "input",
        }
    }
}

impl std::str::FromStr for UiMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(UiMode::Full),
            "output" => Ok(UiMode::Output),
            "input" => Ok(UiMode::Input),
            other => Err(format!(
                "Invalid UI mode '{other}'. Valid options: full, output, input"
            )),
        }
    }
}

/// Agent server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Full base URL; wins over host/port when non-empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Timeout for catalog requests in seconds (0 disables).
    pub timeout_secs: u64,
}

impl ServerConfig {
    const DEFAULT_HOST: &str = "127.0.0.1";
    const DEFAULT_PORT: u16 = 4096;
    const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Returns the base URL of the server without a trailing slash.
    ///
    /// # Errors
    /// Returns an error if an explicit `base_url` is not a valid URL.
    pub fn base_url(&self) -> Result<String> {
        if let Some(url) = self.base_url.as_deref().map(str::trim)
            && !url.is_empty()
        {
            url::Url::parse(url).with_context(|| format!("Invalid server base URL: {url}"))?;
            return Ok(url.trim_end_matches('/').to_string());
        }

        let host = if self.host.trim().is_empty() {
            Self::DEFAULT_HOST
        } else {
            self.host.trim()
        };
        let port = if self.port == 0 {
            Self::DEFAULT_PORT
        } else {
            self.port
        };
        Ok(format!("http://{host}:{port}"))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            base_url: None,
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Session selection and daily rollover settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session id/title, or "daily" for the rolling daily session.
    pub default_session: String,
    pub daily_title_format: String,
    pub daily_max_tokens: u64,
    pub daily_max_messages: u64,
}

impl SessionConfig {
    pub const DEFAULT_TITLE_FORMAT: &str = "{date}-daily-{part}";
    pub const DEFAULT_MAX_TOKENS: u64 = 250_000;
    pub const DEFAULT_MAX_MESSAGES: u64 = 4_000;
    /// Session title used when `default_session` is empty.
    pub const FALLBACK_SESSION: &str = "octerm";

    /// The session request to resolve, falling back to [`Self::FALLBACK_SESSION`].
    pub fn request(&self) -> &str {
        match self.default_session.trim() {
            "" => Self::FALLBACK_SESSION,
            request => request,
        }
    }

    /// Token threshold for rollover; 0 maps to the built-in default.
    pub fn effective_max_tokens(&self) -> u64 {
        if self.daily_max_tokens == 0 {
            Self::DEFAULT_MAX_TOKENS
        } else {
            self.daily_max_tokens
        }
    }

    /// Message-count threshold for rollover; 0 maps to the built-in default.
    pub fn effective_max_messages(&self) -> u64 {
        if self.daily_max_messages == 0 {
            Self::DEFAULT_MAX_MESSAGES
        } else {
            self.daily_max_messages
        }
    }

    /// Parses the configured daily title format, falling back to the default when empty.
    ///
    /// # Errors
    /// Returns an error if the format lacks a `{date}` token or does not have exactly one `{part}`.
    pub fn title_format(&self) -> std::result::Result<DailyTitleFormat, ResolveError> {
        let raw = if self.daily_title_format.trim().is_empty() {
            Self::DEFAULT_TITLE_FORMAT
        } else {
            self.daily_title_format.as_str()
        };
        DailyTitleFormat::parse(raw)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_session: String::new(),
            daily_title_format: Self::DEFAULT_TITLE_FORMAT.to_string(),
            daily_max_tokens: Self::DEFAULT_MAX_TOKENS,
            daily_max_messages: Self::DEFAULT_MAX_MESSAGES,
        }
    }
}

/// Defaults sent along with each prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

/// Interactive UI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub mode: UiMode,
    pub show_thinking: bool,
    pub show_tools: bool,
    /// Word-wrap transcript lines; when off, long lines are clipped at the edge.
    pub wrap: bool,
    pub input_height: u16,
    /// Keep only the last N rendered transcript lines (0 = unlimited).
    pub max_output_lines: usize,
    /// Characters revealed per typewriter tick.
    pub typewriter_chunk: usize,
    pub typewriter_interval_ms: u64,
}

impl UiConfig {
    pub fn typewriter_interval(&self) -> Duration {
        Duration::from_millis(self.typewriter_interval_ms.max(1))
    }

    pub fn typewriter_chunk(&self) -> usize {
        self.typewriter_chunk.max(1)
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            mode: UiMode::Full,
            show_thinking: true,
            show_tools: true,
            wrap: true,
            input_height: 6,
            max_output_lines: 4000,
            typewriter_chunk: 3,
            typewriter_interval_ms: 20,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub defaults: DefaultsConfig,
    pub ui: UiConfig,
}

impl Config {
    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        } else {
            Config::default()
        };

        config
            .session
            .title_format()
            .with_context(|| format!("Invalid [session] in {}", path.display()))?;
        Ok(config)
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Applies command-line overrides on top of file values.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(host) = &overrides.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(session) = &overrides.session {
            self.session.default_session.clone_from(session);
        }
        if let Some(max) = overrides.daily_max_tokens {
            self.session.daily_max_tokens = max;
        }
        if let Some(max) = overrides.daily_max_messages {
            self.session.daily_max_messages = max;
        }
        if let Some(agent) = &overrides.agent {
            self.defaults.agent = Some(agent.clone());
        }
        if let Some(provider) = &overrides.provider_id {
            self.defaults.provider_id = Some(provider.clone());
        }
        if let Some(model) = &overrides.model_id {
            self.defaults.model_id = Some(model.clone());
        }
        if let Some(mode) = overrides.mode {
            self.ui.mode = mode;
        }
        if let Some(show) = overrides.show_thinking {
            self.ui.show_thinking = show;
        }
        if let Some(show) = overrides.show_tools {
            self.ui.show_tools = show;
        }
        if let Some(wrap) = overrides.wrap {
            self.ui.wrap = wrap;
        }
        if let Some(height) = overrides.input_height {
            self.ui.input_height = height;
        }
        if let Some(lines) = overrides.max_output_lines {
            self.ui.max_output_lines = lines;
        }
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

/// Values supplied on the command line; `None` leaves the file value untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub session: Option<String>,
    pub daily_max_tokens: Option<u64>,
    pub daily_max_messages: Option<u64>,
    pub agent: Option<String>,
    pub provider_id: Option<String>,
    pub model_id: Option<String>,
    pub mode: Option<UiMode>,
    pub show_thinking: Option<bool>,
    pub show_tools: Option<bool>,
    pub wrap: Option<bool>,
    pub input_height: Option<u16>,
    pub max_output_lines: Option<usize>,
}
