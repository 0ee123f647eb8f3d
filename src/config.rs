use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Environment variable carrying the webhook endpoint
pub const WEBHOOK_URL_ENV: &str = "WEBCHAT_WEBHOOK_URL";

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Webhook endpoint both actions are posted to
    pub webhook_url: Option<String>,

    /// Body key carrying the user's text
    pub chat_input_key: String,

    /// Body key carrying the session identifier
    pub session_key: String,

    /// Storage key the session identifier is persisted under
    pub storage_key: String,

    /// Optional request timeout; requests wait indefinitely when unset
    pub request_timeout_secs: Option<u64>,

    /// Widget text and timing
    pub widget: WidgetConfig,

    /// Webchat home directory
    #[serde(skip)]
    pub webchat_home: PathBuf,
}

/// Presentation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub assistant_name: String,
    pub greeting: String,
    pub bubble_text: String,
    pub bubble_delay_ms: u64,
    pub error_text: String,
    pub placeholder: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            assistant_name: "Assistant".to_string(),
            greeting: "Hello! I'm your assistant. How can I help you today?".to_string(),
            bubble_text: "Hello! I'm here to answer any questions you may have. Press Enter to chat!"
                .to_string(),
            bubble_delay_ms: 3000,
            error_text: "There was an error talking to the server.".to_string(),
            placeholder: "Type your message...".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            webhook_url: None,
            chat_input_key: "chatInput".to_string(),
            session_key: "sessionId".to_string(),
            storage_key: "n8n-chat-session".to_string(),
            request_timeout_secs: None,
            widget: WidgetConfig::default(),
            webchat_home: home.join(".webchat"),
        }
    }
}

impl Config {
    /// Load configuration from `~/.webchat/config.toml` and the environment
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let webchat_home = home.join(".webchat");

        fs::create_dir_all(&webchat_home)
            .context("Failed to create .webchat directory")?;

        let mut config = Self::load_from(webchat_home.join("config.toml"))?;
        config.webchat_home = webchat_home;
        config.apply_env();

        Ok(config)
    }

    /// Read a config file, falling back to defaults when it does not exist
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.webchat_home)
            .context("Failed to create .webchat directory")?;
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(self.config_path(), content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Write a default config file unless one exists. Environment and CLI
    /// overrides on `self` are not persisted. Returns whether a file was written.
    pub fn init_file(&self) -> Result<bool> {
        if self.config_path().exists() {
            return Ok(false);
        }

        let defaults = Config {
            webchat_home: self.webchat_home.clone(),
            ..Config::default()
        };
        defaults.save()?;
        Ok(true)
    }

    /// Override file settings with `WEBCHAT_WEBHOOK_URL` when set
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(WEBHOOK_URL_ENV) {
            self.set_webhook_url(url);
        }
    }

    /// Set the endpoint; blank values are ignored
    pub fn set_webhook_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if !url.trim().is_empty() {
            self.webhook_url = Some(url.trim().to_string());
        }
    }

    /// Endpoint, or an error explaining how to configure one
    pub fn require_webhook_url(&self) -> Result<&str> {
        self.webhook_url.as_deref().with_context(|| {
            format!(
                "No webhook URL configured. Set {} or add `webhook_url` to {}",
                WEBHOOK_URL_ENV,
                self.config_path().display()
            )
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.webchat_home.join("config.toml")
    }

    /// File that stands in for the browser's persistent storage
    pub fn storage_path(&self) -> PathBuf {
        self.webchat_home.join("storage.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.webchat_home.join("logs")
    }
}
