use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VoxcartError};

/// Top-level configuration for the Voxcart service.
///
/// Loaded from `~/.voxcart/config.toml` by default. Every section falls back
/// to its defaults when absent, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoxcartConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub commerce: CommerceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl VoxcartConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VoxcartConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values that would make the service misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.speech.url.trim().is_empty() {
            return Err(VoxcartError::Config("speech.url must not be empty".into()));
        }
        if !(0.6..=1.2).contains(&self.speech.temperature) {
            return Err(VoxcartError::Config(format!(
                "speech.temperature must be within 0.6..=1.2, got {}",
                self.speech.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.speech.vad_threshold) {
            return Err(VoxcartError::Config(format!(
                "speech.vad_threshold must be within 0..=1, got {}",
                self.speech.vad_threshold
            )));
        }
        if self.agents.execution_timeout_secs == 0 {
            return Err(VoxcartError::Config(
                "agents.execution_timeout_secs must be positive".into(),
            ));
        }
        if self.agents.cleanup_interval_secs == 0 {
            return Err(VoxcartError::Config(
                "agents.cleanup_interval_secs must be positive".into(),
            ));
        }
        if !self.server.media_stream_path.starts_with('/') {
            return Err(VoxcartError::Config(format!(
                "server.media_stream_path must start with '/', got {:?}",
                self.server.media_stream_path
            )));
        }
        if self.commerce.timeout_secs == 0 {
            return Err(VoxcartError::Config(
                "commerce.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.voxcart".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl GeneralConfig {
    /// Data directory with a leading `~` expanded to the home directory.
    pub fn data_dir_path(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(path),
    }
}

/// HTTP / WebSocket server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Path of the telephony media-stream WebSocket.
    pub media_stream_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            media_stream_path: "/media-stream".to_string(),
        }
    }
}

/// Speech-to-speech vendor session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Realtime WebSocket endpoint (model query parameter included).
    pub url: String,
    pub model: String,
    /// Environment variable holding the vendor API key.
    pub api_key_env: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub transcription_model: String,
    /// Server VAD activation threshold (0.0 - 1.0).
    pub vad_threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    pub temperature: f32,
    pub max_response_output_tokens: u32,
    /// Reconnection budget per call before the session is declared dead.
    pub max_reconnect_attempts: u32,
    /// Base delay between reconnection attempts, multiplied by the attempt number.
    pub reconnect_backoff_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview".to_string(),
            model: "gpt-4o-realtime-preview".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            voice: "alloy".to_string(),
            input_audio_format: "g711_ulaw".to_string(),
            output_audio_format: "g711_ulaw".to_string(),
            transcription_model: "whisper-1".to_string(),
            vad_threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
            temperature: 0.8,
            max_response_output_tokens: 4096,
            max_reconnect_attempts: 3,
            reconnect_backoff_ms: 500,
        }
    }
}

impl SpeechConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

/// Agent engine, orchestrator and eligibility policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Hard limit on a single agent execution.
    pub execution_timeout_secs: u64,
    /// How often finished agents are swept from the active set.
    pub cleanup_interval_secs: u64,
    /// How long a completed or failed agent stays visible after launch.
    pub retention_secs: u64,
    pub return_window_days: i64,
    pub exchange_window_days: i64,
    pub address_change_window_hours: i64,
    /// Base URL for payment retry / prepaid conversion links.
    pub payment_link_base: String,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            execution_timeout_secs: 30,
            cleanup_interval_secs: 120,
            retention_secs: 300,
            return_window_days: 14,
            exchange_window_days: 14,
            address_change_window_hours: 24,
            payment_link_base: "https://pay.example.com".to_string(),
        }
    }
}

impl AgentsConfig {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

/// E-commerce backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommerceConfig {
    /// REST gateway base URL. Empty selects the in-memory catalogue.
    pub base_url: String,
    /// Environment variable holding the gateway bearer token.
    pub api_token_env: String,
    pub timeout_secs: u64,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token_env: "VOXCART_COMMERCE_TOKEN".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file name inside `general.data_dir`.
    pub db_filename: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_filename: "voxcart.db".to_string(),
        }
    }
}
