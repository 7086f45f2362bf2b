mod defaults;
mod messages;


pub use messages::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RelayError;
use crate::identity::{IdentityNormalizer, MobilePrefixFixup};
use defaults::*;

/// Access-token value that switches outbound delivery to log-only.
pub const SIMULATE_SENTINEL: &str = "FAKE";

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub messages: Messages,
}

/// Execution mode. Regional number heuristics only run outside production.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    /// Parse a loose mode string (`APP_ENV` style). Unknown values are development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily-rotated log files. Unset = stdout only.
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default)]
    pub mode: RunMode,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_dir: None,
            mode: RunMode::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token guarding operator endpoints. Empty = no auth.
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
        }
    }
}

/// WhatsApp Business Cloud API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Secret echoed back by Meta during webhook verification.
    #[serde(default)]
    pub verify_token: String,
    /// Graph API bearer token. `FAKE` = simulate sends.
    #[serde(default)]
    pub access_token: String,
    /// Business phone number id used as the sender.
    #[serde(default)]
    pub phone_number_id: String,
    /// App secret for `X-Hub-Signature-256` checks. Unset = no check.
    #[serde(default)]
    pub app_secret: Option<String>,
    /// Destination for the diagnostic send.
    #[serde(default)]
    pub test_recipient: Option<String>,
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            access_token: String::new(),
            phone_number_id: String::new(),
            app_secret: None,
            test_recipient: None,
            graph_base_url: default_graph_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl WhatsAppConfig {
    /// Whether outbound sends are only logged.
    pub fn simulate(&self) -> bool {
        self.access_token == SIMULATE_SENTINEL
    }
}

/// OpenAI-compatible completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_provider_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Conversation window config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

/// Delivery-address rewriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub mobile_prefix_fixup: bool,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_local_len")]
    pub local_len: usize,
    #[serde(default = "default_prefix_digit")]
    pub digit: char,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            mobile_prefix_fixup: false,
            country_code: default_country_code(),
            local_len: default_local_len(),
            digit: default_prefix_digit(),
        }
    }
}

impl Config {
    /// Apply environment overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using an arbitrary lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("APP_VERIFY_TOKEN") {
            self.whatsapp.verify_token = v;
        }
        if let Some(v) = get("WHATSAPP_TOKEN") {
            self.whatsapp.access_token = v;
        }
        if let Some(v) = get("WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = v;
        }
        if let Some(v) = get("WHATSAPP_APP_SECRET") {
            self.whatsapp.app_secret = Some(v);
        }
        if let Some(v) = get("WHATSAPP_TEST_TO") {
            self.whatsapp.test_recipient = Some(v);
        }
        if let Some(v) = get("GROQ_API_KEY") {
            self.provider.api_key = v;
        }
        if let Some(v) = get("MODEL_ID") {
            self.provider.model = v;
        }
        if let Some(v) = get("APP_ENV") {
            self.relay.mode = RunMode::parse(&v);
        }
    }

    /// Fail fast on missing required values.
    ///
    /// Each error names both the TOML key and the environment variable so the
    /// operator can fix whichever they use.
    pub fn validate(&self) -> Result<(), RelayError> {
        let required = [
            (&self.whatsapp.verify_token, "whatsapp.verify_token", "APP_VERIFY_TOKEN"),
            (&self.whatsapp.access_token, "whatsapp.access_token", "WHATSAPP_TOKEN"),
            (
                &self.whatsapp.phone_number_id,
                "whatsapp.phone_number_id",
                "WHATSAPP_PHONE_NUMBER_ID",
            ),
            (&self.provider.api_key, "provider.api_key", "GROQ_API_KEY"),
            (&self.provider.model, "provider.model", "MODEL_ID"),
        ];
        for (value, key, env) in required {
            if value.trim().is_empty() {
                return Err(RelayError::Config(format!(
                    "missing {key} (set it in config.toml or the {env} env var)"
                )));
            }
        }
        if self.memory.max_turns == 0 {
            return Err(RelayError::Config(
                "memory.max_turns must be at least 1".to_string(),
            ));
        }
        if !self.identity.digit.is_ascii_digit() {
            return Err(RelayError::Config(format!(
                "identity.digit must be a digit, got {:?}",
                self.identity.digit
            )));
        }
        Ok(())
    }

    /// Build the identity normalizer for this config.
    ///
    /// The mobile-prefix fixup only applies when enabled and not in production.
    pub fn identity_normalizer(&self) -> IdentityNormalizer {
        if self.identity.mobile_prefix_fixup && self.relay.mode != RunMode::Production {
            IdentityNormalizer::with_fixup(MobilePrefixFixup {
                country_code: self.identity.country_code.clone(),
                local_len: self.identity.local_len,
                digit: self.identity.digit,
            })
        } else {
            IdentityNormalizer::plain()
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Where a loaded [`Config`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// The file was missing; built-in defaults were used.
    Defaults,
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. This runs before the
/// log subscriber is installed, so the caller reports the source. Environment
/// overrides and validation are separate steps; see
/// [`Config::apply_env_overrides`] and [`Config::validate`].
pub fn load(path: &str) -> Result<(Config, ConfigSource), RelayError> {
    let path = Path::new(path);
    if !path.exists() {
        return Ok((Config::default(), ConfigSource::Defaults));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| RelayError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| RelayError::Config(format!("failed to parse config: {}", e)))?;

    Ok((config, ConfigSource::File))
}
