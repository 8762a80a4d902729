//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, path::PathBuf, sync::Arc};

use serde::Deserialize;

use crate::base::prompts;

use super::types::Res;

/// Default OpenAI model to use.
fn default_openai_model() -> String {
    "gpt-4.1".to_string()
}

/// Default sampling temperature for the OpenAI model.
fn default_openai_temperature() -> f32 {
    0.7
}

/// Default max output tokens for the OpenAI model.
fn default_openai_max_tokens() -> u32 {
    4096
}

/// Default system directive for the assistant.
fn default_assistant_system_directive() -> String {
    prompts::ASSISTANT_SYSTEM_DIRECTIVE.to_string()
}

/// Default time budget for a single generic query.
fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_google_client_secret_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_gmail_token_path() -> PathBuf {
    PathBuf::from("gmail_token.json")
}

fn default_calendar_token_path() -> PathBuf {
    PathBuf::from("calendar_token.json")
}

fn default_google_api_base_url() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_google_auth_base_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_google_consent_timeout_secs() -> u64 {
    300
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

/// Default number of remembered turns per user.
fn default_conversation_max_turns() -> usize {
    10
}

/// Default number of users with remembered conversations.
fn default_conversation_max_users() -> usize {
    256
}

/// Configuration for the assistant bot.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// OpenAI API key (`OPENAI_API_KEY`).
    #[serde(default)]
    pub openai_api_key: String,
    /// OpenAI model to use (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Optional OpenAI-compatible base URL (`OPENAI_BASE_URL`).
    #[serde(default)]
    pub openai_base_url: Option<String>,
    /// Sampling temperature (`OPENAI_TEMPERATURE`), between 0 and 2.
    #[serde(default = "default_openai_temperature")]
    pub openai_temperature: f32,
    /// Max output tokens (`OPENAI_MAX_TOKENS`).
    #[serde(default = "default_openai_max_tokens")]
    pub openai_max_tokens: u32,
    /// Optional custom system directive to override the default (`ASSISTANT_SYSTEM_DIRECTIVE`).
    #[serde(default = "default_assistant_system_directive")]
    pub assistant_system_directive: String,
    /// Seconds a generic query may take before it is abandoned (`LLM_TIMEOUT_SECS`).
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    /// Whether the model may call the email and calendar tools (`LLM_TOOLS_ENABLED`).
    #[serde(default = "default_true")]
    pub llm_tools_enabled: bool,
    /// Slack app token (`SLACK_APP_TOKEN`).
    #[serde(default)]
    pub slack_app_token: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`).
    #[serde(default)]
    pub slack_bot_token: String,
    /// OAuth client-secret descriptor, needed only for first-time consent (`GOOGLE_CLIENT_SECRET_PATH`).
    #[serde(default = "default_google_client_secret_path")]
    pub google_client_secret_path: PathBuf,
    /// Persisted Gmail credential (`GMAIL_TOKEN_PATH`).
    #[serde(default = "default_gmail_token_path")]
    pub gmail_token_path: PathBuf,
    /// Persisted Calendar credential (`CALENDAR_TOKEN_PATH`).
    #[serde(default = "default_calendar_token_path")]
    pub calendar_token_path: PathBuf,
    /// Google REST API root (`GOOGLE_API_BASE_URL`).
    #[serde(default = "default_google_api_base_url")]
    pub google_api_base_url: String,
    /// Google consent page (`GOOGLE_AUTH_BASE_URL`).
    #[serde(default = "default_google_auth_base_url")]
    pub google_auth_base_url: String,
    /// Seconds to wait for the consent redirect before giving up (`GOOGLE_CONSENT_TIMEOUT_SECS`).
    #[serde(default = "default_google_consent_timeout_secs")]
    pub google_consent_timeout_secs: u64,
    /// Whether to open the consent page in a local browser; the URL is always logged (`GOOGLE_CONSENT_OPEN_BROWSER`).
    #[serde(default = "default_true")]
    pub google_consent_open_browser: bool,
    /// Calendar to read from and write to (`CALENDAR_ID`).
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// Turns remembered per user; `0` disables memory (`CONVERSATION_MAX_TURNS`).
    #[serde(default = "default_conversation_max_turns")]
    pub conversation_max_turns: usize,
    /// Users whose conversations are remembered at once (`CONVERSATION_MAX_USERS`).
    #[serde(default = "default_conversation_max_users")]
    pub conversation_max_users: usize,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_model: default_openai_model(),
            openai_base_url: None,
            openai_temperature: default_openai_temperature(),
            openai_max_tokens: default_openai_max_tokens(),
            assistant_system_directive: default_assistant_system_directive(),
            llm_timeout_secs: default_llm_timeout_secs(),
            llm_tools_enabled: true,
            slack_app_token: String::new(),
            slack_bot_token: String::new(),
            google_client_secret_path: default_google_client_secret_path(),
            gmail_token_path: default_gmail_token_path(),
            calendar_token_path: default_calendar_token_path(),
            google_api_base_url: default_google_api_base_url(),
            google_auth_base_url: default_google_auth_base_url(),
            google_consent_timeout_secs: default_google_consent_timeout_secs(),
            google_consent_open_browser: true,
            calendar_id: default_calendar_id(),
            conversation_max_turns: default_conversation_max_turns(),
            conversation_max_users: default_conversation_max_users(),
        }
    }
}

impl Config {
    /// Load and validate the configuration.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let result = Self::read(explicit_path)?;
        result.validate()?;

        Ok(result)
    }

    /// Load the configuration without checking the chat and model tokens.
    ///
    /// Used by the one-off authorization command, which only needs the Google settings.
    pub fn read(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder();

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        // Environment variables win over the file.
        cfg = cfg.add_source(config::Environment::default());

        let inner: ConfigInner = cfg.build()?.try_deserialize().map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

        Ok(Config::from(inner))
    }

    /// Check required values and ranges.
    pub fn validate(&self) -> Res<()> {
        for (name, value) in [
            ("OPENAI_API_KEY", &self.openai_api_key),
            ("SLACK_BOT_TOKEN", &self.slack_bot_token),
            ("SLACK_APP_TOKEN", &self.slack_app_token),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow::anyhow!("{name} must be set."));
            }
        }

        if self.openai_temperature < 0.0 || self.openai_temperature > 2.0 {
            return Err(anyhow::anyhow!("OpenAI temperature must be between 0 and 2."));
        }

        if self.openai_max_tokens < 1 || self.openai_max_tokens > 128000 {
            return Err(anyhow::anyhow!("OpenAI max tokens must be between 1 and 128000."));
        }

        if self.llm_timeout_secs == 0 {
            return Err(anyhow::anyhow!("LLM timeout must be at least one second."));
        }

        if self.google_consent_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Google consent timeout must be at least one second."));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ConfigInner {
        ConfigInner {
            openai_api_key: "sk-test".to_string(),
            slack_app_token: "xapp-test".to_string(),
            slack_bot_token: "xoxb-test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(Config::from(valid()).validate().is_ok());
    }

    #[test]
    fn test_missing_token_is_named() {
        let config = Config::from(ConfigInner {
            slack_app_token: String::new(),
            ..valid()
        });

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SLACK_APP_TOKEN"));
    }

    #[test]
    fn test_temperature_range() {
        let config = Config::from(ConfigInner {
            openai_temperature: 2.5,
            ..valid()
        });

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config::from(ConfigInner { llm_timeout_secs: 0, ..valid() });

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_consent_timeout_rejected() {
        let config = Config::from(ConfigInner {
            google_consent_timeout_secs: 0,
            ..valid()
        });

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("consent timeout"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
openai_api_key = "sk-file"
slack_app_token = "xapp-file"
slack_bot_token = "xoxb-file"
calendar_id = "team@example.com"
conversation_max_turns = 3
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.calendar_id, "team@example.com");
        assert_eq!(config.conversation_max_turns, 3);
        assert_eq!(config.openai_model, "gpt-4.1");
        assert_eq!(config.gmail_token_path, PathBuf::from("gmail_token.json"));
        assert_eq!(config.google_consent_timeout_secs, 300);
    }
}
