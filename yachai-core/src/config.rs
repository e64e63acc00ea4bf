use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Placeholder values from the stock secrets template; treated as unset.
pub const PLACEHOLDER_GEMINI_KEY: &str = "YOUR_GEMINI_KEY";
pub const PLACEHOLDER_BOT_TOKEN: &str = "YOUR_BOT_TOKEN";
pub const PLACEHOLDER_CHAT_ID: &str = "YOUR_CHAT_ID";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct YachaiConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Jsonl,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
    pub jsonl_path: String,
    pub cache_enabled: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Jsonl,
            url: String::new(),
            max_connections: 5,
            jsonl_path: "submissions.jsonl".to_string(),
            cache_enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: String,
    /// Candidate model ids, tried in order.
    pub models: Vec<String>,
    pub timeout_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            models: vec!["gemini-2.5-flash".to_string(), "gemini-1.5-flash".to_string()],
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub listener_enabled: bool,
    pub poll_timeout_seconds: u64,
    pub timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            listener_enabled: false,
            poll_timeout_seconds: 60,
            timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AdminConfig {
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SubmissionConfig {
    pub max_input_length: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_input_length: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertConfig {
    pub threshold: u8,
    pub auto_send: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: 75,
            auto_send: false,
        }
    }
}

impl YachaiConfig {
    /// Load from a TOML file (optional) overlaid with `YACHAI__SECTION__KEY`
    /// environment variables, then fill secrets from the legacy variable names.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("YACHAI")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("ai.models")
                    .try_parsing(true),
            )
            .build()?;
        let mut config: Self = s.try_deserialize()?;
        config.apply_env_fallbacks(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fill_if_empty(&mut self.ai.api_key, lookup("GEMINI_API_KEY"));
        fill_if_empty(&mut self.telegram.bot_token, lookup("BOT_TOKEN"));
        fill_if_empty(&mut self.telegram.chat_id, lookup("CHAT_ID"));
        fill_if_empty(&mut self.admin.password, lookup("ADMIN_PASS"));
        fill_if_empty(&mut self.database.url, lookup("DATABASE_URL"));
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.alerts.threshold > 100 {
            return Err(ConfigError::Message(format!(
                "alerts.threshold must be within 0..=100, got {}",
                self.alerts.threshold
            )));
        }
        if self.ai.models.is_empty() {
            return Err(ConfigError::Message("ai.models must name at least one model".into()));
        }
        if self.submission.max_input_length == 0 {
            return Err(ConfigError::Message(
                "submission.max_input_length must be positive".into(),
            ));
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_empty() {
            return Err(ConfigError::Message(
                "database.url is required for the postgres backend".into(),
            ));
        }
        Ok(())
    }
}

fn fill_if_empty(slot: &mut String, value: Option<String>) {
    if slot.is_empty() {
        if let Some(v) = value {
            *slot = v;
        }
    }
}
