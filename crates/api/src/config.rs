use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use rihla_chat::DEFAULT_REPLY_DELAY;
use rihla_core::ResponseTemplates;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: String,
    pub reply_delay: Duration,
    pub templates_path: Option<PathBuf>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub max_conversations: usize,
    pub conversation_idle: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            reply_delay: DEFAULT_REPLY_DELAY,
            templates_path: None,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 80,
            max_conversations: 10_000,
            conversation_idle: Duration::from_secs(30 * 60),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind: env::var("RIHLA_BIND").unwrap_or(defaults.bind),
            reply_delay: env_parse::<u64>("RIHLA_REPLY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.reply_delay),
            templates_path: env::var("RIHLA_TEMPLATES")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            rate_limit_window: env_parse::<u64>("RIHLA_RATE_LIMIT_WINDOW_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: env_parse("RIHLA_RATE_LIMIT_MAX").unwrap_or(defaults.rate_limit_max),
            max_conversations: env_parse("RIHLA_MAX_CONVERSATIONS")
                .unwrap_or(defaults.max_conversations),
            conversation_idle: env_parse::<u64>("RIHLA_CONVERSATION_IDLE_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.conversation_idle),
        }
    }

    pub fn load_templates(&self) -> Result<ResponseTemplates> {
        match &self.templates_path {
            Some(path) => ResponseTemplates::load(path)
                .with_context(|| format!("failed loading templates from {}", path.display())),
            None => Ok(ResponseTemplates::default()),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
