use once_cell::sync::Lazy;
use std::env;

pub static CONFIG: Lazy<Config> = Lazy::new(Config::new);

/// Server-level knobs, read once from the environment.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub night_duration_secs: u64,
    pub day_discussion_duration_secs: u64,
    pub day_voting_duration_secs: u64,
    pub showdown_duration_secs: u64,
}

impl Config {
    fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_u64("PORT", 8080) as u16,
            night_duration_secs: env_u64("NIGHT_DURATION_SECS", 90),
            day_discussion_duration_secs: env_u64("DAY_DISCUSSION_DURATION_SECS", 180),
            day_voting_duration_secs: env_u64("DAY_VOTING_DURATION_SECS", 60),
            showdown_duration_secs: env_u64("SHOWDOWN_DURATION_SECS", 60),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
