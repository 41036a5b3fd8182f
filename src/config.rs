use std::time::Duration;

pub const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub analysis_model: String,
    pub image_model: String,
    pub port: u16,
    /// Upper bound of the simulated latency of each demo generation.
    pub demo_max_delay: Duration,
    /// Sessions untouched for this long are dropped.
    pub session_idle_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: DEMO_KEY.to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            analysis_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            port: 8080,
            demo_max_delay: Duration::from_millis(4000),
            session_idle_ttl: Duration::from_secs(3600),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_key: non_empty("GEMINI_API_KEY").unwrap_or(defaults.api_key),
            api_base: non_empty("GEMINI_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            analysis_model: non_empty("GEMINI_ANALYSIS_MODEL").unwrap_or(defaults.analysis_model),
            image_model: non_empty("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            port: non_empty("PORT").and_then(|v| v.parse().ok()).unwrap_or(defaults.port),
            demo_max_delay: non_empty("DEMO_MAX_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.demo_max_delay),
            session_idle_ttl: non_empty("SESSION_IDLE_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_idle_ttl),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.api_key == DEMO_KEY
    }

    pub fn redacted_key(&self) -> String {
        format!("{}...", self.api_key.chars().take(6).collect::<String>())
    }
}
