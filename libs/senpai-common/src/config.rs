// Worker configuration read from the environment

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_LANGUAGES_PATH: &str = "config/languages.json";
pub const DEFAULT_RESULT_TTL_SECS: u64 = 86400;
pub const DEFAULT_CHECKER_ROOT: &str = ".";

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub redis_url: String,
    pub language: String,
    pub languages_path: String,
    pub pop_timeout_secs: f64,
    pub result_ttl_secs: u64,
    /// Relative reference paths in checker definitions resolve against this.
    pub checker_root: String,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            language: lookup("WORKER_LANGUAGE")
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| "python".to_string()),
            languages_path: lookup("SENPAI_LANGUAGES")
                .unwrap_or_else(|| DEFAULT_LANGUAGES_PATH.to_string()),
            pop_timeout_secs: lookup("SENPAI_POP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5.0),
            result_ttl_secs: lookup("SENPAI_RESULT_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RESULT_TTL_SECS),
            checker_root: lookup("SENPAI_CHECKER_ROOT")
                .unwrap_or_else(|| DEFAULT_CHECKER_ROOT.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_lookup(|_| None);
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.language, "python");
        assert_eq!(config.languages_path, DEFAULT_LANGUAGES_PATH);
        assert_eq!(config.result_ttl_secs, 86400);
        assert_eq!(config.checker_root, ".");
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let env: HashMap<&str, &str> = [
            ("WORKER_LANGUAGE", "Python"),
            ("SENPAI_POP_TIMEOUT_SECS", "2.5"),
            ("SENPAI_RESULT_TTL_SECS", "soon"),
        ]
        .into_iter()
        .collect();
        let config = WorkerConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.language, "python");
        assert_eq!(config.pop_timeout_secs, 2.5);
        assert_eq!(config.result_ttl_secs, DEFAULT_RESULT_TTL_SECS);
    }
}
