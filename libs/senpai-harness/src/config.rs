// Language runner configuration for the process backend
use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

pub const LANGUAGES_ENV: &str = "SENPAI_LANGUAGES";
pub const DEFAULT_LANGUAGES_PATH: &str = "config/languages.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the runner process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    /// Including the dot, e.g. `.py`.
    pub file_extension: String,
    pub runner: RunnerConfig,
    /// Module names a submission may not take.
    #[serde(default)]
    pub reserved_names: Vec<String>,
    /// Code block markup tag used by the presenter.
    #[serde(default)]
    pub highlight: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone, Default)]
pub struct LanguageConfigManager {
    configs: HashMap<String, LanguageConfig>,
}

impl LanguageConfigManager {
    /// Load language configurations from a languages.json file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Err(HarnessError::Config(format!(
                "language config file not found: {}",
                config_path.display()
            )));
        }

        let content = fs::read_to_string(config_path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson = serde_json::from_str(content)
            .map_err(|e| HarnessError::Config(format!("failed to parse languages.json: {}", e)))?;

        let mut configs = HashMap::new();
        for lang in languages_json.languages {
            configs.insert(lang.name.to_lowercase(), lang);
        }

        Ok(Self { configs })
    }

    /// Load from `SENPAI_LANGUAGES`, or config/languages.json
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(LANGUAGES_ENV).unwrap_or_else(|_| DEFAULT_LANGUAGES_PATH.to_string());
        Self::load(Path::new(&path))
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, language: &str) -> Result<&LanguageConfig> {
        self.configs
            .get(&language.to_lowercase())
            .ok_or_else(|| HarnessError::UnknownLanguage(language.to_string()))
    }

    /// List all supported languages, sorted
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }
}
