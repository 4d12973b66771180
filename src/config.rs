//! Configuration for the evaluation harness.
//!
//! Loaded once at startup from a JSON or YAML file (chosen by extension),
//! then overridden by environment variables. The resolved [`Config`] is
//! passed by reference to everything that needs it.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Judge call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Model identifier, e.g. "openai/gpt-4o-mini" or "gemini/gemini-2.5-flash".
    pub model: Option<String>,

    /// Sampling temperature for judge calls.
    pub temperature: f32,

    /// Total attempts allowed per judge call (including the first).
    pub max_attempts: u32,

    /// First backoff delay after a transient failure; doubles on each retry.
    pub base_delay_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.1,
            max_attempts: 3,
            base_delay_secs: 5,
        }
    }
}

impl JudgeConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }
}

/// Waits inserted between dependent external calls to respect rate limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Wait after the manual pipeline, before the file-search pipeline.
    pub inter_pipeline_delay_secs: u64,

    /// Wait after the file-search pipeline, before its judge call.
    pub pre_judge_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            inter_pipeline_delay_secs: 3,
            pre_judge_delay_secs: 5,
        }
    }
}

impl ScheduleConfig {
    /// A schedule without waits, for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            inter_pipeline_delay_secs: 0,
            pre_judge_delay_secs: 0,
        }
    }

    pub fn inter_pipeline_delay(&self) -> Duration {
        Duration::from_secs(self.inter_pipeline_delay_secs)
    }

    pub fn pre_judge_delay(&self) -> Duration {
        Duration::from_secs(self.pre_judge_delay_secs)
    }
}

/// Credentials and endpoint for one provider family.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL for the provider API. Empty means the provider default.
    pub api_base: String,

    /// API key for authentication.
    pub api_key: String,
}

/// All provider families the router knows about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
    pub gemini: ProviderConfig,

    /// Provider used for model ids without a "provider/" prefix.
    pub default_provider: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ProviderConfig::default(),
            gemini: ProviderConfig::default(),
            default_provider: "openai".to_string(),
        }
    }
}

/// Manual RAG pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Directory holding the corpus, one sub-directory per dataset.
    pub corpus_dir: PathBuf,

    /// Number of chunks retrieved per query.
    pub top_k: usize,

    /// Model used to generate the manual pipeline's answer.
    pub generation_model: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("docs"),
            top_k: 5,
            generation_model: "gemini/gemini-2.5-flash".to_string(),
        }
    }
}

/// Hosted file-search pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSearchConfig {
    /// Gemini model that runs the file-search tool.
    pub model: String,
}

impl Default for FileSearchConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
        }
    }
}

/// One entry of the fixed question set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub category: String,
    pub question: String,
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub judge: JudgeConfig,

    /// Corpus identifier shared by both pipelines.
    pub dataset: String,

    pub questions: Vec<Question>,
    pub schedule: ScheduleConfig,
    pub providers: ProvidersConfig,
    pub retrieval: RetrievalConfig,
    pub file_search: FileSearchConfig,

    /// Where report artifacts are written.
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            judge: JudgeConfig::default(),
            dataset: String::new(),
            questions: Vec::new(),
            schedule: ScheduleConfig::default(),
            providers: ProvidersConfig::default(),
            retrieval: RetrievalConfig::default(),
            file_search: FileSearchConfig::default(),
            output_dir: PathBuf::from("evaluation_results"),
        }
    }
}

impl Config {
    /// Load configuration from a file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (JUDGE_MODEL, JUDGE_TEMPERATURE, LLM_API_BASE,
    ///    LLM_API_KEY, GEMINI_API_KEY / GOOGLE_API_KEY)
    /// 2. The given file, or ~/.config/rag-eval/config.yaml when none is given
    /// 3. Default values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(default_path) if default_path.exists() => {
                    Self::load_from_file(&default_path)?
                }
                _ => Config::default(),
            },
        };

        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let parsed = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|e| {
            EvalError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("JUDGE_MODEL").filter(|m| !m.is_empty()) {
            self.judge.model = Some(model);
        }

        if let Some(temp) = lookup("JUDGE_TEMPERATURE").and_then(|t| t.parse().ok()) {
            self.judge.temperature = temp;
        }

        if let Some(api_base) = lookup("LLM_API_BASE") {
            self.providers.openai.api_base = api_base;
        }

        if let Some(api_key) = lookup("LLM_API_KEY") {
            self.providers.openai.api_key = api_key;
        }

        if let Some(api_key) = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")) {
            self.providers.gemini.api_key = api_key;
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-eval")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present and consistent.
    pub fn validate(&self) -> Result<()> {
        if self.questions.is_empty() {
            return Err(EvalError::Config(
                "The question set is empty. Add a `questions` list to the config file.".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for q in &self.questions {
            if !seen.insert(q.id) {
                return Err(EvalError::Config(format!("Duplicate question id {}", q.id)));
            }
        }

        if self.judge.max_attempts == 0 {
            return Err(EvalError::Config(
                "judge.max_attempts must be at least 1".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.judge.temperature) {
            return Err(EvalError::Config(format!(
                "judge.temperature {} is outside 0.0..=2.0",
                self.judge.temperature
            )));
        }

        Ok(())
    }

    /// Look up a question by id.
    pub fn question(&self, id: u32) -> Result<&Question> {
        self.questions
            .iter()
            .find(|q| q.id == id)
            .ok_or(EvalError::QuestionNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn sample_questions() -> Vec<Question> {
        vec![
            Question {
                id: 1,
                category: "constitutional".to_string(),
                question: "X?".to_string(),
            },
            Question {
                id: 2,
                category: "civil".to_string(),
                question: "Y?".to_string(),
            },
        ]
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.judge.model.is_none());
        assert_eq!(config.judge.temperature, 0.1);
        assert_eq!(config.judge.max_attempts, 3);
        assert_eq!(config.judge.base_delay(), Duration::from_secs(5));
        assert_eq!(config.schedule.inter_pipeline_delay(), Duration::from_secs(3));
        assert_eq!(config.schedule.pre_judge_delay(), Duration::from_secs(5));
        assert_eq!(config.output_dir, PathBuf::from("evaluation_results"));
    }

    #[test]
    fn test_validate_fails_without_questions() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_ids_and_zero_attempts() {
        let mut config = Config {
            questions: sample_questions(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.judge.max_attempts = 0;
        assert!(config.validate().is_err());

        config.judge.max_attempts = 3;
        config.questions.push(sample_questions()[0].clone());
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));
    }

    #[test]
    fn test_load_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test_config.json");
        std::fs::write(
            &path,
            r#"{
                "judge": {"model": "gemini/gemini-2.5-flash"},
                "dataset": "direito_constitucional",
                "questions": [{"id": 1, "category": "constitutional", "question": "X?"}]
            }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.judge.model.as_deref(), Some("gemini/gemini-2.5-flash"));
        assert_eq!(config.judge.temperature, 0.1);
        assert_eq!(config.dataset, "direito_constitucional");
        assert_eq!(config.question(1).unwrap().category, "constitutional");
        assert!(matches!(config.question(9), Err(EvalError::QuestionNotFound(9))));
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "judge:\n  temperature: 0.3\n  max_attempts: 5\nschedule:\n  pre_judge_delay_secs: 0\nquestions:\n  - id: 4\n    category: civil\n    question: Z?\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.judge.temperature, 0.3);
        assert_eq!(config.judge.max_attempts, 5);
        assert_eq!(config.schedule.pre_judge_delay_secs, 0);
        assert_eq!(config.schedule.inter_pipeline_delay_secs, 3);
        assert_eq!(config.questions.len(), 1);
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/test_config.json")));
        assert!(matches!(result, Err(EvalError::Io { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("JUDGE_MODEL", "openai/gpt-4o-mini"),
            ("JUDGE_TEMPERATURE", "0.5"),
            ("LLM_API_KEY", "sk-test"),
            ("GOOGLE_API_KEY", "g-test"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.judge.model.as_deref(), Some("openai/gpt-4o-mini"));
        assert_eq!(config.judge.temperature, 0.5);
        assert_eq!(config.providers.openai.api_key, "sk-test");
        assert_eq!(config.providers.gemini.api_key, "g-test");
    }
}
