//! Configuration management for spendlog
//!
//! This module handles loading, validation, and management of
//! spendlog configuration from YAML files.

pub mod error;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use error::ConfigError;

// ==================== Configuration Types ====================

/// Ledger file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the three ledger representations
    #[serde(default = "default_data_path")]
    pub path: PathBuf,
    /// Comma-separated file with a fixed header row
    #[serde(default = "default_tabular_file")]
    pub tabular_file: String,
    /// JSON array rewritten on every mutation
    #[serde(default = "default_structured_file")]
    pub structured_file: String,
    /// Human-readable audit trail, one line per record
    #[serde(default = "default_text_log_file")]
    pub text_log_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            tabular_file: default_tabular_file(),
            structured_file: default_structured_file(),
            text_log_file: default_text_log_file(),
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("./data")
}

fn default_tabular_file() -> String {
    "ledger.csv".to_string()
}

fn default_structured_file() -> String {
    "ledger.json".to_string()
}

fn default_text_log_file() -> String {
    "ledger.log".to_string()
}

/// Category membership lists deciding income vs. expenditure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesConfig {
    #[serde(default = "default_expenditure")]
    pub expenditure: Vec<String>,
    #[serde(default = "default_income")]
    pub income: Vec<String>,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            expenditure: default_expenditure(),
            income: default_income(),
        }
    }
}

fn default_expenditure() -> Vec<String> {
    [
        "餐饮", "购物", "交通", "娱乐", "住房", "通讯", "医疗", "教育", "日用", "其他",
        "meals", "shopping", "transport", "entertainment", "housing", "utilities",
        "medical", "education", "other",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_income() -> Vec<String> {
    ["工资", "奖金", "理财", "兼职", "红包", "salary", "bonus", "investment", "side job"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl CategoriesConfig {
    /// Check if a category counts as expenditure
    pub fn is_expenditure(&self, category: &str) -> bool {
        self.expenditure.iter().any(|c| c == category)
    }

    /// Check if a category counts as income
    pub fn is_income(&self, category: &str) -> bool {
        self.income.iter().any(|c| c == category)
    }
}

/// Recurring-charge detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicConfig {
    /// Look-ahead window in days
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,
    /// Maximum difference between two gaps of the same cycle
    #[serde(default = "default_tolerance_days")]
    pub tolerance_days: i64,
    /// Gaps needed in the winning cluster
    #[serde(default = "default_min_occurrences")]
    pub min_occurrences: usize,
}

impl Default for PeriodicConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            tolerance_days: default_tolerance_days(),
            min_occurrences: default_min_occurrences(),
        }
    }
}

fn default_horizon_days() -> i64 {
    30
}

fn default_tolerance_days() -> i64 {
    2
}

fn default_min_occurrences() -> usize {
    2
}

/// Text-completion collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Ollama-compatible generate endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model name sent with every prompt
    #[serde(default = "default_model")]
    pub model: String,
    /// Upper bound for a single completion call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:11434/api/generate".to_string()
}

fn default_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Ledger file locations
    #[serde(default)]
    pub data: DataConfig,
    /// Income / expenditure category sets
    #[serde(default)]
    pub categories: CategoriesConfig,
    /// Recurring-charge detection
    #[serde(default)]
    pub periodic: PeriodicConfig,
    /// Text-completion collaborator
    #[serde(default)]
    pub completion: CompletionConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_yaml(&content)?;
        log::debug!("configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load from a path, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound { path }) => {
                log::warn!("config file {} not found, using defaults", path);
                Ok(Config::default())
            }
            other => other,
        }
    }

    /// Parse and validate YAML text
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content).map_err(|e| ConfigError::InvalidYaml {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, name) in [
            ("data.tabular_file", &self.data.tabular_file),
            ("data.structured_file", &self.data.structured_file),
            ("data.text_log_file", &self.data.text_log_file),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "File name must not be empty".to_string(),
                });
            }
        }

        if self.periodic.horizon_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "periodic.horizon_days".to_string(),
                reason: "Horizon must be at least one day".to_string(),
            });
        }

        if self.periodic.tolerance_days < 0 {
            return Err(ConfigError::InvalidValue {
                field: "periodic.tolerance_days".to_string(),
                reason: "Tolerance cannot be negative".to_string(),
            });
        }

        if self.periodic.min_occurrences < 2 {
            return Err(ConfigError::InvalidValue {
                field: "periodic.min_occurrences".to_string(),
                reason: "A cycle needs at least two matching intervals".to_string(),
            });
        }

        if self.completion.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "completion.timeout_secs".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            });
        }

        let income: HashSet<&str> = self.categories.income.iter().map(String::as_str).collect();
        if let Some(both) = self
            .categories
            .expenditure
            .iter()
            .find(|c| income.contains(c.as_str()))
        {
            return Err(ConfigError::ValidationError {
                message: format!("category '{}' is listed as both income and expenditure", both),
            });
        }

        Ok(())
    }

    /// Generate a default configuration file
    pub fn generate_default() -> &'static str {
        include_str!("../templates/default_config.yaml")
    }

    pub fn tabular_path(&self) -> PathBuf {
        self.data.path.join(&self.data.tabular_file)
    }

    pub fn structured_path(&self) -> PathBuf {
        self.data.path.join(&self.data.structured_file)
    }

    pub fn text_log_path(&self) -> PathBuf {
        self.data.path.join(&self.data.text_log_file)
    }
}
