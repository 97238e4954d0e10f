//! Linter configuration (`.terralint.yml`).

use std::fs;
use std::path::{Path, PathBuf};

use terralint_kit::indexmap::IndexMap;

use crate::context::Environment;
use crate::rules::Severity;
use crate::runner::WalkOptions;

pub const DEFAULT_CONFIG_FILES: &[&str] = &[".terralint.yml", ".terralint.yaml"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Per rule settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RuleConfig {
    /// `rule_name: false`
    Enabled(bool),
    /// `rule_name: { enabled: true, severity: warning }`
    Full {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        severity: Option<Severity>,
    },
}

impl RuleConfig {
    pub fn enabled(&self) -> Option<bool> {
        match self {
            RuleConfig::Enabled(enabled) => Some(*enabled),
            RuleConfig::Full { enabled, .. } => *enabled,
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            RuleConfig::Enabled(_) => None,
            RuleConfig::Full { severity, .. } => *severity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LintConfig {
    /// Tag keys every taggable resource must carry.
    pub tags: Vec<String>,
    /// Inspect module calls.
    pub module: bool,
    /// Input variable values, given as strings. Values starting with `[`
    /// or `{` are parsed as HCL.
    pub variables: IndexMap<String, String>,
    /// tfvars files, relative to the root module.
    pub varfile: Vec<String>,
    /// Sources of module calls that are not inspected.
    pub ignore_module: Vec<String>,
    /// `terraform.workspace`.
    pub workspace: String,
    pub rules: IndexMap<String, RuleConfig>,
}

impl Default for LintConfig {
    fn default() -> Self {
        LintConfig {
            tags: vec![],
            module: true,
            variables: IndexMap::new(),
            varfile: vec![],
            ignore_module: vec![],
            workspace: "default".to_string(),
            rules: IndexMap::new(),
        }
    }
}

impl LintConfig {
    pub fn from_yaml(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(LintConfig::default());
        }
        serde_yml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        LintConfig::from_yaml(&content)
            .map_err(|message| ConfigError::Parse { path: path.to_path_buf(), message })
    }

    /// Loads the first default config file found in `dir`, if any.
    pub fn load_default(dir: &Path) -> Result<Option<Self>, ConfigError> {
        for filename in DEFAULT_CONFIG_FILES {
            let path = dir.join(filename);
            if path.is_file() {
                debug!("loading config from {}", path.display());
                return LintConfig::from_file(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// Loads `config_path` when given, the default config file of `dir`
    /// otherwise, and falls back on the default configuration.
    pub fn load(config_path: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => LintConfig::from_file(path),
            None => Ok(LintConfig::load_default(dir)?.unwrap_or_default()),
        }
    }

    pub fn rule_config(&self, rule_name: &str) -> Option<&RuleConfig> {
        self.rules.get(rule_name)
    }

    /// Whether `rule_name` runs, given whether it is enabled by default.
    pub fn is_rule_enabled(&self, rule_name: &str, default: bool) -> bool {
        self.rule_config(rule_name).and_then(RuleConfig::enabled).unwrap_or(default)
    }

    /// Severity configured for `rule_name`, overriding the rule's own.
    pub fn rule_severity(&self, rule_name: &str) -> Option<Severity> {
        self.rule_config(rule_name).and_then(RuleConfig::severity)
    }

    pub fn set_rule_enabled(&mut self, rule_name: &str, enabled: bool) {
        let severity = self.rule_severity(rule_name);
        self.rules
            .insert(rule_name.to_string(), RuleConfig::Full { enabled: Some(enabled), severity });
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            inspect_modules: self.module,
            ignored_sources: self.ignore_module.clone(),
            environment: Environment { workspace: self.workspace.clone(), ..Default::default() },
        }
    }
}
