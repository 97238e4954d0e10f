use terralint_core::config::LintConfig;
use terralint_core::input::parse_variable_value;
use terralint_core::rules::Rule;
use terralint_core::runner::LintReport;
use terralint_kit::indexmap::IndexMap;
use terralint_kit::types::Value;

use crate::builder::ConfigurationBuilder;

/// Runs rules over an in-memory configuration.
///
/// Input values given with [`LintHarness::with_input`] bypass tfvars
/// discovery. Use [`LintHarness::run_with_discovery`] to exercise the
/// whole pipeline instead.
pub struct LintHarness {
    builder: ConfigurationBuilder,
    config: LintConfig,
    inputs: IndexMap<String, Value>,
}

impl LintHarness {
    pub fn new(builder: ConfigurationBuilder) -> Self {
        LintHarness { builder, config: LintConfig::default(), inputs: IndexMap::new() }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.config.tags = tags.iter().map(|tag| tag.to_string()).collect();
        self
    }

    pub fn with_config(mut self, config: LintConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_input(mut self, name: &str, value: Value) -> Self {
        self.inputs.insert(name.to_string(), value);
        self
    }

    /// Parses `raw` the way a `--var name=raw` flag would be.
    pub fn with_raw_input(self, name: &str, raw: &str) -> Self {
        match parse_variable_value(name, raw) {
            Ok(value) => self.with_input(name, value),
            Err(diag) => panic!("invalid value for {}: {}", name, diag),
        }
    }

    pub fn config(&self) -> &LintConfig {
        &self.config
    }

    pub fn run(&self, rules: Vec<Box<dyn Rule>>) -> LintReport {
        let configuration = self.builder.build();
        terralint_core::lint(&configuration, &self.config, &self.inputs, &rules)
    }

    pub fn run_with_discovery(&self, rules: Vec<Box<dyn Rule>>) -> LintReport {
        terralint_core::lint_provider(self.builder.provider(), &self.config, &rules).report
    }
}
