#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate tracing;

#[macro_use]
pub extern crate terralint_kit as kit;

pub mod config;
pub mod context;
pub mod eval;
pub mod input;
pub mod module;
pub mod rules;
pub mod runner;

use std::path::Path;

use kit::indexmap::IndexMap;
use kit::types::{Diagnostic, Value};

use config::LintConfig;
use module::{Configuration, FileSystemProvider, ModuleLoader, SourceProvider};
use rules::Rule;
use runner::{LintReport, Runner};

/// Runs `rules` against an already loaded configuration.
///
/// Disabled rules are skipped. A rule returning an error does not prevent
/// the remaining rules from running: the error is recorded as a diagnostic
/// of the report.
pub fn lint(
    configuration: &Configuration,
    config: &LintConfig,
    inputs: &IndexMap<String, Value>,
    rules: &[Box<dyn Rule>],
) -> LintReport {
    let runner = Runner::new(configuration, config, inputs);
    for rule in rules.iter() {
        if !config.is_rule_enabled(rule.name(), rule.enabled()) {
            debug!("rule {} is disabled", rule.name());
            continue;
        }
        debug!("running rule {}", rule.name());
        if let Err(diagnostic) = rule.check(&runner) {
            warn!("rule {} failed: {}", rule.name(), diagnostic.message);
            runner.push_diagnostic(diagnostic.with_context(format!("rule {}", rule.name())));
        }
    }
    runner.into_report()
}

/// A loaded configuration and the report of linting it.
#[derive(Debug)]
pub struct LintOutcome {
    pub configuration: Configuration,
    pub report: LintReport,
}

/// Loads the configuration rooted at `dir`, collects its input values and
/// runs `rules` against it. Load, parse and input diagnostics are part of
/// the report.
pub fn lint_directory(dir: &Path, config: &LintConfig, rules: &[Box<dyn Rule>]) -> LintOutcome {
    lint_provider(&FileSystemProvider::new(dir), config, rules)
}

pub fn lint_provider<P: SourceProvider + ?Sized>(
    provider: &P,
    config: &LintConfig,
    rules: &[Box<dyn Rule>],
) -> LintOutcome {
    let loaded = ModuleLoader::new(provider).load();
    info!(
        "loaded {} module(s) from {}",
        loaded.configuration.modules.len(),
        provider.root_dir().display()
    );
    let inputs = input::collect_root_inputs(provider, config);

    let mut diagnostics: Vec<Diagnostic> = loaded.diagnostics;
    diagnostics.extend(inputs.diagnostics);

    let mut report = lint(&loaded.configuration, config, &inputs.values, rules);
    diagnostics.append(&mut report.diagnostics);
    report.diagnostics = diagnostics;
    LintOutcome { configuration: loaded.configuration, report }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::module::{Configuration, InMemoryProvider, ModuleLoader};

    /// Loads an in-memory configuration, failing on any error diagnostic.
    pub fn configuration(files: &[(&str, &str)]) -> Configuration {
        let mut provider = InMemoryProvider::new();
        for (path, content) in files.iter() {
            provider.add_file(path, *content);
        }
        let loaded = ModuleLoader::new(&provider).load();
        let errors: Vec<_> = loaded.diagnostics.iter().filter(|d| d.is_error()).collect();
        assert!(errors.is_empty(), "unexpected diagnostics: {:?}", errors);
        loaded.configuration
    }
}
