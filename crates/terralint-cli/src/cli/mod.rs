use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use atty::Stream;
use clap::{ArgAction, Parser};
use terralint_core::config::LintConfig;
use terralint_core::runner::LintReport;
use tracing_subscriber::EnvFilter;

mod error;
mod formatter;

pub use error::CliError;
pub use formatter::{get_formatter, Format, OutputFormatter, PrettyOptions};

use crate::get_available_rules;

#[derive(Parser, PartialEq, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Opts {
    /// Root module directory
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Output format
    #[arg(long = "format", short = 'f', value_enum, default_value_t = Format::Pretty)]
    pub format: Format,

    /// Path to the config file (defaults to .terralint.yml in the root module)
    #[arg(long = "config", short = 'c')]
    pub config: Option<PathBuf>,

    /// Tag key every taggable resource must carry (repeatable)
    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,

    /// Input variable, as name=value (repeatable)
    #[arg(long = "var", action = ArgAction::Append)]
    pub variables: Vec<String>,

    /// tfvars file, relative to the root module (repeatable)
    #[arg(long = "var-file", action = ArgAction::Append)]
    pub varfiles: Vec<String>,

    /// Enable a rule (repeatable)
    #[arg(long = "enable-rule", action = ArgAction::Append)]
    pub enable_rules: Vec<String>,

    /// Disable a rule (repeatable)
    #[arg(long = "disable-rule", action = ArgAction::Append)]
    pub disable_rules: Vec<String>,

    /// Inspect module calls
    #[arg(long = "module", overrides_with = "no_module")]
    pub module: bool,

    /// Only inspect the root module
    #[arg(long = "no-module", overrides_with = "module")]
    pub no_module: bool,

    /// Source of module calls not to inspect (repeatable)
    #[arg(long = "ignore-module", action = ArgAction::Append)]
    pub ignore_modules: Vec<String>,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Exit with 0 even when issues are found
    #[arg(long = "force")]
    pub force: bool,

    /// Log level filter, overriding RUST_LOG
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_ISSUES: i32 = 2;

pub fn main() {
    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => e.exit(),
    };
    setup_logger(opts.log_level.as_deref());

    let code = match handle_lint_command(&opts) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Failed to lint {}: {}", opts.dir.display(), e);
            EXIT_ERROR
        }
    };
    process::exit(code);
}

fn setup_logger(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}

pub fn handle_lint_command(opts: &Opts) -> Result<i32, CliError> {
    if !opts.dir.is_dir() {
        return Err(CliError::NotADirectory(opts.dir.display().to_string()));
    }
    let config = load_config(opts)?;
    let rules = get_available_rules();
    info!("linting {} with {} rule(s)", opts.dir.display(), rules.len());

    let outcome = terralint_core::lint_directory(&opts.dir, &config, &rules);

    let options = PrettyOptions { color: !opts.no_color && atty::is(Stream::Stdout) };
    let formatter = get_formatter(opts.format, options);
    let stdout = io::stdout();
    let stderr = io::stderr();
    formatter.format(&outcome.report, &outcome.configuration, &mut stdout.lock(), &mut stderr.lock())?;
    io::stdout().flush()?;

    Ok(exit_code(&outcome.report, opts.force))
}

/// Loads the config file, then applies the command line overrides.
pub fn load_config(opts: &Opts) -> Result<LintConfig, CliError> {
    let mut config = LintConfig::load(opts.config.as_deref(), &opts.dir)?;
    apply_overrides(&mut config, opts)?;
    Ok(config)
}

pub fn apply_overrides(config: &mut LintConfig, opts: &Opts) -> Result<(), CliError> {
    if !opts.tags.is_empty() {
        config.tags = opts.tags.clone();
    }
    for variable in opts.variables.iter() {
        let (name, value) = parse_variable_flag(variable)?;
        config.variables.insert(name, value);
    }
    config.varfile.extend(opts.varfiles.iter().cloned());
    config.ignore_module.extend(opts.ignore_modules.iter().cloned());
    if opts.module {
        config.module = true;
    }
    if opts.no_module {
        config.module = false;
    }
    for rule in opts.enable_rules.iter() {
        config.set_rule_enabled(rule, true);
    }
    for rule in opts.disable_rules.iter() {
        config.set_rule_enabled(rule, false);
    }
    Ok(())
}

fn parse_variable_flag(flag: &str) -> Result<(String, String), CliError> {
    match flag.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::InvalidVariable(flag.to_string())),
    }
}

/// `0` when the run is clean, `1` when the configuration could not be fully
/// analyzed, `2` when issues were found. `force` turns both into `0`.
pub fn exit_code(report: &LintReport, force: bool) -> i32 {
    if force {
        EXIT_OK
    } else if report.has_errors() {
        EXIT_ERROR
    } else if report.has_issues() {
        EXIT_ISSUES
    } else {
        EXIT_OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terralint_core::rules::Severity;
    use test_case::test_case;

    fn parse(args: &[&str]) -> Opts {
        let mut argv = vec!["terralint"];
        argv.extend_from_slice(args);
        Opts::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let opts = parse(&[]);
        assert_eq!(opts.dir, PathBuf::from("."));
        assert_eq!(opts.format, Format::Pretty);
        assert!(!opts.force);
    }

    #[test]
    fn flags_override_the_config_file() {
        let opts = parse(&[
            "--tag",
            "Name",
            "--tag",
            "Env",
            "--var",
            "region=eu-west-1",
            "--var-file",
            "prod.tfvars",
            "--no-module",
            "--disable-rule",
            "aws_resource_tags_aws_db_snapshot",
            "--format",
            "json",
            "infra",
        ]);
        let mut config = LintConfig::from_yaml("tags: [Owner]\nvarfile: [base.tfvars]\n").unwrap();
        apply_overrides(&mut config, &opts).unwrap();

        assert_eq!(opts.dir, PathBuf::from("infra"));
        assert_eq!(opts.format, Format::Json);
        assert_eq!(config.tags, vec!["Name", "Env"]);
        assert_eq!(config.variables.get("region").map(String::as_str), Some("eu-west-1"));
        assert_eq!(config.varfile, vec!["base.tfvars", "prod.tfvars"]);
        assert!(!config.module);
        assert!(!config.is_rule_enabled("aws_resource_tags_aws_db_snapshot", true));
    }

    #[test_case("region" ; "missing equal sign")]
    #[test_case("=x" ; "missing name")]
    fn malformed_variables_are_rejected(flag: &str) {
        let opts = parse(&["--var", flag]);
        let mut config = LintConfig::default();
        assert!(matches!(
            apply_overrides(&mut config, &opts),
            Err(CliError::InvalidVariable(_))
        ));
    }

    #[test]
    fn values_may_contain_equal_signs() {
        assert_eq!(
            parse_variable_flag("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
    }

    fn report(issues: usize, error: bool) -> LintReport {
        let mut report = LintReport::default();
        for _ in 0..issues {
            report.issues.push(terralint_core::runner::Issue {
                rule: "rule".to_string(),
                severity: Severity::Warning,
                message: "message".to_string(),
                range: Default::default(),
                callers: vec![],
                link: None,
            });
        }
        if error {
            report.diagnostics.push(terralint_core::kit::types::Diagnostic::error("failed"));
        }
        report
    }

    #[test_case(0, false, false, EXIT_OK)]
    #[test_case(2, false, false, EXIT_ISSUES)]
    #[test_case(2, true, false, EXIT_ERROR)]
    #[test_case(0, true, false, EXIT_ERROR)]
    #[test_case(2, true, true, EXIT_OK)]
    fn exit_codes(issues: usize, error: bool, force: bool, expected: i32) {
        assert_eq!(exit_code(&report(issues, error), force), expected);
    }
}
