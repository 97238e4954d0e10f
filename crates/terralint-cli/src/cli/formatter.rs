//! Output formatting for lint reports

use std::io::{self, Write};

use ansi_term::{Colour, Style};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use terralint_core::kit::types::{Diagnostic, DiagnosticLevel, Range};
use terralint_core::module::Configuration;
use terralint_core::rules::Severity;
use terralint_core::runner::{Issue, LintReport};

/// Output format for lint results
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    clap::ValueEnum,
    AsRefStr,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum Format {
    /// Issues with their source lines (default)
    Pretty,
    /// One line per issue
    Compact,
    /// Machine-readable
    Json,
}

/// Rendering options of the pretty format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PrettyOptions {
    /// Emit ANSI escape sequences.
    pub color: bool,
}

pub trait OutputFormatter {
    /// Writes the issues of `report` to `out` and its diagnostics to `err`.
    /// `configuration` provides the source of the files ranges point into.
    fn format(
        &self,
        report: &LintReport,
        configuration: &Configuration,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<()>;
}

pub fn get_formatter(format: Format, options: PrettyOptions) -> Box<dyn OutputFormatter> {
    match format {
        Format::Pretty => Box::new(PrettyFormatter { options }),
        Format::Compact => Box::new(CompactFormatter),
        Format::Json => Box::new(JsonFormatter),
    }
}

pub struct PrettyFormatter {
    options: PrettyOptions,
}

impl PrettyFormatter {
    fn paint(&self, style: Style, text: &str) -> String {
        if self.options.color {
            style.paint(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn severity(&self, severity: Severity) -> String {
        let style = match severity {
            Severity::Error => Colour::Red.normal(),
            Severity::Warning => Colour::Yellow.normal(),
            Severity::Notice => Colour::White.bold(),
        };
        self.paint(style, &severity.to_string())
    }

    /// Prints the lines `range` spans, highlighting the part it covers.
    fn write_source(
        &self,
        range: &Range,
        configuration: &Configuration,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        writeln!(out, "  on {} line {}:", range.filename, range.start.line)?;
        let Some(file) = configuration.find_source(&range.filename) else {
            return writeln!(out, "   (source code not available)");
        };
        let src = file.bytes();
        for line in file.line_ranges() {
            if !line.overlaps(range) {
                continue;
            }
            let (before, highlighted, after) = line.partition_around(range);
            if highlighted.is_empty() {
                writeln!(out, "{:4}: {}", line.start.line, lossy(line.slice_bytes(src)))?;
            } else {
                writeln!(
                    out,
                    "{:4}: {}{}{}",
                    line.start.line,
                    lossy(before.slice_bytes(src)),
                    self.paint(Style::new().bold().underline(), &lossy(highlighted.slice_bytes(src))),
                    lossy(after.slice_bytes(src)),
                )?;
            }
        }
        Ok(())
    }

    fn write_issue(
        &self,
        issue: &Issue,
        configuration: &Configuration,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        writeln!(
            out,
            "{}: {} ({})\n",
            self.severity(issue.severity),
            self.paint(Style::new().bold(), &issue.message),
            issue.rule
        )?;
        self.write_source(&issue.range, configuration, out)?;

        if !issue.callers.is_empty() {
            writeln!(out, "\nCallers:")?;
            for caller in issue.callers.iter() {
                writeln!(out, "   {}", caller)?;
            }
        }
        if let Some(link) = &issue.link {
            writeln!(out, "\nReference: {}", link)?;
        }
        write!(out, "\n\n")
    }

    fn write_diagnostic(
        &self,
        diagnostic: &Diagnostic,
        configuration: &Configuration,
        err: &mut dyn Write,
    ) -> io::Result<()> {
        let label = match diagnostic.level {
            DiagnosticLevel::Error => self.paint(Colour::Red.normal(), "Error"),
            DiagnosticLevel::Warning => self.paint(Colour::Yellow.normal(), "Warning"),
            DiagnosticLevel::Note => self.paint(Colour::White.bold(), "Note"),
        };
        writeln!(err, "{}: {}\n", label, self.paint(Style::new().bold(), &diagnostic.message))?;
        if let Some(range) = &diagnostic.range {
            self.write_source(range, configuration, err)?;
        }
        if let Some(context) = &diagnostic.context {
            writeln!(err, "\n{}", context)?;
        }
        if let Some(documentation) = &diagnostic.documentation {
            writeln!(err, "\n{}", documentation)?;
        }
        writeln!(err)
    }
}

impl OutputFormatter for PrettyFormatter {
    fn format(
        &self,
        report: &LintReport,
        configuration: &Configuration,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<()> {
        if !report.issues.is_empty() {
            writeln!(out, "{} issue(s) found:\n", report.issues.len())?;
            for issue in report.issues.iter() {
                self.write_issue(issue, configuration, out)?;
            }
        }

        if !report.diagnostics.is_empty() {
            let errors = report.diagnostics.iter().filter(|d| d.is_error()).count();
            if errors > 0 {
                writeln!(err, "Failed to check the configuration. {} error(s) occurred:\n", errors)?;
            }
            for diagnostic in report.diagnostics.iter() {
                self.write_diagnostic(diagnostic, configuration, err)?;
            }
        }
        Ok(())
    }
}

pub struct CompactFormatter;

impl OutputFormatter for CompactFormatter {
    fn format(
        &self,
        report: &LintReport,
        _configuration: &Configuration,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<()> {
        for issue in report.issues.iter() {
            writeln!(
                out,
                "{}:{}:{}: {}: {} ({})",
                issue.range.filename,
                issue.range.start.line,
                issue.range.start.column,
                issue.severity,
                issue.message,
                issue.rule
            )?;
        }
        for diagnostic in report.diagnostics.iter() {
            match &diagnostic.range {
                Some(range) => writeln!(
                    err,
                    "{}:{}:{}: {}: {}",
                    range.filename, range.start.line, range.start.column, diagnostic.level, diagnostic.message
                )?,
                None => writeln!(err, "{}: {}", diagnostic.level, diagnostic.message)?,
            }
        }
        Ok(())
    }
}

pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonIssue<'a> {
    rule: &'a str,
    severity: Severity,
    message: &'a str,
    range: &'a Range,
    callers: Vec<String>,
    link: Option<&'a str>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    issues: Vec<JsonIssue<'a>>,
    errors: &'a [Diagnostic],
}

impl OutputFormatter for JsonFormatter {
    fn format(
        &self,
        report: &LintReport,
        _configuration: &Configuration,
        out: &mut dyn Write,
        _err: &mut dyn Write,
    ) -> io::Result<()> {
        let output = JsonReport {
            issues: report
                .issues
                .iter()
                .map(|issue| JsonIssue {
                    rule: &issue.rule,
                    severity: issue.severity,
                    message: &issue.message,
                    range: &issue.range,
                    callers: issue.callers.iter().map(|caller| caller.to_string()).collect(),
                    link: issue.link.as_deref(),
                })
                .collect(),
            errors: &report.diagnostics,
        };
        serde_json::to_writer_pretty(&mut *out, &output)?;
        writeln!(out)
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}
