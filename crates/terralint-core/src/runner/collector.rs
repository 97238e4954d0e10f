use std::collections::HashSet;

use terralint_kit::types::{Diagnostic, Range};

use super::walker::CallerFrame;
use crate::rules::Severity;

/// A finding reported by a rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Issue {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub range: Range,
    /// Module calls leading to the instance the issue was found in, root
    /// first.
    pub callers: Vec<CallerFrame>,
    pub link: Option<String>,
}

/// Accumulates issues and configuration diagnostics over a whole lint run.
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Vec<Issue>,
    diagnostics: Vec<Diagnostic>,
}

impl IssueCollector {
    pub fn new() -> Self {
        IssueCollector::default()
    }

    pub fn push_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend_diagnostics(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Drops repeated issues and diagnostics, then sorts issues by file,
    /// line, column and rule name. The sort is stable: issues at the same
    /// place from the same rule keep their emission order, so instances of
    /// the same module stay in walk order.
    pub fn finalize(mut self) -> LintReport {
        let mut seen = HashSet::new();
        self.issues.retain(|issue| seen.insert(issue.clone()));
        let mut seen = HashSet::new();
        self.diagnostics.retain(|diagnostic| seen.insert(diagnostic.clone()));

        self.issues.sort_by(|a, b| {
            (&a.range.filename, a.range.start.line, a.range.start.column, &a.rule).cmp(&(
                &b.range.filename,
                b.range.start.line,
                b.range.start.column,
                &b.rule,
            ))
        });
        LintReport { issues: self.issues, diagnostics: self.diagnostics }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct LintReport {
    pub issues: Vec<Issue>,
    /// Parse, load, cycle and hard evaluation errors.
    pub diagnostics: Vec<Diagnostic>,
}

impl LintReport {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terralint_kit::types::SourceFile;

    fn issue(rule: &str, filename: &str, offset: usize) -> Issue {
        let file = SourceFile::new(filename, "a = 1\nb = 2\nc = 3\n");
        Issue {
            rule: rule.to_string(),
            severity: Severity::Error,
            message: "".to_string(),
            range: file.range_of(&(offset..offset + 1)),
            callers: vec![],
            link: None,
        }
    }

    #[test]
    fn issues_are_sorted_by_location_then_rule() {
        let mut collector = IssueCollector::new();
        collector.push_issue(issue("b_rule", "main.tf", 6));
        collector.push_issue(issue("a_rule", "main.tf", 6));
        collector.push_issue(issue("a_rule", "main.tf", 12));
        collector.push_issue(issue("z_rule", "main.tf", 0));
        collector.push_issue(issue("a_rule", "db.tf", 12));

        let report = collector.finalize();
        let order = report
            .issues
            .iter()
            .map(|i| format!("{}:{}:{}", i.range.filename, i.range.start.line, i.rule))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec!["db.tf:3:a_rule", "main.tf:1:z_rule", "main.tf:2:a_rule", "main.tf:2:b_rule", "main.tf:3:a_rule"]
        );
    }

    #[test]
    fn repeated_issues_are_reported_once() {
        let mut collector = IssueCollector::new();
        collector.push_issue(issue("a_rule", "main.tf", 0));
        collector.push_issue(issue("a_rule", "main.tf", 0));
        assert_eq!(collector.finalize().issues.len(), 1);
    }

    #[test]
    fn same_finding_through_other_callers_is_kept() {
        let mut collector = IssueCollector::new();
        let first = issue("a_rule", "app/main.tf", 0);
        let mut second = first.clone();
        second.callers.push(CallerFrame { name: "module.green".to_string(), range: first.range.clone() });
        collector.push_issue(first);
        collector.push_issue(second);
        assert_eq!(collector.finalize().issues.len(), 2);
    }

    #[test]
    fn repeated_diagnostics_are_reported_once() {
        let mut collector = IssueCollector::new();
        collector.push_diagnostic(diagnosed_error!("unknown variable 'x'"));
        collector.push_diagnostic(diagnosed_error!("unknown variable 'x'"));
        collector.push_diagnostic(diagnosed_error!("unknown variable 'y'"));
        assert_eq!(collector.finalize().diagnostics.len(), 2);
    }
}
