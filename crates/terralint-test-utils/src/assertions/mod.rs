//! Assertion macros for lint reports

/// Assert that a report holds no issue
#[macro_export]
macro_rules! assert_no_issues {
    ($report:expr) => {
        let report = &$report;
        let issues_str = report
            .issues
            .iter()
            .map(|i| format!("  - {} ({}): {}", i.rule, i.range, i.message))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(report.issues.is_empty(), "Expected no issues, but got:\n{}", issues_str);
    };
}

/// Assert that a report holds an issue whose message contains `pattern`
#[macro_export]
macro_rules! assert_issue {
    ($report:expr, $pattern:expr) => {
        let report = &$report;
        let pattern = $pattern;
        let found = report.issues.iter().any(|i| i.message.contains(pattern));
        if !found {
            let issues_str = report
                .issues
                .iter()
                .map(|i| format!("  - {}", i.message))
                .collect::<Vec<_>>()
                .join("\n");
            panic!(
                "Expected issue containing '{}', but got:\n{}",
                pattern,
                if issues_str.is_empty() { "  (no issues)".to_string() } else { issues_str }
            );
        }
    };
}

/// Assert that a report holds a diagnostic whose message contains `pattern`
#[macro_export]
macro_rules! assert_diagnostic {
    ($report:expr, $pattern:expr) => {
        let report = &$report;
        let pattern = $pattern;
        let errors_str =
            report.diagnostics.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("\n");
        assert!(
            report.diagnostics.iter().any(|d| d.message.contains(pattern)),
            "Expected diagnostic containing '{}', but got:\n{}",
            pattern,
            errors_str
        );
    };
}
