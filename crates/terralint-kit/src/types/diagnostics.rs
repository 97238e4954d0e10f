use std::fmt::Display;

use super::range::Range;

/// Severity level for diagnostics
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Note,
    Warning,
    Error,
}

impl Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticLevel::Error => write!(f, "error"),
            DiagnosticLevel::Warning => write!(f, "warning"),
            DiagnosticLevel::Note => write!(f, "note"),
        }
    }
}

/// A configuration diagnostic: parse failures, load failures, module call
/// cycles, and hard evaluation errors surfaced by rules.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub code: Option<String>,
    pub range: Option<Range>,
    pub context: Option<String>,
    pub documentation: Option<String>,
}

impl Diagnostic {
    pub fn error_from_string(message: String) -> Diagnostic {
        Diagnostic {
            level: DiagnosticLevel::Error,
            message,
            code: None,
            range: None,
            context: None,
            documentation: None,
        }
    }

    pub fn warning_from_string(message: String) -> Diagnostic {
        Diagnostic { level: DiagnosticLevel::Warning, ..Diagnostic::error_from_string(message) }
    }

    // Builder methods
    pub fn error(message: impl Into<String>) -> Self {
        Self::error_from_string(message.into())
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::warning_from_string(message.into())
    }

    pub fn with_code(mut self, code: impl AsRef<str>) -> Self {
        self.code = Some(code.as_ref().to_string());
        self
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.level, DiagnosticLevel::Error)
    }

    pub fn filename(&self) -> Option<&str> {
        self.range.as_ref().map(|range| range.filename.as_str())
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut msg = String::new();

        if let Some(range) = &self.range {
            msg = format!("{} at {}:{}:{}", self.level, range.filename, range.start.line, range.start.column);
        }

        let level_with_code = if let Some(code) = &self.code {
            format!("{}[{}]", self.level, code)
        } else {
            format!("{}", self.level)
        };

        msg = format!(
            "{}{}{}: {}",
            msg,
            if !msg.is_empty() { "\n\t" } else { "" },
            level_with_code,
            self.message
        );
        if let Some(context) = &self.context {
            msg = format!("{}\n\t{}", msg, context);
        }
        write!(f, "{}", msg)
    }
}

impl From<Diagnostic> for String {
    fn from(diagnostic: Diagnostic) -> Self {
        diagnostic.to_string()
    }
}

impl From<String> for Diagnostic {
    fn from(message: String) -> Self {
        Diagnostic::error_from_string(message)
    }
}

impl From<&str> for Diagnostic {
    fn from(message: &str) -> Self {
        Diagnostic::error_from_string(message.to_string())
    }
}

impl From<std::io::Error> for Diagnostic {
    fn from(err: std::io::Error) -> Self {
        Diagnostic::error_from_string(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::range::SourceFile;

    #[test]
    fn display_includes_location_and_code() {
        let file = SourceFile::new("main.tf", "a = b\n");
        let diag = Diagnostic::error("unknown variable 'b'")
            .with_code("unresolvable")
            .with_range(file.range_of(&(4..5)));
        assert_eq!(
            diag.to_string(),
            "error at main.tf:1:5\n\terror[unresolvable]: unknown variable 'b'"
        );
    }

    #[test]
    fn diagnosed_error_macro_builds_errors() {
        let diag = diagnosed_error!("cycle through {}", "module.a");
        assert!(diag.is_error());
        assert_eq!(diag.message, "cycle through module.a");
    }
}
