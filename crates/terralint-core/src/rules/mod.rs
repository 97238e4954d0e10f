//! The contract between the engine and lint rules.

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use terralint_kit::types::Diagnostic;

use crate::runner::Runner;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    AsRefStr,
    Display,
    EnumString,
    IntoStaticStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "ERROR")]
    Error,
    #[serde(alias = "WARNING", alias = "warn")]
    #[strum(to_string = "WARNING", serialize = "warn")]
    Warning,
    #[serde(alias = "NOTICE", alias = "info")]
    #[strum(to_string = "NOTICE", serialize = "info")]
    Notice,
}

/// A pluggable check.
///
/// The driver calls [`Rule::check`] once per enabled rule with a [`Runner`]
/// spanning the whole configuration. A rule walks the blocks it is
/// interested in and reports findings through the runner. Returning an
/// error aborts the rule, not the run: the error is reported as a
/// diagnostic and the remaining rules still execute.
pub trait Rule {
    fn name(&self) -> &str;

    /// Whether the rule runs when the configuration does not mention it.
    fn enabled(&self) -> bool;

    fn severity(&self) -> Severity;

    /// Documentation URL, empty when there is none.
    fn link(&self) -> &str {
        ""
    }

    fn check(&self, runner: &Runner) -> Result<(), Diagnostic>;
}

/// A named collection of rules shipped together, such as a provider's
/// rule set.
pub trait RuleSet {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn rules(&self) -> Vec<Box<dyn Rule>>;
}

impl std::fmt::Debug for dyn Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name())
            .field("enabled", &self.enabled())
            .field("severity", &self.severity())
            .finish()
    }
}
