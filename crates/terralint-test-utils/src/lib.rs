pub mod assertions;
mod builder;
mod harness;

pub use builder::{ConfigurationBuilder, Loaded};
pub use harness::LintHarness;

pub use terralint_core::rules::{Rule, Severity};
pub use terralint_core::runner::{Issue, LintReport};
