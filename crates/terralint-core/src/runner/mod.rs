//! The facade rules interact with.
//!
//! A [`Runner`] owns the module instances of one configuration and the
//! issues reported against it. Rules ask it to walk blocks; each callback
//! receives a [`WalkContext`], the runner positioned at one module
//! instance, to evaluate expressions and report issues there.

pub mod collector;
pub mod walker;

use std::cell::RefCell;

use terralint_kit::indexmap::IndexMap;
use terralint_kit::types::{ConversionError, Diagnostic, FromValue, Range, Value};

use crate::config::LintConfig;
use crate::eval::{EvalError, EvalErrorKind, Evaluator};
use crate::module::{Attribute, Configuration, ModuleCall, ModuleDefinition, Resource};
use crate::rules::Rule;

pub use collector::{Issue, IssueCollector, LintReport};
pub use walker::{CallerFrame, InstanceId, ModuleInstance, WalkOptions};

/// An evaluated value and the source it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluated {
    pub value: Value,
    pub range: Range,
}

/// Why [`WalkContext::evaluate_expr`] produced no value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    /// The value is only known once the configuration is applied.
    #[error("value at {range} is not statically known")]
    Unevaluable { range: Range },
    /// The value is `null`, as if the attribute was not set.
    #[error("value at {range} is null")]
    NullValue { range: Range },
    #[error(transparent)]
    Evaluation(#[from] EvalError),
}

impl ExpressionError {
    /// Soft errors say nothing about the configuration being wrong.
    pub fn is_soft(&self) -> bool {
        matches!(self, ExpressionError::Unevaluable { .. } | ExpressionError::NullValue { .. })
    }

    pub fn range(&self) -> &Range {
        match self {
            ExpressionError::Unevaluable { range } | ExpressionError::NullValue { range } => range,
            ExpressionError::Evaluation(e) => &e.range,
        }
    }

    fn from_conversion(error: ConversionError, range: Range) -> Self {
        match error {
            ConversionError::Unknown => ExpressionError::Unevaluable { range },
            ConversionError::Null => ExpressionError::NullValue { range },
            ConversionError::TypeMismatch { expected, found } => {
                ExpressionError::Evaluation(EvalError::type_mismatch(
                    format!("expected {}, found {}", expected, found),
                    range,
                ))
            }
        }
    }
}

pub struct Runner<'a> {
    configuration: &'a Configuration,
    config: &'a LintConfig,
    instances: Vec<ModuleInstance>,
    collector: RefCell<IssueCollector>,
}

impl<'a> Runner<'a> {
    /// Instantiates every module of `configuration`. Module call cycles
    /// are recorded as diagnostics of the run.
    pub fn new(
        configuration: &'a Configuration,
        config: &'a LintConfig,
        inputs: &IndexMap<String, Value>,
    ) -> Self {
        let tree = walker::instantiate(configuration, inputs, &config.walk_options());
        let mut collector = IssueCollector::new();
        collector.extend_diagnostics(tree.diagnostics);
        Runner { configuration, config, instances: tree.instances, collector: RefCell::new(collector) }
    }

    pub fn configuration(&self) -> &Configuration {
        self.configuration
    }

    pub fn config(&self) -> &LintConfig {
        self.config
    }

    pub fn instances(&self) -> &[ModuleInstance] {
        &self.instances
    }

    /// Tag keys every taggable resource must carry.
    pub fn config_tags(&self) -> &[String] {
        &self.config.tags
    }

    /// Calls `callback` with every `attribute_name` attribute of every
    /// managed resource of type `resource_type`, in every module instance.
    /// Instances are visited root first, then depth first in call order.
    /// The first callback error stops the walk.
    pub fn walk_resource_attributes<F>(
        &self,
        resource_type: &str,
        attribute_name: &str,
        mut callback: F,
    ) -> Result<(), Diagnostic>
    where
        F: FnMut(&WalkContext<'_>, &Attribute) -> Result<(), Diagnostic>,
    {
        self.walk_resources(resource_type, |walk, resource| match resource.attributes.get(attribute_name) {
            Some(attribute) => callback(walk, attribute),
            None => Ok(()),
        })
    }

    pub fn walk_resources<F>(&self, resource_type: &str, mut callback: F) -> Result<(), Diagnostic>
    where
        F: FnMut(&WalkContext<'_>, &Resource) -> Result<(), Diagnostic>,
    {
        for instance in self.instances.iter() {
            let walk = self.positioned_at(instance);
            for resource in walk.module.resources_of_type(resource_type) {
                trace!("visiting {}{}", walk.address_prefix(), resource.address());
                callback(&walk, resource)?;
            }
        }
        Ok(())
    }

    pub fn walk_module_calls<F>(&self, mut callback: F) -> Result<(), Diagnostic>
    where
        F: FnMut(&WalkContext<'_>, &ModuleCall) -> Result<(), Diagnostic>,
    {
        for instance in self.instances.iter() {
            let walk = self.positioned_at(instance);
            for call in walk.module.module_calls.iter() {
                callback(&walk, call)?;
            }
        }
        Ok(())
    }

    /// Records an issue found outside of any module walk.
    pub fn emit_issue(&self, rule: &dyn Rule, message: impl Into<String>, range: Range) {
        self.record_issue(rule, message.into(), range, vec![]);
    }

    pub fn push_diagnostic(&self, diagnostic: Diagnostic) {
        self.collector.borrow_mut().push_diagnostic(diagnostic);
    }

    pub fn into_report(self) -> LintReport {
        self.collector.into_inner().finalize()
    }

    fn positioned_at<'r>(&'r self, instance: &'r ModuleInstance) -> WalkContext<'r> {
        WalkContext { runner: self, instance, module: self.configuration.module(instance.module) }
    }

    fn record_issue(&self, rule: &dyn Rule, message: String, range: Range, callers: Vec<CallerFrame>) {
        let severity = self.config.rule_severity(rule.name()).unwrap_or_else(|| rule.severity());
        let link = Some(rule.link().to_string()).filter(|link| !link.is_empty());
        debug!("{}: {} ({})", rule.name(), message, range);
        self.collector.borrow_mut().push_issue(Issue {
            rule: rule.name().to_string(),
            severity,
            message,
            range,
            callers,
            link,
        });
    }
}

/// The [`Runner`] positioned at one module instance.
pub struct WalkContext<'r> {
    runner: &'r Runner<'r>,
    instance: &'r ModuleInstance,
    module: &'r ModuleDefinition,
}

impl<'r> WalkContext<'r> {
    pub fn instance(&self) -> &ModuleInstance {
        self.instance
    }

    pub fn module(&self) -> &ModuleDefinition {
        self.module
    }

    pub fn callers(&self) -> &[CallerFrame] {
        &self.instance.callers
    }

    pub fn config_tags(&self) -> &[String] {
        self.runner.config_tags()
    }

    fn address_prefix(&self) -> String {
        match self.instance.address() {
            address if address.is_empty() => address,
            address => format!("{}.", address),
        }
    }

    pub fn evaluate_attribute(&self, attribute: &Attribute) -> Result<Evaluated, EvalError> {
        let value =
            Evaluator::new(self.module, &self.instance.context).evaluate_attribute(attribute)?;
        Ok(Evaluated { value, range: attribute.expr_range.clone() })
    }

    /// Evaluates `attribute` and converts the result into `T`.
    pub fn evaluate_expr<T: FromValue>(&self, attribute: &Attribute) -> Result<T, ExpressionError> {
        let evaluated = self.evaluate_attribute(attribute)?;
        T::from_value(&evaluated.value)
            .map_err(|e| ExpressionError::from_conversion(e, evaluated.range))
    }

    /// Runs `continuation` with the value of `result`. Unknown and null
    /// values are skipped silently. Evaluation errors are returned as
    /// diagnostics.
    pub fn ensure_no_error<T, F>(
        &self,
        result: Result<T, ExpressionError>,
        continuation: F,
    ) -> Result<(), Diagnostic>
    where
        F: FnOnce(T) -> Result<(), Diagnostic>,
    {
        match result {
            Ok(value) => continuation(value),
            Err(ExpressionError::Evaluation(e)) => Err(self.diagnostic(e)),
            Err(e) => {
                trace!("skipping {}", e);
                Ok(())
            }
        }
    }

    /// Records an issue with the caller chain of this instance.
    pub fn emit_issue(&self, rule: &dyn Rule, message: impl Into<String>, range: Range) {
        self.runner.record_issue(rule, message.into(), range, self.instance.callers.clone());
    }

    fn diagnostic(&self, error: EvalError) -> Diagnostic {
        let mut diagnostic = error.to_diagnostic();
        if !self.instance.callers.is_empty() {
            diagnostic = diagnostic.with_context(format!("in {}", self.instance.address()));
        }
        if error.kind == EvalErrorKind::Unresolvable {
            diagnostic = diagnostic
                .with_documentation("the referenced name is not declared in this module");
        }
        diagnostic
    }
}
