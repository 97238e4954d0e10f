//! Variable resolution contexts.
//!
//! One [`EvalContext`] is built per module instance and never changes
//! afterwards. It binds the module's input variables, which come from the
//! root input values or from the arguments of the calling `module` block,
//! and its local values, evaluated eagerly from their declarations.

use terralint_kit::indexmap::IndexMap;
use terralint_kit::types::Value;

use crate::eval::{EvalError, Evaluator};
use crate::module::{ModuleCall, ModuleDefinition};

/// A resolved name. Evaluation errors are kept and surface wherever the
/// name is referenced.
pub type Binding = Result<Value, EvalError>;

/// Values that do not depend on the configuration itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
    /// `path.cwd`.
    pub cwd: String,
    /// `terraform.workspace`.
    pub workspace: String,
}

impl Default for Environment {
    fn default() -> Self {
        Environment { cwd: ".".to_string(), workspace: "default".to_string() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EvalContext {
    variables: IndexMap<String, Binding>,
    locals: IndexMap<String, Binding>,
    environment: Environment,
}

impl EvalContext {
    pub fn empty() -> Self {
        EvalContext::default()
    }

    /// Builds the context of one instance of `module`. Locals are evaluated
    /// here, in declaration order; references between locals are resolved
    /// from their declarations, and cycles among them bind to a
    /// `CycleDetected` error.
    pub fn build(
        module: &ModuleDefinition,
        variables: IndexMap<String, Binding>,
        environment: &Environment,
    ) -> Self {
        let mut context =
            EvalContext { variables, locals: IndexMap::new(), environment: environment.clone() };

        let locals = {
            let mut evaluator = Evaluator::new(module, &context).resolving_locals();
            module
                .locals
                .iter()
                .map(|(name, attribute)| {
                    let binding = evaluator.evaluate_local(name, attribute, attribute.range.clone());
                    (name.clone(), binding)
                })
                .collect::<IndexMap<_, _>>()
        };
        context.locals = locals;
        context
    }

    pub fn variable(&self, name: &str) -> Option<&Binding> {
        self.variables.get(name)
    }

    pub fn local(&self, name: &str) -> Option<&Binding> {
        self.locals.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.variables.iter()
    }

    pub fn locals(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.locals.iter()
    }

    pub fn cwd(&self) -> &str {
        &self.environment.cwd
    }

    pub fn workspace(&self) -> &str {
        &self.environment.workspace
    }
}

/// Binds the input variables of the root module. Values given by the user
/// win over declared defaults. A variable with neither is not known until
/// apply.
pub fn bind_root_variables(
    module: &ModuleDefinition,
    inputs: &IndexMap<String, Value>,
) -> IndexMap<String, Binding> {
    let empty = EvalContext::empty();
    let mut bindings = IndexMap::new();
    for (name, variable) in module.variables.iter() {
        let binding = match (inputs.get(name), &variable.default) {
            (Some(value), _) => Ok(value.clone()),
            (None, Some(default)) => Evaluator::new(module, &empty).evaluate_attribute(default),
            (None, None) => Ok(Value::unknown()),
        };
        bindings.insert(name.clone(), binding);
    }
    bindings
}

/// Binds the input variables of `child` from the arguments of `call`,
/// evaluated in the calling module's context.
pub fn bind_call_arguments(
    parent: &ModuleDefinition,
    parent_context: &EvalContext,
    call: &ModuleCall,
    child: &ModuleDefinition,
) -> IndexMap<String, Binding> {
    let empty = EvalContext::empty();
    let mut bindings = IndexMap::new();
    for (name, variable) in child.variables.iter() {
        let binding = match (call.arguments.get(name), &variable.default) {
            (Some(argument), _) => {
                let value = Evaluator::new(parent, parent_context).evaluate_attribute(argument);
                // each instance of a multi-instance call may get a different value
                match value {
                    Ok(_) if call.has_count || call.has_for_each => Ok(Value::unknown()),
                    value => value,
                }
            }
            (None, Some(default)) => Evaluator::new(child, &empty).evaluate_attribute(default),
            (None, None) => Ok(Value::unknown()),
        };
        bindings.insert(name.clone(), binding);
    }
    for name in call.arguments.keys().filter(|name| !child.variables.contains_key(*name)) {
        debug!("module '{}' has no variable '{}', argument ignored", call.name, name);
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalErrorKind;
    use terralint_kit::indexmap::indexmap;
    use terralint_kit::indoc;
    use crate::test_helpers::configuration;

    #[test]
    fn locals_resolve_in_any_order() {
        let configuration = configuration(&[(
            "main.tf",
            indoc! {r#"
                locals {
                  name   = "${local.prefix}-${var.env}"
                  prefix = "app"
                }
                variable "env" {
                  default = "dev"
                }
            "#},
        )]);
        let module = configuration.root_module();
        let inputs = indexmap! { "env".to_string() => Value::string("prod") };
        let context =
            EvalContext::build(module, bind_root_variables(module, &inputs), &Environment::default());

        assert_eq!(context.local("name"), Some(&Ok(Value::string("app-prod"))));
        assert_eq!(context.variable("env"), Some(&Ok(Value::string("prod"))));
    }

    #[test]
    fn self_referencing_locals_are_cycles() {
        let configuration = configuration(&[(
            "main.tf",
            indoc! {r#"
                locals {
                  a = local.b
                  b = "${local.a}-x"
                  c = 1
                }
            "#},
        )]);
        let module = configuration.root_module();
        let context = EvalContext::build(module, IndexMap::new(), &Environment::default());

        let Some(Err(error)) = context.local("a") else { panic!("expected a cycle") };
        assert_eq!(error.kind, EvalErrorKind::CycleDetected);
        assert_eq!(error.message, "reference cycle detected: local.a -> local.b -> local.a");
        assert!(matches!(context.local("b"), Some(Err(_))));
        assert_eq!(context.local("c"), Some(&Ok(Value::integer(1))));
    }

    #[test]
    fn root_variables_without_values_are_unknown() {
        let configuration = configuration(&[("main.tf", "variable \"region\" {}\n")]);
        let module = configuration.root_module();
        let bindings = bind_root_variables(module, &IndexMap::new());
        assert_eq!(bindings.get("region"), Some(&Ok(Value::unknown())));
    }
}
