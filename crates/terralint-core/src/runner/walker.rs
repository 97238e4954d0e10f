//! Module instantiation.
//!
//! Expands the module call graph of a [`Configuration`] into a tree of
//! [`ModuleInstance`]s, one per call site, each with its own
//! [`EvalContext`]. Instances are stored in an arena in depth-first
//! pre-order: the root module first, then each call in declaration order.

use std::fmt::Display;

use terralint_kit::indexmap::IndexMap;
use terralint_kit::types::{Diagnostic, Range, Value};

use crate::context::{bind_call_arguments, bind_root_variables, Binding, EvalContext, Environment};
use crate::module::{Configuration, ModuleId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub usize);

/// One module call on the way from the root module to an instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CallerFrame {
    /// `module.<call name>`
    pub name: String,
    pub range: Range,
}

impl Display for CallerFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.name, self.range)
    }
}

#[derive(Clone, Debug)]
pub struct ModuleInstance {
    pub id: InstanceId,
    pub module: ModuleId,
    /// Calls from the root module to this instance, root first. Empty for
    /// the root module.
    pub callers: Vec<CallerFrame>,
    pub context: EvalContext,
    pub parent: Option<InstanceId>,
    pub children: Vec<InstanceId>,
}

impl ModuleInstance {
    /// `module.a.module.b` style address, empty for the root module.
    pub fn address(&self) -> String {
        self.callers.iter().map(|frame| frame.name.as_str()).collect::<Vec<_>>().join(".")
    }
}

#[derive(Clone, Debug, Default)]
pub struct WalkOptions {
    /// Instantiate module calls. When false only the root module is walked.
    pub inspect_modules: bool,
    /// Module sources whose calls are not instantiated.
    pub ignored_sources: Vec<String>,
    pub environment: Environment,
}

#[derive(Debug, Default)]
pub struct InstanceTree {
    pub instances: Vec<ModuleInstance>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn instantiate(
    configuration: &Configuration,
    inputs: &IndexMap<String, Value>,
    options: &WalkOptions,
) -> InstanceTree {
    let mut builder = TreeBuilder { configuration, options, tree: InstanceTree::default() };
    let root = configuration.root_module();
    if root.has_parse_errors {
        warn!("root module has parse errors, no module is inspected");
        return builder.tree;
    }
    let variables = bind_root_variables(root, inputs);
    let mut entering = vec![];
    builder.build(configuration.root, vec![], None, variables, &mut entering);
    builder.tree
}

struct TreeBuilder<'a> {
    configuration: &'a Configuration,
    options: &'a WalkOptions,
    tree: InstanceTree,
}

impl<'a> TreeBuilder<'a> {
    fn build(
        &mut self,
        module_id: ModuleId,
        callers: Vec<CallerFrame>,
        parent: Option<InstanceId>,
        variables: IndexMap<String, Binding>,
        entering: &mut Vec<ModuleId>,
    ) -> InstanceId {
        let configuration = self.configuration;
        let module = configuration.module(module_id);
        let id = InstanceId(self.tree.instances.len());
        debug!(
            "instantiating module {} ({})",
            if callers.is_empty() { "root".to_string() } else { callers_path(&callers) },
            module.display_dir()
        );

        let context = EvalContext::build(module, variables, &self.options.environment);
        self.tree.instances.push(ModuleInstance {
            id,
            module: module_id,
            callers: callers.clone(),
            context,
            parent,
            children: vec![],
        });

        if !self.options.inspect_modules {
            return id;
        }

        entering.push(module_id);
        for call in module.module_calls.iter() {
            let Some(target) = call.target else {
                continue;
            };
            if self.options.ignored_sources.iter().any(|source| source == &call.source) {
                debug!("module '{}' ({}) is ignored", call.name, call.source);
                continue;
            }

            let frame =
                CallerFrame { name: format!("module.{}", call.name), range: call.decl_range.clone() };
            if entering.contains(&target) {
                let mut chain = callers.clone();
                chain.push(frame);
                let message = format!(
                    "module call cycle detected: {} instantiates {} again",
                    callers_path(&chain),
                    configuration.module(target).display_dir()
                );
                warn!("{}", message);
                self.tree.diagnostics.push(
                    Diagnostic::error(message)
                        .with_code("cycle_detected")
                        .with_range(call.decl_range.clone()),
                );
                continue;
            }

            let child = configuration.module(target);
            if child.has_parse_errors {
                debug!("module '{}' has parse errors and is not inspected", call.name);
                continue;
            }
            let variables =
                bind_call_arguments(module, &self.tree.instances[id.0].context, call, child);
            let mut child_callers = callers.clone();
            child_callers.push(frame);

            let child_id = self.build(target, child_callers, Some(id), variables, entering);
            self.tree.instances[id.0].children.push(child_id);
        }
        entering.pop();
        id
    }
}

fn callers_path(callers: &[CallerFrame]) -> String {
    callers.iter().map(|frame| frame.name.as_str()).collect::<Vec<_>>().join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::configuration;
    use terralint_kit::indoc;

    fn options() -> WalkOptions {
        WalkOptions { inspect_modules: true, ..Default::default() }
    }

    #[test]
    fn builds_one_instance_per_call_site() {
        let configuration = configuration(&[
            (
                "main.tf",
                indoc! {r#"
                    module "blue" {
                      source = "./app"
                      name   = "blue"
                    }
                    module "green" {
                      source = "./app"
                      name   = "green"
                    }
                "#},
            ),
            ("app/main.tf", "variable \"name\" {}\nmodule \"db\" {\n  source = \"../db\"\n}\n"),
            ("db/main.tf", "locals {\n  engine = \"postgres\"\n}\n"),
        ]);
        let tree = instantiate(&configuration, &IndexMap::new(), &options());

        assert!(tree.diagnostics.is_empty());
        let addresses = tree.instances.iter().map(|i| i.address()).collect::<Vec<_>>();
        assert_eq!(
            addresses,
            vec!["", "module.blue", "module.blue.module.db", "module.green", "module.green.module.db"]
        );
        assert_eq!(tree.instances[1].context.variable("name"), Some(&Ok(Value::string("blue"))));
        assert_eq!(tree.instances[3].context.variable("name"), Some(&Ok(Value::string("green"))));
        assert_eq!(tree.instances[0].children, vec![InstanceId(1), InstanceId(3)]);
        assert_eq!(tree.instances[2].parent, Some(InstanceId(1)));
    }

    #[test]
    fn module_call_cycles_are_rejected() {
        let configuration = configuration(&[
            ("main.tf", "module \"a\" {\n  source = \"./a\"\n}\n"),
            ("a/main.tf", "module \"b\" {\n  source = \"../b\"\n}\n"),
            ("b/main.tf", "module \"a\" {\n  source = \"../a\"\n}\n"),
        ]);
        let tree = instantiate(&configuration, &IndexMap::new(), &options());

        assert_eq!(tree.instances.len(), 3);
        assert_eq!(tree.diagnostics.len(), 1);
        let diagnostic = &tree.diagnostics[0];
        assert_eq!(diagnostic.code.as_deref(), Some("cycle_detected"));
        assert_eq!(
            diagnostic.message,
            "module call cycle detected: module.a -> module.b -> module.a instantiates a again"
        );
        assert_eq!(diagnostic.filename(), Some("b/main.tf"));
    }

    #[test]
    fn module_inspection_can_be_disabled() {
        let configuration = configuration(&[
            ("main.tf", "module \"a\" {\n  source = \"./a\"\n}\n"),
            ("a/main.tf", ""),
        ]);
        let tree = instantiate(
            &configuration,
            &IndexMap::new(),
            &WalkOptions { inspect_modules: false, ..Default::default() },
        );
        assert_eq!(tree.instances.len(), 1);

        let tree = instantiate(
            &configuration,
            &IndexMap::new(),
            &WalkOptions {
                inspect_modules: true,
                ignored_sources: vec!["./a".to_string()],
                ..Default::default()
            },
        );
        assert_eq!(tree.instances.len(), 1);
    }

    #[test]
    fn caller_frames_render_with_their_range() {
        let configuration = configuration(&[
            ("main.tf", "module \"a\" {\n  source = \"./a\"\n}\n"),
            ("a/main.tf", ""),
        ]);
        let tree = instantiate(&configuration, &IndexMap::new(), &options());
        assert_eq!(tree.instances[1].callers[0].to_string(), "module.a at main.tf:1,1-7");
    }
}
