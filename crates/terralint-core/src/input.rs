//! Values of the root module's input variables.
//!
//! Sources, from lowest to highest precedence: `terraform.tfvars`,
//! `*.auto.tfvars` in lexical order, the `varfile` list of the
//! configuration, then its `variables` map. Declared defaults rank below
//! all of them and are applied when the root context is built.

use std::path::Path;

use terralint_kit::hcl::parser::parse_body;
use terralint_kit::indexmap::IndexMap;
use terralint_kit::types::{Diagnostic, SourceFile, Value};

use crate::config::LintConfig;
use crate::context::EvalContext;
use crate::eval::Evaluator;
use crate::module::{ModuleDefinition, SourceProvider};

pub const DEFAULT_VARFILE: &str = "terraform.tfvars";
pub const AUTO_VARFILE_SUFFIX: &str = ".auto.tfvars";

#[derive(Debug, Default)]
pub struct InputValues {
    pub values: IndexMap<String, Value>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn collect_root_inputs<P: SourceProvider + ?Sized>(provider: &P, config: &LintConfig) -> InputValues {
    let mut inputs = InputValues::default();
    let root = Path::new("");

    let mut varfiles = vec![];
    if provider.is_file(Path::new(DEFAULT_VARFILE)) {
        varfiles.push(DEFAULT_VARFILE.to_string());
    }
    match provider.list_files(root, AUTO_VARFILE_SUFFIX) {
        Ok(names) => varfiles.extend(names),
        Err(diag) => inputs.diagnostics.push(diag),
    }
    varfiles.extend(config.varfile.iter().cloned());

    for varfile in varfiles {
        let content = match provider.read_file(Path::new(&varfile)) {
            Ok(content) => content,
            Err(diag) => {
                inputs.diagnostics.push(diag);
                continue;
            }
        };
        debug!("reading input values from {}", varfile);
        let file = SourceFile::new(varfile, content);
        match evaluate_varfile(&file) {
            Ok(values) => inputs.values.extend(values),
            Err(diag) => inputs.diagnostics.push(diag),
        }
    }

    for (name, raw) in config.variables.iter() {
        match parse_variable_value(name, raw) {
            Ok(value) => {
                inputs.values.insert(name.clone(), value);
            }
            Err(diag) => inputs.diagnostics.push(diag),
        }
    }
    inputs
}

/// Evaluates the attributes of a tfvars file. Values must be constant.
pub fn evaluate_varfile(file: &SourceFile) -> Result<IndexMap<String, Value>, Diagnostic> {
    let body = parse_body(file.content()).map_err(|e| {
        Diagnostic::error(e.message().to_string())
            .with_code("parse")
            .with_range(file.range_of(&(e.location().offset()..e.location().offset())))
    })?;

    let module = ModuleDefinition::empty();
    let context = EvalContext::empty();
    let mut values = IndexMap::new();
    for attribute in body.attributes() {
        let value = Evaluator::new(&module, &context)
            .evaluate(&attribute.value, file)
            .map_err(Diagnostic::from)?;
        values.insert(attribute.key.as_str().to_string(), value);
    }
    Ok(values)
}

/// Interprets a `name=value` variable given on the command line or in the
/// `variables` map. Collections are written in HCL, anything else is taken
/// as a string.
pub fn parse_variable_value(name: &str, raw: &str) -> Result<Value, Diagnostic> {
    let trimmed = raw.trim_start();
    if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
        return Ok(Value::string(raw));
    }
    let file = SourceFile::new(format!("<value for var.{}>", name), format!("value = {}\n", raw));
    let mut values = evaluate_varfile(&file)?;
    values
        .shift_remove("value")
        .ok_or_else(|| diagnosed_error!("invalid value for variable '{}'", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalErrorKind;
    use crate::module::InMemoryProvider;
    use terralint_kit::indexmap::indexmap;

    #[test]
    fn later_sources_override_earlier_ones() {
        let provider = InMemoryProvider::new()
            .with_file("terraform.tfvars", "env = \"dev\"\nregion = \"eu-west-1\"\nsize = 1\n")
            .with_file("b.auto.tfvars", "size = 3\n")
            .with_file("a.auto.tfvars", "size = 2\nowner = \"ops\"\n")
            .with_file("prod.tfvars", "env = \"prod\"\n");
        let config = LintConfig {
            varfile: vec!["prod.tfvars".to_string()],
            variables: indexmap! { "region".to_string() => "us-east-1".to_string() },
            ..Default::default()
        };

        let inputs = collect_root_inputs(&provider, &config);
        assert!(inputs.diagnostics.is_empty());
        assert_eq!(
            inputs.values,
            indexmap! {
                "env".to_string() => Value::string("prod"),
                "region".to_string() => Value::string("us-east-1"),
                "size".to_string() => Value::integer(3),
                "owner".to_string() => Value::string("ops"),
            }
        );
    }

    #[test]
    fn collection_values_are_parsed_as_hcl() {
        assert_eq!(
            parse_variable_value("zones", r#"["a", "b"]"#).unwrap(),
            Value::list(vec![Value::string("a"), Value::string("b")])
        );
        assert_eq!(parse_variable_value("name", "web").unwrap(), Value::string("web"));
    }

    #[test]
    fn varfiles_cannot_reference_anything() {
        let file = SourceFile::new("bad.tfvars", "name = var.other\n");
        let diag = evaluate_varfile(&file).unwrap_err();
        assert_eq!(diag.code.as_deref(), Some(EvalErrorKind::Unresolvable.as_ref()));
        assert_eq!(diag.filename(), Some("bad.tfvars"));
    }

    #[test]
    fn missing_varfiles_are_reported() {
        let provider = InMemoryProvider::new();
        let config = LintConfig { varfile: vec!["missing.tfvars".to_string()], ..Default::default() };
        let inputs = collect_root_inputs(&provider, &config);
        assert_eq!(inputs.diagnostics.len(), 1);
    }
}
