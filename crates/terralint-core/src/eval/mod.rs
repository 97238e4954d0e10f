//! Static evaluation of HCL expressions.
//!
//! The evaluator turns an [`Expression`] into a [`Value`] using only what is
//! known before apply: literals, input variables, local values and the
//! attributes of sibling resources. Anything else (computed resource
//! attributes, data sources, module outputs, `count`/`each`/`self`, impure
//! functions) evaluates to [`Value::Unknown`], and an unknown operand makes
//! every composite expression around it unknown as well. Genuine
//! configuration mistakes are reported as an [`EvalError`].

mod functions;
mod operators;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use strum::{AsRefStr, Display, IntoStaticStr};
use terralint_kit::hcl::expr::{Expression, TraversalOperator};
use terralint_kit::hcl::template::Element;
use terralint_kit::hcl::Span;
use terralint_kit::indexmap::IndexMap;
use terralint_kit::types::{Diagnostic, Range, SourceFile, Value};

use crate::context::EvalContext;
use crate::module::{Attribute, ModuleDefinition, ResourceMode};

pub use functions::{is_builtin_function, FunctionSpecification, FUNCTIONS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, AsRefStr, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EvalErrorKind {
    /// A name that is not declared in the evaluation scope.
    Unresolvable,
    /// A value of the wrong type for the operation or the requested shape.
    TypeMismatch,
    /// A reference that depends on itself.
    CycleDetected,
    /// Division by zero, out of range indexes, malformed arguments.
    InvalidOperation,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: String,
    pub range: Range,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, message: impl Into<String>, range: Range) -> Self {
        EvalError { kind, message: message.into(), range }
    }

    pub fn unresolvable(message: impl Into<String>, range: Range) -> Self {
        EvalError::new(EvalErrorKind::Unresolvable, message, range)
    }

    pub fn type_mismatch(message: impl Into<String>, range: Range) -> Self {
        EvalError::new(EvalErrorKind::TypeMismatch, message, range)
    }

    pub fn invalid_operation(message: impl Into<String>, range: Range) -> Self {
        EvalError::new(EvalErrorKind::InvalidOperation, message, range)
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.message.clone())
            .with_code(self.kind.as_ref())
            .with_range(self.range.clone())
    }
}

impl From<EvalError> for Diagnostic {
    fn from(err: EvalError) -> Self {
        err.to_diagnostic()
    }
}

/// Evaluates expressions of one module against one [`EvalContext`].
///
/// An evaluator is cheap and short lived: one is built per evaluation. It
/// memoizes the declarations it resolves along the way and tracks the chain
/// of declarations being resolved to report reference cycles.
pub struct Evaluator<'a> {
    module: &'a ModuleDefinition,
    context: &'a EvalContext,
    /// Resolve `local.*` from the declarations rather than the context. Used
    /// while the context itself is being built.
    lazy_locals: bool,
    active: Vec<String>,
    resolved: HashMap<String, Result<Value, EvalError>>,
    scopes: Vec<IndexMap<String, Value>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(module: &'a ModuleDefinition, context: &'a EvalContext) -> Self {
        Evaluator {
            module,
            context,
            lazy_locals: false,
            active: vec![],
            resolved: HashMap::new(),
            scopes: vec![],
        }
    }

    pub(crate) fn resolving_locals(mut self) -> Self {
        self.lazy_locals = true;
        self
    }

    pub fn evaluate_attribute(&mut self, attribute: &Attribute) -> Result<Value, EvalError> {
        let module = self.module;
        let Some(file) = module.file(attribute.filename()) else {
            return Err(EvalError::unresolvable(
                format!(
                    "{} is not a file of module {}",
                    attribute.filename(),
                    module.display_dir()
                ),
                attribute.range.clone(),
            ));
        };
        self.evaluate(&attribute.expr, file)
    }

    /// Evaluates a local value from its declaration. `range` is where the
    /// value is referenced from.
    pub(crate) fn evaluate_local(
        &mut self,
        name: &str,
        attribute: &Attribute,
        range: Range,
    ) -> Result<Value, EvalError> {
        self.guarded(format!("local.{}", name), range, |evaluator| {
            evaluator.evaluate_attribute(attribute)
        })
    }

    pub fn evaluate(&mut self, expr: &Expression, file: &SourceFile) -> Result<Value, EvalError> {
        let range = file.range_of_optional(expr.span());
        let value = match expr {
            Expression::Null(_) => Value::null(),
            Expression::Bool(value) => Value::bool(*value.value()),
            Expression::Number(number) => {
                let number = number.value();
                match (number.as_i64(), number.as_f64()) {
                    (Some(value), _) => Value::integer(value),
                    (None, Some(value)) => Value::float(value),
                    (None, None) => {
                        return Err(EvalError::invalid_operation("unsupported number literal", range))
                    }
                }
            }
            Expression::String(value) => Value::string(value.value().to_string()),
            Expression::Array(entries) => {
                let mut values = vec![];
                for entry in entries.iter() {
                    values.push(self.evaluate(entry, file)?);
                }
                Value::list(values)
            }
            Expression::Object(object) => {
                let mut entries = IndexMap::new();
                let mut unknown_key = false;
                for (key, value) in object.iter() {
                    let key = match key {
                        terralint_kit::hcl::expr::ObjectKey::Ident(ident) => {
                            Some(ident.as_str().to_string())
                        }
                        terralint_kit::hcl::expr::ObjectKey::Expression(key_expr) => {
                            let key_range = file.range_of_optional(key_expr.span());
                            match self.evaluate(key_expr, file)? {
                                Value::Unknown => None,
                                key => Some(key.as_scalar().map_err(|_| {
                                    EvalError::type_mismatch(
                                        format!("object key must be a string, got {}", key.type_name()),
                                        key_range,
                                    )
                                })?),
                            }
                        }
                    };
                    // the value is evaluated even under an unknown key so its errors surface
                    let value = self.evaluate(value.expr(), file)?;
                    match key {
                        Some(key) => {
                            entries.insert(key, value);
                        }
                        None => unknown_key = true,
                    }
                }
                // one unknown key leaves the whole set of keys unknown
                if unknown_key {
                    Value::unknown()
                } else {
                    Value::map(entries)
                }
            }
            Expression::StringTemplate(template) => {
                self.evaluate_template(template.iter().collect(), file)?
            }
            Expression::HeredocTemplate(heredoc) => {
                self.evaluate_template(heredoc.template.iter().collect(), file)?
            }
            Expression::Parenthesis(inner) => self.evaluate(inner.inner(), file)?,
            Expression::Variable(variable) => match self.scoped(variable.as_str()) {
                Some(value) => value,
                None => {
                    return Err(EvalError::unresolvable(
                        format!("unknown variable '{}'", variable.as_str()),
                        range,
                    ))
                }
            },
            Expression::Conditional(conditional) => {
                let condition = self.evaluate(&conditional.cond_expr, file)?;
                let true_value = self.evaluate(&conditional.true_expr, file)?;
                let false_value = self.evaluate(&conditional.false_expr, file)?;
                if condition.is_unknown() {
                    return Ok(Value::unknown());
                }
                match operators::truthiness(&condition) {
                    Some(true) => true_value,
                    Some(false) => false_value,
                    None => {
                        return Err(EvalError::type_mismatch(
                            format!("condition must be a bool, got {}", condition.type_name()),
                            range,
                        ))
                    }
                }
            }
            Expression::FuncCall(call) => {
                let name = call.name.name.as_str();
                let mut args = vec![];
                for arg in call.args.iter() {
                    args.push(self.evaluate(arg, file)?);
                }
                // provider functions run inside the provider
                if !call.name.namespace.is_empty() {
                    return Ok(Value::unknown());
                }
                functions::call(name, args).map_err(|e| e.into_eval_error(name, range.clone()))?
            }
            Expression::Traversal(traversal) => {
                let operators =
                    traversal.operators.iter().map(|op| op.value()).collect::<Vec<_>>();
                let (value, consumed) = match &traversal.expr {
                    Expression::Variable(root) => {
                        self.resolve_reference(root.as_str(), &operators, &range)?
                    }
                    expr => (self.evaluate(expr, file)?, 0),
                };
                self.apply_operators(value, &operators[consumed..], file, &range)?
            }
            Expression::UnaryOp(unary) => {
                let operand = self.evaluate(&unary.expr, file)?;
                operators::apply_unary(unary.operator.value(), operand)
                    .map_err(|(kind, message)| EvalError::new(kind, message, range.clone()))?
            }
            Expression::BinaryOp(binary) => {
                let lhs = self.evaluate(&binary.lhs_expr, file)?;
                let rhs = self.evaluate(&binary.rhs_expr, file)?;
                operators::apply_binary(binary.operator.value(), lhs, rhs)
                    .map_err(|(kind, message)| EvalError::new(kind, message, range.clone()))?
            }
            Expression::ForExpr(for_expr) => {
                let collection = self.evaluate(&for_expr.intro.collection_expr, file)?;
                let items: Vec<(Value, Value)> = match collection {
                    Value::Unknown => return Ok(Value::unknown()),
                    Value::List(values) => values
                        .into_iter()
                        .enumerate()
                        .map(|(index, value)| (Value::integer(index as i64), value))
                        .collect(),
                    Value::Map(entries) => {
                        entries.into_iter().map(|(key, value)| (Value::string(key), value)).collect()
                    }
                    other => {
                        return Err(EvalError::type_mismatch(
                            format!("for expression needs a collection, got {}", other.type_name()),
                            range,
                        ))
                    }
                };

                let key_var = for_expr.intro.key_var.as_ref().map(|ident| ident.as_str().to_string());
                let value_var = for_expr.intro.value_var.as_str().to_string();
                let mut list = vec![];
                let mut object: IndexMap<String, Value> = IndexMap::new();
                let mut unknown = false;

                for (key, value) in items {
                    let mut scope = IndexMap::new();
                    if let Some(key_var) = &key_var {
                        scope.insert(key_var.clone(), key);
                    }
                    scope.insert(value_var.clone(), value);
                    self.scopes.push(scope);
                    let res = self.evaluate_for_item(for_expr, file, &range);
                    self.scopes.pop();

                    match res? {
                        ForItem::Skipped => {}
                        ForItem::Unknown => unknown = true,
                        ForItem::Value(None, value) => list.push(value),
                        ForItem::Value(Some(key), value) => {
                            if for_expr.grouping {
                                if let Value::List(group) =
                                    object.entry(key).or_insert_with(|| Value::list(vec![]))
                                {
                                    group.push(value);
                                }
                            } else if object.contains_key(&key) {
                                return Err(EvalError::invalid_operation(
                                    format!("duplicate object key '{}', use '...' to group values", key),
                                    range,
                                ));
                            } else {
                                object.insert(key, value);
                            }
                        }
                    }
                }

                if unknown {
                    Value::unknown()
                } else if for_expr.key_expr.is_some() {
                    Value::map(object)
                } else {
                    Value::list(list)
                }
            }
        };
        trace!("evaluated {} to {}", range, value);
        Ok(value)
    }

    fn evaluate_for_item(
        &mut self,
        for_expr: &terralint_kit::hcl::expr::ForExpr,
        file: &SourceFile,
        range: &Range,
    ) -> Result<ForItem, EvalError> {
        let mut unknown = false;
        if let Some(cond) = &for_expr.cond {
            let keep = self.evaluate(&cond.expr, file)?;
            if keep.is_unknown() {
                unknown = true;
            } else {
                match operators::truthiness(&keep) {
                    Some(true) => {}
                    Some(false) => return Ok(ForItem::Skipped),
                    None => {
                        return Err(EvalError::type_mismatch(
                            format!("for condition must be a bool, got {}", keep.type_name()),
                            range.clone(),
                        ))
                    }
                }
            }
        }

        // key and value are still evaluated when the item is unknown so that
        // hard errors in them are not hidden
        let key = match &for_expr.key_expr {
            Some(key_expr) => match self.evaluate(key_expr, file)? {
                Value::Unknown => {
                    unknown = true;
                    None
                }
                key => Some(key.as_scalar().map_err(|_| {
                    EvalError::type_mismatch(
                        format!("object key must be a string, got {}", key.type_name()),
                        range.clone(),
                    )
                })?),
            },
            None => None,
        };
        let value = self.evaluate(&for_expr.value_expr, file)?;
        if unknown {
            return Ok(ForItem::Unknown);
        }
        Ok(ForItem::Value(key, value))
    }

    fn evaluate_template(
        &mut self,
        elements: Vec<&Element>,
        file: &SourceFile,
    ) -> Result<Value, EvalError> {
        // "${expr}" alone yields the value of expr, whatever its type
        if let [Element::Interpolation(interpolation)] = elements.as_slice() {
            return self.evaluate(&interpolation.expr, file);
        }

        let mut res = String::new();
        let mut unknown = false;
        for element in elements {
            match element {
                Element::Literal(literal) => res.push_str(literal.value()),
                Element::Interpolation(interpolation) => {
                    let value = self.evaluate(&interpolation.expr, file)?;
                    match value {
                        Value::Unknown => unknown = true,
                        Value::Null => {
                            return Err(EvalError::type_mismatch(
                                "null value cannot be interpolated",
                                file.range_of_optional(interpolation.expr.span()),
                            ))
                        }
                        value => match value.as_scalar() {
                            Ok(part) => res.push_str(&part),
                            Err(_) => {
                                return Err(EvalError::type_mismatch(
                                    format!("cannot interpolate a {} value", value.type_name()),
                                    file.range_of_optional(interpolation.expr.span()),
                                ))
                            }
                        },
                    }
                }
                // %{if}/%{for} directives are not evaluated statically
                Element::Directive(_) => unknown = true,
            }
        }
        if unknown {
            return Ok(Value::unknown());
        }
        Ok(Value::string(res))
    }

    fn scoped(&self, name: &str) -> Option<Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).cloned())
    }

    /// Resolves the named root of a traversal. Returns the value and the
    /// number of traversal operators the reference consumed.
    fn resolve_reference(
        &mut self,
        root: &str,
        operators: &[&TraversalOperator],
        range: &Range,
    ) -> Result<(Value, usize), EvalError> {
        if let Some(value) = self.scoped(root) {
            return Ok((value, 0));
        }
        let module = self.module;
        let all = operators.len();

        match root {
            "var" => {
                let name = required_attr_name(root, operators, 0, range)?;
                match self.context.variable(name) {
                    Some(Ok(value)) => Ok((value.clone(), 1)),
                    Some(Err(e)) => Err(e.clone()),
                    None => Err(EvalError::unresolvable(
                        format!("reference to undeclared input variable '{}'", name),
                        range.clone(),
                    )),
                }
            }
            "local" => {
                let name = required_attr_name(root, operators, 0, range)?;
                if self.lazy_locals {
                    let Some(attribute) = module.locals.get(name) else {
                        return Err(EvalError::unresolvable(
                            format!("reference to undeclared local value '{}'", name),
                            range.clone(),
                        ));
                    };
                    let value = self.evaluate_local(name, attribute, range.clone())?;
                    return Ok((value, 1));
                }
                match self.context.local(name) {
                    Some(Ok(value)) => Ok((value.clone(), 1)),
                    Some(Err(e)) => Err(e.clone()),
                    None => Err(EvalError::unresolvable(
                        format!("reference to undeclared local value '{}'", name),
                        range.clone(),
                    )),
                }
            }
            "path" => {
                let value = match required_attr_name(root, operators, 0, range)? {
                    "module" => module.display_dir(),
                    "root" => ".".to_string(),
                    "cwd" => self.context.cwd().to_string(),
                    other => {
                        return Err(EvalError::unresolvable(
                            format!("unsupported attribute 'path.{}'", other),
                            range.clone(),
                        ))
                    }
                };
                Ok((Value::string(value), 1))
            }
            "terraform" => match required_attr_name(root, operators, 0, range)? {
                "workspace" => Ok((Value::string(self.context.workspace()), 1)),
                other => Err(EvalError::unresolvable(
                    format!("unsupported attribute 'terraform.{}'", other),
                    range.clone(),
                )),
            },
            "count" | "each" | "self" => Ok((Value::unknown(), all)),
            "module" => {
                let name = required_attr_name(root, operators, 0, range)?;
                let Some(call) = module.find_module_call(name) else {
                    return Err(EvalError::unresolvable(
                        format!("reference to undeclared module '{}'", name),
                        range.clone(),
                    ));
                };
                if let (Some(output), Some(outputs)) = (attr_name(operators.get(1)), &call.output_names) {
                    if !outputs.iter().any(|o| o == output) {
                        return Err(EvalError::unresolvable(
                            format!("module '{}' has no output named '{}'", name, output),
                            range.clone(),
                        ));
                    }
                }
                Ok((Value::unknown(), all))
            }
            "data" => {
                let type_name = required_attr_name(root, operators, 0, range)?;
                let name = required_attr_name(root, operators, 1, range)?;
                match module.find_resource(ResourceMode::Data, type_name, name) {
                    Some(_) => Ok((Value::unknown(), all)),
                    None => Err(EvalError::unresolvable(
                        format!("reference to undeclared resource 'data.{}.{}'", type_name, name),
                        range.clone(),
                    )),
                }
            }
            type_name => {
                let name = required_attr_name(type_name, operators, 0, range)?;
                let Some(resource) = module.find_resource(ResourceMode::Managed, type_name, name)
                else {
                    return Err(EvalError::unresolvable(
                        format!("reference to undeclared resource '{}.{}'", type_name, name),
                        range.clone(),
                    ));
                };
                if resource.is_multi_instance() {
                    return Ok((Value::unknown(), all));
                }
                let Some(attribute) = attr_name(operators.get(1))
                    .filter(|attr| !RESOURCE_META_ARGUMENTS.contains(attr))
                    .and_then(|attr| resource.attributes.get(attr))
                else {
                    // attributes the configuration does not set are computed by the provider
                    return Ok((Value::unknown(), all));
                };
                let key = format!("{}.{}", resource.address(), attribute.name);
                let value = self.guarded(key, range.clone(), |evaluator| {
                    evaluator.evaluate_attribute(attribute)
                })?;
                Ok((value, 2))
            }
        }
    }

    /// Evaluates a declaration referenced from an expression, detecting
    /// reference cycles. Iterator variables of the referencing expression
    /// are not visible to the declaration.
    fn guarded<F>(&mut self, key: String, range: Range, evaluate: F) -> Result<Value, EvalError>
    where
        F: FnOnce(&mut Self) -> Result<Value, EvalError>,
    {
        if let Some(position) = self.active.iter().position(|active| active == &key) {
            let mut chain = self.active[position..].to_vec();
            chain.push(key);
            return Err(EvalError::new(
                EvalErrorKind::CycleDetected,
                format!("reference cycle detected: {}", chain.join(" -> ")),
                range,
            ));
        }
        if let Some(res) = self.resolved.get(&key) {
            return res.clone();
        }

        let scopes = std::mem::take(&mut self.scopes);
        self.active.push(key.clone());
        let res = evaluate(self);
        self.active.pop();
        self.scopes = scopes;

        self.resolved.insert(key, res.clone());
        res
    }

    fn apply_operators(
        &mut self,
        mut value: Value,
        operators: &[&TraversalOperator],
        file: &SourceFile,
        range: &Range,
    ) -> Result<Value, EvalError> {
        for (index, operator) in operators.iter().enumerate() {
            if value.is_unknown() {
                return Ok(Value::unknown());
            }
            value = match operator {
                TraversalOperator::GetAttr(name) => get_attr(value, name.as_str(), range)?,
                TraversalOperator::Index(key_expr) => {
                    let key = self.evaluate(key_expr, file)?;
                    if key.is_unknown() {
                        return Ok(Value::unknown());
                    }
                    index_value(value, &key, range)?
                }
                TraversalOperator::LegacyIndex(position) => {
                    index_value(value, &Value::integer(*position.value() as i64), range)?
                }
                TraversalOperator::AttrSplat(_) => {
                    // `.*` applies the attribute accesses that follow it to each element
                    let rest = &operators[index + 1..];
                    let end = rest
                        .iter()
                        .position(|op| !matches!(op, TraversalOperator::GetAttr(_)))
                        .unwrap_or(rest.len());
                    let splatted = self.splat(value, &rest[..end], file, range)?;
                    return self.apply_operators(splatted, &rest[end..], file, range);
                }
                TraversalOperator::FullSplat(_) => {
                    return self.splat(value, &operators[index + 1..], file, range);
                }
            };
        }
        Ok(value)
    }

    fn splat(
        &mut self,
        value: Value,
        operators: &[&TraversalOperator],
        file: &SourceFile,
        range: &Range,
    ) -> Result<Value, EvalError> {
        let items = match value {
            Value::Unknown => return Ok(Value::unknown()),
            Value::Null => vec![],
            Value::List(items) => items,
            other => vec![other],
        };
        let mut values = vec![];
        for item in items {
            values.push(self.apply_operators(item, operators, file, range)?);
        }
        Ok(Value::list(values))
    }
}

enum ForItem {
    Skipped,
    Unknown,
    Value(Option<String>, Value),
}

/// Resource arguments that are not part of the resource object.
const RESOURCE_META_ARGUMENTS: &[&str] =
    &["count", "for_each", "provider", "depends_on", "lifecycle", "provisioner"];

fn attr_name<'o>(operator: Option<&&'o TraversalOperator>) -> Option<&'o str> {
    match operator {
        Some(TraversalOperator::GetAttr(name)) => Some(name.as_str()),
        _ => None,
    }
}

fn required_attr_name<'o>(
    root: &str,
    operators: &[&'o TraversalOperator],
    index: usize,
    range: &Range,
) -> Result<&'o str, EvalError> {
    attr_name(operators.get(index)).ok_or_else(|| {
        EvalError::unresolvable(format!("invalid reference to '{}'", root), range.clone())
    })
}

fn get_attr(value: Value, name: &str, range: &Range) -> Result<Value, EvalError> {
    match value {
        Value::Map(mut entries) => entries.shift_remove(name).ok_or_else(|| {
            EvalError::unresolvable(format!("object has no attribute named '{}'", name), range.clone())
        }),
        Value::Null => Err(EvalError::type_mismatch(
            format!("attempt to get attribute '{}' from a null value", name),
            range.clone(),
        )),
        other => Err(EvalError::type_mismatch(
            format!("cannot access attribute '{}' of a {} value", name, other.type_name()),
            range.clone(),
        )),
    }
}

fn index_value(value: Value, key: &Value, range: &Range) -> Result<Value, EvalError> {
    match value {
        Value::List(mut items) => {
            let position = operators::to_integer(key).ok_or_else(|| {
                EvalError::type_mismatch(
                    format!("list index must be a number, got {}", key.type_name()),
                    range.clone(),
                )
            })?;
            if position < 0 || position as usize >= items.len() {
                return Err(EvalError::invalid_operation(
                    format!("index {} out of range for list of length {}", position, items.len()),
                    range.clone(),
                ));
            }
            Ok(items.swap_remove(position as usize))
        }
        Value::Map(mut entries) => {
            let name = key.as_scalar().map_err(|_| {
                EvalError::type_mismatch(
                    format!("map key must be a string, got {}", key.type_name()),
                    range.clone(),
                )
            })?;
            entries.shift_remove(&name).ok_or_else(|| {
                EvalError::invalid_operation(format!("map has no element for key '{}'", name), range.clone())
            })
        }
        Value::Null => Err(EvalError::type_mismatch("cannot index a null value", range.clone())),
        other => Err(EvalError::type_mismatch(
            format!("cannot index a {} value", other.type_name()),
            range.clone(),
        )),
    }
}
