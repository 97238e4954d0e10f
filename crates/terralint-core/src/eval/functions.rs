//! Builtin functions.
//!
//! Only pure functions are evaluated. Functions whose result depends on the
//! filesystem, the clock or randomness are registered without a runner and
//! always evaluate to an unknown value.

use terralint_kit::indexmap::IndexMap;
use terralint_kit::types::{Range, Value};

use super::operators::{to_integer, truthiness, values_equal};
use super::{EvalError, EvalErrorKind};

type FunctionRunner = fn(&FunctionSpecification, &[Value]) -> Result<Value, FunctionError>;

#[derive(Clone)]
pub struct FunctionSpecification {
    pub name: &'static str,
    pub documentation: &'static str,
    pub min_args: usize,
    /// `None` for variadic functions.
    pub max_args: Option<usize>,
    /// Whether the function is meaningful on collections holding unknown
    /// elements (`length`, `concat`, ...). Other functions return an unknown
    /// value as soon as any part of an argument is unknown.
    pub keeps_unknown_elements: bool,
    /// `None` for impure functions.
    pub runner: Option<FunctionRunner>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FunctionError {
    UnknownFunction,
    Arity(String),
    TypeMismatch(String),
    Invalid(String),
}

impl FunctionError {
    pub(crate) fn into_eval_error(self, name: &str, range: Range) -> EvalError {
        let (kind, message) = match self {
            FunctionError::UnknownFunction => {
                (EvalErrorKind::Unresolvable, format!("call to unknown function '{}'", name))
            }
            FunctionError::Arity(message) => (EvalErrorKind::InvalidOperation, message),
            FunctionError::TypeMismatch(message) => (EvalErrorKind::TypeMismatch, message),
            FunctionError::Invalid(message) => (EvalErrorKind::InvalidOperation, message),
        };
        EvalError::new(kind, format!("{}: {}", name, message), range)
    }
}

fn pure(
    name: &'static str,
    documentation: &'static str,
    min_args: usize,
    max_args: Option<usize>,
    runner: FunctionRunner,
) -> FunctionSpecification {
    FunctionSpecification {
        name,
        documentation,
        min_args,
        max_args,
        keeps_unknown_elements: false,
        runner: Some(runner),
    }
}

fn impure(name: &'static str, documentation: &'static str) -> FunctionSpecification {
    FunctionSpecification {
        name,
        documentation,
        min_args: 0,
        max_args: None,
        keeps_unknown_elements: false,
        runner: None,
    }
}

fn keeping_unknown_elements(mut spec: FunctionSpecification) -> FunctionSpecification {
    spec.keeps_unknown_elements = true;
    spec
}

lazy_static! {
    pub static ref FUNCTIONS: IndexMap<&'static str, FunctionSpecification> = {
        let specs = vec![
            pure("lower", "Converts a string to lowercase.", 1, Some(1), lower),
            pure("upper", "Converts a string to uppercase.", 1, Some(1), upper),
            pure("title", "Uppercases the first letter of each word.", 1, Some(1), title),
            pure("trimspace", "Removes leading and trailing whitespace.", 1, Some(1), trimspace),
            pure("join", "Joins the elements of lists with a separator.", 2, None, join),
            pure("split", "Splits a string on a separator.", 2, Some(2), split),
            pure("replace", "Replaces a substring or a /regex/ match.", 3, Some(3), replace),
            pure("format", "Formats values according to a format string.", 1, None, format),
            keeping_unknown_elements(pure("concat", "Concatenates lists.", 1, None, concat)),
            keeping_unknown_elements(pure("merge", "Merges maps, last one wins.", 0, None, merge)),
            keeping_unknown_elements(pure("length", "Length of a string or collection.", 1, Some(1), length)),
            keeping_unknown_elements(pure("keys", "Sorted keys of a map.", 1, Some(1), keys)),
            keeping_unknown_elements(pure("values", "Values of a map, sorted by key.", 1, Some(1), values)),
            keeping_unknown_elements(pure("lookup", "Value of a map key, or a default.", 2, Some(3), lookup)),
            pure("contains", "Whether a list holds a value.", 2, Some(2), contains),
            pure("coalesce", "First argument that is neither null nor empty.", 1, None, coalesce),
            pure("distinct", "Removes duplicate list elements.", 1, Some(1), distinct),
            pure("tostring", "Converts a value to a string.", 1, Some(1), tostring),
            pure("tonumber", "Converts a value to a number.", 1, Some(1), tonumber),
            pure("tobool", "Converts a value to a bool.", 1, Some(1), tobool),
            keeping_unknown_elements(pure("tolist", "Converts a collection to a list.", 1, Some(1), tolist)),
            pure("toset", "Converts a collection to a set.", 1, Some(1), toset),
            keeping_unknown_elements(pure("tomap", "Converts an object to a map.", 1, Some(1), tomap)),
            pure("max", "Greatest of a set of numbers.", 1, None, max),
            pure("min", "Smallest of a set of numbers.", 1, None, min),
            impure("timestamp", "Current time."),
            impure("plantimestamp", "Time of the plan."),
            impure("uuid", "Random UUID."),
            impure("bcrypt", "Salted hash."),
            impure("abspath", "Absolute filesystem path."),
            impure("file", "Reads a file."),
            impure("fileexists", "Whether a file exists."),
            impure("fileset", "Files matching a pattern."),
            impure("filebase64", "Reads a file as base64."),
            impure("filemd5", "MD5 of a file."),
            impure("filesha1", "SHA1 of a file."),
            impure("filesha256", "SHA256 of a file."),
            impure("filesha512", "SHA512 of a file."),
            impure("templatefile", "Renders a template file."),
        ];
        specs.into_iter().map(|spec| (spec.name, spec)).collect()
    };
}

pub fn is_builtin_function(name: &str) -> bool {
    FUNCTIONS.contains_key(name)
}

pub(crate) fn call(name: &str, args: Vec<Value>) -> Result<Value, FunctionError> {
    let spec = FUNCTIONS.get(name).ok_or(FunctionError::UnknownFunction)?;
    if args.len() < spec.min_args || spec.max_args.map(|max| args.len() > max).unwrap_or(false) {
        let expected = match spec.max_args {
            Some(max) if max == spec.min_args => format!("{}", max),
            Some(max) => format!("{} to {}", spec.min_args, max),
            None => format!("at least {}", spec.min_args),
        };
        return Err(FunctionError::Arity(format!(
            "expected {} argument(s), got {}",
            expected,
            args.len()
        )));
    }

    let Some(runner) = spec.runner else {
        return Ok(Value::unknown());
    };
    let unknown = if spec.keeps_unknown_elements {
        args.iter().any(Value::is_unknown)
    } else {
        args.iter().any(Value::contains_unknown)
    };
    if unknown {
        return Ok(Value::unknown());
    }
    runner(spec, &args)
}

fn string_arg(spec: &FunctionSpecification, args: &[Value], index: usize) -> Result<String, FunctionError> {
    args[index].as_scalar().map_err(|_| {
        FunctionError::TypeMismatch(format!(
            "argument {} of {} must be a string, got {}",
            index + 1,
            spec.name,
            args[index].type_name()
        ))
    })
}

fn list_arg<'v>(spec: &FunctionSpecification, args: &'v [Value], index: usize) -> Result<&'v Vec<Value>, FunctionError> {
    args[index].as_list().ok_or_else(|| {
        FunctionError::TypeMismatch(format!(
            "argument {} of {} must be a list, got {}",
            index + 1,
            spec.name,
            args[index].type_name()
        ))
    })
}

fn map_arg<'v>(
    spec: &FunctionSpecification,
    args: &'v [Value],
    index: usize,
) -> Result<&'v IndexMap<String, Value>, FunctionError> {
    args[index].as_map().ok_or_else(|| {
        FunctionError::TypeMismatch(format!(
            "argument {} of {} must be a map, got {}",
            index + 1,
            spec.name,
            args[index].type_name()
        ))
    })
}

fn number_arg(spec: &FunctionSpecification, args: &[Value], index: usize) -> Result<f64, FunctionError> {
    match &args[index] {
        Value::String(value) => value.trim().parse::<f64>().ok(),
        value => value.as_f64(),
    }
    .ok_or_else(|| {
        FunctionError::TypeMismatch(format!(
            "argument {} of {} must be a number, got {}",
            index + 1,
            spec.name,
            args[index].type_name()
        ))
    })
}

fn lower(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::string(string_arg(spec, args, 0)?.to_lowercase()))
}

fn upper(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::string(string_arg(spec, args, 0)?.to_uppercase()))
}

fn title(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let input = string_arg(spec, args, 0)?;
    let mut res = String::with_capacity(input.len());
    let mut at_word_start = true;
    for c in input.chars() {
        if at_word_start {
            res.extend(c.to_uppercase());
        } else {
            res.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_' || c == '\'');
    }
    Ok(Value::string(res))
}

fn trimspace(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::string(string_arg(spec, args, 0)?.trim()))
}

fn join(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let separator = string_arg(spec, args, 0)?;
    let mut parts = vec![];
    for index in 1..args.len() {
        for element in list_arg(spec, args, index)? {
            if element.is_null() {
                return Err(FunctionError::Invalid("cannot join a null element".into()));
            }
            parts.push(element.as_scalar().map_err(|_| {
                FunctionError::TypeMismatch(format!(
                    "list elements must be strings, got {}",
                    element.type_name()
                ))
            })?);
        }
    }
    Ok(Value::string(parts.join(&separator)))
}

fn split(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let separator = string_arg(spec, args, 0)?;
    let input = string_arg(spec, args, 1)?;
    let parts: Vec<Value> = if separator.is_empty() {
        input.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
        input.split(separator.as_str()).map(Value::string).collect()
    };
    Ok(Value::list(parts))
}

fn replace(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let input = string_arg(spec, args, 0)?;
    let search = string_arg(spec, args, 1)?;
    let replacement = string_arg(spec, args, 2)?;
    if search.len() > 1 && search.starts_with('/') && search.ends_with('/') {
        let pattern = regex::Regex::new(&search[1..search.len() - 1])
            .map_err(|e| FunctionError::Invalid(format!("invalid regular expression: {}", e)))?;
        return Ok(Value::string(pattern.replace_all(&input, replacement.as_str())));
    }
    Ok(Value::string(input.replace(&search, &replacement)))
}

fn format(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let template = string_arg(spec, args, 0)?;
    let mut values = args[1..].iter();
    let mut res = String::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            res.push(c);
            continue;
        }
        let verb = chars
            .next()
            .ok_or_else(|| FunctionError::Invalid("format string ends with '%'".into()))?;
        if verb == '%' {
            res.push('%');
            continue;
        }
        let value = values
            .next()
            .ok_or_else(|| FunctionError::Invalid(format!("not enough arguments for %{}", verb)))?;
        match verb {
            's' => res.push_str(&value.as_scalar().map_err(|_| {
                FunctionError::TypeMismatch(format!("%s needs a string, got {}", value.type_name()))
            })?),
            'd' => {
                let number = to_integer(value).ok_or_else(|| {
                    FunctionError::TypeMismatch(format!(
                        "%d needs an integer, got {}",
                        value.type_name()
                    ))
                })?;
                res.push_str(&number.to_string());
            }
            'v' => match value {
                Value::String(value) => res.push_str(value),
                value => res.push_str(&value.to_json().to_string()),
            },
            other => {
                return Err(FunctionError::Invalid(format!("unsupported format verb %{}", other)))
            }
        }
    }
    if values.next().is_some() {
        return Err(FunctionError::Invalid("too many arguments for format string".into()));
    }
    Ok(Value::string(res))
}

fn concat(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let mut res = vec![];
    for index in 0..args.len() {
        res.extend(list_arg(spec, args, index)?.iter().cloned());
    }
    Ok(Value::list(res))
}

fn merge(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let mut res = IndexMap::new();
    for index in 0..args.len() {
        if args[index].is_null() {
            continue;
        }
        for (key, value) in map_arg(spec, args, index)? {
            res.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::map(res))
}

fn length(_spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let length = match &args[0] {
        Value::String(value) => value.chars().count(),
        Value::List(values) => values.len(),
        Value::Map(entries) => entries.len(),
        other => {
            return Err(FunctionError::TypeMismatch(format!(
                "cannot take the length of a {} value",
                other.type_name()
            )))
        }
    };
    Ok(Value::integer(length as i64))
}

fn sorted_entries(entries: &IndexMap<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries = entries.iter().collect::<Vec<_>>();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn keys(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let entries = map_arg(spec, args, 0)?;
    Ok(Value::list(sorted_entries(entries).into_iter().map(|(k, _)| Value::string(k.clone())).collect()))
}

fn values(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let entries = map_arg(spec, args, 0)?;
    Ok(Value::list(sorted_entries(entries).into_iter().map(|(_, v)| v.clone()).collect()))
}

fn lookup(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let entries = map_arg(spec, args, 0)?;
    let key = string_arg(spec, args, 1)?;
    match (entries.get(&key), args.get(2)) {
        (Some(value), _) => Ok(value.clone()),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(FunctionError::Invalid(format!("map has no key '{}'", key))),
    }
}

fn contains(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let list = list_arg(spec, args, 0)?;
    Ok(Value::bool(list.iter().any(|element| values_equal(element, &args[1]))))
}

fn coalesce(_spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    args.iter()
        .find(|value| match value {
            Value::Null => false,
            Value::String(value) => !value.is_empty(),
            _ => true,
        })
        .cloned()
        .ok_or_else(|| FunctionError::Invalid("no non-null, non-empty-string arguments".into()))
}

fn dedup(values: &[Value]) -> Vec<Value> {
    let mut res: Vec<Value> = vec![];
    for value in values {
        if !res.iter().any(|seen| values_equal(seen, value)) {
            res.push(value.clone());
        }
    }
    res
}

fn distinct(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    Ok(Value::list(dedup(list_arg(spec, args, 0)?)))
}

fn tostring(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    if args[0].is_null() {
        return Ok(Value::null());
    }
    Ok(Value::string(string_arg(spec, args, 0)?))
}

fn tonumber(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    if args[0].is_null() {
        return Ok(Value::null());
    }
    if let Some(value) = to_integer(&args[0]) {
        return Ok(Value::integer(value));
    }
    Ok(Value::float(number_arg(spec, args, 0)?))
}

fn tobool(_spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    if args[0].is_null() {
        return Ok(Value::null());
    }
    truthiness(&args[0]).map(Value::bool).ok_or_else(|| {
        FunctionError::TypeMismatch(format!("cannot convert {} to bool", args[0].type_name()))
    })
}

fn tolist(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    if args[0].is_null() {
        return Ok(Value::null());
    }
    Ok(Value::list(list_arg(spec, args, 0)?.clone()))
}

fn toset(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    if args[0].is_null() {
        return Ok(Value::null());
    }
    let mut values = dedup(list_arg(spec, args, 0)?);
    // sets of strings iterate in lexical order
    if values.iter().all(|value| matches!(value, Value::String(_))) {
        values.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
    }
    Ok(Value::list(values))
}

fn tomap(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    if args[0].is_null() {
        return Ok(Value::null());
    }
    Ok(Value::map(map_arg(spec, args, 0)?.clone()))
}

fn numbers(spec: &FunctionSpecification, args: &[Value]) -> Result<Vec<f64>, FunctionError> {
    (0..args.len()).map(|index| number_arg(spec, args, index)).collect()
}

fn max(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let res = numbers(spec, args)?.into_iter().fold(f64::NEG_INFINITY, f64::max);
    Ok(Value::float(res))
}

fn min(spec: &FunctionSpecification, args: &[Value]) -> Result<Value, FunctionError> {
    let res = numbers(spec, args)?.into_iter().fold(f64::INFINITY, f64::min);
    Ok(Value::float(res))
}
