use terralint_kit::hcl::expr::{BinaryOperator, UnaryOperator};
use terralint_kit::types::Value;

use super::EvalErrorKind;

pub(crate) type OperationResult = Result<Value, (EvalErrorKind, String)>;

/// Bools, and the strings `"true"`/`"false"` Terraform converts to them.
pub(crate) fn truthiness(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(value) => Some(*value),
        Value::String(value) if value == "true" => Some(true),
        Value::String(value) if value == "false" => Some(false),
        _ => None,
    }
}

pub(crate) fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(value) => Some(*value),
        Value::Float(value) if value.fract() == 0.0 => Some(*value as i64),
        Value::String(value) => value.trim().parse::<i64>().ok(),
        _ => None,
    }
}

enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(value) => *value as f64,
            Number::Float(value) => *value,
        }
    }
}

fn to_number(value: &Value) -> Option<Number> {
    match value {
        Value::Integer(value) => Some(Number::Integer(*value)),
        Value::Float(value) => Some(Number::Float(*value)),
        Value::String(value) => {
            let value = value.trim();
            value
                .parse::<i64>()
                .map(Number::Integer)
                .ok()
                .or_else(|| value.parse::<f64>().ok().map(Number::Float))
        }
        _ => None,
    }
}

fn expect_number(operator: &str, value: &Value) -> Result<Number, (EvalErrorKind, String)> {
    to_number(value).ok_or_else(|| {
        (
            EvalErrorKind::TypeMismatch,
            format!("operator {} needs numbers, got {}", operator, value.type_name()),
        )
    })
}

fn expect_bool(operator: &str, value: &Value) -> Result<bool, (EvalErrorKind, String)> {
    truthiness(value).ok_or_else(|| {
        (
            EvalErrorKind::TypeMismatch,
            format!("operator {} needs bools, got {}", operator, value.type_name()),
        )
    })
}

/// Structural equality. Numbers compare by value across integer and float.
pub(crate) fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            match (to_number(lhs), to_number(rhs)) {
                (Some(Number::Integer(a)), Some(Number::Integer(b))) => a == b,
                (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                _ => false,
            }
        }
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, a)| b.get(key).map(|b| values_equal(a, b)).unwrap_or(false))
        }
        (a, b) => a == b,
    }
}

pub(crate) fn apply_unary(operator: &UnaryOperator, operand: Value) -> OperationResult {
    if operand.is_unknown() {
        return Ok(Value::unknown());
    }
    match operator {
        UnaryOperator::Neg => match expect_number("-", &operand)? {
            Number::Integer(value) => Ok(value
                .checked_neg()
                .map(Value::integer)
                .unwrap_or_else(|| Value::float(-(value as f64)))),
            Number::Float(value) => Ok(Value::float(-value)),
        },
        UnaryOperator::Not => Ok(Value::bool(!expect_bool("!", &operand)?)),
    }
}

pub(crate) fn apply_binary(operator: &BinaryOperator, lhs: Value, rhs: Value) -> OperationResult {
    if lhs.is_unknown() || rhs.is_unknown() {
        return Ok(Value::unknown());
    }
    let symbol = operator.as_str();
    match operator {
        BinaryOperator::Eq => Ok(Value::bool(values_equal(&lhs, &rhs))),
        BinaryOperator::NotEq => Ok(Value::bool(!values_equal(&lhs, &rhs))),
        BinaryOperator::And => {
            Ok(Value::bool(expect_bool(symbol, &lhs)? && expect_bool(symbol, &rhs)?))
        }
        BinaryOperator::Or => {
            Ok(Value::bool(expect_bool(symbol, &lhs)? || expect_bool(symbol, &rhs)?))
        }
        BinaryOperator::Less
        | BinaryOperator::LessEq
        | BinaryOperator::Greater
        | BinaryOperator::GreaterEq => {
            let lhs = expect_number(symbol, &lhs)?.as_f64();
            let rhs = expect_number(symbol, &rhs)?.as_f64();
            Ok(Value::bool(match operator {
                BinaryOperator::Less => lhs < rhs,
                BinaryOperator::LessEq => lhs <= rhs,
                BinaryOperator::Greater => lhs > rhs,
                _ => lhs >= rhs,
            }))
        }
        BinaryOperator::Plus | BinaryOperator::Minus | BinaryOperator::Mul => {
            let lhs = expect_number(symbol, &lhs)?;
            let rhs = expect_number(symbol, &rhs)?;
            if let (Number::Integer(a), Number::Integer(b)) = (&lhs, &rhs) {
                let res = match operator {
                    BinaryOperator::Plus => a.checked_add(*b),
                    BinaryOperator::Minus => a.checked_sub(*b),
                    _ => a.checked_mul(*b),
                };
                if let Some(res) = res {
                    return Ok(Value::integer(res));
                }
            }
            let (a, b) = (lhs.as_f64(), rhs.as_f64());
            Ok(Value::float(match operator {
                BinaryOperator::Plus => a + b,
                BinaryOperator::Minus => a - b,
                _ => a * b,
            }))
        }
        BinaryOperator::Div => {
            let lhs = expect_number(symbol, &lhs)?.as_f64();
            let rhs = expect_number(symbol, &rhs)?.as_f64();
            if rhs == 0.0 {
                return Err((EvalErrorKind::InvalidOperation, "divide by zero".to_string()));
            }
            Ok(Value::float(lhs / rhs))
        }
        BinaryOperator::Mod => match (expect_number(symbol, &lhs)?, expect_number(symbol, &rhs)?) {
            (_, Number::Integer(0)) => {
                Err((EvalErrorKind::InvalidOperation, "modulo by zero".to_string()))
            }
            (Number::Integer(a), Number::Integer(b)) => match a.checked_rem(b) {
                Some(res) => Ok(Value::integer(res)),
                // only i64::MIN % -1 overflows, its remainder is 0
                None => Ok(Value::integer(0)),
            },
            (a, b) => {
                if b.as_f64() == 0.0 {
                    return Err((EvalErrorKind::InvalidOperation, "modulo by zero".to_string()));
                }
                Ok(Value::float(a.as_f64() % b.as_f64()))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terralint_kit::indexmap::indexmap;
    use test_case::test_case;

    #[test_case(BinaryOperator::Plus, Value::integer(2), Value::integer(3), Value::integer(5) ; "integer addition")]
    #[test_case(BinaryOperator::Plus, Value::string("2"), Value::integer(3), Value::integer(5) ; "numeric string")]
    #[test_case(BinaryOperator::Div, Value::integer(7), Value::integer(2), Value::float(3.5) ; "division")]
    #[test_case(BinaryOperator::Div, Value::integer(6), Value::integer(2), Value::integer(3) ; "integral division")]
    #[test_case(BinaryOperator::Mod, Value::integer(7), Value::integer(4), Value::integer(3) ; "modulo")]
    #[test_case(BinaryOperator::Eq, Value::integer(1), Value::float(1.0), Value::bool(true) ; "numeric equality")]
    #[test_case(BinaryOperator::NotEq, Value::string("a"), Value::string("b"), Value::bool(true) ; "inequality")]
    #[test_case(BinaryOperator::And, Value::bool(true), Value::string("false"), Value::bool(false) ; "and")]
    #[test_case(BinaryOperator::GreaterEq, Value::integer(3), Value::float(2.5), Value::bool(true) ; "comparison")]
    fn binary_operations(operator: BinaryOperator, lhs: Value, rhs: Value, expected: Value) {
        assert_eq!(apply_binary(&operator, lhs, rhs).unwrap(), expected);
    }

    #[test]
    fn unknown_operands_make_unknown_results() {
        let res = apply_binary(&BinaryOperator::Plus, Value::unknown(), Value::string("x"));
        assert_eq!(res.unwrap(), Value::unknown());
        assert_eq!(apply_unary(&UnaryOperator::Not, Value::unknown()).unwrap(), Value::unknown());
    }

    #[test]
    fn invalid_operations() {
        let (kind, _) = apply_binary(&BinaryOperator::Div, Value::integer(1), Value::integer(0))
            .unwrap_err();
        assert_eq!(kind, EvalErrorKind::InvalidOperation);

        let (kind, message) =
            apply_binary(&BinaryOperator::Minus, Value::bool(true), Value::integer(1)).unwrap_err();
        assert_eq!(kind, EvalErrorKind::TypeMismatch);
        assert_eq!(message, "operator - needs numbers, got bool");
    }

    #[test]
    fn maps_compare_structurally() {
        let a = Value::map(indexmap! { "a".to_string() => Value::integer(1) });
        let b = Value::map(indexmap! { "a".to_string() => Value::float(1.0) });
        assert!(values_equal(&a, &b));
    }
}
