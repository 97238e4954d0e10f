use terralint_kit::indexmap::{indexmap, IndexMap};
use terralint_kit::indoc;
use terralint_kit::types::Value;
use test_case::test_case;

use super::{EvalError, EvalErrorKind, Evaluator};
use crate::context::{bind_root_variables, EvalContext, Environment};
use crate::test_helpers::configuration;

const DECLARATIONS: &str = indoc! {r#"
    variable "env" {
      default = "prod"
    }

    variable "tags" {
      default = { Team = "core" }
    }

    variable "subnets" {
      default = [{ name = "a", cidr = "10.0.0.0/24" }, { name = "b", cidr = "10.0.1.0/24" }]
    }

    variable "unset" {}

    locals {
      prefix = "app-${var.env}"
    }

    resource "aws_s3_bucket" "logs" {
      bucket = "${local.prefix}-logs"
    }

    resource "aws_instance" "web" {
      count = 2
      ami   = "ami-123"
    }

    resource "aws_iam_role" "a" {
      name = aws_iam_role.b.name
    }

    resource "aws_iam_role" "b" {
      name = aws_iam_role.a.name
    }

    data "aws_caller_identity" "current" {}

    module "network" {
      source = "./network"
    }
"#};

/// Evaluates `expr` as the `value` attribute of a resource declared next
/// to [`DECLARATIONS`].
fn evaluate(expr: &str) -> Result<Value, EvalError> {
    let main = format!("{}\nresource \"test\" \"subject\" {{\n  value = {}\n}}\n", DECLARATIONS, expr);
    let configuration = configuration(&[
        ("main.tf", main.as_str()),
        ("network/main.tf", "output \"vpc_id\" {\n  value = \"x\"\n}\n"),
    ]);
    let module = configuration.root_module();
    let context = EvalContext::build(
        module,
        bind_root_variables(module, &IndexMap::new()),
        &Environment::default(),
    );
    let resource = module.resources.iter().find(|r| r.type_name == "test").unwrap();
    Evaluator::new(module, &context).evaluate_attribute(&resource.attributes["value"])
}

fn strings(values: &[&str]) -> Value {
    Value::list(values.iter().map(|v| Value::string(*v)).collect())
}

#[test_case(r#""hello""#, Value::string("hello") ; "string")]
#[test_case("42", Value::integer(42) ; "integer")]
#[test_case("1.5", Value::float(1.5) ; "float")]
#[test_case("null", Value::null() ; "null")]
#[test_case(r#"[1, "a", true]"#, Value::list(vec![Value::integer(1), Value::string("a"), Value::bool(true)]) ; "list")]
#[test_case(r#""${var.env}-${1 + 1}""#, Value::string("prod-2") ; "template")]
#[test_case(r#""${var.tags}""#, Value::map(indexmap! { "Team".to_string() => Value::string("core") }) ; "lone interpolation keeps the type")]
#[test_case("local.prefix", Value::string("app-prod") ; "local")]
#[test_case("aws_s3_bucket.logs.bucket", Value::string("app-prod-logs") ; "sibling resource attribute")]
#[test_case(r#"var.env == "prod" ? 3 : 1"#, Value::integer(3) ; "conditional")]
#[test_case("!(1 > 2) && true", Value::bool(true) ; "logic")]
#[test_case("-(2 * 3) % 4", Value::integer(-2) ; "arithmetic")]
#[test_case("(-9223372036854775807 - 1) % -1", Value::integer(0) ; "overflowing remainder")]
#[test_case("var.subnets[*].name", strings(&["a", "b"]) ; "attribute splat")]
#[test_case("var.subnets[1].cidr", Value::string("10.0.1.0/24") ; "index")]
#[test_case("var.subnets.0.name", Value::string("a") ; "legacy index")]
#[test_case(r#"var.tags["Team"]"#, Value::string("core") ; "map index")]
#[test_case("[for s in var.subnets : upper(s.name)]", strings(&["A", "B"]) ; "for list")]
#[test_case(r#"{ for s in var.subnets : s.name => s.cidr if s.name != "a" }"#, Value::map(indexmap! { "b".to_string() => Value::string("10.0.1.0/24") }) ; "for object")]
#[test_case(r#"merge(var.tags, { Env = var.env })"#, Value::map(indexmap! { "Team".to_string() => Value::string("core"), "Env".to_string() => Value::string("prod") }) ; "function")]
#[test_case("path.module", Value::string(".") ; "path")]
#[test_case("terraform.workspace", Value::string("default") ; "workspace")]
#[test_case("<<EOT\nhello ${var.env}\nEOT\n", Value::string("hello prod\n") ; "heredoc")]
fn evaluates_statically_known_expressions(expr: &str, expected: Value) {
    assert_eq!(evaluate(expr).unwrap(), expected);
}

#[test_case("var.unset" ; "root variable without value")]
#[test_case("aws_instance.web[0].ami" ; "multi instance resource")]
#[test_case("aws_s3_bucket.logs.arn" ; "computed attribute")]
#[test_case("data.aws_caller_identity.current.account_id" ; "data source")]
#[test_case("module.network.vpc_id" ; "module output")]
#[test_case("each.key" ; "each")]
#[test_case(r#""arn:${aws_s3_bucket.logs.arn}/*""# ; "template with unknown part")]
#[test_case("upper(aws_s3_bucket.logs.arn)" ; "function of unknown")]
#[test_case("aws_s3_bucket.logs.arn == \"x\" ? 1 : 2" ; "conditional on unknown")]
#[test_case("[for s in aws_s3_bucket.logs.grants : s]" ; "for over unknown")]
#[test_case("{ (aws_s3_bucket.logs.arn) = 1 }" ; "unknown object key")]
#[test_case(r#""%{ if var.env == "prod" }x%{ endif }""# ; "template directive")]
#[test_case("timestamp()" ; "impure function")]
fn unknown_values_propagate(expr: &str) {
    assert_eq!(evaluate(expr).unwrap(), Value::unknown());
}

#[test]
fn collections_keep_unknown_elements() {
    let value = evaluate("{ Name = \"x\", Arn = aws_s3_bucket.logs.arn }").unwrap();
    let entries = value.as_map().unwrap();
    assert_eq!(entries["Name"], Value::string("x"));
    assert_eq!(entries["Arn"], Value::unknown());
    assert!(value.contains_unknown());
}

#[test_case("var.missing", EvalErrorKind::Unresolvable ; "undeclared variable")]
#[test_case("local.missing", EvalErrorKind::Unresolvable ; "undeclared local")]
#[test_case("aws_s3_bucket.missing.id", EvalErrorKind::Unresolvable ; "undeclared resource")]
#[test_case("module.network.missing", EvalErrorKind::Unresolvable ; "undeclared module output")]
#[test_case("nope(1)", EvalErrorKind::Unresolvable ; "unknown function")]
#[test_case("aws_iam_role.a.name", EvalErrorKind::CycleDetected ; "resource reference cycle")]
#[test_case("var.subnets[5]", EvalErrorKind::InvalidOperation ; "index out of range")]
#[test_case("1 / 0", EvalErrorKind::InvalidOperation ; "division by zero")]
#[test_case(r#""x-${var.tags}""#, EvalErrorKind::TypeMismatch ; "interpolated map")]
#[test_case("var.env.name", EvalErrorKind::TypeMismatch ; "attribute of a string")]
fn reports_hard_errors(expr: &str, kind: EvalErrorKind) {
    let error = evaluate(expr).unwrap_err();
    assert_eq!(error.kind, kind, "{}", error);
    assert_eq!(error.range.filename, "main.tf");
}

#[test_case("[aws_s3_bucket.logs.arn, var.missing]" ; "list element")]
#[test_case("{ (aws_s3_bucket.logs.arn) = var.missing }" ; "value under unknown key")]
#[test_case("[for s in var.subnets : var.missing if s.name == aws_s3_bucket.logs.arn]" ; "for value under unknown condition")]
#[test_case("{ for s in var.subnets : aws_s3_bucket.logs.arn => var.missing }" ; "for value under unknown key")]
fn hard_errors_win_over_unknown_elements(expr: &str) {
    let error = evaluate(expr).unwrap_err();
    assert_eq!(error.kind, EvalErrorKind::Unresolvable);
    assert_eq!(error.message, "reference to undeclared input variable 'missing'");
}

#[test]
fn errors_point_at_the_offending_expression() {
    let error = evaluate("var.missing").unwrap_err();
    let line = DECLARATIONS.lines().count() + 3;
    assert_eq!(error.range.start.line, line);
    assert_eq!(error.range.start.column, 11);
}

#[test]
fn evaluation_is_deterministic() {
    for expr in ["aws_iam_role.a.name", "{ for k, v in var.tags : k => v }", "aws_s3_bucket.logs.arn"] {
        assert_eq!(evaluate(expr), evaluate(expr));
    }
}
