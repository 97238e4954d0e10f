use terralint_addon_aws::{get_rules, RequiredTagsRule};
use terralint_core::config::LintConfig;
use terralint_core::kit::{formatdoc, indoc};
use terralint_core::rules::{Rule, Severity};
use terralint_test_utils::{assert_issue, assert_no_issues};
use terralint_test_utils::{ConfigurationBuilder, LintHarness};
use test_case::test_case;

fn snapshot_rule() -> Vec<Box<dyn Rule>> {
    vec![Box::new(RequiredTagsRule::new("aws_db_snapshot"))]
}

fn single_file(content: &str) -> LintHarness {
    LintHarness::new(ConfigurationBuilder::new().with_file("main.tf", content))
        .with_tags(&["Name", "Env"])
}

#[test]
fn missing_tags_are_reported() {
    let report = single_file(indoc! {r#"
        resource "aws_db_snapshot" "backup" {
          db_instance_identifier = "db"
          tags = {Name = "x"}
        }
    "#})
    .run(snapshot_rule());

    assert_eq!(report.issues.len(), 1);
    let issue = &report.issues[0];
    assert_eq!(issue.message, "Wanted tags: Env,Name, found: Name");
    assert_eq!(issue.rule, "aws_resource_tags_aws_db_snapshot");
    assert_eq!(issue.severity, Severity::Error);
    assert_eq!(issue.range.filename, "main.tf");
    assert_eq!((issue.range.start.line, issue.range.start.column), (3, 10));
    assert!(issue.callers.is_empty());
    assert!(issue.link.is_none());
}

#[test]
fn values_known_after_apply_are_skipped() {
    let report = single_file(indoc! {r#"
        resource "aws_iam_role" "app" {
          name = "app"
        }

        resource "aws_db_snapshot" "backup" {
          tags = {
            Name = aws_iam_role.app.arn
          }
        }
    "#})
    .run(snapshot_rule());

    assert_no_issues!(report);
    assert!(report.diagnostics.is_empty());
}

#[test_case(r#"{Name = "x", Env = "prod"}"# ; "literal map")]
#[test_case(r#"merge(local.common, {Name = "x"})"# ; "merged with locals")]
#[test_case(r#"var.tags"# ; "variable default")]
#[test_case(r#"null"# ; "null")]
fn complete_tags_are_accepted(tags: &str) {
    let report = single_file(&formatdoc! {r#"
            variable "tags" {{
              default = {{ Name = "x", Env = "dev" }}
            }}

            locals {{
              common = {{ Env = "prod" }}
            }}

            resource "aws_db_snapshot" "backup" {{
              tags = {tags}
            }}
        "#})
    .run(snapshot_rule());

    assert_no_issues!(report);
}

#[test]
fn no_configured_tags_means_no_issue() {
    let harness = LintHarness::new(
        ConfigurationBuilder::new()
            .with_file("main.tf", "resource \"aws_db_snapshot\" \"a\" {\n  tags = {}\n}\n"),
    );
    assert_no_issues!(harness.run(snapshot_rule()));
}

#[test]
fn tags_of_non_string_type_are_errors() {
    let report = single_file("resource \"aws_db_snapshot\" \"a\" {\n  tags = [\"Name\"]\n}\n")
        .run(snapshot_rule());
    assert_no_issues!(report);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].code.as_deref(), Some("type_mismatch"));
}

#[test]
fn issues_in_modules_carry_their_callers() {
    let builder = ConfigurationBuilder::new()
        .with_file(
            "main.tf",
            indoc! {r#"
                module "database" {
                  source = "./modules/database"
                  env    = "prod"
                }
            "#},
        )
        .with_file(
            "modules/database/main.tf",
            indoc! {r#"
                variable "env" {}

                resource "aws_rds_cluster" "main" {
                  tags = {
                    Env = var.env
                  }
                }
            "#},
        );

    let report = LintHarness::new(builder).with_tags(&["Env", "Owner"]).run(get_rules());

    assert_eq!(report.issues.len(), 1);
    assert_issue!(report, "Wanted tags: Env,Owner, found: Env");
    let issue = &report.issues[0];
    assert_eq!(issue.rule, "aws_resource_tags_aws_rds_cluster");
    assert_eq!(issue.range.filename, "modules/database/main.tf");
    assert_eq!(issue.callers.len(), 1);
    assert_eq!(issue.callers[0].name, "module.database");
}

#[test]
fn rules_can_be_disabled_from_the_config() {
    let config = LintConfig::from_yaml(indoc! {r#"
        tags: [Name]
        rules:
          aws_resource_tags_aws_db_snapshot: false
    "#})
    .unwrap();
    let harness = LintHarness::new(
        ConfigurationBuilder::new()
            .with_file("main.tf", "resource \"aws_db_snapshot\" \"a\" {\n  tags = {}\n}\n"),
    )
    .with_config(config);

    assert_no_issues!(harness.run(get_rules()));
}
