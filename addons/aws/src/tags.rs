use std::collections::{BTreeMap, BTreeSet};

use terralint_core::rules::{Rule, Severity};
use terralint_core::runner::Runner;
use terralint_kit::types::Diagnostic;

pub const TAGGABLE_RESOURCE_TYPES: &[&str] = &[
    "aws_autoscaling_group",
    "aws_cloudformation_stack",
    "aws_db_event_subscription",
    "aws_db_snapshot",
    "aws_default_route_table",
    "aws_dms_endpoint",
    "aws_dynamodb_table",
    "aws_elasticache_cluster",
    "aws_emr_cluster",
    "aws_glacier_vault",
    "aws_inspector_resource_group",
    "aws_internet_gateway",
    "aws_lb_target_group",
    "aws_neptune_cluster_instance",
    "aws_rds_cluster",
    "aws_ssm_parameter",
    "aws_workspaces_ip_group",
];

lazy_static! {
    pub static ref REQUIRED_TAGS_RULES: Vec<RequiredTagsRule> =
        TAGGABLE_RESOURCE_TYPES.iter().map(|resource_type| RequiredTagsRule::new(resource_type)).collect();
}

/// Checks that every resource of a type carries the tag keys listed in the
/// `tags` setting.
#[derive(Debug, Clone)]
pub struct RequiredTagsRule {
    name: String,
    resource_type: String,
    attribute_name: String,
}

impl RequiredTagsRule {
    pub fn new(resource_type: &str) -> Self {
        RequiredTagsRule {
            name: format!("aws_resource_tags_{}", resource_type),
            resource_type: resource_type.to_string(),
            attribute_name: "tags".to_string(),
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }
}

impl Rule for RequiredTagsRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, runner: &Runner) -> Result<(), Diagnostic> {
        runner.walk_resource_attributes(&self.resource_type, &self.attribute_name, |walk, attribute| {
            let result = walk.evaluate_expr::<BTreeMap<String, String>>(attribute);
            walk.ensure_no_error(result, |resource_tags| {
                let wanted: BTreeSet<&str> = walk.config_tags().iter().map(String::as_str).collect();
                let missing = wanted.iter().filter(|tag| !resource_tags.contains_key(**tag)).count();
                if missing == 0 {
                    return Ok(());
                }
                trace!("{} tag(s) missing at {}", missing, attribute.expr_range);
                let wanted = wanted.into_iter().collect::<Vec<_>>().join(",");
                let found = resource_tags.keys().map(String::as_str).collect::<Vec<_>>().join(",");
                walk.emit_issue(
                    self,
                    format!("Wanted tags: {}, found: {}", wanted, found),
                    attribute.expr_range.clone(),
                );
                Ok(())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_names_follow_resource_types() {
        let rule = RequiredTagsRule::new("aws_db_snapshot");
        assert_eq!(rule.name(), "aws_resource_tags_aws_db_snapshot");
        assert_eq!(rule.severity(), Severity::Error);
        assert!(rule.enabled());
        assert_eq!(rule.link(), "");
    }

    #[test]
    fn every_taggable_type_gets_a_rule() {
        let rules = crate::get_rules();
        assert_eq!(rules.len(), 17);
        let names: BTreeSet<&str> = rules.iter().map(|rule| rule.name()).collect();
        assert_eq!(names.len(), 17);
        assert!(names.contains("aws_resource_tags_aws_workspaces_ip_group"));
        for rule in REQUIRED_TAGS_RULES.iter() {
            assert_eq!(rule.name(), format!("aws_resource_tags_{}", rule.resource_type()));
        }
    }
}
