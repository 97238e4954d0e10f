#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate tracing;

use terralint_core::rules::{Rule, RuleSet};

mod tags;

pub use tags::{RequiredTagsRule, REQUIRED_TAGS_RULES, TAGGABLE_RESOURCE_TYPES};

#[derive(Debug, Default)]
pub struct AwsRuleSet;

impl AwsRuleSet {
    pub fn new() -> Self {
        Self {}
    }
}

impl RuleSet for AwsRuleSet {
    fn name(&self) -> &str {
        "aws"
    }

    fn description(&self) -> &str {
        terralint_core::kit::indoc! {r#"
            Checks resources of the AWS provider.
            "#}
    }

    fn rules(&self) -> Vec<Box<dyn Rule>> {
        get_rules()
    }
}

/// One required-tags rule per taggable resource type.
pub fn get_rules() -> Vec<Box<dyn Rule>> {
    REQUIRED_TAGS_RULES.iter().cloned().map(|rule| Box::new(rule) as Box<dyn Rule>).collect()
}
