use terralint_core::rules::{Rule, RuleSet};

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate tracing;

pub mod cli;

pub fn get_available_rule_sets() -> Vec<Box<dyn RuleSet>> {
    vec![Box::new(terralint_addon_aws::AwsRuleSet::new())]
}

pub fn get_available_rules() -> Vec<Box<dyn Rule>> {
    get_available_rule_sets().iter().flat_map(|rule_set| rule_set.rules()).collect()
}

fn main() {
    cli::main();
}
