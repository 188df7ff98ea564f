//! Scenario tests for units: lifecycle, registry rules, discovery and
//! mutation during passes

mod registry_rules;
mod support;
