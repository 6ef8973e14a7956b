//! Named routing rules and the per-subscription rule table.
//!
//! Rules are added at setup time and never mutated afterwards; changing a
//! rule means removing it and attaching a replacement. Evaluation walks
//! the table in insertion order and the first matching rule decides the
//! routing outcome.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::filter::CorrelationFilter;
use crate::message::Message;

/// Properties applied to a message when its rule matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    /// Key-value pairs merged into the message's application properties
    /// on acceptance. Existing keys are overwritten.
    #[serde(default)]
    pub set_properties: HashMap<String, String>,
}

/// A named filter with an optional action.
#[derive(Debug, Clone, Serialize, Deserialize, bon::Builder)]
#[builder(on(String, into))]
pub struct Rule {
    /// Unique within the owning table
    pub name: String,
    #[builder(default)]
    pub filter: CorrelationFilter,
    pub action: Option<RuleAction>,
}

/// Ordered collection of named rules.
///
/// An empty table means default pass-through: every message matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rules in order, rejecting duplicate names.
    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Result<Self, Error> {
        let mut table = Self::new();
        for rule in rules {
            table.add(rule)?;
        }
        Ok(table)
    }

    /// Append a rule. Fails with [`Error::DuplicateRuleName`] if a rule
    /// with the same name is already attached.
    pub fn add(&mut self, rule: Rule) -> Result<(), Error> {
        if self.rules.iter().any(|r| r.name == rule.name) {
            return Err(Error::duplicate_rule(&rule.name));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Detach and return a rule by name. Fails with
    /// [`Error::RuleNotFound`] if absent.
    pub fn remove(&mut self, name: &str) -> Result<Rule, Error> {
        let index = self
            .rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| Error::rule_not_found(name))?;
        Ok(self.rules.remove(index))
    }

    /// First rule (in insertion order) whose filter matches, if any.
    pub fn evaluate(&self, message: &Message) -> Option<&Rule> {
        self.rules.iter().find(|r| r.filter.matches(message))
    }

    /// All matching rules, in insertion order.
    ///
    /// The dispatcher routes on [`RuleTable::evaluate`] for determinism;
    /// this is the multi-match surface for callers that want platform
    /// style fan-out per matching rule.
    pub fn matching<'a>(&'a self, message: &'a Message) -> impl Iterator<Item = &'a Rule> {
        self.rules.iter().filter(|r| r.filter.matches(message))
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, correlation_id: &str) -> Rule {
        Rule::builder()
            .name(name)
            .filter(
                CorrelationFilter::builder()
                    .correlation_id(correlation_id)
                    .build(),
            )
            .build()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut table = RuleTable::new();
        table.add(rule("a", "id1")).unwrap();

        let err = table.add(rule("a", "id2")).unwrap_err();
        assert!(matches!(err, Error::DuplicateRuleName { name } if name == "a"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_missing_rule_fails() {
        let mut table = RuleTable::new();
        let err = table.remove("ghost").unwrap_err();
        assert!(matches!(err, Error::RuleNotFound { name } if name == "ghost"));
    }

    #[test]
    fn remove_frees_the_name() {
        let mut table = RuleTable::new();
        table.add(rule("a", "id1")).unwrap();
        table.remove("a").unwrap();
        table.add(rule("a", "id2")).unwrap();

        let message = Message::builder().correlation_id("id2").build();
        assert_eq!(table.evaluate(&message).unwrap().name, "a");
    }

    #[test]
    fn first_match_wins_in_insertion_order() {
        let mut table = RuleTable::new();
        table.add(rule("first", "id1")).unwrap();
        table
            .add(Rule::builder().name("catch-all").build())
            .unwrap();
        table.add(rule("shadowed", "id1")).unwrap();

        let message = Message::builder().correlation_id("id1").build();
        assert_eq!(table.evaluate(&message).unwrap().name, "first");

        // Anything else falls through to the catch-all before "shadowed".
        let other = Message::builder().correlation_id("id9").build();
        assert_eq!(table.evaluate(&other).unwrap().name, "catch-all");
    }

    #[test]
    fn evaluate_returns_none_when_nothing_matches() {
        let mut table = RuleTable::new();
        table.add(rule("a", "id1")).unwrap();

        let message = Message::builder().correlation_id("id2").build();
        assert!(table.evaluate(&message).is_none());
    }

    #[test]
    fn empty_table_evaluates_to_none() {
        let table = RuleTable::new();
        assert!(table.evaluate(&Message::builder().build()).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn matching_yields_every_match_in_order() {
        let mut table = RuleTable::new();
        table.add(rule("a", "id1")).unwrap();
        table.add(rule("b", "id2")).unwrap();
        table
            .add(Rule::builder().name("catch-all").build())
            .unwrap();

        let message = Message::builder().correlation_id("id1").build();
        let names: Vec<&str> = table.matching(&message).map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "catch-all"]);
    }

    #[test]
    fn with_rules_propagates_duplicates() {
        let result = RuleTable::with_rules([rule("a", "id1"), rule("a", "id2")]);
        assert!(matches!(result, Err(Error::DuplicateRuleName { .. })));
    }
}
