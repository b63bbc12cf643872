//! Rule engine
//!
//! Rulesets live in the store under `rule.<name>`; each holds up to six rules
//! (see [`RuleKind`]). The engine checks rule definitions on `enforce`, then
//! re-validates every existing node the ruleset governs, and checks pending
//! values on `write` before anything is mutated.

use crate::statement::Statement;
use crate::store::{NodeId, Store};
use crate::value::ValueType;
use crate::vocabulary::{RuleKind, Verb};
use std::cmp::Ordering;
use tracing::debug;

/// A rule definition error or a node value that breaks a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    RulesetMissing { ruleset: String },
    InvalidType,
    InvalidBound {
        kind: RuleKind,
        value: String,
        value_type: String,
    },
    InvalidFlag { kind: RuleKind, value: String },
    BoundsOutOfOrder,
    TypeMismatch { node: String, value_type: ValueType },
    AboveMax { node: String, max: String },
    BelowMin { node: String, min: String },
    Required { node: String },
    Key { node: String },
    /// Existing nodes already share values (enforce)
    NotUnique { node: String },
    /// A written value collides with another node (write)
    Duplicate { node: String },
}

impl std::fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const PREFIX: &str = "Enforced Rule Violation:";
        match self {
            Self::RulesetMissing { ruleset } => write!(
                f,
                "Rule set {} does not exist. Either create the rule set first, or set the rule \
                 using the parent/children syntax ' write rule.ruleset: rule1 = ..., rule2 = ..., etc.'.",
                ruleset
            ),
            Self::InvalidType => write!(f, "Invalid value for type."),
            Self::InvalidBound {
                kind,
                value,
                value_type,
            } => write!(
                f,
                "{} is an invalid value for the rule {} when the node's type is {}.",
                value, kind, value_type
            ),
            Self::InvalidFlag { kind, value } => write!(
                f,
                "{} is an invalid value for the rule {}, it must be true or false.",
                value, kind
            ),
            Self::BoundsOutOfOrder => write!(f, "Min cannot be greater than max."),
            Self::TypeMismatch { node, value_type } => match value_type {
                ValueType::Date => write!(
                    f,
                    "{} {} must have a valid date value in mm/dd/yyyy format.",
                    PREFIX, node
                ),
                ValueType::Time => write!(
                    f,
                    "{} {} must have a valid time value in HH:mm:ss format.",
                    PREFIX, node
                ),
                other => write!(f, "{} {} must have a valid {} value.", PREFIX, node, other),
            },
            Self::AboveMax { node, max } => write!(
                f,
                "{} {} cannot be greater than the max value {}.",
                PREFIX, node, max
            ),
            Self::BelowMin { node, min } => write!(
                f,
                "{} {} cannot be less than the min value {}.",
                PREFIX, node, min
            ),
            Self::Required { node } => write!(
                f,
                "{} {} is a required field and cannot be left blank.",
                PREFIX, node
            ),
            Self::Key { node } => write!(
                f,
                "{} {} is a key field and cannot be left blank.",
                PREFIX, node
            ),
            Self::NotUnique { node } => {
                write!(f, "{} Nodes named {} are not unique.", PREFIX, node)
            }
            Self::Duplicate { node } => write!(
                f,
                "{} All {} nodes must have unique values.",
                PREFIX, node
            ),
        }
    }
}

impl std::error::Error for RuleViolation {}

/// A value about to be written (or, on enforce, already held) by a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub name: String,
    pub value: String,
    /// The node being overwritten, if it exists
    pub existing: Option<NodeId>,
}

/// Validation over values fetched from a [`Store`]
pub struct RuleEngine<'a> {
    store: &'a Store,
}

impl<'a> RuleEngine<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Name of the ruleset an enforce statement targets
    ///
    /// `rule.<set>` selects the set itself; `rule.<set>.<rule>` selects a rule.
    pub fn ruleset_name(&self, statement: &Statement) -> Option<String> {
        let vocab = self.store.vocabulary();
        let last = statement.parents.last()?;
        if vocab.is_rule_subtree(last) {
            Some(statement.selected_name.clone())
        } else if vocab.is_rule_name(&statement.selected_name) {
            Some(last.clone())
        } else {
            None
        }
    }

    /// Effective value of a rule while `statement` is being applied
    ///
    /// Precedence: the selected value when the selected name is the rule, then
    /// a non-empty child assignment, then the persisted rule, then empty.
    pub fn resolve_effective_rule_value(
        &self,
        kind: RuleKind,
        ruleset: &str,
        statement: &Statement,
    ) -> String {
        if statement.selected_name == kind.as_str() {
            if let Some(value) = &statement.selected_value {
                return value.clone();
            }
        }
        if let Some(value) = statement.child_value(kind.as_str()).filter(|v| !v.is_empty()) {
            return value.to_string();
        }
        self.store
            .rules_for(ruleset)
            .remove(&kind)
            .unwrap_or_default()
    }

    /// Check one rule value against the resolved type and bounds
    pub fn validate_rule_definition(
        &self,
        kind: RuleKind,
        value: &str,
        resolved_type: &str,
        resolved_max: &str,
        resolved_min: &str,
    ) -> Result<(), RuleViolation> {
        let vocab = self.store.vocabulary();
        match kind {
            RuleKind::Type => {
                value
                    .parse::<ValueType>()
                    .map_err(|_| RuleViolation::InvalidType)?;
            }
            RuleKind::Max | RuleKind::Min => {
                // An unknown type is reported by the type rule itself
                let Ok(value_type) = resolved_type.parse::<ValueType>() else {
                    return Ok(());
                };
                if !value_type.accepts_bound(value, vocab) {
                    return Err(RuleViolation::InvalidBound {
                        kind,
                        value: value.to_string(),
                        value_type: resolved_type.to_string(),
                    });
                }
                if !value_type.bounds_ordered(resolved_min, resolved_max, vocab) {
                    return Err(RuleViolation::BoundsOutOfOrder);
                }
            }
            RuleKind::Required | RuleKind::Key | RuleKind::Unique => {
                if value != "true" && value != "false" {
                    return Err(RuleViolation::InvalidFlag {
                        kind,
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Check a node value against one rule
    ///
    /// `batch` holds every value written by the same statement; uniqueness on
    /// write ignores those nodes and flags collisions inside the batch.
    pub fn validate_node_against_rule(
        &self,
        node: &PendingWrite,
        kind: RuleKind,
        rule_value: &str,
        value_type: ValueType,
        verb: Verb,
        batch: &[PendingWrite],
    ) -> Result<(), RuleViolation> {
        let vocab = self.store.vocabulary();
        let name = || node.name.clone();
        let value = node.value.as_str();

        match kind {
            RuleKind::Type => {
                if !value_type.accepts(value, vocab) {
                    return Err(RuleViolation::TypeMismatch {
                        node: name(),
                        value_type,
                    });
                }
            }
            RuleKind::Max => {
                if !value.is_empty()
                    && value_type.compare(value, rule_value, vocab) == Some(Ordering::Greater)
                {
                    return Err(RuleViolation::AboveMax {
                        node: name(),
                        max: rule_value.to_string(),
                    });
                }
            }
            RuleKind::Min => {
                if !value.is_empty()
                    && value_type.compare(value, rule_value, vocab) == Some(Ordering::Less)
                {
                    return Err(RuleViolation::BelowMin {
                        node: name(),
                        min: rule_value.to_string(),
                    });
                }
            }
            RuleKind::Required => {
                if rule_value == "true" && value.is_empty() {
                    return Err(RuleViolation::Required { node: name() });
                }
            }
            RuleKind::Key => {
                if rule_value == "true" && value.is_empty() {
                    return Err(RuleViolation::Key { node: name() });
                }
            }
            RuleKind::Unique => {
                if rule_value != "true" || value.is_empty() {
                    return Ok(());
                }
                if verb == Verb::Enforce {
                    if !self.store.is_unique(&node.name, value) {
                        return Err(RuleViolation::NotUnique { node: name() });
                    }
                    return Ok(());
                }

                let unchanged = node
                    .existing
                    .and_then(|id| self.store.get(id))
                    .is_some_and(|existing| existing.value() == value);
                if unchanged {
                    return Ok(());
                }
                let same_name: Vec<&PendingWrite> =
                    batch.iter().filter(|w| w.name == node.name).collect();
                let elsewhere = self
                    .store
                    .nodes_with_value(&node.name, value)
                    .into_iter()
                    .any(|id| !same_name.iter().any(|w| w.existing == Some(id)));
                let in_batch = same_name.iter().filter(|w| w.value == value).count() > 1;
                if elsewhere || in_batch {
                    return Err(RuleViolation::Duplicate { node: name() });
                }
            }
        }
        Ok(())
    }

    /// Data-dependent checks for an enforce statement
    ///
    /// Checks the rule values being set, then every existing node the ruleset
    /// governs against the resulting rules.
    pub fn check_enforce(&self, statement: &Statement) -> Vec<RuleViolation> {
        let vocab = self.store.vocabulary();
        let mut violations = Vec::new();
        let Some(ruleset) = self.ruleset_name(statement) else {
            return violations;
        };

        let sets_single_rule = vocab.is_rule_name(&statement.selected_name);
        if sets_single_rule && !self.store.ruleset_exists(&ruleset) {
            violations.push(RuleViolation::RulesetMissing { ruleset });
            return violations;
        }

        let effective = |kind: RuleKind| self.resolve_effective_rule_value(kind, &ruleset, statement);
        let mut resolved_type = effective(RuleKind::Type);
        if resolved_type.is_empty() {
            resolved_type = vocab.rule_default(RuleKind::Type).to_string();
        }
        let max = effective(RuleKind::Max);
        let min = effective(RuleKind::Min);

        let mut to_set: Vec<(RuleKind, String)> = if sets_single_rule {
            statement
                .selected_name
                .parse::<RuleKind>()
                .map(|kind| vec![(kind, statement.value_or_empty().to_string())])
                .unwrap_or_default()
        } else {
            statement
                .children
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .filter_map(|(name, value)| Some((name.parse::<RuleKind>().ok()?, value.clone())))
                .collect()
        };
        // A new type must still admit the bounds already in force
        if to_set.iter().any(|(kind, _)| *kind == RuleKind::Type) {
            for (kind, bound) in [(RuleKind::Max, &max), (RuleKind::Min, &min)] {
                if !to_set.iter().any(|(k, _)| *k == kind) {
                    to_set.push((kind, bound.clone()));
                }
            }
        }

        for (kind, value) in &to_set {
            if let Err(violation) =
                self.validate_rule_definition(*kind, value, &resolved_type, &max, &min)
            {
                if !violations.contains(&violation) {
                    violations.push(violation);
                }
            }
        }
        if !violations.is_empty() {
            return violations;
        }

        let Ok(value_type) = resolved_type.parse::<ValueType>() else {
            return violations;
        };
        let nodes: Vec<PendingWrite> = self
            .store
            .find_by_name(&ruleset, false)
            .into_iter()
            .filter_map(|(_, id)| {
                let node = self.store.get(id)?;
                Some(PendingWrite {
                    name: ruleset.clone(),
                    value: node.value().to_string(),
                    existing: Some(id),
                })
            })
            .collect();

        for kind in RuleKind::ALL {
            let mut rule_value = effective(kind);
            if rule_value.is_empty() {
                rule_value = vocab.rule_default(kind).to_string();
            }
            let failure = nodes.iter().find_map(|node| {
                self.validate_node_against_rule(node, kind, &rule_value, value_type, Verb::Enforce, &[])
                    .err()
            });
            violations.extend(failure);
        }

        debug!(ruleset = %ruleset, violations = violations.len(), "Checked enforce");
        violations
    }

    /// Check every pending write against the persisted rulesets
    pub fn check_write(&self, batch: &[PendingWrite]) -> Vec<RuleViolation> {
        let vocab = self.store.vocabulary();
        let mut violations: Vec<RuleViolation> = Vec::new();

        for node in batch {
            let rules = self.store.rules_for(&node.name);
            if rules.is_empty() {
                continue;
            }
            let value_type = rules
                .get(&RuleKind::Type)
                .and_then(|t| t.parse::<ValueType>().ok())
                .unwrap_or_default();
            for kind in RuleKind::ALL {
                let rule_value = rules
                    .get(&kind)
                    .map(String::as_str)
                    .unwrap_or_else(|| vocab.rule_default(kind));
                if let Err(violation) =
                    self.validate_node_against_rule(node, kind, rule_value, value_type, Verb::Write, batch)
                {
                    if !violations.contains(&violation) {
                        violations.push(violation);
                    }
                }
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::vocabulary::Vocabulary;
    use std::sync::Arc;

    fn setup() -> (Store, Parser) {
        let vocab = Arc::new(Vocabulary::default());
        (Store::new(Arc::clone(&vocab)), Parser::new(vocab))
    }

    fn put(store: &mut Store, path: &str, value: &str) -> NodeId {
        let mut current = store.root();
        for segment in path.split('.') {
            current = store.insert_or_get_child(current, segment, "").unwrap().0;
        }
        store.set_value(current, value).unwrap();
        current
    }

    fn pending(name: &str, value: &str, existing: Option<NodeId>) -> PendingWrite {
        PendingWrite {
            name: name.into(),
            value: value.into(),
            existing,
        }
    }

    #[test]
    fn test_effective_rule_precedence() {
        let (mut store, parser) = setup();
        put(&mut store, "rule.age.max", "10");
        put(&mut store, "rule.age.min", "1");
        let engine = RuleEngine::new(&store);

        let statement = parser.parse("write rule.age.max = 20");
        assert_eq!(engine.resolve_effective_rule_value(RuleKind::Max, "age", &statement), "20");
        assert_eq!(engine.resolve_effective_rule_value(RuleKind::Min, "age", &statement), "1");

        let statement = parser.parse("write rule.age: min = 3, max");
        assert_eq!(engine.resolve_effective_rule_value(RuleKind::Min, "age", &statement), "3");
        assert_eq!(engine.resolve_effective_rule_value(RuleKind::Max, "age", &statement), "10");
        assert_eq!(engine.resolve_effective_rule_value(RuleKind::Type, "age", &statement), "");
    }

    #[test]
    fn test_validate_rule_definition() {
        let (store, _) = setup();
        let engine = RuleEngine::new(&store);
        assert_eq!(
            engine.validate_rule_definition(RuleKind::Type, "colour", "text", "", ""),
            Err(RuleViolation::InvalidType)
        );
        let err = engine
            .validate_rule_definition(RuleKind::Max, "abc", "integer", "abc", "")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "abc is an invalid value for the rule max when the node's type is integer."
        );
        assert_eq!(
            engine.validate_rule_definition(RuleKind::Min, "11", "integer", "10", "11"),
            Err(RuleViolation::BoundsOutOfOrder)
        );
        assert!(engine
            .validate_rule_definition(RuleKind::Max, "5", "boolean", "5", "")
            .is_err());
        assert!(engine
            .validate_rule_definition(RuleKind::Unique, "yes", "text", "", "")
            .is_err());
        assert!(engine
            .validate_rule_definition(RuleKind::Required, "true", "text", "", "")
            .is_ok());
    }

    #[test]
    fn test_node_violations() {
        let (store, _) = setup();
        let engine = RuleEngine::new(&store);
        let age = pending("age", "11", None);
        let err = engine
            .validate_node_against_rule(&age, RuleKind::Max, "10", ValueType::Integer, Verb::Write, &[])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Enforced Rule Violation: age cannot be greater than the max value 10."
        );

        let word = pending("code", "abcdef", None);
        assert!(engine
            .validate_node_against_rule(&word, RuleKind::Max, "3", ValueType::Text, Verb::Write, &[])
            .is_err());

        let date = pending("born", "1999-01-01", None);
        let err = engine
            .validate_node_against_rule(&date, RuleKind::Type, "date", ValueType::Date, Verb::Write, &[])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Enforced Rule Violation: born must have a valid date value in mm/dd/yyyy format."
        );

        let blank = pending("id", "", None);
        assert_eq!(
            engine.validate_node_against_rule(&blank, RuleKind::Key, "true", ValueType::Text, Verb::Write, &[]),
            Err(RuleViolation::Key { node: "id".into() })
        );
    }

    #[test]
    fn test_unique_on_write() {
        let (mut store, _) = setup();
        let ann = put(&mut store, "a.name", "Ann");
        put(&mut store, "b.name", "Bob");
        let engine = RuleEngine::new(&store);

        // Rewriting the same value is never a violation
        let same = pending("name", "Ann", Some(ann));
        assert!(engine
            .validate_node_against_rule(&same, RuleKind::Unique, "true", ValueType::Text, Verb::Write, &[same.clone()])
            .is_ok());

        let clash = pending("name", "Bob", Some(ann));
        assert_eq!(
            engine.validate_node_against_rule(&clash, RuleKind::Unique, "true", ValueType::Text, Verb::Write, &[clash.clone()]),
            Err(RuleViolation::Duplicate { node: "name".into() })
        );

        let batch = vec![pending("name", "Cid", None), pending("name", "Cid", None)];
        assert!(engine
            .validate_node_against_rule(&batch[0], RuleKind::Unique, "true", ValueType::Text, Verb::Write, &batch)
            .is_err());
    }

    #[test]
    fn test_check_enforce_missing_ruleset() {
        let (store, parser) = setup();
        let engine = RuleEngine::new(&store);
        let statement = parser.parse("write rule.age.max = 10");
        let violations = engine.check_enforce(&statement);
        assert_eq!(
            violations,
            vec![RuleViolation::RulesetMissing {
                ruleset: "age".into()
            }]
        );
    }

    #[test]
    fn test_check_enforce_validates_existing_nodes() {
        let (mut store, parser) = setup();
        put(&mut store, "x.age", "abc");
        put(&mut store, "y.name", "Ann");
        put(&mut store, "z.name", "Ann");
        let engine = RuleEngine::new(&store);

        let statement = parser.parse("write rule.age: type = integer");
        assert_eq!(
            engine.check_enforce(&statement),
            vec![RuleViolation::TypeMismatch {
                node: "age".into(),
                value_type: ValueType::Integer
            }]
        );

        let statement = parser.parse("write rule.name: unique = true");
        assert_eq!(
            engine.check_enforce(&statement),
            vec![RuleViolation::NotUnique { node: "name".into() }]
        );

        let statement = parser.parse("write rule.age: type = integer, min = 5, max = 1");
        assert!(engine
            .check_enforce(&statement)
            .contains(&RuleViolation::BoundsOutOfOrder));
    }

    #[test]
    fn test_check_write() {
        let (mut store, _) = setup();
        put(&mut store, "rule.age.type", "integer");
        put(&mut store, "rule.age.max", "10");
        let engine = RuleEngine::new(&store);
        assert!(engine.check_write(&[pending("age", "7", None)]).is_empty());
        assert_eq!(
            engine.check_write(&[pending("age", "11", None)]),
            vec![RuleViolation::AboveMax {
                node: "age".into(),
                max: "10".into()
            }]
        );
        assert!(engine.check_write(&[pending("other", "x", None)]).is_empty());
    }
}
