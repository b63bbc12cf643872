//! Per-verb operations over the store
//!
//! Every data verb follows the same template: pick the candidate parents of
//! the selected name, run the verb's node handler on each, and summarize the
//! affected-node count.

use crate::error::Result;
use crate::rules::{PendingWrite, RuleEngine};
use crate::statement::{Statement, WhereFilter};
use crate::store::{NodeId, Store};
use crate::vocabulary::Verb;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Result of one statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub verb: Verb,
    /// Result lines; `path:value` for reads
    pub lines: Vec<String>,
    pub count: usize,
    pub summary: String,
    /// Whether the store was modified
    #[serde(skip)]
    pub changed: bool,
}

impl Response {
    /// `No nodes read.`, `1 node written.`, `3 nodes deleted.`
    pub fn summary_for(verb: Verb, count: usize) -> String {
        match count {
            0 => format!("No nodes {}.", verb.past_tense()),
            1 => format!("1 node {}.", verb.past_tense()),
            n => format!("{} nodes {}.", n, verb.past_tense()),
        }
    }

    fn counted(verb: Verb, lines: Vec<String>, count: usize, changed: bool) -> Self {
        Self {
            verb,
            lines,
            count,
            summary: Self::summary_for(verb, count),
            changed,
        }
    }

    /// A bare message, as answered by stubs, comments and `exit`
    pub fn message(verb: Verb, summary: impl Into<String>) -> Self {
        Self {
            verb,
            lines: Vec::new(),
            count: 0,
            summary: summary.into(),
            changed: false,
        }
    }

    /// Every error of a statement, newline joined
    pub fn errors(messages: &[String]) -> Self {
        Self::message(Verb::Error, messages.join("\n"))
    }

    pub fn is_error(&self) -> bool {
        self.verb == Verb::Error
    }

    /// Plain text: result lines followed by the summary
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        if !text.is_empty() && !self.summary.is_empty() {
            text.push('\n');
        }
        text.push_str(&self.summary);
        text
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

/// Lines and counts accumulated across node handlers
#[derive(Debug, Default)]
struct Outcome {
    lines: Vec<String>,
    count: usize,
    changed: bool,
}

/// Whether a node passes the where filter
///
/// An empty filter passes everything; otherwise a child or grandchild must
/// match one of the filter's fields.
fn passes_filter(store: &Store, id: NodeId, filter: &WhereFilter) -> bool {
    if filter.is_empty() {
        return true;
    }
    let matches = |node: NodeId| {
        store
            .get(node)
            .is_some_and(|n| filter.matches(n.name(), n.value()))
    };
    store.children(id).iter().any(|child| {
        matches(*child) || store.children(*child).iter().any(|grandchild| matches(*grandchild))
    })
}

/// The data verbs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Delete,
    Rename { new_name: String },
    Enforce,
}

impl Operation {
    /// Operation for a parsed statement; `None` for non-data verbs
    pub fn from_statement(statement: &Statement) -> Option<Self> {
        match statement.verb {
            Verb::Read => Some(Self::Read),
            Verb::Write => Some(Self::Write),
            Verb::Delete => Some(Self::Delete),
            Verb::Rename => Some(Self::Rename {
                new_name: statement.value_or_empty().to_string(),
            }),
            Verb::Enforce => Some(Self::Enforce),
            _ => None,
        }
    }

    pub fn verb(&self) -> Verb {
        match self {
            Self::Read => Verb::Read,
            Self::Write => Verb::Write,
            Self::Delete => Verb::Delete,
            Self::Rename { .. } => Verb::Rename,
            Self::Enforce => Verb::Enforce,
        }
    }

    /// Run the operation; data-dependent failures are recorded on the
    /// statement and returned as an error response
    pub fn execute(&self, statement: &mut Statement, store: &mut Store) -> Result<Response> {
        let response = match self {
            Self::Write => self.write(statement, store)?,
            Self::Enforce => self.enforce(statement, store)?,
            _ => {
                let mut outcome = Outcome::default();
                for (path, parent) in self.candidate_parents(statement, store) {
                    self.process_node(&path, parent, statement, store, &mut outcome)?;
                }
                Response::counted(self.verb(), outcome.lines, outcome.count, outcome.changed)
            }
        };
        debug!(verb = %self.verb(), count = response.count, "Executed operation");
        Ok(response)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Target resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn include_rules(statement: &Statement, store: &Store) -> bool {
        let vocab = store.vocabulary();
        statement.hierarchy().iter().any(|name| vocab.is_rule_subtree(name))
    }

    /// Parents under which the selected name is processed, ordered by path
    fn candidate_parents(&self, statement: &Statement, store: &Store) -> Vec<(String, NodeId)> {
        let vocab = store.vocabulary();
        let selected = statement.selected_name.as_str();
        let include_rules = Self::include_rules(statement, store);
        let expands = vocab.is_wildcard(selected) || vocab.is_root(selected);

        let mut parents = if statement.parents.is_empty() {
            if expands {
                vec![(String::new(), store.root())]
            } else {
                let found = store.find_parents_of(selected, include_rules);
                if found.is_empty() && *self == Self::Write {
                    vec![(String::new(), store.root())]
                } else {
                    found
                }
            }
        } else {
            store.resolve_path(&statement.parents, include_rules)
        };

        if *self != Self::Write {
            parents.retain(|(_, parent)| !self.targets(*parent, statement, store).is_empty());
        } else {
            parents.retain(|(_, parent)| passes_filter(store, *parent, &statement.filter));
        }
        parents.sort_by(|a, b| a.0.cmp(&b.0));
        parents.dedup_by(|a, b| a.1 == b.1);
        parents
    }

    /// Existing targets of the selected name under one parent
    fn targets(&self, parent: NodeId, statement: &Statement, store: &Store) -> Vec<NodeId> {
        let vocab = store.vocabulary();
        let selected = statement.selected_name.as_str();
        let include_rules = Self::include_rules(statement, store);

        if vocab.is_wildcard(selected) || vocab.is_root(selected) {
            store
                .children(parent)
                .iter()
                .copied()
                .filter(|id| include_rules || !store.in_rule_subtree(*id))
                .collect()
        } else {
            store.child(parent, selected).into_iter().collect()
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Node handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn process_node(
        &self,
        path: &str,
        parent: NodeId,
        statement: &Statement,
        store: &mut Store,
        outcome: &mut Outcome,
    ) -> Result<()> {
        let targets = self.targets(parent, statement, store);
        debug!(parent = %path, targets = targets.len(), "Processing node");

        match self {
            Self::Read => {
                for target in targets {
                    Self::read_target(target, statement, store, outcome);
                }
            }
            Self::Delete => {
                for target in targets {
                    if !passes_filter(store, target, &statement.filter) {
                        continue;
                    }
                    let Some(name) = store.get(target).map(|n| n.name().to_string()) else {
                        continue;
                    };
                    let removed = store.delete_child(parent, &name)?;
                    outcome.count += removed.len();
                    outcome.changed |= !removed.is_empty();
                    outcome.lines.extend(removed);
                }
            }
            Self::Rename { new_name } => {
                for target in targets {
                    if !passes_filter(store, target, &statement.filter) {
                        continue;
                    }
                    let Some((name, old_path)) = store
                        .get(target)
                        .map(|n| (n.name().to_string(), n.path().to_string()))
                    else {
                        continue;
                    };
                    if store.rename_child(parent, &name, new_name)? {
                        let new_path = store
                            .get(target)
                            .map(|n| n.path().to_string())
                            .unwrap_or_default();
                        outcome.lines.push(format!("{} renamed to {}.", old_path, new_path));
                        outcome.count += 1;
                        outcome.changed |= name != *new_name;
                    } else {
                        outcome.lines.push(format!(
                            "{} was not renamed, a sibling named {} already exists.",
                            old_path, new_name
                        ));
                    }
                }
            }
            Self::Write | Self::Enforce => {}
        }
        Ok(())
    }

    /// Collect `path:value` lines of a target's subtree
    fn read_target(target: NodeId, statement: &Statement, store: &Store, outcome: &mut Outcome) {
        let roots: Vec<NodeId> = if statement.children.is_empty() {
            vec![target]
        } else {
            statement
                .children
                .iter()
                .filter_map(|(name, _)| store.child(target, name))
                .collect()
        };

        for root in roots {
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                let Some(node) = store.get(id) else {
                    continue;
                };
                if !node.is_leaf() && !passes_filter(store, id, &statement.filter) {
                    continue;
                }
                outcome.lines.push(format!("{}:{}", node.path(), node.value()));
                outcome.count += 1;
                stack.extend(node.children().iter().rev());
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Write and enforce
    // ─────────────────────────────────────────────────────────────────────────

    /// Planned values for every target and child, before any mutation
    fn plan_writes(
        &self,
        parents: &[(String, NodeId)],
        statement: &Statement,
        store: &Store,
    ) -> Vec<PendingWrite> {
        let vocab = store.vocabulary();
        let selected = statement.selected_name.as_str();
        let mut batch = Vec::new();

        for (_, parent) in parents {
            let targets: Vec<(String, Option<NodeId>)> = if vocab.is_wildcard(selected) {
                self.targets(*parent, statement, store)
                    .into_iter()
                    .filter_map(|id| Some((store.get(id)?.name().to_string(), Some(id))))
                    .collect()
            } else {
                vec![(selected.to_string(), store.child(*parent, selected))]
            };

            for (name, existing) in targets {
                let current = existing.and_then(|id| store.get(id)).map(|n| n.value());
                let value = statement
                    .selected_value
                    .as_deref()
                    .or(current)
                    .unwrap_or_default();
                batch.push(PendingWrite {
                    name,
                    value: value.to_string(),
                    existing,
                });

                for (child_name, child_value) in &statement.children {
                    let child = existing.and_then(|id| store.child(id, child_name));
                    let value = if child_value.is_empty() {
                        child
                            .and_then(|id| store.get(id))
                            .map(|n| n.value().to_string())
                            .unwrap_or_default()
                    } else {
                        child_value.clone()
                    };
                    batch.push(PendingWrite {
                        name: child_name.clone(),
                        value,
                        existing: child,
                    });
                }
            }
        }
        batch
    }

    /// Create or overwrite one node, recording its line
    fn write_node(
        store: &mut Store,
        parent: NodeId,
        name: &str,
        value: Option<&str>,
        outcome: &mut Outcome,
    ) -> Result<NodeId> {
        let (id, created) = store.insert_or_get_child(parent, name, value.unwrap_or_default())?;
        let path = store.get(id).map(|n| n.path().to_string()).unwrap_or_default();
        let current = store.get(id).map(|n| n.value().to_string()).unwrap_or_default();

        let line = match (created, value) {
            (true, Some(v)) if !v.is_empty() => {
                format!("New node {} created, value set to '{}'.", path, v)
            }
            (true, _) => format!("New node {} created.", path),
            (false, Some(v)) if v != current => {
                store.set_value(id, v)?;
                format!("{} value set to '{}'.", path, v)
            }
            (false, _) => format!("{} was not modified.", path),
        };
        outcome.changed |= created || store.get(id).is_some_and(|n| n.value() != current);
        outcome.lines.push(line);
        outcome.count += 1;
        Ok(id)
    }

    fn apply_writes(
        &self,
        parents: &[(String, NodeId)],
        statement: &Statement,
        store: &mut Store,
        outcome: &mut Outcome,
    ) -> Result<()> {
        let vocab = std::sync::Arc::clone(store.vocabulary());
        let selected = statement.selected_name.as_str();

        for (path, parent) in parents {
            debug!(parent = %path, "Writing under parent");
            let names: Vec<String> = if vocab.is_wildcard(selected) {
                self.targets(*parent, statement, store)
                    .into_iter()
                    .filter_map(|id| Some(store.get(id)?.name().to_string()))
                    .collect()
            } else {
                vec![selected.to_string()]
            };

            for name in names {
                let target =
                    Self::write_node(store, *parent, &name, statement.selected_value.as_deref(), outcome)?;
                for (child_name, child_value) in &statement.children {
                    let value = Some(child_value.as_str()).filter(|v| !v.is_empty());
                    Self::write_node(store, target, child_name, value, outcome)?;
                }
            }
        }
        Ok(())
    }

    fn write(&self, statement: &mut Statement, store: &mut Store) -> Result<Response> {
        let parents = self.candidate_parents(statement, store);
        let batch = self.plan_writes(&parents, statement, store);

        let violations = RuleEngine::new(store).check_write(&batch);
        if !violations.is_empty() {
            for violation in &violations {
                statement.add_error(violation.to_string());
            }
            return Ok(Response::errors(&statement.errors));
        }

        let mut outcome = Outcome::default();
        self.apply_writes(&parents, statement, store, &mut outcome)?;
        Ok(Response::counted(Verb::Write, outcome.lines, outcome.count, outcome.changed))
    }

    fn enforce(&self, statement: &mut Statement, store: &mut Store) -> Result<Response> {
        let engine = RuleEngine::new(store);
        let ruleset = engine.ruleset_name(statement).unwrap_or_default();
        let violations = engine.check_enforce(statement);
        if !violations.is_empty() {
            for violation in &violations {
                statement.add_error(violation.to_string());
            }
            return Ok(Response::errors(&statement.errors));
        }

        store.ensure_rule_subtree()?;
        // Blank assignments leave a rule unchanged
        let mut applied = statement.clone();
        applied.children.retain(|(_, value)| !value.is_empty());

        let include_rules = true;
        let parents = store.resolve_path(&applied.parents, include_rules);
        let mut outcome = Outcome::default();
        self.apply_writes(&parents, &applied, store, &mut outcome)?;
        let created = store.ensure_default_ruleset(&ruleset)?;

        debug!(ruleset = %ruleset, rules = outcome.count, defaults = created, "Enforced rules");
        if parents.is_empty() {
            warn!(ruleset = %ruleset, "No rule node to enforce under");
        }
        Ok(Response {
            verb: Verb::Enforce,
            lines: Vec::new(),
            count: outcome.count,
            summary: format!("Rules set for {}.", ruleset),
            changed: outcome.changed || created > 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::vocabulary::Vocabulary;
    use std::sync::Arc;

    struct Fixture {
        parser: Parser,
        store: Store,
    }

    impl Fixture {
        fn new() -> Self {
            let vocab = Arc::new(Vocabulary::default());
            Self {
                parser: Parser::new(Arc::clone(&vocab)),
                store: Store::new(vocab),
            }
        }

        fn run(&mut self, text: &str) -> Response {
            let mut statement = self.parser.parse(text);
            assert!(!statement.is_error(), "{}: {:?}", text, statement.errors);
            let operation = Operation::from_statement(&statement).unwrap();
            operation.execute(&mut statement, &mut self.store).unwrap()
        }
    }

    #[test]
    fn test_summary() {
        assert_eq!(Response::summary_for(Verb::Read, 0), "No nodes read.");
        assert_eq!(Response::summary_for(Verb::Write, 1), "1 node written.");
        assert_eq!(Response::summary_for(Verb::Delete, 3), "3 nodes deleted.");
    }

    #[test]
    fn test_write_then_read() {
        let mut f = Fixture::new();
        f.run("write company");
        let response = f.run("write company.employee: name = Ann, age = 30");
        assert_eq!(response.count, 3);
        assert_eq!(
            response.lines,
            vec![
                "New node company.employee created.",
                "New node company.employee.name created, value set to 'Ann'.",
                "New node company.employee.age created, value set to '30'.",
            ]
        );
        assert!(response.changed);

        let response = f.run("read employee");
        assert_eq!(
            response.lines,
            vec![
                "company.employee:",
                "company.employee.name:Ann",
                "company.employee.age:30"
            ]
        );
        assert_eq!(response.summary, "3 nodes read.");
    }

    #[test]
    fn test_write_without_parents_creates_under_root() {
        let mut f = Fixture::new();
        let response = f.run("write city = Oslo");
        assert_eq!(response.lines, vec!["New node city created, value set to 'Oslo'."]);
        let response = f.run("write city = Oslo");
        assert_eq!(response.lines, vec!["city was not modified."]);
        assert!(!response.changed);
    }

    #[test]
    fn test_write_updates_every_match() {
        let mut f = Fixture::new();
        f.run("write a: flag = 1");
        f.run("write b: flag = 1");
        let response = f.run("write flag = 2");
        assert_eq!(response.count, 2);
        assert_eq!(response.lines, vec!["a.flag value set to '2'.", "b.flag value set to '2'."]);
    }

    #[test]
    fn test_read_root_child_excludes_rules() {
        let mut f = Fixture::new();
        f.run("write a = 1");
        f.run("write b = 2");
        f.run("write rule.a: type = integer");
        let response = f.run("read Root.Child");
        assert_eq!(response.lines, vec!["a:1", "b:2"]);

        let response = f.run("read rule");
        assert!(response.lines.contains(&"rule.a.type:integer".to_string()));
    }

    #[test]
    fn test_read_where_prunes_branches() {
        let mut f = Fixture::new();
        f.run("write staff");
        f.run("write staff.e1: name = Ann, role = dev");
        f.run("write staff.e2: name = Bob, role = ops");
        let response = f.run("read staff where name = Ann");
        assert_eq!(
            response.lines,
            vec!["staff:", "staff.e1:", "staff.e1.name:Ann", "staff.e1.role:dev"]
        );
    }

    #[test]
    fn test_read_where_presence_only() {
        let mut f = Fixture::new();
        f.run("write staff");
        f.run("write staff.e1: name = Ann, role = dev");
        f.run("write staff.e2: name = Bob");
        let response = f.run("read staff where role");
        assert_eq!(
            response.lines,
            vec!["staff:", "staff.e1:", "staff.e1.name:Ann", "staff.e1.role:dev"]
        );
        assert_eq!(response.count, 4);
    }

    #[test]
    fn test_read_child_selection() {
        let mut f = Fixture::new();
        f.run("write person: name = Ann, age = 30, city = Oslo");
        let response = f.run("read person: name, city");
        assert_eq!(response.lines, vec!["person.name:Ann", "person.city:Oslo"]);
    }

    #[test]
    fn test_delete_cascades() {
        let mut f = Fixture::new();
        f.run("write a: b");
        f.run("write a.b.c = 1");
        let response = f.run("delete a.b");
        assert_eq!(response.lines, vec!["a.b", "a.b.c"]);
        assert_eq!(response.summary, "2 nodes deleted.");
        assert_eq!(f.run("read a.b").summary, "No nodes read.");
        assert_eq!(f.store.indexed_paths(), vec!["a"]);
    }

    #[test]
    fn test_rename_and_collision() {
        let mut f = Fixture::new();
        f.run("write a: b, d = 2");
        f.run("write a.b.x = 1");
        let response = f.run("rename a.b = c");
        assert_eq!(response.lines, vec!["a.b renamed to a.c."]);
        assert_eq!(f.store.indexed_paths(), vec!["a", "a.c", "a.c.x", "a.d"]);

        let response = f.run("rename a.c = d");
        assert_eq!(response.count, 0);
        assert_eq!(response.summary, "No nodes renamed.");
        assert_eq!(response.lines.len(), 1);
    }

    #[test]
    fn test_missing_target_is_zero_count() {
        let mut f = Fixture::new();
        assert_eq!(f.run("read nothing").text(), "No nodes read.");
        assert_eq!(f.run("delete nothing").text(), "No nodes deleted.");
    }

    #[test]
    fn test_enforce_then_write() {
        let mut f = Fixture::new();
        let response = f.run("write rule.age: type = integer, max = 10");
        assert_eq!(response.summary, "Rules set for age.");
        assert_eq!(
            f.store.rules_for("age").get(&crate::vocabulary::RuleKind::Required).map(String::as_str),
            Some("false")
        );

        f.run("write person");
        let mut statement = f.parser.parse("write person.age = 11");
        let response = Operation::Write.execute(&mut statement, &mut f.store).unwrap();
        assert!(response.is_error());
        assert_eq!(
            response.summary,
            "Enforced Rule Violation: age cannot be greater than the max value 10."
        );
        assert!(f.store.lookup("person.age").is_none());

        assert_eq!(f.run("write person.age = 7").count, 1);
    }

    #[test]
    fn test_enforce_single_rule() {
        let mut f = Fixture::new();
        f.run("write rule.age");
        let response = f.run("write rule.age.max = 10");
        assert_eq!(response.summary, "Rules set for age.");
        assert_eq!(f.store.lookup("rule.age.max").and_then(|id| f.store.get(id)).map(|n| n.value()), Some("10"));
    }

    #[test]
    fn test_unique_violation_and_recovery() {
        let mut f = Fixture::new();
        f.run("write e1: name = Ann");
        f.run("write e2: name = Ann");

        let mut statement = f.parser.parse("write rule.name: unique = true");
        let response = Operation::Enforce.execute(&mut statement, &mut f.store).unwrap();
        assert_eq!(
            response.summary,
            "Enforced Rule Violation: Nodes named name are not unique."
        );

        f.run("delete e2.name");
        let response = f.run("write rule.name: unique = true");
        assert_eq!(response.summary, "Rules set for name.");

        // Rewriting the same value does not collide with itself
        assert!(!f.run("write e1.name = Ann").is_error());
    }

    #[test]
    fn test_unique_recovers_after_rename() {
        let mut f = Fixture::new();
        f.run("write e1: name = Ann");
        f.run("write e2: name = Ann");

        let mut statement = f.parser.parse("write rule.name: unique = true");
        let response = Operation::Enforce.execute(&mut statement, &mut f.store).unwrap();
        assert!(response.is_error());

        assert_eq!(f.run("rename e2.name = alias").count, 1);
        let response = f.run("write rule.name: unique = true");
        assert_eq!(response.summary, "Rules set for name.");
        assert_eq!(
            f.store.lookup("e2.alias").and_then(|id| f.store.get(id)).map(|n| n.value()),
            Some("Ann")
        );
    }
}
