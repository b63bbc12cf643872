//! Hierarchical store: the node tree plus its by-name path index
//!
//! Nodes live in an arena addressed by [`NodeId`] and keep a link to their
//! parent, an ordered list of children and their cached dotted path. The
//! index maps a bare node name to every full path holding a node of that name.
//! Every mutation keeps the index in step with the tree: deletion unindexes the
//! whole subtree and rename rewrites the cached paths of the subtree only.

use crate::error::{Error, Result};
use crate::vocabulary::{RuleKind, Vocabulary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handle to a node in a [`Store`]
///
/// Ids are invalidated when their node is deleted and may later be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named, valued node
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    value: String,
    path: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Full dotted path; empty for the root
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// One exported node: its path and value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Record {
    pub path: String,
    pub value: String,
}

impl Record {
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path, self.value)
    }
}

/// Path of a child named `name` under the node at `parent_path`
pub fn child_path(parent_path: &str, name: &str) -> String {
    if parent_path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent_path, name)
    }
}

/// The node tree and its path index
#[derive(Debug, Clone)]
pub struct Store {
    vocab: Arc<Vocabulary>,
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    index: HashMap<String, BTreeMap<String, NodeId>>,
}

impl Store {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        let root = Node {
            name: String::new(),
            value: String::new(),
            path: String::new(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            vocab,
            nodes: vec![Some(root)],
            free: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    /// Number of nodes, not counting the root
    pub fn len(&self) -> usize {
        self.index.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Children of a node, empty for a stale id
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(Node::children).unwrap_or(&[])
    }

    /// Node at an exact dotted path; the empty path is the root
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        if path.is_empty() {
            return Some(self.root());
        }
        let name = path.rsplit('.').next().unwrap_or(path);
        self.index.get(name)?.get(path).copied()
    }

    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let parent = self.get(parent)?;
        self.index.get(name)?.get(&child_path(&parent.path, name)).copied()
    }

    /// Whether the node is the top-level rule node or one of its descendants
    pub fn in_rule_subtree(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|node| {
            let top = node.path.split('.').next().unwrap_or_default();
            !node.path.is_empty() && self.vocab.is_rule_subtree(top)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Walk dotted segments from the root
    ///
    /// The wildcard keyword fans out over every child of the preceding node;
    /// the root keyword is only valid as the first segment.
    pub fn resolve_path<S: AsRef<str>>(
        &self,
        segments: &[S],
        include_rules: bool,
    ) -> Vec<(String, NodeId)> {
        let mut frontier = vec![self.root()];

        for (i, segment) in segments.iter().enumerate() {
            let segment = segment.as_ref();
            if self.vocab.is_root(segment) {
                if i == 0 {
                    continue;
                }
                return Vec::new();
            }

            let mut next = Vec::new();
            for id in frontier {
                if self.vocab.is_wildcard(segment) {
                    next.extend_from_slice(self.children(id));
                } else if let Some(child) = self.child(id, segment) {
                    next.push(child);
                }
            }
            if !include_rules {
                next.retain(|id| !self.in_rule_subtree(*id));
            }
            frontier = next;
        }

        frontier
            .into_iter()
            .filter_map(|id| self.get(id).map(|node| (node.path.clone(), id)))
            .collect()
    }

    /// Every node with the given name, ordered by path
    pub fn find_by_name(&self, name: &str, include_rules: bool) -> Vec<(String, NodeId)> {
        self.index
            .get(name)
            .map(|paths| {
                paths
                    .iter()
                    .filter(|(_, id)| include_rules || !self.in_rule_subtree(**id))
                    .map(|(path, id)| (path.clone(), *id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parents of every node with the given name
    pub fn find_parents_of(&self, child_name: &str, include_rules: bool) -> Vec<(String, NodeId)> {
        self.find_by_name(child_name, include_rules)
            .into_iter()
            .filter_map(|(_, id)| self.get(id)?.parent)
            .filter_map(|parent| self.get(parent).map(|node| (node.path.clone(), parent)))
            .collect()
    }

    /// Whether any node anywhere has this name
    pub fn contains_name(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether any node anywhere holds this value
    pub fn contains_value(&self, value: &str) -> bool {
        self.nodes
            .iter()
            .skip(1)
            .flatten()
            .any(|node| node.value == value)
    }

    /// Nodes with the given name and value, outside the rule subtree
    pub fn nodes_with_value(&self, name: &str, value: &str) -> Vec<NodeId> {
        self.find_by_name(name, false)
            .into_iter()
            .filter(|(_, id)| self.get(*id).is_some_and(|node| node.value == value))
            .map(|(_, id)| id)
            .collect()
    }

    /// True iff at most one node named `name` holds `value`
    pub fn is_unique(&self, name: &str, value: &str) -> bool {
        self.nodes_with_value(name, value).len() <= 1
    }

    /// The node and all its descendants, parents before children
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                out.push(current);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// All indexed paths, sorted
    pub fn indexed_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .index
            .values()
            .flat_map(|paths| paths.keys().cloned())
            .collect();
        paths.sort();
        paths
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    fn check_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains('.') || name.contains(':') {
            return Err(Error::InvalidNodeName(name.to_string()));
        }
        Ok(())
    }

    fn add_to_index(&mut self, name: &str, path: &str, id: NodeId) {
        self.index
            .entry(name.to_string())
            .or_default()
            .insert(path.to_string(), id);
    }

    fn remove_from_index(&mut self, name: &str, path: &str) {
        if let Some(paths) = self.index.get_mut(name) {
            paths.remove(path);
            if paths.is_empty() {
                self.index.remove(name);
            }
        }
    }

    /// Return the named child, creating it with `initial_value` if absent
    ///
    /// The flag is true when the child was created.
    pub fn insert_or_get_child(
        &mut self,
        parent: NodeId,
        name: &str,
        initial_value: &str,
    ) -> Result<(NodeId, bool)> {
        Self::check_name(name)?;
        if let Some(existing) = self.child(parent, name) {
            return Ok((existing, false));
        }

        let path = child_path(&self.node(parent)?.path, name);
        let node = Node {
            name: name.to_string(),
            value: initial_value.to_string(),
            path: path.clone(),
            parent: Some(parent),
            children: Vec::new(),
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        };
        self.node_mut(parent)?.children.push(id);
        self.add_to_index(name, &path, id);
        debug!(path = %path, "Created node");
        Ok((id, true))
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<()> {
        self.node_mut(id)?.value = value.to_string();
        Ok(())
    }

    /// Remove a child and its whole subtree, returning every removed path
    ///
    /// Returns an empty list when the parent has no such child.
    pub fn delete_child(&mut self, parent: NodeId, name: &str) -> Result<Vec<String>> {
        let Some(target) = self.child(parent, name) else {
            return Ok(Vec::new());
        };

        let mut removed = Vec::new();
        for id in self.subtree(target) {
            if let Some(node) = self.nodes[id.0].take() {
                self.remove_from_index(&node.name, &node.path);
                self.free.push(id.0);
                removed.push(node.path);
            }
        }
        self.node_mut(parent)?.children.retain(|c| *c != target);
        debug!(count = removed.len(), "Deleted subtree");
        Ok(removed)
    }

    /// Rename a child in place, rewriting the paths of its whole subtree
    ///
    /// Returns false when there is no such child or the new name is taken.
    pub fn rename_child(&mut self, parent: NodeId, old_name: &str, new_name: &str) -> Result<bool> {
        Self::check_name(new_name)?;
        let Some(target) = self.child(parent, old_name) else {
            return Ok(false);
        };
        if old_name == new_name {
            return Ok(true);
        }
        if self.child(parent, new_name).is_some() {
            warn!(
                parent = %self.node(parent)?.path,
                from = old_name,
                to = new_name,
                "Rename refused, name already taken"
            );
            return Ok(false);
        }

        self.node_mut(target)?.name = new_name.to_string();
        for id in self.subtree(target) {
            let (old_path, name, parent_id) = {
                let node = self.node(id)?;
                (node.path.clone(), node.name.clone(), node.parent)
            };
            let parent_path = match parent_id {
                Some(p) => self.node(p)?.path.clone(),
                None => String::new(),
            };
            let new_path = child_path(&parent_path, &name);

            let old_name_for_index = if id == target { old_name } else { name.as_str() };
            self.remove_from_index(old_name_for_index, &old_path);
            self.add_to_index(&name, &new_path, id);
            self.node_mut(id)?.path = new_path;
        }
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rulesets
    // ─────────────────────────────────────────────────────────────────────────

    fn ruleset_node(&self, ruleset: &str) -> Option<NodeId> {
        self.lookup(&child_path(&self.vocab.rule_subtree, ruleset))
    }

    pub fn ruleset_exists(&self, ruleset: &str) -> bool {
        self.ruleset_node(ruleset).is_some()
    }

    /// Persisted rules of a ruleset; empty when it does not exist
    pub fn rules_for(&self, ruleset: &str) -> BTreeMap<RuleKind, String> {
        let Some(id) = self.ruleset_node(ruleset) else {
            return BTreeMap::new();
        };
        self.children(id)
            .iter()
            .filter_map(|c| self.get(*c))
            .filter_map(|node| {
                let kind = node.name.parse::<RuleKind>().ok()?;
                Some((kind, node.value.clone()))
            })
            .collect()
    }

    /// The top-level rule node, created if needed
    pub fn ensure_rule_subtree(&mut self) -> Result<NodeId> {
        let name = self.vocab.rule_subtree.clone();
        let root = self.root();
        Ok(self.insert_or_get_child(root, &name, "")?.0)
    }

    /// Create any missing rule of an existing ruleset with its default value
    ///
    /// Returns the number of rules created; does nothing when the ruleset does
    /// not exist.
    pub fn ensure_default_ruleset(&mut self, ruleset: &str) -> Result<usize> {
        let Some(id) = self.ruleset_node(ruleset) else {
            return Ok(0);
        };
        let vocab = Arc::clone(&self.vocab);
        let mut created = 0;
        for kind in RuleKind::ALL {
            if self.insert_or_get_child(id, kind.as_str(), vocab.rule_default(kind))?.1 {
                created += 1;
            }
        }
        Ok(created)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk exchange
    // ─────────────────────────────────────────────────────────────────────────

    /// Every node except the root, in descending path order
    pub fn export(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .nodes
            .iter()
            .skip(1)
            .flatten()
            .map(|node| Record::new(node.path.clone(), node.value.clone()))
            .collect();
        records.sort_by(|a, b| b.path.cmp(&a.path));
        records
    }

    /// Load records into an empty store
    pub fn import(&mut self, records: &[Record]) -> Result<usize> {
        if !self.is_empty() {
            return Err(Error::StoreNotEmpty(self.len()));
        }
        let count = self.merge(records)?;
        info!(records = count, "Imported records");
        Ok(count)
    }

    /// Write records over the current tree, creating missing ancestors
    pub fn merge(&mut self, records: &[Record]) -> Result<usize> {
        let mut sorted: Vec<&Record> = records.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        for record in &sorted {
            if record.path.is_empty() || record.path.split('.').any(str::is_empty) {
                return Err(Error::InvalidPath(record.path.clone()));
            }
            if record.value.contains(['\n', '\r']) {
                return Err(Error::MultilineValue(record.path.clone()));
            }
            let mut current = self.root();
            for segment in record.path.split('.') {
                current = self.insert_or_get_child(current, segment, "")?.0;
            }
            self.set_value(current, &record.value)?;
        }
        Ok(sorted.len())
    }
}
