//! Keyword tables of the query language
//!
//! A [`Vocabulary`] is built once and shared (usually as `Arc<Vocabulary>`)
//! by the parser, the store and the engine.

use crate::value::ValueType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Operation verb of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Read,
    Write,
    Delete,
    Rename,
    /// A write into the `rule` subtree
    Enforce,
    Exit,
    Begin,
    Commit,
    Rollback,
    /// Comments and empty statements
    #[default]
    Comment,
    /// The statement failed to parse or validate
    Error,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Enforce => "enforce",
            Self::Exit => "exit",
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::Comment => "comment",
            Self::Error => "error",
        }
    }

    /// Past tense used in "N nodes <verb>." summaries
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "written",
            Self::Delete => "deleted",
            Self::Rename => "renamed",
            Self::Enforce => "enforced",
            _ => self.as_str(),
        }
    }

    /// Whether the verb needs a node name after it
    pub fn requires_argument(&self) -> bool {
        matches!(self, Self::Read | Self::Write | Self::Delete | Self::Rename)
    }

    /// Whether the verb may change the tree
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Write | Self::Delete | Self::Rename | Self::Enforce
        )
    }

    /// Verbs that take no argument at all
    pub fn is_bare(&self) -> bool {
        matches!(
            self,
            Self::Exit | Self::Begin | Self::Commit | Self::Rollback
        )
    }

    /// The verb name with its first letter capitalized
    pub fn title(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the six constraint kinds stored under `rule.<name>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Type,
    Max,
    Min,
    Required,
    Key,
    Unique,
}

impl RuleKind {
    /// All rule kinds, in definition order
    pub const ALL: [RuleKind; 6] = [
        RuleKind::Type,
        RuleKind::Max,
        RuleKind::Min,
        RuleKind::Required,
        RuleKind::Key,
        RuleKind::Unique,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Max => "max",
            Self::Min => "min",
            Self::Required => "required",
            Self::Key => "key",
            Self::Unique => "unique",
        }
    }

    /// Rules whose value is `true` or `false`
    pub fn is_flag(&self) -> bool {
        matches!(self, Self::Required | Self::Key | Self::Unique)
    }
}

impl FromStr for RuleKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(())
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable keyword tables and formats of the query language
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Anchors a path at the tree root
    pub root_keyword: String,
    /// Expands to every child of the preceding path segment
    pub wildcard_keyword: String,
    /// Name of the top-level subtree holding rulesets
    pub rule_subtree: String,
    /// Statements starting with this marker are comments
    pub comment_marker: String,
    /// Trailing repeat modifier, as in `Times 10`
    pub repeat_keyword: String,
    /// Separates the argument from the filter
    pub where_keyword: String,
    /// chrono format of date values
    pub date_format: String,
    /// chrono format of time values
    pub time_format: String,
    operations: Vec<(String, Verb)>,
    reserved_words: BTreeSet<String>,
    rule_defaults: BTreeMap<RuleKind, String>,
    generator_keywords: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let operations: Vec<(String, Verb)> = [
            Verb::Read,
            Verb::Write,
            Verb::Delete,
            Verb::Rename,
            Verb::Exit,
            Verb::Begin,
            Verb::Commit,
            Verb::Rollback,
        ]
        .into_iter()
        .map(|verb| (verb.as_str().to_string(), verb))
        .collect();

        let mut reserved_words: BTreeSet<String> =
            operations.iter().map(|(phrase, _)| phrase.clone()).collect();
        reserved_words.insert(Verb::Comment.as_str().to_string());
        reserved_words.insert("rule".to_string());
        reserved_words.insert("config".to_string());
        reserved_words.extend(RuleKind::ALL.iter().map(|k| k.as_str().to_string()));
        reserved_words.extend(ValueType::ALL.iter().map(|t| t.as_str().to_string()));

        let rule_defaults = BTreeMap::from([
            (RuleKind::Type, ValueType::Text.as_str().to_string()),
            (RuleKind::Required, "false".to_string()),
            (RuleKind::Key, "false".to_string()),
            (RuleKind::Unique, "false".to_string()),
        ]);

        let generator_keywords = [
            "Newid",
            "FirstNameMale",
            "FirstNameFemale",
            "LastName",
            "Time",
            "Date",
            "Integer",
            "Decimal",
            "Text",
            "Boolean",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            root_keyword: "Root".to_string(),
            wildcard_keyword: "Child".to_string(),
            rule_subtree: "rule".to_string(),
            comment_marker: "//".to_string(),
            repeat_keyword: "Times".to_string(),
            where_keyword: "where".to_string(),
            date_format: "%m/%d/%Y".to_string(),
            time_format: "%H:%M:%S".to_string(),
            operations,
            reserved_words,
            rule_defaults,
            generator_keywords,
        }
    }
}

impl Vocabulary {
    /// Operation phrases and the verb each one selects
    pub fn operations(&self) -> &[(String, Verb)] {
        &self.operations
    }

    /// Verb for an operation phrase, compared case-insensitively
    pub fn verb_for(&self, phrase: &str) -> Option<Verb> {
        self.operations
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(phrase))
            .map(|(_, verb)| *verb)
    }

    /// Words that can never be written, deleted or renamed
    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved_words.contains(word)
    }

    pub fn is_rule_name(&self, word: &str) -> bool {
        word.parse::<RuleKind>().is_ok()
    }

    pub fn is_root(&self, word: &str) -> bool {
        word == self.root_keyword
    }

    pub fn is_wildcard(&self, word: &str) -> bool {
        word == self.wildcard_keyword
    }

    pub fn is_rule_subtree(&self, word: &str) -> bool {
        word == self.rule_subtree
    }

    /// Path keywords plus generator keywords
    pub fn is_keyword(&self, word: &str) -> bool {
        self.is_root(word)
            || self.is_wildcard(word)
            || word == self.repeat_keyword
            || self.is_generator_keyword(word)
    }

    /// Default value of a rule, empty for max and min
    pub fn rule_default(&self, kind: RuleKind) -> &str {
        self.rule_defaults.get(&kind).map(String::as_str).unwrap_or("")
    }

    /// Keywords whose occurrences are replaced by generated values
    pub fn generator_keywords(&self) -> &[String] {
        &self.generator_keywords
    }

    pub fn is_generator_keyword(&self, word: &str) -> bool {
        self.generator_keywords.iter().any(|k| k == word)
    }

    /// Generator keyword matching `word` regardless of case
    pub fn generator_keyword_ignore_case(&self, word: &str) -> Option<&str> {
        self.generator_keywords
            .iter()
            .find(|k| k.eq_ignore_ascii_case(word))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_words() {
        let vocab = Vocabulary::default();
        for word in ["read", "comment", "rule", "config", "max", "integer", "date"] {
            assert!(vocab.is_reserved(word), "{} should be reserved", word);
        }
        assert!(!vocab.is_reserved("Root"));
        assert!(!vocab.is_reserved("employee"));
    }

    #[test]
    fn test_verb_lookup_ignores_case() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.verb_for("READ"), Some(Verb::Read));
        assert_eq!(vocab.verb_for("Rollback"), Some(Verb::Rollback));
        assert_eq!(vocab.verb_for("enforce"), None);
    }

    #[test]
    fn test_rule_defaults() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.rule_default(RuleKind::Type), "text");
        assert_eq!(vocab.rule_default(RuleKind::Unique), "false");
        assert_eq!(vocab.rule_default(RuleKind::Max), "");
    }

    #[test]
    fn test_verb_text() {
        assert_eq!(Verb::Delete.past_tense(), "deleted");
        assert_eq!(Verb::Rollback.title(), "Rollback");
        assert!(Verb::Enforce.is_mutating());
        assert!(!Verb::Read.is_mutating());
    }
}
