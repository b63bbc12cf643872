//! Parsed statement types

use crate::error::Result;
use crate::vocabulary::Verb;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Output format requested for a statement's response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Raw lines framed by separators
    #[default]
    Basic,
    /// Indented `name-> value` lines
    Tree,
    Xml,
    Json,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Tree => "tree",
            Self::Xml => "xml",
            Self::Json => "json",
        }
    }
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" | "plain" => Ok(Self::Basic),
            "tree" => Ok(Self::Tree),
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown data format: {}", other)),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where-filter: field names mapped to accepted values, in statement order
///
/// An empty value list means the field only has to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhereFilter {
    fields: Vec<(String, Vec<String>)>,
}

impl WhereFilter {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(String, Vec<String>)] {
        &self.fields
    }

    /// Record a field, optionally with one more accepted value
    pub fn add(&mut self, field: impl Into<String>, value: Option<String>) {
        let field = field.into();
        let index = match self.fields.iter().position(|(name, _)| *name == field) {
            Some(index) => index,
            None => {
                self.fields.push((field, Vec::new()));
                self.fields.len() - 1
            }
        };
        if let Some(value) = value {
            self.fields[index].1.push(value);
        }
    }

    /// Whether a child named `name` holding `value` satisfies any field
    pub fn matches(&self, name: &str, value: &str) -> bool {
        self.fields.iter().any(|(field, accepted)| {
            field == name && (accepted.is_empty() || accepted.iter().any(|a| a == value))
        })
    }
}

/// A textual field of a statement that a keyword can occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "field", content = "index")]
pub enum FieldRef {
    SelectedName,
    SelectedValue,
    ChildName(usize),
    ChildValue(usize),
}

impl FieldRef {
    /// Whether the field holds a node name (as opposed to a value)
    pub fn is_name(&self) -> bool {
        matches!(self, Self::SelectedName | Self::ChildName(_))
    }
}

/// Position of a generator keyword inside a parsed statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSite {
    /// Canonical keyword name, e.g. `Newid`
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    pub field: FieldRef,
    /// Occurrence number of the keyword token within the statement
    pub ordinal: usize,
}

/// A parsed statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub verb: Verb,
    pub selected_name: String,
    /// `Some("")` when `=` is present with nothing after it
    pub selected_value: Option<String>,
    /// Path prefix, outermost first
    pub parents: Vec<String>,
    /// Bulk child assignments in statement order
    pub children: Vec<(String, String)>,
    pub filter: WhereFilter,
    pub repeat: u32,
    pub format: DataFormat,
    pub errors: Vec<String>,
    pub keyword_sites: Vec<KeywordSite>,
    pub original: String,
}

impl Statement {
    pub fn new(original: impl Into<String>) -> Self {
        Self {
            repeat: 1,
            original: original.into(),
            ..Default::default()
        }
    }

    /// Record an error; the statement becomes an error statement
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.verb = Verb::Error;
        if !self.errors.contains(&message) {
            self.errors.push(message);
        }
    }

    pub fn is_error(&self) -> bool {
        self.verb == Verb::Error
    }

    /// Parent names followed by the selected name
    pub fn hierarchy(&self) -> Vec<&str> {
        self.parents
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.selected_name.as_str()))
            .collect()
    }

    pub fn hierarchy_string(&self) -> String {
        self.hierarchy().join(".")
    }

    /// Selected value, empty when none was given
    pub fn value_or_empty(&self) -> &str {
        self.selected_value.as_deref().unwrap_or("")
    }

    pub fn child_value(&self, name: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|(child, _)| child == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn field(&self, field: FieldRef) -> Option<&str> {
        match field {
            FieldRef::SelectedName => Some(&self.selected_name),
            FieldRef::SelectedValue => self.selected_value.as_deref(),
            FieldRef::ChildName(i) => self.children.get(i).map(|(name, _)| name.as_str()),
            FieldRef::ChildValue(i) => self.children.get(i).map(|(_, value)| value.as_str()),
        }
    }

    pub fn set_field(&mut self, field: FieldRef, text: String) {
        match field {
            FieldRef::SelectedName => self.selected_name = text,
            FieldRef::SelectedValue => self.selected_value = Some(text),
            FieldRef::ChildName(i) => {
                if let Some(child) = self.children.get_mut(i) {
                    child.0 = text;
                }
            }
            FieldRef::ChildValue(i) => {
                if let Some(child) = self.children.get_mut(i) {
                    child.1 = text;
                }
            }
        }
    }

    /// Pretty JSON rendering, used by the shell's debug mode
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_error_dedupes_and_forces_error() {
        let mut statement = Statement::new("read a");
        statement.verb = Verb::Read;
        statement.add_error("bad");
        statement.add_error("bad");
        statement.add_error("worse");
        assert!(statement.is_error());
        assert_eq!(statement.errors, vec!["bad", "worse"]);
    }

    #[test]
    fn test_where_filter() {
        let mut filter = WhereFilter::default();
        filter.add("name", Some("Ann".into()));
        filter.add("name", Some("Bob".into()));
        filter.add("age", None);
        assert_eq!(filter.fields().len(), 2);
        assert!(filter.matches("name", "Bob"));
        assert!(!filter.matches("name", "Cid"));
        assert!(filter.matches("age", "anything"));
    }

    #[test]
    fn test_hierarchy() {
        let mut statement = Statement::new("read a.b.c");
        statement.parents = vec!["a".into(), "b".into()];
        statement.selected_name = "c".into();
        assert_eq!(statement.hierarchy_string(), "a.b.c");
    }

    #[test]
    fn test_data_format_parse() {
        assert_eq!("JSON".parse::<DataFormat>(), Ok(DataFormat::Json));
        assert!("yaml".parse::<DataFormat>().is_err());
    }
}
