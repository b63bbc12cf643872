//! Keyword resolution contract
//!
//! Generator keywords are recorded by the parser as [`KeywordSite`]s. Before
//! dispatch, each site is handed to a [`KeywordResolver`] which may replace the
//! field's text with a generated value.

use crate::statement::{FieldRef, KeywordSite, Statement};
use crate::store::Store;
use tracing::debug;

/// One keyword occurrence to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRequest {
    /// Canonical keyword name, e.g. `LastName`
    pub keyword: String,
    pub parameter: Option<String>,
    pub field: FieldRef,
}

impl From<&KeywordSite> for KeywordRequest {
    fn from(site: &KeywordSite) -> Self {
        Self {
            keyword: site.keyword.clone(),
            parameter: site.parameter.clone(),
            field: site.field,
        }
    }
}

/// Produces values for generator keywords
pub trait KeywordResolver {
    /// Replacement text for the field, or `None` to leave it as written
    fn resolve(&mut self, request: &KeywordRequest, store: &Store) -> Option<String>;
}

/// Resolver that leaves every keyword as written
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralKeywords;

impl KeywordResolver for LiteralKeywords {
    fn resolve(&mut self, _request: &KeywordRequest, _store: &Store) -> Option<String> {
        None
    }
}

/// Resolve every keyword site of `statement` in statement order
///
/// Sites are kept on the statement. Generated child names that collide are
/// reported as duplicate children.
pub fn apply_keywords(statement: &mut Statement, resolver: &mut dyn KeywordResolver, store: &Store) {
    if statement.is_error() || statement.keyword_sites.is_empty() {
        return;
    }

    let mut sites = statement.keyword_sites.clone();
    sites.sort_by_key(|site| site.ordinal);
    for site in &sites {
        let request = KeywordRequest::from(site);
        if let Some(text) = resolver.resolve(&request, store) {
            debug!(keyword = %site.keyword, value = %text, "Resolved keyword");
            statement.set_field(site.field, text);
        }
    }

    let names: Vec<&str> = statement.children.iter().map(|(name, _)| name.as_str()).collect();
    let duplicated = names
        .iter()
        .enumerate()
        .any(|(i, name)| names[..i].contains(name));
    if duplicated {
        statement.add_error("Children names cannot contain duplicates.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::vocabulary::Vocabulary;
    use std::sync::Arc;

    /// Numbers each request, optionally repeating the same answer
    struct Counter {
        next: u32,
        fixed: Option<String>,
    }

    impl KeywordResolver for Counter {
        fn resolve(&mut self, request: &KeywordRequest, _store: &Store) -> Option<String> {
            if let Some(fixed) = &self.fixed {
                return Some(fixed.clone());
            }
            self.next += 1;
            Some(format!("{}{}", request.keyword.to_lowercase(), self.next))
        }
    }

    fn setup() -> (Store, Parser) {
        let vocab = Arc::new(Vocabulary::default());
        (Store::new(Arc::clone(&vocab)), Parser::new(vocab))
    }

    #[test]
    fn test_sites_resolve_by_position() {
        let (store, parser) = setup();
        let mut statement = parser.parse("write people: Newid = LastName, Newid = LastName");
        let mut resolver = Counter { next: 0, fixed: None };
        apply_keywords(&mut statement, &mut resolver, &store);
        assert!(!statement.is_error(), "{:?}", statement.errors);
        assert_eq!(
            statement.children,
            vec![
                ("newid1".to_string(), "lastname2".to_string()),
                ("newid3".to_string(), "lastname4".to_string()),
            ]
        );
    }

    #[test]
    fn test_generated_collision_is_duplicate() {
        let (store, parser) = setup();
        let mut statement = parser.parse("write people: Newid, Newid");
        let mut resolver = Counter {
            next: 0,
            fixed: Some("7".into()),
        };
        apply_keywords(&mut statement, &mut resolver, &store);
        assert_eq!(statement.errors, vec!["Children names cannot contain duplicates."]);
    }

    #[test]
    fn test_literal_resolver_keeps_text() {
        let (store, parser) = setup();
        let mut statement = parser.parse("write a = Integer 5");
        apply_keywords(&mut statement, &mut LiteralKeywords, &store);
        assert_eq!(statement.selected_value.as_deref(), Some("Integer 5"));
    }
}
