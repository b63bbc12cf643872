//! Statement parser
//!
//! [`Parser::parse`] never fails: every problem found is recorded on the
//! returned [`Statement`], whose verb is then [`Verb::Error`].

use crate::lexer::{join_text, tokenize, trim_spaces, Token};
use crate::limits::{validate_repeat_count, ValidationError};
use crate::statement::{FieldRef, KeywordSite, Statement};
use crate::value::is_basic_latin;
use crate::vocabulary::{Verb, Vocabulary};
use std::sync::Arc;
use tracing::debug;

const NAME_CHARS_MESSAGE: &str =
    "Node names can only contain letters, numbers, spaces, dashes, and underscores.";

/// Turns statement text into [`Statement`]s
#[derive(Debug, Clone)]
pub struct Parser {
    vocab: Arc<Vocabulary>,
}

impl Parser {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self { vocab }
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    /// Parse one statement (without its `;` terminator)
    pub fn parse(&self, text: &str) -> Statement {
        let text = strip_terminator(text.trim());
        let mut statement = Statement::new(text);
        self.parse_into(text, &mut statement);
        debug!(
            verb = %statement.verb,
            target = %statement.hierarchy_string(),
            errors = statement.errors.len(),
            "Parsed statement"
        );
        statement
    }

    fn parse_into(&self, text: &str, statement: &mut Statement) {
        if text.is_empty() {
            statement.verb = Verb::Comment;
            return;
        }

        if !is_basic_latin(text) {
            statement
                .add_error("Invalid characters encountered, only Unicode - Basic Latin is allowed.");
            return;
        }

        let text = text.replace("\\;", ";");

        if text.starts_with(&self.vocab.comment_marker) {
            statement.verb = Verb::Comment;
            return;
        }

        let tokens = match tokenize(&text, &self.vocab) {
            Ok(tokens) => tokens,
            Err(e) => {
                debug!(error = %e, "Lexical error");
                let message = format!("Illegal characters found in query: \"{}\".", statement.original);
                statement.add_error(message);
                return;
            }
        };

        let tokens = match self.take_repeat(&tokens) {
            Ok((tokens, repeat)) => {
                statement.repeat = repeat;
                tokens
            }
            Err(e) => {
                statement.add_error(e.to_string());
                return;
            }
        };

        if !self.chunk(tokens, statement) {
            let message = format!("Cannot interpret operation in query: \"{}\".", statement.original);
            statement.add_error(message);
            return;
        }

        let hierarchy = statement.hierarchy();
        let wildcards = hierarchy
            .iter()
            .filter(|name| self.vocab.is_wildcard(name))
            .count();
        let rule_nodes = hierarchy
            .iter()
            .filter(|name| self.vocab.is_rule_subtree(name))
            .count();
        if wildcards > 1 {
            statement.add_error("Child keyword cannot be used repeatedly in a statement.");
        }
        if rule_nodes > 1 {
            statement.add_error("Rule node name cannot be used repeatedly in a statement.");
        }

        self.detect_enforce(statement);

        let verb = statement.verb;
        if statement.selected_name.trim().is_empty() && verb.requires_argument() {
            statement.add_error(format!("{} requires an argument.", verb.title()));
        }

        if !self.check_names(statement) {
            return;
        }

        self.check_verb(verb, statement);

        if matches!(statement.verb, Verb::Rename | Verb::Enforce) {
            statement.keyword_sites.clear();
        }
    }

    /// Strip a trailing `Times <n>` modifier and return the repeat count
    fn take_repeat<'t>(&self, tokens: &'t [Token]) -> Result<(&'t [Token], u32), ValidationError> {
        let positions: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t, Token::Word(w) if *w == self.vocab.repeat_keyword))
            .map(|(i, _)| i)
            .collect();

        match positions.as_slice() {
            [] => Ok((tokens, 1)),
            [at] => {
                let preceded_by_space = *at > 0 && tokens[at - 1].is_space();
                match trim_spaces(&tokens[at + 1..]) {
                    [Token::Word(digits)] if preceded_by_space => {
                        let repeat = validate_repeat_count(digits)?;
                        Ok((trim_spaces(&tokens[..*at]), repeat))
                    }
                    _ => Err(ValidationError::RepeatCountMissing),
                }
            }
            _ => Err(ValidationError::RepeatKeywordRepeated),
        }
    }

    /// Split `<operation> <argument> [where <condition>]`; false when no
    /// operation matches
    fn chunk(&self, tokens: &[Token], statement: &mut Statement) -> bool {
        let tokens = trim_spaces(tokens);
        let verb = match tokens.first() {
            Some(Token::Word(word)) => match self.vocab.verb_for(word) {
                Some(verb) => verb,
                None => return false,
            },
            _ => return false,
        };
        if tokens.len() > 1 && !tokens[1].is_space() {
            return false;
        }
        statement.verb = verb;

        let rest = trim_spaces(&tokens[1..]);
        if verb.is_bare() {
            if !rest.is_empty() {
                statement.add_error(format!("{} should not have any arguments.", verb.title()));
            }
            return true;
        }

        let where_at = rest.iter().position(
            |t| matches!(t, Token::Word(w) if w.eq_ignore_ascii_case(&self.vocab.where_keyword)),
        );
        let (argument, condition) = match where_at {
            Some(at) => (trim_spaces(&rest[..at]), Some(trim_spaces(&rest[at + 1..]))),
            None => (rest, None),
        };

        self.parse_argument(argument, statement);
        if let Some(condition) = condition {
            self.parse_condition(condition, statement);
        }
        true
    }

    /// `[parent "."]* selected [":" children] ["=" value]`
    fn parse_argument(&self, tokens: &[Token], statement: &mut Statement) {
        let (head, children) = split_first(tokens, &Token::Colon);
        let (path, value) = split_first(head, &Token::Equals);

        let mut segments: Vec<String> = path
            .split(|t| *t == Token::Dot)
            .map(join_text)
            .collect();
        if segments.len() > 1 && segments.iter().any(String::is_empty) {
            statement.add_error(format!(
                "Node path '{}' contains an empty name.",
                join_text(path)
            ));
        }
        let selected = segments.pop().unwrap_or_default();
        statement.parents = segments;
        statement.selected_name = selected;
        if let Some(site) = self.keyword_site(path_tail(path), FieldRef::SelectedName) {
            statement.keyword_sites.push(site);
        }

        if let Some(value) = value {
            statement.selected_value = Some(join_text(value));
            if let Some(site) = self.keyword_site(value, FieldRef::SelectedValue) {
                statement.keyword_sites.push(site);
            }
        }

        if let Some(children) = children {
            self.parse_children(children, statement);
        }
    }

    fn parse_children(&self, tokens: &[Token], statement: &mut Statement) {
        // Names occupied by keyword sites resolve to distinct values later
        let mut plain_names: Vec<String> = Vec::new();

        for item in tokens.split(|t| *t == Token::Comma) {
            let item = trim_spaces(item);
            if item.is_empty() {
                continue;
            }
            let (name_tokens, value_tokens) = split_first(item, &Token::Equals);
            let name = join_text(name_tokens);
            let value = value_tokens.map(join_text).unwrap_or_default();
            let index = statement.children.len();

            if name.is_empty() {
                statement.add_error("Child names cannot be empty.");
            }

            match self.keyword_site(name_tokens, FieldRef::ChildName(index)) {
                Some(site) => statement.keyword_sites.push(site),
                None => {
                    if plain_names.contains(&name) {
                        statement.add_error("Children names cannot contain duplicates.");
                    }
                    plain_names.push(name.clone());
                }
            }
            if let Some(value_tokens) = value_tokens {
                if let Some(site) = self.keyword_site(value_tokens, FieldRef::ChildValue(index)) {
                    statement.keyword_sites.push(site);
                }
            }

            statement.children.push((name, value));
        }
    }

    /// `condItem ("," condItem)*` where `condItem := name ["=" value]`
    fn parse_condition(&self, tokens: &[Token], statement: &mut Statement) {
        if tokens.is_empty() {
            statement.add_error("A where condition requires at least one field.");
            return;
        }

        for item in tokens.split(|t| *t == Token::Comma) {
            let item = trim_spaces(item);
            let (field, value) = split_first(item, &Token::Equals);
            let field = trim_spaces(field);
            let field_ok = !field.is_empty() && field.iter().all(|t| t.is_space() || t.is_identifier());

            match value.map(trim_spaces) {
                Some(value)
                    if field_ok
                        && !value.is_empty()
                        && value.iter().all(|t| {
                            t.is_space()
                                || t.is_identifier()
                                || matches!(t, Token::Quoted { .. } | Token::Time(_))
                        }) =>
                {
                    statement.filter.add(join_text(field), Some(join_text(value)));
                }
                None if field_ok => statement.filter.add(join_text(field), None),
                _ => {
                    tracing::warn!(item = %join_text(item), "Uninterpretable where item");
                    statement.add_error(format!(
                        "Cannot interpret where condition item '{}'.",
                        join_text(item)
                    ));
                }
            }
        }
    }

    /// A `write` whose path starts at the rule subtree is an `enforce`
    fn detect_enforce(&self, statement: &mut Statement) {
        if statement.verb != Verb::Write {
            return;
        }
        let parents = &statement.parents;
        let rule_first = parents
            .first()
            .is_some_and(|p| self.vocab.is_rule_subtree(p));
        let rule_after_root = parents.len() > 1
            && self.vocab.is_root(&parents[0])
            && self.vocab.is_rule_subtree(&parents[1]);
        if rule_first || rule_after_root {
            statement.verb = Verb::Enforce;
        }
    }

    /// Character check on every parsed name; false stops further checks
    fn check_names(&self, statement: &mut Statement) -> bool {
        let names_ok = is_valid_name(&statement.selected_name)
            && statement.parents.iter().all(|p| is_valid_name(p))
            && statement.children.iter().all(|(name, _)| is_valid_name(name));
        if !names_ok {
            statement.add_error(NAME_CHARS_MESSAGE);
        }
        names_ok
    }

    fn check_verb(&self, verb: Verb, statement: &mut Statement) {
        let vocab = Arc::clone(&self.vocab);
        let selected = statement.selected_name.clone();
        let touches_root = vocab.is_root(&selected)
            || statement.children.iter().any(|(name, _)| vocab.is_root(name));

        match verb {
            Verb::Read => {
                if statement.selected_value.is_some() {
                    statement.add_error("Cannot set a value for the read operation.");
                }
                if statement.children.iter().any(|(_, value)| !value.is_empty()) {
                    statement.add_error("Children names cannot have values for the read operation.");
                }
            }
            Verb::Write => {
                if touches_root {
                    statement.add_error("Root is not a valid node to be written to.");
                }
                let reserved: Vec<String> = std::iter::once(selected.as_str())
                    .chain(statement.children.iter().map(|(name, _)| name.as_str()))
                    .filter(|name| vocab.is_reserved(name))
                    .map(String::from)
                    .collect();
                for name in reserved {
                    statement.add_error(format!("Cannot write to reserved word '{}'.", name));
                }
            }
            Verb::Delete => {
                if vocab.is_reserved(&selected) {
                    statement.add_error(format!("Cannot delete reserved word '{}'.", selected));
                }
                if vocab.is_rule_name(&selected) {
                    statement.add_error(format!("Cannot delete node rule '{}'.", selected));
                }
                if touches_root {
                    statement.add_error("Cannot delete root node.");
                }
                if statement.selected_value.is_some() {
                    statement.add_error("Cannot set a value for the delete operation.");
                }
                if !statement.children.is_empty() {
                    statement.add_error("Child nodes cannot be used in the delete operation.");
                }
            }
            Verb::Rename => {
                if vocab.is_reserved(&selected) {
                    statement.add_error(format!("Cannot rename reserved word '{}'.", selected));
                }
                if vocab.is_rule_name(&selected) {
                    statement.add_error(format!("Cannot rename node rule '{}'.", selected));
                }
                if touches_root {
                    statement.add_error("Root cannot be renamed.");
                }
                if !statement.children.is_empty() {
                    statement.add_error("Child nodes cannot be used in the rename operation.");
                }
                let new_name = statement.value_or_empty().to_string();
                if new_name.is_empty() {
                    statement.add_error("A value for renaming is required.");
                } else if !is_valid_name(&new_name) {
                    statement.add_error(NAME_CHARS_MESSAGE);
                } else if vocab.is_reserved(&new_name) {
                    statement.add_error(format!("Cannot rename to reserved word '{}'.", new_name));
                } else if vocab.is_keyword(&new_name) {
                    statement.add_error(format!("Cannot rename to keyword '{}'.", new_name));
                }
            }
            Verb::Enforce => self.check_enforce(statement),
            _ => {}
        }
    }

    fn check_enforce(&self, statement: &mut Statement) {
        let vocab = Arc::clone(&self.vocab);
        let selected = statement.selected_name.clone();
        let parents = statement.parents.clone();
        let Some(last) = parents.last() else {
            return;
        };
        let bad_ruleset_name = |name: &str| vocab.is_reserved(name) || vocab.is_keyword(name);

        if vocab.is_rule_subtree(last) {
            if bad_ruleset_name(&selected) {
                statement.add_error("Invalid rule set name.");
            }
            if !statement.value_or_empty().is_empty() {
                statement.add_error(format!(
                    "{}.{} cannot have a value written to it.",
                    vocab.rule_subtree, selected
                ));
            }
        } else {
            if !vocab.is_rule_name(&selected) {
                statement.add_error("Invalid rule name.");
            }
            let under_rule = parents.len() > 1 && vocab.is_rule_subtree(&parents[parents.len() - 2]);
            if !under_rule || bad_ruleset_name(last) {
                statement.add_error("Invalid rule set name.");
            }
        }

        if vocab.is_rule_name(&selected) && !statement.children.is_empty() {
            statement.add_error("Cannot set grandchildren for a rule definition node.");
        }

        let invalid: Vec<String> = statement
            .children
            .iter()
            .filter(|(name, _)| !vocab.is_rule_name(name))
            .map(|(name, _)| name.clone())
            .collect();
        for name in invalid {
            statement.add_error(format!("{} is an invalid rule name.", name));
        }
    }

    /// A field is a keyword site when it is exactly a generator keyword, or a
    /// keyword followed by one word parameter
    fn keyword_site(&self, tokens: &[Token], field: FieldRef) -> Option<KeywordSite> {
        match trim_spaces(tokens) {
            [Token::Keyword {
                keyword,
                raw,
                ordinal,
            }] if raw == keyword => Some(KeywordSite {
                keyword: keyword.clone(),
                parameter: None,
                field,
                ordinal: *ordinal,
            }),
            [Token::Keyword {
                keyword, ordinal, ..
            }, Token::Space, parameter]
                if parameter.is_identifier() =>
            {
                Some(KeywordSite {
                    keyword: keyword.clone(),
                    parameter: Some(parameter.text().to_string()),
                    field,
                    ordinal: *ordinal,
                })
            }
            _ => None,
        }
    }
}

fn strip_terminator(text: &str) -> &str {
    match text.strip_suffix(';') {
        Some(stripped) if !stripped.ends_with('\\') => stripped.trim_end(),
        _ => text,
    }
}

/// Letters, digits, spaces, dashes and underscores only
fn is_valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c.is_whitespace())
}

fn split_first<'t>(tokens: &'t [Token], separator: &Token) -> (&'t [Token], Option<&'t [Token]>) {
    match tokens.iter().position(|t| t == separator) {
        Some(at) => (&tokens[..at], Some(&tokens[at + 1..])),
        None => (tokens, None),
    }
}

/// Tokens of the last dotted segment
fn path_tail(tokens: &[Token]) -> &[Token] {
    match tokens.iter().rposition(|t| *t == Token::Dot) {
        Some(at) => &tokens[at + 1..],
        None => tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Statement {
        Parser::new(Arc::new(Vocabulary::default())).parse(text)
    }

    #[test]
    fn test_parse_read_with_where() {
        let s = parse("read company.employee where name = Ann, age");
        assert_eq!(s.verb, Verb::Read);
        assert_eq!(s.parents, vec!["company"]);
        assert_eq!(s.selected_name, "employee");
        assert_eq!(s.filter.fields()[0], ("name".to_string(), vec!["Ann".to_string()]));
        assert_eq!(s.filter.fields()[1], ("age".to_string(), vec![]));
        assert!(s.errors.is_empty());
    }

    #[test]
    fn test_parse_write_with_children() {
        let s = parse("WRITE a.b = 'x, y': c = 1.5, d, e = \"q\";");
        assert_eq!(s.verb, Verb::Write);
        assert_eq!(s.parents, vec!["a"]);
        assert_eq!(s.selected_name, "b");
        assert_eq!(s.selected_value.as_deref(), Some("x, y"));
        assert_eq!(
            s.children,
            vec![
                ("c".to_string(), "1.5".to_string()),
                ("d".to_string(), String::new()),
                ("e".to_string(), "q".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_empty_value() {
        let s = parse("write a =");
        assert_eq!(s.selected_value.as_deref(), Some(""));
        let s = parse("write a");
        assert_eq!(s.selected_value, None);
    }

    #[test]
    fn test_time_literal_value() {
        let s = parse("write shift: start = 08:30:00, end = 17:00:00");
        assert!(s.errors.is_empty(), "{:?}", s.errors);
        assert_eq!(s.child_value("start"), Some("08:30:00"));
    }

    #[test]
    fn test_comments_and_empty() {
        assert_eq!(parse("// anything ; at all").verb, Verb::Comment);
        assert_eq!(parse("   ").verb, Verb::Comment);
    }

    #[test]
    fn test_repeat() {
        let s = parse("write a = Integer Times 5");
        assert_eq!(s.repeat, 5);
        assert_eq!(s.selected_value.as_deref(), Some("Integer"));

        let s = parse("read a Times 10000000");
        assert_eq!(s.errors, vec!["Only 9,999,999 iterations are allowed."]);

        let s = parse("read a Times 2 Times 3");
        assert_eq!(
            s.errors,
            vec!["The Times keyword can only be used once in a statement."]
        );

        assert!(parse("read a Times 0").is_error());
        assert!(parse("read a Times x").is_error());
    }

    #[test]
    fn test_illegal_characters() {
        let s = parse("read a#b");
        assert_eq!(s.errors, vec!["Illegal characters found in query: \"read a#b\"."]);
        let s = parse("read é");
        assert!(s.errors[0].starts_with("Invalid characters encountered"));
    }

    #[test]
    fn test_unknown_operation() {
        let s = parse("fetch a");
        assert_eq!(s.errors, vec!["Cannot interpret operation in query: \"fetch a\"."]);
        assert!(parse("reada").is_error());
    }

    #[test]
    fn test_duplicate_children() {
        let s = parse("write a: b, b");
        assert_eq!(s.errors, vec!["Children names cannot contain duplicates."]);
    }

    #[test]
    fn test_repeated_keywords_are_not_duplicates() {
        let s = parse("write people: Newid = FirstNameMale, Newid = LastName unique");
        assert!(s.errors.is_empty(), "{:?}", s.errors);
        assert_eq!(s.keyword_sites.len(), 4);
        assert_eq!(s.keyword_sites[1].field, FieldRef::ChildValue(0));
        assert_eq!(s.keyword_sites[3].parameter.as_deref(), Some("unique"));
    }

    #[test]
    fn test_quoted_keyword_is_literal() {
        let s = parse("write a = 'Newid'");
        assert!(s.keyword_sites.is_empty());
    }

    #[test]
    fn test_invalid_names() {
        let s = parse("write a = b: 'c.d' = 1");
        assert_eq!(s.errors, vec![NAME_CHARS_MESSAGE]);
        assert!(parse("read a..b").is_error());
    }

    #[test]
    fn test_requires_argument() {
        let s = parse("read");
        assert_eq!(s.errors, vec!["Read requires an argument."]);
    }

    #[test]
    fn test_bare_verbs() {
        assert_eq!(parse("exit").verb, Verb::Exit);
        assert_eq!(parse("begin;").verb, Verb::Begin);
        let s = parse("commit now");
        assert_eq!(s.errors, vec!["Commit should not have any arguments."]);
    }

    #[test]
    fn test_enforce_detection() {
        let s = parse("write rule.age: type = integer, max = 10");
        assert_eq!(s.verb, Verb::Enforce);
        let s = parse("write Root.rule.age.max = 10");
        assert_eq!(s.verb, Verb::Enforce);
        assert_eq!(s.selected_name, "max");
    }

    #[test]
    fn test_enforce_errors() {
        let s = parse("write rule.age.colour = red");
        assert!(s.errors.contains(&"Invalid rule name.".to_string()));
        let s = parse("write rule.age: colour = red");
        assert_eq!(s.errors, vec!["colour is an invalid rule name."]);
        let s = parse("write rule.age = 5");
        assert_eq!(s.errors, vec!["rule.age cannot have a value written to it."]);
        let s = parse("write rule.max");
        assert_eq!(s.errors, vec!["Invalid rule set name."]);
        let s = parse("write rule.a.b.max = 1");
        assert_eq!(s.errors, vec!["Invalid rule set name."]);
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(
            parse("write Root = 1").errors,
            vec!["Root is not a valid node to be written to."]
        );
        assert_eq!(parse("delete Root").errors, vec!["Cannot delete root node."]);
        assert_eq!(parse("rename Root = x").errors, vec!["Root cannot be renamed."]);
        assert_eq!(
            parse("delete max").errors,
            vec!["Cannot delete reserved word 'max'.", "Cannot delete node rule 'max'."]
        );
        assert_eq!(
            parse("write config").errors,
            vec!["Cannot write to reserved word 'config'."]
        );
        assert_eq!(
            parse("read a = b").errors,
            vec!["Cannot set a value for the read operation."]
        );
        assert_eq!(
            parse("delete a: b").errors,
            vec!["Child nodes cannot be used in the delete operation."]
        );
    }

    #[test]
    fn test_rename_checks() {
        assert_eq!(parse("rename a").errors, vec!["A value for renaming is required."]);
        assert_eq!(
            parse("rename a = rule").errors,
            vec!["Cannot rename to reserved word 'rule'."]
        );
        assert_eq!(
            parse("rename a = Child").errors,
            vec!["Cannot rename to keyword 'Child'."]
        );
        let s = parse("rename a.b = c");
        assert!(s.errors.is_empty());
        assert_eq!(s.selected_value.as_deref(), Some("c"));
    }

    #[test]
    fn test_wildcard_and_rule_repeats() {
        assert!(parse("read Child.Child").is_error());
        assert!(parse("read rule.rule").is_error());
    }

    #[test]
    fn test_bad_where_item() {
        let s = parse("read a where b.c = d");
        assert_eq!(s.errors, vec!["Cannot interpret where condition item 'b.c = d'."]);
    }
}
