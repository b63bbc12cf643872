//! Statement processing entry point

use crate::generators::StandardGenerators;
use crate::keyword::{apply_keywords, KeywordResolver};
use crate::operation::{Operation, Response};
use crate::parser::Parser;
use crate::statement::{DataFormat, Statement};
use crate::store::Store;
use crate::vocabulary::{Verb, Vocabulary};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// A distinct response and how many repetitions produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub response: Response,
    pub times: u32,
}

/// Everything produced by one call to [`Engine::execute`]
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    /// The statement as first parsed
    pub statement: Statement,
    /// Distinct responses in first-seen order
    pub tallies: Vec<Tally>,
}

impl Reply {
    pub fn is_error(&self) -> bool {
        self.tallies.iter().any(|t| t.response.is_error())
    }

    /// Total number of affected nodes across all repetitions
    pub fn count(&self) -> usize {
        self.tallies
            .iter()
            .map(|t| t.response.count * t.times as usize)
            .sum()
    }

    /// Response texts, each suffixed with ` (*n)` when repeated
    pub fn text(&self) -> String {
        self.tallies
            .iter()
            .map(|tally| match tally.times {
                1 => tally.response.text(),
                n => format!("{} (*{})", tally.response.text(), n),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

/// Parser, store and keyword resolver driven one statement at a time
pub struct Engine {
    parser: Parser,
    store: Store,
    resolver: Box<dyn KeywordResolver + Send + Sync>,
    format: DataFormat,
    persist: bool,
    exit: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("nodes", &self.store.len())
            .field("format", &self.format)
            .field("persist", &self.persist)
            .field("exit", &self.exit)
            .finish()
    }
}

impl Engine {
    /// Engine over an empty store with the standard generators
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self {
            parser: Parser::new(Arc::clone(&vocab)),
            store: Store::new(vocab),
            resolver: Box::new(StandardGenerators::new()),
            format: DataFormat::default(),
            persist: false,
            exit: false,
        }
    }

    pub fn with_store(mut self, store: Store) -> Self {
        self.store = store;
        self
    }

    pub fn with_resolver(mut self, resolver: impl KeywordResolver + Send + Sync + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = format;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn set_format(&mut self, format: DataFormat) {
        self.format = format;
    }

    /// True when the last statement changed at least one node
    pub fn should_persist(&self) -> bool {
        self.persist
    }

    /// True once `exit` has been executed
    pub fn should_exit(&self) -> bool {
        self.exit
    }

    /// Execute one statement and return its response text
    pub fn process(&mut self, text: &str) -> String {
        self.execute(text).text()
    }

    /// Execute one statement, repeating it as its `Times` modifier asks
    pub fn execute(&mut self, text: &str) -> Reply {
        self.persist = false;
        let mut statement = self.parser.parse(text);
        statement.format = self.format;

        let first = statement.clone();
        let mut tallies: Vec<Tally> = Vec::new();
        for iteration in 0..first.repeat {
            if iteration > 0 {
                // Keywords must produce fresh values on every repetition
                statement = self.parser.parse(text);
                statement.format = self.format;
            }
            let response = self.run(&mut statement);
            self.persist |= response.changed;

            match tallies.iter_mut().find(|t| t.response == response) {
                Some(tally) => tally.times += 1,
                None => tallies.push(Tally { response, times: 1 }),
            }
            if statement.is_error() {
                break;
            }
        }

        debug!(
            verb = %first.verb,
            repeat = first.repeat,
            persist = self.persist,
            "Executed statement"
        );
        Reply {
            statement: first,
            tallies,
        }
    }

    fn run(&mut self, statement: &mut Statement) -> Response {
        match statement.verb {
            Verb::Error => return Response::errors(&statement.errors),
            Verb::Comment => return Response::message(Verb::Comment, ""),
            Verb::Exit => {
                self.exit = true;
                return Response::message(Verb::Exit, "Bye!");
            }
            Verb::Begin => return Response::message(Verb::Begin, "No transaction started."),
            Verb::Commit => return Response::message(Verb::Commit, "Nothing to commit."),
            Verb::Rollback => return Response::message(Verb::Rollback, "Nothing to roll back."),
            _ => {}
        }

        apply_keywords(statement, self.resolver.as_mut(), &self.store);
        if statement.is_error() {
            return Response::errors(&statement.errors);
        }
        let Some(operation) = Operation::from_statement(statement) else {
            return Response::message(statement.verb, "");
        };

        match operation.execute(statement, &mut self.store) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, statement = %statement.original, "Operation failed");
                statement.add_error(e.to_string());
                Response::errors(&statement.errors)
            }
        }
    }
}
