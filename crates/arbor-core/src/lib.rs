//! Arbor Core - Hierarchical store and query language
//!
//! This crate provides the statement parser, the node tree with its path
//! index, the rule engine and the per-verb operations of the Arbor embedded
//! database. It performs no I/O.

pub mod engine;
pub mod error;
pub mod generators;
pub mod keyword;
pub mod lexer;
pub mod limits;
pub mod operation;
pub mod parser;
pub mod rules;
pub mod script;
pub mod statement;
pub mod store;
pub mod value;
pub mod vocabulary;

pub use engine::{Engine, Reply, Tally};
pub use error::{Error, Result};
pub use generators::StandardGenerators;
pub use keyword::{apply_keywords, KeywordRequest, KeywordResolver, LiteralKeywords};
pub use operation::{Operation, Response};
pub use parser::Parser;
pub use rules::{PendingWrite, RuleEngine, RuleViolation};
pub use script::{split_statements, ScriptStatement};
pub use statement::{DataFormat, FieldRef, KeywordSite, Statement, WhereFilter};
pub use store::{Node, NodeId, Record, Store};
pub use value::ValueType;
pub use vocabulary::{RuleKind, Verb, Vocabulary};
