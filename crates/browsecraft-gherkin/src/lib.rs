//! A line-oriented, multi-language Gherkin 6 parser producing a typed
//! feature AST. Scenario Outline expansion is left to the executor layer;
//! this crate only produces `tableHeader`/`tableBody`.

pub mod ast;
pub mod dialect;
pub mod parser;

pub use ast::{
    effective_keyword_types, Background, Comment, DocString, Examples, Feature, FeatureChild,
    GherkinDocument, KeywordType, Rule, RuleChild, Scenario, Step, Tag, TableRow,
};
pub use dialect::{dialect_for, Dialect};
pub use parser::{parse, GherkinParser};
