//! Errors from tag-expression parsing, step/hook registration, and
//! scenario execution.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagExprError {
    #[error("empty tag expression")]
    EmptyExpression,
    #[error("unexpected character {found:?} at position {pos}")]
    UnexpectedCharacter { found: char, pos: usize },
    #[error("'@' with no tag name at position {pos}")]
    LoneAt { pos: usize },
    #[error("unbalanced parentheses")]
    UnbalancedParens,
}

#[derive(Debug, Error)]
pub enum BddError {
    #[error("duplicate step registration for {keyword:?} {pattern:?}")]
    DuplicatePattern { keyword: String, pattern: String },
    #[error("ambiguous step {step_text:?}: matches {candidates:?}")]
    AmbiguousStep {
        step_text: String,
        candidates: Vec<String>,
    },
    #[error("unknown parameter type {0:?}")]
    UnknownParameterType(String),
    #[error("invalid cucumber expression {0:?}: {1}")]
    InvalidCucumberExpression(String, String),
    #[error(transparent)]
    TagExpr(#[from] TagExprError),
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error("hook failed in scope {scope}: {message}")]
    Hook { scope: String, message: String },
    #[error("world factory failed: {0}")]
    WorldFactory(String),
}
