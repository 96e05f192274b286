//! The Gherkin 6 document AST. Every node carries a 1-based `line`.

/// A whole parsed source file. `feature` is `None` for input with no
/// recognizable Feature line; the parser never panics on malformed input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GherkinDocument {
    pub feature: Option<Feature>,
    pub comments: Vec<Comment>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub keyword: String,
    pub name: String,
    pub description: String,
    pub language: String,
    pub tags: Vec<Tag>,
    pub children: Vec<FeatureChild>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureChild {
    Background(Background),
    Scenario(Scenario),
    Rule(Rule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub keyword: String,
    pub name: String,
    pub tags: Vec<Tag>,
    pub children: Vec<RuleChild>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleChild {
    Background(Background),
    Scenario(Scenario),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    pub keyword: String,
    pub name: String,
    pub steps: Vec<Step>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub keyword: String,
    pub name: String,
    pub tags: Vec<Tag>,
    pub steps: Vec<Step>,
    pub examples: Vec<Examples>,
    pub line: usize,
}

impl Scenario {
    pub fn is_outline(&self) -> bool {
        !self.examples.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Examples {
    pub keyword: String,
    pub name: String,
    pub tags: Vec<Tag>,
    pub table_header: Option<TableRow>,
    pub table_body: Vec<TableRow>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub cells: Vec<String>,
    pub line: usize,
}

/// The step's literal keyword type, independent of position. `*` is
/// always `Conjunction`-like in that it inherits from the previous step;
/// see `KeywordType::Unknown` handling in the executor for the "nearest
/// preceding non-conjunction keyword" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordType {
    Context,
    Action,
    Outcome,
    Conjunction,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocString {
    pub content: String,
    pub media_type: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub keyword: String,
    pub keyword_type: KeywordType,
    pub text: String,
    pub line: usize,
    pub data_table: Option<Vec<TableRow>>,
    pub doc_string: Option<DocString>,
}

/// Resolves the *effective* keyword type of every step in `steps`: the
/// nearest preceding non-`Conjunction`/`Unknown` keyword type, in order.
/// A leading `And`/`But`/`*` with nothing before it falls back to its own
/// literal type.
pub fn effective_keyword_types(steps: &[Step]) -> Vec<KeywordType> {
    let mut effective = Vec::with_capacity(steps.len());
    let mut last_concrete = KeywordType::Unknown;
    for step in steps {
        let resolved = match step.keyword_type {
            KeywordType::Conjunction => last_concrete,
            KeywordType::Unknown => KeywordType::Unknown,
            concrete => {
                last_concrete = concrete;
                concrete
            }
        };
        effective.push(resolved);
    }
    effective
}
