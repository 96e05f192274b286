//! A line-oriented recursive-descent Gherkin 6 parser. Never panics on
//! malformed input — worst case it stops early and returns whatever
//! structure it already built, per the "best-effort" contract.

use crate::ast::*;
use crate::dialect::{dialect_for, Dialect};

/// Stateless entry point, named to match the BiDi-side components'
/// `Noun`-as-struct convention even though parsing holds no state of its
/// own between calls.
pub struct GherkinParser;

impl GherkinParser {
    pub fn parse(source: &str) -> GherkinDocument {
        parse(source)
    }
}

pub fn parse(source: &str) -> GherkinDocument {
    let raw_lines: Vec<&str> = source.lines().collect();
    let language = detect_language(&raw_lines);
    let dialect = dialect_for(&language);

    let mut parser = Cursor {
        lines: raw_lines,
        pos: 0,
        dialect,
        comments: Vec::new(),
    };
    parser.skip_language_directive();
    let feature = parser.parse_feature(&language);
    GherkinDocument {
        feature,
        comments: parser.comments,
        uri: None,
    }
}

fn detect_language(lines: &[&str]) -> String {
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("# language:") {
            return rest.trim().to_string();
        }
        break;
    }
    "en".to_string()
}

struct Cursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    dialect: &'static Dialect,
    comments: Vec<Comment>,
}

impl<'a> Cursor<'a> {
    fn line_no(&self) -> usize {
        self.pos + 1
    }

    fn current(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_language_directive(&mut self) {
        while let Some(line) = self.current() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                self.advance();
                continue;
            }
            if trimmed.starts_with("# language:") {
                self.advance();
            }
            break;
        }
    }

    fn skip_blank_only(&mut self) {
        while matches!(self.current(), Some(line) if line.trim().is_empty()) {
            self.advance();
        }
    }

    /// Skips blank lines and comment lines, recording the latter.
    fn skip_noise(&mut self) {
        while let Some(line) = self.current() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                self.advance();
            } else if trimmed.starts_with('#') {
                self.comments.push(Comment {
                    line: self.line_no(),
                    text: trimmed.trim_start_matches('#').trim().to_string(),
                });
                self.advance();
            } else {
                break;
            }
        }
    }

    fn collect_tags(&mut self) -> Vec<Tag> {
        let mut tags = Vec::new();
        loop {
            self.skip_blank_only();
            let Some(line) = self.current() else { break };
            let trimmed = line.trim();
            if !trimmed.starts_with('@') {
                break;
            }
            let line_no = self.line_no();
            for token in trimmed.split_whitespace() {
                if let Some(name) = token.strip_prefix('@') {
                    tags.push(Tag {
                        name: name.to_string(),
                        line: line_no,
                    });
                }
            }
            self.advance();
        }
        tags
    }

    fn peek_section(&self, candidates: &'static [&'static str]) -> bool {
        let Some(line) = self.current() else { return false };
        self.dialect
            .match_section_keyword(line.trim(), candidates)
            .is_some()
    }

    fn match_section(
        &mut self,
        candidates: &'static [&'static str],
    ) -> Option<(&'static str, String, usize)> {
        let line = self.current()?;
        let trimmed = line.trim();
        let keyword = self.dialect.match_section_keyword(trimmed, candidates)?;
        let rest = trimmed[keyword.len()..].trim_start();
        let name = rest.trim_start_matches(':').trim().to_string();
        let line_no = self.line_no();
        self.advance();
        Some((keyword, name, line_no))
    }

    fn parse_feature(&mut self, language: &str) -> Option<Feature> {
        self.skip_noise();
        let tags = self.collect_tags();
        self.skip_noise();
        let (keyword, name, line) = self.match_section(self.dialect.feature)?;

        let description = self.parse_description();

        let mut children = Vec::new();
        let mut background_taken = false;
        loop {
            self.skip_noise();
            if self.current().is_none() {
                break;
            }
            let checkpoint = self.pos;
            let lookahead_tags = self.collect_tags();
            self.skip_noise();

            if !background_taken && self.peek_section(self.dialect.background) {
                children.push(FeatureChild::Background(self.parse_background()));
                background_taken = true;
            } else if self.peek_section(self.dialect.rule) {
                children.push(FeatureChild::Rule(self.parse_rule(lookahead_tags)));
            } else if self.peek_section(self.dialect.scenario_outline)
                || self.peek_section(self.dialect.scenario)
            {
                children.push(FeatureChild::Scenario(self.parse_scenario(lookahead_tags)));
            } else {
                self.pos = checkpoint;
                break;
            }
        }

        Some(Feature {
            keyword: keyword.to_string(),
            name,
            description,
            language: language.to_string(),
            tags,
            children,
            line,
        })
    }

    fn parse_description(&mut self) -> String {
        let mut lines = Vec::new();
        loop {
            let Some(line) = self.current() else { break };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                self.advance();
                continue;
            }
            if trimmed.starts_with('@') || trimmed.starts_with('#') {
                break;
            }
            if self.peek_section(self.dialect.background)
                || self.peek_section(self.dialect.rule)
                || self.peek_section(self.dialect.scenario_outline)
                || self.peek_section(self.dialect.scenario)
            {
                break;
            }
            lines.push(trimmed.to_string());
            self.advance();
        }
        lines.join("\n")
    }

    fn parse_background(&mut self) -> Background {
        let (keyword, name, line) = self
            .match_section(self.dialect.background)
            .expect("caller already peeked a background line");
        let steps = self.parse_steps();
        Background {
            keyword: keyword.to_string(),
            name,
            steps,
            line,
        }
    }

    fn parse_rule(&mut self, tags: Vec<Tag>) -> Rule {
        let (keyword, name, line) = self
            .match_section(self.dialect.rule)
            .expect("caller already peeked a rule line");

        let mut children = Vec::new();
        let mut background_taken = false;
        loop {
            self.skip_noise();
            if self.current().is_none() {
                break;
            }
            let checkpoint = self.pos;
            let lookahead_tags = self.collect_tags();
            self.skip_noise();

            if !background_taken && self.peek_section(self.dialect.background) {
                children.push(RuleChild::Background(self.parse_background()));
                background_taken = true;
            } else if self.peek_section(self.dialect.scenario_outline)
                || self.peek_section(self.dialect.scenario)
            {
                children.push(RuleChild::Scenario(self.parse_scenario(lookahead_tags)));
            } else {
                self.pos = checkpoint;
                break;
            }
        }

        Rule {
            keyword: keyword.to_string(),
            name,
            tags,
            children,
            line,
        }
    }

    fn parse_scenario(&mut self, tags: Vec<Tag>) -> Scenario {
        let is_outline = self.peek_section(self.dialect.scenario_outline);
        let candidates = if is_outline {
            self.dialect.scenario_outline
        } else {
            self.dialect.scenario
        };
        let (keyword, name, line) = self
            .match_section(candidates)
            .expect("caller already peeked a scenario line");

        let steps = self.parse_steps();

        let mut examples = Vec::new();
        loop {
            self.skip_noise();
            if self.current().is_none() {
                break;
            }
            let checkpoint = self.pos;
            let lookahead_tags = self.collect_tags();
            self.skip_noise();
            if self.peek_section(self.dialect.examples) {
                examples.push(self.parse_examples(lookahead_tags));
            } else {
                self.pos = checkpoint;
                break;
            }
        }

        Scenario {
            keyword: keyword.to_string(),
            name,
            tags,
            steps,
            examples,
            line,
        }
    }

    fn parse_examples(&mut self, tags: Vec<Tag>) -> Examples {
        let (keyword, name, line) = self
            .match_section(self.dialect.examples)
            .expect("caller already peeked an examples line");
        self.skip_noise();
        let table_header = self.parse_table_row();
        let mut table_body = Vec::new();
        loop {
            self.skip_blank_only();
            if !self.peek_table_row() {
                break;
            }
            if let Some(row) = self.parse_table_row() {
                table_body.push(row);
            }
        }
        Examples {
            keyword: keyword.to_string(),
            name,
            tags,
            table_header,
            table_body,
            line,
        }
    }

    fn peek_table_row(&self) -> bool {
        self.current()
            .map(|line| line.trim_start().starts_with('|'))
            .unwrap_or(false)
    }

    fn parse_table_row(&mut self) -> Option<TableRow> {
        let line = self.current()?;
        if !line.trim_start().starts_with('|') {
            return None;
        }
        let line_no = self.line_no();
        let cells = split_table_row(line);
        self.advance();
        Some(TableRow {
            cells,
            line: line_no,
        })
    }

    fn parse_steps(&mut self) -> Vec<Step> {
        let mut steps = Vec::new();
        loop {
            self.skip_noise();
            let Some(line) = self.current() else { break };
            let trimmed = line.trim_start();
            let Some((keyword, kind)) = self.dialect.match_step_keyword(trimmed) else {
                break;
            };
            let line_no = self.line_no();
            let text = trimmed[keyword.len()..].trim().to_string();
            self.advance();

            let data_table = self.parse_optional_data_table();
            let doc_string = self.parse_optional_doc_string();

            steps.push(Step {
                keyword: keyword.to_string(),
                keyword_type: kind,
                text,
                line: line_no,
                data_table,
                doc_string,
            });
        }
        steps
    }

    fn parse_optional_data_table(&mut self) -> Option<Vec<TableRow>> {
        if !self.peek_table_row() {
            return None;
        }
        let mut rows = Vec::new();
        while let Some(row) = self.parse_table_row() {
            rows.push(row);
        }
        Some(rows)
    }

    fn parse_optional_doc_string(&mut self) -> Option<DocString> {
        let line = self.current()?;
        let indent = line.len() - line.trim_start().len();
        let trimmed_start = line.trim_start();
        let (delim, rest) = if let Some(rest) = trimmed_start.strip_prefix("\"\"\"") {
            ("\"\"\"", rest)
        } else if let Some(rest) = trimmed_start.strip_prefix("```") {
            ("```", rest)
        } else {
            return None;
        };
        let media_type = {
            let trimmed = rest.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };
        let line_no = self.line_no();
        self.advance();

        let mut content_lines = Vec::new();
        loop {
            let Some(line) = self.current() else { break };
            if line.trim_start() == delim {
                self.advance();
                break;
            }
            content_lines.push(strip_indent(line, indent));
            self.advance();
        }

        Some(DocString {
            content: content_lines.join("\n"),
            media_type,
            line: line_no,
        })
    }
}

fn strip_indent(line: &str, indent: usize) -> String {
    let mut stripped = 0usize;
    for (byte_idx, ch) in line.char_indices() {
        if stripped >= indent || !ch.is_whitespace() {
            return line[byte_idx..].to_string();
        }
        stripped += 1;
    }
    String::new()
}

fn split_table_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed
        .strip_prefix('|')
        .unwrap_or(trimmed)
        .strip_suffix('|')
        .unwrap_or(trimmed);

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'|') {
            current.push('|');
            chars.next();
        } else if c == '|' {
            cells.push(current.trim().to_string());
            current = String::new();
        } else {
            current.push(c);
        }
    }
    cells.push(current.trim().to_string());
    cells
}
