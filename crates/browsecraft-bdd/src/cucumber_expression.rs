//! Compiles Cucumber expressions (`I have {int} cukes`) into anchored
//! regexes with typed captures. `{string}`, `{int}`, `{float}` and
//! `{word}` are built in; callers can add more via `ParamTypeRegistry`.

use crate::error::BddError;
use regex::Regex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum CapturedValue {
    Str(String),
    Int(i64),
    Float(f64),
}

#[derive(Clone)]
pub struct ParameterType {
    pub name: String,
    pub regex: String,
    pub transform: Arc<dyn Fn(&str) -> CapturedValue + Send + Sync>,
}

impl std::fmt::Debug for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterType")
            .field("name", &self.name)
            .field("regex", &self.regex)
            .finish()
    }
}

/// User-defined parameter types layered on top of the four built-ins.
/// Built-ins cannot be shadowed.
#[derive(Default)]
pub struct ParamTypeRegistry {
    custom: Vec<ParameterType>,
}

impl ParamTypeRegistry {
    pub fn define(&mut self, param_type: ParameterType) {
        self.custom.retain(|p| p.name != param_type.name);
        self.custom.push(param_type);
    }

    fn lookup(&self, name: &str) -> Option<ParameterType> {
        match name {
            "string" => Some(ParameterType {
                name: "string".into(),
                regex: "\"([^\"]*)\"".into(),
                transform: Arc::new(|s| CapturedValue::Str(s.to_string())),
            }),
            "int" => Some(ParameterType {
                name: "int".into(),
                regex: "(-?\\d+)".into(),
                transform: Arc::new(|s| CapturedValue::Int(s.parse().unwrap_or_default())),
            }),
            "float" => Some(ParameterType {
                name: "float".into(),
                regex: "(-?\\d+\\.\\d+)".into(),
                transform: Arc::new(|s| CapturedValue::Float(s.parse().unwrap_or_default())),
            }),
            "word" => Some(ParameterType {
                name: "word".into(),
                regex: "(\\w+)".into(),
                transform: Arc::new(|s| CapturedValue::Str(s.to_string())),
            }),
            other => self.custom.iter().find(|p| p.name == other).cloned(),
        }
    }
}

#[derive(Clone)]
pub struct CompiledPattern {
    pub regex: Regex,
    pub transforms: Vec<Arc<dyn Fn(&str) -> CapturedValue + Send + Sync>>,
    /// The source text used for duplicate detection and `suggest()`
    /// ranking: the raw expression, or the raw regex source for a
    /// hand-supplied regex pattern.
    pub source: String,
}

impl std::fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPattern").field("source", &self.source).finish()
    }
}

/// Compiles a Cucumber expression string into an anchored regex plus the
/// per-capture transforms needed to type the matched groups.
pub fn compile_expression(
    registry: &ParamTypeRegistry,
    expr: &str,
) -> Result<CompiledPattern, BddError> {
    let mut pattern = String::from("^");
    let mut transforms = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    let mut literal = String::new();

    let flush_literal = |literal: &mut String, pattern: &mut String| {
        if !literal.is_empty() {
            pattern.push_str(&regex::escape(literal));
            literal.clear();
        }
    };

    while i < chars.len() {
        match chars[i] {
            '{' => {
                let Some(close) = chars[i..].iter().position(|c| *c == '}') else {
                    return Err(BddError::InvalidCucumberExpression(
                        expr.to_string(),
                        "unterminated '{'".into(),
                    ));
                };
                let name: String = chars[i + 1..i + close].iter().collect();
                let param = registry.lookup(&name).ok_or_else(|| {
                    BddError::UnknownParameterType(name.clone())
                })?;
                flush_literal(&mut literal, &mut pattern);
                pattern.push_str(&param.regex);
                transforms.push(param.transform);
                i += close + 1;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    flush_literal(&mut literal, &mut pattern);
    pattern.push('$');

    let regex = Regex::new(&pattern)?;
    Ok(CompiledPattern { regex, transforms, source: expr.to_string() })
}

/// Wraps a hand-supplied regex so it shares `CompiledPattern`'s shape;
/// every capture group is typed as a string.
pub fn compile_regex(source_regex: Regex) -> CompiledPattern {
    let groups = source_regex.captures_len().saturating_sub(1);
    let transforms = (0..groups)
        .map(|_| Arc::new(|s: &str| CapturedValue::Str(s.to_string())) as Arc<dyn Fn(&str) -> CapturedValue + Send + Sync>)
        .collect();
    let source = source_regex.as_str().to_string();
    CompiledPattern { regex: source_regex, transforms, source }
}

impl CompiledPattern {
    pub fn captures(&self, text: &str) -> Option<Vec<CapturedValue>> {
        let caps = self.regex.captures(text)?;
        let mut values = Vec::with_capacity(self.transforms.len());
        for (idx, transform) in self.transforms.iter().enumerate() {
            let group = caps.get(idx + 1)?;
            values.push(transform(group.as_str()));
        }
        Some(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_int_float_word_all_compile_and_capture() {
        let registry = ParamTypeRegistry::default();
        let compiled =
            compile_expression(&registry, "I have {int} {word} worth {float} in {string}").unwrap();
        let caps = compiled
            .captures("I have 3 apples worth 1.50 in \"my basket\"")
            .unwrap();
        assert_eq!(caps[0], CapturedValue::Int(3));
        assert_eq!(caps[1], CapturedValue::Str("apples".into()));
        assert_eq!(caps[2], CapturedValue::Float(1.50));
        assert_eq!(caps[3], CapturedValue::Str("my basket".into()));
    }

    #[test]
    fn unknown_parameter_type_errors() {
        let registry = ParamTypeRegistry::default();
        let err = compile_expression(&registry, "a {widget} appears").unwrap_err();
        assert!(matches!(err, BddError::UnknownParameterType(name) if name == "widget"));
    }

    #[test]
    fn custom_parameter_type_is_used() {
        let mut registry = ParamTypeRegistry::default();
        registry.define(ParameterType {
            name: "color".into(),
            regex: "(red|green|blue)".into(),
            transform: Arc::new(|s| CapturedValue::Str(s.to_string())),
        });
        let compiled = compile_expression(&registry, "the light is {color}").unwrap();
        let caps = compiled.captures("the light is green").unwrap();
        assert_eq!(caps[0], CapturedValue::Str("green".into()));
    }

    #[test]
    fn literal_regex_metacharacters_are_escaped() {
        let registry = ParamTypeRegistry::default();
        let compiled = compile_expression(&registry, "what is 2 + 2?").unwrap();
        assert!(compiled.captures("what is 2 + 2?").is_some());
        assert!(compiled.captures("what is 2x2?").is_none());
    }
}
