//! Step registration and matching. Registration is expected to happen
//! once up front (the way `cucumber-rs`'s `#[given]`/`#[when]`/`#[then]`
//! macros populate a registry before `World::run` starts); matching is
//! read-only afterwards, so no interior synchronization is needed.

use crate::cucumber_expression::{
    compile_expression, compile_regex, CapturedValue, CompiledPattern, ParamTypeRegistry,
    ParameterType,
};
use crate::error::BddError;
use crate::tag_engine::TagExpr;
use browsecraft_gherkin::{DocString, KeywordType, TableRow};
use futures_util::future::BoxFuture;
use levenshtein::levenshtein;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKeyword {
    Given,
    When,
    Then,
    Any,
}

impl StepKeyword {
    /// "Any registrations match any effective_keyword; non-Any must
    /// match exactly." An effective keyword of `Unknown` (an
    /// unresolvable leading `*`) matches any registration, per the
    /// parser's "`*` matches any keyword type" rule.
    fn matches(self, effective: KeywordType) -> bool {
        if self == StepKeyword::Any || effective == KeywordType::Unknown {
            return true;
        }
        matches!(
            (self, effective),
            (StepKeyword::Given, KeywordType::Context)
                | (StepKeyword::When, KeywordType::Action)
                | (StepKeyword::Then, KeywordType::Outcome)
        )
    }
}

pub enum PatternSource {
    Expression(String),
    Regex(regex::Regex),
}

pub struct StepArgs<'a, W> {
    pub world: &'a mut W,
    pub captures: Vec<CapturedValue>,
    pub data_table: Option<&'a [TableRow]>,
    pub doc_string: Option<&'a DocString>,
}

pub type StepHandler<W> =
    Arc<dyn for<'a> Fn(StepArgs<'a, W>) -> BoxFuture<'a, Result<(), StepError>> + Send + Sync>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StepError {
    /// Sentinel thrown by a handler to mark the step `Pending`.
    #[error("pending")]
    Pending,
    #[error("{0}")]
    Failed(String),
}

struct Registration<W> {
    keyword: StepKeyword,
    is_concrete_expression: bool,
    pattern: CompiledPattern,
    tag_filter: Option<TagExpr>,
    handler: StepHandler<W>,
}

pub struct Match<'r, W> {
    pub handler: &'r StepHandler<W>,
    pub captures: Vec<CapturedValue>,
}

pub struct StepRegistry<W> {
    param_types: ParamTypeRegistry,
    registrations: Vec<Registration<W>>,
}

impl<W> Default for StepRegistry<W> {
    fn default() -> Self {
        StepRegistry { param_types: ParamTypeRegistry::default(), registrations: Vec::new() }
    }
}

impl<W> StepRegistry<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_parameter_type(&mut self, param_type: ParameterType) {
        self.param_types.define(param_type);
    }

    pub fn register(
        &mut self,
        keyword: StepKeyword,
        pattern: PatternSource,
        handler: StepHandler<W>,
    ) -> Result<(), BddError> {
        self.register_with_tags(keyword, pattern, None, handler)
    }

    pub fn register_with_tags(
        &mut self,
        keyword: StepKeyword,
        pattern: PatternSource,
        tag_filter: Option<&str>,
        handler: StepHandler<W>,
    ) -> Result<(), BddError> {
        let (compiled, is_concrete_expression) = match pattern {
            PatternSource::Expression(expr) => {
                let concrete = !expr.contains('{');
                (compile_expression(&self.param_types, &expr)?, concrete)
            }
            PatternSource::Regex(re) => (compile_regex(re), false),
        };

        if self
            .registrations
            .iter()
            .any(|r| r.keyword == keyword && r.pattern.source == compiled.source)
        {
            return Err(BddError::DuplicatePattern {
                keyword: format!("{keyword:?}"),
                pattern: compiled.source,
            });
        }

        let tag_filter = tag_filter.map(TagExpr::parse).transpose()?;
        self.registrations.push(Registration {
            keyword,
            is_concrete_expression,
            pattern: compiled,
            tag_filter,
            handler,
        });
        Ok(())
    }

    pub fn matches(
        &self,
        step_text: &str,
        effective_keyword: KeywordType,
        active_tags: &std::collections::HashSet<String>,
    ) -> Result<Option<Match<'_, W>>, BddError> {
        let mut candidates: Vec<(&Registration<W>, Vec<CapturedValue>)> = Vec::new();
        for reg in &self.registrations {
            if !reg.keyword.matches(effective_keyword) {
                continue;
            }
            if let Some(filter) = &reg.tag_filter {
                if !filter.evaluate(active_tags) {
                    continue;
                }
            }
            if let Some(captures) = reg.pattern.captures(step_text) {
                candidates.push((reg, captures));
            }
        }

        if candidates.is_empty() {
            return Ok(None);
        }
        if candidates.len() == 1 {
            let (reg, captures) = candidates.remove(0);
            return Ok(Some(Match { handler: &reg.handler, captures }));
        }

        let concrete: Vec<_> = candidates
            .iter()
            .enumerate()
            .filter(|(_, (reg, _))| reg.is_concrete_expression)
            .map(|(i, _)| i)
            .collect();
        if concrete.len() == 1 {
            let (reg, captures) = candidates.remove(concrete[0]);
            return Ok(Some(Match { handler: &reg.handler, captures }));
        }

        Err(BddError::AmbiguousStep {
            step_text: step_text.to_string(),
            candidates: candidates.iter().map(|(r, _)| r.pattern.source.clone()).collect(),
        })
    }

    /// Ranks registrations by Levenshtein distance between `step_text`
    /// and the registration's pattern source text.
    pub fn suggest(&self, step_text: &str, limit: usize) -> Vec<&str> {
        let mut ranked: Vec<(usize, &str)> = self
            .registrations
            .iter()
            .map(|r| (levenshtein(step_text, &r.pattern.source), r.pattern.source.as_str()))
            .collect();
        ranked.sort_by_key(|(dist, _)| *dist);
        ranked.into_iter().take(limit).map(|(_, source)| source).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_engine::normalize_tags;

    fn noop_handler<W: Send>() -> StepHandler<W> {
        Arc::new(|_args| Box::pin(async { Ok(()) }))
    }

    #[test]
    fn any_keyword_matches_given_when_then() {
        let mut registry: StepRegistry<()> = StepRegistry::new();
        registry
            .register(
                StepKeyword::Any,
                PatternSource::Expression("the page loads".into()),
                noop_handler(),
            )
            .unwrap();
        let tags = normalize_tags(std::iter::empty());
        assert!(registry.matches("the page loads", KeywordType::Context, &tags).unwrap().is_some());
        assert!(registry.matches("the page loads", KeywordType::Outcome, &tags).unwrap().is_some());
    }

    #[test]
    fn duplicate_pattern_is_rejected() {
        let mut registry: StepRegistry<()> = StepRegistry::new();
        registry
            .register(StepKeyword::Given, PatternSource::Expression("a user".into()), noop_handler())
            .unwrap();
        let err = registry
            .register(StepKeyword::Given, PatternSource::Expression("a user".into()), noop_handler())
            .unwrap_err();
        assert!(matches!(err, BddError::DuplicatePattern { .. }));
    }

    #[test]
    fn ambiguous_regex_matches_error_but_concrete_wins() {
        let mut registry: StepRegistry<()> = StepRegistry::new();
        registry
            .register(
                StepKeyword::Given,
                PatternSource::Regex(regex::Regex::new("^a (user|admin)$").unwrap()),
                noop_handler(),
            )
            .unwrap();
        registry
            .register(StepKeyword::Given, PatternSource::Regex(regex::Regex::new("^a user$").unwrap()), noop_handler())
            .unwrap();
        let tags = normalize_tags(std::iter::empty());
        let err = registry.matches("a user", KeywordType::Context, &tags).unwrap_err();
        assert!(matches!(err, BddError::AmbiguousStep { .. }));

        let mut registry2: StepRegistry<()> = StepRegistry::new();
        registry2
            .register(
                StepKeyword::Given,
                PatternSource::Regex(regex::Regex::new("^a (user|admin)$").unwrap()),
                noop_handler(),
            )
            .unwrap();
        registry2
            .register(StepKeyword::Given, PatternSource::Expression("a user".into()), noop_handler())
            .unwrap();
        let result = registry2.matches("a user", KeywordType::Context, &tags).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn tag_scoped_registration_requires_matching_tags() {
        let mut registry: StepRegistry<()> = StepRegistry::new();
        registry
            .register_with_tags(
                StepKeyword::Given,
                PatternSource::Expression("a premium user".into()),
                Some("@premium"),
                noop_handler(),
            )
            .unwrap();
        let with_tag = normalize_tags(["@premium"]);
        let without_tag = normalize_tags(std::iter::empty());
        assert!(registry.matches("a premium user", KeywordType::Context, &with_tag).unwrap().is_some());
        assert!(registry.matches("a premium user", KeywordType::Context, &without_tag).unwrap().is_none());
    }

    #[test]
    fn suggest_ranks_by_edit_distance() {
        let mut registry: StepRegistry<()> = StepRegistry::new();
        registry
            .register(StepKeyword::Given, PatternSource::Expression("a user logs in".into()), noop_handler())
            .unwrap();
        registry
            .register(StepKeyword::Given, PatternSource::Expression("a user logs out".into()), noop_handler())
            .unwrap();
        registry
            .register(StepKeyword::Given, PatternSource::Expression("the moon is full".into()), noop_handler())
            .unwrap();
        let suggestions = registry.suggest("a user logs i", 2);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0], "a user logs in");
    }
}
