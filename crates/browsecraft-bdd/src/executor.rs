//! Drives a parsed `GherkinDocument` against a `StepRegistry` and
//! `HookRegistry`, producing a `FeatureResult` per feature and a merged
//! `Summary`.

use crate::ai_step::{AiMode, AiStepExecutor};
use crate::error::BddError;
use crate::hook_registry::{HookRegistry, HookScope};
use crate::results::{FeatureResult, ScenarioResult, ScenarioStatus, StepResult, StepStatus, Summary};
use crate::step_registry::{StepArgs, StepError, StepRegistry};
use crate::tag_engine::{normalize_tags, TagExpr};
use browsecraft_gherkin::{
    effective_keyword_types, Background, Feature, FeatureChild, GherkinDocument, KeywordType,
    RuleChild, Scenario, Step,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type ScenarioFilterFn = Arc<dyn Fn(&str, &[String], Option<&str>) -> bool + Send + Sync>;
pub type OnScenarioEndFn = Arc<dyn Fn(&ScenarioResult) + Send + Sync>;
pub type WorldFactory<W> = Arc<dyn Fn() -> Result<W, String> + Send + Sync>;

pub struct ExecutorOptions {
    pub fail_fast: bool,
    pub default_step_timeout_ms: u64,
    pub grep: Option<String>,
    pub tag_filter: Option<TagExpr>,
    pub scenario_filter: Option<ScenarioFilterFn>,
    pub on_scenario_end: Option<OnScenarioEndFn>,
    pub ai_step_executor: Option<Arc<dyn AiStepExecutor>>,
    pub ai_mode: AiMode,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        ExecutorOptions {
            fail_fast: false,
            default_step_timeout_ms: 60_000,
            grep: None,
            tag_filter: None,
            scenario_filter: None,
            on_scenario_end: None,
            ai_step_executor: None,
            ai_mode: AiMode::Auto,
        }
    }
}

enum StepOutcome {
    Pending,
    Failed(String),
    Undefined,
}

pub struct BddExecutor<W> {
    step_registry: Arc<StepRegistry<W>>,
    hook_registry: Arc<HookRegistry<W>>,
    world_factory: WorldFactory<W>,
    options: ExecutorOptions,
}

impl<W: Send + Default> BddExecutor<W> {
    pub fn new(
        step_registry: Arc<StepRegistry<W>>,
        hook_registry: Arc<HookRegistry<W>>,
        world_factory: WorldFactory<W>,
        options: ExecutorOptions,
    ) -> Self {
        BddExecutor { step_registry, hook_registry, world_factory, options }
    }

    /// `beforeAll`/`afterAll` wrap every document in `docs`. Stops handing
    /// out further scenarios once `fail_fast` trips, but still runs
    /// `afterAll`.
    pub async fn run_documents(&self, docs: &[GherkinDocument]) -> Result<Vec<FeatureResult>, BddError> {
        let empty_tags = HashSet::new();
        self.hook_registry.run_global(HookScope::BeforeAll, &empty_tags).await?;

        let mut results = Vec::new();
        let mut aborted = false;
        for doc in docs {
            if aborted {
                break;
            }
            if let Some(feature) = &doc.feature {
                let result = self.run_feature(feature, doc.uri.as_deref(), &mut aborted).await?;
                results.push(result);
            }
        }

        self.hook_registry.run_global(HookScope::AfterAll, &empty_tags).await?;
        Ok(results)
    }

    async fn run_feature(
        &self,
        feature: &Feature,
        uri: Option<&str>,
        aborted: &mut bool,
    ) -> Result<FeatureResult, BddError> {
        let feature_tags = tag_names(&feature.tags);
        let feature_tag_set = normalize_tags(feature_tags.iter().map(String::as_str));
        self.hook_registry.run_global(HookScope::BeforeFeature, &feature_tag_set).await?;

        let feature_background = feature.children.iter().find_map(|c| match c {
            FeatureChild::Background(bg) => Some(bg),
            _ => None,
        });

        let mut scenario_results = Vec::new();
        let mut summary = Summary::default();

        'children: for child in &feature.children {
            if *aborted {
                break 'children;
            }
            match child {
                FeatureChild::Background(_) => {}
                FeatureChild::Scenario(scenario) => {
                    let background_steps = collect_background_steps(feature_background, None);
                    self.run_scenario_or_outline(
                        scenario,
                        &feature_tags,
                        &background_steps,
                        uri,
                        &mut scenario_results,
                        &mut summary,
                        aborted,
                    )
                    .await;
                }
                FeatureChild::Rule(rule) => {
                    let rule_tags: Vec<String> =
                        feature_tags.iter().cloned().chain(tag_names(&rule.tags)).collect();
                    let rule_background = rule.children.iter().find_map(|c| match c {
                        RuleChild::Background(bg) => Some(bg),
                        _ => None,
                    });
                    let background_steps = collect_background_steps(feature_background, rule_background);
                    for rchild in &rule.children {
                        if *aborted {
                            break;
                        }
                        if let RuleChild::Scenario(scenario) = rchild {
                            self.run_scenario_or_outline(
                                scenario,
                                &rule_tags,
                                &background_steps,
                                uri,
                                &mut scenario_results,
                                &mut summary,
                                aborted,
                            )
                            .await;
                        }
                    }
                }
            }
        }

        self.hook_registry.run_global(HookScope::AfterFeature, &feature_tag_set).await?;

        Ok(FeatureResult { name: feature.name.clone(), scenarios: scenario_results, summary })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_scenario_or_outline(
        &self,
        scenario: &Scenario,
        inherited_tags: &[String],
        background_steps: &[&Step],
        uri: Option<&str>,
        scenario_results: &mut Vec<ScenarioResult>,
        summary: &mut Summary,
        aborted: &mut bool,
    ) {
        let runs: Vec<(String, Vec<String>, Vec<Step>)> = if scenario.is_outline() {
            expand_outline(scenario)
        } else {
            vec![(
                scenario.name.clone(),
                scenario.tags.iter().map(|t| t.name.clone()).collect(),
                scenario.steps.clone(),
            )]
        };

        for (name, own_tags, steps) in runs {
            if *aborted {
                break;
            }
            let all_tags: Vec<String> = inherited_tags.iter().cloned().chain(own_tags).collect();

            if !self.passes_filters(&name, &all_tags, uri) {
                let result = skipped_result(&name, scenario.line, all_tags);
                summary.record(result.status);
                scenario_results.push(result);
                continue;
            }

            let result = self.run_single_scenario(&name, scenario.line, all_tags, background_steps, &steps).await;
            if matches!(result.status, ScenarioStatus::Failed) && self.options.fail_fast {
                *aborted = true;
            }
            summary.record(result.status);
            scenario_results.push(result);
        }
    }

    fn passes_filters(&self, name: &str, tags: &[String], uri: Option<&str>) -> bool {
        if let Some(filter) = &self.options.scenario_filter {
            if !filter(name, tags, uri) {
                return false;
            }
        }
        if let Some(grep) = &self.options.grep {
            if !name.to_lowercase().contains(&grep.to_lowercase()) {
                return false;
            }
        }
        if let Some(expr) = &self.options.tag_filter {
            let tag_set = normalize_tags(tags.iter().map(String::as_str));
            if !expr.evaluate(&tag_set) {
                return false;
            }
        }
        true
    }

    async fn run_single_scenario(
        &self,
        name: &str,
        line: usize,
        tags: Vec<String>,
        background_steps: &[&Step],
        own_steps: &[Step],
    ) -> ScenarioResult {
        let start = Instant::now();
        let tag_set = normalize_tags(tags.iter().map(String::as_str));

        let mut all_steps: Vec<Step> = background_steps.iter().map(|s| (*s).clone()).collect();
        all_steps.extend(own_steps.iter().cloned());
        let effective = effective_keyword_types(&all_steps);

        let mut world = match (self.world_factory)() {
            Ok(world) => world,
            Err(message) => {
                let mut fallback = W::default();
                let _ = self.hook_registry.run_world(HookScope::AfterScenario, &mut fallback, &tag_set).await;
                return ScenarioResult {
                    name: name.to_string(),
                    status: ScenarioStatus::Failed,
                    steps: Vec::new(),
                    duration_ms: elapsed_ms(start),
                    tags,
                    line,
                    hook_error: Some(message),
                };
            }
        };

        if let Err(err) = self.hook_registry.run_world(HookScope::BeforeScenario, &mut world, &tag_set).await {
            let _ = self.hook_registry.run_world(HookScope::AfterScenario, &mut world, &tag_set).await;
            let result = ScenarioResult {
                name: name.to_string(),
                status: ScenarioStatus::Failed,
                steps: Vec::new(),
                duration_ms: elapsed_ms(start),
                tags,
                line,
                hook_error: Some(err.to_string()),
            };
            if let Some(callback) = &self.options.on_scenario_end {
                callback(&result);
            }
            return result;
        }

        let mut step_results = Vec::with_capacity(all_steps.len());
        let mut blocked = false;

        for (step, eff_kind) in all_steps.iter().zip(effective.iter()) {
            if blocked {
                step_results.push(StepResult {
                    keyword: step.keyword.clone(),
                    text: step.text.clone(),
                    status: StepStatus::Skipped,
                    duration_ms: 0,
                    error: None,
                });
                continue;
            }

            let _ = self.hook_registry.run_world(HookScope::BeforeStep, &mut world, &tag_set).await;

            let step_start = Instant::now();
            let outcome = self.run_step(step, *eff_kind, &tag_set, &mut world).await;
            let duration_ms = elapsed_ms(step_start);

            let _ = self.hook_registry.run_world(HookScope::AfterStep, &mut world, &tag_set).await;

            let (status, error) = match outcome {
                Ok(()) => (StepStatus::Passed, None),
                Err(StepOutcome::Pending) => (StepStatus::Pending, None),
                Err(StepOutcome::Failed(msg)) => (StepStatus::Failed, Some(msg)),
                Err(StepOutcome::Undefined) => (StepStatus::Undefined, None),
            };
            if matches!(status, StepStatus::Failed | StepStatus::Pending | StepStatus::Undefined) {
                blocked = true;
            }
            tracing::debug!(step = %step.text, ?status, duration_ms, "step finished");
            step_results.push(StepResult {
                keyword: step.keyword.clone(),
                text: step.text.clone(),
                status,
                duration_ms,
                error,
            });
        }

        let _ = self.hook_registry.run_world(HookScope::AfterScenario, &mut world, &tag_set).await;

        let result = ScenarioResult {
            name: name.to_string(),
            status: scenario_status(&step_results),
            steps: step_results,
            duration_ms: elapsed_ms(start),
            tags,
            line,
            hook_error: None,
        };
        if let Some(callback) = &self.options.on_scenario_end {
            callback(&result);
        }
        result
    }

    async fn run_step(
        &self,
        step: &Step,
        eff: KeywordType,
        tags: &HashSet<String>,
        world: &mut W,
    ) -> Result<(), StepOutcome> {
        let data_table = step.data_table.as_deref();
        match self.step_registry.matches(&step.text, eff, tags) {
            Ok(Some(found)) => {
                let args = StepArgs {
                    world,
                    captures: found.captures,
                    data_table,
                    doc_string: step.doc_string.as_ref(),
                };
                let fut = (found.handler)(args);
                let timeout = Duration::from_millis(self.options.default_step_timeout_ms);
                match tokio::time::timeout(timeout, fut).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(StepError::Pending)) => Err(StepOutcome::Pending),
                    Ok(Err(StepError::Failed(msg))) => Err(StepOutcome::Failed(msg)),
                    Err(_) => Err(StepOutcome::Failed(format!(
                        "step timed out after {}ms",
                        self.options.default_step_timeout_ms
                    ))),
                }
            }
            Ok(None) => {
                if let Some(executor) = &self.options.ai_step_executor {
                    let outcome = executor.try_handle(&step.text, self.options.ai_mode).await;
                    if outcome.handled {
                        return if outcome.passed {
                            Ok(())
                        } else {
                            Err(StepOutcome::Failed(outcome.error.unwrap_or_default()))
                        };
                    }
                }
                Err(StepOutcome::Undefined)
            }
            Err(err) => Err(StepOutcome::Failed(err.to_string())),
        }
    }
}

fn tag_names(tags: &[browsecraft_gherkin::Tag]) -> Vec<String> {
    tags.iter().map(|t| t.name.clone()).collect()
}

fn collect_background_steps<'a>(
    feature_bg: Option<&'a Background>,
    rule_bg: Option<&'a Background>,
) -> Vec<&'a Step> {
    let mut steps = Vec::new();
    if let Some(bg) = feature_bg {
        steps.extend(bg.steps.iter());
    }
    if let Some(bg) = rule_bg {
        steps.extend(bg.steps.iter());
    }
    steps
}

fn skipped_result(name: &str, line: usize, tags: Vec<String>) -> ScenarioResult {
    ScenarioResult {
        name: name.to_string(),
        status: ScenarioStatus::Skipped,
        steps: Vec::new(),
        duration_ms: 0,
        tags,
        line,
        hook_error: None,
    }
}

fn scenario_status(steps: &[StepResult]) -> ScenarioStatus {
    if steps.iter().any(|s| s.status == StepStatus::Failed) {
        ScenarioStatus::Failed
    } else if steps.iter().any(|s| s.status == StepStatus::Pending) {
        ScenarioStatus::Pending
    } else if steps.iter().any(|s| s.status == StepStatus::Undefined) {
        ScenarioStatus::Undefined
    } else {
        ScenarioStatus::Passed
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Expands every `Examples` row of a Scenario Outline into a standalone
/// `(name, tags, steps)` run, substituting `<col>` placeholders into
/// step text and doc-string content.
fn expand_outline(scenario: &Scenario) -> Vec<(String, Vec<String>, Vec<Step>)> {
    let mut runs = Vec::new();
    for examples in &scenario.examples {
        let Some(header) = &examples.table_header else { continue };
        for row in &examples.table_body {
            let steps: Vec<Step> = scenario
                .steps
                .iter()
                .map(|step| substitute_step(step, &header.cells, &row.cells))
                .collect();
            let tags: Vec<String> = scenario
                .tags
                .iter()
                .map(|t| t.name.clone())
                .chain(examples.tags.iter().map(|t| t.name.clone()))
                .collect();
            let name = substitute_text(&scenario.name, &header.cells, &row.cells);
            runs.push((name, tags, steps));
        }
    }
    runs
}

fn substitute_step(step: &Step, header: &[String], row: &[String]) -> Step {
    let mut substituted = step.clone();
    substituted.text = substitute_text(&substituted.text, header, row);
    if let Some(doc_string) = &mut substituted.doc_string {
        doc_string.content = substitute_text(&doc_string.content, header, row);
    }
    substituted
}

fn substitute_text(text: &str, header: &[String], row: &[String]) -> String {
    let mut out = text.to_string();
    for (col, val) in header.iter().zip(row.iter()) {
        out = out.replace(&format!("<{col}>"), val);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook_registry::HookOptions;
    use crate::step_registry::{PatternSource, StepKeyword};
    use browsecraft_gherkin::GherkinParser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TestWorld {
        counter: usize,
    }

    fn sample_feature() -> GherkinDocument {
        let source = "Feature: math\n\n  Scenario: addition\n    Given a number 1\n    When I add 2\n    Then the total is 3\n";
        GherkinParser::parse(source)
    }

    #[tokio::test]
    async fn passing_scenario_reports_passed_with_all_steps() {
        let mut registry: StepRegistry<TestWorld> = StepRegistry::new();
        registry
            .register(
                StepKeyword::Given,
                PatternSource::Expression("a number {int}".into()),
                Arc::new(|args: StepArgs<'_, TestWorld>| {
                    Box::pin(async move {
                        if let crate::cucumber_expression::CapturedValue::Int(n) = args.captures[0] {
                            args.world.counter = n as usize;
                        }
                        Ok(())
                    })
                }),
            )
            .unwrap();
        registry
            .register(
                StepKeyword::When,
                PatternSource::Expression("I add {int}".into()),
                Arc::new(|args: StepArgs<'_, TestWorld>| {
                    Box::pin(async move {
                        if let crate::cucumber_expression::CapturedValue::Int(n) = args.captures[0] {
                            args.world.counter += n as usize;
                        }
                        Ok(())
                    })
                }),
            )
            .unwrap();
        registry
            .register(
                StepKeyword::Then,
                PatternSource::Expression("the total is {int}".into()),
                Arc::new(|args: StepArgs<'_, TestWorld>| {
                    Box::pin(async move {
                        if let crate::cucumber_expression::CapturedValue::Int(n) = args.captures[0] {
                            if args.world.counter == n as usize {
                                Ok(())
                            } else {
                                Err(StepError::Failed("totals don't match".into()))
                            }
                        } else {
                            unreachable!()
                        }
                    })
                }),
            )
            .unwrap();

        let executor = BddExecutor::new(
            Arc::new(registry),
            Arc::new(HookRegistry::default()),
            Arc::new(|| Ok(TestWorld::default())),
            ExecutorOptions::default(),
        );
        let doc = sample_feature();
        let results = executor.run_documents(&[doc]).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].summary.passed, 1);
        assert!(matches!(results[0].scenarios[0].status, ScenarioStatus::Passed));
    }

    #[tokio::test]
    async fn undefined_step_marks_scenario_undefined_and_skips_rest() {
        let registry: StepRegistry<TestWorld> = StepRegistry::new();
        let executor = BddExecutor::new(
            Arc::new(registry),
            Arc::new(HookRegistry::default()),
            Arc::new(|| Ok(TestWorld::default())),
            ExecutorOptions::default(),
        );
        let doc = sample_feature();
        let results = executor.run_documents(&[doc]).await.unwrap();
        let scenario = &results[0].scenarios[0];
        assert!(matches!(scenario.status, ScenarioStatus::Undefined));
        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.steps[0].status, StepStatus::Undefined);
        assert_eq!(scenario.steps[1].status, StepStatus::Skipped);
        assert_eq!(scenario.steps[2].status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn scenario_filter_and_grep_reject_scenarios_as_skipped() {
        let registry: StepRegistry<TestWorld> = StepRegistry::new();
        let mut options = ExecutorOptions::default();
        options.grep = Some("nonexistent".into());
        let executor = BddExecutor::new(
            Arc::new(registry),
            Arc::new(HookRegistry::default()),
            Arc::new(|| Ok(TestWorld::default())),
            options,
        );
        let doc = sample_feature();
        let results = executor.run_documents(&[doc]).await.unwrap();
        assert!(matches!(results[0].scenarios[0].status, ScenarioStatus::Skipped));
        assert_eq!(results[0].summary.skipped, 1);
    }

    #[tokio::test]
    async fn outline_expands_one_scenario_per_examples_row() {
        let source = "Feature: outline demo\n\n  Scenario Outline: add\n    Given a number <a>\n\n    Examples:\n      | a |\n      | 1 |\n      | 2 |\n";
        let doc = GherkinParser::parse(source);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry: StepRegistry<TestWorld> = StepRegistry::new();
        let seen_clone = Arc::clone(&seen);
        registry
            .register(
                StepKeyword::Given,
                PatternSource::Expression("a number {int}".into()),
                Arc::new(move |args: StepArgs<'_, TestWorld>| {
                    let seen = Arc::clone(&seen_clone);
                    Box::pin(async move {
                        if let crate::cucumber_expression::CapturedValue::Int(n) = args.captures[0] {
                            seen.lock().unwrap().push(n);
                        }
                        Ok(())
                    })
                }),
            )
            .unwrap();

        let executor = BddExecutor::new(
            Arc::new(registry),
            Arc::new(HookRegistry::default()),
            Arc::new(|| Ok(TestWorld::default())),
            ExecutorOptions::default(),
        );
        let results = executor.run_documents(&[doc]).await.unwrap();
        assert_eq!(results[0].scenarios.len(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn fail_fast_stops_after_first_failing_scenario() {
        let source = "Feature: two scenarios\n\n  Scenario: one\n    Given it fails\n\n  Scenario: two\n    Given it fails\n";
        let doc = GherkinParser::parse(source);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let mut registry: StepRegistry<TestWorld> = StepRegistry::new();
        registry
            .register(
                StepKeyword::Given,
                PatternSource::Expression("it fails".into()),
                Arc::new(move |_args: StepArgs<'_, TestWorld>| {
                    let calls = Arc::clone(&calls_clone);
                    Box::pin(async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(StepError::Failed("boom".into()))
                    })
                }),
            )
            .unwrap();

        let mut options = ExecutorOptions::default();
        options.fail_fast = true;
        let executor = BddExecutor::new(
            Arc::new(registry),
            Arc::new(HookRegistry::default()),
            Arc::new(|| Ok(TestWorld::default())),
            options,
        );
        let results = executor.run_documents(&[doc]).await.unwrap();
        assert_eq!(results[0].scenarios.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn before_scenario_hooks_run_before_steps() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut hooks: HookRegistry<TestWorld> = HookRegistry::new();
        let order_clone = Arc::clone(&order);
        hooks
            .register_world(
                HookScope::BeforeScenario,
                None,
                HookOptions::default(),
                Arc::new(move |_world| {
                    let order = Arc::clone(&order_clone);
                    Box::pin(async move {
                        order.lock().unwrap().push("hook");
                        Ok(())
                    })
                }),
            )
            .unwrap();

        let order_clone2 = Arc::clone(&order);
        let mut registry: StepRegistry<TestWorld> = StepRegistry::new();
        registry
            .register(
                StepKeyword::Given,
                PatternSource::Expression("a number {int}".into()),
                Arc::new(move |_args: StepArgs<'_, TestWorld>| {
                    let order = Arc::clone(&order_clone2);
                    Box::pin(async move {
                        order.lock().unwrap().push("step");
                        Ok(())
                    })
                }),
            )
            .unwrap();
        registry
            .register(StepKeyword::When, PatternSource::Expression("I add {int}".into()), Arc::new(|_a| Box::pin(async { Ok(()) })))
            .unwrap();
        registry
            .register(StepKeyword::Then, PatternSource::Expression("the total is {int}".into()), Arc::new(|_a| Box::pin(async { Ok(()) })))
            .unwrap();

        let executor = BddExecutor::new(
            Arc::new(registry),
            Arc::new(hooks),
            Arc::new(|| Ok(TestWorld::default())),
            ExecutorOptions::default(),
        );
        let doc = sample_feature();
        executor.run_documents(&[doc]).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["hook", "step"]);
    }
}
