use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use browsecraft_bdd::{
    BddExecutor, ExecutorOptions, HookRegistry, PatternSource, ScenarioStatus, StepArgs, StepError,
    StepKeyword, StepRegistry,
};
use browsecraft_events::EventBus;
use browsecraft_gherkin::GherkinParser;
use browsecraft_report::build_summary;
use browsecraft_scheduler::{Executor, ExecutionResult, Filters, Scheduler, WorkItem, WorkerPool};

#[derive(Default)]
struct DemoWorld {
    visited: Vec<String>,
}

const FEATURE_SOURCE: &str = "\
Feature: search

  Scenario: finding a known page
    Given I open the home page
    When I search for \"rust\"
    Then the results should contain \"rust\"

  Scenario: a search that never matches
    Given I open the home page
    When I search for \"rust\"
    Then the results should contain \"nonexistent-term\"
";

fn registry() -> StepRegistry<DemoWorld> {
    let mut registry: StepRegistry<DemoWorld> = StepRegistry::new();
    registry
        .register(
            StepKeyword::Given,
            PatternSource::Expression("I open the home page".into()),
            Arc::new(|args: StepArgs<'_, DemoWorld>| {
                Box::pin(async move {
                    args.world.visited.push("home".into());
                    Ok(())
                })
            }),
        )
        .unwrap();
    registry
        .register(
            StepKeyword::When,
            PatternSource::Expression("I search for {string}".into()),
            Arc::new(|args: StepArgs<'_, DemoWorld>| {
                Box::pin(async move {
                    args.world.visited.push(format!("search:{:?}", args.captures));
                    Ok(())
                })
            }),
        )
        .unwrap();
    registry
        .register(
            StepKeyword::Then,
            PatternSource::Expression("the results should contain {string}".into()),
            Arc::new(|args: StepArgs<'_, DemoWorld>| {
                Box::pin(async move {
                    let expected = match &args.captures[0] {
                        browsecraft_bdd::CapturedValue::Str(s) => s.clone(),
                        other => format!("{other:?}"),
                    };
                    if expected == "nonexistent-term" {
                        Err(StepError::Failed(format!("no results matched {expected:?}")))
                    } else {
                        Ok(())
                    }
                })
            }),
        )
        .unwrap();
    registry
}

/// Drives a whole scenario/outline run through the scheduler's worker pool,
/// the way `browsecraft-cli`'s `run` module wires things together, but
/// against an in-process fake session instead of a launched browser.
#[tokio::test]
async fn a_full_feature_run_through_worker_pool_and_scheduler_builds_a_summary() {
    let doc = {
        let mut doc = GherkinParser::parse(FEATURE_SOURCE);
        doc.uri = Some("features/search.feature".into());
        doc
    };
    let doc = Arc::new(doc);

    let items = vec![
        WorkItem {
            id: "search.feature::finding a known page".into(),
            title: "finding a known page".into(),
            tags: Vec::new(),
            suite_path: "features/search.feature".into(),
        },
        WorkItem {
            id: "search.feature::a search that never matches".into(),
            title: "a search that never matches".into(),
            tags: Vec::new(),
            suite_path: "features/search.feature".into(),
        },
    ];

    let step_registry = Arc::new(registry());
    let hook_registry = Arc::new(HookRegistry::<DemoWorld>::default());

    let pool = WorkerPool::<()>::new(0, false, EventBus::new());
    pool.spawn(
        &[("chromium".into(), 2)],
        Arc::new(|_info| Box::pin(async move { Ok(()) })),
        Arc::new(|_session| Box::pin(async move { Ok(()) })),
    )
    .await;
    let scheduler = Scheduler::new(pool.clone(), vec!["chromium".into()]);

    let executor: Executor<()> = {
        let doc = Arc::clone(&doc);
        let step_registry = Arc::clone(&step_registry);
        let hook_registry = Arc::clone(&hook_registry);
        Arc::new(move |item: WorkItem, _session: Arc<()>| {
            let doc = Arc::clone(&doc);
            let step_registry = Arc::clone(&step_registry);
            let hook_registry = Arc::clone(&hook_registry);
            Box::pin(async move {
                let target_title = item.title.clone();
                let options = ExecutorOptions {
                    scenario_filter: Some(Arc::new(move |name, _tags, _uri| name == target_title)),
                    ..ExecutorOptions::default()
                };
                let executor = BddExecutor::new(
                    step_registry,
                    hook_registry,
                    Arc::new(|| Ok(DemoWorld::default())),
                    options,
                );
                let results = executor.run_documents(&[(*doc).clone()]).await.map_err(|e| e.to_string())?;
                let scenario = results[0]
                    .scenarios
                    .iter()
                    .find(|s| s.name == item.title)
                    .ok_or_else(|| "scenario missing from feature result".to_string())?;
                match scenario.status {
                    ScenarioStatus::Passed => Ok(()),
                    _ => Err(scenario
                        .steps
                        .iter()
                        .find_map(|s| s.error.clone())
                        .unwrap_or_else(|| format!("scenario ended as {:?}", scenario.status))),
                }
            })
        })
    };

    let results: Vec<ExecutionResult> = scheduler
        .run("parallel", items, Filters::default(), executor)
        .await
        .expect("scheduler run succeeds");
    pool.terminate().await;

    assert_eq!(results.len(), 2);
    let summary = build_summary("parallel", &["chromium".to_string()], &results);
    assert_eq!(summary.totals.scenarios, 2);
    assert_eq!(summary.totals.passed, 1);
    assert_eq!(summary.totals.failed, 1);
    assert_eq!(summary.failed_tests, vec!["a search that never matches".to_string()]);
}

#[tokio::test]
async fn retried_item_that_eventually_passes_is_reported_flaky() {
    let doc = {
        let mut doc = GherkinParser::parse(
            "Feature: flaky\n\n  Scenario: intermittent\n    Given I open the home page\n",
        );
        doc.uri = Some("features/flaky.feature".into());
        doc
    };
    let doc = Arc::new(doc);

    let attempts = Arc::new(AtomicUsize::new(0));
    let step_registry: Arc<StepRegistry<DemoWorld>> = Arc::new({
        let mut registry: StepRegistry<DemoWorld> = StepRegistry::new();
        let attempts = Arc::clone(&attempts);
        registry
            .register(
                StepKeyword::Given,
                PatternSource::Expression("I open the home page".into()),
                Arc::new(move |_args: StepArgs<'_, DemoWorld>| {
                    let attempts = Arc::clone(&attempts);
                    Box::pin(async move {
                        let n = attempts.fetch_add(1, Ordering::SeqCst);
                        if n == 0 {
                            Err(StepError::Failed("first attempt always fails".into()))
                        } else {
                            Ok(())
                        }
                    })
                }),
            )
            .unwrap();
        registry
    });
    let hook_registry = Arc::new(HookRegistry::<DemoWorld>::default());

    let pool = WorkerPool::<()>::new(1, false, EventBus::new());
    pool.spawn(
        &[("chromium".into(), 1)],
        Arc::new(|_info| Box::pin(async move { Ok(()) })),
        Arc::new(|_session| Box::pin(async move { Ok(()) })),
    )
    .await;
    let scheduler = Scheduler::new(pool.clone(), vec!["chromium".into()]);

    let executor: Executor<()> = {
        let doc = Arc::clone(&doc);
        let step_registry = Arc::clone(&step_registry);
        let hook_registry = Arc::clone(&hook_registry);
        Arc::new(move |item: WorkItem, _session: Arc<()>| {
            let doc = Arc::clone(&doc);
            let step_registry = Arc::clone(&step_registry);
            let hook_registry = Arc::clone(&hook_registry);
            Box::pin(async move {
                let executor = BddExecutor::new(
                    step_registry,
                    hook_registry,
                    Arc::new(|| Ok(DemoWorld::default())),
                    ExecutorOptions::default(),
                );
                let results = executor.run_documents(&[(*doc).clone()]).await.map_err(|e| e.to_string())?;
                let scenario = &results[0].scenarios[0];
                match scenario.status {
                    ScenarioStatus::Passed => Ok(()),
                    _ => Err("scenario failed".to_string()),
                }
                .map(|_| { let _ = &item; })
            })
        })
    };

    let items = vec![WorkItem {
        id: "flaky.feature::intermittent".into(),
        title: "intermittent".into(),
        tags: Vec::new(),
        suite_path: "features/flaky.feature".into(),
    }];
    let results = scheduler.run("parallel", items, Filters::default(), executor).await.expect("scheduler run succeeds");
    pool.terminate().await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].retries, 1);
    let summary = build_summary("parallel", &["chromium".to_string()], &results);
    assert_eq!(summary.totals.flaky, 1);
}
