//! Wires parsing, the BDD executor, the scheduler, and the aggregator
//! together for one CLI invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use browsecraft_bdd::{
    BddExecutor, ExecutorOptions, HookRegistry, ScenarioFilterFn, StepRegistry, WorldFactory,
};
use browsecraft_events::EventBus;
use browsecraft_gherkin::GherkinParser;
use browsecraft_launcher::{Browser, LaunchOptions};
use browsecraft_report::{build_summary, format_matrix, format_summary};
use browsecraft_scheduler::{Executor, Filters, Scheduler, WorkItem, WorkerPool};
use browsecraft_session::{Session, SessionLaunchOptions};

use crate::args::Cli;
use crate::discovery::discover_work_items;
use crate::steps::register_builtin_steps;
use crate::world::World;

fn browser_from_name(name: &str) -> Result<Browser> {
    match name.to_lowercase().as_str() {
        "chrome" | "chromium" => Ok(Browser::Chrome),
        "firefox" => Ok(Browser::Firefox),
        "edge" => Ok(Browser::Edge),
        other => bail!("unknown browser {other:?}, expected chrome, firefox, or edge"),
    }
}

fn collect_feature_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        collect_from(path, &mut files)?;
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn collect_from(path: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if path.is_dir() {
        for entry in std::fs::read_dir(path).with_context(|| format!("reading directory {}", path.display()))? {
            let entry = entry?;
            collect_from(&entry.path(), files)?;
        }
    } else if path.extension().map(|ext| ext == "feature").unwrap_or(false) {
        files.push(path.to_path_buf());
    }
    Ok(())
}

pub async fn run(cli: Cli) -> Result<i32> {
    let files = collect_feature_files(&cli.files)?;
    if files.is_empty() {
        bail!("no .feature files found under the given paths");
    }

    let mut docs = Vec::new();
    let mut items = Vec::new();
    for path in &files {
        let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let mut doc = GherkinParser::parse(&source);
        doc.uri = Some(path.display().to_string());
        items.extend(discover_work_items(&doc));
        docs.push(doc);
    }
    let docs = Arc::new(docs);

    let mut step_registry = StepRegistry::<World>::new();
    register_builtin_steps(&mut step_registry)?;
    let step_registry = Arc::new(step_registry);
    let hook_registry = Arc::new(HookRegistry::<World>::new());

    let events = EventBus::new();
    let browsers = cli.resolved_browsers();
    let browser_counts: Vec<(String, u32)> = browsers.iter().map(|b| (b.clone(), cli.workers)).collect();

    let pool = WorkerPool::<Session>::new(cli.retries, cli.bail, events);

    let headless = cli.resolved_headless();
    let spawner: browsecraft_scheduler::Spawner<Session> = Arc::new(move |info| {
        Box::pin(async move {
            let browser = browser_from_name(&info.browser).map_err(|err| err.to_string())?;
            let mut launcher = LaunchOptions::new(browser);
            launcher.headless = headless;
            let options = SessionLaunchOptions { launcher, transport: Default::default() };
            Session::launch(options).await.map_err(|err| err.to_string())
        })
    });
    let cleanup: browsecraft_scheduler::Cleanup<Session> =
        Arc::new(|session| Box::pin(async move { session.close().await; Ok(()) }));

    pool.spawn(&browser_counts, spawner, cleanup).await;
    if pool.worker_count() == 0 {
        bail!("no workers were spawned");
    }

    let scheduler = Scheduler::new(pool.clone(), browsers.clone());
    let filters = Filters { grep: cli.grep.clone(), tag_filter: cli.tag.clone() };

    let grep = cli.grep.clone();
    let tag_filter = cli.tag.clone();
    let default_step_timeout_ms = 60_000u64;
    let docs_for_executor = Arc::clone(&docs);
    let step_registry_for_executor = Arc::clone(&step_registry);
    let hook_registry_for_executor = Arc::clone(&hook_registry);

    let executor: Executor<Session> = Arc::new(move |item: WorkItem, session: Arc<Session>| {
        let docs = Arc::clone(&docs_for_executor);
        let step_registry = Arc::clone(&step_registry_for_executor);
        let hook_registry = Arc::clone(&hook_registry_for_executor);
        let grep = grep.clone();
        let tag_filter = tag_filter.clone();
        Box::pin(async move {
            let target_uri = item.suite_path.clone();
            let target_title = item.title.clone();
            let doc = docs
                .iter()
                .find(|doc| doc.uri.as_deref() == Some(target_uri.as_str()))
                .cloned()
                .ok_or_else(|| format!("no document found for {target_uri}"))?;

            let scenario_filter: ScenarioFilterFn = Arc::new(move |name, _tags, uri| {
                uri == Some(target_uri.as_str()) && name == target_title
            });
            let tag_filter_expr = tag_filter
                .as_deref()
                .map(browsecraft_bdd::TagExpr::parse)
                .transpose()
                .map_err(|err| err.to_string())?;

            let world_factory: WorldFactory<World> = {
                let session = Arc::clone(&session);
                Arc::new(move || Ok(World::new(Arc::clone(&session))))
            };

            let options = ExecutorOptions {
                fail_fast: false,
                default_step_timeout_ms,
                grep,
                tag_filter: tag_filter_expr,
                scenario_filter: Some(scenario_filter),
                on_scenario_end: None,
                ai_step_executor: None,
                ai_mode: browsecraft_bdd::AiMode::Auto,
            };

            let bdd_executor = BddExecutor::new(step_registry, hook_registry, world_factory, options);
            let results = bdd_executor.run_documents(std::slice::from_ref(&doc)).await.map_err(|err| err.to_string())?;

            let scenario = results
                .into_iter()
                .flat_map(|feature| feature.scenarios)
                .next()
                .ok_or_else(|| "scenario filter matched nothing".to_string())?;

            match scenario.status {
                browsecraft_bdd::ScenarioStatus::Passed => Ok(()),
                _ => {
                    let message = scenario
                        .steps
                        .iter()
                        .find_map(|s| s.error.clone())
                        .or(scenario.hook_error)
                        .unwrap_or_else(|| format!("scenario ended with status {:?}", scenario.status));
                    Err(message)
                }
            }
        })
    });

    let results = scheduler.run(&cli.strategy, items, filters, executor).await?;
    pool.terminate().await;

    let summary = build_summary(&cli.strategy, &browsers, &results);
    println!("{}", format_summary(&summary));
    println!();
    println!("{}", format_matrix(&summary));

    if summary.totals.failed == 0 {
        Ok(0)
    } else {
        Ok(1)
    }
}
