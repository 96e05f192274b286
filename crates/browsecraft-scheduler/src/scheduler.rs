//! Selects one of three distribution strategies and runs a work list
//! across a `WorkerPool`, emitting run/browser-level events around it.

use crate::error::SchedulerError;
use crate::worker_pool::{ExecStatus, ExecutionResult, Executor, WorkItem, WorkerPool};
use browsecraft_bdd::{normalize_tags, TagExpr};
use browsecraft_events::names;
use serde_json::json;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub grep: Option<String>,
    pub tag_filter: Option<String>,
}

impl Filters {
    fn compile(&self) -> Result<Option<TagExpr>, SchedulerError> {
        self.tag_filter.as_deref().map(TagExpr::parse).transpose().map_err(SchedulerError::from)
    }

    fn apply<'a>(&self, items: &'a [WorkItem], expr: &Option<TagExpr>) -> Vec<&'a WorkItem> {
        items
            .iter()
            .filter(|item| {
                if let Some(grep) = &self.grep {
                    if !item.title.to_lowercase().contains(&grep.to_lowercase()) {
                        return false;
                    }
                }
                if let Some(expr) = expr {
                    let tag_set = normalize_tags(item.tags.iter().map(String::as_str));
                    if !expr.evaluate(&tag_set) {
                        return false;
                    }
                }
                true
            })
            .collect()
    }
}

pub struct Scheduler<S> {
    pool: WorkerPool<S>,
    browsers: Vec<String>,
}

impl<S: Send + Sync + 'static> Scheduler<S> {
    pub fn new(pool: WorkerPool<S>, browsers: Vec<String>) -> Self {
        Scheduler { pool, browsers }
    }

    pub fn pool(&self) -> &WorkerPool<S> {
        &self.pool
    }

    pub async fn run(
        &self,
        strategy: &str,
        items: Vec<WorkItem>,
        filters: Filters,
        executor: Executor<S>,
    ) -> Result<Vec<ExecutionResult>, SchedulerError> {
        let tag_expr = filters.compile()?;
        let selected: Vec<WorkItem> = filters.apply(&items, &tag_expr).into_iter().cloned().collect();
        let rejected = items.len() - selected.len();

        let run_start = Instant::now();
        self.pool.events().emit(
            names::RUN_START,
            json!({"strategy": strategy, "total": items.len(), "selected": selected.len(), "skipped": rejected}),
        );

        let result = match strategy {
            "parallel" => self.pool.execute(selected, executor).await,
            "sequential" => self.run_sequential(selected, executor).await,
            "matrix" => self.run_matrix(selected, executor).await,
            other => Err(SchedulerError::UnknownStrategy(other.to_string())),
        };

        self.pool.events().emit(
            names::RUN_END,
            json!({"strategy": strategy, "duration_ms": run_start.elapsed().as_millis() as u64}),
        );
        result
    }

    async fn run_sequential(
        &self,
        items: Vec<WorkItem>,
        executor: Executor<S>,
    ) -> Result<Vec<ExecutionResult>, SchedulerError> {
        let mut all = Vec::new();
        for browser in &self.browsers {
            self.pool.events().emit(names::BROWSER_START, json!({"browser": browser}));
            let browser_start = Instant::now();
            let results = self.pool.execute_on_browser(browser, items.clone(), executor.clone()).await?;
            self.pool.events().emit(
                names::BROWSER_END,
                json!({"browser": browser, "duration_ms": browser_start.elapsed().as_millis() as u64}),
            );
            all.extend(results);
        }
        Ok(all)
    }

    async fn run_matrix(
        &self,
        items: Vec<WorkItem>,
        executor: Executor<S>,
    ) -> Result<Vec<ExecutionResult>, SchedulerError> {
        if self.browsers.len() <= 1 {
            return self.pool.execute(items, executor).await;
        }

        let mut handles = Vec::new();
        for browser in self.browsers.clone() {
            let pool = self.pool.clone();
            let items = items.clone();
            let executor = executor.clone();
            handles.push(tokio::spawn(async move {
                pool.events().emit(names::BROWSER_START, json!({"browser": browser}));
                let start = Instant::now();
                let result = pool.execute_on_browser(&browser, items, executor).await;
                pool.events().emit(
                    names::BROWSER_END,
                    json!({"browser": browser, "duration_ms": start.elapsed().as_millis() as u64}),
                );
                result
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(results)) => all.extend(results),
                Ok(Err(SchedulerError::NoWorkers)) => {}
                Ok(Err(err)) => return Err(err),
                Err(_) => {}
            }
        }
        Ok(all)
    }
}

/// Status a matrix cell reports when the item never ran on a browser,
/// e.g. because that browser had no idle workers.
pub fn cell_status(result: Option<&ExecutionResult>) -> &'static str {
    match result {
        None => "not-run",
        Some(r) => match r.status {
            ExecStatus::Passed => "passed",
            ExecStatus::Failed => "failed",
            ExecStatus::Skipped => "skipped",
        },
    }
}
