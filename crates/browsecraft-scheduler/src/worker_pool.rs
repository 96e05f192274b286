//! A heterogeneous pool of browser workers sharing one work-stealing
//! queue per `execute` call. State lives behind an `Arc` so the pool is
//! cheap to clone into the per-worker tasks `execute` spawns.

use crate::error::SchedulerError;
use browsecraft_events::{names, EventBus};
use futures_util::future::BoxFuture;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub type Spawner<S> = Arc<dyn Fn(WorkerInfo) -> BoxFuture<'static, Result<S, String>> + Send + Sync>;
pub type Cleanup<S> = Arc<dyn Fn(Arc<S>) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;
pub type Executor<S> =
    Arc<dyn Fn(WorkItem, Arc<S>) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Busy,
    Errored,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub id: u64,
    pub browser: String,
}

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub suite_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub work_item: WorkItem,
    pub worker: WorkerInfo,
    pub status: ExecStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub retries: u32,
}

struct WorkerRecord<S> {
    info: WorkerInfo,
    status: WorkerStatus,
    session: Option<Arc<S>>,
    cleanup: Option<Cleanup<S>>,
}

struct PoolInner<S> {
    workers: Mutex<Vec<WorkerRecord<S>>>,
    next_id: AtomicU64,
    max_retries: u32,
    bail: bool,
    events: EventBus,
}

#[derive(Clone)]
pub struct WorkerPool<S> {
    inner: Arc<PoolInner<S>>,
}

impl<S: Send + Sync + 'static> WorkerPool<S> {
    pub fn new(max_retries: u32, bail: bool, events: EventBus) -> Self {
        WorkerPool {
            inner: Arc::new(PoolInner {
                workers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                max_retries,
                bail,
                events,
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn worker_count(&self) -> usize {
        self.inner.workers.lock().expect("worker pool mutex poisoned").len()
    }

    pub fn browsers(&self) -> Vec<String> {
        let workers = self.inner.workers.lock().expect("worker pool mutex poisoned");
        let mut seen = Vec::new();
        for w in workers.iter() {
            if !seen.contains(&w.info.browser) {
                seen.push(w.info.browser.clone());
            }
        }
        seen
    }

    /// Spawns `count` workers per `(browser, count)` entry in `browsers`,
    /// calling `spawner(worker_info)` for each. A failed spawn marks that
    /// worker `Errored` and emits `worker:error` rather than aborting the
    /// whole pool.
    pub async fn spawn(&self, browsers: &[(String, u32)], spawner: Spawner<S>, cleanup: Cleanup<S>) {
        for (browser, count) in browsers {
            for _ in 0..*count {
                let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
                let info = WorkerInfo { id, browser: browser.clone() };
                self.inner.events.emit(
                    names::WORKER_SPAWN,
                    json!({"id": info.id, "browser": info.browser}),
                );

                match spawner(info.clone()).await {
                    Ok(session) => {
                        let mut workers = self.inner.workers.lock().expect("worker pool mutex poisoned");
                        workers.push(WorkerRecord {
                            info: info.clone(),
                            status: WorkerStatus::Idle,
                            session: Some(Arc::new(session)),
                            cleanup: Some(Arc::clone(&cleanup)),
                        });
                        drop(workers);
                        self.inner.events.emit(
                            names::WORKER_READY,
                            json!({"id": info.id, "browser": info.browser}),
                        );
                    }
                    Err(message) => {
                        let mut workers = self.inner.workers.lock().expect("worker pool mutex poisoned");
                        workers.push(WorkerRecord {
                            info: info.clone(),
                            status: WorkerStatus::Errored,
                            session: None,
                            cleanup: None,
                        });
                        drop(workers);
                        self.inner.events.emit(
                            names::WORKER_ERROR,
                            json!({"id": info.id, "browser": info.browser, "error": message}),
                        );
                    }
                }
            }
        }
    }

    pub async fn execute(
        &self,
        items: Vec<WorkItem>,
        executor: Executor<S>,
    ) -> Result<Vec<ExecutionResult>, SchedulerError> {
        self.execute_filtered(items, executor, None).await
    }

    pub async fn execute_on_browser(
        &self,
        browser: &str,
        items: Vec<WorkItem>,
        executor: Executor<S>,
    ) -> Result<Vec<ExecutionResult>, SchedulerError> {
        self.execute_filtered(items, executor, Some(browser)).await
    }

    async fn execute_filtered(
        &self,
        items: Vec<WorkItem>,
        executor: Executor<S>,
        browser: Option<&str>,
    ) -> Result<Vec<ExecutionResult>, SchedulerError> {
        let idle_ids: Vec<u64> = {
            let workers = self.inner.workers.lock().expect("worker pool mutex poisoned");
            workers
                .iter()
                .filter(|w| w.status == WorkerStatus::Idle)
                .filter(|w| browser.map_or(true, |name| w.info.browser == name))
                .map(|w| w.info.id)
                .collect()
        };
        if idle_ids.is_empty() {
            return Err(SchedulerError::NoWorkers);
        }

        for item in &items {
            self.inner.events.emit(names::ITEM_ENQUEUE, json!({"id": item.id, "title": item.title}));
        }

        let queue: Arc<Mutex<VecDeque<(WorkItem, u32)>>> =
            Arc::new(Mutex::new(items.into_iter().map(|item| (item, 0)).collect()));
        let results = Arc::new(Mutex::new(Vec::new()));
        let bailed = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::new();
        for worker_id in idle_ids {
            let pool = self.clone();
            let queue = Arc::clone(&queue);
            let executor = Arc::clone(&executor);
            let results = Arc::clone(&results);
            let bailed = Arc::clone(&bailed);
            handles.push(tokio::spawn(async move {
                pool.worker_loop(worker_id, queue, executor, results, bailed).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let results = Arc::try_unwrap(results)
            .unwrap_or_else(|arc| Mutex::new(arc.lock().expect("worker pool mutex poisoned").clone()))
            .into_inner()
            .expect("worker pool mutex poisoned");
        Ok(results)
    }

    async fn worker_loop(
        &self,
        worker_id: u64,
        queue: Arc<Mutex<VecDeque<(WorkItem, u32)>>>,
        executor: Executor<S>,
        results: Arc<Mutex<Vec<ExecutionResult>>>,
        bailed: Arc<AtomicBool>,
    ) {
        loop {
            if bailed.load(Ordering::SeqCst) {
                break;
            }
            let popped = queue.lock().expect("worker pool mutex poisoned").pop_front();
            let Some((item, attempt)) = popped else { break };

            let (worker_info, session) = {
                let mut workers = self.inner.workers.lock().expect("worker pool mutex poisoned");
                let Some(record) = workers.iter_mut().find(|w| w.info.id == worker_id) else { break };
                record.status = WorkerStatus::Busy;
                (record.info.clone(), record.session.clone())
            };
            let Some(session) = session else { break };

            self.inner.events.emit(
                names::ITEM_START,
                json!({"id": item.id, "title": item.title, "worker": worker_info.id, "attempt": attempt}),
            );
            self.inner.events.emit(names::WORKER_BUSY, json!({"id": worker_info.id}));

            let start = Instant::now();
            let outcome = executor(item.clone(), session).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(()) => {
                    self.inner.events.emit(names::ITEM_PASS, json!({"id": item.id, "duration_ms": duration_ms}));
                    self.inner.events.emit(names::ITEM_END, json!({"id": item.id, "status": "passed"}));
                    results.lock().expect("worker pool mutex poisoned").push(ExecutionResult {
                        work_item: item,
                        worker: worker_info.clone(),
                        status: ExecStatus::Passed,
                        duration_ms,
                        error: None,
                        retries: attempt,
                    });
                }
                Err(message) => {
                    if attempt < self.inner.max_retries {
                        self.inner.events.emit(
                            names::ITEM_RETRY,
                            json!({"id": item.id, "attempt": attempt + 1, "error": message}),
                        );
                        queue.lock().expect("worker pool mutex poisoned").push_back((item, attempt + 1));
                    } else {
                        self.inner.events.emit(
                            names::ITEM_FAIL,
                            json!({"id": item.id, "duration_ms": duration_ms, "error": message}),
                        );
                        self.inner.events.emit(names::ITEM_END, json!({"id": item.id, "status": "failed"}));
                        results.lock().expect("worker pool mutex poisoned").push(ExecutionResult {
                            work_item: item,
                            worker: worker_info.clone(),
                            status: ExecStatus::Failed,
                            duration_ms,
                            error: Some(message),
                            retries: attempt,
                        });
                        if self.inner.bail {
                            bailed.store(true, Ordering::SeqCst);
                            queue.lock().expect("worker pool mutex poisoned").clear();
                        }
                    }
                }
            }

            {
                let mut workers = self.inner.workers.lock().expect("worker pool mutex poisoned");
                if let Some(record) = workers.iter_mut().find(|w| w.info.id == worker_id) {
                    record.status = WorkerStatus::Idle;
                }
            }
            self.inner.events.emit(names::WORKER_IDLE, json!({"id": worker_info.id}));
        }
    }

    /// Runs every worker's cleanup handle, swallowing errors, and marks
    /// every worker `Terminated`.
    pub async fn terminate(&self) {
        let records: Vec<(WorkerInfo, Option<Arc<S>>, Option<Cleanup<S>>)> = {
            let workers = self.inner.workers.lock().expect("worker pool mutex poisoned");
            workers.iter().map(|w| (w.info.clone(), w.session.clone(), w.cleanup.clone())).collect()
        };

        for (info, session, cleanup) in records {
            if let (Some(session), Some(cleanup)) = (session, cleanup) {
                if let Err(err) = cleanup(session).await {
                    tracing::warn!(worker = info.id, error = %err, "worker cleanup failed");
                }
            }
            self.inner.events.emit(names::WORKER_TERMINATE, json!({"id": info.id}));
        }

        let mut workers = self.inner.workers.lock().expect("worker pool mutex poisoned");
        for record in workers.iter_mut() {
            record.status = WorkerStatus::Terminated;
        }
    }
}
