//! Folds per-attempt scheduler results into a cross-browser `Summary`.

use crate::timing::{compute_timing, Timing};
use browsecraft_scheduler::{ExecStatus, ExecutionResult};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellStatus {
    Passed,
    Failed,
    Skipped,
    NotRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrowserCell {
    pub status: CellStatus,
    pub duration_ms: u64,
    pub retries: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixRow {
    pub id: String,
    pub title: String,
    pub suite_path: String,
    pub browsers: BTreeMap<String, BrowserCell>,
    pub flaky: bool,
    pub cross_browser_inconsistent: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Totals {
    pub scenarios: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub flaky: usize,
    pub cross_browser_inconsistent: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrowserSummary {
    pub browser: String,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub totals: Totals,
    pub matrix: Vec<MatrixRow>,
    pub browser_summaries: Vec<BrowserSummary>,
    pub timing: Timing,
    pub slowest_tests: Vec<String>,
    pub failed_tests: Vec<String>,
    pub flaky_tests: Vec<String>,
    pub inconsistent_tests: Vec<String>,
    pub strategy: String,
    pub browsers: Vec<String>,
    pub total_duration_ms: u64,
}

fn cell_status(status: ExecStatus) -> CellStatus {
    match status {
        ExecStatus::Passed => CellStatus::Passed,
        ExecStatus::Failed => CellStatus::Failed,
        ExecStatus::Skipped => CellStatus::Skipped,
    }
}

/// Builds the full cross-browser `Summary` for one scheduler run.
///
/// `browsers` is the full configured browser list, used so a browser an
/// item never ran on (no idle worker, bailed run) still shows `not-run`
/// rather than being silently absent from the matrix.
pub fn build_summary(strategy: &str, browsers: &[String], results: &[ExecutionResult]) -> Summary {
    let mut rows: BTreeMap<String, MatrixRow> = BTreeMap::new();

    for result in results {
        let row = rows.entry(result.work_item.id.clone()).or_insert_with(|| MatrixRow {
            id: result.work_item.id.clone(),
            title: result.work_item.title.clone(),
            suite_path: result.work_item.suite_path.clone(),
            browsers: BTreeMap::new(),
            flaky: false,
            cross_browser_inconsistent: false,
        });
        row.browsers.insert(
            result.worker.browser.clone(),
            BrowserCell {
                status: cell_status(result.status),
                duration_ms: result.duration_ms,
                retries: result.retries,
                error: result.error.clone(),
            },
        );
    }

    for browser in browsers {
        for row in rows.values_mut() {
            row.browsers.entry(browser.clone()).or_insert(BrowserCell {
                status: CellStatus::NotRun,
                duration_ms: 0,
                retries: 0,
                error: None,
            });
        }
    }

    for row in rows.values_mut() {
        row.flaky = row
            .browsers
            .values()
            .any(|cell| cell.status == CellStatus::Passed && cell.retries >= 1);

        let final_statuses: std::collections::HashSet<CellStatus> = row
            .browsers
            .values()
            .map(|cell| cell.status)
            .filter(|status| *status != CellStatus::NotRun)
            .collect();
        row.cross_browser_inconsistent = final_statuses.len() > 1;
    }

    let matrix: Vec<MatrixRow> = rows.into_values().collect();

    let mut totals = Totals { scenarios: matrix.len(), ..Totals::default() };
    for row in &matrix {
        let overall_passed = row.browsers.values().all(|c| {
            matches!(c.status, CellStatus::Passed | CellStatus::Skipped | CellStatus::NotRun)
        }) && row.browsers.values().any(|c| c.status == CellStatus::Passed);
        let any_failed = row.browsers.values().any(|c| c.status == CellStatus::Failed);
        let any_skipped = row.browsers.values().any(|c| c.status == CellStatus::Skipped);

        if any_failed {
            totals.failed += 1;
        } else if overall_passed {
            totals.passed += 1;
        } else if any_skipped {
            totals.skipped += 1;
        }
        if row.flaky {
            totals.flaky += 1;
        }
        if row.cross_browser_inconsistent {
            totals.cross_browser_inconsistent += 1;
        }
    }

    let mut browser_summaries = Vec::new();
    for browser in browsers {
        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;
        let mut duration_ms = 0u64;
        for result in results.iter().filter(|r| &r.worker.browser == browser) {
            duration_ms += result.duration_ms;
            match result.status {
                ExecStatus::Passed => passed += 1,
                ExecStatus::Failed => failed += 1,
                ExecStatus::Skipped => skipped += 1,
            }
        }
        browser_summaries.push(BrowserSummary { browser: browser.clone(), passed, failed, skipped, duration_ms });
    }

    let non_skipped_durations: Vec<u64> =
        results.iter().filter(|r| r.status != ExecStatus::Skipped).map(|r| r.duration_ms).collect();
    let timing = compute_timing(&non_skipped_durations);

    let mut by_duration = matrix.clone();
    by_duration.sort_by(|a, b| {
        let a_max = a.browsers.values().map(|c| c.duration_ms).max().unwrap_or(0);
        let b_max = b.browsers.values().map(|c| c.duration_ms).max().unwrap_or(0);
        b_max.cmp(&a_max)
    });
    let slowest_tests = by_duration.iter().take(5).map(|row| row.title.clone()).collect();

    let failed_tests = matrix.iter().filter(|r| r.browsers.values().any(|c| c.status == CellStatus::Failed)).map(|r| r.title.clone()).collect();
    let flaky_tests = matrix.iter().filter(|r| r.flaky).map(|r| r.title.clone()).collect();
    let inconsistent_tests = matrix.iter().filter(|r| r.cross_browser_inconsistent).map(|r| r.title.clone()).collect();

    let total_duration_ms: u64 = results.iter().map(|r| r.duration_ms).sum();

    Summary {
        totals,
        matrix,
        browser_summaries,
        timing,
        slowest_tests,
        failed_tests,
        flaky_tests,
        inconsistent_tests,
        strategy: strategy.to_string(),
        browsers: browsers.to_vec(),
        total_duration_ms,
    }
}
