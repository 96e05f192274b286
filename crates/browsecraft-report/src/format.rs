//! Tabular/headline string producers for a `Summary`. No ANSI or TTY
//! rendering — plain strings the caller decides what to do with.

use crate::aggregator::{CellStatus, Summary};

const TITLE_WIDTH: usize = 40;

fn truncate(title: &str) -> String {
    if title.chars().count() <= TITLE_WIDTH {
        title.to_string()
    } else {
        let head: String = title.chars().take(TITLE_WIDTH.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    }
}

fn status_label(status: CellStatus) -> &'static str {
    match status {
        CellStatus::Passed => "pass",
        CellStatus::Failed => "fail",
        CellStatus::Skipped => "skip",
        CellStatus::NotRun => "n/a",
    }
}

pub fn format_summary(summary: &Summary) -> String {
    let mut lines = vec![format!(
        "run summary: strategy={} browsers={} scenarios={} passed={} failed={} skipped={} flaky={} inconsistent={} duration_ms={}",
        summary.strategy,
        summary.browsers.join(","),
        summary.totals.scenarios,
        summary.totals.passed,
        summary.totals.failed,
        summary.totals.skipped,
        summary.totals.flaky,
        summary.totals.cross_browser_inconsistent,
        summary.total_duration_ms,
    )];

    lines.push(format!(
        "timing: min={} max={} avg={} median={} p95={} total={}",
        summary.timing.min, summary.timing.max, summary.timing.avg, summary.timing.median, summary.timing.p95, summary.timing.total,
    ));

    lines.push("browser_breakdown:".to_string());
    if summary.browser_summaries.is_empty() {
        lines.push("  none".to_string());
    } else {
        for browser in &summary.browser_summaries {
            lines.push(format!(
                "  {} passed={} failed={} skipped={} duration_ms={}",
                browser.browser, browser.passed, browser.failed, browser.skipped, browser.duration_ms,
            ));
        }
    }

    if !summary.slowest_tests.is_empty() {
        lines.push("slowest_tests:".to_string());
        for title in &summary.slowest_tests {
            lines.push(format!("  {}", truncate(title)));
        }
    }
    if !summary.failed_tests.is_empty() {
        lines.push("failed_tests:".to_string());
        for title in &summary.failed_tests {
            lines.push(format!("  {}", truncate(title)));
        }
    }
    if !summary.flaky_tests.is_empty() {
        lines.push("flaky_tests:".to_string());
        for title in &summary.flaky_tests {
            lines.push(format!("  {}", truncate(title)));
        }
    }
    if !summary.inconsistent_tests.is_empty() {
        lines.push("inconsistent_tests:".to_string());
        for title in &summary.inconsistent_tests {
            lines.push(format!("  {}", truncate(title)));
        }
    }

    lines.join("\n")
}

pub fn format_matrix(summary: &Summary) -> String {
    if summary.matrix.is_empty() {
        return "matrix: no scenarios ran".to_string();
    }

    let mut lines = vec![format!("matrix: {} scenario(s) x {} browser(s)", summary.matrix.len(), summary.browsers.len())];
    let header = std::iter::once("scenario".to_string()).chain(summary.browsers.iter().cloned()).collect::<Vec<_>>().join("  ");
    lines.push(header);

    for row in &summary.matrix {
        let mut cells = vec![truncate(&row.title)];
        for browser in &summary.browsers {
            let cell = row.browsers.get(browser);
            let label = match cell {
                Some(cell) => status_label(cell.status).to_string(),
                None => "n/a".to_string(),
            };
            cells.push(label);
        }
        let mut line = cells.join("  ");
        if row.flaky {
            line.push_str("  [flaky]");
        }
        if row.cross_browser_inconsistent {
            line.push_str("  [inconsistent]");
        }
        lines.push(line);
    }

    lines.join("\n")
}
