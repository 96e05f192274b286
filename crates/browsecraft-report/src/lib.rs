//! Folds scheduler results into a cross-browser `Summary` plus plain-text
//! formatters. No persistence, no terminal rendering — the caller decides
//! what to do with the `Summary` value or the formatted strings.

pub mod aggregator;
pub mod format;
pub mod timing;

pub use aggregator::{BrowserCell, BrowserSummary, CellStatus, MatrixRow, Summary, Totals, build_summary};
pub use format::{format_matrix, format_summary};
pub use timing::{compute_timing, percentile_duration_ms, Timing};
