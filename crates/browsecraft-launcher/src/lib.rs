//! Resolves a browser executable, spawns it with a scratch profile, and
//! waits for its debugger endpoint banner on stderr.

pub mod candidates;
pub mod error;
pub mod launcher;

pub use error::LaunchError;
pub use launcher::{launch, Browser, LaunchOptions, LaunchedBrowser};
