//! Launch-time failure modes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no candidate executable found for {browser:?} and none was given explicitly")]
    ExecutableNotFound { browser: String },

    #[error("failed to spawn '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{executable}' exited before printing its endpoint banner; stderr: {stderr}")]
    ProcessExitedEarly { executable: String, stderr: String },

    #[error("timed out after {timeout_ms}ms waiting for '{executable}' to print its endpoint banner; stderr so far: {stderr}")]
    BannerTimeout {
        executable: String,
        timeout_ms: u64,
        stderr: String,
    },

    #[error("failed to create scratch profile directory: {0}")]
    ProfileDir(#[source] std::io::Error),
}
