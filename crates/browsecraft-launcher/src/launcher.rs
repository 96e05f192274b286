//! Spawns a browser subprocess and waits for it to announce its debugger
//! endpoint over stderr.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::candidates::resolve_candidate;
use crate::error::LaunchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Browser {
    Chrome,
    Firefox,
    Edge,
}

impl Browser {
    fn is_firefox(self) -> bool {
        matches!(self, Browser::Firefox)
    }
}

/// Tunables for one launch. Every knob has a documented default; nothing is
/// a hidden constant buried in the spawn logic.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub browser: Browser,
    pub headless: bool,
    pub executable_path: Option<String>,
    pub extra_args: Vec<String>,
    pub maximized: bool,
    /// How long to wait for the endpoint banner on stderr before killing
    /// the process and failing.
    pub timeout_ms: u64,
}

impl LaunchOptions {
    pub fn new(browser: Browser) -> Self {
        Self {
            browser,
            headless: true,
            executable_path: None,
            extra_args: Vec::new(),
            maximized: false,
            timeout_ms: 30_000,
        }
    }
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::new(Browser::Chrome)
    }
}

static BANNER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:DevTools listening on|WebDriver BiDi listening on) (ws://\S+)").unwrap()
});

/// A spawned browser process and the endpoint it printed. `close` tears
/// everything down; dropping without calling `close` leaves the process
/// and profile directory behind (the caller is expected to always close).
pub struct LaunchedBrowser {
    pub ws_endpoint: String,
    profile_dir: Mutex<Option<TempDir>>,
    child: Mutex<Option<Child>>,
}

impl LaunchedBrowser {
    /// Best-effort read of the scratch profile directory path; `None` once
    /// `close` has already run.
    pub fn profile_dir_path(&self) -> Option<PathBuf> {
        self.profile_dir
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|dir| dir.path().to_path_buf()))
    }

    /// Graceful signal, bounded wait, force kill, swallow removal errors.
    pub async fn close(&self) {
        let mut child_guard = self.child.lock().await;
        if let Some(mut child) = child_guard.take() {
            send_graceful_signal(&child);
            match tokio::time::timeout(Duration::from_secs(3), child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!("browser process did not exit gracefully, force killing");
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
            }
        }
        drop(child_guard);

        let mut profile_guard = self.profile_dir.lock().await;
        if let Some(dir) = profile_guard.take() {
            // TempDir's own Drop swallows removal errors; this is the
            // explicit point in the shutdown sequence where that happens.
            drop(dir);
        }
    }
}

#[cfg(unix)]
fn send_graceful_signal(child: &Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn send_graceful_signal(_child: &Child) {
    // No portable graceful signal on this platform; the bounded wait below
    // falls straight through to force kill.
}

fn build_args(options: &LaunchOptions) -> Vec<String> {
    let mut args = Vec::new();
    if options.browser.is_firefox() {
        args.push("-profile".to_string());
        // profile dir argument is appended by the caller once it exists
        if options.headless {
            args.push("-headless".to_string());
        }
        args.push("-no-remote".to_string());
        args.push("about:blank".to_string());
    } else {
        args.push("--remote-debugging-port=0".to_string());
        args.push("--no-first-run".to_string());
        args.push("--no-default-browser-check".to_string());
        args.push("--disable-background-networking".to_string());
        if options.headless {
            args.push("--headless=new".to_string());
        }
        if options.maximized {
            args.push("--start-maximized".to_string());
        }
        args.push("about:blank".to_string());
    }
    args.extend(options.extra_args.iter().cloned());
    args
}

/// Resolves the executable, spawns the browser, and waits for its endpoint
/// banner on stderr. Kills the process and fails with accumulated stderr if
/// the banner never appears within `options.timeout_ms`.
pub async fn launch(options: LaunchOptions) -> Result<LaunchedBrowser, LaunchError> {
    let executable = match &options.executable_path {
        Some(path) => path.clone(),
        None => resolve_candidate(options.browser).ok_or_else(|| LaunchError::ExecutableNotFound {
            browser: format!("{:?}", options.browser),
        })?,
    };

    let profile_dir = TempDir::new().map_err(LaunchError::ProfileDir)?;

    let mut command = Command::new(&executable);
    command.kill_on_drop(true);
    command.stdout(Stdio::null());
    command.stderr(Stdio::piped());
    command.stdin(Stdio::null());

    let mut args = build_args(&options);
    if options.browser.is_firefox() {
        // '-profile <dir>' must immediately follow the flag.
        if let Some(pos) = args.iter().position(|a| a == "-profile") {
            args.insert(pos + 1, profile_dir.path().display().to_string());
        }
    } else {
        args.push(format!("--user-data-dir={}", profile_dir.path().display()));
    }
    command.args(&args);

    let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
        executable: executable.clone(),
        source,
    })?;

    let stderr = child
        .stderr
        .take()
        .expect("stderr was requested as piped");
    let mut lines = BufReader::new(stderr).lines();

    let collected = std::sync::Arc::new(std::sync::Mutex::new(String::new()));
    let collected_for_scan = std::sync::Arc::clone(&collected);
    let scan = async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(captures) = BANNER_RE.captures(&line) {
                        return Some(captures[1].to_string());
                    }
                    let mut buf = collected_for_scan.lock().unwrap();
                    buf.push_str(&line);
                    buf.push('\n');
                }
                Ok(None) | Err(_) => return None,
            }
        }
    };

    match tokio::time::timeout(Duration::from_millis(options.timeout_ms), scan).await {
        Ok(Some(endpoint)) => Ok(LaunchedBrowser {
            ws_endpoint: endpoint,
            profile_dir: Mutex::new(Some(profile_dir)),
            child: Mutex::new(Some(child)),
        }),
        Ok(None) => {
            let _ = child.kill().await;
            Err(LaunchError::ProcessExitedEarly {
                executable,
                stderr: collected.lock().unwrap().clone(),
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            Err(LaunchError::BannerTimeout {
                executable,
                timeout_ms: options.timeout_ms,
                stderr: collected.lock().unwrap().clone(),
            })
        }
    }
}
