//! Error types for the E2E harness
//!
//! Three families matter here and must never be confused: structural
//! mismatches bubbling up from the patch crate (fatal, the front-end
//! toolchain drifted), cache/clock misuse (programming errors in the test
//! suite itself, raised immediately so nothing hangs), and plain assertion
//! failures (ordinary test outcomes). Nothing in this crate retries.

use thiserror::Error;

pub type E2eResult<T> = std::result::Result<T, E2eError>;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("patch error: {0}")]
    Patch(#[from] cubedrill_patch::PatchError),

    #[error("configuration error: {0}")]
    Config(#[from] cubedrill_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("bridge protocol error: {0}")]
    Bridge(String),

    #[error("proxy error: {0}")]
    Proxy(String),

    #[error("browser command failed: {command} - {message}")]
    Browser { command: String, message: String },

    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("no state named `{0}` is registered")]
    UnknownState(String),

    #[error(
        "attempted to restore the `{name}` state before its cache was populated; \
         call populate (normally in a suite-setup hook) first"
    )]
    UnpopulatedCache { name: String },

    #[error(
        "the `{name}` state cache was already populated; entries are populated \
         exactly once per process and read-only afterwards"
    )]
    CacheRepopulated { name: String },

    #[error("can't call a clock method before the clock was installed")]
    ClockNotInstalled,

    #[error("state value `{value}` is not part of this root's enumerated domain")]
    UnknownStateValue { value: String },

    #[error(
        "dev-server auto-reload was requested during the run; hot reload causes \
         flaky tests, serve the app with a non-reloading server while testing"
    )]
    ReloadDetected,

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Baseline not found: {0}")]
    BaselineNotFound(String),

    #[error("Screenshot mismatch: {name} differs by {diff_percent:.2}% (threshold: {threshold:.2}%)")]
    ScreenshotMismatch {
        name: String,
        diff_percent: f64,
        threshold: f64,
    },
}
