//! Deterministic clock façade
//!
//! Layers fake timers onto the page's timer APIs through the injected
//! helper, so time-dependent UI (the stopwatch display) is driven by
//! explicit ticks and jumps instead of wall-clock races. The façade is a
//! two-phase state machine: every operation before `install` is a harness
//! programming error and fails immediately, mirrored by the same guard on
//! the browser side.

use std::sync::atomic::{AtomicBool, Ordering};

use cubedrill_patch::HELPERS_GLOBAL;

use crate::bridge::Driver;
use crate::error::{E2eError, E2eResult};

/// Handle to the page's installable fake clock
#[derive(Debug, Default)]
pub struct Clock {
    installed: AtomicBool,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the page's timer APIs with the deterministic scheduler.
    pub async fn install(&self, driver: &dyn Driver) -> E2eResult<()> {
        driver
            .eval(&format!("window.{HELPERS_GLOBAL}.clock.install()"))
            .await?;
        self.installed.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Advance virtual time by `ms`, firing every timer that falls due, in
    /// due order.
    pub async fn tick(&self, driver: &dyn Driver, ms: u64) -> E2eResult<()> {
        self.require_installed()?;
        driver
            .eval(&format!("window.{HELPERS_GLOBAL}.clock.tick({ms})"))
            .await?;
        Ok(())
    }

    /// Jump virtual time to an absolute value and fire the next scheduled
    /// timer so the UI catches up with the new time.
    pub async fn set_time(&self, driver: &dyn Driver, ms: u64) -> E2eResult<()> {
        self.require_installed()?;
        driver
            .eval(&format!("window.{HELPERS_GLOBAL}.clock.setTime({ms})"))
            .await?;
        Ok(())
    }

    fn require_installed(&self) -> E2eResult<()> {
        if !self.installed.load(Ordering::SeqCst) {
            return Err(E2eError::ClockNotInstalled);
        }
        Ok(())
    }
}

/// The trainer's stopwatch rendering for an elapsed time.
///
/// Tenths are truncated, minutes and seconds pad to two digits once the
/// next unit is in play, and hours grow without bound — there is no day
/// rollover.
pub fn format_timer(ms: u64) -> String {
    let total_tenths = ms / 100;
    let tenths = total_tenths % 10;
    let total_seconds = total_tenths / 10;
    let seconds = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let minutes = total_minutes % 60;
    let hours = total_minutes / 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}.{tenths}")
    } else if minutes > 0 {
        format!("{minutes}:{seconds:02}.{tenths}")
    } else {
        format!("{seconds}.{tenths}")
    }
}
