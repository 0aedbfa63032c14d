//! Cooperative cancellation for the bounded run loops.

use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Set once the process has been asked to stop. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct ExitFlag(Arc<AtomicBool>);

impl ExitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that is raised by Ctrl+C. Only one handler may be installed per
    /// process.
    pub fn on_ctrlc() -> Result<Self, ctrlc::Error> {
        let flag = Self::new();
        let handler_flag = flag.clone();
        ctrlc::set_handler(move || {
            info!("Interrupt received, shutting down");
            handler_flag.raise();
        })?;
        Ok(flag)
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Keeps a loop going until it has run for `limit` or the exit flag is raised.
#[derive(Debug, Clone)]
pub struct RunLimit {
    start: Instant,
    limit: Option<Duration>,
    exit: ExitFlag,
}

impl RunLimit {
    /// `None` runs until interrupted.
    pub fn new(limit: Option<Duration>, exit: ExitFlag) -> Self {
        RunLimit {
            start: Instant::now(),
            limit,
            exit,
        }
    }

    pub fn keep_running(&self) -> bool {
        if self.exit.is_raised() {
            return false;
        }
        match self.limit {
            Some(limit) => self.start.elapsed() < limit,
            None => true,
        }
    }

    pub fn interrupted(&self) -> bool {
        self.exit.is_raised()
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Frames per second over `elapsed`; zero when no time has passed.
pub fn average_fps(frames: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        frames as f64 / secs
    } else {
        0.0
    }
}
