//! Retry-with-fixed-delay primitive shared by the job pollers.

use crate::error::Result;
use std::thread;
use std::time::Duration;

/// How often and how many times to ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the step reports `Done`.
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    #[must_use]
    pub const fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }

    #[must_use]
    pub const fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }
}

/// Outcome of a single poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep<T> {
    Continue,
    Done(T),
}

/// Sleep for `duration`, skipping the syscall for zero.
pub fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

/// Run `step` until it returns `Done`, an error, or the attempt budget runs
/// out. Sleeps `policy.interval` between attempts, never after the last one.
///
/// Returns `Ok(None)` when the budget is exhausted.
///
/// # Errors
///
/// Propagates the first error returned by `step`.
pub fn poll<T, F>(policy: &PollPolicy, mut step: F) -> Result<Option<T>>
where
    F: FnMut(u32) -> Result<PollStep<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        if let PollStep::Done(value) = step(attempt)? {
            return Ok(Some(value));
        }
        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            return Ok(None);
        }
        pause(policy.interval);
    }
}
