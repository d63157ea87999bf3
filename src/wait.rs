// src/wait.rs
//! Wait policies: "wait forever" vs. "wait up to a deadline" semantics over
//! a condition variable, including remaining-time arithmetic across
//! wake-ups.

use crate::error::{PoolError, Result};
use std::sync::{Condvar, MutexGuard};
use std::time::{Duration, Instant};

/// Encapsulates how an `acquire` blocks on the pool's condition variable.
///
/// The pool's blocking loop calls [`await_next`](Self::await_next) once per
/// iteration and [`check_time_elapsed`](Self::check_time_elapsed)
/// immediately afterwards; the latter raises [`PoolError::Timeout`] once a
/// bounded deadline has passed.
pub trait WaitPolicy {
    /// Suspends the calling thread on `condvar` once, returning the
    /// re-acquired guard.
    fn await_next<'a, T>(&mut self, condvar: &Condvar, guard: MutexGuard<'a, T>)
    -> MutexGuard<'a, T>;

    /// Raises [`PoolError::Timeout`] if this policy's deadline has elapsed.
    fn check_time_elapsed(&self) -> Result<()>;
}

/// Waits with no deadline.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl Unlimited {
    /// Creates a new unlimited wait policy.
    pub fn new() -> Self {
        Self
    }
}

impl WaitPolicy for Unlimited {
    fn await_next<'a, T>(
        &mut self,
        condvar: &Condvar,
        guard: MutexGuard<'a, T>,
    ) -> MutexGuard<'a, T> {
        condvar.wait(guard).unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_time_elapsed(&self) -> Result<()> {
        Ok(())
    }
}

/// Waits up to a fixed total duration, tracked across wake-ups.
#[derive(Debug, Clone, Copy)]
pub struct Bounded {
    remaining: Duration,
    elapsed: bool,
}

impl Bounded {
    /// Creates a bounded wait policy with the given total deadline.
    pub fn new(total: Duration) -> Self {
        Self {
            remaining: total,
            elapsed: false,
        }
    }
}

impl WaitPolicy for Bounded {
    fn await_next<'a, T>(
        &mut self,
        condvar: &Condvar,
        guard: MutexGuard<'a, T>,
    ) -> MutexGuard<'a, T> {
        if self.remaining.is_zero() {
            self.elapsed = true;
            return guard;
        }

        let started = Instant::now();
        let guard = condvar
            .wait_timeout(guard, self.remaining)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .0;
        self.remaining = self.remaining.saturating_sub(started.elapsed());
        if self.remaining.is_zero() {
            self.elapsed = true;
        }
        guard
    }

    fn check_time_elapsed(&self) -> Result<()> {
        if self.elapsed {
            Err(PoolError::Timeout)
        } else {
            Ok(())
        }
    }
}
