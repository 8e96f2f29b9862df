//! Failed-login throttling.
//!
//! Failures are counted per normalised email inside a fixed window that opens
//! at the first attempt. Every attempt reserves a slot before the password is
//! verified, and refusal happens when recorded failures plus attempts still in
//! flight reach `max_attempts`. Concurrent guesses therefore cannot all slip
//! past the limit while earlier ones are still hashing. Counting by email
//! whether or not the account exists keeps the throttle from revealing
//! existence.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::warn;

use super::{AuthError, AuthResult};
use crate::config::AuthConfig;
use crate::models::auth::normalize_email;

/// Upper bound on distinct emails tracked at once.
pub const MAX_TRACKED_EMAILS: usize = 100_000;

#[derive(Debug, Clone, Copy)]
struct AttemptWindow {
    failures: u32,
    in_flight: u32,
    opened_at: DateTime<Utc>,
}

impl AttemptWindow {
    fn open(now: DateTime<Utc>) -> Self {
        Self {
            failures: 0,
            in_flight: 0,
            opened_at: now,
        }
    }
}

/// Per-email failed attempt counter.
#[derive(Debug)]
pub struct LoginThrottle {
    max_attempts: u32,
    window: Duration,
    capacity: usize,
    attempts: DashMap<String, AttemptWindow>,
}

/// A reserved login attempt. Settle it with [`AttemptSlot::succeed`] or
/// [`AttemptSlot::fail`]; dropping it unsettled releases the reservation
/// without counting a failure.
#[must_use = "an unsettled slot is released on drop"]
#[derive(Debug)]
pub struct AttemptSlot<'a> {
    throttle: &'a LoginThrottle,
    key: Option<String>,
}

impl AttemptSlot<'_> {
    /// Clear the failure count for the email.
    pub fn succeed(mut self) {
        if let Some(key) = self.key.take() {
            self.throttle.settle(key, None);
        }
    }

    /// Count a failure; returns the failures now recorded in the window.
    pub fn fail(mut self, now: DateTime<Utc>) -> u32 {
        match self.key.take() {
            Some(key) => self.throttle.settle(key, Some(now)),
            None => 0,
        }
    }
}

impl Drop for AttemptSlot<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.throttle.release(&key);
        }
    }
}

impl LoginThrottle {
    /// `max_attempts == 0` disables throttling.
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self::with_capacity(max_attempts, window, MAX_TRACKED_EMAILS)
    }

    pub fn with_capacity(max_attempts: u32, window: Duration, capacity: usize) -> Self {
        Self {
            max_attempts,
            window,
            capacity,
            attempts: DashMap::new(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.max_login_attempts, config.lockout_duration)
    }

    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Reserve an attempt for `email`, or refuse while it is locked out.
    ///
    /// The check and the reservation happen under one map entry lock.
    pub fn begin(&self, email: &str, now: DateTime<Utc>) -> AuthResult<AttemptSlot<'_>> {
        if !self.is_enabled() {
            return Ok(AttemptSlot {
                throttle: self,
                key: None,
            });
        }
        let key = normalize_email(email);
        if !self.attempts.contains_key(&key) && self.attempts.len() >= self.capacity {
            self.prune(now);
            if self.attempts.len() >= self.capacity {
                warn!(
                    tracked = self.attempts.len(),
                    "login throttle full; refusing untracked email"
                );
                return Err(self.refusal(self.window));
            }
        }

        let mut entry = self
            .attempts
            .entry(key.clone())
            .or_insert_with(|| AttemptWindow::open(now));
        if now >= entry.opened_at + self.window {
            entry.failures = 0;
            entry.opened_at = now;
        }
        if entry.failures + entry.in_flight >= self.max_attempts {
            let remaining = entry.opened_at + self.window - now;
            return Err(self.refusal(remaining));
        }
        entry.in_flight += 1;
        Ok(AttemptSlot {
            throttle: self,
            key: Some(key),
        })
    }

    fn refusal(&self, remaining: Duration) -> AuthError {
        AuthError::TooManyAttempts {
            retry_after_secs: remaining.num_seconds().max(1) as u64,
        }
    }

    /// Convert an in-flight reservation into a success (`None`) or a failure.
    fn settle(&self, key: String, failed_at: Option<DateTime<Utc>>) -> u32 {
        match self.attempts.entry(key) {
            Entry::Vacant(vacant) => match failed_at {
                Some(now) => {
                    vacant.insert(AttemptWindow {
                        failures: 1,
                        in_flight: 0,
                        opened_at: now,
                    });
                    1
                }
                None => 0,
            },
            Entry::Occupied(mut occupied) => {
                let window = self.window;
                let entry = occupied.get_mut();
                entry.in_flight = entry.in_flight.saturating_sub(1);
                match failed_at {
                    Some(now) => {
                        if now >= entry.opened_at + window {
                            entry.failures = 0;
                            entry.opened_at = now;
                        }
                        entry.failures += 1;
                        entry.failures
                    }
                    None => {
                        entry.failures = 0;
                        if entry.in_flight == 0 {
                            occupied.remove();
                        }
                        0
                    }
                }
            }
        }
    }

    fn release(&self, key: &str) {
        let drained = match self.attempts.get_mut(key) {
            Some(mut entry) => {
                entry.in_flight = entry.in_flight.saturating_sub(1);
                entry.in_flight == 0 && entry.failures == 0
            }
            None => false,
        };
        if drained {
            self.attempts
                .remove_if(key, |_, e| e.in_flight == 0 && e.failures == 0);
        }
    }

    /// Drop lapsed windows with nothing in flight.
    pub fn prune(&self, now: DateTime<Utc>) {
        let window = self.window;
        self.attempts
            .retain(|_, e| e.in_flight > 0 || now < e.opened_at + window);
    }

    pub fn tracked(&self) -> usize {
        self.attempts.len()
    }
}
