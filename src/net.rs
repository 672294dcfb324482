use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Pause between two attempts
    pub delay: Duration,
    /// No new attempt is started once this much time has passed
    pub timeout: Duration,
}

/// Whether the firmware reached the network at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    Online,
    Offline,
}

/// Calls `attempt(n)` (1-based) until it succeeds, the attempt budget is
/// used up, or `policy.timeout` has elapsed. The first attempt always runs.
///
/// Returns the number of the successful attempt.
pub fn connect_with_retry<T, E, F>(policy: RetryPolicy, mut attempt: F) -> Result<(u32, T)>
where
    E: Display,
    F: FnMut(u32) -> std::result::Result<T, E>,
{
    let started = Instant::now();
    let mut n = 0;
    loop {
        n += 1;
        match attempt(n) {
            Ok(v) => return Ok((n, v)),
            Err(e) => log::warn!("network attempt {n}/{} failed: {e}", policy.attempts),
        }

        if n >= policy.attempts {
            bail!("network association failed after {n} attempts");
        }
        if started.elapsed() + policy.delay > policy.timeout {
            bail!(
                "network association timed out after {n} attempts ({} ms)",
                policy.timeout.as_millis()
            );
        }
        thread::sleep(policy.delay);
    }
}

/// What the control loop should do about the link on this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    /// Link came back since the last poll
    Restored,
    /// Start a non-blocking connect now
    Reconnect,
    /// Still down, last connect started less than `delay` ago
    Waiting,
}

/// Paces reconnect attempts while the loop keeps ticking. Never blocks;
/// the caller only fires a connect request and checks again next tick.
#[derive(Debug)]
pub struct LinkWatch {
    delay: Duration,
    last_attempt: Option<Instant>,
    down: bool,
}

impl LinkWatch {
    pub fn new(delay: Duration) -> Self {
        Self { delay, last_attempt: None, down: false }
    }

    pub fn poll(&mut self, up: bool, now: Instant) -> LinkEvent {
        if up {
            self.last_attempt = None;
            return if std::mem::replace(&mut self.down, false) {
                LinkEvent::Restored
            } else {
                LinkEvent::Up
            };
        }

        self.down = true;
        match self.last_attempt {
            Some(t) if now.saturating_duration_since(t) < self.delay => LinkEvent::Waiting,
            _ => {
                self.last_attempt = Some(now);
                LinkEvent::Reconnect
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn succeeds_on_later_attempt() {
        let (n, ip) = connect_with_retry(policy(5), |n| {
            if n < 3 { Err("no ap") } else { Ok("192.168.4.2") }
        })
        .unwrap();
        assert_eq!(n, 3);
        assert_eq!(ip, "192.168.4.2");
    }

    #[test]
    fn gives_up_after_budget() {
        let mut calls = 0;
        let err = connect_with_retry(policy(4), |_| -> Result<(), &str> {
            calls += 1;
            Err("auth failed")
        })
        .unwrap_err();
        assert_eq!(calls, 4);
        assert!(err.to_string().contains("after 4 attempts"));
    }

    #[test]
    fn zero_timeout_allows_single_attempt() {
        let mut calls = 0;
        let p = RetryPolicy {
            timeout: Duration::ZERO,
            delay: Duration::from_millis(1),
            ..policy(10)
        };
        let err = connect_with_retry(p, |_| -> Result<(), &str> {
            calls += 1;
            Err("no ap")
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn link_watch_paces_reconnects() {
        let t0 = Instant::now();
        let secs = |n| t0 + Duration::from_secs(n);
        let mut w = LinkWatch::new(Duration::from_secs(10));

        assert_eq!(w.poll(true, t0), LinkEvent::Up);
        assert_eq!(w.poll(false, secs(5)), LinkEvent::Reconnect);
        assert_eq!(w.poll(false, secs(10)), LinkEvent::Waiting);
        assert_eq!(w.poll(false, secs(14)), LinkEvent::Waiting);
        assert_eq!(w.poll(false, secs(15)), LinkEvent::Reconnect);
        assert_eq!(w.poll(true, secs(20)), LinkEvent::Restored);
        assert_eq!(w.poll(true, secs(25)), LinkEvent::Up);
    }

    #[test]
    fn link_watch_retries_immediately_after_new_drop() {
        let t0 = Instant::now();
        let mut w = LinkWatch::new(Duration::from_secs(30));
        assert_eq!(w.poll(false, t0), LinkEvent::Reconnect);
        assert_eq!(w.poll(true, t0 + Duration::from_secs(1)), LinkEvent::Restored);
        assert_eq!(w.poll(false, t0 + Duration::from_secs(2)), LinkEvent::Reconnect);
    }
}
