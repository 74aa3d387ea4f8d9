//! One-shot interruption timer and bounded waiting.

use crate::{Error, Result, State};
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct TimerState {
    disabled: bool,
    fired: bool,
}

#[derive(Default)]
struct TimerShared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

/// Calls a callback with `(State::Failed, Error::Timeout)` once a duration
/// has elapsed, unless disabled first.
///
/// The callback runs on the timer thread while holding the timer lock, so
/// once [`InterruptionTimeout::disable`] returns the callback either has
/// completed or will never run.
pub struct InterruptionTimeout {
    shared: Arc<TimerShared>,
}

impl InterruptionTimeout {
    /// Starts the timer thread.
    ///
    /// # Errors
    /// Returns `Thread` if the timer thread cannot be spawned.
    pub fn new<F>(duration: Duration, callback: F) -> Result<Self>
    where
        F: FnOnce(State, Error) + Send + 'static,
    {
        let shared = Arc::new(TimerShared::default());
        let timer = Arc::clone(&shared);
        thread::Builder::new()
            .name("clustream-timeout".to_string())
            .spawn(move || {
                // past `Instant`'s range the timer only ends when disabled
                let deadline = Instant::now().checked_add(duration);
                let mut state = timer.state.lock();
                while !state.disabled {
                    match deadline {
                        Some(deadline) => {
                            if timer.wakeup.wait_until(&mut state, deadline).timed_out() {
                                break;
                            }
                        }
                        None => timer.wakeup.wait(&mut state),
                    }
                }
                if !state.disabled {
                    state.fired = true;
                    debug!("timeout fired after {duration:?}");
                    callback(State::Failed, Error::Timeout);
                }
            })?;
        Ok(Self { shared })
    }

    /// Prevents the callback from running. Idempotent.
    pub fn disable(&self) {
        let mut state = self.shared.state.lock();
        state.disabled = true;
        self.shared.wakeup.notify_all();
    }

    /// Returns true if the callback ran.
    #[must_use]
    pub fn fired(&self) -> bool {
        self.shared.state.lock().fired
    }
}

impl Drop for InterruptionTimeout {
    fn drop(&mut self) {
        self.disable();
    }
}

/// Polls until `poll` yields a value or `timeout` elapses.
///
/// `poll` receives the longest time it may block before returning, at most
/// `step`. A zero `timeout`, or one too large to represent as a deadline,
/// waits forever.
///
/// # Errors
/// Returns `Timeout` once `timeout` has elapsed.
pub fn wait_timeout<T, F>(timeout: Duration, step: Duration, mut poll: F) -> Result<T>
where
    F: FnMut(Duration) -> Option<T>,
{
    let deadline = if timeout.is_zero() {
        None
    } else {
        Instant::now().checked_add(timeout)
    };
    loop {
        let slice = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(Error::Timeout);
                }
                step.min(deadline - now)
            }
            None => step,
        };
        if let Some(value) = poll(slice) {
            return Ok(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_timeout_fires() {
        let (tx, rx) = channel();
        let timeout = InterruptionTimeout::new(Duration::from_millis(10), move |state, err| {
            tx.send((state, err)).unwrap();
        })
        .unwrap();

        let (state, err) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(state, State::Failed);
        assert_eq!(err, Error::Timeout);
        assert!(timeout.fired());
    }

    #[test]
    fn test_disabled_timeout_never_fires() {
        let (tx, rx) = channel::<()>();
        let timeout = InterruptionTimeout::new(Duration::from_millis(50), move |_, _| {
            tx.send(()).unwrap();
        })
        .unwrap();
        timeout.disable();
        timeout.disable();

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(!timeout.fired());
    }

    #[test]
    fn test_unreachable_deadline_never_fires() {
        let (tx, rx) = channel::<()>();
        let timeout = InterruptionTimeout::new(Duration::MAX, move |_, _| {
            tx.send(()).unwrap();
        })
        .unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        timeout.disable();
        assert!(!timeout.fired());
    }

    #[test]
    fn test_wait_timeout_huge_timeout() {
        let mut polls = 0;
        let value = wait_timeout(Duration::MAX, Duration::from_millis(1), |_| {
            polls += 1;
            (polls == 3).then_some(polls)
        })
        .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_wait_timeout_expires() {
        let start = Instant::now();
        let res: Result<()> = wait_timeout(Duration::from_millis(30), Duration::from_millis(5), |slice| {
            thread::sleep(slice);
            None
        });
        assert_eq!(res, Err(Error::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_timeout_signal() {
        let (tx, rx) = channel();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(7).unwrap();
        });
        let value = wait_timeout(Duration::ZERO, Duration::from_millis(2), |slice| {
            rx.recv_timeout(slice).ok()
        })
        .unwrap();
        assert_eq!(value, 7);
    }
}
