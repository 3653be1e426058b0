//=============================================
// solvra_lua/runtime/gate.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Exclusive-access state machine for the interpreter
// Objective: Idle -> Running -> {Idle, TimedOut} with atomic check-and-admit
//=============================================

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::info;

use crate::error::{Error, Result};

/// Observable access state of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessState {
    Idle,
    Running,
    /// An abandoned operation is still draining; new requests are rejected.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running(u64),
    TimedOut(u64),
}

#[derive(Debug)]
pub(crate) struct Gate {
    phase: Mutex<Phase>,
    changed: Condvar,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            phase: Mutex::new(Phase::Idle),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> AccessState {
        match *self.phase.lock() {
            Phase::Idle => AccessState::Idle,
            Phase::Running(_) => AccessState::Running,
            Phase::TimedOut(_) => AccessState::TimedOut,
        }
    }

    /// Claim exclusive access for `ticket` before `deadline`.
    ///
    /// The timed-out check and the claim happen under one lock, so no request
    /// slips in between observing the state and acting on it.
    pub(crate) fn admit(&self, ticket: u64, deadline: Instant, timeout: Duration) -> Result<()> {
        let mut phase = self.phase.lock();
        loop {
            match *phase {
                Phase::TimedOut(_) => return Err(Error::Timeout(timeout)),
                Phase::Idle => {
                    *phase = Phase::Running(ticket);
                    return Ok(());
                }
                Phase::Running(_) => {
                    if self.changed.wait_until(&mut phase, deadline).timed_out()
                        && !matches!(*phase, Phase::Idle)
                    {
                        return Err(Error::Timeout(timeout));
                    }
                }
            }
        }
    }

    /// Worker side: mark `ticket` as running when nobody claimed access first.
    pub(crate) fn enter(&self, ticket: u64) {
        let mut phase = self.phase.lock();
        if *phase == Phase::Idle {
            *phase = Phase::Running(ticket);
        }
    }

    /// Release access held by `ticket`, whether it completed or was abandoned.
    pub(crate) fn settle(&self, ticket: u64) {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Running(current) if current == ticket => *phase = Phase::Idle,
            Phase::TimedOut(current) if current == ticket => {
                *phase = Phase::Idle;
                info!(ticket, "abandoned ticket drained; accepting requests again");
            }
            _ => return,
        }
        self.changed.notify_all();
    }

    /// Caller side after its deadline passed. `ready` is consulted under the
    /// lock; a result delivered before the worker settled is still returned.
    pub(crate) fn abandon_unless<T, F>(&self, ticket: u64, ready: F) -> Option<T>
    where
        F: FnOnce() -> Option<T>,
    {
        let mut phase = self.phase.lock();
        if let Some(outcome) = ready() {
            return Some(outcome);
        }
        if *phase == Phase::Running(ticket) {
            *phase = Phase::TimedOut(ticket);
            self.changed.notify_all();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn soon(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn admit_claims_idle_gate() {
        let gate = Gate::new();
        gate.admit(1, soon(10), Duration::from_millis(10)).expect("admit");
        assert_eq!(gate.state(), AccessState::Running);
        gate.settle(1);
        assert_eq!(gate.state(), AccessState::Idle);
    }

    #[test]
    fn timed_out_gate_rejects_without_waiting() {
        let gate = Gate::new();
        gate.admit(1, soon(10), Duration::from_millis(10)).expect("admit");
        assert!(gate.abandon_unless(1, || None::<()>).is_none());
        assert_eq!(gate.state(), AccessState::TimedOut);

        let started = Instant::now();
        assert!(matches!(
            gate.admit(2, soon(500), Duration::from_millis(500)),
            Err(Error::Timeout(_))
        ));
        assert!(started.elapsed() < Duration::from_millis(250));

        gate.settle(1);
        gate.admit(3, soon(10), Duration::from_millis(10)).expect("recovered");
    }

    #[test]
    fn waiting_admission_wakes_on_settle() {
        let gate = Arc::new(Gate::new());
        gate.admit(1, soon(10), Duration::from_millis(10)).expect("admit");
        let releaser = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                gate.settle(1);
            })
        };
        gate.admit(2, soon(2_000), Duration::from_secs(2)).expect("second admit");
        releaser.join().expect("join releaser");
        assert_eq!(gate.state(), AccessState::Running);
    }

    #[test]
    fn ready_results_win_over_abandonment() {
        let gate = Gate::new();
        gate.admit(4, soon(10), Duration::from_millis(10)).expect("admit");
        assert_eq!(gate.abandon_unless(4, || Some(7)), Some(7));
        assert_eq!(gate.state(), AccessState::Running);
    }
}
