// Heartbeat sources - Pluggable host callbacks that drive the scheduler
//
// A heartbeat source is whatever the host offers to wake the scheduler up:
// a display-refresh callback (repeating, cadence chosen by the host) or a
// one-shot timer (delay chosen by the scheduler). The scheduler registers a
// beat and receives a handle; the host later delivers that handle back via
// `FrameScheduler::heartbeat`. Cancelled or superseded handles are simply
// ignored by the scheduler, which is how cancellation stays cooperative.

use crate::timing::Clock;

/// Kind of heartbeat requested from the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Beat {
    /// Repeating callback synchronized with display refresh
    DisplaySync,
    /// One-shot callback after the given number of milliseconds
    After(f64),
}

/// Identifies one heartbeat registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeartbeatHandle(u64);

impl HeartbeatHandle {
    /// Raw registration id
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Errors raised when the host refuses a heartbeat
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeartbeatError {
    /// The host has no display-synchronized callback to offer
    #[error("display-synchronized heartbeat is not available on this host")]
    DisplaySyncUnavailable,

    /// The host is shutting down and accepts no new registrations
    #[error("heartbeat source is closed")]
    Closed,
}

/// A host-provided repeating or one-shot callback mechanism
pub trait HeartbeatSource {
    /// Arm a heartbeat
    fn register(&mut self, beat: Beat) -> Result<HeartbeatHandle, HeartbeatError>;

    /// Disarm a heartbeat; unknown handles are ignored
    fn cancel(&mut self, handle: HeartbeatHandle);
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    handle: HeartbeatHandle,
    beat: Beat,
    due_at: f64,
}

/// Heartbeat source polled by an event loop
///
/// Holds at most one armed beat. The event loop asks for the display handle
/// when the display refreshes and polls for due timers otherwise. Tests use
/// the same type with a `ManualClock`.
pub struct PolledHeartbeat {
    clock: Box<dyn Clock>,
    display_sync: bool,
    closed: bool,
    next_id: u64,
    armed: Option<Armed>,
}

impl PolledHeartbeat {
    /// Create a source offering both heartbeat kinds
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            display_sync: true,
            closed: false,
            next_id: 1,
            armed: None,
        }
    }

    /// Enable or disable the display-synchronized heartbeat
    pub fn with_display_sync(mut self, available: bool) -> Self {
        self.display_sync = available;
        self
    }

    /// Refuse all further registrations
    pub fn close(&mut self) {
        self.closed = true;
        self.armed = None;
    }

    /// Currently armed beat, if any
    pub fn armed(&self) -> Option<(HeartbeatHandle, Beat)> {
        self.armed.map(|a| (a.handle, a.beat))
    }

    /// Handle to deliver on a display refresh
    pub fn display_handle(&self) -> Option<HeartbeatHandle> {
        self.armed
            .filter(|a| a.beat == Beat::DisplaySync)
            .map(|a| a.handle)
    }

    /// Time (ms, source clock) at which the armed timer is due
    pub fn next_deadline(&self) -> Option<f64> {
        self.armed
            .filter(|a| matches!(a.beat, Beat::After(_)))
            .map(|a| a.due_at)
    }

    /// Take the armed timer if it is due at `now`
    ///
    /// One-shot beats are disarmed when taken.
    pub fn poll_due(&mut self, now: f64) -> Option<HeartbeatHandle> {
        match self.armed {
            Some(armed) if matches!(armed.beat, Beat::After(_)) && now >= armed.due_at => {
                self.armed = None;
                Some(armed.handle)
            }
            _ => None,
        }
    }

    /// Fire the armed beat immediately, whatever its kind
    pub fn trigger(&mut self) -> Option<HeartbeatHandle> {
        let armed = self.armed?;
        if matches!(armed.beat, Beat::After(_)) {
            self.armed = None;
        }
        Some(armed.handle)
    }
}

impl HeartbeatSource for PolledHeartbeat {
    fn register(&mut self, beat: Beat) -> Result<HeartbeatHandle, HeartbeatError> {
        if self.closed {
            return Err(HeartbeatError::Closed);
        }
        if beat == Beat::DisplaySync && !self.display_sync {
            return Err(HeartbeatError::DisplaySyncUnavailable);
        }

        let handle = HeartbeatHandle(self.next_id);
        self.next_id += 1;

        let now = self.clock.now_ms();
        let due_at = match beat {
            Beat::DisplaySync => now,
            Beat::After(ms) => now + ms.max(0.0),
        };
        self.armed = Some(Armed {
            handle,
            beat,
            due_at,
        });
        Ok(handle)
    }

    fn cancel(&mut self, handle: HeartbeatHandle) {
        if self.armed.is_some_and(|a| a.handle == handle) {
            self.armed = None;
        }
    }
}
