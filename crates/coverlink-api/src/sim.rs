// ── Simulated cover device ──
//
// An in-process stand-in for a motorised cover. Positions are raw device
// values where 0 is fully open and 100 fully closed. The motor advances
// one step per status read, so polling drives the simulation forward.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::{debug, trace};

use crate::client::DeviceClient;
use crate::dp::{DpIndex, DpValue, StateSnapshot};
use crate::error::Error;

/// Which data points the simulated device exposes and what its command
/// strings are. Index 0 disables a data point.
#[derive(Debug, Clone)]
pub struct SimLayout {
    pub command_dp: DpIndex,
    pub position_dp: DpIndex,
    pub set_position_dp: DpIndex,
    pub movement_dp: DpIndex,
    pub open_cmd: String,
    pub close_cmd: String,
    pub stop_cmd: String,
    /// Raw position change per status read.
    pub step: u8,
}

impl Default for SimLayout {
    fn default() -> Self {
        Self {
            command_dp: 1,
            position_dp: 3,
            set_position_dp: 2,
            movement_dp: 7,
            open_cmd: "open".into(),
            close_cmd: "close".into(),
            stop_cmd: "stop".into(),
            step: 25,
        }
    }
}

/// Injected misbehaviour, consumed one per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail with a connectivity error.
    Unreachable,
    /// Fail with a device rejection (not retryable).
    Reject,
    /// Never answer.
    Hang,
}

#[derive(Debug)]
struct SimState {
    position: u8,
    target: Option<u8>,
    last_command: String,
    last_set_position: Option<u8>,
    movement: &'static str,
    extra: BTreeMap<DpIndex, DpValue>,
}

/// In-process cover device implementing [`DeviceClient`].
///
/// Counts every call and records writes so tests can assert on exactly
/// what reached the "device".
#[derive(Debug)]
pub struct SimulatedCover {
    device_id: String,
    layout: SimLayout,
    latency: Duration,
    state: Mutex<SimState>,
    faults: Mutex<VecDeque<Fault>>,
    writes: Mutex<Vec<(DpIndex, DpValue)>>,
    status_calls: AtomicU32,
    write_calls: AtomicU32,
}

impl SimulatedCover {
    pub fn new(device_id: impl Into<String>, layout: SimLayout) -> Self {
        Self {
            device_id: device_id.into(),
            layout,
            latency: Duration::ZERO,
            state: Mutex::new(SimState {
                position: 100,
                target: None,
                last_command: String::new(),
                last_set_position: None,
                movement: "stopped",
                extra: BTreeMap::new(),
            }),
            faults: Mutex::new(VecDeque::new()),
            writes: Mutex::new(Vec::new()),
            status_calls: AtomicU32::new(0),
            write_calls: AtomicU32::new(0),
        }
    }

    /// Start at the given raw position (0 open, 100 closed).
    pub fn with_position(self, raw: u8) -> Self {
        self.lock_state().position = raw.min(100);
        self
    }

    /// Add a data point outside the cover layout (e.g. a light switch).
    pub fn with_dp(self, index: DpIndex, value: impl Into<DpValue>) -> Self {
        self.lock_state().extra.insert(index, value.into());
        self
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue `count` faults of the given kind for the next calls.
    pub fn inject(&self, fault: Fault, count: usize) {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        faults.extend(std::iter::repeat_n(fault, count));
    }

    /// Number of `status()` calls that reached the device, failed or not.
    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Number of write calls that reached the device, failed or not.
    pub fn write_calls(&self) -> u32 {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Writes the device accepted, in order.
    pub fn writes(&self) -> Vec<(DpIndex, DpValue)> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Current raw position without advancing the motor.
    pub fn raw_position(&self) -> u8 {
        self.lock_state().position
    }

    pub fn layout(&self) -> &SimLayout {
        &self.layout
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock_state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_fault(&self) -> Option<Fault> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    async fn answer(&self, fault: Option<Fault>) -> Result<(), Error> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match fault {
            None => Ok(()),
            Some(Fault::Unreachable) => Err(Error::Connection {
                host: format!("sim://{}", self.device_id),
                reason: "no route to host".into(),
            }),
            Some(Fault::Reject) => Err(Error::Rejected {
                message: "device busy".into(),
            }),
            Some(Fault::Hang) => std::future::pending().await,
        }
    }

    fn advance(&self) -> StateSnapshot {
        let mut st = self.lock_state();
        if let Some(target) = st.target {
            let step = self.layout.step.max(1);
            if st.position < target {
                st.position = st.position.saturating_add(step).min(target);
                st.movement = "closing";
            } else if st.position > target {
                st.position = st.position.saturating_sub(step).max(target);
                st.movement = "opening";
            }
            if st.position == target {
                st.target = None;
                st.movement = "stopped";
            }
        }
        trace!(position = st.position, movement = st.movement, "simulated motor step");

        let l = &self.layout;
        let mut dps: Vec<(DpIndex, DpValue)> =
            st.extra.iter().map(|(k, v)| (*k, v.clone())).collect();
        if l.command_dp != 0 {
            dps.push((l.command_dp, DpValue::Str(st.last_command.clone())));
        }
        if l.set_position_dp != 0 {
            let set = st.last_set_position.unwrap_or(st.position);
            dps.push((l.set_position_dp, DpValue::from(set)));
        }
        if l.position_dp != 0 {
            dps.push((l.position_dp, DpValue::from(st.position)));
        }
        if l.movement_dp != 0 {
            dps.push((l.movement_dp, DpValue::from(st.movement)));
        }
        dps.into_iter().collect()
    }

    fn apply(&self, index: DpIndex, value: &DpValue) -> Result<(), Error> {
        let l = &self.layout;
        let mut st = self.lock_state();

        if index != 0 && index == l.command_dp {
            let cmd = value.as_str().ok_or_else(|| Error::InvalidValue {
                index,
                reason: format!("expected a command string, got {value}"),
            })?;
            if cmd == l.open_cmd {
                st.target = Some(0);
            } else if cmd == l.close_cmd {
                st.target = Some(100);
            } else if cmd == l.stop_cmd {
                st.target = None;
                st.movement = "stopped";
            } else {
                return Err(Error::InvalidValue {
                    index,
                    reason: format!("unknown command '{cmd}'"),
                });
            }
            st.last_command = cmd.to_owned();
            return Ok(());
        }

        if index != 0 && index == l.set_position_dp {
            let raw = value
                .as_int()
                .and_then(|v| u8::try_from(v).ok())
                .filter(|v| *v <= 100)
                .ok_or_else(|| Error::InvalidValue {
                    index,
                    reason: format!("position must be 0-100, got {value}"),
                })?;
            st.target = Some(raw);
            st.last_set_position = Some(raw);
            return Ok(());
        }

        match st.extra.get_mut(&index) {
            Some(slot) => {
                *slot = value.clone();
                Ok(())
            }
            None => Err(Error::UnknownDataPoint { index }),
        }
    }
}

impl DeviceClient for SimulatedCover {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn status(&self) -> Result<StateSnapshot, Error> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.next_fault();
        self.answer(fault).await?;
        let snap = self.advance();
        debug!(device_id = %self.device_id, dps = snap.len(), "simulated status");
        Ok(snap)
    }

    async fn set_value(&self, index: DpIndex, value: DpValue) -> Result<(), Error> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.next_fault();
        self.answer(fault).await?;
        self.apply(index, &value)?;
        debug!(device_id = %self.device_id, index, %value, "simulated write");
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((index, value));
        Ok(())
    }
}
