//! Simulated feedback device.
//!
//! Stands in for the cane microcontroller so the host stack can run without
//! hardware. It records every byte the host writes and answers the way the
//! firmware does: `C` starts a calibration (`6` right away, `5` once the
//! calibration delay passes) and directional commands are followed by a
//! resume acknowledgment after the motor has finished its move.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use cane_traits::{Clock, Connector, MonotonicClock, Transport};
use tracing::{debug, trace};

use crate::error::HwError;

/// Knobs for the simulated firmware.
#[derive(Debug, Clone)]
pub struct SimBehavior {
    /// Answer `C` at all. `false` models a device that never finishes calibrating.
    pub answer_calibration: bool,
    /// Time between the start ack and the done ack.
    pub calibrate_delay: Duration,
    pub ack_start: u8,
    pub ack_done: u8,
    /// Delay before a resume ack follows `L`/`R`/`D`. `None` disables resume acks.
    pub resume_after: Option<Duration>,
}

impl Default for SimBehavior {
    fn default() -> Self {
        Self {
            answer_calibration: true,
            calibrate_delay: Duration::from_millis(400),
            ack_start: b'6',
            ack_done: b'5',
            resume_after: Some(Duration::from_millis(300)),
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    // Sorted by due time.
    outbox: VecDeque<(Instant, u8)>,
    received: Vec<u8>,
    calibrating_until: Option<Instant>,
    connected: bool,
    // Reads left that fail with `HwError::Timeout`.
    timeouts: usize,
}

/// Cloneable handle to one simulated device; clones share state.
#[derive(Clone)]
pub struct SimulatedDevice<C: Clock = MonotonicClock> {
    state: Arc<Mutex<SimState>>,
    behavior: SimBehavior,
    clock: C,
}

impl SimulatedDevice<MonotonicClock> {
    pub fn new() -> Self {
        Self::with_clock(SimBehavior::default(), MonotonicClock::new())
    }
}

impl Default for SimulatedDevice<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> SimulatedDevice<C> {
    pub fn with_clock(behavior: SimBehavior, clock: C) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                connected: true,
                ..SimState::default()
            })),
            behavior,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Every byte the host has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().received.clone()
    }

    /// Number of times `byte` was written by the host.
    pub fn count_of(&self, byte: u8) -> usize {
        self.lock().received.iter().filter(|b| **b == byte).count()
    }

    /// Queue a byte for the host immediately (noise, manual acks).
    pub fn inject(&self, byte: u8) {
        let now = self.clock.now();
        schedule(&mut self.lock(), now, byte);
    }

    /// Simulate unplugging (`false`) or replugging (`true`) the device.
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Make the next `n` reads fail with `HwError::Timeout`, as a real port
    /// does when its read timeout elapses.
    pub fn time_out_reads(&self, n: usize) {
        self.lock().timeouts = n;
    }

    /// Bytes scheduled for the host that have not been read yet.
    pub fn pending(&self) -> usize {
        self.lock().outbox.len()
    }

    fn react(&self, st: &mut SimState, byte: u8, now: Instant) {
        match byte {
            b'C' => {
                if !self.behavior.answer_calibration {
                    return;
                }
                // Repeated C's from a burst are ignored while a run is in progress.
                if st.calibrating_until.is_some_and(|until| now < until) {
                    return;
                }
                let done_at = now + self.behavior.calibrate_delay;
                st.calibrating_until = Some(done_at);
                schedule(st, now, self.behavior.ack_start);
                schedule(st, done_at, self.behavior.ack_done);
                debug!(delay = ?self.behavior.calibrate_delay, "sim: calibration started");
            }
            b'L' | b'R' | b'D' => {
                if let Some(after) = self.behavior.resume_after {
                    let ack = match byte {
                        b'L' => b'1',
                        b'R' => b'2',
                        _ => b'3',
                    };
                    schedule(st, now + after, ack);
                }
            }
            _ => {}
        }
    }
}

fn schedule(st: &mut SimState, due: Instant, byte: u8) {
    let idx = st.outbox.partition_point(|(t, _)| *t <= due);
    st.outbox.insert(idx, (due, byte));
}

impl<C: Clock + Send + Sync> Transport for SimulatedDevice<C> {
    fn read_byte(&self) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let now = self.clock.now();
        let mut st = self.lock();
        if !st.connected {
            return Err(Box::new(HwError::Disconnected));
        }
        if st.timeouts > 0 {
            st.timeouts -= 1;
            return Err(Box::new(HwError::Timeout));
        }
        match st.outbox.front() {
            Some((due, _)) if *due <= now => Ok(st.outbox.pop_front().map(|(_, b)| b)),
            _ => Ok(None),
        }
    }

    fn write_all(&self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let now = self.clock.now();
        let mut st = self.lock();
        if !st.connected {
            return Err(Box::new(HwError::Disconnected));
        }
        for &b in bytes {
            trace!(byte = b, "sim rx");
            st.received.push(b);
            self.react(&mut st, b, now);
        }
        Ok(())
    }
}

/// Connector that hands out clones of one `SimulatedDevice`.
#[derive(Clone)]
pub struct SimulatedConnector<C: Clock = MonotonicClock> {
    device: SimulatedDevice<C>,
    refuse: bool,
}

impl<C: Clock + Clone> SimulatedConnector<C> {
    pub fn new(device: SimulatedDevice<C>) -> Self {
        Self {
            device,
            refuse: false,
        }
    }

    /// A connector whose every open attempt fails, as with a missing port.
    pub fn refusing(device: SimulatedDevice<C>) -> Self {
        Self {
            device,
            refuse: true,
        }
    }

    pub fn device(&self) -> &SimulatedDevice<C> {
        &self.device
    }
}

impl<C: Clock + Clone + Send + Sync + 'static> Connector for SimulatedConnector<C> {
    fn connect(
        &self,
        port: &str,
        baud_rate: u32,
        _read_timeout: Duration,
    ) -> Result<Box<dyn Transport>, Box<dyn std::error::Error + Send + Sync>> {
        if self.refuse {
            return Err(Box::new(HwError::Open {
                port: port.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such device"),
            }));
        }
        debug!(port, baud_rate, "sim: port opened");
        Ok(Box::new(self.device.clone()))
    }

    fn available_ports(&self) -> Vec<String> {
        vec!["sim0".to_string()]
    }
}
