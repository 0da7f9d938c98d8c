//! Calibration handshake.
//!
//! A tick-driven state machine: stop, settle, drain stale acks, burst `C`,
//! then wait for the done ack. Nothing here blocks; the caller ticks it at
//! its frame rate.
use std::sync::Arc;
use std::time::Instant;

use cane_traits::{Clock, GameFlow};
use tracing::{debug, info, warn};

use crate::ack::AckBuffer;
use crate::config::{AckCfg, CalibrationCfg};
use crate::dispatcher::Dispatcher;
use crate::protocol::Command;

/// Externally visible calibration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Idle,
    Calibrating,
    Calibrated,
    /// Only ever returned by the tick on which the window elapsed; the
    /// controller itself is `Idle` afterwards.
    TimedOut,
}

/// Answer to `request()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Started,
    /// A handshake is already in flight.
    Busy,
    /// Too soon after the previous attempt.
    CoolingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Start,
    Settle { until: Instant },
    Burst { sent: u32, next_at: Instant },
    Await { deadline: Instant },
}

pub struct Calibration {
    cfg: CalibrationCfg,
    ack_start: char,
    ack_done: char,
    clock: Arc<dyn Clock + Send + Sync>,
    phase: Phase,
    calibrated: bool,
    got_start: bool,
    send_gate: bool,
    last_attempt: Option<Instant>,
}

impl std::fmt::Debug for Calibration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Calibration")
            .field("phase", &self.phase)
            .field("calibrated", &self.calibrated)
            .field("got_start", &self.got_start)
            .field("send_gate", &self.send_gate)
            .finish()
    }
}

impl Calibration {
    pub fn new(cfg: CalibrationCfg, acks: &AckCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            cfg,
            ack_start: acks.calibrate_start,
            ack_done: acks.calibrate_done,
            clock,
            phase: Phase::Idle,
            calibrated: false,
            got_start: false,
            send_gate: true,
            last_attempt: None,
        }
    }

    /// Ask for a fresh handshake. The work happens on subsequent ticks.
    pub fn request(&mut self) -> RequestOutcome {
        if self.is_calibrating() {
            debug!("calibration request ignored: already calibrating");
            return RequestOutcome::Busy;
        }
        let now = self.clock.now();
        if let Some(last) = self.last_attempt
            && now.saturating_duration_since(last) < self.cfg.cooldown
        {
            debug!("calibration request ignored: cooling down");
            return RequestOutcome::CoolingDown;
        }

        self.last_attempt = Some(now);
        self.calibrated = false;
        self.got_start = false;
        if self.cfg.pause_collision_send {
            self.send_gate = false;
        }
        self.phase = Phase::Start;
        info!("calibrating");
        RequestOutcome::Started
    }

    /// Advance the handshake by one tick.
    ///
    /// Acks must already have been pumped into `acks` for this tick.
    pub fn tick(
        &mut self,
        dispatcher: &mut Dispatcher,
        acks: &mut AckBuffer,
        flow: &mut dyn GameFlow,
    ) -> CalibrationState {
        let now = self.clock.now();
        loop {
            match self.phase {
                Phase::Idle => return self.state(),
                Phase::Start => {
                    if self.cfg.stop_before {
                        dispatcher.send(Command::Stop, true);
                        self.phase = Phase::Settle {
                            until: now + self.cfg.stop_settle,
                        };
                    } else {
                        self.begin_burst(acks, now);
                    }
                }
                Phase::Settle { until } => {
                    if now < until {
                        return CalibrationState::Calibrating;
                    }
                    self.begin_burst(acks, now);
                }
                Phase::Burst { sent, next_at } => {
                    if now < next_at {
                        return CalibrationState::Calibrating;
                    }
                    if sent < self.cfg.burst_count {
                        dispatcher.send(Command::Calibrate, true);
                        self.phase = Phase::Burst {
                            sent: sent + 1,
                            next_at: now + self.cfg.burst_interval,
                        };
                        return CalibrationState::Calibrating;
                    }
                    debug!(sent, "calibrate burst complete");
                    self.phase = Phase::Await {
                        deadline: now + self.cfg.timeout,
                    };
                }
                Phase::Await { deadline } => {
                    if !self.got_start && acks.consume(self.ack_start) {
                        self.got_start = true;
                        debug!("device acknowledged calibration start");
                    }
                    if acks.consume(self.ack_done) {
                        self.finish_ok(dispatcher, flow);
                        return CalibrationState::Calibrated;
                    }
                    if now >= deadline {
                        self.finish_timeout();
                        return CalibrationState::TimedOut;
                    }
                    return CalibrationState::Calibrating;
                }
            }
        }
    }

    fn begin_burst(&mut self, acks: &mut AckBuffer, now: Instant) {
        // Done first, then start: a late '5' from a previous run must not
        // complete this one.
        for target in [self.ack_done, self.ack_start] {
            for _ in 0..self.cfg.drain_attempts {
                if !acks.consume(target) {
                    break;
                }
            }
        }
        self.phase = Phase::Burst {
            sent: 0,
            next_at: now,
        };
    }

    fn finish_ok(&mut self, dispatcher: &mut Dispatcher, flow: &mut dyn GameFlow) {
        self.phase = Phase::Idle;
        self.calibrated = true;
        if self.cfg.stop_after {
            dispatcher.send(Command::Stop, true);
        }
        self.send_gate = true;
        info!(got_start = self.got_start, "calibration complete");
        flow.show_next_screen();
    }

    fn finish_timeout(&mut self) {
        self.phase = Phase::Idle;
        self.calibrated = false;
        self.send_gate = true;
        warn!(
            timeout_ms = self.cfg.timeout.as_millis() as u64,
            got_start = self.got_start,
            "calibration timed out"
        );
    }

    pub fn state(&self) -> CalibrationState {
        if self.is_calibrating() {
            CalibrationState::Calibrating
        } else if self.calibrated {
            CalibrationState::Calibrated
        } else {
            CalibrationState::Idle
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Whether the device acknowledged the start of the current/last run.
    pub fn got_start(&self) -> bool {
        self.got_start
    }

    /// Collision send-gate.
    pub fn allow_send(&self) -> bool {
        self.send_gate
    }

    pub fn can_start_game(&self) -> bool {
        self.calibrated && !self.is_calibrating()
    }

    /// Start the game if calibration allows it. Returns whether it did.
    pub fn try_start_game(&self, flow: &mut dyn GameFlow) -> bool {
        if !self.can_start_game() {
            info!("calibrate before starting the game");
            return false;
        }
        flow.start_game();
        true
    }

    pub fn cfg(&self) -> &CalibrationCfg {
        &self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchCfg;
    use crate::game_flow::GameFlowState;
    use crate::mocks::RecordingSink;
    use cane_traits::TestClock;
    use std::time::Duration;

    struct Rig {
        clock: TestClock,
        sink: Arc<RecordingSink>,
        disp: Dispatcher,
        acks: AckBuffer,
        flow: GameFlowState,
        cal: Calibration,
    }

    fn rig(cfg: CalibrationCfg) -> Rig {
        let clock = TestClock::new();
        let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
        let sink = Arc::new(RecordingSink::new());
        let ack_cfg = AckCfg::default();
        Rig {
            disp: Dispatcher::new(sink.clone(), shared.clone(), &DispatchCfg::default()),
            acks: AckBuffer::new(&ack_cfg),
            flow: GameFlowState::new(shared.clone(), Duration::from_secs(60)),
            cal: Calibration::new(cfg, &ack_cfg, shared),
            clock,
            sink,
        }
    }

    impl Rig {
        fn tick(&mut self) -> CalibrationState {
            self.cal.tick(&mut self.disp, &mut self.acks, &mut self.flow)
        }

        /// Tick every 10 ms until the burst is done.
        fn run_burst(&mut self) {
            for _ in 0..100 {
                self.tick();
                if self.sink.count_of(b'C') as u32 == self.cal.cfg.burst_count {
                    break;
                }
                self.clock.advance_ms(10);
            }
            self.clock.advance(self.cal.cfg.burst_interval);
            assert_eq!(self.tick(), CalibrationState::Calibrating);
        }
    }

    #[test]
    fn happy_path_sends_stop_burst_stop() {
        let mut r = rig(CalibrationCfg::default());
        assert_eq!(r.cal.request(), RequestOutcome::Started);
        assert!(!r.cal.allow_send());
        r.run_burst();
        r.acks.on_byte(b'6');
        assert_eq!(r.tick(), CalibrationState::Calibrating);
        assert!(r.cal.got_start());
        r.acks.on_byte(b'5');
        assert_eq!(r.tick(), CalibrationState::Calibrated);

        assert_eq!(r.sink.bytes(), b"FCCCCCF");
        assert!(r.cal.allow_send());
        assert!(r.cal.can_start_game());
        assert_eq!(r.flow.next_screen_count(), 1);
        // Further ticks do not repeat the transition.
        assert_eq!(r.tick(), CalibrationState::Calibrated);
        assert_eq!(r.flow.next_screen_count(), 1);
    }

    #[test]
    fn start_ack_alone_does_not_complete() {
        let mut r = rig(CalibrationCfg::default());
        r.cal.request();
        r.run_burst();
        r.acks.on_byte(b'6');
        r.clock.advance_ms(500);
        assert_eq!(r.tick(), CalibrationState::Calibrating);
        assert!(!r.cal.is_calibrated());
    }

    #[test]
    fn timeout_settles_idle_and_reopens_gate() {
        let mut r = rig(CalibrationCfg::default());
        r.cal.request();
        r.run_burst();
        r.clock.advance(Duration::from_millis(7_999));
        assert_eq!(r.tick(), CalibrationState::Calibrating);
        r.clock.advance_ms(1);
        assert_eq!(r.tick(), CalibrationState::TimedOut);
        assert_eq!(r.cal.state(), CalibrationState::Idle);
        assert!(!r.cal.is_calibrated());
        assert!(r.cal.allow_send());
        assert_eq!(r.flow.next_screen_count(), 0);
        // The stop-after is only sent on success.
        assert_eq!(r.sink.count_of(b'F'), 1);
    }

    #[test]
    fn second_request_is_rejected() {
        let mut r = rig(CalibrationCfg::default());
        assert_eq!(r.cal.request(), RequestOutcome::Started);
        assert_eq!(r.cal.request(), RequestOutcome::Busy);
        r.run_burst();
        r.acks.on_byte(b'5');
        r.tick();
        // Less than the 1 s cooldown since the first request.
        assert_eq!(r.cal.request(), RequestOutcome::CoolingDown);
        r.clock.advance(Duration::from_secs(1));
        assert_eq!(r.cal.request(), RequestOutcome::Started);
        assert!(!r.cal.is_calibrated());
    }

    #[test]
    fn stale_done_ack_is_drained_before_burst() {
        let mut r = rig(CalibrationCfg::default());
        r.acks.on_byte(b'5');
        r.cal.request();
        r.tick();
        r.clock.advance_ms(80);
        r.tick();
        assert_eq!(r.acks.peek(), None);
        r.run_burst();
        assert_eq!(r.tick(), CalibrationState::Calibrating);
    }

    #[test]
    fn without_stop_before_burst_starts_immediately() {
        let mut r = rig(CalibrationCfg {
            stop_before: false,
            stop_after: false,
            ..CalibrationCfg::default()
        });
        r.cal.request();
        r.tick();
        assert_eq!(r.sink.bytes(), b"C");
    }

    #[test]
    fn start_game_requires_calibration() {
        let mut r = rig(CalibrationCfg::default());
        assert!(!r.cal.try_start_game(&mut r.flow));
        r.cal.request();
        r.run_burst();
        r.acks.on_byte(b'5');
        r.tick();
        assert!(r.cal.try_start_game(&mut r.flow));
        assert!(r.flow.is_game_running());
    }
}
