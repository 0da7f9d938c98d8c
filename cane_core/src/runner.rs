//! Blocking drivers for callers without a frame loop (CLI, tests).
use std::time::Duration;

use cane_traits::GameFlow;
use tracing::info;

use crate::calibration::{CalibrationState, RequestOutcome};
use crate::context::FrameInput;
use crate::error::{CaneError, Result};
use crate::session::CaneSession;

/// Summary of a finished calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationReport {
    pub elapsed: Duration,
    pub ticks: u32,
    /// Whether the device acknowledged the start.
    pub got_start: bool,
}

/// Request a calibration and tick the session every `tick` until it
/// completes or times out.
pub fn run_calibration(
    session: &mut CaneSession,
    flow: &mut dyn GameFlow,
    tick: Duration,
) -> Result<CalibrationReport> {
    if !session.link().is_open() {
        return Err(eyre::Report::new(CaneError::LinkUnavailable(
            "link is not open".into(),
        )));
    }
    match session.request_calibration() {
        RequestOutcome::Started => {}
        RequestOutcome::Busy => {
            return Err(eyre::Report::new(CaneError::CalibrationRejected(
                "already calibrating",
            )));
        }
        RequestOutcome::CoolingDown => {
            return Err(eyre::Report::new(CaneError::CalibrationRejected(
                "cooling down",
            )));
        }
    }

    let clock = session.clock().clone();
    let start = clock.now();
    let frame = FrameInput {
        dt: tick.as_secs_f32(),
        ..FrameInput::default()
    };
    let mut ticks = 0u32;
    loop {
        ticks = ticks.saturating_add(1);
        let report = session.tick(flow, &frame);
        match report.calibration {
            CalibrationState::Calibrated => {
                let elapsed = clock.since(start);
                info!(elapsed_ms = elapsed.as_millis() as u64, ticks, "calibrated");
                return Ok(CalibrationReport {
                    elapsed,
                    ticks,
                    got_start: session.calibration().got_start(),
                });
            }
            CalibrationState::TimedOut | CalibrationState::Idle => {
                let ms = session.calibration().cfg().timeout.as_millis() as u64;
                return Err(eyre::Report::new(CaneError::CalibrationTimeout(ms)));
            }
            CalibrationState::Calibrating => clock.sleep(tick),
        }
    }
}
