//! In-process scene flow: waiting → opening → running → finished.
use std::sync::Arc;
use std::time::{Duration, Instant};

use cane_traits::{Clock, GameFlow};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    /// Waiting for calibration.
    Waiting,
    /// Calibration done, opening screen shown.
    Opening,
    Running { ends_at: Instant },
    Finished,
}

/// Minimal `GameFlow` used by the CLI and tests.
pub struct GameFlowState {
    clock: Arc<dyn Clock + Send + Sync>,
    round: Duration,
    phase: FlowPhase,
    next_screens: u32,
}

impl std::fmt::Debug for GameFlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameFlowState")
            .field("round", &self.round)
            .field("phase", &self.phase)
            .field("next_screens", &self.next_screens)
            .finish()
    }
}

impl GameFlowState {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>, round: Duration) -> Self {
        Self {
            clock,
            round,
            phase: FlowPhase::Waiting,
            next_screens: 0,
        }
    }

    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    /// How many times the opening screen was requested.
    pub fn next_screen_count(&self) -> u32 {
        self.next_screens
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self.phase {
            FlowPhase::Running { ends_at } => {
                Some(ends_at.saturating_duration_since(self.clock.now()))
            }
            _ => None,
        }
    }

    /// End the round once its time is up. Returns true on that transition.
    pub fn update(&mut self) -> bool {
        if let FlowPhase::Running { ends_at } = self.phase
            && self.clock.now() >= ends_at
        {
            self.phase = FlowPhase::Finished;
            info!("round over");
            return true;
        }
        false
    }
}

impl GameFlow for GameFlowState {
    fn is_game_running(&self) -> bool {
        matches!(self.phase, FlowPhase::Running { ends_at } if self.clock.now() < ends_at)
    }

    fn show_next_screen(&mut self) {
        self.next_screens += 1;
        if self.phase == FlowPhase::Waiting {
            self.phase = FlowPhase::Opening;
        }
        info!("opening screen shown");
    }

    fn start_game(&mut self) {
        if matches!(self.phase, FlowPhase::Running { .. } | FlowPhase::Finished) {
            return;
        }
        let ends_at = self.clock.now() + self.round;
        self.phase = FlowPhase::Running { ends_at };
        info!(round_ms = self.round.as_millis() as u64, "round started");
    }
}
