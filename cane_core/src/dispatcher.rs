//! Throttled command dispatch.
use std::sync::Arc;
use std::time::{Duration, Instant};

use cane_traits::Clock;
use tracing::debug;

use crate::config::DispatchCfg;
use crate::link::ByteSink;
use crate::protocol::Command;

/// Result of a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Same command inside `min_interval`, not forced.
    Throttled,
    LinkUnavailable,
}

impl SendOutcome {
    pub fn is_sent(self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

/// Last successful send; drives the throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    pub command: Command,
    pub at: Instant,
}

pub struct Dispatcher {
    sink: Arc<dyn ByteSink>,
    clock: Arc<dyn Clock + Send + Sync>,
    min_interval: Duration,
    last: Option<PendingCommand>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("min_interval", &self.min_interval)
            .field("last", &self.last)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        sink: Arc<dyn ByteSink>,
        clock: Arc<dyn Clock + Send + Sync>,
        cfg: &DispatchCfg,
    ) -> Self {
        Self {
            sink,
            clock,
            min_interval: cfg.min_interval,
            last: None,
        }
    }

    /// Write `cmd` unless the link is down or the throttle suppresses it.
    ///
    /// The throttle only applies to a repeat of the previous command; `force`
    /// skips it but still refreshes the throttle state.
    pub fn send(&mut self, cmd: Command, force: bool) -> SendOutcome {
        if !self.sink.is_ready() {
            debug!(%cmd, "send skipped: link not ready");
            return SendOutcome::LinkUnavailable;
        }
        let now = self.clock.now();
        if !force
            && let Some(last) = self.last
            && last.command == cmd
            && now.saturating_duration_since(last.at) < self.min_interval
        {
            debug!(%cmd, "send throttled");
            return SendOutcome::Throttled;
        }

        self.sink.write_byte(cmd.as_byte());
        self.last = Some(PendingCommand {
            command: cmd,
            at: now,
        });
        debug!(%cmd, force, "command sent");
        SendOutcome::Sent
    }

    pub fn last(&self) -> Option<PendingCommand> {
        self.last
    }

    pub fn is_ready(&self) -> bool {
        self.sink.is_ready()
    }

    // Router-style helpers; always forced.

    pub fn send_left(&mut self) -> SendOutcome {
        self.send(Command::Left, true)
    }

    pub fn send_right(&mut self) -> SendOutcome {
        self.send(Command::Right, true)
    }

    pub fn send_stop(&mut self) -> SendOutcome {
        self.send(Command::Stop, true)
    }

    pub fn send_calibrate(&mut self) -> SendOutcome {
        self.send(Command::Calibrate, true)
    }
}
