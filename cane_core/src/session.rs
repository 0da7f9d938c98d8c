//! `CaneSession`: one link plus every protocol component, driven from the
//! logic thread.
use std::sync::Arc;

use cane_traits::{Clock, GameFlow};

use crate::ack::AckBuffer;
use crate::builder::{CaneSessionBuilder, Missing};
use crate::calibration::{Calibration, CalibrationState, RequestOutcome};
use crate::classifier::{Classification, CollisionEvent, DirectionalClassifier};
use crate::context::{FrameInput, TickContext};
use crate::dispatcher::{Dispatcher, SendOutcome};
use crate::follow::{FollowLock, FollowOutcome};
use crate::link::Link;
use crate::protocol::Command;

/// What happened during one `tick`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Bytes drained from the link this tick.
    pub bytes: usize,
    pub calibration: CalibrationState,
    pub follow: FollowOutcome,
    pub context: TickContext,
}

pub struct CaneSession {
    pub(crate) link: Arc<Link>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) acks: AckBuffer,
    pub(crate) calibration: Calibration,
    pub(crate) classifier: DirectionalClassifier,
    pub(crate) follow: FollowLock,
}

impl std::fmt::Debug for CaneSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaneSession")
            .field("link", &self.link)
            .field("calibration", &self.calibration)
            .field("locked", &self.follow.is_locked())
            .finish()
    }
}

impl CaneSession {
    pub fn builder() -> CaneSessionBuilder<Missing, Missing> {
        CaneSessionBuilder::default()
    }

    /// Snapshot of the gates for this tick.
    pub fn context(&self, flow: &dyn GameFlow, frame: &FrameInput) -> TickContext {
        TickContext {
            game_running: flow.is_game_running(),
            allow_send: self.calibration.allow_send(),
            player_root: frame.player_root,
            hand_anchor: frame.hand_anchor,
        }
    }

    /// Pump acks, advance calibration, then run the follow step.
    pub fn tick(&mut self, flow: &mut dyn GameFlow, frame: &FrameInput) -> TickReport {
        let bytes = self.acks.pump();
        let calibration = self
            .calibration
            .tick(&mut self.dispatcher, &mut self.acks, flow);
        let context = self.context(flow, frame);
        let follow = self.follow.fixed_tick(&context, &mut self.acks, frame.dt);
        TickReport {
            bytes,
            calibration,
            follow,
            context,
        }
    }

    /// Route a trigger contact to the classifier and the follow lock.
    pub fn on_collision(
        &mut self,
        flow: &dyn GameFlow,
        frame: &FrameInput,
        event: &CollisionEvent,
    ) -> Classification {
        let ctx = self.context(flow, frame);
        let classification = self
            .classifier
            .on_collision(&ctx, event, &mut self.dispatcher);
        self.follow.on_contact(&ctx, &event.tag);
        classification
    }

    pub fn request_calibration(&mut self) -> RequestOutcome {
        self.calibration.request()
    }

    pub fn try_start_game(&self, flow: &mut dyn GameFlow) -> bool {
        self.calibration.try_start_game(flow)
    }

    pub fn send(&mut self, cmd: Command, force: bool) -> SendOutcome {
        self.dispatcher.send(cmd, force)
    }

    pub fn link(&self) -> &Arc<Link> {
        &self.link
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn follow(&self) -> &FollowLock {
        &self.follow
    }

    pub fn acks(&self) -> &AckBuffer {
        &self.acks
    }

    pub fn acks_mut(&mut self) -> &mut AckBuffer {
        &mut self.acks
    }
}
