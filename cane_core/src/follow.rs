//! Cane follows the hand anchor; an obstacle contact freezes it until the
//! lock expires or the device reports it has finished moving.
use std::time::Duration;

use nalgebra::{Isometry3, Point3, Translation3};
use tracing::{debug, info};

use crate::ack::AckBuffer;
use crate::classifier::ObstacleTags;
use crate::config::FollowCfg;
use crate::context::TickContext;
use crate::protocol::AckSet;

/// Result of one fixed tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FollowOutcome {
    /// Game not running; nothing changed.
    Skipped,
    Locked { remaining: Duration },
    /// Unlocked but no anchor to follow.
    NoAnchor,
    Moved { pose: Isometry3<f32>, resumed: bool },
}

#[derive(Debug, Clone)]
pub struct FollowLock {
    cfg: FollowCfg,
    resume: AckSet,
    tags: ObstacleTags,
    locked: bool,
    remaining: Duration,
    pose: Isometry3<f32>,
}

impl FollowLock {
    pub fn new(cfg: FollowCfg, resume: AckSet, tags: ObstacleTags) -> Self {
        Self {
            cfg,
            resume,
            tags,
            locked: false,
            remaining: Duration::ZERO,
            pose: Isometry3::identity(),
        }
    }

    /// Place the cane, e.g. at spawn.
    pub fn with_pose(mut self, pose: Isometry3<f32>) -> Self {
        self.pose = pose;
        self
    }

    pub fn pose(&self) -> Isometry3<f32> {
        self.pose
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// `dt` is the fixed step in seconds.
    pub fn fixed_tick(&mut self, ctx: &TickContext, acks: &mut AckBuffer, dt: f32) -> FollowOutcome {
        if !ctx.game_running {
            return FollowOutcome::Skipped;
        }

        let mut resumed = false;
        if self.locked {
            if acks.consume_any(&self.resume) {
                self.locked = false;
                self.remaining = Duration::ZERO;
                resumed = true;
                info!(resume = %self.resume, "device ack received; following resumed");
            } else {
                let step = Duration::try_from_secs_f32(dt.max(0.0)).unwrap_or_default();
                self.remaining = self.remaining.saturating_sub(step);
                if self.remaining.is_zero() {
                    self.locked = false;
                    resumed = true;
                    debug!("follow lock expired");
                }
            }
            if self.locked {
                return FollowOutcome::Locked {
                    remaining: self.remaining,
                };
            }
        }

        let Some(anchor) = ctx.hand_anchor else {
            return FollowOutcome::NoAnchor;
        };
        self.step_toward(&anchor, dt);
        FollowOutcome::Moved {
            pose: self.pose,
            resumed,
        }
    }

    fn step_toward(&mut self, anchor: &Isometry3<f32>, dt: f32) {
        let current = Point3::from(self.pose.translation.vector);
        let mut target = anchor.transform_point(&Point3::from(self.cfg.offset));
        let target_rot = anchor.rotation * self.cfg.rotation_offset;

        let dir = target - current;
        let dist = dir.norm();
        if dist > self.cfg.max_distance {
            target = current + dir * (self.cfg.max_distance / dist);
        }

        let t = (self.cfg.speed * dt).clamp(0.0, 1.0);
        let pos = current.coords.lerp(&target.coords, t);
        // try_slerp fails only for opposite rotations; jump there.
        let rot = self
            .pose
            .rotation
            .try_slerp(&target_rot, t, 1.0e-6)
            .unwrap_or(target_rot);
        self.pose = Isometry3::from_parts(Translation3::from(pos), rot);
    }

    /// Obstacle contact: lock, restarting the timer even if already locked.
    /// Returns whether the contact locked the cane.
    pub fn on_contact(&mut self, ctx: &TickContext, tag: &str) -> bool {
        if !ctx.game_running || self.tags.kind(tag).is_none() {
            return false;
        }
        self.locked = true;
        self.remaining = self.cfg.lock_duration;
        info!(
            lock_ms = self.cfg.lock_duration.as_millis() as u64,
            "obstacle contact; following paused"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AckCfg, ClassifierCfg};
    use nalgebra::Vector3;

    const DT: f32 = 0.02;

    fn lock() -> FollowLock {
        FollowLock::new(
            FollowCfg::default(),
            AckSet::new("1234"),
            ObstacleTags::from(&ClassifierCfg::default()),
        )
    }

    fn ctx(anchor: Option<Isometry3<f32>>) -> TickContext {
        TickContext {
            game_running: true,
            hand_anchor: anchor,
            ..TickContext::default()
        }
    }

    #[test]
    fn resume_ack_unlocks_and_resets_timer() {
        let mut f = lock();
        let mut acks = AckBuffer::new(&AckCfg::default());
        let c = ctx(Some(Isometry3::identity()));
        assert!(f.on_contact(&c, "Obstacle"));
        assert!(matches!(f.fixed_tick(&c, &mut acks, DT), FollowOutcome::Locked { .. }));
        acks.on_byte(b'2');
        let out = f.fixed_tick(&c, &mut acks, DT);
        assert!(matches!(out, FollowOutcome::Moved { resumed: true, .. }));
        assert!(!f.is_locked());
        assert_eq!(f.remaining(), Duration::ZERO);
        assert_eq!(acks.peek(), None);
    }

    #[test]
    fn non_resume_ack_does_not_unlock() {
        let mut f = lock();
        let mut acks = AckBuffer::new(&AckCfg::default());
        let c = ctx(None);
        f.on_contact(&c, "ObstacleDown");
        acks.on_byte(b'6');
        f.fixed_tick(&c, &mut acks, DT);
        assert!(f.is_locked());
        assert_eq!(acks.peek(), Some('6'));
    }

    #[test]
    fn lock_expires_after_duration() {
        let mut f = lock();
        let mut acks = AckBuffer::new(&AckCfg::default());
        let c = ctx(None);
        f.on_contact(&c, "Obstacle");
        f.fixed_tick(&c, &mut acks, 4.9);
        assert!(f.is_locked());
        assert_eq!(f.fixed_tick(&c, &mut acks, 0.2), FollowOutcome::NoAnchor);
        assert!(!f.is_locked());
    }

    #[test]
    fn contact_restarts_timer() {
        let mut f = lock();
        let mut acks = AckBuffer::new(&AckCfg::default());
        let c = ctx(None);
        f.on_contact(&c, "Obstacle");
        f.fixed_tick(&c, &mut acks, 3.0);
        f.on_contact(&c, "Obstacle");
        assert_eq!(f.remaining(), Duration::from_secs(5));
    }

    #[test]
    fn contact_ignored_when_not_running_or_unknown_tag() {
        let mut f = lock();
        assert!(!f.on_contact(&TickContext::default(), "Obstacle"));
        assert!(!f.on_contact(&ctx(None), "Floor"));
        assert!(!f.is_locked());
    }

    #[test]
    fn step_is_clamped_to_max_distance() {
        let mut f = lock();
        let mut acks = AckBuffer::new(&AckCfg::default());
        let far = Isometry3::translation(10.0, 0.0, 0.0);
        // t = 20 * 0.05 = 1, so the cane lands on the clamped target.
        f.fixed_tick(&ctx(Some(far)), &mut acks, 0.05);
        let moved = f.pose().translation.vector.norm();
        assert!((moved - 0.3).abs() < 1e-4, "moved {moved}");
    }

    #[test]
    fn converges_on_grip_offset() {
        let mut f = lock();
        let mut acks = AckBuffer::new(&AckCfg::default());
        let anchor = Isometry3::translation(0.0, 1.0, 0.0);
        for _ in 0..50 {
            f.fixed_tick(&ctx(Some(anchor)), &mut acks, DT);
        }
        let want = Vector3::new(0.0, 0.9, 0.5);
        assert!((f.pose().translation.vector - want).norm() < 1e-3);
    }

    #[test]
    fn not_running_skips_everything() {
        let mut f = lock();
        let mut acks = AckBuffer::new(&AckCfg::default());
        let c = TickContext {
            hand_anchor: Some(Isometry3::translation(1.0, 0.0, 0.0)),
            ..TickContext::default()
        };
        assert_eq!(f.fixed_tick(&c, &mut acks, DT), FollowOutcome::Skipped);
        assert_eq!(f.pose(), Isometry3::identity());
    }
}
