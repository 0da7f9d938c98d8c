//! Collision → directional command.
//!
//! The hit point is expressed in the player-root frame and projected onto
//! the ground plane. Forward is +Z, up is +Y, and a positive angle means the
//! obstacle is on the right (+X).
use std::sync::Arc;
use std::time::Instant;

use cane_traits::Clock;
use nalgebra::Point3;
use tracing::{debug, warn};

use crate::config::ClassifierCfg;
use crate::context::TickContext;
use crate::dispatcher::{Dispatcher, SendOutcome};
use crate::protocol::Command;

// Squared XZ length below which the direction is meaningless.
const MIN_PLANAR_SQ: f32 = 1e-4;
// Tolerance so a hit exactly on the front boundary stays silent.
const FRONT_EPS_DEG: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    Obstacle,
    Below,
}

/// Tag names that count as obstacles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObstacleTags {
    pub obstacle: String,
    pub below: String,
}

impl ObstacleTags {
    pub fn kind(&self, tag: &str) -> Option<ObstacleKind> {
        if tag == self.below {
            Some(ObstacleKind::Below)
        } else if tag == self.obstacle {
            Some(ObstacleKind::Obstacle)
        } else {
            None
        }
    }
}

impl From<&ClassifierCfg> for ObstacleTags {
    fn from(c: &ClassifierCfg) -> Self {
        Self {
            obstacle: c.obstacle_tag.clone(),
            below: c.obstacle_down_tag.clone(),
        }
    }
}

/// A trigger contact reported by the physics side.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    pub tag: String,
    /// Closest point on the collider, world space.
    pub hit_point: Point3<f32>,
}

impl CollisionEvent {
    pub fn new(tag: impl Into<String>, hit_point: Point3<f32>) -> Self {
        Self {
            tag: tag.into(),
            hit_point,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    GameNotRunning,
    SendPaused,
    UnknownTag,
    CoolingDown,
    MissingPlayerRoot,
    /// Hit point too close to the player's vertical axis.
    Degenerate,
}

/// What the classifier decided for one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    Skipped(SkipReason),
    /// Inside the front sector; nothing is sent.
    Front { angle_deg: f32 },
    Sent {
        command: Command,
        outcome: SendOutcome,
        angle_deg: Option<f32>,
    },
}

/// Signed angle in degrees from +Z to the XZ projection of `local`, positive
/// toward +X. `None` when the projection is degenerate.
pub fn planar_angle_deg(local: &Point3<f32>) -> Option<f32> {
    let (x, z) = (local.x, local.z);
    if x * x + z * z < MIN_PLANAR_SQ {
        return None;
    }
    Some(x.atan2(z).to_degrees())
}

pub struct DirectionalClassifier {
    cfg: ClassifierCfg,
    tags: ObstacleTags,
    clock: Arc<dyn Clock + Send + Sync>,
    last_trigger: Option<Instant>,
}

impl std::fmt::Debug for DirectionalClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectionalClassifier")
            .field("cfg", &self.cfg)
            .field("last_trigger", &self.last_trigger)
            .finish()
    }
}

impl DirectionalClassifier {
    pub fn new(cfg: ClassifierCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            tags: ObstacleTags::from(&cfg),
            cfg,
            clock,
            last_trigger: None,
        }
    }

    pub fn tags(&self) -> &ObstacleTags {
        &self.tags
    }

    pub fn on_collision(
        &mut self,
        ctx: &TickContext,
        event: &CollisionEvent,
        dispatcher: &mut Dispatcher,
    ) -> Classification {
        if !ctx.game_running {
            return Classification::Skipped(SkipReason::GameNotRunning);
        }
        if !ctx.allow_send {
            return Classification::Skipped(SkipReason::SendPaused);
        }
        let Some(kind) = self.tags.kind(&event.tag) else {
            return Classification::Skipped(SkipReason::UnknownTag);
        };

        let now = self.clock.now();
        if let Some(last) = self.last_trigger
            && now.saturating_duration_since(last) < self.cfg.trigger_cooldown
        {
            return Classification::Skipped(SkipReason::CoolingDown);
        }
        // Recorded before direction analysis, so a skipped front hit still
        // debounces the next event.
        self.last_trigger = Some(now);

        if kind == ObstacleKind::Below {
            let outcome = dispatcher.send(Command::Down, self.cfg.force_send);
            debug!(tag = %event.tag, ?outcome, "obstacle below");
            return Classification::Sent {
                command: Command::Down,
                outcome,
                angle_deg: None,
            };
        }

        let Some(root) = ctx.player_root else {
            warn!("player root not set; collision skipped");
            return Classification::Skipped(SkipReason::MissingPlayerRoot);
        };
        let local = root.inverse_transform_point(&event.hit_point);
        let Some(angle) = planar_angle_deg(&local) else {
            return Classification::Skipped(SkipReason::Degenerate);
        };

        if local.z > 0.0 && angle.abs() <= self.cfg.front_angle_deg + FRONT_EPS_DEG {
            debug!(angle, tag = %event.tag, "obstacle ahead; keeping last direction");
            return Classification::Front { angle_deg: angle };
        }

        let command = if angle > 0.0 {
            Command::Right
        } else {
            Command::Left
        };
        let outcome = dispatcher.send(command, self.cfg.force_send);
        debug!(angle, %command, ?outcome, tag = %event.tag, "obstacle to the side");
        Classification::Sent {
            command,
            outcome,
            angle_deg: Some(angle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchCfg;
    use crate::mocks::RecordingSink;
    use cane_traits::TestClock;
    use nalgebra::{Isometry3, Vector3};
    use rstest::rstest;
    use std::f32::consts::FRAC_PI_2;

    fn running() -> TickContext {
        TickContext {
            game_running: true,
            allow_send: true,
            player_root: Some(Isometry3::identity()),
            hand_anchor: None,
        }
    }

    fn at_angle(deg: f32) -> Point3<f32> {
        let r = deg.to_radians();
        Point3::new(r.sin(), 1.0, r.cos())
    }

    fn setup() -> (DirectionalClassifier, Dispatcher, Arc<RecordingSink>, TestClock) {
        let clock = TestClock::new();
        let shared: Arc<dyn Clock + Send + Sync> = Arc::new(clock.clone());
        let sink = Arc::new(RecordingSink::new());
        let disp = Dispatcher::new(sink.clone(), shared.clone(), &DispatchCfg::default());
        (
            DirectionalClassifier::new(ClassifierCfg::default(), shared),
            disp,
            sink,
            clock,
        )
    }

    #[rstest]
    #[case(0.0, None)]
    #[case(30.0, None)]
    #[case(-30.0, None)]
    #[case(31.0, Some(Command::Right))]
    #[case(-31.0, Some(Command::Left))]
    #[case(90.0, Some(Command::Right))]
    #[case(150.0, Some(Command::Right))]
    #[case(-150.0, Some(Command::Left))]
    fn classifies_by_angle(#[case] deg: f32, #[case] want: Option<Command>) {
        let (mut c, mut d, sink, _clock) = setup();
        let r = c.on_collision(&running(), &CollisionEvent::new("Obstacle", at_angle(deg)), &mut d);
        match want {
            None => assert!(matches!(r, Classification::Front { .. }), "{r:?}"),
            Some(cmd) => {
                assert!(matches!(r, Classification::Sent { command, .. } if command == cmd));
                assert_eq!(sink.bytes(), vec![cmd.as_byte()]);
            }
        }
    }

    #[test]
    fn obstacle_below_sends_down_without_root() {
        let (mut c, mut d, sink, _clock) = setup();
        let ctx = TickContext {
            player_root: None,
            ..running()
        };
        c.on_collision(&ctx, &CollisionEvent::new("ObstacleDown", Point3::origin()), &mut d);
        assert_eq!(sink.bytes(), b"D");
    }

    #[test]
    fn hits_are_debounced() {
        let (mut c, mut d, sink, clock) = setup();
        let ev = CollisionEvent::new("Obstacle", at_angle(90.0));
        c.on_collision(&running(), &ev, &mut d);
        clock.advance_ms(100);
        assert_eq!(
            c.on_collision(&running(), &ev, &mut d),
            Classification::Skipped(SkipReason::CoolingDown)
        );
        clock.advance_ms(50);
        c.on_collision(&running(), &ev, &mut d);
        assert_eq!(sink.bytes(), b"RR");
    }

    #[test]
    fn front_hit_still_starts_cooldown() {
        let (mut c, mut d, sink, clock) = setup();
        c.on_collision(&running(), &CollisionEvent::new("Obstacle", at_angle(0.0)), &mut d);
        clock.advance_ms(10);
        c.on_collision(&running(), &CollisionEvent::new("Obstacle", at_angle(90.0)), &mut d);
        assert!(sink.bytes().is_empty());
    }

    #[rstest]
    #[case(false, true, "Obstacle", SkipReason::GameNotRunning)]
    #[case(true, false, "Obstacle", SkipReason::SendPaused)]
    #[case(true, true, "Wall", SkipReason::UnknownTag)]
    fn gates(
        #[case] game_running: bool,
        #[case] allow_send: bool,
        #[case] tag: &str,
        #[case] reason: SkipReason,
    ) {
        let (mut c, mut d, sink, _clock) = setup();
        let ctx = TickContext {
            game_running,
            allow_send,
            ..running()
        };
        let r = c.on_collision(&ctx, &CollisionEvent::new(tag, at_angle(90.0)), &mut d);
        assert_eq!(r, Classification::Skipped(reason));
        assert!(sink.bytes().is_empty());
    }

    #[test]
    fn missing_root_skips_side_hits() {
        let (mut c, mut d, _sink, _clock) = setup();
        let ctx = TickContext {
            player_root: None,
            ..running()
        };
        let r = c.on_collision(&ctx, &CollisionEvent::new("Obstacle", at_angle(90.0)), &mut d);
        assert_eq!(r, Classification::Skipped(SkipReason::MissingPlayerRoot));
    }

    #[test]
    fn degenerate_point_is_skipped() {
        let (mut c, mut d, _sink, _clock) = setup();
        let r = c.on_collision(
            &running(),
            &CollisionEvent::new("Obstacle", Point3::new(0.001, 2.0, 0.001)),
            &mut d,
        );
        assert_eq!(r, Classification::Skipped(SkipReason::Degenerate));
    }

    proptest::proptest! {
        #[test]
        fn side_follows_sign_of_x(x in -10.0f32..10.0, z in -10.0f32..10.0) {
            proptest::prop_assume!(x.abs() > 0.01);
            let angle = planar_angle_deg(&Point3::new(x, 0.0, z)).unwrap();
            proptest::prop_assert_eq!(angle > 0.0, x > 0.0);
            proptest::prop_assert!(angle.abs() <= 180.0);
        }
    }

    #[test]
    fn uses_player_frame() {
        let (mut c, mut d, sink, _clock) = setup();
        // Player turned to face +X; a point straight along world +X is ahead.
        let root = Isometry3::new(Vector3::new(5.0, 0.0, 0.0), Vector3::y() * FRAC_PI_2);
        let ctx = TickContext {
            player_root: Some(root),
            ..running()
        };
        let r = c.on_collision(&ctx, &CollisionEvent::new("Obstacle", Point3::new(7.0, 0.0, 0.0)), &mut d);
        assert!(matches!(r, Classification::Front { .. }), "{r:?}");
        assert!(sink.bytes().is_empty());
    }
}
