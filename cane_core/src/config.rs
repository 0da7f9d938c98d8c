//! Runtime configuration for the protocol core.
//!
//! These are the structs the components consume. They are separate from
//! the TOML-deserialized config in `cane_config`; see `conversions`.

use std::time::Duration;

use nalgebra::{UnitQuaternion, Vector3};

use crate::protocol::AckSet;

/// Serial link settings.
#[derive(Debug, Clone)]
pub struct LinkCfg {
    pub port: String,
    pub baud_rate: u32,
    /// Poll-loop cadence.
    pub poll_interval: Duration,
    /// Upper bound for a single read.
    pub read_timeout: Duration,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            port: "COM3".to_string(),
            baud_rate: 115_200,
            poll_interval: Duration::from_millis(10),
            read_timeout: Duration::from_millis(50),
        }
    }
}

/// Command throttle.
#[derive(Debug, Clone)]
pub struct DispatchCfg {
    /// Identical non-forced commands closer than this are dropped.
    pub min_interval: Duration,
}

impl Default for DispatchCfg {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(50),
        }
    }
}

/// Acknowledgment vocabulary.
#[derive(Debug, Clone)]
pub struct AckCfg {
    pub accepted: AckSet,
    pub calibrate_start: char,
    pub calibrate_done: char,
    pub resume: AckSet,
    /// Legacy single-character resume signal.
    pub resume_signal: char,
}

impl Default for AckCfg {
    fn default() -> Self {
        Self {
            accepted: AckSet::new("123456"),
            calibrate_start: '6',
            calibrate_done: '5',
            resume: AckSet::new("1234"),
            resume_signal: '5',
        }
    }
}

/// Calibration handshake timing.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Window for the done ack, measured from the end of the burst.
    pub timeout: Duration,
    /// Minimum spacing between two accepted requests.
    pub cooldown: Duration,
    pub burst_count: u32,
    pub burst_interval: Duration,
    pub stop_before: bool,
    pub stop_after: bool,
    /// Pause after the leading stop command.
    pub stop_settle: Duration,
    /// Upper bound on stale-ack consume attempts per character.
    pub drain_attempts: u32,
    pub pause_collision_send: bool,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            cooldown: Duration::from_secs(1),
            burst_count: 5,
            burst_interval: Duration::from_millis(50),
            stop_before: true,
            stop_after: true,
            stop_settle: Duration::from_millis(80),
            drain_attempts: 8,
            pause_collision_send: true,
        }
    }
}

/// Collision → command classification.
#[derive(Debug, Clone)]
pub struct ClassifierCfg {
    /// Half-width of the silent front sector, degrees.
    pub front_angle_deg: f32,
    pub trigger_cooldown: Duration,
    pub force_send: bool,
    pub obstacle_tag: String,
    pub obstacle_down_tag: String,
}

impl Default for ClassifierCfg {
    fn default() -> Self {
        Self {
            front_angle_deg: 30.0,
            trigger_cooldown: Duration::from_millis(150),
            force_send: true,
            obstacle_tag: "Obstacle".to_string(),
            obstacle_down_tag: "ObstacleDown".to_string(),
        }
    }
}

/// Hand-follow behaviour.
#[derive(Debug, Clone)]
pub struct FollowCfg {
    pub speed: f32,
    pub max_distance: f32,
    pub lock_duration: Duration,
    /// Grip offset in hand-local space.
    pub offset: Vector3<f32>,
    pub rotation_offset: UnitQuaternion<f32>,
}

impl Default for FollowCfg {
    fn default() -> Self {
        Self {
            speed: 20.0,
            max_distance: 0.3,
            lock_duration: Duration::from_secs(5),
            offset: Vector3::new(0.0, -0.1, 0.5),
            rotation_offset: UnitQuaternion::identity(),
        }
    }
}

/// Everything a `CaneSession` needs.
#[derive(Debug, Clone, Default)]
pub struct SessionCfg {
    pub link: LinkCfg,
    pub dispatch: DispatchCfg,
    pub acks: AckCfg,
    pub calibration: CalibrationCfg,
    pub classifier: ClassifierCfg,
    pub follow: FollowCfg,
}
