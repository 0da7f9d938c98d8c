//! `From` implementations bridging `cane_config` types to `cane_core` types.

use std::time::Duration;

use nalgebra::{UnitQuaternion, Vector3};

use crate::config::{
    AckCfg, CalibrationCfg, ClassifierCfg, DispatchCfg, FollowCfg, LinkCfg, SessionCfg,
};
use crate::protocol::AckSet;

// ── LinkCfg ──────────────────────────────────────────────────────────────────

impl From<&cane_config::Serial> for LinkCfg {
    fn from(c: &cane_config::Serial) -> Self {
        Self {
            port: c.port.clone(),
            baud_rate: c.baud_rate,
            poll_interval: Duration::from_millis(c.poll_interval_ms),
            read_timeout: Duration::from_millis(c.read_timeout_ms),
        }
    }
}

// ── DispatchCfg ──────────────────────────────────────────────────────────────

impl From<&cane_config::Dispatch> for DispatchCfg {
    fn from(c: &cane_config::Dispatch) -> Self {
        Self {
            min_interval: Duration::from_millis(c.min_interval_ms),
        }
    }
}

// ── AckCfg ───────────────────────────────────────────────────────────────────

impl From<&cane_config::Acks> for AckCfg {
    fn from(c: &cane_config::Acks) -> Self {
        Self {
            accepted: AckSet::new(&c.accepted),
            calibrate_start: c.calibrate_start,
            calibrate_done: c.calibrate_done,
            resume: AckSet::new(&c.resume),
            resume_signal: c.resume_signal,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&cane_config::Calibration> for CalibrationCfg {
    fn from(c: &cane_config::Calibration) -> Self {
        Self {
            timeout: Duration::from_millis(c.timeout_ms),
            cooldown: Duration::from_millis(c.cooldown_ms),
            burst_count: c.burst_count,
            burst_interval: Duration::from_millis(c.burst_interval_ms),
            stop_before: c.stop_before,
            stop_after: c.stop_after,
            stop_settle: Duration::from_millis(c.stop_settle_ms),
            drain_attempts: c.drain_attempts,
            pause_collision_send: c.pause_collision_send,
        }
    }
}

// ── ClassifierCfg ────────────────────────────────────────────────────────────

impl From<&cane_config::Classifier> for ClassifierCfg {
    fn from(c: &cane_config::Classifier) -> Self {
        Self {
            front_angle_deg: c.front_angle_deg,
            trigger_cooldown: Duration::from_millis(c.trigger_cooldown_ms),
            force_send: c.force_send,
            obstacle_tag: c.obstacle_tag.clone(),
            obstacle_down_tag: c.obstacle_down_tag.clone(),
        }
    }
}

// ── FollowCfg ────────────────────────────────────────────────────────────────

impl From<&cane_config::Follow> for FollowCfg {
    fn from(c: &cane_config::Follow) -> Self {
        let [ox, oy, oz] = c.offset;
        let [rx, ry, rz] = c.rotation_offset_deg;
        Self {
            speed: c.speed,
            max_distance: c.max_distance_m,
            lock_duration: Duration::from_millis(c.lock_ms),
            offset: Vector3::new(ox, oy, oz),
            rotation_offset: euler_zxy_deg(rx, ry, rz),
        }
    }
}

/// Euler angles in degrees applied about Z, then X, then Y (`Ry * Rx * Rz`).
fn euler_zxy_deg(x: f32, y: f32, z: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), y.to_radians())
        * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), x.to_radians())
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), z.to_radians())
}

// ── SessionCfg ───────────────────────────────────────────────────────────────

impl From<&cane_config::Config> for SessionCfg {
    fn from(c: &cane_config::Config) -> Self {
        Self {
            link: (&c.serial).into(),
            dispatch: (&c.dispatch).into(),
            acks: (&c.acks).into(),
            calibration: (&c.calibration).into(),
            classifier: (&c.classifier).into(),
            follow: (&c.follow).into(),
        }
    }
}
