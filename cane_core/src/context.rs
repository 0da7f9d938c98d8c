//! Per-tick snapshot of the gates the controllers read.
use nalgebra::Isometry3;

/// Immutable view of the world for one tick. Built fresh each tick by the
/// session, so controllers never read flags another component is mutating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub game_running: bool,
    /// Collision send-gate; closed while a calibration is in flight.
    pub allow_send: bool,
    /// Player body pose; frame for left/right classification.
    pub player_root: Option<Isometry3<f32>>,
    /// Pose the cane follows.
    pub hand_anchor: Option<Isometry3<f32>>,
}

impl Default for TickContext {
    fn default() -> Self {
        Self {
            game_running: false,
            allow_send: true,
            player_root: None,
            hand_anchor: None,
        }
    }
}

/// Poses supplied by the host each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    pub player_root: Option<Isometry3<f32>>,
    pub hand_anchor: Option<Isometry3<f32>>,
    /// Fixed-step length for follow interpolation, seconds.
    pub dt: f32,
}
