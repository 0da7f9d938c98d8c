//! Type-state builder for `CaneSession`.
//!
//! `build()` only exists once both the link and the config are set;
//! `try_build()` is always available for dynamic checks.
use std::marker::PhantomData;
use std::sync::Arc;

use cane_traits::{Clock, MonotonicClock};
use nalgebra::Isometry3;

use crate::ack::AckBuffer;
use crate::calibration::Calibration;
use crate::classifier::{DirectionalClassifier, ObstacleTags};
use crate::config::SessionCfg;
use crate::dispatcher::Dispatcher;
use crate::error::{BuildError, Result};
use crate::follow::FollowLock;
use crate::link::Link;
use crate::session::CaneSession;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct CaneSessionBuilder<L, C> {
    link: Option<Arc<Link>>,
    cfg: Option<SessionCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    cane_pose: Option<Isometry3<f32>>,
    _l: PhantomData<L>,
    _c: PhantomData<C>,
}

impl Default for CaneSessionBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            link: None,
            cfg: None,
            clock: None,
            cane_pose: None,
            _l: PhantomData,
            _c: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(cfg: &SessionCfg) -> Result<()> {
    if cfg.calibration.burst_count == 0 {
        return Err(invalid("calibration burst_count must be >= 1"));
    }
    if cfg.calibration.drain_attempts == 0 {
        return Err(invalid("calibration drain_attempts must be >= 1"));
    }
    if cfg.calibration.timeout.is_zero() {
        return Err(invalid("calibration timeout must be > 0"));
    }
    if cfg.acks.calibrate_start == cfg.acks.calibrate_done {
        return Err(invalid("calibrate start and done acks must differ"));
    }
    if !cfg.acks.accepted.contains(cfg.acks.calibrate_done) {
        return Err(invalid("calibrate done ack is not an accepted ack"));
    }
    let a = cfg.classifier.front_angle_deg;
    if !a.is_finite() || !(0.0..=89.0).contains(&a) {
        return Err(invalid("front_angle_deg must be in [0, 89]"));
    }
    if !(cfg.follow.speed.is_finite() && cfg.follow.speed > 0.0) {
        return Err(invalid("follow speed must be > 0"));
    }
    if !(cfg.follow.max_distance.is_finite() && cfg.follow.max_distance > 0.0) {
        return Err(invalid("follow max_distance must be > 0"));
    }
    Ok(())
}

impl<L, C> CaneSessionBuilder<L, C> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<CaneSession> {
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLink))?;
        let cfg = self
            .cfg
            .ok_or_else(|| eyre::Report::new(BuildError::MissingConfig))?;
        validate(&cfg)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };

        let acks = AckBuffer::new(&cfg.acks).with_receiver(link.subscribe());
        let dispatcher = Dispatcher::new(link.clone(), clock.clone(), &cfg.dispatch);
        let calibration = Calibration::new(cfg.calibration.clone(), &cfg.acks, clock.clone());
        let classifier = DirectionalClassifier::new(cfg.classifier.clone(), clock.clone());
        let mut follow = FollowLock::new(
            cfg.follow.clone(),
            cfg.acks.resume.clone(),
            ObstacleTags::from(&cfg.classifier),
        );
        if let Some(pose) = self.cane_pose {
            follow = follow.with_pose(pose);
        }

        Ok(CaneSession {
            link,
            clock,
            dispatcher,
            acks,
            calibration,
            classifier,
            follow,
        })
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Initial cane pose.
    pub fn with_cane_pose(mut self, pose: Isometry3<f32>) -> Self {
        self.cane_pose = Some(pose);
        self
    }
}

impl<C> CaneSessionBuilder<Missing, C> {
    pub fn with_link(self, link: Arc<Link>) -> CaneSessionBuilder<Set, C> {
        CaneSessionBuilder {
            link: Some(link),
            cfg: self.cfg,
            clock: self.clock,
            cane_pose: self.cane_pose,
            _l: PhantomData,
            _c: PhantomData,
        }
    }
}

impl<L> CaneSessionBuilder<L, Missing> {
    pub fn with_config(self, cfg: SessionCfg) -> CaneSessionBuilder<L, Set> {
        CaneSessionBuilder {
            link: self.link,
            cfg: Some(cfg),
            clock: self.clock,
            cane_pose: self.cane_pose,
            _l: PhantomData,
            _c: PhantomData,
        }
    }
}

impl CaneSessionBuilder<Set, Set> {
    pub fn build(self) -> Result<CaneSession> {
        self.try_build()
    }
}
