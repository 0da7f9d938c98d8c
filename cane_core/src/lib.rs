#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Host side of the cane feedback protocol (hardware-agnostic).
//!
//! All device I/O goes through `cane_traits::Connector`/`Transport`; time
//! goes through `cane_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Link**: owns the transport and a poll thread that fans received
//!   bytes out to subscribers (`link` module)
//! - **Dispatcher**: writes single-byte commands with a repeat throttle
//! - **AckBuffer**: single-slot acknowledgment buffer, pumped on the logic thread
//! - **Calibration**: tick-driven handshake that gates the game
//! - **Classifier**: turns a collision into `L`/`R`/`D` (or nothing, ahead)
//! - **FollowLock**: cane-follows-hand with a contact lock
//! - **CaneSession**: wires the above together behind a type-state builder
//!
//! Protocol operations never fail loudly: they log and return an outcome
//! enum. Typed errors (`CaneError`, `BuildError`) exist only at the edges.

pub mod ack;
pub mod builder;
pub mod calibration;
pub mod classifier;
pub mod config;
pub mod context;
pub mod conversions;
pub mod dispatcher;
pub mod error;
pub mod follow;
pub mod game_flow;
pub mod hw_error;
pub mod link;
pub mod mocks;
pub mod protocol;
pub mod runner;
pub mod session;

pub use ack::AckBuffer;
pub use builder::{CaneSessionBuilder, Missing, Set};
pub use calibration::{Calibration, CalibrationState, RequestOutcome};
pub use classifier::{
    Classification, CollisionEvent, DirectionalClassifier, ObstacleKind, ObstacleTags, SkipReason,
};
pub use config::{
    AckCfg, CalibrationCfg, ClassifierCfg, DispatchCfg, FollowCfg, LinkCfg, SessionCfg,
};
pub use context::{FrameInput, TickContext};
pub use dispatcher::{Dispatcher, SendOutcome};
pub use error::{BuildError, CaneError};
pub use follow::{FollowLock, FollowOutcome};
pub use game_flow::{FlowPhase, GameFlowState};
pub use link::{ByteSink, Link, LinkState};
pub use protocol::{AckSet, Command};
pub use runner::{CalibrationReport, run_calibration};
pub use session::{CaneSession, TickReport};
