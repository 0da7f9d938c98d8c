//! Device-side transports for the cane feedback link.
//!
//! - `SerialConnector` opens real ports through `serial2` (feature `hardware`).
//! - `SimulatedConnector` hands out an in-process `SimulatedDevice` that
//!   behaves like the cane firmware.
pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod sim;

pub use error::HwError;
#[cfg(feature = "hardware")]
pub use serial::{SerialConnector, SerialTransport};
pub use sim::{SimBehavior, SimulatedConnector, SimulatedDevice};
