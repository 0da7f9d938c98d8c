//! Seams between the cane protocol core and the outside world: time, the
//! byte transport to the feedback device, and the game-flow collaborator.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

#[cfg(any(test, feature = "test-clock"))]
pub use clock::test_clock::TestClock;

use std::time::Duration;

/// Raw byte transport to the feedback device.
///
/// Both methods take `&self`: the link's poll thread reads while the logic
/// thread writes, so implementations must be internally synchronized.
pub trait Transport: Send + Sync {
    /// Read at most one byte, waiting no longer than the transport's read
    /// timeout. `Ok(None)` means nothing was pending.
    fn read_byte(&self) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>>;

    fn write_all(&self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Opens transports by port identifier.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn Transport>, Box<dyn std::error::Error + Send + Sync>>;

    /// Port names this connector can open. Empty when enumeration is unsupported.
    fn available_ports(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Scene/flow collaborator observed and driven by the protocol core.
pub trait GameFlow {
    fn is_game_running(&self) -> bool;
    /// Invoked once per successful calibration.
    fn show_next_screen(&mut self);
    /// Invoked when the player asks to start and calibration allows it.
    fn start_game(&mut self);
}
