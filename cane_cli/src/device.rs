//! Connector selection: real serial port or the simulated device.

use cane_core::LinkCfg;
use cane_hardware::{SimBehavior, SimulatedConnector, SimulatedDevice};
use cane_traits::Connector;

/// Makes the simulated device ignore `C`, to exercise the timeout path.
pub const SIM_SILENT_ENV: &str = "CANE_SIM_SILENT";

pub fn sim_behavior() -> SimBehavior {
    let silent = std::env::var(SIM_SILENT_ENV).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    SimBehavior {
        answer_calibration: !silent,
        ..SimBehavior::default()
    }
}

/// Returns the connector and adjusts `link` for it.
pub fn connector(sim: bool, link: &mut LinkCfg) -> Box<dyn Connector> {
    #[cfg(feature = "hardware")]
    if !sim {
        return Box::new(cane_hardware::SerialConnector);
    }
    #[cfg(not(feature = "hardware"))]
    if !sim {
        tracing::info!("built without the `hardware` feature; using the simulated device");
    }

    link.port = "sim0".to_string();
    let device = SimulatedDevice::with_clock(sim_behavior(), cane_traits::MonotonicClock::new());
    Box::new(SimulatedConnector::new(device))
}
