//! Human-readable error descriptions and structured JSON error formatting.

use cane_core::error::{BuildError, CaneError};

/// Exit code when the calibration window elapsed without a done ack.
pub const EXIT_CALIBRATION_TIMEOUT: i32 = 3;
/// Exit code when the serial port could not be opened or is closed.
pub const EXIT_LINK_UNAVAILABLE: i32 = 4;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLink => {
                "What happened: No serial link was provided to the session.\nLikely causes: The link was not wired into the builder.\nHow to fix: Pass the opened link via with_link(...).".to_string()
            }
            BuildError::MissingConfig => {
                "What happened: The session was built without configuration.\nLikely causes: The builder was not given a SessionCfg.\nHow to fix: Pass one via with_config(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/cane_config.toml for a sample."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CaneError>() {
        return match ce {
            CaneError::LinkUnavailable(detail) => format!(
                "What happened: The serial link is unavailable ({detail}).\nLikely causes: Device unplugged, wrong port name, or the port is held by another program.\nHow to fix: Run `cane ports`, set serial.port (or --port), or use --sim to try without hardware."
            ),
            CaneError::CalibrationTimeout(ms) => format!(
                "What happened: Calibration timed out after {ms} ms without a done acknowledgment.\nLikely causes: Device not powered, firmware not answering 'C', or baud rate mismatch.\nHow to fix: Check power and serial.baud_rate, then retry; raise calibration.timeout_ms if the device is slow."
            ),
            CaneError::CalibrationRejected(why) => format!(
                "What happened: Calibration request rejected ({why}).\nHow to fix: Wait for the running handshake or the cooldown, then retry."
            ),
            CaneError::ReadTimeout => {
                "What happened: Serial read timed out.\nLikely causes: Device idle or serial.read_timeout_ms too low.\nHow to fix: Usually harmless; raise serial.read_timeout_ms if it persists.".to_string()
            }
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") {
        let root = err.root_cause();
        return format!(
            "What happened: Configuration is invalid ({root}).\nLikely causes: A value out of range or a malformed TOML entry.\nHow to fix: Edit the config file and try again."
        );
    }

    if lower.contains("failed to read config") {
        let root = err.root_cause();
        return format!(
            "What happened: Could not read the config file ({root}).\nHow to fix: Check the --config path, or omit it to use defaults."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 calibration timeout, 4 link unavailable, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<CaneError>() {
        Some(CaneError::CalibrationTimeout(_)) => EXIT_CALIBRATION_TIMEOUT,
        Some(CaneError::LinkUnavailable(_)) => EXIT_LINK_UNAVAILABLE,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(ce) = err.downcast_ref::<CaneError>() {
        return match ce {
            CaneError::LinkUnavailable(_) => "LinkUnavailable",
            CaneError::ReadTimeout => "ReadTimeout",
            CaneError::Hardware(_) | CaneError::HardwareFault(_) => "Hardware",
            CaneError::CalibrationTimeout(_) => "CalibrationTimeout",
            CaneError::CalibrationRejected(_) => "CalibrationRejected",
            CaneError::Config(_) => "Config",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    match err.downcast_ref::<CaneError>() {
        Some(CaneError::CalibrationTimeout(ms)) => json!({
            "reason": reason_name(err),
            "details": { "timeout_ms": ms },
            "message": msg,
        })
        .to_string(),
        _ => json!({ "reason": reason_name(err), "message": msg }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn exit_codes_follow_error_kind() {
        let t = eyre::Report::new(CaneError::CalibrationTimeout(8000));
        assert_eq!(exit_code_for_error(&t), 3);
        let l = eyre::Report::new(CaneError::LinkUnavailable("COM3".into()));
        assert_eq!(exit_code_for_error(&l), 4);
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
    }

    #[test]
    fn context_does_not_hide_typed_errors() {
        let r: Result<(), CaneError> = Err(CaneError::LinkUnavailable("COM9".into()));
        let err = r.wrap_err("opening link").unwrap_err();
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).contains("COM9"));
    }

    #[test]
    fn json_error_has_reason_and_details() {
        let e = eyre::Report::new(CaneError::CalibrationTimeout(200));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "CalibrationTimeout");
        assert_eq!(v["details"]["timeout_ms"], 200);
    }
}
