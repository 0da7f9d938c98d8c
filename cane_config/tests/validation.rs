use cane_config::load_toml;
use rstest::rstest;

#[test]
fn empty_document_uses_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults must validate");
    assert_eq!(cfg.serial.baud_rate, 115_200);
    assert_eq!(cfg.serial.poll_interval_ms, 10);
    assert_eq!(cfg.acks.accepted, "123456");
    assert_eq!(cfg.acks.calibrate_done, '5');
    assert_eq!(cfg.calibration.burst_count, 5);
    assert_eq!(cfg.classifier.front_angle_deg, 30.0);
    assert_eq!(cfg.follow.offset, [0.0, -0.1, 0.5]);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let toml = r#"
[serial]
port = "/dev/ttyACM0"
timeout_ms = 20

[calibration]
timeout_ms = 3000
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.serial.port, "/dev/ttyACM0");
    assert_eq!(cfg.serial.read_timeout_ms, 20);
    assert_eq!(cfg.serial.baud_rate, 115_200);
    assert_eq!(cfg.calibration.timeout_ms, 3000);
    assert_eq!(cfg.calibration.cooldown_ms, 1000);
}

#[test]
fn ack_chars_accept_digits_and_strings() {
    let toml = r#"
[acks]
calibrate_start = 6
calibrate_done = "5"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    assert_eq!(cfg.acks.calibrate_start, '6');
    assert_eq!(cfg.acks.calibrate_done, '5');
}

#[test]
fn multi_char_ack_is_a_parse_error() {
    let toml = r#"
[acks]
calibrate_done = "55"
"#;
    let err = load_toml(toml).expect_err("must reject");
    assert!(err.to_string().contains("single character"));
}

#[rstest]
#[case("[serial]\nbaud_rate = 0", "serial.baud_rate must be > 0")]
#[case("[serial]\npoll_interval_ms = 0", "serial.poll_interval_ms must be >= 1")]
#[case("[calibration]\nburst_count = 0", "calibration.burst_count must be >= 1")]
#[case("[classifier]\nfront_angle_deg = 95.0", "front_angle_deg must be in [0, 89]")]
#[case("[acks]\naccepted = \"1234\"", "calibrate_start '6' is not in acks.accepted")]
#[case("[acks]\nresume = \"19\"", "acks.resume contains '9'")]
#[case("[follow]\nspeed = 0.0", "follow.speed must be > 0")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
fn rejects_invalid_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "expected '{needle}' in '{err}'"
    );
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cane.toml");
    std::fs::write(&path, "[dispatch]\nmin_interval_ms = 75\n").unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let cfg = load_toml(&text).unwrap();
    assert_eq!(cfg.dispatch.min_interval_ms, 75);
}
