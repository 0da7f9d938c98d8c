#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the cane feedback link.
//!
//! - `Config` and its sections are deserialized from TOML; every section
//!   has defaults so an empty document is a valid configuration.
//! - `validate()` rejects values the protocol core cannot work with.
use serde::Deserialize;
use serde::de::Deserializer;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Serial {
    /// Port identifier, e.g. "COM3" or "/dev/ttyACM0".
    pub port: String,
    pub baud_rate: u32,
    /// Poll-loop cadence (ms).
    pub poll_interval_ms: u64,
    /// Per-read timeout (ms). Also accepts alias "timeout_ms".
    #[serde(alias = "timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            port: "COM3".to_string(),
            baud_rate: 115_200,
            poll_interval_ms: 10,
            read_timeout_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Dispatch {
    /// Minimum spacing between two identical non-forced commands (ms).
    pub min_interval_ms: u64,
}

impl Default for Dispatch {
    fn default() -> Self {
        Self {
            min_interval_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Acks {
    /// Bytes recognized as acknowledgments; anything else is noise.
    pub accepted: String,
    #[serde(deserialize_with = "de_ack_char")]
    pub calibrate_start: char,
    #[serde(deserialize_with = "de_ack_char")]
    pub calibrate_done: char,
    /// Acks that interrupt a follow-lock.
    pub resume: String,
    /// Legacy single resume character.
    #[serde(deserialize_with = "de_ack_char")]
    pub resume_signal: char,
}

impl Default for Acks {
    fn default() -> Self {
        Self {
            accepted: "123456".to_string(),
            calibrate_start: '6',
            calibrate_done: '5',
            resume: "1234".to_string(),
            resume_signal: '5',
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Calibration {
    pub timeout_ms: u64,
    pub cooldown_ms: u64,
    pub burst_count: u32,
    pub burst_interval_ms: u64,
    pub stop_before: bool,
    pub stop_after: bool,
    pub stop_settle_ms: u64,
    pub drain_attempts: u32,
    /// Close the collision send-gate while a handshake is in flight.
    pub pause_collision_send: bool,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            timeout_ms: 8_000,
            cooldown_ms: 1_000,
            burst_count: 5,
            burst_interval_ms: 50,
            stop_before: true,
            stop_after: true,
            stop_settle_ms: 80,
            drain_attempts: 8,
            pause_collision_send: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Classifier {
    pub front_angle_deg: f32,
    pub trigger_cooldown_ms: u64,
    pub force_send: bool,
    pub obstacle_tag: String,
    pub obstacle_down_tag: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            front_angle_deg: 30.0,
            trigger_cooldown_ms: 150,
            force_send: true,
            obstacle_tag: "Obstacle".to_string(),
            obstacle_down_tag: "ObstacleDown".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Follow {
    pub speed: f32,
    pub max_distance_m: f32,
    pub lock_ms: u64,
    /// Grip offset in hand-local space, meters.
    pub offset: [f32; 3],
    /// Grip rotation offset as Euler angles `[x, y, z]` in degrees, applied
    /// about Z, then X, then Y.
    pub rotation_offset_deg: [f32; 3],
}

impl Default for Follow {
    fn default() -> Self {
        Self {
            speed: 20.0,
            max_distance_m: 0.3,
            lock_ms: 5_000,
            offset: [0.0, -0.1, 0.5],
            rotation_offset_deg: [0.0; 3],
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Game {
    /// Length of one training round (ms).
    pub round_ms: u64,
}

impl Default for Game {
    fn default() -> Self {
        Self { round_ms: 60_000 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub serial: Serial,
    pub dispatch: Dispatch,
    pub acks: Acks,
    pub calibration: Calibration,
    pub classifier: Classifier,
    pub follow: Follow,
    pub logging: Logging,
    pub game: Game,
}

/// Accept either a one-character string or a small integer digit (`5` → '5').
fn de_ack_char<'de, D>(deserializer: D) -> Result<char, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CharToml {
        Str(String),
        Digit(u8),
    }

    match CharToml::deserialize(deserializer)? {
        CharToml::Str(s) => {
            let mut it = s.chars();
            match (it.next(), it.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(serde::de::Error::custom(format!(
                    "expected a single character, got {s:?}"
                ))),
            }
        }
        CharToml::Digit(d) if d <= 9 => Ok(char::from(b'0' + d)),
        CharToml::Digit(d) => Err(serde::de::Error::custom(format!(
            "ack digit must be 0..=9, got {d}"
        ))),
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.port.trim().is_empty() {
            eyre::bail!("serial.port must not be empty");
        }
        if self.serial.baud_rate == 0 {
            eyre::bail!("serial.baud_rate must be > 0");
        }
        if self.serial.poll_interval_ms == 0 {
            eyre::bail!("serial.poll_interval_ms must be >= 1");
        }
        if self.serial.read_timeout_ms == 0 {
            eyre::bail!("serial.read_timeout_ms must be >= 1");
        }
        if self.serial.read_timeout_ms > 10_000 {
            eyre::bail!("serial.read_timeout_ms is unreasonably large (>10s)");
        }

        // Acks
        if !self.acks.accepted.is_ascii() || !self.acks.resume.is_ascii() {
            eyre::bail!("acks must be ASCII characters");
        }
        for (name, c) in [
            ("calibrate_start", self.acks.calibrate_start),
            ("calibrate_done", self.acks.calibrate_done),
        ] {
            if !self.acks.accepted.contains(c) {
                eyre::bail!("acks.{name} '{c}' is not in acks.accepted");
            }
        }
        if self.acks.calibrate_start == self.acks.calibrate_done {
            eyre::bail!("acks.calibrate_start and acks.calibrate_done must differ");
        }
        if let Some(c) = self.acks.resume.chars().find(|c| !self.acks.accepted.contains(*c)) {
            eyre::bail!("acks.resume contains '{c}' which is not in acks.accepted");
        }

        // Calibration
        if self.calibration.timeout_ms == 0 {
            eyre::bail!("calibration.timeout_ms must be >= 1");
        }
        if self.calibration.burst_count == 0 {
            eyre::bail!("calibration.burst_count must be >= 1");
        }
        if self.calibration.burst_count > 50 {
            eyre::bail!("calibration.burst_count is unreasonably large (>50)");
        }
        if self.calibration.drain_attempts == 0 {
            eyre::bail!("calibration.drain_attempts must be >= 1");
        }

        // Classifier
        let a = self.classifier.front_angle_deg;
        if !a.is_finite() || !(0.0..=89.0).contains(&a) {
            eyre::bail!("classifier.front_angle_deg must be in [0, 89]");
        }
        if self.classifier.obstacle_tag == self.classifier.obstacle_down_tag {
            eyre::bail!("classifier.obstacle_tag and obstacle_down_tag must differ");
        }

        // Follow
        if !(self.follow.speed.is_finite() && self.follow.speed > 0.0) {
            eyre::bail!("follow.speed must be > 0");
        }
        if !(self.follow.max_distance_m.is_finite() && self.follow.max_distance_m > 0.0) {
            eyre::bail!("follow.max_distance_m must be > 0");
        }
        if self
            .follow
            .offset
            .iter()
            .chain(self.follow.rotation_offset_deg.iter())
            .any(|v| !v.is_finite())
        {
            eyre::bail!("follow offsets must be finite");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
