//! Subcommand implementations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cane_core::error::{CaneError, Result};
use cane_core::{
    AckSet, CaneSession, Classification, CollisionEvent, Command, FollowOutcome, FrameInput,
    GameFlowState, Link, ObstacleKind, SendOutcome, SessionCfg, run_calibration,
};
use cane_traits::GameFlow;
use nalgebra::{Isometry3, Point3};
use serde_json::json;
use tracing::info;

use crate::device;

/// Everything a subcommand needs.
pub struct App {
    pub cfg: cane_config::Config,
    pub session_cfg: SessionCfg,
    pub sim: bool,
    pub json: bool,
    pub shutdown: Arc<AtomicBool>,
}

impl App {
    /// One result line: JSON object or plain text.
    fn emit(&self, value: serde_json::Value, text: impl std::fmt::Display) {
        if self.json {
            println!("{value}");
        } else {
            println!("{text}");
        }
    }

    fn stopped(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    fn open_link(&self) -> Result<Arc<Link>> {
        let mut link_cfg = self.session_cfg.link.clone();
        let connector = device::connector(self.sim, &mut link_cfg);
        let link = Arc::new(Link::new(connector, link_cfg));
        link.open_default()?;
        Ok(link)
    }

    fn session(&self, link: Arc<Link>) -> Result<CaneSession> {
        CaneSession::builder()
            .with_link(link)
            .with_config(self.session_cfg.clone())
            .build()
    }

    fn flow(&self, session: &CaneSession) -> GameFlowState {
        GameFlowState::new(
            session.clock().clone(),
            Duration::from_millis(self.cfg.game.round_ms),
        )
    }
}

pub fn ports(app: &App) -> Result<()> {
    let mut link_cfg = app.session_cfg.link.clone();
    let ports = device::connector(app.sim, &mut link_cfg).available_ports();
    if app.json {
        println!("{}", json!({ "ports": ports }));
    } else if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        for p in &ports {
            println!("{p}");
        }
    }
    Ok(())
}

pub fn send(app: &App, cmd: Command, force: bool) -> Result<()> {
    let link = app.open_link()?;
    let mut session = app.session(link)?;
    match session.send(cmd, force) {
        SendOutcome::Sent => {
            app.emit(
                json!({ "sent": cmd.to_string(), "force": force }),
                format!("Sent '{cmd}'"),
            );
            Ok(())
        }
        SendOutcome::Throttled => {
            app.emit(
                json!({ "throttled": cmd.to_string() }),
                format!("'{cmd}' throttled; use --force to bypass"),
            );
            Ok(())
        }
        SendOutcome::LinkUnavailable => Err(eyre::Report::new(CaneError::LinkUnavailable(
            "link closed before send".into(),
        ))),
    }
}

pub fn monitor(app: &App, ms: u64) -> Result<()> {
    let link = app.open_link()?;
    let rx = link.subscribe();
    let accepted = AckSet::new(&app.cfg.acks.accepted);
    let deadline = Instant::now() + Duration::from_millis(ms);
    let mut count = 0usize;

    info!(ms, "monitoring");
    while !app.stopped() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let wait = (deadline - now).min(Duration::from_millis(50));
        let Ok(b) = rx.recv_timeout(wait) else {
            continue;
        };
        count += 1;
        let c = char::from(b);
        let ack = accepted.contains(c);
        app.emit(
            json!({ "byte": b, "char": c.to_string(), "ack": ack }),
            format!(
                "0x{b:02x} {:?}{}",
                c,
                if ack { "  ack" } else { "" }
            ),
        );
    }
    link.close();
    if !app.json {
        println!("{count} byte(s) received");
    }
    Ok(())
}

pub fn calibrate(app: &App, tick_ms: u64) -> Result<()> {
    let link = app.open_link()?;
    let mut session = app.session(link)?;
    let mut flow = app.flow(&session);
    let report = run_calibration(&mut session, &mut flow, Duration::from_millis(tick_ms.max(1)))?;
    let elapsed_ms = report.elapsed.as_millis() as u64;
    app.emit(
        json!({
            "status": "calibrated",
            "elapsed_ms": elapsed_ms,
            "got_start": report.got_start,
            "ticks": report.ticks,
        }),
        format!("Calibration complete in {elapsed_ms} ms"),
    );
    Ok(())
}

// Obstacles replayed by `demo`: kind and bearing in degrees (+ is right).
const DEMO_HITS: [(ObstacleKind, f32); 5] = [
    (ObstacleKind::Obstacle, -60.0),
    (ObstacleKind::Obstacle, 10.0),
    (ObstacleKind::Obstacle, 45.0),
    (ObstacleKind::Below, 0.0),
    (ObstacleKind::Obstacle, 135.0),
];

pub fn demo(app: &App) -> Result<()> {
    const STEP: Duration = Duration::from_millis(20);
    const SETTLE: Duration = Duration::from_millis(400);

    let link = app.open_link()?;
    let mut session = app.session(link)?;
    let mut flow = app.flow(&session);

    run_calibration(&mut session, &mut flow, Duration::from_millis(10))?;
    if !session.try_start_game(&mut flow) {
        eyre::bail!("game did not start after calibration");
    }

    let frame = FrameInput {
        player_root: Some(Isometry3::identity()),
        hand_anchor: Some(Isometry3::translation(0.2, 1.0, 0.0)),
        dt: STEP.as_secs_f32(),
    };

    let classifier = &app.cfg.classifier;
    for (obstacle, bearing) in DEMO_HITS {
        if app.stopped() || !flow.is_game_running() {
            break;
        }
        let tag = match obstacle {
            ObstacleKind::Obstacle => classifier.obstacle_tag.as_str(),
            ObstacleKind::Below => classifier.obstacle_down_tag.as_str(),
        };
        let r = bearing.to_radians();
        let hit = Point3::new(r.sin(), 0.5, r.cos());
        let decision = session.on_collision(&flow, &frame, &CollisionEvent::new(tag, hit));
        let (kind, command) = match decision {
            Classification::Sent { command, .. } => ("sent", Some(command.to_string())),
            Classification::Front { .. } => ("front", None),
            Classification::Skipped(_) => ("skipped", None),
        };
        app.emit(
            json!({ "tag": tag, "bearing_deg": bearing, "decision": kind, "command": command }),
            format!(
                "{tag:<12} {bearing:>6.1}°  {kind}{}",
                command.as_deref().map(|c| format!(" '{c}'")).unwrap_or_default()
            ),
        );

        // Let the lock play out; the device's resume ack ends it early.
        let until = Instant::now() + SETTLE;
        let mut resumed = false;
        while Instant::now() < until && !app.stopped() {
            let report = session.tick(&mut flow, &frame);
            if let FollowOutcome::Moved { resumed: true, .. } = report.follow {
                resumed = true;
            }
            std::thread::sleep(STEP);
        }
        if resumed && !app.json {
            println!("             follow resumed");
        }
    }

    flow.update();
    session.send(Command::Stop, true);
    info!("demo finished");
    Ok(())
}

pub fn self_check(app: &App) -> Result<()> {
    let link = app.open_link()?;
    let state = link.state();
    link.close();
    app.emit(
        json!({
            "status": "ok",
            "port": state.port,
            "baud_rate": state.baud_rate,
            "sim": app.sim,
        }),
        "OK",
    );
    Ok(())
}
