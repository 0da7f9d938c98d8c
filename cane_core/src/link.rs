//! Serial link to the feedback device.
//!
//! The link owns the transport and a single poll thread. The thread is the
//! only reader: it pulls one byte per iteration and fans it out to every
//! subscriber over a `crossbeam-channel`. Protocol state never lives here;
//! consumers drain their receiver on the logic thread.
//!
//! Every operation takes `&self` so a link can be shared as `Arc<Link>`
//! between the logic thread and whoever opens or closes it.
use crossbeam_channel as xch;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use cane_traits::{Clock, Connector, MonotonicClock, Transport};
use tracing::{debug, error, info, trace, warn};

use crate::config::LinkCfg;
use crate::error::{CaneError, Result};
use crate::hw_error::map_hw_error;

/// Write side of a link, as seen by the dispatcher.
pub trait ByteSink: Send + Sync {
    fn is_ready(&self) -> bool;
    /// Best effort; failures are logged by the implementation.
    fn write_byte(&self, b: u8);
}

/// Snapshot of the connection parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkState {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub is_open: bool,
}

#[derive(Default)]
struct Shared {
    transport: Mutex<Option<Arc<dyn Transport>>>,
    subscribers: Mutex<Vec<xch::Sender<u8>>>,
    open: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Shared {
    fn transport(&self) -> Option<Arc<dyn Transport>> {
        if !self.open.load(Ordering::Acquire) {
            return None;
        }
        lock(&self.transport).clone()
    }

    fn poll_once(&self) -> Option<u8> {
        let transport = self.transport()?;
        match transport.read_byte() {
            Ok(Some(b)) => {
                trace!(byte = b, "serial rx");
                // Dropped receivers are pruned here.
                lock(&self.subscribers).retain(|tx| tx.send(b).is_ok());
                Some(b)
            }
            Ok(None) => None,
            Err(e) => {
                match map_hw_error(&*e) {
                    CaneError::ReadTimeout => {}
                    other => warn!(error = %other, "serial read failed"),
                }
                None
            }
        }
    }
}

struct Poller {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct Link {
    connector: Box<dyn Connector>,
    cfg: LinkCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shared: Arc<Shared>,
    state: Mutex<LinkState>,
    poller: Mutex<Option<Poller>>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("state", &*lock(&self.state))
            .field("poll_interval", &self.cfg.poll_interval)
            .finish()
    }
}

impl Link {
    pub fn new(connector: Box<dyn Connector>, cfg: LinkCfg) -> Self {
        Self::with_clock(connector, cfg, Arc::new(MonotonicClock::new()))
    }

    /// The clock only paces the poll thread.
    pub fn with_clock(
        connector: Box<dyn Connector>,
        cfg: LinkCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            connector,
            cfg,
            clock,
            shared: Arc::new(Shared::default()),
            state: Mutex::new(LinkState::default()),
            poller: Mutex::new(None),
        }
    }

    pub fn cfg(&self) -> &LinkCfg {
        &self.cfg
    }

    /// Open using the configured port and baud rate.
    pub fn open_default(&self) -> Result<()> {
        let port = self.cfg.port.clone();
        self.open(&port, self.cfg.baud_rate)
    }

    /// Open `port` and start the poll thread. An already open connection is
    /// closed first. There is no automatic retry.
    ///
    /// The poller guard is held throughout, so concurrent `open`/`close`
    /// calls are serialized and at most one poll thread exists.
    pub fn open(&self, port: &str, baud_rate: u32) -> Result<()> {
        let mut poller = lock(&self.poller);
        self.shutdown_locked(&mut poller);

        *lock(&self.state) = LinkState {
            port: Some(port.to_string()),
            baud_rate,
            is_open: false,
        };

        let transport = match self.connector.connect(port, baud_rate, self.cfg.read_timeout) {
            Ok(t) => t,
            Err(e) => {
                error!(port, baud_rate, error = %e, "failed to open serial port");
                return Err(eyre::Report::new(CaneError::LinkUnavailable(format!(
                    "{port}: {e}"
                ))));
            }
        };

        *lock(&self.shared.transport) = Some(Arc::from(transport));
        self.shared.open.store(true, Ordering::Release);
        lock(&self.state).is_open = true;
        *poller = Some(self.spawn_poller());
        info!(port, baud_rate, "port opened");
        Ok(())
    }

    fn spawn_poller(&self) -> Poller {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let shared = self.shared.clone();
        let clock = self.clock.clone();
        let period = self.cfg.poll_interval;

        let handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    debug!("link poll thread received shutdown signal");
                    break;
                }
                shared.poll_once();
                // Check again before sleeping so close() is not delayed a full period.
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            trace!("link poll thread exiting cleanly");
        });

        Poller { shutdown, handle }
    }

    /// Read at most one byte and notify subscribers. No-op while closed.
    ///
    /// The poll thread calls this on its own; it is public for callers that
    /// want to drive reads by hand.
    pub fn poll_once(&self) -> Option<u8> {
        self.shared.poll_once()
    }

    pub fn write_byte(&self, b: u8) {
        let Some(transport) = self.shared.transport() else {
            debug!(byte = b, "write skipped: link closed");
            return;
        };
        if let Err(e) = transport.write_all(&[b]) {
            warn!(byte = b, error = %map_hw_error(&*e), "serial write failed");
        }
    }

    pub fn write_str(&self, s: &str) {
        let Some(transport) = self.shared.transport() else {
            debug!(len = s.len(), "write skipped: link closed");
            return;
        };
        if let Err(e) = transport.write_all(s.as_bytes()) {
            warn!(error = %map_hw_error(&*e), "serial write failed");
        }
    }

    /// Receive every byte read from now on.
    pub fn subscribe(&self) -> xch::Receiver<u8> {
        let (tx, rx) = xch::unbounded();
        lock(&self.shared.subscribers).push(tx);
        rx
    }

    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LinkState {
        lock(&self.state).clone()
    }

    pub fn available_ports(&self) -> Vec<String> {
        self.connector.available_ports()
    }

    /// Stop the poll thread and release the transport. Idempotent.
    pub fn close(&self) {
        let mut poller = lock(&self.poller);
        self.shutdown_locked(&mut poller);
    }

    // Caller holds the poller guard.
    fn shutdown_locked(&self, poller: &mut Option<Poller>) {
        let was_open = self.shared.open.swap(false, Ordering::AcqRel);

        if let Some(p) = poller.take() {
            p.shutdown.store(true, Ordering::Relaxed);
            // Worst case the thread is inside a read bounded by read_timeout.
            if let Err(e) = p.handle.join() {
                warn!(?e, "link poll thread panicked during shutdown");
            }
        }
        *lock(&self.shared.transport) = None;

        let mut st = lock(&self.state);
        st.is_open = false;
        if was_open {
            info!(port = st.port.as_deref().unwrap_or(""), "port closed");
        }
    }
}

impl ByteSink for Link {
    fn is_ready(&self) -> bool {
        self.is_open()
    }

    fn write_byte(&self, b: u8) {
        Link::write_byte(self, b);
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cane_hardware::{SimulatedConnector, SimulatedDevice};
    use std::time::Duration;

    fn fast_cfg() -> LinkCfg {
        LinkCfg {
            port: "sim0".into(),
            poll_interval: Duration::from_millis(1),
            read_timeout: Duration::from_millis(5),
            ..LinkCfg::default()
        }
    }

    #[test]
    fn writes_while_closed_are_noops() {
        let dev = SimulatedDevice::new();
        let link = Link::new(Box::new(SimulatedConnector::new(dev.clone())), fast_cfg());
        link.write_byte(b'L');
        link.write_str("RF");
        assert!(dev.written().is_empty());
        assert_eq!(link.poll_once(), None);
        assert!(!link.state().is_open);
    }

    #[test]
    fn close_is_idempotent() {
        let dev = SimulatedDevice::new();
        let link = Link::new(Box::new(SimulatedConnector::new(dev)), fast_cfg());
        link.open_default().unwrap();
        link.close();
        link.close();
        assert!(!link.is_open());
        assert_eq!(link.state().port.as_deref(), Some("sim0"));
    }

    #[test]
    fn failed_open_leaves_link_closed() {
        let dev = SimulatedDevice::new();
        let link = Link::new(Box::new(SimulatedConnector::refusing(dev)), fast_cfg());
        let err = link.open("COM9", 115_200).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaneError>(),
            Some(CaneError::LinkUnavailable(_))
        ));
        assert!(!link.is_ready());
    }

    #[test]
    fn failed_open_records_the_attempt() {
        let dev = SimulatedDevice::new();
        let link = Link::new(Box::new(SimulatedConnector::refusing(dev)), fast_cfg());
        assert!(link.open("COM9", 115_200).is_err());
        assert!(link.open("COM7", 9_600).is_err());
        assert_eq!(
            link.state(),
            LinkState {
                port: Some("COM7".into()),
                baud_rate: 9_600,
                is_open: false,
            }
        );
    }
}
