//! Single-slot acknowledgment buffer.
//!
//! Holds at most one pending ack. A newer recognized byte overwrites an
//! unconsumed older one; consumers only ever see the latest.
use crossbeam_channel as xch;
use tracing::trace;

use crate::config::AckCfg;
use crate::protocol::AckSet;

#[derive(Debug)]
pub struct AckBuffer {
    accepted: AckSet,
    resume_signal: char,
    slot: Option<char>,
    rx: Option<xch::Receiver<u8>>,
}

impl AckBuffer {
    pub fn new(cfg: &AckCfg) -> Self {
        Self {
            accepted: cfg.accepted.clone(),
            resume_signal: cfg.resume_signal,
            slot: None,
            rx: None,
        }
    }

    /// Attach a link subscription; `pump` drains it.
    pub fn with_receiver(mut self, rx: xch::Receiver<u8>) -> Self {
        self.rx = Some(rx);
        self
    }

    /// Feed one received byte. Bytes outside the accepted set are dropped.
    pub fn on_byte(&mut self, b: u8) {
        let c = char::from(b);
        if self.accepted.contains(c) {
            if let Some(old) = self.slot.replace(c) {
                trace!(old = %old, new = %c, "ack overwritten before consume");
            }
        } else {
            trace!(byte = b, "noise byte ignored");
        }
    }

    /// Drain pending bytes from the subscription in arrival order.
    /// Returns how many bytes were processed.
    pub fn pump(&mut self) -> usize {
        let Some(rx) = self.rx.take() else {
            return 0;
        };
        let mut n = 0;
        for b in rx.try_iter() {
            self.on_byte(b);
            n += 1;
        }
        self.rx = Some(rx);
        n
    }

    /// Take the slot if it holds `target`. A mismatch leaves the slot intact.
    pub fn consume(&mut self, target: char) -> bool {
        if self.slot == Some(target) {
            self.slot = None;
            true
        } else {
            false
        }
    }

    /// Take the slot if it holds any of `targets`. An empty set matches nothing.
    pub fn consume_any(&mut self, targets: &AckSet) -> bool {
        match self.slot {
            Some(c) if targets.contains(c) => {
                self.slot = None;
                true
            }
            _ => false,
        }
    }

    /// Consume the configured resume character.
    pub fn consume_resume_signal(&mut self) -> bool {
        self.consume(self.resume_signal)
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    pub fn peek(&self) -> Option<char> {
        self.slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf() -> AckBuffer {
        AckBuffer::new(&AckCfg::default())
    }

    #[test]
    fn newer_ack_overwrites_older() {
        let mut b = buf();
        b.on_byte(b'1');
        b.on_byte(b'2');
        assert!(!b.consume('1'));
        assert!(b.consume('2'));
        assert_eq!(b.peek(), None);
    }

    #[test]
    fn consume_is_destructive() {
        let mut b = buf();
        b.on_byte(b'5');
        assert!(b.consume('5'));
        assert!(!b.consume('5'));
    }

    #[test]
    fn noise_is_dropped_without_touching_slot() {
        let mut b = buf();
        b.on_byte(b'6');
        b.on_byte(b'x');
        b.on_byte(b'\n');
        assert_eq!(b.peek(), Some('6'));
    }

    #[test]
    fn consume_any_with_empty_set_is_false() {
        let mut b = buf();
        b.on_byte(b'3');
        assert!(!b.consume_any(&AckSet::default()));
        assert!(b.consume_any(&AckSet::new("1234")));
    }

    #[test]
    fn pump_drains_in_arrival_order() {
        let (tx, rx) = xch::unbounded();
        let mut b = buf().with_receiver(rx);
        for byte in *b"6?5" {
            tx.send(byte).unwrap();
        }
        assert_eq!(b.pump(), 3);
        assert_eq!(b.peek(), Some('5'));
        assert_eq!(b.pump(), 0);
    }

    #[test]
    fn resume_signal_alias() {
        let mut b = buf();
        b.on_byte(b'5');
        assert!(b.consume_resume_signal());
    }
}
