//! Test and helper mocks for cane_core

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::link::ByteSink;

/// A byte sink that records every write; readiness can be toggled.
#[derive(Debug)]
pub struct RecordingSink {
    ready: AtomicBool,
    bytes: Mutex<Vec<u8>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            bytes: Mutex::new(Vec::new()),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn count_of(&self, byte: u8) -> usize {
        self.bytes().iter().filter(|b| **b == byte).count()
    }

    pub fn clear(&self) {
        if let Ok(mut b) = self.bytes.lock() {
            b.clear();
        }
    }
}

impl ByteSink for RecordingSink {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    fn write_byte(&self, b: u8) {
        if let Ok(mut bytes) = self.bytes.lock() {
            bytes.push(b);
        }
    }
}
