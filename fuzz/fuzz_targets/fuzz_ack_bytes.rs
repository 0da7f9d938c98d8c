#![no_main]
use cane_core::{AckBuffer, AckCfg, AckSet};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let cfg = AckCfg::default();
    let mut acks = AckBuffer::new(&cfg);
    let resume = AckSet::new("1234");
    for &b in data {
        acks.on_byte(b);
        // The slot only ever holds an accepted ack.
        if let Some(c) = acks.peek() {
            assert!(cfg.accepted.contains(c));
        }
        if b & 1 == 0 {
            let _ = acks.consume_any(&resume);
        }
    }
});
