use cane_core::mocks::RecordingSink;
use cane_core::{AckBuffer, AckCfg, Command, DispatchCfg, Dispatcher, SendOutcome};
use cane_traits::{Clock, TestClock};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn command() -> impl Strategy<Value = Command> {
    prop::sample::select(Command::ALL.to_vec())
}

proptest! {
    // Reference model: a non-forced repeat within 50 ms is dropped, every
    // other send goes out and refreshes the throttle.
    #[test]
    fn throttle_matches_model(steps in prop::collection::vec((command(), any::<bool>(), 0u64..120), 1..60)) {
        let clock = TestClock::new();
        let sink = Arc::new(RecordingSink::new());
        let mut d = Dispatcher::new(sink.clone(), Arc::new(clock.clone()), &DispatchCfg::default());

        let mut last: Option<(Command, Instant)> = None;
        let mut expected = Vec::new();
        for (cmd, force, advance) in steps {
            clock.advance_ms(advance);
            let now = clock.now();
            let throttled = !force
                && last.is_some_and(|(c, at)| c == cmd && now - at < Duration::from_millis(50));
            let outcome = d.send(cmd, force);
            if throttled {
                prop_assert_eq!(outcome, SendOutcome::Throttled);
            } else {
                prop_assert_eq!(outcome, SendOutcome::Sent);
                expected.push(cmd.as_byte());
                last = Some((cmd, now));
            }
        }
        prop_assert_eq!(sink.bytes(), expected);
    }

    #[test]
    fn slot_holds_latest_accepted_byte(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut acks = AckBuffer::new(&AckCfg::default());
        for &b in &bytes {
            acks.on_byte(b);
        }
        let want = bytes.iter().rev().map(|&b| char::from(b)).find(|c| "123456".contains(*c));
        prop_assert_eq!(acks.peek(), want);
        if let Some(c) = want {
            prop_assert!(acks.consume(c));
            prop_assert_eq!(acks.peek(), None);
        }
    }
}
