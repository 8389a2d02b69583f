//! Property coverage for virtual-time execution order.

use conspec_scheduler::VirtualScheduler;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

proptest! {
    /// Advancing by `window` executes exactly the work due within the
    /// window, ordered by due time with scheduling order breaking ties.
    #[test]
    fn advancement_is_deterministic_and_ordered(
        offsets in prop::collection::vec(0u64..500, 0..32),
        window in 0u64..500,
    ) {
        let sched = VirtualScheduler::new();
        let log: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

        for (index, &offset) in offsets.iter().enumerate() {
            let log = Arc::clone(&log);
            sched.schedule_at(
                Duration::from_millis(offset),
                Box::new(move || log.lock().push(index)),
            );
        }

        sched.advance_by(Duration::from_millis(window));

        // Expected: indices of all offsets <= window, sorted by
        // (offset, scheduling index).
        let mut expected: Vec<(u64, usize)> = offsets
            .iter()
            .enumerate()
            .filter(|(_, &offset)| offset <= window)
            .map(|(index, &offset)| (offset, index))
            .collect();
        expected.sort_unstable();
        let expected: Vec<usize> = expected.into_iter().map(|(_, index)| index).collect();

        prop_assert_eq!(&*log.lock(), &expected);
        prop_assert_eq!(
            sched.pending(),
            offsets.iter().filter(|&&offset| offset > window).count()
        );
    }

    /// Advancing in two steps executes the same work as advancing once.
    #[test]
    fn advancement_composes(
        offsets in prop::collection::vec(0u64..200, 0..16),
        first in 0u64..100,
        second in 0u64..100,
    ) {
        let run_split: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let run_whole: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

        for (log, steps) in [
            (Arc::clone(&run_split), vec![first, second]),
            (Arc::clone(&run_whole), vec![first + second]),
        ] {
            let sched = VirtualScheduler::new();
            for (index, &offset) in offsets.iter().enumerate() {
                let log = Arc::clone(&log);
                sched.schedule_at(
                    Duration::from_millis(offset),
                    Box::new(move || log.lock().push(index)),
                );
            }
            for step in steps {
                sched.advance_by(Duration::from_millis(step));
            }
        }

        prop_assert_eq!(&*run_split.lock(), &*run_whole.lock());
    }
}
