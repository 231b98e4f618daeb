//! Buffer retention: the horizon follows the earliest live view exactly.

#![cfg(not(feature = "loom"))]

use forkseq::{SeqError, View};
use forkseq_testkit::{CountingSource, PullCounter, checks, counting, naturals};
use proptest::prelude::*;

#[test]
fn horizon_follows_the_earliest_live_view() {
    let (source, _) = naturals();
    let root = View::new(source);
    let a = root.fork(2).unwrap();
    let b = root.fork(5).unwrap();
    b.get(3).unwrap();
    checks::horizon_is(&root, 0);

    drop(root);
    checks::horizon_is(&a, 2);

    drop(a);
    checks::horizon_is(&b, 5);
    assert_eq!(b.get(0), Ok(5));
    assert_eq!(b.stats().live_views, 1);
}

#[test]
fn later_views_do_not_move_the_horizon() {
    let (source, _) = naturals();
    let root = View::new(source);
    let a = root.fork(4).unwrap();
    a.get(0).unwrap();

    drop(a);
    checks::horizon_is(&root, 0);
    assert_eq!(root.stats().buffered, 5);
}

#[test]
fn only_fork_left_at_k_retains_nothing_before_k() {
    let (source, _) = naturals();
    let root = View::new(source);
    root.get(9).unwrap();
    let k = root.fork(7).unwrap();
    drop(root);

    let stats = k.stats();
    assert_eq!(stats.origin, 7);
    assert_eq!(stats.buffered, 3);
    assert_eq!(k.get(0), Ok(7));
}

#[test]
fn horizon_may_jump_past_what_was_pulled() {
    let (source, counter) = naturals();
    let root = View::new(source);
    root.get(1).unwrap();
    let far = root.fork(100).unwrap();
    drop(root);

    checks::horizon_is(&far, 100);
    assert_eq!(counter.pulls(), 2);

    assert_eq!(far.get(0), Ok(100));
    assert_eq!(counter.pulls(), 101);
    // Skipped elements were never buffered.
    assert_eq!(far.stats().buffered, 1);
}

#[test]
fn time_travel_is_rejected_after_reclamation() {
    let (source, _) = counting(0..10u32);
    let root = View::new(source);
    let mid = root.fork(4).unwrap();
    let rewound = mid.fork_signed(-4).unwrap();
    assert_eq!(rewound.get(0), Ok(0));

    drop(root);
    drop(rewound);
    assert_eq!(
        mid.fork_signed(-1).unwrap_err(),
        SeqError::TimeTravel {
            requested: 3,
            origin: 4
        }
    );
    // The failed registration left nothing behind.
    assert_eq!(mid.stats().live_views, 1);
}

#[derive(Debug, Clone)]
enum Op {
    /// Fork the `view`-th live view forward by `offset`.
    Fork { view: usize, offset: usize },
    /// Drop the `view`-th live view, unless it is the last one.
    Drop { view: usize },
    /// Read relative `index` through the `view`-th live view.
    Read { view: usize, index: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..8, 0usize..12).prop_map(|(view, offset)| Op::Fork { view, offset }),
        (0usize..8).prop_map(|view| Op::Drop { view }),
        (0usize..8, 0usize..16).prop_map(|(view, index)| Op::Read { view, index }),
    ]
}

type Source = CountingSource<std::ops::Range<u64>>;

/// Apply `ops` to views over `0..len` and check retention after every step.
fn run_schedule(len: u64, ops: &[Op]) -> Result<(), TestCaseError> {
    let (source, counter): (Source, PullCounter) = CountingSource::new(0..len);
    let mut live = vec![View::new(source)];

    for op in ops {
        match *op {
            Op::Fork { view, offset } => {
                let parent = &live[view % live.len()];
                let fork = parent.fork(offset).map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(fork.base(), parent.base() + offset as u64);
                live.push(fork);
            }
            Op::Drop { view } => {
                if live.len() > 1 {
                    let index = view % live.len();
                    live.swap_remove(index);
                }
            }
            Op::Read { view, index } => {
                let reader = &live[view % live.len()];
                let absolute = reader.base() + index as u64;
                match reader.get(index) {
                    Ok(value) => prop_assert_eq!(value, absolute),
                    Err(err) => {
                        prop_assert!(err.is_out_of_range(), "unexpected {}", err);
                        prop_assert!(absolute >= len);
                    }
                }
            }
        }

        let stats = live[0].stats();
        let min_base = live.iter().map(View::base).min().unwrap_or_default();
        prop_assert_eq!(stats.origin, min_base);
        prop_assert_eq!(stats.live_views, live.len());
        prop_assert_eq!(
            stats.buffered as u64,
            stats.pulled.saturating_sub(stats.origin)
        );
        prop_assert_eq!(counter.pulls_after_end(), 0);
    }
    Ok(())
}

proptest! {
    /// Any schedule of forks, drops, and reads keeps the horizon at the
    /// earliest live view and never re-pulls an ended source.
    #[test]
    fn retention_holds_for_arbitrary_schedules(
        len in 0u64..24,
        ops in prop::collection::vec(arb_op(), 0..64),
    ) {
        run_schedule(len, &ops)?;
    }
}
