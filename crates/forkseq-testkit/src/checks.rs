//! Conformance checks shared by the integration suites.
//!
//! Each check reads through the public API only and panics with the failing
//! position, so the same assertions can run against any source.

use std::fmt::Debug;

use forkseq::{PullSource, SeqError, Slice, View};

/// A fork at `offset` reads exactly what `view` reads at `offset + i`, for
/// `i` in `0..len`, including where both run out.
pub fn fork_reads_match<S>(view: &View<S>, offset: usize, len: usize)
where
    S: PullSource,
    S::Item: Clone + PartialEq + Debug,
{
    let fork = view
        .fork(offset)
        .unwrap_or_else(|err| panic!("fork at {} failed: {}", offset, err));
    assert_eq!(fork.base(), view.base() + offset as u64);
    assert!(fork.shares_state_with(view));

    for i in 0..len {
        let direct = view.get(offset + i);
        let forked = fork.get(i);
        match (&direct, &forked) {
            (Ok(a), Ok(b)) => assert_eq!(a, b, "fork at {} differs at {}", offset, i),
            (Err(a), Err(b)) => {
                assert!(a.is_out_of_range(), "unexpected error {}", a);
                assert!(b.is_out_of_range(), "unexpected error {}", b);
            }
            _ => panic!(
                "fork at {} disagrees at {}: direct {:?}, forked {:?}",
                offset, i, direct, forked
            ),
        }
    }
}

/// A bounded slice equals the stepped sequence of direct reads, truncated at
/// the first out-of-range index.
pub fn snapshot_matches_gets<S>(view: &View<S>, start: usize, stop: usize, step: usize)
where
    S: PullSource,
    S::Item: Clone + PartialEq + Debug,
{
    let snapshot = match view.slice(start, Some(stop), Some(step)) {
        Ok(Slice::Snapshot(items)) => items,
        Ok(Slice::Lazy(_)) => panic!("bounded slice {}..{} returned a view", start, stop),
        Err(err) => panic!("slice {}..{} by {} failed: {}", start, stop, step, err),
    };

    let mut expected = Vec::new();
    for index in (start..stop).step_by(step) {
        match view.get(index) {
            Ok(item) => expected.push(item),
            Err(err) if err.is_out_of_range() => break,
            Err(err) => panic!("get({}) failed: {}", index, err),
        }
    }
    assert_eq!(
        snapshot, expected,
        "slice {}..{} by {} disagrees with get",
        start, stop, step
    );
}

/// Nothing before `origin` is retained, and `origin` itself is what the
/// shared state reports.
pub fn horizon_is<S: PullSource>(view: &View<S>, origin: u64) {
    let stats = view.stats();
    assert_eq!(stats.origin, origin, "unexpected origin in {:?}", stats);
    let retained = stats.pulled.saturating_sub(stats.origin);
    assert_eq!(
        stats.buffered as u64, retained,
        "buffer should span exactly [origin, pulled): {:?}",
        stats
    );
}

/// Every argument shape that must be rejected before touching the source.
pub fn rejects_invalid_arguments<S>(view: &View<S>)
where
    S: PullSource,
    S::Item: Clone,
{
    let pulled = view.stats().pulled;

    let invalid = |result: Result<(), SeqError>, what: &str| match result {
        Err(SeqError::InvalidArgument { .. }) => {}
        other => panic!("{} should be an invalid argument, got {:?}", what, other),
    };
    invalid(view.get_signed(-1).map(drop), "negative index");
    invalid(view.slice_signed(-3, None, None).map(drop), "negative start");
    invalid(view.slice_signed(0, Some(-1), None).map(drop), "negative stop");
    invalid(view.slice(0, None, Some(2)).map(drop), "step without stop");
    invalid(view.slice(0, Some(4), Some(0)).map(drop), "zero step");
    invalid(view.slice(3, Some(1), None).map(drop), "stop before start");

    assert_eq!(
        view.stats().pulled,
        pulled,
        "rejected arguments must not pull from the source"
    );
}
