use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use forkseq::PullSource;

#[derive(Debug, Default)]
struct Counts {
    pulls: AtomicU64,
    after_end: AtomicU64,
    dropped: AtomicBool,
}

/// Shared view of a [`CountingSource`]'s counters.
///
/// Stays readable after the source itself has been dropped by the sequence.
#[derive(Debug, Clone, Default)]
pub struct PullCounter {
    counts: Arc<Counts>,
}

impl PullCounter {
    /// Total number of calls to `pull`.
    pub fn pulls(&self) -> u64 {
        self.counts.pulls.load(Ordering::Acquire)
    }

    /// Calls to `pull` made after the source had already returned `None`.
    pub fn pulls_after_end(&self) -> u64 {
        self.counts.after_end.load(Ordering::Acquire)
    }

    /// Returns true once the source has been dropped.
    pub fn is_dropped(&self) -> bool {
        self.counts.dropped.load(Ordering::Acquire)
    }
}

/// Iterator-backed source that counts its pulls.
#[derive(Debug)]
pub struct CountingSource<I> {
    iter: I,
    ended: bool,
    counts: Arc<Counts>,
}

impl<I: Iterator> CountingSource<I> {
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> (Self, PullCounter) {
        let counter = PullCounter::default();
        let source = Self {
            iter: iter.into_iter(),
            ended: false,
            counts: counter.counts.clone(),
        };
        (source, counter)
    }
}

impl<I: Iterator> PullSource for CountingSource<I> {
    type Item = I::Item;

    fn pull(&mut self) -> Option<I::Item> {
        self.counts.pulls.fetch_add(1, Ordering::AcqRel);
        if self.ended {
            self.counts.after_end.fetch_add(1, Ordering::AcqRel);
        }
        let item = self.iter.next();
        if item.is_none() {
            self.ended = true;
        }
        item
    }
}

impl<I> Drop for CountingSource<I> {
    fn drop(&mut self) {
        self.counts.dropped.store(true, Ordering::Release);
    }
}

/// Counting source over any iterable.
pub fn counting<T: IntoIterator>(
    items: T,
) -> (CountingSource<T::IntoIter>, PullCounter) {
    CountingSource::new(items)
}

/// `1, 4, 9, ..., n*n`, then the end.
pub fn squares(n: u64) -> (CountingSource<impl Iterator<Item = u64>>, PullCounter) {
    CountingSource::new((1..=n).map(|i| i * i))
}

/// `0, 1, 2, ...` without end.
pub fn naturals() -> (CountingSource<std::ops::RangeFrom<u64>>, PullCounter) {
    CountingSource::new(0u64..)
}
