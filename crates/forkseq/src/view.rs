//! Cursors over a shared, lazily filled buffer.
//!
//! A [`View`] is the handle applications hold. It has a fixed absolute
//! position (its base) and reads relative to it. Views created from the same
//! root share one buffer and source; forking is cheap and never
//! touches the source. Dropping a view deregisters it, which lets the buffer
//! forget everything before the earliest surviving view.

use std::iter::FusedIterator;
use std::ops::{Bound, RangeBounds};

use crate::error::SeqError;
use crate::registry::ViewHandle;
use crate::source::{IterSource, PullSource};
use crate::state::{Config, SharedState, SharedStats};
use crate::sync::{Arc, Mutex, MutexGuard};

const NO_END_RELATIVE: &str =
    "lazy sequences may not have an end and don't support indexing from the end";

/// A read-only cursor into a lazily materialized sequence.
///
/// # Example
///
#[cfg_attr(feature = "loom", doc = "```ignore")]
#[cfg_attr(not(feature = "loom"), doc = "```")]
/// use forkseq::{Slice, View};
///
/// let view = View::from_iterable((1..=5).map(|n| n * n));
/// assert_eq!(view.get(1), Ok(4));
///
/// // Open-ended slices are lazy views.
/// let Ok(Slice::Lazy(tail)) = view.slice(2, None, None) else { panic!() };
/// assert_eq!(tail.get(0), Ok(9));
///
/// // Bounded slices are snapshots.
/// let Ok(Slice::Snapshot(items)) = view.slice(0, Some(10), Some(2)) else { panic!() };
/// assert_eq!(items, vec![1, 9, 25]);
/// ```
pub struct View<S: PullSource> {
    shared: Arc<Mutex<SharedState<S>>>,
    base: u64,
    handle: ViewHandle,
}

/// Result of [`View::slice`].
pub enum Slice<S: PullSource> {
    /// Open-ended slice: a new view, nothing materialized.
    Lazy(View<S>),
    /// Bounded slice: eagerly copied elements.
    Snapshot(Vec<S::Item>),
}

/// Create a root view over `source`.
pub fn new_view<S: PullSource>(source: S) -> View<S> {
    View::new(source)
}

impl<S: PullSource> View<S> {
    /// Create a root view at absolute index 0 over a fresh shared state.
    pub fn new(source: S) -> Self {
        Self::with_config(source, Config::default())
    }

    pub fn with_config(source: S, config: Config) -> Self {
        let (state, handle) = SharedState::with_root_view(source, config);
        Self {
            shared: Arc::new(Mutex::new(state)),
            base: 0,
            handle,
        }
    }

    /// Absolute index of this view's relative index 0.
    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Bookkeeping snapshot of the shared state behind this view.
    pub fn stats(&self) -> SharedStats {
        self.state().stats()
    }

    /// Returns true if both views read from the same shared buffer.
    pub fn shares_state_with(&self, other: &View<S>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Create a new view `offset` elements ahead of this one.
    ///
    /// Nothing is pulled from the source.
    pub fn fork(&self, offset: usize) -> Result<Self, SeqError> {
        let position = self.absolute(offset)?;
        self.fork_at(position)
    }

    /// Like [`fork`](Self::fork), but a negative offset may rewind onto
    /// elements that are still retained because an older view pins them.
    ///
    /// Rewinding before the reclamation horizon fails with
    /// [`SeqError::TimeTravel`].
    pub fn fork_signed(&self, offset: isize) -> Result<Self, SeqError> {
        match usize::try_from(offset) {
            Ok(offset) => self.fork(offset),
            Err(_) => {
                let back = offset.unsigned_abs() as u64;
                let position = self
                    .base
                    .checked_sub(back)
                    .ok_or(SeqError::invalid("fork before the start of the sequence"))?;
                self.fork_at(position)
            }
        }
    }

    /// Returns true if the sequence has no element at this view's base.
    ///
    /// May pull one element from the source.
    pub fn is_empty(&self) -> bool {
        !matches!(self.state().ensure(self.base), Ok(Some(_)))
    }

    /// Always fails: the sequence may be unbounded.
    pub fn len(&self) -> Result<usize, SeqError> {
        Err(SeqError::Unsupported {
            operation: "length queries",
        })
    }

    /// Always fails: the sequence may be unbounded and has no known end.
    pub fn reversed(&self) -> Result<Vec<S::Item>, SeqError> {
        Err(SeqError::Unsupported {
            operation: "reversal",
        })
    }

    fn fork_at(&self, position: u64) -> Result<Self, SeqError> {
        // Reading the horizon and registering happen under one lock, so a
        // concurrent drop cannot trim past `position` in between.
        let handle = self.state().register(position)?;
        Ok(Self {
            shared: self.shared.clone(),
            base: position,
            handle,
        })
    }

    #[inline]
    fn absolute(&self, relative: usize) -> Result<u64, SeqError> {
        self.base
            .checked_add(relative as u64)
            .ok_or(SeqError::invalid("index overflows the absolute position"))
    }

    #[inline]
    fn state(&self) -> MutexGuard<'_, SharedState<S>> {
        self.shared.lock()
    }
}

impl<S> View<S>
where
    S: PullSource,
    S::Item: Clone,
{
    /// Element at relative index `index`.
    ///
    /// Fails with [`SeqError::IndexOutOfRange`] if the source ends first.
    pub fn get(&self, index: usize) -> Result<S::Item, SeqError> {
        let absolute = self.absolute(index)?;
        let mut state = self.state();
        let found = state.ensure(absolute)?.cloned();
        found.ok_or(SeqError::IndexOutOfRange {
            index,
            exhausted_at: state.end_hint(),
        })
    }

    /// [`get`](Self::get) with a signed index; negative indices are rejected.
    pub fn get_signed(&self, index: isize) -> Result<S::Item, SeqError> {
        let index = usize::try_from(index).map_err(|_| SeqError::invalid(NO_END_RELATIVE))?;
        self.get(index)
    }

    /// First element, or `None` if the sequence is empty from here.
    pub fn first(&self) -> Result<Option<S::Item>, SeqError> {
        match self.get(0) {
            Ok(item) => Ok(Some(item)),
            Err(err) if err.is_out_of_range() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Copy of up to `n` elements starting at this view's base.
    pub fn take(&self, n: usize) -> Result<Vec<S::Item>, SeqError> {
        let stop = self.absolute(n)?;
        self.state().snapshot(self.base, stop, 1)
    }

    /// Slice relative to this view.
    ///
    /// - `stop == None`: returns [`Slice::Lazy`] positioned at `start`;
    ///   `step` must be `None` since an unbounded stepped slice has no end.
    /// - `stop == Some(_)`: returns [`Slice::Snapshot`] of `[start, stop)`
    ///   stepping by `step` (default 1), truncated where the source ends.
    pub fn slice(
        &self,
        start: usize,
        stop: Option<usize>,
        step: Option<usize>,
    ) -> Result<Slice<S>, SeqError> {
        let Some(stop) = stop else {
            if step.is_some() {
                return Err(SeqError::invalid(
                    "lazy sequences do not support step slicing without an end",
                ));
            }
            return self.fork(start).map(Slice::Lazy);
        };

        let step = step.unwrap_or(1);
        if step == 0 {
            return Err(SeqError::invalid("slice step cannot be zero"));
        }
        if stop < start {
            return Err(SeqError::invalid("slice stop precedes start"));
        }

        let from = self.absolute(start)?;
        let to = self.absolute(stop)?;
        self.state().snapshot(from, to, step).map(Slice::Snapshot)
    }

    /// [`slice`](Self::slice) with signed bounds; negative values are rejected.
    pub fn slice_signed(
        &self,
        start: isize,
        stop: Option<isize>,
        step: Option<isize>,
    ) -> Result<Slice<S>, SeqError> {
        let unsigned = |value: isize| {
            usize::try_from(value).map_err(|_| SeqError::invalid(NO_END_RELATIVE))
        };
        let start = unsigned(start)?;
        let stop = stop.map(unsigned).transpose()?;
        let step = step
            .map(|step| usize::try_from(step).map_err(|_| SeqError::invalid("negative slice step")))
            .transpose()?;
        self.slice(start, stop, step)
    }

    /// [`slice`](Self::slice) from a range: `a..` is lazy, `a..b` and `a..=b`
    /// are snapshots.
    pub fn slice_range(&self, range: impl RangeBounds<usize>) -> Result<Slice<S>, SeqError> {
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start
                .checked_add(1)
                .ok_or(SeqError::invalid("slice start overflows"))?,
            Bound::Unbounded => 0,
        };
        let stop = match range.end_bound() {
            Bound::Included(&end) => Some(
                end.checked_add(1)
                    .ok_or(SeqError::invalid("slice end overflows"))?,
            ),
            Bound::Excluded(&end) => Some(end),
            Bound::Unbounded => None,
        };
        self.slice(start, stop, None)
    }

    /// Iterate from this view's base until the source ends.
    ///
    /// The iterator borrows the view, so nothing behind it is reclaimed
    /// while iterating. Use `into_iter` to release elements as they pass.
    pub fn iter(&self) -> Iter<'_, S> {
        Iter {
            view: self,
            next: 0,
        }
    }
}

impl<I: Iterator> View<IterSource<I>> {
    /// Create a root view over anything iterable.
    pub fn from_iterable(iterable: impl IntoIterator<IntoIter = I>) -> Self {
        Self::new(IterSource::new(iterable))
    }
}

impl<S: PullSource> Drop for View<S> {
    fn drop(&mut self) {
        self.state().deregister(self.handle);
    }
}

impl<S: PullSource> std::fmt::Debug for View<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("base", &self.base)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl<S: PullSource> Slice<S> {
    #[inline]
    pub fn is_lazy(&self) -> bool {
        matches!(self, Slice::Lazy(_))
    }

    pub fn into_view(self) -> Option<View<S>> {
        match self {
            Slice::Lazy(view) => Some(view),
            Slice::Snapshot(_) => None,
        }
    }

    pub fn into_vec(self) -> Option<Vec<S::Item>> {
        match self {
            Slice::Lazy(_) => None,
            Slice::Snapshot(items) => Some(items),
        }
    }
}

impl<S> std::fmt::Debug for Slice<S>
where
    S: PullSource,
    S::Item: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slice::Lazy(view) => f.debug_tuple("Lazy").field(view).finish(),
            Slice::Snapshot(items) => f.debug_tuple("Snapshot").field(items).finish(),
        }
    }
}

/// Borrowing iterator returned by [`View::iter`].
pub struct Iter<'a, S: PullSource> {
    view: &'a View<S>,
    next: usize,
}

impl<S> Iterator for Iter<'_, S>
where
    S: PullSource,
    S::Item: Clone,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        match self.view.get(self.next) {
            Ok(item) => {
                self.next += 1;
                Some(item)
            }
            Err(err) => {
                debug_assert!(err.is_out_of_range(), "iteration stopped by {}", err);
                None
            }
        }
    }
}

impl<S> FusedIterator for Iter<'_, S>
where
    S: PullSource,
    S::Item: Clone,
{
}

/// Consuming iterator that steps a view forward one element at a time.
///
/// Each step forks one position ahead and drops the previous view, so when
/// this is the earliest view the buffer never holds more than it needs.
pub struct IntoIter<S: PullSource> {
    view: Option<View<S>>,
}

impl<S> Iterator for IntoIter<S>
where
    S: PullSource,
    S::Item: Clone,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<S::Item> {
        let view = self.view.as_ref()?;
        match view.get(0) {
            Ok(item) => {
                // Register the successor before the old view deregisters.
                let next = view.fork(1);
                debug_assert!(next.is_ok(), "stepping past {} failed", view.base);
                self.view = next.ok();
                Some(item)
            }
            Err(err) => {
                debug_assert!(err.is_out_of_range(), "iteration stopped by {}", err);
                self.view = None;
                None
            }
        }
    }
}

impl<S> FusedIterator for IntoIter<S>
where
    S: PullSource,
    S::Item: Clone,
{
}

impl<S> IntoIterator for View<S>
where
    S: PullSource,
    S::Item: Clone,
{
    type Item = S::Item;
    type IntoIter = IntoIter<S>;

    fn into_iter(self) -> IntoIter<S> {
        IntoIter { view: Some(self) }
    }
}

impl<'a, S> IntoIterator for &'a View<S>
where
    S: PullSource,
    S::Item: Clone,
{
    type Item = S::Item;
    type IntoIter = Iter<'a, S>;

    fn into_iter(self) -> Iter<'a, S> {
        self.iter()
    }
}
