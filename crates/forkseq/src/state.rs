//! Shared buffer state behind a family of views.
//!
//! # Buffer window
//!
//! ```text
//!   absolute index:  0 ........ origin ............. produced ........ ∞
//!                    | reclaimed |      buffer       | not yet pulled  |
//! ```
//!
//! - `buffer[k]` is the element at absolute index `origin + k`.
//! - `produced` is the absolute index of the next element the source would
//!   yield. Normally `produced == origin + buffer.len()`.
//! - When the horizon jumps past `produced` (every view before it was dropped
//!   and the survivors were forked ahead of what was pulled), the buffer is
//!   empty and `produced < origin`; the gap is pulled and discarded by the
//!   next [`ensure`](SharedState::ensure) that reaches past it.
//!
//! # Reclamation
//!
//! `origin` only moves in [`deregister`](SharedState::deregister), to the
//! smallest position among the remaining live views. When the last view
//! leaves, the source and buffer are released and the state is terminal.

use std::collections::VecDeque;

use crate::error::SeqError;
use crate::registry::{LiveViews, ViewHandle};
use crate::source::PullSource;

/// Default number of elements preallocated for the buffer.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Default spare buffer capacity tolerated after a trim.
pub const DEFAULT_SHRINK_SLACK: usize = 1024;

/// Buffer sizing knobs for a shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Elements preallocated up front; also the floor when shrinking.
    pub initial_capacity: usize,
    /// Spare capacity above which the buffer is shrunk after trimming.
    pub shrink_slack: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            shrink_slack: DEFAULT_SHRINK_SLACK,
        }
    }
}

impl Config {
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_shrink_slack(mut self, shrink_slack: usize) -> Self {
        self.shrink_slack = shrink_slack;
        self
    }
}

/// Lifecycle of a shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The source may still produce elements.
    Active,
    /// The source ended; buffered elements are still served.
    Drained,
    /// The last view was dropped; source and buffer are gone.
    Released,
}

/// Snapshot of a shared state's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedStats {
    /// Absolute index of the first retained element.
    pub origin: u64,
    /// Number of retained elements.
    pub buffered: usize,
    /// Number of live views.
    pub live_views: usize,
    /// Number of elements pulled from the source so far.
    pub pulled: u64,
    /// Absolute index at which the source ended, if it has.
    pub exhausted_at: Option<u64>,
    pub phase: Phase,
}

pub(crate) struct SharedState<S: PullSource> {
    source: Option<S>,
    buffer: VecDeque<S::Item>,
    origin: u64,
    produced: u64,
    exhausted_at: Option<u64>,
    views: LiveViews,
    released: bool,
    config: Config,
}

impl<S: PullSource> SharedState<S> {
    pub(crate) fn new(source: S, config: Config) -> Self {
        Self {
            source: Some(source),
            buffer: VecDeque::with_capacity(config.initial_capacity),
            origin: 0,
            produced: 0,
            exhausted_at: None,
            views: LiveViews::new(),
            released: false,
            config,
        }
    }

    /// Fresh state with its first view already registered at index 0.
    pub(crate) fn with_root_view(source: S, config: Config) -> (Self, ViewHandle) {
        let mut state = Self::new(source, config);
        let handle = state.views.insert(0);
        (state, handle)
    }

    /// Absolute index at which the source ended, or the pull position if it
    /// has not ended yet.
    #[inline]
    pub(crate) fn end_hint(&self) -> u64 {
        self.exhausted_at.unwrap_or(self.produced)
    }

    pub(crate) fn phase(&self) -> Phase {
        if self.released {
            Phase::Released
        } else if self.exhausted_at.is_some() {
            Phase::Drained
        } else {
            Phase::Active
        }
    }

    pub(crate) fn stats(&self) -> SharedStats {
        SharedStats {
            origin: self.origin,
            buffered: self.buffer.len(),
            live_views: self.views.len(),
            pulled: self.produced,
            exhausted_at: self.exhausted_at,
            phase: self.phase(),
        }
    }

    /// Register a view positioned at absolute index `position`.
    pub(crate) fn register(&mut self, position: u64) -> Result<ViewHandle, SeqError> {
        if self.released {
            return Err(SeqError::Released);
        }
        if position < self.origin {
            tracing::warn!(
                requested = position,
                origin = self.origin,
                "rejecting view positioned before the reclamation horizon"
            );
            return Err(SeqError::TimeTravel {
                requested: position,
                origin: self.origin,
            });
        }
        Ok(self.views.insert(position))
    }

    /// Deregister a view and advance the horizon to the new minimum.
    pub(crate) fn deregister(&mut self, handle: ViewHandle) {
        self.views.remove(handle);
        if self.views.is_empty() {
            self.release();
            return;
        }

        let Some(new_origin) = self.views.min() else {
            unreachable!("{} live views without a minimum", self.views.len());
        };

        assert!(
            new_origin >= self.origin,
            "live view at {} behind origin {}",
            new_origin,
            self.origin
        );
        if new_origin > self.origin {
            self.trim_to(new_origin);
        }
    }

    /// Make sure `absolute` is buffered and return it.
    ///
    /// `Ok(None)` means the source ended at or before `absolute`. Once that
    /// is known the source is never called again.
    pub(crate) fn ensure(&mut self, absolute: u64) -> Result<Option<&S::Item>, SeqError> {
        if self.released {
            return Err(SeqError::Released);
        }
        if absolute < self.origin {
            return Err(SeqError::TimeTravel {
                requested: absolute,
                origin: self.origin,
            });
        }
        if self.exhausted_at.is_some_and(|end| absolute >= end) {
            return Ok(None);
        }
        if absolute >= self.produced && !self.pull_through(absolute) {
            return Ok(None);
        }

        let offset = (absolute - self.origin) as usize;
        let item = self.buffer.get(offset);
        debug_assert!(item.is_some(), "buffer does not cover {}", absolute);
        Ok(item)
    }

    /// Copy `[start, stop)` stepping by `step`, truncated where the source ends.
    pub(crate) fn snapshot(
        &mut self,
        start: u64,
        stop: u64,
        step: usize,
    ) -> Result<Vec<S::Item>, SeqError>
    where
        S::Item: Clone,
    {
        debug_assert!(step > 0);
        if start < self.origin {
            return Err(SeqError::TimeTravel {
                requested: start,
                origin: self.origin,
            });
        }
        if stop <= start {
            return Ok(Vec::new());
        }
        // Pulls everything up to `stop - 1`, or up to where the source ends.
        self.ensure(stop - 1)?;

        let end = stop.min(self.origin + self.buffer.len() as u64);
        if end <= start {
            return Ok(Vec::new());
        }
        let from = (start - self.origin) as usize;
        let to = (end - self.origin) as usize;
        Ok(self.buffer.range(from..to).step_by(step).cloned().collect())
    }

    /// Pull from the source until `absolute` is produced. Returns false if
    /// the source ended first.
    fn pull_through(&mut self, absolute: u64) -> bool {
        let Some(source) = self.source.as_mut() else {
            return false;
        };

        let from = self.produced;
        let mut ended = false;
        while self.produced <= absolute {
            match source.pull() {
                Some(item) => {
                    // Elements below the horizon were skipped by every view.
                    if self.produced >= self.origin {
                        self.buffer.push_back(item);
                    }
                    self.produced += 1;
                }
                None => {
                    ended = true;
                    break;
                }
            }
        }
        tracing::trace!(from, to = self.produced, "pulled from source");

        if ended {
            self.exhausted_at = Some(self.produced);
            self.source = None;
            tracing::debug!(exhausted_at = self.produced, "source exhausted");
        }
        self.check_window();
        !ended
    }

    fn trim_to(&mut self, new_origin: u64) {
        let old_origin = self.origin;
        let dropped = (new_origin - old_origin).min(self.buffer.len() as u64) as usize;
        self.buffer.drain(..dropped);
        self.origin = new_origin;

        let spare = self.buffer.capacity() - self.buffer.len();
        if spare > self.config.shrink_slack {
            self.buffer
                .shrink_to(self.buffer.len().max(self.config.initial_capacity));
        }

        tracing::debug!(old_origin, new_origin, dropped, "advanced horizon");
        self.check_window();
    }

    fn release(&mut self) {
        self.source = None;
        self.buffer = VecDeque::new();
        self.released = true;
        tracing::debug!(
            origin = self.origin,
            pulled = self.produced,
            "last view dropped, released source"
        );
    }

    #[inline]
    fn check_window(&self) {
        if self.produced >= self.origin {
            debug_assert_eq!(
                self.buffer.len() as u64,
                self.produced - self.origin,
                "buffer does not span [origin, produced)"
            );
        } else {
            debug_assert!(self.buffer.is_empty(), "buffer retained past a skipped gap");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IterSource;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Iterator source that counts how often it is pulled.
    fn counted(
        items: Vec<u32>,
    ) -> (
        SharedState<IterSource<impl Iterator<Item = u32>>>,
        Rc<Cell<usize>>,
    ) {
        let pulls = Rc::new(Cell::new(0));
        let counter = pulls.clone();
        let mut items = items.into_iter();
        let iter = std::iter::from_fn(move || {
            counter.set(counter.get() + 1);
            items.next()
        });
        (SharedState::new(IterSource::new(iter), Config::default()), pulls)
    }

    #[test]
    fn ensure_pulls_only_what_is_needed() {
        let (mut state, pulls) = counted(vec![10, 20, 30, 40]);
        let _view = state.register(0).unwrap();

        assert_eq!(state.ensure(1).unwrap(), Some(&20));
        assert_eq!(pulls.get(), 2);
        assert_eq!(state.ensure(0).unwrap(), Some(&10));
        assert_eq!(state.ensure(1).unwrap(), Some(&20));
        assert_eq!(pulls.get(), 2);
        assert_eq!(state.stats().buffered, 2);
    }

    #[test]
    fn exhaustion_is_sticky() {
        let (mut state, pulls) = counted(vec![1, 2]);
        let _view = state.register(0).unwrap();

        assert_eq!(state.ensure(5).unwrap(), None);
        assert_eq!(pulls.get(), 3);
        assert_eq!(state.stats().exhausted_at, Some(2));
        assert_eq!(state.phase(), Phase::Drained);

        assert_eq!(state.ensure(2).unwrap(), None);
        assert_eq!(state.ensure(7).unwrap(), None);
        assert_eq!(pulls.get(), 3);
        // Data before the end is still served.
        assert_eq!(state.ensure(1).unwrap(), Some(&2));
    }

    #[test]
    fn deregister_trims_to_minimum_live_position() {
        let (mut state, _) = counted((0..10).collect());
        let a = state.register(0).unwrap();
        let b = state.register(3).unwrap();
        let c = state.register(6).unwrap();
        state.ensure(7).unwrap();

        state.deregister(a);
        let stats = state.stats();
        assert_eq!(stats.origin, 3);
        assert_eq!(stats.buffered, 5);
        assert_eq!(state.ensure(3).unwrap(), Some(&3));

        state.deregister(c);
        assert_eq!(state.stats().origin, 3);

        state.deregister(b);
        assert_eq!(state.phase(), Phase::Released);
    }

    #[test]
    fn horizon_past_pull_position_skips_gap() {
        let (mut state, pulls) = counted((0..10).collect());
        let a = state.register(0).unwrap();
        let _b = state.register(6).unwrap();
        state.ensure(1).unwrap();

        state.deregister(a);
        let stats = state.stats();
        assert_eq!(stats.origin, 6);
        assert_eq!(stats.buffered, 0);
        assert_eq!(stats.pulled, 2);

        assert_eq!(state.ensure(6).unwrap(), Some(&6));
        assert_eq!(pulls.get(), 7);
        assert_eq!(state.stats().buffered, 1);
    }

    #[test]
    fn source_ending_inside_skipped_gap() {
        let (mut state, _) = counted(vec![0, 1, 2]);
        let a = state.register(0).unwrap();
        let _b = state.register(5).unwrap();
        state.deregister(a);

        assert_eq!(state.ensure(5).unwrap(), None);
        assert_eq!(state.stats().exhausted_at, Some(3));
        assert_eq!(state.stats().buffered, 0);
    }

    #[test]
    fn register_before_origin_is_time_travel() {
        let (mut state, _) = counted((0..5).collect());
        let a = state.register(0).unwrap();
        let _b = state.register(2).unwrap();
        state.deregister(a);

        assert_eq!(
            state.register(1),
            Err(SeqError::TimeTravel {
                requested: 1,
                origin: 2
            })
        );
        assert!(state.register(2).is_ok());
    }

    #[test]
    fn ensure_before_origin_fails() {
        let (mut state, _) = counted((0..5).collect());
        let a = state.register(0).unwrap();
        let _b = state.register(3).unwrap();
        state.deregister(a);
        assert_eq!(
            state.ensure(0),
            Err(SeqError::TimeTravel {
                requested: 0,
                origin: 3
            })
        );
    }

    #[test]
    fn released_state_rejects_everything() {
        let (mut state, pulls) = counted((0..5).collect());
        let only = state.register(0).unwrap();
        state.ensure(2).unwrap();
        state.deregister(only);

        assert_eq!(state.phase(), Phase::Released);
        assert_eq!(state.stats().buffered, 0);
        assert_eq!(state.register(0), Err(SeqError::Released));
        assert_eq!(state.ensure(0), Err(SeqError::Released));
        assert_eq!(pulls.get(), 3);
    }

    #[test]
    fn snapshot_steps_and_truncates() {
        let (mut state, _) = counted((0..6).collect());
        let _view = state.register(0).unwrap();

        assert_eq!(state.snapshot(1, 5, 1).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(state.snapshot(0, 6, 2).unwrap(), vec![0, 2, 4]);
        assert_eq!(state.snapshot(4, 100, 1).unwrap(), vec![4, 5]);
        assert_eq!(state.snapshot(8, 100, 1).unwrap(), Vec::<u32>::new());
        assert_eq!(state.snapshot(3, 3, 1).unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn trim_shrinks_oversized_buffer() {
        let config = Config::default()
            .with_initial_capacity(4)
            .with_shrink_slack(8);
        let mut state = SharedState::new(IterSource::new(0..1000u32), config);
        let a = state.register(0).unwrap();
        let _b = state.register(500).unwrap();
        state.ensure(510).unwrap();

        state.deregister(a);
        let stats = state.stats();
        assert_eq!(stats.origin, 500);
        assert_eq!(stats.buffered, 11);
        assert!(state.buffer.capacity() - state.buffer.len() <= 8 + 4);
    }
}
