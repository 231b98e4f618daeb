//! Single-pass element producers.
//!
//! A [`PullSource`] is the only thing a shared sequence needs from the outside
//! world: something that can be asked for the next element until it says it is
//! done. The shared state takes ownership of the source, so one source can
//! never feed two independent sequences.

/// A stateful, single-consumer producer of elements.
///
/// Each call to [`pull`](PullSource::pull) yields the next element or `None`
/// once the producer is exhausted. Exhaustion is treated as permanent: after
/// the first `None` the source is dropped and never called again.
pub trait PullSource {
    /// Element type produced by this source.
    type Item;

    /// Produce the next element, or `None` at the end.
    fn pull(&mut self) -> Option<Self::Item>;
}

impl<S: PullSource + ?Sized> PullSource for Box<S> {
    type Item = S::Item;

    #[inline]
    fn pull(&mut self) -> Option<Self::Item> {
        (**self).pull()
    }
}

/// Adapts any [`Iterator`] into a [`PullSource`].
#[derive(Debug, Clone)]
pub struct IterSource<I> {
    iter: I,
}

impl<I: Iterator> IterSource<I> {
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: iter.into_iter(),
        }
    }

    /// Returns the wrapped iterator.
    pub fn into_inner(self) -> I {
        self.iter
    }
}

impl<I: Iterator> PullSource for IterSource<I> {
    type Item = I::Item;

    #[inline]
    fn pull(&mut self) -> Option<I::Item> {
        self.iter.next()
    }
}

/// A [`PullSource`] driven by a closure. See [`from_fn`].
pub struct FnSource<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSource").finish_non_exhaustive()
    }
}

impl<T, F: FnMut() -> Option<T>> PullSource for FnSource<F> {
    type Item = T;

    #[inline]
    fn pull(&mut self) -> Option<T> {
        (self.f)()
    }
}

/// Build a source from a closure returning `Some(item)` until it is done.
///
#[cfg_attr(feature = "loom", doc = "```ignore")]
#[cfg_attr(not(feature = "loom"), doc = "```")]
/// let mut n = 0u32;
/// let view = forkseq::new_view(forkseq::from_fn(move || {
///     n += 1;
///     (n <= 3).then_some(n * 10)
/// }));
/// assert_eq!(view.get(2), Ok(30));
/// assert!(view.get(3).unwrap_err().is_out_of_range());
/// ```
pub fn from_fn<T, F: FnMut() -> Option<T>>(f: F) -> FnSource<F> {
    FnSource { f }
}
