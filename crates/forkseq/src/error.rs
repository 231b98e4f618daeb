//! Error type shared by every fallible view operation.

/// Error type for view and shared-state operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeqError {
    /// Negative index, end-relative access, or malformed slice bounds.
    InvalidArgument {
        /// What was wrong with the argument.
        reason: &'static str,
    },
    /// The producer ended before reaching the requested relative index.
    IndexOutOfRange {
        /// Relative index that was requested.
        index: usize,
        /// Absolute index at which the producer ended.
        exhausted_at: u64,
    },
    /// A view was positioned before data that has already been reclaimed.
    TimeTravel {
        /// Absolute index the view (or read) asked for.
        requested: u64,
        /// Current reclamation horizon.
        origin: u64,
    },
    /// Reversal or length query on a possibly unbounded sequence.
    Unsupported {
        /// Name of the rejected operation.
        operation: &'static str,
    },
    /// The shared state already released its producer and buffer.
    Released,
}

impl SeqError {
    pub(crate) const fn invalid(reason: &'static str) -> Self {
        SeqError::InvalidArgument { reason }
    }

    /// Returns true if this error only means "no more data".
    ///
    /// Callers iterating by index can treat it as the end of the sequence.
    #[inline]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, SeqError::IndexOutOfRange { .. })
    }
}

impl std::fmt::Display for SeqError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeqError::InvalidArgument { reason } => write!(f, "invalid argument: {}", reason),
            SeqError::IndexOutOfRange {
                index,
                exhausted_at,
            } => write!(
                f,
                "index {} out of range: producer ended at absolute index {}",
                index, exhausted_at
            ),
            SeqError::TimeTravel { requested, origin } => write!(
                f,
                "attempted to time travel to absolute index {} before origin {}",
                requested, origin
            ),
            SeqError::Unsupported { operation } => {
                write!(f, "lazy sequences do not support {}", operation)
            }
            SeqError::Released => write!(f, "shared sequence state has been released"),
        }
    }
}

impl std::error::Error for SeqError {}
