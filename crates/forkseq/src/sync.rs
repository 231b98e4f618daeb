#[cfg(not(feature = "loom"))]
pub(crate) use parking_lot::{Mutex, MutexGuard};
#[cfg(not(feature = "loom"))]
pub(crate) use std::sync::Arc;

#[cfg(feature = "loom")]
pub(crate) use loom::sync::Arc;
#[cfg(feature = "loom")]
pub(crate) use loom::sync::MutexGuard;

#[cfg(all(test, feature = "loom"))]
pub(crate) use loom::thread;

/// `loom::sync::Mutex` with the `parking_lot` locking signature.
#[cfg(feature = "loom")]
pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

#[cfg(feature = "loom")]
impl<T> Mutex<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(loom::sync::Mutex::new(value))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        // A panic while holding the lock already failed the model.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
