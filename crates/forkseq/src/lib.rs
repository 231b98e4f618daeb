#![cfg_attr(not(feature = "loom"), doc = include_str!("../README.md"))]
// Doc examples build real views, which loom types only allow inside a model.
#![cfg_attr(feature = "loom", doc = "Forkable lazy views (loom model-checking build).")]
#![forbid(unsafe_code)]

pub mod error;
mod registry;
pub mod source;
pub mod state;
mod sync;
pub mod view;

pub use error::SeqError;
pub use source::{FnSource, IterSource, PullSource, from_fn};
pub use state::{Config, DEFAULT_INITIAL_CAPACITY, DEFAULT_SHRINK_SLACK, Phase, SharedStats};
pub use view::{IntoIter, Iter, Slice, View, new_view};
