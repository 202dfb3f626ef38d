//! Built-in checks.
//!
//! - [`StateRecorder`] snapshots the program state at marker invocations
//!   (`Tag("name", value)`) and at the exit, so that callers can inspect what the
//!   engine knew at labelled points of a body.
//! - [`NullDereference`] reports receivers that are null on some path when they are
//!   dereferenced.

mod null_dereference;
mod recorder;

pub use null_dereference::{NullDereference, NULL_DEREFERENCE_RULE};
pub use recorder::{Recording, StateRecorder, TagSnapshot};
