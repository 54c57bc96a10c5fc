//! Worker primitives shared by the variable scheduler.
//!
//! Update work is classified by [`TaskClass`], spawned through [`spawn`] onto
//! the ambient tokio runtime (or a small fallback runtime when called from
//! synchronous code), and guarded by a [`CancelHandle`] whose generation lets
//! the scheduler discard completions that arrive after a restart.

mod cancel;
mod class;
mod panic;
mod spawn;

pub use cancel::{CancelHandle, GenerationClock};
pub use class::TaskClass;
pub use panic::{join_error_panic_message, panic_message};
pub use spawn::{SpawnError, spawn};
