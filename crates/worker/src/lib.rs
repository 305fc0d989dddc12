//! Worker primitives shared by the menubridge crates.
//!
//! - [`spawn`] / [`spawn_cancellable`] / [`spawn_after`]: classified task spawning.
//! - [`GenerationClock`] / [`GenerationToken`]: attempt generations and their cancellation scopes.
//! - [`Backoff`]: bounded exponential retry delays.

mod backoff;
mod class;
mod spawn;
mod token;

pub use backoff::Backoff;
pub use class::TaskClass;
pub use spawn::{spawn, spawn_after, spawn_cancellable};
pub use token::{Generation, GenerationClock, GenerationToken};
