//! Periodic background work.

mod sweep;

pub use sweep::SweepTask;
