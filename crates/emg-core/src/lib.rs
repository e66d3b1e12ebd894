//! Runtime plumbing shared by the EMG crates.
//!
//! Provides the logging subsystem, a clock-agnostic timer queue, and the
//! layer-visibility sink the animation engine writes into.

pub mod logging;
pub mod scheduler;
pub mod visibility;
