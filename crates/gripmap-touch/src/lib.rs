//! # Gripmap Touch
//!
//! Calibration and live processing for the tactile arrays of a
//! multi-fingered gripper.
//!
//! The raw sensors report unitless counts per taxel. This crate turns
//! those counts into grams in two stages:
//!
//! 1. **Offline calibration** ([`calib`]): press the hand against a
//!    reference load cell, record paired samples, and fit the
//!    gram-per-count scale with a regression through the origin,
//!    using the lowest-force frames as the zero-load baseline.
//! 2. **Live monitoring** ([`pipeline`]): subtract a baseline from
//!    every incoming frame, scale to grams, optionally smooth, and
//!    fold the result into per-region load summaries.
//!
//! Frames arrive through the [`acquisition::FrameSource`] trait from
//! a hardware thread, a recorded session or a synthetic generator,
//! and can be logged to disk with [`session::SessionWriter`] for
//! later replay.

pub mod acquisition;
pub mod aggregate;
pub mod baseline;
pub mod calib;
pub mod frame;
pub mod pipeline;
pub mod records;
pub mod session;
pub mod transform;

pub use acquisition::*;
pub use aggregate::*;
pub use baseline::*;
pub use calib::*;
pub use frame::*;
pub use pipeline::*;
pub use records::*;
pub use session::*;
pub use transform::*;
