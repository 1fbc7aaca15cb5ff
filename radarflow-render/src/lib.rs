//!
//! # radarflow-render
//! Sweep computation for weather radar rendering. Converts a polar
//! elevation scan into a flat triangle strip of geographic coordinates plus
//! per-vertex moment values, ready for a downstream vertex-buffer renderer.
//! Supports a smoothing mode that bilinearly remaps gate quads, the
//! SNR-threshold/range-folded data discipline, and color-table lookup
//! tables.
//!

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::correctness)]

mod color;
pub use crate::color::*;

pub mod result;

pub mod sweep;
pub use sweep::{MomentBuffer, SweepBuffers, SweepComputer, SweepOptions};

pub mod view;
pub use view::Level2ProductView;
