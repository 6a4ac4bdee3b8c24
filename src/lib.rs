//! 2D Kalman filter simulation with wall-distance sensing.
//!
//! A point wanders inside a bounded region under noisy control; a
//! linear Kalman filter estimates its position from noisy readings of
//! the distance to the far walls. The estimator core lives in
//! [`filters`] and never touches randomness or the terminal: noise is
//! injected by [`noise`], cycles are sequenced by [`sim`], and frames
//! are drawn by [`display`].

pub mod display;
pub mod filters;
pub mod noise;
pub mod sim;
pub mod types;

pub use filters::error::{FilterError, FilterResult};
pub use filters::wall_kf::{Belief, FilterConfig, FilterSnapshot, StepInput, WallFilter};
