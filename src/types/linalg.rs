//! Linear algebra type system for the wall tracker
//!
//! Provides compile-time dimension checking and clean type aliases
//! for the 2D estimator. A wrong-sized vector or matrix is a type
//! error here, not a runtime failure.

use nalgebra::{SMatrix, SVector};

// ===== Dimensions =====
pub const STATE_DIM: usize = 2;
pub const MEASURE_DIM: usize = 2;

// ===== State types =====
pub type Vec2 = SVector<f64, STATE_DIM>;
pub type Mat2 = SMatrix<f64, STATE_DIM, STATE_DIM>;

// ===== Measurement types =====
pub type MeasureVec = SVector<f64, MEASURE_DIM>;
pub type MeasureMat = SMatrix<f64, MEASURE_DIM, MEASURE_DIM>;

// Kalman gain maps observation space back into state space
pub type KalmanGainMat = SMatrix<f64, STATE_DIM, MEASURE_DIM>;

// Jacobian types
pub type MotionJacobian = SMatrix<f64, STATE_DIM, STATE_DIM>;
pub type MeasureJacobian = SMatrix<f64, MEASURE_DIM, STATE_DIM>;
