//! Linear Kalman filter over a 2D position with wall-distance sensing.
//!
//! The filter tracks a point inside a fixed rectangular region. The
//! sensor reads the distance to the far boundary along each axis, so
//! the observation model is the affine map `z = walls + H * x` with
//! `H = -I`. Both Jacobians are explicit parameters rather than
//! hard-coded constants so a nonlinear variant only needs to supply
//! different matrices.
//!
//! One cycle runs predict -> measure -> innovate -> gain -> correct.
//! [`WallFilter::step`] commits all fields atomically: a failing cycle
//! leaves the filter exactly as it was. The type is not meant to be
//! shared across threads; use one instance per estimation stream.

use serde::{Deserialize, Serialize};

use crate::types::{Mat2, Vec2};

use super::error::{FilterError, FilterResult};

/// Relative tolerance for symmetry and conditioning checks.
pub const DEFAULT_CONDITION_TOLERANCE: f64 = 1e-9;

/// A Gaussian belief over position: mean and 2x2 covariance.
#[derive(Clone, Copy, Debug)]
pub struct Belief {
    pub mean: Vec2,
    pub covariance: Mat2,
}

/// Construction parameters for [`WallFilter`].
///
/// Defaults reproduce the demo scenario: a 20x10 region, the point at
/// (10, 4), and an initial belief offset by (1, -0.5) from the truth.
#[derive(Clone, Copy, Debug)]
pub struct FilterConfig {
    /// Region extent (width, height). Fixed for the lifetime of a run.
    pub walls: Vec2,
    /// Ground-truth starting position.
    pub initial_state: Vec2,
    /// Initial belief mean.
    pub initial_mean: Vec2,
    /// Initial belief covariance. Must be symmetric PSD.
    pub initial_covariance: Mat2,
    /// Motion Jacobian G (identity in the linear demo).
    pub motion_jacobian: Mat2,
    /// Measurement Jacobian H (negated identity in the linear demo).
    pub measurement_jacobian: Mat2,
    /// Relative tolerance for symmetry / conditioning checks.
    pub condition_tolerance: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            walls: Vec2::new(20.0, 10.0),
            initial_state: Vec2::new(10.0, 4.0),
            initial_mean: Vec2::new(11.0, 3.5),
            initial_covariance: Mat2::new(0.4, 0.1, 0.1, 0.5),
            motion_jacobian: Mat2::identity(),
            measurement_jacobian: -Mat2::identity(),
            condition_tolerance: DEFAULT_CONDITION_TOLERANCE,
        }
    }
}

/// Per-step inputs. Noise vectors are pre-drawn by the caller; the
/// filter itself never samples randomness.
#[derive(Clone, Copy, Debug)]
pub struct StepInput {
    pub control: Vec2,
    pub process_noise: Vec2,
    pub measurement_noise: Vec2,
    pub process_noise_cov: Mat2,
    pub measurement_noise_cov: Mat2,
}

impl StepInput {
    /// All-zero vectors with the given noise covariances. Handy for
    /// deterministic runs.
    pub fn noiseless(process_noise_cov: Mat2, measurement_noise_cov: Mat2) -> Self {
        Self {
            control: Vec2::zeros(),
            process_noise: Vec2::zeros(),
            measurement_noise: Vec2::zeros(),
            process_noise_cov,
            measurement_noise_cov,
        }
    }
}

/// Read-only snapshot of everything the renderer and the session log
/// need after a step. Valid until the next step call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterSnapshot {
    pub step: u64,
    pub true_position: (f64, f64),
    pub predicted_mean: (f64, f64),
    pub predicted_covariance: [[f64; 2]; 2],
    pub measurement: (f64, f64),
    pub innovation: (f64, f64),
    pub corrected_mean: (f64, f64),
    pub corrected_covariance: [[f64; 2]; 2],
    pub covariance_trace: f64,
}

/// The estimator core. Owns the true position, the control input, and
/// the belief before and after each correction.
#[derive(Clone, Debug)]
pub struct WallFilter {
    walls: Vec2,
    state: Vec2,
    control: Vec2,
    motion_jacobian: Mat2,
    measurement_jacobian: Mat2,
    predicted: Belief,
    corrected: Belief,
    measurement: Vec2,
    predicted_measurement: Vec2,
    innovation: Vec2,
    innovation_covariance: Mat2,
    kalman_gain: Mat2,
    condition_tolerance: f64,
    step_count: u64,
}

impl WallFilter {
    /// Build a filter from `config`, rejecting a non-symmetric or
    /// non-PSD initial covariance at the boundary.
    pub fn new(config: FilterConfig) -> FilterResult<Self> {
        validate_covariance(
            "initial belief",
            &config.initial_covariance,
            config.condition_tolerance,
        )?;
        let belief = Belief {
            mean: config.initial_mean,
            covariance: config.initial_covariance,
        };
        let mut filter = Self {
            walls: config.walls,
            state: config.initial_state,
            control: Vec2::zeros(),
            motion_jacobian: config.motion_jacobian,
            measurement_jacobian: config.measurement_jacobian,
            predicted: belief,
            corrected: belief,
            measurement: Vec2::zeros(),
            predicted_measurement: Vec2::zeros(),
            innovation: Vec2::zeros(),
            innovation_covariance: Mat2::zeros(),
            kalman_gain: Mat2::zeros(),
            condition_tolerance: config.condition_tolerance,
            step_count: 0,
        };
        // Noise-free sensor readings so the display has something
        // sensible before the first trigger.
        filter.measurement = filter.observe(filter.state);
        filter.predicted_measurement = filter.observe(filter.corrected.mean);
        Ok(filter)
    }

    /// Apply the affine sensor model to a position:
    /// `z = walls + H * x`, i.e. distance to the far wall per axis.
    fn observe(&self, position: Vec2) -> Vec2 {
        self.walls + self.measurement_jacobian * position
    }

    pub fn set_control(&mut self, control: Vec2) {
        self.control = control;
    }

    /// Move the real system: `state += control + noise`.
    ///
    /// Intentionally unclamped; the true position may wander outside
    /// the nominal region.
    pub fn advance_truth(&mut self, process_noise: Vec2) {
        self.state += self.control + process_noise;
    }

    /// Predict step: `mu_bar = G * mu + u`,
    /// `sigma_bar = G * sigma * G^T + R_proc`.
    pub fn predict(&mut self, process_noise_cov: Mat2) -> FilterResult<()> {
        validate_covariance("process noise", &process_noise_cov, self.condition_tolerance)?;
        let g = self.motion_jacobian;
        self.predicted.mean = g * self.corrected.mean + self.control;
        self.predicted.covariance = g * self.corrected.covariance * g.transpose() + process_noise_cov;
        Ok(())
    }

    /// Read the physical sensor: `z = walls + H * state + noise`.
    pub fn measure_truth(&mut self, measurement_noise: Vec2) {
        self.measurement = self.observe(self.state) + measurement_noise;
    }

    /// Innovation and its covariance from the predicted belief:
    /// `nu = z - (walls + H * mu_bar)`,
    /// `S = H * sigma_bar * H^T + Q_meas`.
    pub fn innovate(&mut self, measurement_noise_cov: Mat2) -> FilterResult<()> {
        validate_covariance(
            "measurement noise",
            &measurement_noise_cov,
            self.condition_tolerance,
        )?;
        let h = self.measurement_jacobian;
        self.predicted_measurement = self.observe(self.predicted.mean);
        self.innovation = self.measurement - self.predicted_measurement;
        self.innovation_covariance =
            h * self.predicted.covariance * h.transpose() + measurement_noise_cov;
        Ok(())
    }

    /// Gain and correction: `K = sigma_bar * H^T * S^-1`,
    /// `mu' = mu_bar + K * nu`, `sigma' = (I - K * H) * sigma_bar`.
    ///
    /// Inverting `S` is the one numerically hazardous operation in the
    /// core; a singular or ill-conditioned `S` is reported as an error
    /// and the corrected belief keeps its previous value.
    pub fn correct(&mut self) -> FilterResult<()> {
        let s = self.innovation_covariance;
        let det = s.determinant();
        let scale = s.amax();
        if det.abs() <= self.condition_tolerance * scale * scale {
            return Err(FilterError::SingularInnovation { determinant: det });
        }
        let s_inv = s
            .try_inverse()
            .ok_or(FilterError::SingularInnovation { determinant: det })?;

        let h = self.measurement_jacobian;
        let k = self.predicted.covariance * h.transpose() * s_inv;
        let mean = self.predicted.mean + k * self.innovation;
        let cov = (Mat2::identity() - k * h) * self.predicted.covariance;
        // Fold numerical drift back into a symmetric matrix; over many
        // cycles the product form can lose symmetry in the last bits.
        let cov = (cov + cov.transpose()) * 0.5;

        self.kalman_gain = k;
        self.corrected = Belief {
            mean,
            covariance: cov,
        };
        Ok(())
    }

    /// Run one complete predict-update cycle.
    ///
    /// The cycle is atomic: it runs on a scratch copy and commits only
    /// on success, so any error leaves every field (truth included)
    /// untouched.
    pub fn step(&mut self, input: &StepInput) -> FilterResult<FilterSnapshot> {
        let mut next = self.clone();
        next.control = input.control;
        next.advance_truth(input.process_noise);
        next.predict(input.process_noise_cov)?;
        next.measure_truth(input.measurement_noise);
        next.innovate(input.measurement_noise_cov)?;
        next.correct()?;
        next.step_count += 1;
        *self = next;
        Ok(self.snapshot())
    }

    /// Current state of everything the display and the session log
    /// consume. Pure read, no formatting.
    pub fn snapshot(&self) -> FilterSnapshot {
        FilterSnapshot {
            step: self.step_count,
            true_position: (self.state.x, self.state.y),
            predicted_mean: (self.predicted.mean.x, self.predicted.mean.y),
            predicted_covariance: mat_rows(&self.predicted.covariance),
            measurement: (self.measurement.x, self.measurement.y),
            innovation: (self.innovation.x, self.innovation.y),
            corrected_mean: (self.corrected.mean.x, self.corrected.mean.y),
            corrected_covariance: mat_rows(&self.corrected.covariance),
            covariance_trace: self.corrected.covariance.trace(),
        }
    }

    // ===== Read-only accessors =====

    pub fn walls(&self) -> Vec2 {
        self.walls
    }

    pub fn true_position(&self) -> Vec2 {
        self.state
    }

    pub fn control(&self) -> Vec2 {
        self.control
    }

    pub fn predicted(&self) -> &Belief {
        &self.predicted
    }

    pub fn corrected(&self) -> &Belief {
        &self.corrected
    }

    pub fn measurement(&self) -> Vec2 {
        self.measurement
    }

    pub fn predicted_measurement(&self) -> Vec2 {
        self.predicted_measurement
    }

    pub fn innovation(&self) -> Vec2 {
        self.innovation
    }

    pub fn innovation_covariance(&self) -> Mat2 {
        self.innovation_covariance
    }

    pub fn kalman_gain(&self) -> Mat2 {
        self.kalman_gain
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }
}

fn mat_rows(m: &Mat2) -> [[f64; 2]; 2] {
    [[m[(0, 0)], m[(0, 1)]], [m[(1, 0)], m[(1, 1)]]]
}

/// Reject a covariance that is not symmetric or not PSD, relative to
/// the magnitude of its entries.
pub(crate) fn validate_covariance(name: &'static str, m: &Mat2, tol: f64) -> FilterResult<()> {
    let scale = m.amax().max(1.0);
    let skew = (m[(0, 1)] - m[(1, 0)]).abs();
    if skew > tol * scale {
        return Err(FilterError::NonSymmetric { name, skew });
    }
    // 2x2 PSD check: non-negative diagonal and determinant
    if m[(0, 0)] < -tol * scale
        || m[(1, 1)] < -tol * scale
        || m.determinant() < -tol * scale * scale
    {
        return Err(FilterError::NotPositiveSemiDefinite { name });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn demo_noise_covs() -> (Mat2, Mat2) {
        (Mat2::new(0.3, 0.0, 0.0, 0.4), Mat2::new(0.4, 0.0, 0.0, 0.4))
    }

    fn demo_filter() -> WallFilter {
        WallFilter::new(FilterConfig::default()).unwrap()
    }

    #[test]
    fn predicted_mean_adds_control() {
        let mut filter = demo_filter();
        let (r_proc, _) = demo_noise_covs();
        filter.set_control(Vec2::new(1.5, -2.25));
        filter.predict(r_proc).unwrap();
        let mu_bar = filter.predicted().mean;
        assert_relative_eq!(mu_bar.x, 11.0 + 1.5, max_relative = 1e-12);
        assert_relative_eq!(mu_bar.y, 3.5 - 2.25, max_relative = 1e-12);
    }

    #[test]
    fn predicted_covariance_adds_process_noise() {
        let mut filter = demo_filter();
        let (r_proc, _) = demo_noise_covs();
        filter.predict(r_proc).unwrap();
        let sigma_bar = filter.predicted().covariance;
        let expected = Mat2::new(0.7, 0.1, 0.1, 0.9);
        assert_relative_eq!(sigma_bar, expected, max_relative = 1e-12);
    }

    #[test]
    fn demo_scenario_matches_hand_computation() {
        let mut filter = demo_filter();
        let (r_proc, q_meas) = demo_noise_covs();
        let snapshot = filter.step(&StepInput::noiseless(r_proc, q_meas)).unwrap();

        assert_eq!(snapshot.true_position, (10.0, 4.0));
        assert_relative_eq!(snapshot.predicted_mean.0, 11.0, max_relative = 1e-12);
        assert_relative_eq!(snapshot.predicted_mean.1, 3.5, max_relative = 1e-12);
        assert_relative_eq!(snapshot.predicted_covariance[0][0], 0.7, max_relative = 1e-12);
        assert_relative_eq!(snapshot.predicted_covariance[0][1], 0.1, max_relative = 1e-12);
        assert_relative_eq!(snapshot.predicted_covariance[1][1], 0.9, max_relative = 1e-12);
        assert_relative_eq!(snapshot.measurement.0, 10.0, max_relative = 1e-12);
        assert_relative_eq!(snapshot.measurement.1, 6.0, max_relative = 1e-12);
        assert_relative_eq!(filter.predicted_measurement().x, 9.0, max_relative = 1e-12);
        assert_relative_eq!(filter.predicted_measurement().y, 6.5, max_relative = 1e-12);
        assert_relative_eq!(snapshot.innovation.0, 1.0, max_relative = 1e-12);
        assert_relative_eq!(snapshot.innovation.1, -0.5, max_relative = 1e-12);

        // S = sigma_bar + Q = [[1.1, 0.1], [0.1, 1.3]], det = 1.42
        // K nu = (-0.88 / 1.42, 0.45 / 1.42)
        let (mx, my) = snapshot.corrected_mean;
        assert_relative_eq!(mx, 11.0 - 0.88 / 1.42, max_relative = 1e-9);
        assert_relative_eq!(my, 3.5 + 0.45 / 1.42, max_relative = 1e-9);

        // Corrected mean lies strictly between the prediction and the
        // position implied by the raw measurement (walls - z = (10, 4)).
        assert!(mx > 10.0 && mx < 11.0);
        assert!(my > 3.5 && my < 4.0);

        // Information gain: trace strictly shrinks.
        let predicted_trace =
            snapshot.predicted_covariance[0][0] + snapshot.predicted_covariance[1][1];
        assert!(snapshot.covariance_trace < predicted_trace);
        assert_relative_eq!(snapshot.covariance_trace, 0.529577464788732, max_relative = 1e-9);
    }

    #[test]
    fn zero_noise_holds_truth_and_converges() {
        let mut filter = demo_filter();
        let (r_proc, q_meas) = demo_noise_covs();
        let input = StepInput::noiseless(r_proc, q_meas);

        let mut previous_error = (filter.corrected().mean - filter.true_position()).norm();
        for _ in 0..50 {
            filter.step(&input).unwrap();
            assert_eq!(filter.true_position(), Vec2::new(10.0, 4.0));
            let error = (filter.corrected().mean - filter.true_position()).norm();
            assert!(error <= previous_error + 1e-12);
            previous_error = error;
        }
        // With noiseless inputs the estimate settles onto the truth.
        assert!(previous_error < 1e-6);
    }

    #[test]
    fn perfect_belief_tracks_truth_exactly() {
        let config = FilterConfig {
            initial_state: Vec2::new(10.0, 4.0),
            initial_mean: Vec2::new(10.0, 4.0),
            initial_covariance: Mat2::zeros(),
            ..FilterConfig::default()
        };
        let mut filter = WallFilter::new(config).unwrap();
        let input = StepInput {
            control: Vec2::new(0.5, 0.25),
            process_noise: Vec2::zeros(),
            measurement_noise: Vec2::zeros(),
            process_noise_cov: Mat2::zeros(),
            measurement_noise_cov: Mat2::new(0.4, 0.0, 0.0, 0.4),
        };
        let snapshot = filter.step(&input).unwrap();
        // Zero predicted covariance means zero gain: the belief follows
        // the motion model exactly and lands on the new truth.
        assert_relative_eq!(snapshot.corrected_mean.0, 10.5, max_relative = 1e-12);
        assert_relative_eq!(snapshot.corrected_mean.1, 4.25, max_relative = 1e-12);
        assert_eq!(snapshot.corrected_mean, snapshot.true_position);
    }

    #[test]
    fn covariances_stay_symmetric_under_random_psd_inputs() {
        let mut rng = StdRng::seed_from_u64(7);
        let random_psd = |rng: &mut StdRng| {
            let a = Mat2::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            a * a.transpose() + Mat2::identity() * 0.01
        };

        for _ in 0..100 {
            let config = FilterConfig {
                initial_covariance: random_psd(&mut rng),
                ..FilterConfig::default()
            };
            let mut filter = WallFilter::new(config).unwrap();
            let input = StepInput {
                control: Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)),
                process_noise: Vec2::new(rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3)),
                measurement_noise: Vec2::new(rng.gen_range(-0.3..0.3), rng.gen_range(-0.3..0.3)),
                process_noise_cov: random_psd(&mut rng),
                measurement_noise_cov: random_psd(&mut rng),
            };
            filter.step(&input).unwrap();

            let s = filter.innovation_covariance();
            assert_relative_eq!(s[(0, 1)], s[(1, 0)], max_relative = 1e-12);
            let p = filter.corrected().covariance;
            assert_relative_eq!(p[(0, 1)], p[(1, 0)], max_relative = 1e-12);
            // PSD survives the correction
            assert!(p[(0, 0)] >= 0.0 && p[(1, 1)] >= 0.0);
            assert!(p.determinant() >= -1e-12);
        }
    }

    #[test]
    fn singular_innovation_is_reported_not_propagated() {
        let config = FilterConfig {
            initial_covariance: Mat2::zeros(),
            ..FilterConfig::default()
        };
        let mut filter = WallFilter::new(config).unwrap();
        let before = filter.snapshot();
        let err = filter
            .step(&StepInput::noiseless(Mat2::zeros(), Mat2::zeros()))
            .unwrap_err();
        assert!(matches!(err, FilterError::SingularInnovation { .. }));
        // Failed cycle commits nothing.
        let after = filter.snapshot();
        assert_eq!(before.true_position, after.true_position);
        assert_eq!(before.corrected_mean, after.corrected_mean);
        assert_eq!(after.step, 0);
    }

    #[test]
    fn ill_conditioned_innovation_is_rejected() {
        let mut filter = demo_filter();
        // Force S ~ [[1, 1], [1, 1 + 1e-12]]: relative determinant far
        // below the tolerance.
        filter.innovation_covariance = Mat2::new(1.0, 1.0, 1.0, 1.0 + 1e-12);
        let err = filter.correct().unwrap_err();
        assert!(matches!(err, FilterError::SingularInnovation { .. }));
    }

    #[test]
    fn asymmetric_noise_covariance_is_rejected() {
        let mut filter = demo_filter();
        let bad = Mat2::new(0.3, 0.2, -0.2, 0.4);
        let err = filter.predict(bad).unwrap_err();
        assert!(matches!(err, FilterError::NonSymmetric { .. }));
        let err = filter.innovate(bad).unwrap_err();
        assert!(matches!(err, FilterError::NonSymmetric { .. }));
    }

    #[test]
    fn negative_covariance_is_rejected() {
        let bad = Mat2::new(-0.1, 0.0, 0.0, 0.4);
        let config = FilterConfig {
            initial_covariance: bad,
            ..FilterConfig::default()
        };
        let err = WallFilter::new(config).unwrap_err();
        assert!(matches!(err, FilterError::NotPositiveSemiDefinite { .. }));

        let mut filter = demo_filter();
        // Positive diagonal but indefinite (det < 0)
        let indefinite = Mat2::new(0.1, 0.5, 0.5, 0.1);
        let err = filter.predict(indefinite).unwrap_err();
        assert!(matches!(err, FilterError::NotPositiveSemiDefinite { .. }));
    }

    #[test]
    fn truth_is_never_clamped_to_the_walls() {
        let mut filter = demo_filter();
        let (r_proc, q_meas) = demo_noise_covs();
        let mut input = StepInput::noiseless(r_proc, q_meas);
        input.control = Vec2::new(6.0, 4.0);
        for _ in 0..3 {
            filter.step(&input).unwrap();
        }
        // (10, 4) + 3 * (6, 4) = (28, 16): well past the 20x10 region.
        assert_relative_eq!(filter.true_position().x, 28.0, max_relative = 1e-12);
        assert_relative_eq!(filter.true_position().y, 16.0, max_relative = 1e-12);
    }
}
