//! Constant-velocity motion filter for carrying tracklet boxes forward.
//!
//! Detections arrive at a lower rate than frames, so on frames without a
//! detection batch a tracklet's box can optionally be extrapolated from its
//! motion history instead of frozen in place. The filter tracks the box
//! center only; box extent is carried unchanged from the last detection.

use ndarray::{Array1, Array2};

/// Kalman filter over state [cx, cy, vx, vy] with position-only measurements.
#[derive(Debug, Clone)]
pub struct MotionFilter {
    transition: Array2<f64>,
    observation: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

/// Per-tracklet filter state.
#[derive(Debug, Clone)]
pub struct MotionState {
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

impl MotionState {
    /// Current estimated box center.
    pub fn center(&self) -> (f32, f32) {
        (self.mean[0] as f32, self.mean[1] as f32)
    }
}

impl Default for MotionFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionFilter {
    pub fn new() -> Self {
        let mut transition = Array2::eye(4);
        transition[[0, 2]] = 1.0;
        transition[[1, 3]] = 1.0;

        let mut observation = Array2::zeros((2, 4));
        observation[[0, 0]] = 1.0;
        observation[[1, 1]] = 1.0;

        Self {
            transition,
            observation,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Start a new state at the given center with zero velocity.
    ///
    /// `extent` is the box height; process noise scales with it so larger
    /// (closer) objects are allowed larger position jumps.
    pub fn initiate(&self, center: (f32, f32), extent: f32) -> MotionState {
        let e = extent.max(1.0) as f64;
        let mean = Array1::from_vec(vec![center.0 as f64, center.1 as f64, 0.0, 0.0]);

        let std = [
            2.0 * self.std_weight_position * e,
            2.0 * self.std_weight_position * e,
            10.0 * self.std_weight_velocity * e,
            10.0 * self.std_weight_velocity * e,
        ];
        let mut covariance = Array2::zeros((4, 4));
        for i in 0..4 {
            covariance[[i, i]] = std[i] * std[i];
        }

        MotionState { mean, covariance }
    }

    /// Advance the state one frame.
    pub fn predict(&self, state: &MotionState, extent: f32) -> MotionState {
        let e = extent.max(1.0) as f64;
        let std = [
            self.std_weight_position * e,
            self.std_weight_position * e,
            self.std_weight_velocity * e,
            self.std_weight_velocity * e,
        ];
        let mut motion_cov = Array2::zeros((4, 4));
        for i in 0..4 {
            motion_cov[[i, i]] = std[i] * std[i];
        }

        let mean = self.transition.dot(&state.mean);
        let covariance =
            self.transition.dot(&state.covariance).dot(&self.transition.t()) + motion_cov;

        MotionState { mean, covariance }
    }

    /// Fold a measured center into the state.
    pub fn update(&self, state: &MotionState, measurement: (f32, f32), extent: f32) -> MotionState {
        let e = extent.max(1.0) as f64;
        let std = [self.std_weight_position * e, self.std_weight_position * e];
        let mut innovation_cov = Array2::zeros((2, 2));
        for i in 0..2 {
            innovation_cov[[i, i]] = std[i] * std[i];
        }

        let projected_mean = self.observation.dot(&state.mean);
        let projected_cov =
            self.observation.dot(&state.covariance).dot(&self.observation.t()) + innovation_cov;

        let measured = Array1::from_vec(vec![measurement.0 as f64, measurement.1 as f64]);
        let innovation = measured - projected_mean;

        // K = P * H^T * S^-1; S is 2x2, inverted via nalgebra to avoid LAPACK.
        let s_inv = invert_2x2(&projected_cov);
        let kalman_gain = state.covariance.dot(&self.observation.t()).dot(&s_inv);

        let mean = &state.mean + &kalman_gain.dot(&innovation);
        let covariance =
            &state.covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        MotionState { mean, covariance }
    }
}

fn invert_2x2(m: &Array2<f64>) -> Array2<f64> {
    let nm = nalgebra::Matrix2::new(m[[0, 0]], m[[0, 1]], m[[1, 0]], m[[1, 1]]);
    let inv = nm.try_inverse().unwrap_or_else(nalgebra::Matrix2::identity);
    let mut res = Array2::zeros((2, 2));
    for i in 0..2 {
        for j in 0..2 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate_centers_state() {
        let filter = MotionFilter::new();
        let state = filter.initiate((100.0, 50.0), 40.0);
        assert_eq!(state.center(), (100.0, 50.0));
    }

    #[test]
    fn test_update_then_predict_extrapolates() {
        let filter = MotionFilter::new();
        let mut state = filter.initiate((100.0, 100.0), 40.0);

        // object moving +10px/frame in x
        for step in 1..=5 {
            state = filter.predict(&state, 40.0);
            state = filter.update(&state, (100.0 + 10.0 * step as f32, 100.0), 40.0);
        }

        let predicted = filter.predict(&state, 40.0);
        let (cx, cy) = predicted.center();
        // extrapolated center keeps moving in x, stays put in y
        assert!(cx > state.center().0 + 1.0, "cx = {cx}");
        assert!((cy - 100.0).abs() < 5.0, "cy = {cy}");
    }
}
