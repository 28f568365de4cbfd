//! Weighted multilateration from UWB anchor range reports
//!
//! Each anchor constrains the tag to a sphere of radius equal to the
//! measured distance. The solver minimises the weighted sum of squared
//! range residuals with Gauss-Newton iterations on Tikhonov-damped normal
//! equations, seeded by the ranging module's own tag-position estimate.
//! All coordinates and distances are millimetres.

use crate::core::types::{DwmLocationResponse, DwmPosition};
use log::{debug, warn};
use nalgebra::{Matrix3, Vector3};

/// Anchors closer than this to the current estimate contribute no usable
/// range direction
const MIN_RANGE_MM: f64 = 1e-9;

/// Iterative weighted least-squares position solver
pub struct Multilateration {
    /// Maximum Gauss-Newton iterations
    pub max_iterations: usize,
    /// Stop once the step norm (mm) falls below this
    pub convergence_tolerance: f64,
    /// Damping added to the normal-equation diagonal; keeps coplanar or
    /// colinear anchor geometry from producing wild steps along the
    /// unobservable axis
    pub regularization_lambda: f64,
}

impl Default for Multilateration {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_tolerance: 1e-6,
            regularization_lambda: 1e-6,
        }
    }
}

impl Multilateration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the tag position from one location response
    ///
    /// With fewer than three anchors the problem is underdetermined and
    /// the response's own estimate is returned unchanged (possibly
    /// `None`); this is a graceful degradation, not an error.
    pub fn solve(&self, response: &DwmLocationResponse) -> Option<DwmPosition> {
        if response.anchors.len() < 3 {
            debug!(
                "only {} anchors visible, keeping prior position estimate",
                response.anchors.len()
            );
            return response.position;
        }

        let anchors: Vec<Vector3<f64>> = response
            .anchors
            .iter()
            .map(|a| {
                Vector3::new(
                    a.anchor_position.x,
                    a.anchor_position.y,
                    a.anchor_position.z,
                )
            })
            .collect();
        let ranges: Vec<f64> = response.anchors.iter().map(|a| a.distance_mm).collect();
        let weights = self.quality_weights(response);

        let mut estimate = match response.position {
            Some(prior) => Vector3::new(prior.x, prior.y, prior.z),
            // No prior reported: start from the anchor centroid
            None => anchors.iter().sum::<Vector3<f64>>() / anchors.len() as f64,
        };

        for iteration in 0..self.max_iterations {
            let mut jt_w_j = Matrix3::zeros();
            let mut jt_w_r = Vector3::zeros();

            for i in 0..anchors.len() {
                let diff = estimate - anchors[i];
                let predicted = diff.norm();
                if predicted < MIN_RANGE_MM {
                    continue;
                }
                let residual = predicted - ranges[i];
                let direction = diff / predicted;
                jt_w_j += weights[i] * direction * direction.transpose();
                jt_w_r += weights[i] * residual * direction;
            }

            let mut damped = jt_w_j;
            for i in 0..3 {
                damped[(i, i)] += self.regularization_lambda;
            }

            let step = match damped.try_inverse() {
                Some(inverse) => -(inverse * jt_w_r),
                None => {
                    warn!("singular normal equations, keeping current estimate");
                    break;
                }
            };

            estimate += step;
            if step.norm() < self.convergence_tolerance {
                debug!("multilateration converged after {} iterations", iteration + 1);
                break;
            }
        }

        Some(DwmPosition::new(
            estimate.x,
            estimate.y,
            estimate.z,
            self.combined_quality(response),
        ))
    }

    /// Per-anchor weights proportional to the reported quality factors,
    /// normalised to sum one; uniform when every factor is zero
    fn quality_weights(&self, response: &DwmLocationResponse) -> Vec<f64> {
        let raw: Vec<f64> = response
            .anchors
            .iter()
            .map(|a| f64::from(a.quality_factor))
            .collect();
        let total: f64 = raw.iter().sum();
        if total > 0.0 {
            raw.iter().map(|w| w / total).collect()
        } else {
            vec![1.0 / raw.len() as f64; raw.len()]
        }
    }

    /// Confidence of the resolved position: the mean anchor quality factor
    fn combined_quality(&self, response: &DwmLocationResponse) -> u8 {
        let sum: u32 = response
            .anchors
            .iter()
            .map(|a| u32::from(a.quality_factor))
            .sum();
        (sum / response.anchors.len() as u32) as u8
    }
}
