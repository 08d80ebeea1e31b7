// SPDX-License-Identifier: AGPL-3.0-only

//! Precision-drift comparison between two f64-promoted trajectories.
//!
//! The reference side is the f64 run; the candidate is the reduced
//! precision run promoted to f64. Comparison is strict about shape: a
//! depth or dimension disagreement is an error, never a truncation — a
//! pair of runs that recorded different shapes was misconfigured, and a
//! silently clipped comparison would report meaningless drift.
//!
//! Per-bounce coefficient error is relative, dividing by the reference
//! norm plus a small epsilon so a zero-norm reference bounce produces a
//! large finite value rather than a division by zero. The final
//! reconstruction error is the plain L2 norm of the difference, and
//! reductions propagate NaN: a diverged bounce poisons the scalar
//! summary instead of being quietly dropped.

use crate::artifacts::{ArtifactEmitter, MatrixArtifact, TrajectoryArtifact, TRAJECTORY_FILE};
use crate::error::FrstaError;
use crate::tolerances::DRIFT_EPSILON;
use crate::transport::Trajectory;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scalar drift summary of one chain under one configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftMetrics {
    /// Absolute L2 norm of the difference between the final
    /// reconstructions (the coefficient curve is relative; this one is
    /// not).
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub final_l2_reconstruction_error: f64,
    /// Largest per-bounce relative coefficient error (NaN propagates).
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub max_relative_coeff_error: f64,
}

/// Full drift record: per-bounce curves plus the scalar summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftRecord {
    /// Reference-minus-candidate coefficient history, depth × M.
    pub coeff_diff: MatrixArtifact,
    /// Per-bounce relative coefficient error.
    #[serde(deserialize_with = "crate::artifacts::nan_vec")]
    pub rel_error_curve: Vec<f64>,
    /// Per-bounce spectral-radius difference (reference minus candidate).
    #[serde(deserialize_with = "crate::artifacts::nan_vec")]
    pub spectral_radius_drift: Vec<f64>,
    /// Pointwise difference of the final reconstructions.
    #[serde(deserialize_with = "crate::artifacts::nan_vec")]
    pub reconstruction_diff: Vec<f64>,
    /// Scalar summary.
    pub metrics: DriftMetrics,
}

/// Compare a candidate trajectory against its reference.
///
/// # Errors
///
/// `ShapeMismatch` if depth, coefficient dimension, or reconstruction
/// length disagree.
pub fn compare_trajectories(
    reference: &Trajectory<f64>,
    candidate: &Trajectory<f64>,
) -> Result<DriftRecord, FrstaError> {
    if reference.depth() != candidate.depth() {
        return Err(FrstaError::ShapeMismatch(format!(
            "depth {} vs {}",
            reference.depth(),
            candidate.depth()
        )));
    }
    if reference.dim() != candidate.dim() {
        return Err(FrstaError::ShapeMismatch(format!(
            "coefficient dimension {} vs {}",
            reference.dim(),
            candidate.dim()
        )));
    }
    if reference.final_reconstruction.len() != candidate.final_reconstruction.len() {
        return Err(FrstaError::ShapeMismatch(format!(
            "reconstruction length {} vs {}",
            reference.final_reconstruction.len(),
            candidate.final_reconstruction.len()
        )));
    }

    let depth = reference.depth();
    let coeff_diff = &reference.coeff_history - &candidate.coeff_history;

    let mut rel_error_curve = Vec::with_capacity(depth);
    let mut spectral_radius_drift = Vec::with_capacity(depth);
    for b in 0..depth {
        let diff_norm = coeff_diff.row(b).norm();
        let ref_norm = reference.coeff_history.row(b).norm();
        rel_error_curve.push(diff_norm / (ref_norm + DRIFT_EPSILON));
        spectral_radius_drift
            .push(reference.spectral_radius_curve[b] - candidate.spectral_radius_curve[b]);
    }

    let recon_diff = &reference.final_reconstruction - &candidate.final_reconstruction;
    let final_l2 = recon_diff.norm();

    let max_rel = rel_error_curve
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, crate::transport::nan_max);

    Ok(DriftRecord {
        coeff_diff: MatrixArtifact::from_matrix(&coeff_diff),
        rel_error_curve,
        spectral_radius_drift,
        reconstruction_diff: recon_diff.iter().copied().collect(),
        metrics: DriftMetrics {
            final_l2_reconstruction_error: final_l2,
            max_relative_coeff_error: max_rel,
        },
    })
}

/// Load two persisted runs and compare them (reference first).
///
/// # Errors
///
/// `Artifact` if either trajectory fails to load, `ShapeMismatch` from
/// the comparison itself.
pub fn compare_runs(ref_dir: &Path, cmp_dir: &Path) -> Result<DriftRecord, FrstaError> {
    let reference: TrajectoryArtifact =
        ArtifactEmitter::new(ref_dir).load_json(TRAJECTORY_FILE)?;
    let candidate: TrajectoryArtifact =
        ArtifactEmitter::new(cmp_dir).load_json(TRAJECTORY_FILE)?;
    compare_trajectories(&reference.into_trajectory()?, &candidate.into_trajectory()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StabilityMetrics;
    use nalgebra::{DMatrix, DVector};

    fn stability() -> StabilityMetrics {
        StabilityMetrics {
            first_nan_bounce: -1,
            first_inf_bounce: -1,
            max_norm: 1.0,
            min_norm: 0.4,
            final_spectral_radius: 1.0,
            max_singular_value: 1.0,
            min_singular_value: 1.0,
        }
    }

    fn trajectory_from_history(history: DMatrix<f64>) -> Trajectory<f64> {
        let depth = history.nrows();
        let final_coeffs: DVector<f64> = history.row(depth - 1).transpose();
        Trajectory {
            coeff_history: history,
            norm_curve: DVector::zeros(depth),
            energy_curve: DVector::zeros(depth),
            singular_history: DMatrix::zeros(depth, 2),
            spectral_radius_curve: DVector::from_element(depth, 1.0),
            final_reconstruction: final_coeffs.clone(),
            final_coeffs,
            stability: stability(),
        }
    }

    #[test]
    fn identical_trajectories_have_zero_drift() {
        let h = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.5, 0.1, 0.25, 0.05]);
        let t = trajectory_from_history(h);
        let record = compare_trajectories(&t, &t.clone()).unwrap();
        assert!(record.rel_error_curve.iter().all(|&e| e == 0.0));
        assert!(record.spectral_radius_drift.iter().all(|&e| e == 0.0));
        assert_eq!(record.metrics.max_relative_coeff_error, 0.0);
        assert_eq!(record.metrics.final_l2_reconstruction_error, 0.0);
    }

    #[test]
    fn worked_two_bounce_example() {
        let reference = trajectory_from_history(DMatrix::from_row_slice(
            2,
            2,
            &[1.0, 0.0, 0.5, 0.0],
        ));
        let candidate = trajectory_from_history(DMatrix::from_row_slice(
            2,
            2,
            &[1.0, 0.0, 0.4, 0.0],
        ));
        let record = compare_trajectories(&reference, &candidate).unwrap();
        assert!((record.rel_error_curve[0] - 0.0).abs() < 1e-12);
        // ‖[0.1, 0]‖ / (‖[0.5, 0]‖ + ε) = 0.2
        assert!((record.rel_error_curve[1] - 0.2).abs() < 1e-12);
        assert!((record.metrics.max_relative_coeff_error - 0.2).abs() < 1e-12);
    }

    #[test]
    fn depth_mismatch_rejected() {
        let a = trajectory_from_history(DMatrix::zeros(3, 2));
        let b = trajectory_from_history(DMatrix::zeros(2, 2));
        let err = compare_trajectories(&a, &b).unwrap_err();
        assert!(matches!(err, FrstaError::ShapeMismatch(msg) if msg.contains("depth")));
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let a = trajectory_from_history(DMatrix::zeros(2, 2));
        let b = trajectory_from_history(DMatrix::zeros(2, 3));
        let err = compare_trajectories(&a, &b).unwrap_err();
        assert!(matches!(err, FrstaError::ShapeMismatch(msg) if msg.contains("dimension")));
    }

    #[test]
    fn zero_reference_bounce_stays_finite() {
        let reference = trajectory_from_history(DMatrix::from_row_slice(
            2,
            2,
            &[0.0, 0.0, 1.0, 0.0],
        ));
        let candidate = trajectory_from_history(DMatrix::from_row_slice(
            2,
            2,
            &[1e-8, 0.0, 1.0, 0.0],
        ));
        let record = compare_trajectories(&reference, &candidate).unwrap();
        assert!(record.rel_error_curve[0].is_finite());
        assert!(record.rel_error_curve[0] > 1.0, "epsilon guard yields large finite error");
    }

    #[test]
    fn nan_bounce_poisons_the_max() {
        let mut ref_h = DMatrix::from_element(3, 2, 1.0);
        let mut cand_h = DMatrix::from_element(3, 2, 1.0);
        ref_h[(2, 0)] = f64::NAN;
        cand_h[(1, 0)] = 1.1;
        cand_h[(2, 0)] = f64::NAN;
        let record = compare_trajectories(
            &trajectory_from_history(ref_h),
            &trajectory_from_history(cand_h),
        )
        .unwrap();
        // The finite bounces still report their own errors.
        let expected = 0.1 / (2.0_f64.sqrt() + DRIFT_EPSILON);
        assert!((record.rel_error_curve[1] - expected).abs() < 1e-12);
        assert!(record.rel_error_curve[2].is_nan());
        assert!(
            record.metrics.max_relative_coeff_error.is_nan(),
            "a diverged bounce must poison the scalar summary"
        );
    }

    #[test]
    fn final_reconstruction_error_is_an_absolute_norm() {
        // Final reconstructions differ by exactly [1, 0]; the metric is
        // ‖diff‖ = 1, not ‖diff‖ / ‖reference‖.
        let reference = trajectory_from_history(DMatrix::from_row_slice(
            2,
            2,
            &[1.0, 0.0, 2.0, 0.0],
        ));
        let candidate = trajectory_from_history(DMatrix::from_row_slice(
            2,
            2,
            &[1.0, 0.0, 1.0, 0.0],
        ));
        let record = compare_trajectories(&reference, &candidate).unwrap();
        assert!((record.metrics.final_l2_reconstruction_error - 1.0).abs() < 1e-12);
        assert_eq!(record.reconstruction_diff, vec![1.0, 0.0]);
    }

    #[test]
    fn drift_record_json_round_trip() {
        let reference = trajectory_from_history(DMatrix::from_row_slice(
            2,
            2,
            &[1.0, 0.0, 0.5, 0.0],
        ));
        let candidate = trajectory_from_history(DMatrix::from_row_slice(
            2,
            2,
            &[1.0, 0.0, 0.4, 0.0],
        ));
        let record = compare_trajectories(&reference, &candidate).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: DriftRecord = serde_json::from_str(&json).unwrap();
        assert!((back.metrics.max_relative_coeff_error - 0.2).abs() < 1e-12);
        assert_eq!(back.coeff_diff.rows, 2);
    }
}
