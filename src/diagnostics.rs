// SPDX-License-Identifier: AGPL-3.0-only

//! Operator diagnostics: conditioning, spectral radius, non-normality.
//!
//! All metrics derive from dense decompositions of the operator's linear
//! part. Decompositions are iterative; a non-finite operand (a diverged
//! transport product) would never converge, so non-finite matrices short
//! circuit to NaN metrics instead of erroring — divergence is data in this
//! study, not failure. A *finite* matrix that fails to converge within the
//! sweep cap is a genuine `DecompositionFailure`.

use crate::error::FrstaError;
use crate::operator::SpectralOperator;
use crate::precision::Real;
use crate::tolerances::MAX_DECOMP_SWEEPS;
use nalgebra::linalg::{Schur, SVD};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Scalar diagnostics of one operator, promoted to f64 for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorMetrics {
    /// Largest eigenvalue modulus, from the real Schur form.
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub spectral_radius: f64,
    /// Frobenius norm of the linear part.
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub frobenius_norm: f64,
    /// Ratio of largest to smallest singular value.
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub condition_number: f64,
    /// Commutator defect `‖AᵗA − AAᵗ‖_F`; zero for normal operators.
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub non_normality: f64,
}

/// Full diagnostic bundle: scalar metrics plus the singular spectrum in
/// working precision.
#[derive(Debug, Clone)]
pub struct OperatorDiagnostics<T: Real> {
    /// Promoted scalar metrics.
    pub metrics: OperatorMetrics,
    /// Singular values of the linear part, descending.
    pub singular_values: DVector<T>,
}

fn is_finite_matrix<T: Real>(a: &DMatrix<T>) -> bool {
    a.iter().all(|&x| {
        let v: f64 = x.into();
        v.is_finite()
    })
}

/// Singular values of a square matrix, descending (nalgebra's SVD order).
///
/// A non-finite matrix yields a NaN-filled vector of the right length.
///
/// # Errors
///
/// `DecompositionFailure` if the SVD of a finite matrix does not converge
/// within the sweep cap.
pub fn singular_values<T: Real>(a: &DMatrix<T>) -> Result<DVector<T>, FrstaError> {
    let m = a.nrows().min(a.ncols());
    if !is_finite_matrix(a) {
        return Ok(DVector::from_element(m, T::from_f64_lossy(f64::NAN)));
    }
    let svd = SVD::try_new(
        a.clone(),
        false,
        false,
        T::default_epsilon(),
        MAX_DECOMP_SWEEPS,
    )
    .ok_or_else(|| {
        FrstaError::DecompositionFailure(format!("SVD of {}x{} matrix", a.nrows(), a.ncols()))
    })?;
    Ok(svd.singular_values)
}

/// Spectral radius: the largest eigenvalue modulus, from the real Schur
/// form. NaN for a non-finite matrix.
///
/// # Errors
///
/// `DecompositionFailure` if the Schur iteration on a finite matrix does
/// not converge within the sweep cap.
pub fn spectral_radius<T: Real>(a: &DMatrix<T>) -> Result<T, FrstaError> {
    if !is_finite_matrix(a) {
        return Ok(T::from_f64_lossy(f64::NAN));
    }
    let schur = Schur::try_new(a.clone(), T::default_epsilon(), MAX_DECOMP_SWEEPS).ok_or_else(
        || FrstaError::DecompositionFailure(format!("Schur form of {}x{} matrix", a.nrows(), a.ncols())),
    )?;
    let eigs = schur.complex_eigenvalues();
    let mut radius = T::zero();
    for ev in eigs.iter() {
        // Complex modulus by hand: the scalar here is RealField, not Float.
        let modulus = (ev.re * ev.re + ev.im * ev.im).sqrt();
        if modulus > radius {
            radius = modulus;
        }
    }
    Ok(radius)
}

/// Analyze an operator's linear part: singular spectrum, conditioning,
/// spectral radius, Frobenius norm, and the non-normality defect.
///
/// # Errors
///
/// `DecompositionFailure` from the underlying SVD or Schur iteration on a
/// finite matrix.
pub fn analyze_operator<T: Real>(
    op: &SpectralOperator<T>,
) -> Result<OperatorDiagnostics<T>, FrstaError> {
    let a = op.matrix();
    let sv = singular_values(a)?;
    let radius: f64 = spectral_radius(a)?.into();

    let (cond, fro, defect) = if is_finite_matrix(a) {
        let s_max: f64 = sv[0].into();
        let s_min: f64 = sv[sv.len() - 1].into();
        let fro: f64 = a.norm().into();
        let at_a = a.transpose() * a;
        let a_at = a * a.transpose();
        let defect: f64 = (at_a - a_at).norm().into();
        (s_max / s_min, fro, defect)
    } else {
        (f64::NAN, f64::NAN, f64::NAN)
    };

    Ok(OperatorDiagnostics {
        metrics: OperatorMetrics {
            spectral_radius: radius,
            frobenius_norm: fro,
            condition_number: cond,
            non_normality: defect,
        },
        singular_values: sv,
    })
}
