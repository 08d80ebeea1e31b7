// SPDX-License-Identifier: AGPL-3.0-only

//! Bounce-iterated transport simulation.
//!
//! One run repeatedly applies a chain operator to an initial coefficient
//! vector, recording at every bounce: the coefficient snapshot *before*
//! the application, its norm and reconstructed energy, and the diagnostics
//! of the cumulative operator product *after* the application. The run
//! always executes its full configured depth — divergence (the first NaN
//! or Inf in a post-application state) is recorded as a bounce index,
//! never used to abort, because post-divergence behavior is part of what
//! the study observes.
//!
//! Bounce b therefore records the state after b applications: bounce 0 is
//! the initial state, and the radius curve at bounce b is the spectral
//! radius of the (b+1)-fold product.

use crate::diagnostics::{singular_values, spectral_radius};
use crate::error::FrstaError;
use crate::geometry::SpectralBasis;
use crate::operator::{SpectralOperator, SpectralState};
use crate::precision::Real;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Divergence bookkeeping and extremal summaries of one run.
///
/// Bounce indices are first occurrences; `-1` means the event never
/// happened. Extrema propagate NaN: once a history contains a NaN, the
/// scalar extrema are NaN, and the per-bounce curves carry the finite
/// prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityMetrics {
    /// First bounce whose post-application state contained a NaN, or -1.
    pub first_nan_bounce: i64,
    /// First bounce whose post-application state contained an Inf, or -1.
    pub first_inf_bounce: i64,
    /// Largest coefficient norm over the run.
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub max_norm: f64,
    /// Smallest coefficient norm over the run.
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub min_norm: f64,
    /// Spectral radius of the full-depth cumulative product.
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub final_spectral_radius: f64,
    /// Largest singular value across the entire stacked singular history.
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub max_singular_value: f64,
    /// Smallest singular value across the entire stacked singular history.
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub min_singular_value: f64,
}

/// Complete record of one transport run in working precision.
#[derive(Debug, Clone)]
pub struct Trajectory<T: Real> {
    /// Row b: coefficient snapshot at bounce b (depth × M).
    pub coeff_history: DMatrix<T>,
    /// Coefficient norm per bounce.
    pub norm_curve: DVector<T>,
    /// Integrated reconstructed energy per bounce.
    pub energy_curve: DVector<T>,
    /// Row b: singular values of the cumulative product (depth × M).
    pub singular_history: DMatrix<T>,
    /// Spectral radius of the cumulative product per bounce.
    pub spectral_radius_curve: DVector<T>,
    /// Coefficients after the final application.
    pub final_coeffs: DVector<T>,
    /// Reconstruction of the final coefficients on the wavelength grid.
    pub final_reconstruction: DVector<T>,
    /// Divergence and extremal summary.
    pub stability: StabilityMetrics,
}

impl<T: Real> Trajectory<T> {
    /// Number of recorded bounces.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.coeff_history.nrows()
    }

    /// Coefficient dimension M.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.coeff_history.ncols()
    }

    /// Promote every recorded value to f64 for comparison and persistence.
    #[must_use]
    pub fn promote(&self) -> Trajectory<f64> {
        fn pm<T: Real>(m: &DMatrix<T>) -> DMatrix<f64> {
            m.map(|x| x.into())
        }
        fn pv<T: Real>(v: &DVector<T>) -> DVector<f64> {
            v.map(|x| x.into())
        }
        Trajectory {
            coeff_history: pm(&self.coeff_history),
            norm_curve: pv(&self.norm_curve),
            energy_curve: pv(&self.energy_curve),
            singular_history: pm(&self.singular_history),
            spectral_radius_curve: pv(&self.spectral_radius_curve),
            final_coeffs: pv(&self.final_coeffs),
            final_reconstruction: pv(&self.final_reconstruction),
            stability: self.stability.clone(),
        }
    }
}

/// NaN-propagating maximum: any NaN operand poisons the reduction.
pub(crate) fn nan_max(acc: f64, v: f64) -> f64 {
    if acc.is_nan() || v.is_nan() {
        f64::NAN
    } else {
        acc.max(v)
    }
}

/// NaN-propagating minimum.
pub(crate) fn nan_min(acc: f64, v: f64) -> f64 {
    if acc.is_nan() || v.is_nan() {
        f64::NAN
    } else {
        acc.min(v)
    }
}

fn first_non_finite<T: Real>(coeffs: &DVector<T>) -> (bool, bool) {
    let mut saw_nan = false;
    let mut saw_inf = false;
    for &x in coeffs.iter() {
        let v: f64 = x.into();
        if v.is_nan() {
            saw_nan = true;
        } else if v.is_infinite() {
            saw_inf = true;
        }
    }
    (saw_nan, saw_inf)
}

/// Run one transport simulation to `depth` bounces.
///
/// # Errors
///
/// `DimensionMismatch` if `depth` is zero or the initial coefficients do
/// not match the chain dimension; `DecompositionFailure` if a cumulative
/// product with finite entries resists its SVD or Schur iteration.
pub fn run_transport<T: Real>(
    basis: &SpectralBasis<T>,
    chain: &SpectralOperator<T>,
    initial_coeffs: &DVector<T>,
    depth: usize,
) -> Result<Trajectory<T>, FrstaError> {
    if depth == 0 {
        return Err(FrstaError::DimensionMismatch {
            what: "transport depth",
            expected: 1,
            got: 0,
        });
    }
    let m = chain.dim();
    if initial_coeffs.len() != m {
        return Err(FrstaError::DimensionMismatch {
            what: "initial coefficients",
            expected: m,
            got: initial_coeffs.len(),
        });
    }

    let mut state = SpectralState::new(initial_coeffs.clone());
    let mut cumulative = SpectralOperator::<T>::identity(m);

    let mut coeff_history = DMatrix::zeros(depth, m);
    let mut norm_curve = DVector::zeros(depth);
    let mut energy_curve = DVector::zeros(depth);
    let mut singular_history = DMatrix::zeros(depth, m);
    let mut spectral_radius_curve = DVector::zeros(depth);

    let mut first_nan: i64 = -1;
    let mut first_inf: i64 = -1;
    let mut max_norm = f64::NEG_INFINITY;
    let mut min_norm = f64::INFINITY;

    for b in 0..depth {
        coeff_history.row_mut(b).copy_from(&state.coeffs().transpose());
        let norm = state.norm();
        norm_curve[b] = norm;
        let recon = basis.reconstruct(state.coeffs())?;
        energy_curve[b] = basis.domain().integrate(&recon)?;

        let n: f64 = norm.into();
        max_norm = nan_max(max_norm, n);
        min_norm = nan_min(min_norm, n);

        chain.apply(&mut state)?;
        cumulative = chain.compose(&cumulative)?;

        // Divergence is detected on the advanced state; first occurrence
        // only, later bounces never overwrite an index.
        let (saw_nan, saw_inf) = first_non_finite(state.coeffs());
        if saw_nan && first_nan < 0 {
            first_nan = b as i64;
        }
        if saw_inf && first_inf < 0 {
            first_inf = b as i64;
        }

        let sv = singular_values(cumulative.matrix())?;
        singular_history.row_mut(b).copy_from(&sv.transpose());
        spectral_radius_curve[b] = spectral_radius(cumulative.matrix())?;
    }

    // Extrema over the whole stacked history; NaN rows poison them.
    let mut max_sv = f64::NEG_INFINITY;
    let mut min_sv = f64::INFINITY;
    for &s in singular_history.iter() {
        let v: f64 = s.into();
        max_sv = nan_max(max_sv, v);
        min_sv = nan_min(min_sv, v);
    }

    let final_coeffs = state.into_coeffs();
    let final_reconstruction = basis.reconstruct(&final_coeffs)?;
    let final_radius: f64 = spectral_radius_curve[depth - 1].into();

    Ok(Trajectory {
        coeff_history,
        norm_curve,
        energy_curve,
        singular_history,
        spectral_radius_curve,
        final_coeffs,
        final_reconstruction,
        stability: StabilityMetrics {
            first_nan_bounce: first_nan,
            first_inf_bounce: first_inf,
            max_norm,
            min_norm,
            final_spectral_radius: final_radius,
            max_singular_value: max_sv,
            min_singular_value: min_sv,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{lobe_centers, ScalingLaw, SpectralDomain};
    use crate::tolerances::ITERATIVE_F64;

    fn basis_m4() -> SpectralBasis<f64> {
        let domain = SpectralDomain::new(380.0, 780.0, 512);
        SpectralBasis::build(
            &domain,
            &lobe_centers(470.0, 690.0, 2),
            10.0,
            14.0,
            2,
            ScalingLaw::Linear,
            1.0,
        )
        .unwrap()
    }

    fn unit_initial(m: usize) -> DVector<f64> {
        let mut v = DVector::zeros(m);
        v[0] = 1.0;
        v
    }

    #[test]
    fn zero_depth_rejected() {
        let basis = basis_m4();
        let chain = SpectralOperator::identity(4);
        let err = run_transport(&basis, &chain, &unit_initial(4), 0).unwrap_err();
        assert!(matches!(
            err,
            FrstaError::DimensionMismatch { what: "transport depth", .. }
        ));
    }

    #[test]
    fn initial_coeff_length_checked() {
        let basis = basis_m4();
        let chain = SpectralOperator::identity(4);
        assert!(run_transport(&basis, &chain, &unit_initial(3), 5).is_err());
    }

    #[test]
    fn curves_span_full_depth() {
        let basis = basis_m4();
        let chain = SpectralOperator::identity(4);
        let traj = run_transport(&basis, &chain, &unit_initial(4), 7).unwrap();
        assert_eq!(traj.depth(), 7);
        assert_eq!(traj.dim(), 4);
        assert_eq!(traj.norm_curve.len(), 7);
        assert_eq!(traj.energy_curve.len(), 7);
        assert_eq!(traj.spectral_radius_curve.len(), 7);
        assert_eq!(traj.singular_history.nrows(), 7);
        assert_eq!(traj.singular_history.ncols(), 4);
    }

    #[test]
    fn decay_chain_geometric_history() {
        let basis = basis_m4();
        let a = DMatrix::<f64>::identity(4, 4) * 0.9;
        let chain = SpectralOperator::linear(a).unwrap();
        let traj = run_transport(&basis, &chain, &unit_initial(4), 3).unwrap();

        // Snapshots precede each application: 1, 0.9, 0.81.
        for (b, expected) in [1.0, 0.9, 0.81].into_iter().enumerate() {
            assert!(
                (traj.coeff_history[(b, 0)] - expected).abs() < 1e-12,
                "bounce {b} leading coefficient"
            );
            for j in 1..4 {
                assert_eq!(traj.coeff_history[(b, j)], 0.0);
            }
        }
        // Cumulative radius after each application: 0.9, 0.81, 0.729.
        for (b, expected) in [0.9, 0.81, 0.729].into_iter().enumerate() {
            assert!(
                (traj.spectral_radius_curve[b] - expected).abs() < ITERATIVE_F64,
                "bounce {b} cumulative radius"
            );
        }
        assert_eq!(traj.stability.first_nan_bounce, -1);
        assert_eq!(traj.stability.first_inf_bounce, -1);
        assert!((traj.stability.final_spectral_radius - 0.729).abs() < ITERATIVE_F64);
        assert!((traj.stability.max_norm - 1.0).abs() < 1e-12);
        assert!((traj.stability.min_norm - 0.81).abs() < 1e-12);
    }

    #[test]
    fn determinism_bitwise() {
        let basis = basis_m4();
        let a = DMatrix::from_fn(4, 4, |i, j| 0.2 + 0.1 * (i as f64) - 0.05 * (j as f64));
        let chain = SpectralOperator::linear(a).unwrap();
        let t1 = run_transport(&basis, &chain, &unit_initial(4), 10).unwrap();
        let t2 = run_transport(&basis, &chain, &unit_initial(4), 10).unwrap();
        assert_eq!(t1.coeff_history, t2.coeff_history);
        assert_eq!(t1.spectral_radius_curve, t2.spectral_radius_curve);
        assert_eq!(t1.stability, t2.stability);
    }

    #[test]
    fn divergence_recorded_not_aborted() {
        let basis = basis_m4();
        let a = DMatrix::<f64>::identity(4, 4) * 1e100;
        let chain = SpectralOperator::linear(a).unwrap();
        let traj = run_transport(&basis, &chain, &unit_initial(4), 5).unwrap();

        // Post-application states: 1e100, 1e200, 1e300, inf at bounce 3.
        // One bounce later the apply dots [inf, 0, 0, 0] against rows with
        // a zero in the inf slot, 0 * inf = NaN, so NaN arrives at bounce 4.
        assert_eq!(traj.stability.first_inf_bounce, 3);
        assert_eq!(traj.stability.first_nan_bounce, 4);
        assert_eq!(traj.depth(), 5, "run continues to full depth");
        // Post-overflow cumulative products are non-finite; their
        // diagnostics are NaN, and NaN poisons the singular extrema. The
        // NaN state itself is never snapshotted, so the norm extrema span
        // the recorded curve: 1 up to inf.
        assert!(traj.stability.final_spectral_radius.is_nan());
        assert!(traj.stability.max_singular_value.is_nan());
        assert!(traj.stability.min_singular_value.is_nan());
        assert!(traj.stability.max_norm.is_infinite());
        assert!((traj.stability.min_norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn energy_tracks_reconstruction() {
        let basis = basis_m4();
        let chain = SpectralOperator::identity(4);
        let init = DVector::from_vec(vec![0.4, -0.1, 0.2, 0.05]);
        let traj = run_transport(&basis, &chain, &init, 3).unwrap();
        let recon = basis.reconstruct(&init).unwrap();
        let expected = basis.domain().integrate(&recon).unwrap();
        for b in 0..3 {
            assert!(
                (traj.energy_curve[b] - expected).abs() < 1e-12,
                "identity chain keeps energy constant"
            );
        }
    }

    #[test]
    fn promote_preserves_shape_and_values() {
        let domain: SpectralDomain<f32> = SpectralDomain::new(380.0, 780.0, 256);
        let basis = SpectralBasis::<f32>::build(
            &domain,
            &lobe_centers(470.0, 690.0, 2),
            10.0,
            14.0,
            2,
            ScalingLaw::Linear,
            1.0,
        )
        .unwrap();
        let chain = SpectralOperator::<f32>::identity(4);
        let mut init = DVector::<f32>::zeros(4);
        init[0] = 1.0;
        let traj = run_transport(&basis, &chain, &init, 4).unwrap();
        let promoted = traj.promote();
        assert_eq!(promoted.depth(), 4);
        assert_eq!(promoted.dim(), 4);
        let diff = promoted.coeff_history[(0, 0)] - f64::from(traj.coeff_history[(0, 0)]);
        assert_eq!(diff, 0.0);
        assert_eq!(promoted.stability, traj.stability);
    }
}
