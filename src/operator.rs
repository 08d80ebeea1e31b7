// SPDX-License-Identifier: AGPL-3.0-only

//! Affine operator algebra over spectral coefficient vectors.
//!
//! Operators are built from continuous multiplicative spectral functions by
//! a weighted Galerkin projection against the basis, composed into named
//! chains representing simulated light paths, and optionally conjugated by
//! the whitening change of basis derived from the Gram Cholesky factor.
//!
//! An operator is the immutable affine pair `(A, b)` for `x ↦ A·x + b`;
//! composition always produces a new operator. Physical constructors
//! (absorption, emission, dispersion) are pure functions of the basis
//! geometry: same basis, same operator.

use crate::error::FrstaError;
use crate::geometry::SpectralBasis;
use crate::precision::Real;
use nalgebra::{DMatrix, DVector};

/// Immutable affine operator `(A, b)` on length-M coefficient vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralOperator<T: Real> {
    a: DMatrix<T>,
    b: DVector<T>,
}

impl<T: Real> SpectralOperator<T> {
    /// Wrap an explicit `(A, b)` pair.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `A` is not square or `b` does not match its
    /// side length.
    pub fn new(a: DMatrix<T>, b: DVector<T>) -> Result<Self, FrstaError> {
        if a.nrows() != a.ncols() {
            return Err(FrstaError::DimensionMismatch {
                what: "operator matrix columns",
                expected: a.nrows(),
                got: a.ncols(),
            });
        }
        if b.len() != a.nrows() {
            return Err(FrstaError::DimensionMismatch {
                what: "operator offset",
                expected: a.nrows(),
                got: b.len(),
            });
        }
        Ok(Self { a, b })
    }

    /// A linear operator (zero offset).
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `A` is not square.
    pub fn linear(a: DMatrix<T>) -> Result<Self, FrstaError> {
        let m = a.nrows();
        Self::new(a, DVector::zeros(m))
    }

    /// The identity operator on dimension `m`.
    #[must_use]
    pub fn identity(m: usize) -> Self {
        Self {
            a: DMatrix::identity(m, m),
            b: DVector::zeros(m),
        }
    }

    /// Operator dimension M.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.a.nrows()
    }

    /// The linear part `A`.
    #[must_use]
    pub fn matrix(&self) -> &DMatrix<T> {
        &self.a
    }

    /// The offset `b`.
    #[must_use]
    pub fn offset(&self) -> &DVector<T> {
        &self.b
    }

    /// Compose `self ∘ inner`: apply `inner` first, then `self`.
    ///
    /// `(A_p, b_p) ∘ (A_q, b_q) = (A_p·A_q, A_p·b_q + b_p)`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the operators act on different dimensions.
    pub fn compose(&self, inner: &Self) -> Result<Self, FrstaError> {
        if inner.dim() != self.dim() {
            return Err(FrstaError::DimensionMismatch {
                what: "composed operator",
                expected: self.dim(),
                got: inner.dim(),
            });
        }
        Ok(Self {
            a: &self.a * &inner.a,
            b: &self.a * &inner.b + &self.b,
        })
    }

    /// Apply the affine map in place, advancing the state by one step.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the state dimension differs from M.
    pub fn apply(&self, state: &mut SpectralState<T>) -> Result<(), FrstaError> {
        if state.coeffs.len() != self.dim() {
            return Err(FrstaError::DimensionMismatch {
                what: "state coefficients",
                expected: self.dim(),
                got: state.coeffs.len(),
            });
        }
        state.coeffs = &self.a * &state.coeffs + &self.b;
        Ok(())
    }
}

/// Mutable coefficient vector owned by exactly one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralState<T: Real> {
    coeffs: DVector<T>,
}

impl<T: Real> SpectralState<T> {
    /// Take ownership of an initial coefficient vector.
    #[must_use]
    pub fn new(coeffs: DVector<T>) -> Self {
        Self { coeffs }
    }

    /// Current coefficients.
    #[must_use]
    pub fn coeffs(&self) -> &DVector<T> {
        &self.coeffs
    }

    /// Euclidean norm of the current coefficients.
    #[must_use]
    pub fn norm(&self) -> T {
        self.coeffs.norm()
    }

    /// Consume the state, yielding the final coefficients.
    #[must_use]
    pub fn into_coeffs(self) -> DVector<T> {
        self.coeffs
    }
}

/// Build the multiplication operator for a sampled spectral function `f`:
/// the weighted Galerkin matrix `M = (B ⊙ w ⊙ f)·Bᵗ` solved against the
/// Gram matrix (`G·A = M`, through the Cholesky factor — no inverse).
///
/// Returns an affine operator with zero offset.
///
/// # Errors
///
/// `DimensionMismatch` if `f` does not match the domain sample count.
/// (A singular Gram matrix is rejected earlier, at basis build.)
pub fn build_multiplication_operator<T: Real>(
    basis: &SpectralBasis<T>,
    f: &DVector<T>,
) -> Result<SpectralOperator<T>, FrstaError> {
    let l = basis.domain().len();
    if f.len() != l {
        return Err(FrstaError::DimensionMismatch {
            what: "spectral function samples",
            expected: l,
            got: f.len(),
        });
    }

    let weights = basis.domain().weights();
    let mut weighted = basis.raw().clone();
    for (j, mut col) in weighted.column_iter_mut().enumerate() {
        col *= weights[j] * f[j];
    }
    let galerkin = &weighted * basis.raw().transpose();
    let a = basis.gram_solve(&galerkin);
    SpectralOperator::linear(a)
}

/// Gaussian attenuation centered at 550 nm composed with Beer–Lambert
/// transmission: `exp(−0.8·exp(−(λ−550)²/(2·40²)))`.
pub fn absorption_operator<T: Real>(
    basis: &SpectralBasis<T>,
) -> Result<SpectralOperator<T>, FrstaError> {
    let two = T::from_f64_lossy(2.0);
    let center = T::from_f64_lossy(550.0);
    let width = T::from_f64_lossy(40.0);
    let depth = T::from_f64_lossy(0.8);
    let f = basis.domain().lambda().map(|l| {
        let d = l - center;
        let band = (-(d * d) / (two * width * width)).exp();
        (-depth * band).exp()
    });
    build_multiplication_operator(basis, &f)
}

/// Unity baseline boosted by a Gaussian emission band at 600 nm:
/// `1 + 0.5·exp(−(λ−600)²/(2·25²))`.
pub fn emission_operator<T: Real>(
    basis: &SpectralBasis<T>,
) -> Result<SpectralOperator<T>, FrstaError> {
    let two = T::from_f64_lossy(2.0);
    let center = T::from_f64_lossy(600.0);
    let width = T::from_f64_lossy(25.0);
    let gain = T::from_f64_lossy(0.5);
    let f = basis.domain().lambda().map(|l| {
        let d = l - center;
        T::one() + gain * (-(d * d) / (two * width * width)).exp()
    });
    build_multiplication_operator(basis, &f)
}

/// Sinusoidal index modulation: `1 + 0.3·sin(0.02·λ)`.
pub fn dispersion_operator<T: Real>(
    basis: &SpectralBasis<T>,
) -> Result<SpectralOperator<T>, FrstaError> {
    let amp = T::from_f64_lossy(0.3);
    let freq = T::from_f64_lossy(0.02);
    let f = basis
        .domain()
        .lambda()
        .map(|l| T::one() + amp * (freq * l).sin());
    build_multiplication_operator(basis, &f)
}

/// Names of the fixed chains, in build order.
pub const CHAIN_NAMES: [&str; 3] = ["chain_0", "chain_1", "chain_2"];

/// Chain 0: absorption first, then dispersion, then emission
/// (`emission ∘ dispersion ∘ absorption`).
pub fn build_chain_0<T: Real>(basis: &SpectralBasis<T>) -> Result<SpectralOperator<T>, FrstaError> {
    let absorb = absorption_operator(basis)?;
    let disperse = dispersion_operator(basis)?;
    let emit = emission_operator(basis)?;
    emit.compose(&disperse)?.compose(&absorb)
}

/// Chain 1: emission first, then absorption (`absorption ∘ emission`).
pub fn build_chain_1<T: Real>(basis: &SpectralBasis<T>) -> Result<SpectralOperator<T>, FrstaError> {
    let emit = emission_operator(basis)?;
    let absorb = absorption_operator(basis)?;
    absorb.compose(&emit)
}

/// Chain 2: dispersion alone.
pub fn build_chain_2<T: Real>(basis: &SpectralBasis<T>) -> Result<SpectralOperator<T>, FrstaError> {
    dispersion_operator(basis)
}

/// All three chains, paired with their names, in the fixed study order.
pub fn build_all_chains<T: Real>(
    basis: &SpectralBasis<T>,
) -> Result<Vec<(&'static str, SpectralOperator<T>)>, FrstaError> {
    Ok(vec![
        (CHAIN_NAMES[0], build_chain_0(basis)?),
        (CHAIN_NAMES[1], build_chain_1(basis)?),
        (CHAIN_NAMES[2], build_chain_2(basis)?),
    ])
}

/// The whitening pair `(W, W⁻¹)` from the Gram factor `G = L·Lᵗ`:
/// `W = Lᵗ` maps coefficients into the whitened frame, `W⁻¹ = L⁻ᵗ` maps
/// back. The inverse comes from a triangular solve, not an inversion.
///
/// # Errors
///
/// `SingularGramMatrix` if the triangular solve against `Lᵗ` fails.
pub fn whitening_operators<T: Real>(
    basis: &SpectralBasis<T>,
) -> Result<(SpectralOperator<T>, SpectralOperator<T>), FrstaError> {
    let m = basis.dim();
    let w = basis.chol_l().transpose();
    let w_inv = w
        .solve_upper_triangular(&DMatrix::identity(m, m))
        .ok_or(FrstaError::SingularGramMatrix)?;
    Ok((SpectralOperator::linear(w)?, SpectralOperator::linear(w_inv)?))
}

/// Conjugate a chain by the whitening map when enabled: `W ∘ C ∘ W⁻¹`.
///
/// With the flag off the chain is returned unchanged — an identity
/// pass-through, not a wrapped no-op; callers must not assume whitening
/// was attempted.
pub fn apply_whitening_if_enabled<T: Real>(
    chain: SpectralOperator<T>,
    basis: &SpectralBasis<T>,
    enabled: bool,
) -> Result<SpectralOperator<T>, FrstaError> {
    if !enabled {
        return Ok(chain);
    }
    let (w, w_inv) = whitening_operators(basis)?;
    w.compose(&chain)?.compose(&w_inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{lobe_centers, ScalingLaw, SpectralDomain};
    use crate::tolerances::{EXACT_F64, ITERATIVE_F64};

    fn basis() -> SpectralBasis<f64> {
        let domain = SpectralDomain::new(380.0, 780.0, 512);
        SpectralBasis::build(
            &domain,
            &lobe_centers(430.0, 730.0, 3),
            8.0,
            12.0,
            2,
            ScalingLaw::Sqrt,
            0.5,
        )
        .unwrap()
    }

    fn sample_op(m: usize, scale: f64, shift: f64) -> SpectralOperator<f64> {
        let a = DMatrix::from_fn(m, m, |i, j| {
            if i == j {
                scale
            } else {
                0.1 * (i as f64 - j as f64)
            }
        });
        let b = DVector::from_fn(m, |i, _| shift * (i as f64 + 1.0));
        SpectralOperator::new(a, b).unwrap()
    }

    #[test]
    fn identity_is_neutral_for_composition() {
        let op = sample_op(4, 0.7, 0.2);
        let id = SpectralOperator::identity(4);
        let left = id.compose(&op).unwrap();
        let right = op.compose(&id).unwrap();
        assert_eq!(left, op);
        assert_eq!(right, op);
    }

    #[test]
    fn composition_law_matches_affine_algebra() {
        let p = sample_op(3, 0.9, 0.1);
        let q = sample_op(3, 1.1, -0.3);
        let c = p.compose(&q).unwrap();
        let expected_a = p.matrix() * q.matrix();
        let expected_b = p.matrix() * q.offset() + p.offset();
        assert!((c.matrix() - expected_a).norm() < EXACT_F64);
        assert!((c.offset() - expected_b).norm() < EXACT_F64);
    }

    #[test]
    fn composition_order_matters() {
        // A coefficient shift and a non-uniform diagonal do not commute:
        // shift-then-scale weights entry i+1, scale-then-shift weights i.
        let shift = SpectralOperator::linear(DMatrix::from_fn(3, 3, |i, j| {
            if j == i + 1 { 1.0 } else { 0.0 }
        }))
        .unwrap();
        let scale = SpectralOperator::linear(DMatrix::from_diagonal(
            &DVector::from_vec(vec![1.0, 2.0, 3.0]),
        ))
        .unwrap();
        let pq = shift.compose(&scale).unwrap();
        let qp = scale.compose(&shift).unwrap();
        assert!(
            (pq.matrix() - qp.matrix()).norm() > 1e-6,
            "these operators should not commute"
        );
        // Spot-check one entry: (shift * scale)[0][1] = 2, (scale * shift)[0][1] = 1.
        assert_eq!(pq.matrix()[(0, 1)], 2.0);
        assert_eq!(qp.matrix()[(0, 1)], 1.0);
    }

    #[test]
    fn compose_rejects_dimension_mismatch() {
        let p = sample_op(3, 1.0, 0.0);
        let q = sample_op(4, 1.0, 0.0);
        assert!(matches!(
            p.compose(&q),
            Err(FrstaError::DimensionMismatch { expected: 3, got: 4, .. })
        ));
    }

    #[test]
    fn new_rejects_non_square_and_bad_offset() {
        let rect = DMatrix::<f64>::zeros(3, 4);
        assert!(SpectralOperator::new(rect, DVector::zeros(3)).is_err());
        let square = DMatrix::<f64>::identity(3, 3);
        assert!(SpectralOperator::new(square, DVector::zeros(4)).is_err());
    }

    #[test]
    fn apply_advances_state_affinely() {
        let op = sample_op(3, 2.0, 1.0);
        let x = DVector::from_vec(vec![1.0, 0.0, -1.0]);
        let expected = op.matrix() * &x + op.offset();
        let mut state = SpectralState::new(x);
        op.apply(&mut state).unwrap();
        assert!((state.coeffs() - expected).norm() < EXACT_F64);
    }

    #[test]
    fn multiplication_by_unity_is_identity() {
        // f ≡ 1 gives M = B·W·Bᵗ = G, so the Galerkin solve returns I.
        let basis = basis();
        let ones = DVector::from_element(basis.domain().len(), 1.0);
        let op = build_multiplication_operator(&basis, &ones).unwrap();
        let id = DMatrix::identity(basis.dim(), basis.dim());
        let err = (op.matrix() - id).norm();
        assert!(err < ITERATIVE_F64, "unity operator deviates from I by {err}");
        assert!(op.offset().norm() == 0.0, "offset must be exactly zero");
    }

    #[test]
    fn multiplication_rejects_wrong_sample_count() {
        let basis = basis();
        let bad = DVector::from_element(100, 1.0);
        assert!(matches!(
            build_multiplication_operator(&basis, &bad),
            Err(FrstaError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn physical_operators_have_zero_offset() {
        let basis = basis();
        for op in [
            absorption_operator(&basis).unwrap(),
            emission_operator(&basis).unwrap(),
            dispersion_operator(&basis).unwrap(),
        ] {
            assert_eq!(op.offset().norm(), 0.0);
            assert_eq!(op.dim(), basis.dim());
        }
    }

    #[test]
    fn chain_0_is_emission_after_dispersion_after_absorption() {
        let basis = basis();
        let manual = emission_operator(&basis)
            .unwrap()
            .compose(&dispersion_operator(&basis).unwrap())
            .unwrap()
            .compose(&absorption_operator(&basis).unwrap())
            .unwrap();
        let chain = build_chain_0(&basis).unwrap();
        assert!((chain.matrix() - manual.matrix()).norm() < EXACT_F64);
    }

    #[test]
    fn build_all_chains_is_ordered_and_named() {
        let basis = basis();
        let chains = build_all_chains(&basis).unwrap();
        let names: Vec<&str> = chains.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, CHAIN_NAMES);
    }

    #[test]
    fn whitening_pair_inverts() {
        let basis = basis();
        let (w, w_inv) = whitening_operators(&basis).unwrap();
        let product = w.compose(&w_inv).unwrap();
        let id = DMatrix::identity(basis.dim(), basis.dim());
        assert!((product.matrix() - id).norm() < ITERATIVE_F64);
    }

    #[test]
    fn whitening_disabled_is_identity_pass_through() {
        let basis = basis();
        let chain = build_chain_2(&basis).unwrap();
        let untouched = apply_whitening_if_enabled(chain.clone(), &basis, false).unwrap();
        assert_eq!(untouched, chain);
    }

    #[test]
    fn whitening_round_trip_recovers_chain() {
        let basis = basis();
        let chain = build_chain_1(&basis).unwrap();
        let whitened = apply_whitening_if_enabled(chain.clone(), &basis, true).unwrap();
        let (w, w_inv) = whitening_operators(&basis).unwrap();
        let back = w_inv.compose(&whitened).unwrap().compose(&w).unwrap();
        let rel = (back.matrix() - chain.matrix()).norm() / chain.matrix().norm();
        assert!(rel < ITERATIVE_F64, "round-trip relative error {rel}");
    }
}
