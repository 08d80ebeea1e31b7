// SPDX-License-Identifier: AGPL-3.0-only

//! Spectral domain sampling and the Gaussian–Hermite multi-lobe basis.
//!
//! The domain is a uniform wavelength grid with trapezoid integration
//! weights. The basis places K Gaussian lobes across the domain, each
//! carrying N Hermite orders, for M = K·N functions; lobe widths follow a
//! configurable sigma schedule. Everything downstream consumes the basis
//! only through its geometry contract: raw basis matrix `B` (M×L), Gram
//! matrix `G = B·W·Bᵗ`, its Cholesky factor, `project`, and `reconstruct`.
//!
//! The Gram matrix is factored once at build time; projection and the
//! Galerkin operator solve both go through the factor — never through an
//! explicit inverse, which would destroy the conditioning this study
//! measures.

use crate::error::FrstaError;
use crate::precision::Real;
use nalgebra::linalg::{Cholesky, SymmetricEigen};
use nalgebra::{DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Uniformly sampled wavelength domain with integration weights.
#[derive(Clone, Debug)]
pub struct SpectralDomain<T: Real> {
    lambda: DVector<T>,
    weights: DVector<T>,
    lambda_min: f64,
    lambda_max: f64,
}

impl<T: Real> SpectralDomain<T> {
    /// Build a uniform grid of `num_samples` points on
    /// `[lambda_min, lambda_max]` with trapezoid weights.
    ///
    /// `num_samples` must be at least 2 so the step is defined.
    #[must_use]
    pub fn new(lambda_min: f64, lambda_max: f64, num_samples: usize) -> Self {
        assert!(num_samples >= 2, "domain needs at least 2 samples");
        let step = (lambda_max - lambda_min) / (num_samples as f64 - 1.0);
        let lambda = DVector::from_fn(num_samples, |i, _| {
            T::from_f64_lossy(lambda_min + step * i as f64)
        });
        let half = T::from_f64_lossy(step * 0.5);
        let full = T::from_f64_lossy(step);
        let weights = DVector::from_fn(num_samples, |i, _| {
            if i == 0 || i == num_samples - 1 {
                half
            } else {
                full
            }
        });
        Self {
            lambda,
            weights,
            lambda_min,
            lambda_max,
        }
    }

    /// Number of wavelength samples (L).
    #[must_use]
    pub fn len(&self) -> usize {
        self.lambda.len()
    }

    /// True when the grid is empty (never, by construction).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lambda.is_empty()
    }

    /// The wavelength grid λ (nm).
    #[must_use]
    pub fn lambda(&self) -> &DVector<T> {
        &self.lambda
    }

    /// Trapezoid integration weights w.
    #[must_use]
    pub fn weights(&self) -> &DVector<T> {
        &self.weights
    }

    /// Domain bounds in nm, as configured.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64) {
        (self.lambda_min, self.lambda_max)
    }

    /// Weighted quadrature of a sampled signal: `Σ wᵢ·sᵢ`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the signal length differs from the grid.
    pub fn integrate(&self, signal: &DVector<T>) -> Result<T, FrstaError> {
        if signal.len() != self.len() {
            return Err(FrstaError::DimensionMismatch {
                what: "signal samples",
                expected: self.len(),
                got: signal.len(),
            });
        }
        Ok(self.weights.dot(signal))
    }
}

/// Lobe-width schedule across the K centers.
///
/// For lobe k with normalized position t = k/(K−1), the width is
/// `σ_min + (σ_max − σ_min)·g(t)` where `g` is the law's profile;
/// `Constant` pins every lobe at `σ_min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingLaw {
    /// g(t) = 0 — every lobe at σ_min.
    Constant,
    /// g(t) = t.
    Linear,
    /// g(t) = √t.
    Sqrt,
    /// g(t) = t^γ.
    Power,
}

impl ScalingLaw {
    fn profile(self, t: f64, gamma: f64) -> f64 {
        match self {
            Self::Constant => 0.0,
            Self::Linear => t,
            Self::Sqrt => t.sqrt(),
            Self::Power => t.powf(gamma),
        }
    }

    /// Short name used in configuration names and artifacts.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Linear => "linear",
            Self::Sqrt => "sqrt",
            Self::Power => "power",
        }
    }
}

impl fmt::Display for ScalingLaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalingLaw {
    type Err = FrstaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(Self::Constant),
            "linear" => Ok(Self::Linear),
            "sqrt" => Ok(Self::Sqrt),
            "power" => Ok(Self::Power),
            other => Err(FrstaError::UnsupportedPrecisionMode(format!(
                "scaling law {other}"
            ))),
        }
    }
}

/// Scalar summary of the basis geometry, persisted once per configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryMetrics {
    /// Basis dimension M.
    pub dimension: usize,
    /// Smallest lobe width in the schedule (nm).
    pub sigma_min: f64,
    /// Largest lobe width in the schedule (nm).
    pub sigma_max: f64,
    /// Gram condition number from its symmetric eigenvalues.
    #[serde(deserialize_with = "crate::artifacts::nan_scalar")]
    pub gram_condition_number: f64,
    /// Whether the configuration conjugates chains by the whitening map.
    pub whitening: bool,
}

/// Gaussian–Hermite multi-lobe spectral basis over a [`SpectralDomain`].
///
/// Row m = (k, n) of the raw matrix samples `H_n(u)·exp(−u²/2)` with
/// `u = (λ − c_k)/σ_k`, normalized to unit weighted L2 norm. Rows are
/// ordered lobe-major (all orders of lobe 0, then lobe 1, …).
pub struct SpectralBasis<T: Real> {
    domain: SpectralDomain<T>,
    basis_raw: DMatrix<T>,
    gram: DMatrix<T>,
    chol: Cholesky<T, Dyn>,
    sigma_schedule: DVector<T>,
}

impl<T: Real> SpectralBasis<T> {
    /// Build the basis: sample and normalize the M raw functions, assemble
    /// the Gram matrix `G = B·W·Bᵗ`, and factor it.
    ///
    /// # Errors
    ///
    /// `SingularGramMatrix` if `G` is not numerically positive definite in
    /// the working precision (overcomplete lobes, or f32 headroom
    /// exhausted).
    pub fn build(
        domain: &SpectralDomain<T>,
        centers: &[f64],
        sigma_min: f64,
        sigma_max: f64,
        order: usize,
        law: ScalingLaw,
        gamma: f64,
    ) -> Result<Self, FrstaError> {
        assert!(!centers.is_empty() && order > 0, "basis needs lobes and orders");
        let k_lobes = centers.len();
        let l = domain.len();
        let m = k_lobes * order;

        let sigma_schedule = DVector::from_fn(k_lobes, |k, _| {
            let t = if k_lobes > 1 {
                k as f64 / (k_lobes as f64 - 1.0)
            } else {
                0.0
            };
            T::from_f64_lossy(sigma_min + (sigma_max - sigma_min) * law.profile(t, gamma))
        });

        let mut basis_raw = DMatrix::zeros(m, l);
        for (k, &center) in centers.iter().enumerate() {
            let c = T::from_f64_lossy(center);
            let sigma = sigma_schedule[k];
            for n in 0..order {
                let row = k * order + n;
                for j in 0..l {
                    let u = (domain.lambda()[j] - c) / sigma;
                    basis_raw[(row, j)] = hermite(n, u) * (-u * u / T::from_f64_lossy(2.0)).exp();
                }
            }
        }

        // Unit weighted L2 norm per row keeps the Gram scale-free across
        // sigma schedules.
        for mut row in basis_raw.row_iter_mut() {
            let mut norm_sq = T::zero();
            for j in 0..l {
                norm_sq += domain.weights()[j] * row[j] * row[j];
            }
            let norm = norm_sq.sqrt();
            if norm > T::zero() {
                for j in 0..l {
                    row[j] /= norm;
                }
            }
        }

        let mut weighted = basis_raw.clone();
        for (j, mut col) in weighted.column_iter_mut().enumerate() {
            col *= domain.weights()[j];
        }
        let gram = &weighted * basis_raw.transpose();

        let chol = Cholesky::new(gram.clone()).ok_or(FrstaError::SingularGramMatrix)?;

        Ok(Self {
            domain: domain.clone(),
            basis_raw,
            gram,
            chol,
            sigma_schedule,
        })
    }

    /// Basis dimension M.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.basis_raw.nrows()
    }

    /// The domain this basis samples.
    #[must_use]
    pub fn domain(&self) -> &SpectralDomain<T> {
        &self.domain
    }

    /// Raw basis matrix `B` (M×L).
    #[must_use]
    pub fn raw(&self) -> &DMatrix<T> {
        &self.basis_raw
    }

    /// Gram matrix `G = B·W·Bᵗ` (M×M).
    #[must_use]
    pub fn gram(&self) -> &DMatrix<T> {
        &self.gram
    }

    /// Lower Cholesky factor `L` of the Gram matrix (`G = L·Lᵗ`).
    #[must_use]
    pub fn chol_l(&self) -> DMatrix<T> {
        self.chol.l()
    }

    /// The per-lobe sigma schedule (nm).
    #[must_use]
    pub fn sigma_schedule(&self) -> &DVector<T> {
        &self.sigma_schedule
    }

    /// Solve `G·X = rhs` through the Cholesky factor.
    pub(crate) fn gram_solve(&self, rhs: &DMatrix<T>) -> DMatrix<T> {
        self.chol.solve(rhs)
    }

    /// Weighted Galerkin projection of a sampled signal:
    /// `α = G⁻¹·B·W·s` (via the factor, not an inverse).
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the signal length differs from the domain.
    pub fn project(&self, signal: &DVector<T>) -> Result<DVector<T>, FrstaError> {
        if signal.len() != self.domain.len() {
            return Err(FrstaError::DimensionMismatch {
                what: "signal samples",
                expected: self.domain.len(),
                got: signal.len(),
            });
        }
        let weighted = signal.component_mul(self.domain.weights());
        let rhs = &self.basis_raw * weighted;
        Ok(self.chol.solve(&rhs))
    }

    /// Reconstruct a sampled signal from coefficients: `s = Bᵗ·α`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the coefficient length differs from M.
    pub fn reconstruct(&self, coeffs: &DVector<T>) -> Result<DVector<T>, FrstaError> {
        if coeffs.len() != self.dim() {
            return Err(FrstaError::DimensionMismatch {
                what: "coefficients",
                expected: self.dim(),
                got: coeffs.len(),
            });
        }
        Ok(self.basis_raw.transpose() * coeffs)
    }

    /// Geometry summary: dimension, sigma range, Gram conditioning.
    ///
    /// # Errors
    ///
    /// `DecompositionFailure` if the symmetric eigensolve of the Gram
    /// matrix does not converge.
    pub fn geometry_metrics(&self, whitening: bool) -> Result<GeometryMetrics, FrstaError> {
        let eigen = SymmetricEigen::try_new(
            self.gram.clone(),
            T::default_epsilon(),
            crate::tolerances::MAX_DECOMP_SWEEPS,
        )
        .ok_or_else(|| {
            FrstaError::DecompositionFailure(format!(
                "symmetric eigensolve of {0}x{0} Gram matrix",
                self.dim()
            ))
        })?;
        let mut ev_min = f64::INFINITY;
        let mut ev_max = f64::NEG_INFINITY;
        for &ev in eigen.eigenvalues.iter() {
            let v: f64 = ev.into();
            ev_min = ev_min.min(v);
            ev_max = ev_max.max(v);
        }
        let sigma: Vec<f64> = self.sigma_schedule.iter().map(|&s| s.into()).collect();
        Ok(GeometryMetrics {
            dimension: self.dim(),
            sigma_min: sigma.iter().copied().fold(f64::INFINITY, f64::min),
            sigma_max: sigma.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            gram_condition_number: ev_max / ev_min,
            whitening,
        })
    }
}

/// Physicists' Hermite polynomial `H_n(u)` by the three-term recurrence.
fn hermite<T: Real>(n: usize, u: T) -> T {
    let two = T::from_f64_lossy(2.0);
    let mut h_prev = T::one();
    if n == 0 {
        return h_prev;
    }
    let mut h = two * u;
    for k in 1..n {
        let next = two * u * h - two * T::from_f64_lossy(k as f64) * h_prev;
        h_prev = h;
        h = next;
    }
    h
}

/// K evenly spaced lobe centers on `[lo, hi]` (inclusive endpoints).
#[must_use]
pub fn lobe_centers(lo: f64, hi: f64, k: usize) -> Vec<f64> {
    assert!(k >= 1, "need at least one lobe");
    if k == 1 {
        return vec![(lo + hi) * 0.5];
    }
    let step = (hi - lo) / (k as f64 - 1.0);
    (0..k).map(|i| lo + step * i as f64).collect()
}
