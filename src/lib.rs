// SPDX-License-Identifier: AGPL-3.0-only

//! # frsta — fixed-resolution spectral transport
//!
//! A precision-drift study over spectral transport operators. Continuous
//! spectra on a fixed wavelength grid are projected into a Gaussian–Hermite
//! multi-lobe basis; multiplicative media (absorption, emission, dispersion)
//! become affine operators by weighted Galerkin projection; chains of those
//! operators are iterated bounce by bounce; and every experiment runs twice
//! — strict f64 and reduced f32 — so the two trajectories can be compared
//! for numerical drift.
//!
//! ## Pipeline
//!
//! ```text
//! domain ─ basis ─ operators ─ chains ─ (whitening) ─ transport ─ artifacts
//!                                                          │
//!                              reference run ── drift ── performance run
//! ```
//!
//! - [`geometry`]: wavelength grid, trapezoid quadrature, basis + Gram
//!   Cholesky, projection/reconstruction
//! - [`spectra`]: probe-signal generators and the named test library
//! - [`operator`]: affine algebra, Galerkin multiplication operators, the
//!   three chains, whitening conjugation
//! - [`diagnostics`]: SVD/Schur operator metrics
//! - [`transport`]: the bounce loop and its trajectory record
//! - [`comparison`]: reference-vs-performance drift
//! - [`artifacts`]: write-once JSON persistence
//! - [`pipeline`]: the end-to-end configuration driver
//!
//! Numerical policy: the Gram matrix is factored, never inverted; NaN and
//! Inf inside a run are recorded data, not errors; every fallible API
//! returns [`FrstaError`].

pub mod artifacts;
pub mod comparison;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod operator;
pub mod pipeline;
pub mod precision;
pub mod spectra;
pub mod tolerances;
pub mod transport;
pub mod validation;

pub use comparison::{compare_runs, compare_trajectories, DriftMetrics, DriftRecord};
pub use error::FrstaError;
pub use geometry::{ScalingLaw, SpectralBasis, SpectralDomain};
pub use operator::{SpectralOperator, SpectralState};
pub use pipeline::{run_config, ExperimentConfig};
pub use precision::{PrecisionMode, Real};
pub use transport::{run_transport, StabilityMetrics, Trajectory};
