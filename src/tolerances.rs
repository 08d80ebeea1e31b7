// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized numerical tolerances with justification.
//!
//! Every threshold used by tests, the validation binary, and the library
//! itself is defined here with its origin and rationale. No ad-hoc magic
//! numbers at use sites.
//!
//! # Tolerance categories
//!
//! | Category | Basis | Example |
//! |----------|-------|---------|
//! | Machine precision | IEEE 754 f64 | 1e-10 for exact compositions |
//! | Numerical method | Iterative decomposition convergence | 1e-8 for SVD-derived metrics |
//! | Precision mode | f32 mantissa width | drift ceiling for contractive chains |

// ═══════════════════════════════════════════════════════════════════
// Machine-precision tolerances (IEEE 754 f64)
// ═══════════════════════════════════════════════════════════════════

/// Tolerance for operations that should be exact in f64 arithmetic.
///
/// f64 carries ~15.9 significant digits; 1e-10 allows ~5 digits of
/// accumulated rounding through short chains of exact operations
/// (affine compositions, triangular solves).
pub const EXACT_F64: f64 = 1e-10;

/// Tolerance for f64 results of iterative decompositions.
///
/// SVD and Schur iterate O(n) sweeps, each contributing rounding; 1e-8
/// keeps ~8 digits and holds for condition numbers up to ~1e6.
pub const ITERATIVE_F64: f64 = 1e-8;

// ═══════════════════════════════════════════════════════════════════
// Drift and degeneracy guards
// ═══════════════════════════════════════════════════════════════════

/// Epsilon added to a reference norm before division in relative-error
/// curves, so a zero-norm bounce yields a large-but-finite error instead
/// of a division by zero.
pub const DRIFT_EPSILON: f64 = 1e-16;

/// Ceiling on f32-vs-f64 relative coefficient error for a contractive
/// chain over the default transport depth.
///
/// f32 carries ~7.2 significant digits; per-bounce matrix application
/// loses a few ulps, and 15 bounces of a non-amplifying chain stay well
/// below 1e-3 relative drift. Exceeding this indicates a bug, not
/// precision loss.
pub const F32_DRIFT_CEILING: f64 = 1e-3;

/// Upper bound on the Gram condition number for a basis considered usable
/// in f32 mode. f32's ~7 digits leave no headroom past ~1e6.
pub const GRAM_COND_F32_SAFE: f64 = 1e6;

// ═══════════════════════════════════════════════════════════════════
// Decomposition iteration caps
// ═══════════════════════════════════════════════════════════════════

/// Maximum sweeps for iterative decompositions (SVD, Schur, symmetric
/// eigensolve). Dense well-posed operators of the sizes studied here
/// (M ≤ ~150) converge in far fewer; hitting the cap on a finite matrix
/// is surfaced as `DecompositionFailure`. The cap also bounds runtime on
/// adversarial finite inputs instead of iterating forever.
pub const MAX_DECOMP_SWEEPS: usize = 10_000;
