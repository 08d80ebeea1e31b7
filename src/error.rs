// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for operator construction, transport, and comparison.
//!
//! Replaces stringly-typed failures in public APIs with a proper enum so
//! callers can pattern-match on failure modes (shape disagreement, singular
//! Gram matrix, decomposition non-convergence) rather than parsing opaque
//! strings. Every variant is fatal for the operation that raised it; there
//! are no retries anywhere in this crate — all operations are deterministic
//! dense computations, so a failure on given inputs fails identically on
//! retry.
//!
//! Non-finite values inside a transport state are explicitly NOT errors:
//! they are tracked as first-occurrence bounce indices and the simulation
//! runs to its configured depth (see `transport`).

use std::fmt;

/// Errors arising from basis geometry, operator algebra, transport, or
/// precision comparison.
#[derive(Debug)]
pub enum FrstaError {
    /// An input length or matrix dimension disagrees with the basis
    /// dimension or the domain sample count.
    DimensionMismatch {
        /// What was being checked (e.g. "spectral function samples").
        what: &'static str,
        /// Length/dimension required by the basis or domain.
        expected: usize,
        /// Length/dimension actually supplied.
        got: usize,
    },

    /// The Gram matrix is not numerically positive definite, so the
    /// Galerkin solve (or the whitening factorization) cannot proceed.
    SingularGramMatrix,

    /// A dense decomposition (SVD, Schur, symmetric eigensolve) did not
    /// converge on a finite matrix (wraps a description of the operand).
    DecompositionFailure(String),

    /// The comparator was given trajectories of incompatible shape
    /// (bounce count or coefficient dimension). Never silently truncated.
    ShapeMismatch(String),

    /// An unrecognized precision-mode string, rejected before any
    /// computation.
    UnsupportedPrecisionMode(String),

    /// Artifact persistence failed (IO, serialization, or an attempt to
    /// overwrite a write-once artifact).
    Artifact(String),
}

impl fmt::Display for FrstaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch {
                what,
                expected,
                got,
            } => {
                write!(f, "Dimension mismatch for {what}: expected {expected}, got {got}")
            }
            Self::SingularGramMatrix => {
                write!(f, "Gram matrix is not numerically positive definite")
            }
            Self::DecompositionFailure(msg) => {
                write!(f, "Dense decomposition failed to converge: {msg}")
            }
            Self::ShapeMismatch(msg) => write!(f, "Trajectory shape mismatch: {msg}"),
            Self::UnsupportedPrecisionMode(mode) => {
                write!(f, "Unsupported precision mode: {mode:?}")
            }
            Self::Artifact(msg) => write!(f, "Artifact persistence failed: {msg}"),
        }
    }
}

impl std::error::Error for FrstaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_dimension_mismatch() {
        let err = FrstaError::DimensionMismatch {
            what: "spectral function samples",
            expected: 2048,
            got: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch for spectral function samples: expected 2048, got 1024"
        );
    }

    #[test]
    fn display_singular_gram() {
        let err = FrstaError::SingularGramMatrix;
        assert!(err.to_string().contains("positive definite"));
    }

    #[test]
    fn display_unsupported_mode_quotes_input() {
        let err = FrstaError::UnsupportedPrecisionMode("bf16".into());
        assert!(err.to_string().contains("\"bf16\""));
    }

    #[test]
    fn display_shape_mismatch() {
        let err = FrstaError::ShapeMismatch("depth 15 vs 10".into());
        assert_eq!(err.to_string(), "Trajectory shape mismatch: depth 15 vs 10");
    }

    #[test]
    fn error_trait_object() {
        let err: Box<dyn std::error::Error> = Box::new(FrstaError::SingularGramMatrix);
        assert!(!err.to_string().is_empty());
    }
}
