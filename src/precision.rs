// SPDX-License-Identifier: AGPL-3.0-only

//! Explicit numeric-precision configuration.
//!
//! The study runs every experiment twice: once in a reference mode (f64)
//! and once in a reduced-precision performance mode (f32), then compares
//! the two trajectories. Precision is an explicit value threaded into
//! basis and operator construction — never ambient process state — so
//! repeated or interleaved runs cannot observe stale settings from a
//! prior run.
//!
//! The whole core is generic over [`Real`], and the two modes select the
//! scalar type; both modes therefore execute the identical code path.

use crate::error::FrstaError;
use nalgebra::RealField;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scalar bound for precision-generic spectral computation.
///
/// `from_f64_lossy` truncates an f64 constant into the working precision (the
/// analog of building a literal in the mode's dtype); `Into<f64>` promotes
/// a working-precision value for metrics and comparison.
pub trait Real: RealField + Copy + Into<f64> {
    /// Convert an f64 constant into this scalar type (lossy for f32).
    fn from_f64_lossy(x: f64) -> Self;

    /// Short dtype label used in artifacts ("f64" / "f32").
    fn dtype_name() -> &'static str;
}

impl Real for f64 {
    fn from_f64_lossy(x: f64) -> Self {
        x
    }

    fn dtype_name() -> &'static str {
        "f64"
    }
}

impl Real for f32 {
    fn from_f64_lossy(x: f64) -> Self {
        x as f32
    }

    fn dtype_name() -> &'static str {
        "f32"
    }
}

/// Named numeric-fidelity setting under which an identical experiment is
/// run for drift comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecisionMode {
    /// Strict f64 arithmetic; the drift baseline.
    Reference,
    /// Reduced f32 arithmetic; the comparison side.
    Performance,
}

impl PrecisionMode {
    /// Both modes, in the fixed order the pipeline runs them.
    pub const ALL: [Self; 2] = [Self::Reference, Self::Performance];

    /// Directory/label name for this mode.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Performance => "performance",
        }
    }

    /// The scalar type this mode computes in.
    #[must_use]
    pub const fn dtype_name(self) -> &'static str {
        match self {
            Self::Reference => "f64",
            Self::Performance => "f32",
        }
    }
}

impl fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PrecisionMode {
    type Err = FrstaError;

    /// Accepts both this crate's labels and the legacy dtype-style mode
    /// strings ("fp64", "tf32"). Anything else is rejected before any
    /// computation happens.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reference" | "fp64" => Ok(Self::Reference),
            "performance" | "tf32" | "fp32" => Ok(Self::Performance),
            other => Err(FrstaError::UnsupportedPrecisionMode(other.to_string())),
        }
    }
}

/// Machine-readable record of what produced a run's artifacts.
///
/// The per-run analog of an environment dump: enough to reproduce the run
/// without inspecting the process that wrote it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Crate version that produced the artifacts.
    pub crate_version: String,
    /// Precision mode label ("reference" / "performance").
    pub precision_mode: String,
    /// Scalar type the run computed in.
    pub dtype: String,
    /// Configuration name (see `pipeline::ExperimentConfig::config_name`).
    pub config_name: String,
    /// Transport depth (bounce count) of the run.
    pub transport_depth: usize,
}

impl RunManifest {
    /// Build a manifest for one precision-mode run.
    #[must_use]
    pub fn new(mode: PrecisionMode, config_name: &str, transport_depth: usize) -> Self {
        Self {
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            precision_mode: mode.label().to_string(),
            dtype: mode.dtype_name().to_string(),
            config_name: config_name.to_string(),
            transport_depth,
        }
    }
}
