// SPDX-License-Identifier: AGPL-3.0-only

//! Write-once JSON artifact persistence.
//!
//! Artifacts are plain data: matrices flatten to row-major `Vec<f64>` with
//! explicit dimensions, and every trajectory is promoted to f64 before it
//! is written, so a reference and a performance run produce structurally
//! identical files.
//!
//! JSON has no literal for non-finite floats; the serializer writes them as
//! `null`. The deserialize helpers here map `null` back to NaN, which means
//! an Inf recorded by a diverged run reloads as NaN. The first-occurrence
//! bounce indices in `StabilityMetrics` are integers and survive exactly,
//! so no divergence information is lost — only the Inf/NaN distinction
//! inside dense arrays.
//!
//! Every write is write-once: an existing file is an error, never an
//! overwrite. Re-running a study into the same root must be an explicit
//! decision (a fresh root), not a silent clobber.

use crate::error::FrstaError;
use crate::precision::Real;
use crate::transport::{StabilityMetrics, Trajectory};
use nalgebra::{DMatrix, DVector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-run trajectory record.
pub const TRAJECTORY_FILE: &str = "trajectory.json";
/// Per-run stability summary.
pub const STABILITY_FILE: &str = "stability_metrics.json";
/// Per-run chain-operator diagnostics.
pub const METRICS_FILE: &str = "metrics.json";
/// Per-run chain-operator matrix (linear part).
pub const OPERATOR_MATRIX_FILE: &str = "matrix.json";
/// Per-run chain-operator singular spectrum.
pub const SINGULAR_VALUES_FILE: &str = "singular_values.json";
/// Per-configuration basis geometry summary.
pub const GEOMETRY_METRICS_FILE: &str = "geometry_metrics.json";
/// Per-chain precision-drift record.
pub const DRIFT_RECORD_FILE: &str = "drift_record.json";
/// Per-chain scalar drift summary.
pub const DRIFT_METRICS_FILE: &str = "drift_metrics.json";
/// Per-mode run manifest.
pub const RUN_MANIFEST_FILE: &str = "run_manifest.json";

/// Deserialize an f64 that may have been written as `null` (non-finite).
pub(crate) fn nan_scalar<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
}

/// Deserialize a float vector whose non-finite entries were written as
/// `null`.
pub(crate) fn nan_vec<'de, D>(d: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Option<f64>>::deserialize(d)?;
    Ok(raw.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect())
}

/// Row-major dense matrix in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixArtifact {
    /// Row count.
    pub rows: usize,
    /// Column count.
    pub cols: usize,
    /// Row-major data, `rows · cols` entries.
    #[serde(deserialize_with = "nan_vec")]
    pub data: Vec<f64>,
}

impl MatrixArtifact {
    /// Flatten a dense matrix, promoting to f64.
    #[must_use]
    pub fn from_matrix<T: Real>(m: &DMatrix<T>) -> Self {
        let mut data = Vec::with_capacity(m.nrows() * m.ncols());
        for i in 0..m.nrows() {
            for j in 0..m.ncols() {
                data.push(m[(i, j)].into());
            }
        }
        Self {
            rows: m.nrows(),
            cols: m.ncols(),
            data,
        }
    }

    /// Rebuild the dense matrix.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the data length disagrees with the dimensions.
    pub fn to_matrix(&self) -> Result<DMatrix<f64>, FrstaError> {
        if self.data.len() != self.rows * self.cols {
            return Err(FrstaError::ShapeMismatch(format!(
                "matrix artifact {}x{} carries {} entries",
                self.rows,
                self.cols,
                self.data.len()
            )));
        }
        Ok(DMatrix::from_row_slice(self.rows, self.cols, &self.data))
    }
}

fn vec_of<T: Real>(v: &DVector<T>) -> Vec<f64> {
    v.iter().map(|&x| x.into()).collect()
}

/// Wire form of a [`Trajectory`], always in f64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryArtifact {
    /// Coefficient snapshots, depth × M.
    pub coeff_history: MatrixArtifact,
    /// Coefficient norm per bounce.
    #[serde(deserialize_with = "nan_vec")]
    pub norm_curve: Vec<f64>,
    /// Integrated reconstructed energy per bounce.
    #[serde(deserialize_with = "nan_vec")]
    pub energy_curve: Vec<f64>,
    /// Cumulative-product singular values, depth × M.
    pub singular_history: MatrixArtifact,
    /// Cumulative-product spectral radius per bounce.
    #[serde(deserialize_with = "nan_vec")]
    pub spectral_radius_curve: Vec<f64>,
    /// Final coefficients.
    #[serde(deserialize_with = "nan_vec")]
    pub final_coeffs: Vec<f64>,
    /// Final reconstruction on the wavelength grid.
    #[serde(deserialize_with = "nan_vec")]
    pub final_reconstruction: Vec<f64>,
    /// Divergence and extremal summary.
    pub stability: StabilityMetrics,
}

impl TrajectoryArtifact {
    /// Encode a trajectory of any working precision.
    #[must_use]
    pub fn from_trajectory<T: Real>(traj: &Trajectory<T>) -> Self {
        Self {
            coeff_history: MatrixArtifact::from_matrix(&traj.coeff_history),
            norm_curve: vec_of(&traj.norm_curve),
            energy_curve: vec_of(&traj.energy_curve),
            singular_history: MatrixArtifact::from_matrix(&traj.singular_history),
            spectral_radius_curve: vec_of(&traj.spectral_radius_curve),
            final_coeffs: vec_of(&traj.final_coeffs),
            final_reconstruction: vec_of(&traj.final_reconstruction),
            stability: traj.stability.clone(),
        }
    }

    /// Decode into an f64 trajectory.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if any array length disagrees with the recorded
    /// dimensions.
    pub fn into_trajectory(self) -> Result<Trajectory<f64>, FrstaError> {
        let coeff_history = self.coeff_history.to_matrix()?;
        let singular_history = self.singular_history.to_matrix()?;
        let depth = coeff_history.nrows();
        for (name, len) in [
            ("norm_curve", self.norm_curve.len()),
            ("energy_curve", self.energy_curve.len()),
            ("spectral_radius_curve", self.spectral_radius_curve.len()),
        ] {
            if len != depth {
                return Err(FrstaError::ShapeMismatch(format!(
                    "{name} has {len} entries for depth {depth}"
                )));
            }
        }
        if singular_history.nrows() != depth {
            return Err(FrstaError::ShapeMismatch(format!(
                "singular history has {} rows for depth {depth}",
                singular_history.nrows()
            )));
        }
        Ok(Trajectory {
            coeff_history,
            norm_curve: DVector::from_vec(self.norm_curve),
            energy_curve: DVector::from_vec(self.energy_curve),
            singular_history,
            spectral_radius_curve: DVector::from_vec(self.spectral_radius_curve),
            final_coeffs: DVector::from_vec(self.final_coeffs),
            final_reconstruction: DVector::from_vec(self.final_reconstruction),
            stability: self.stability,
        })
    }
}

/// Writes and reads JSON artifacts under a fixed root directory.
pub struct ArtifactEmitter {
    root: PathBuf,
}

impl ArtifactEmitter {
    /// Emitter rooted at `root`; nothing is created until the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serialize `value` to `root/rel_path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// `Artifact` if the file already exists, or on IO/serialization
    /// failure.
    pub fn write_json<S: Serialize>(&self, rel_path: &str, value: &S) -> Result<(), FrstaError> {
        let path = self.root.join(rel_path);
        if path.exists() {
            return Err(FrstaError::Artifact(format!(
                "refusing to overwrite existing artifact {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| FrstaError::Artifact(format!("mkdir {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| FrstaError::Artifact(format!("serialize {rel_path}: {e}")))?;
        fs::write(&path, json)
            .map_err(|e| FrstaError::Artifact(format!("write {}: {e}", path.display())))
    }

    /// Load and deserialize `root/rel_path`.
    ///
    /// # Errors
    ///
    /// `Artifact` on IO or deserialization failure.
    pub fn load_json<D: DeserializeOwned>(&self, rel_path: &str) -> Result<D, FrstaError> {
        let path = self.root.join(rel_path);
        let json = fs::read_to_string(&path)
            .map_err(|e| FrstaError::Artifact(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&json)
            .map_err(|e| FrstaError::Artifact(format!("parse {}: {e}", path.display())))
    }
}
