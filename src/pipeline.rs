// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end experiment driver.
//!
//! One configuration runs the identical experiment twice — once per
//! precision mode — then compares the persisted trajectories chain by
//! chain. Strictly sequential and deterministic: same configuration,
//! same artifacts, bit for bit.
//!
//! Artifact layout under `root/<config_name>/`:
//!
//! ```text
//! geometry/geometry_metrics.json
//! precision/<mode>/run_manifest.json
//! precision/<mode>/operator/<chain>/matrix.json
//! precision/<mode>/operator/<chain>/metrics.json
//! precision/<mode>/operator/<chain>/singular_values.json
//! precision/<mode>/spectra/probe_00/<chain>/single_run/trajectory.json
//! precision/<mode>/spectra/probe_00/<chain>/single_run/stability_metrics.json
//! drift/<chain>/drift_record.json
//! drift/<chain>/drift_metrics.json
//! ```

use crate::artifacts::{
    ArtifactEmitter, MatrixArtifact, TrajectoryArtifact, DRIFT_METRICS_FILE, DRIFT_RECORD_FILE,
    GEOMETRY_METRICS_FILE, METRICS_FILE, OPERATOR_MATRIX_FILE, RUN_MANIFEST_FILE,
    SINGULAR_VALUES_FILE, STABILITY_FILE, TRAJECTORY_FILE,
};
use crate::comparison::{compare_runs, DriftMetrics};
use crate::diagnostics::analyze_operator;
use crate::error::FrstaError;
use crate::geometry::{lobe_centers, ScalingLaw, SpectralBasis, SpectralDomain};
use crate::operator::{apply_whitening_if_enabled, build_all_chains, CHAIN_NAMES};
use crate::precision::{PrecisionMode, Real, RunManifest};
use crate::spectra::gaussian;
use crate::transport::run_transport;
use std::path::Path;

/// Directory label of the fixed probe signal (Gaussian, 540 nm / 30 nm).
const PROBE_LABEL: &str = "probe_00";

/// One experiment configuration: basis geometry, whitening, and depth.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    /// Number of Gaussian lobes K.
    pub lobe_count: usize,
    /// Hermite orders per lobe N (basis dimension M = K·N).
    pub order: usize,
    /// Smallest lobe width (nm).
    pub sigma_min: f64,
    /// Largest lobe width (nm).
    pub sigma_max: f64,
    /// Lobe-width schedule across the domain.
    pub scaling_law: ScalingLaw,
    /// Exponent for the power law (ignored by the others).
    pub gamma: f64,
    /// Conjugate chains by the whitening map.
    pub whitening_enabled: bool,
    /// Bounce count per transport run.
    pub transport_depth: usize,
    /// Lower domain bound (nm).
    pub lambda_min: f64,
    /// Upper domain bound (nm).
    pub lambda_max: f64,
    /// Wavelength samples L.
    pub num_samples: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            lobe_count: 6,
            order: 5,
            sigma_min: 6.0,
            sigma_max: 10.0,
            scaling_law: ScalingLaw::Sqrt,
            gamma: 0.5,
            whitening_enabled: true,
            transport_depth: 15,
            lambda_min: 380.0,
            lambda_max: 780.0,
            num_samples: 2048,
        }
    }
}

impl ExperimentConfig {
    /// Canonical configuration name, e.g. `K6_N5_S6.0-10.0_sqrt_W1`.
    #[must_use]
    pub fn config_name(&self) -> String {
        format!(
            "K{}_N{}_S{:.1}-{:.1}_{}_W{}",
            self.lobe_count,
            self.order,
            self.sigma_min,
            self.sigma_max,
            self.scaling_law,
            u8::from(self.whitening_enabled)
        )
    }

    /// Lobe centers: evenly spaced, held 40 nm off the blue edge and
    /// 60 nm off the red edge so no lobe leaks past the grid.
    #[must_use]
    pub fn centers(&self) -> Vec<f64> {
        lobe_centers(self.lambda_min + 40.0, self.lambda_max - 60.0, self.lobe_count)
    }
}

fn run_dir(mode: PrecisionMode, chain: &str) -> String {
    format!(
        "precision/{}/spectra/{PROBE_LABEL}/{chain}/single_run",
        mode.label()
    )
}

fn operator_dir(mode: PrecisionMode, chain: &str) -> String {
    format!("precision/{}/operator/{chain}", mode.label())
}

/// Run one precision mode of a configuration, persisting all artifacts.
fn run_precision<T: Real>(
    emitter: &ArtifactEmitter,
    config: &ExperimentConfig,
    mode: PrecisionMode,
) -> Result<(), FrstaError> {
    println!("  [{mode}] building {}-sample domain, basis M={}", config.num_samples, config.lobe_count * config.order);
    let domain: SpectralDomain<T> =
        SpectralDomain::new(config.lambda_min, config.lambda_max, config.num_samples);
    let basis = SpectralBasis::build(
        &domain,
        &config.centers(),
        config.sigma_min,
        config.sigma_max,
        config.order,
        config.scaling_law,
        config.gamma,
    )?;

    let manifest = RunManifest::new(mode, &config.config_name(), config.transport_depth);
    emitter.write_json(
        &format!("precision/{}/{RUN_MANIFEST_FILE}", mode.label()),
        &manifest,
    )?;

    // Geometry is precision-independent up to rounding; persist it once,
    // from the reference build.
    if mode == PrecisionMode::Reference {
        let metrics = basis.geometry_metrics(config.whitening_enabled)?;
        emitter.write_json(&format!("geometry/{GEOMETRY_METRICS_FILE}"), &metrics)?;
    }

    // The probe enters transport as the raw Gaussian; its absolute energy
    // scale is part of what the drift comparison observes.
    let probe = gaussian(&domain, 540.0, 30.0);
    let initial = basis.project(&probe)?;

    for (name, chain) in build_all_chains(&basis)? {
        let chain = apply_whitening_if_enabled(chain, &basis, config.whitening_enabled)?;

        let diag = analyze_operator(&chain)?;
        let op_dir = operator_dir(mode, name);
        emitter.write_json(
            &format!("{op_dir}/{OPERATOR_MATRIX_FILE}"),
            &MatrixArtifact::from_matrix(chain.matrix()),
        )?;
        emitter.write_json(&format!("{op_dir}/{METRICS_FILE}"), &diag.metrics)?;
        let sv: Vec<f64> = diag.singular_values.iter().map(|&s| s.into()).collect();
        emitter.write_json(&format!("{op_dir}/{SINGULAR_VALUES_FILE}"), &sv)?;

        let traj = run_transport(&basis, &chain, &initial, config.transport_depth)?;
        let dir = run_dir(mode, name);
        emitter.write_json(
            &format!("{dir}/{TRAJECTORY_FILE}"),
            &TrajectoryArtifact::from_trajectory(&traj),
        )?;
        emitter.write_json(&format!("{dir}/{STABILITY_FILE}"), &traj.stability)?;
        println!(
            "  [{mode}] {name}: radius={:.6}, first_nan={}, first_inf={}",
            traj.stability.final_spectral_radius,
            traj.stability.first_nan_bounce,
            traj.stability.first_inf_bounce
        );
    }
    Ok(())
}

/// Run a full configuration: both precision modes, then per-chain drift
/// comparison. Returns `(chain name, drift metrics)` in chain order.
///
/// # Errors
///
/// Propagates basis construction, transport, persistence, and comparison
/// failures; the output root must not already hold this configuration.
pub fn run_config(
    root: &Path,
    config: &ExperimentConfig,
) -> Result<Vec<(String, DriftMetrics)>, FrstaError> {
    let name = config.config_name();
    println!("configuration {name}");
    let emitter = ArtifactEmitter::new(root.join(&name));

    run_precision::<f64>(&emitter, config, PrecisionMode::Reference)?;
    run_precision::<f32>(&emitter, config, PrecisionMode::Performance)?;

    let mut summary = Vec::with_capacity(CHAIN_NAMES.len());
    for chain in CHAIN_NAMES {
        let ref_dir = emitter.root().join(run_dir(PrecisionMode::Reference, chain));
        let cmp_dir = emitter.root().join(run_dir(PrecisionMode::Performance, chain));
        let record = compare_runs(&ref_dir, &cmp_dir)?;
        emitter.write_json(&format!("drift/{chain}/{DRIFT_RECORD_FILE}"), &record)?;
        emitter.write_json(&format!("drift/{chain}/{DRIFT_METRICS_FILE}"), &record.metrics)?;
        println!(
            "  [drift] {chain}: max_rel_coeff={:.3e}, final_l2={:.3e}",
            record.metrics.max_relative_coeff_error,
            record.metrics.final_l2_reconstruction_error
        );
        summary.push((chain.to_string(), record.metrics));
    }
    Ok(summary)
}
