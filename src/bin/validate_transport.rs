//! Validate the transport core against closed-form expectations.
//!
//! Every expected value below has a hand-derivable provenance:
//!   - affine composition law on small explicit matrices
//!   - whitening round-trip W⁻¹∘(W∘C∘W⁻¹)∘W = C
//!   - geometric decay of a 0.9·I chain (snapshots 1, 0.9, 0.81; cumulative
//!     radius 0.9, 0.81, 0.729)
//!   - the two-bounce comparator example with relative errors [0, 0.2]
//!
//! Exit 0 if all checks pass, 1 otherwise.

use frsta::comparison::compare_trajectories;
use frsta::geometry::{lobe_centers, ScalingLaw, SpectralBasis, SpectralDomain};
use frsta::operator::{
    apply_whitening_if_enabled, build_chain_1, build_multiplication_operator, whitening_operators,
    SpectralOperator,
};
use frsta::tolerances::{EXACT_F64, GRAM_COND_F32_SAFE, ITERATIVE_F64};
use frsta::transport::{run_transport, StabilityMetrics, Trajectory};
use frsta::validation::ValidationHarness;
use nalgebra::{DMatrix, DVector};
use std::process;

fn build_basis() -> SpectralBasis<f64> {
    let domain = SpectralDomain::new(380.0, 780.0, 1024);
    match SpectralBasis::build(
        &domain,
        &lobe_centers(470.0, 690.0, 2),
        10.0,
        14.0,
        2,
        ScalingLaw::Linear,
        1.0,
    ) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("validate_transport: basis construction failed: {e}");
            process::exit(1);
        }
    }
}

fn trajectory_from_history(history: DMatrix<f64>) -> Trajectory<f64> {
    let depth = history.nrows();
    let final_coeffs: DVector<f64> = history.row(depth - 1).transpose();
    Trajectory {
        coeff_history: history,
        norm_curve: DVector::zeros(depth),
        energy_curve: DVector::zeros(depth),
        singular_history: DMatrix::zeros(depth, 2),
        spectral_radius_curve: DVector::from_element(depth, 1.0),
        final_reconstruction: final_coeffs.clone(),
        final_coeffs,
        stability: StabilityMetrics {
            first_nan_bounce: -1,
            first_inf_bounce: -1,
            max_norm: 1.0,
            min_norm: 0.4,
            final_spectral_radius: 1.0,
            max_singular_value: 1.0,
            min_singular_value: 1.0,
        },
    }
}

fn main() {
    let mut h = ValidationHarness::new("transport core");
    let basis = build_basis();
    let m = basis.dim();

    // ── basis conditioning ─────────────────────────────────────────
    let geom = basis.geometry_metrics(true).unwrap();
    h.check_upper(
        "Gram conditioning within f32 headroom",
        geom.gram_condition_number,
        GRAM_COND_F32_SAFE,
    );

    // ── affine composition ─────────────────────────────────────────
    let p = SpectralOperator::new(
        DMatrix::from_row_slice(2, 2, &[0.9, 0.1, 0.0, 1.1]),
        DVector::from_vec(vec![0.2, -0.1]),
    )
    .unwrap();
    let q = SpectralOperator::new(
        DMatrix::from_row_slice(2, 2, &[1.0, 0.5, -0.2, 0.8]),
        DVector::from_vec(vec![0.0, 0.3]),
    )
    .unwrap();
    let c = p.compose(&q).unwrap();
    let expected_a = p.matrix() * q.matrix();
    let expected_b = p.matrix() * q.offset() + p.offset();
    h.check_upper(
        "composition linear part",
        (c.matrix() - expected_a).norm(),
        EXACT_F64,
    );
    h.check_upper(
        "composition offset",
        (c.offset() - expected_b).norm(),
        EXACT_F64,
    );
    let id = SpectralOperator::identity(2);
    h.check_bool("identity neutral", id.compose(&p).unwrap() == p);

    // ── Galerkin sanity: multiplying by unity is the identity ──────
    let ones = DVector::from_element(basis.domain().len(), 1.0);
    let unity = build_multiplication_operator(&basis, &ones).unwrap();
    h.check_upper(
        "unity multiplication operator",
        (unity.matrix() - DMatrix::identity(m, m)).norm(),
        ITERATIVE_F64,
    );

    // ── whitening round trip ───────────────────────────────────────
    let chain = build_chain_1(&basis).unwrap();
    let whitened = apply_whitening_if_enabled(chain.clone(), &basis, true).unwrap();
    let (w, w_inv) = whitening_operators(&basis).unwrap();
    let back = w_inv.compose(&whitened).unwrap().compose(&w).unwrap();
    h.check_upper(
        "whitening round trip",
        (back.matrix() - chain.matrix()).norm() / chain.matrix().norm(),
        ITERATIVE_F64,
    );

    // ── geometric decay chain ──────────────────────────────────────
    let decay = SpectralOperator::linear(DMatrix::identity(m, m) * 0.9).unwrap();
    let mut initial = DVector::zeros(m);
    initial[0] = 1.0;
    let traj = run_transport(&basis, &decay, &initial, 3).unwrap();
    for (b, expected) in [1.0, 0.9, 0.81].into_iter().enumerate() {
        h.check_abs(
            &format!("decay snapshot bounce {b}"),
            traj.coeff_history[(b, 0)],
            expected,
            EXACT_F64,
        );
    }
    for (b, expected) in [0.9, 0.81, 0.729].into_iter().enumerate() {
        h.check_abs(
            &format!("decay cumulative radius bounce {b}"),
            traj.spectral_radius_curve[b],
            expected,
            ITERATIVE_F64,
        );
    }
    h.check_bool(
        "decay run stays finite",
        traj.stability.first_nan_bounce == -1 && traj.stability.first_inf_bounce == -1,
    );

    // ── comparator worked example ──────────────────────────────────
    let reference =
        trajectory_from_history(DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.5, 0.0]));
    let candidate =
        trajectory_from_history(DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.4, 0.0]));
    let record = compare_trajectories(&reference, &candidate).unwrap();
    h.check_abs("comparator bounce 0", record.rel_error_curve[0], 0.0, EXACT_F64);
    h.check_abs("comparator bounce 1", record.rel_error_curve[1], 0.2, EXACT_F64);
    h.check_abs(
        "comparator max relative error",
        record.metrics.max_relative_coeff_error,
        0.2,
        EXACT_F64,
    );

    h.finish();
}
