// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests for the operator algebra on a realistic basis:
//! Galerkin construction, chain composition, whitening conjugation, and
//! operator diagnostics, all through the public API.

use frsta::diagnostics::analyze_operator;
use frsta::geometry::{lobe_centers, ScalingLaw, SpectralBasis, SpectralDomain};
use frsta::operator::{
    absorption_operator, apply_whitening_if_enabled, build_all_chains, build_chain_0,
    build_multiplication_operator, dispersion_operator, emission_operator, whitening_operators,
    SpectralOperator, CHAIN_NAMES,
};
use frsta::tolerances::{EXACT_F64, ITERATIVE_F64};
use frsta::FrstaError;
use nalgebra::{DMatrix, DVector};

fn study_basis() -> SpectralBasis<f64> {
    let domain = SpectralDomain::new(380.0, 780.0, 1024);
    SpectralBasis::build(
        &domain,
        &lobe_centers(420.0, 720.0, 4),
        8.0,
        12.0,
        3,
        ScalingLaw::Sqrt,
        0.5,
    )
    .unwrap()
}

#[test]
fn unity_function_projects_to_identity_operator() {
    let basis = study_basis();
    let ones = DVector::from_element(basis.domain().len(), 1.0);
    let op = build_multiplication_operator(&basis, &ones).unwrap();
    let id = DMatrix::identity(basis.dim(), basis.dim());
    assert!(
        (op.matrix() - id).norm() < ITERATIVE_F64,
        "multiplying by 1 must be the identity in the basis"
    );
}

#[test]
fn chain_composition_matches_sequential_application() {
    // Applying the chain once must equal applying its factors in order.
    let basis = study_basis();
    let chain = build_chain_0(&basis).unwrap();

    let x = DVector::from_fn(basis.dim(), |i, _| 0.3 - 0.05 * i as f64);
    let chained = chain.matrix() * &x;

    let step1 = absorption_operator(&basis).unwrap().matrix() * &x;
    let step2 = dispersion_operator(&basis).unwrap().matrix() * step1;
    let sequential = emission_operator(&basis).unwrap().matrix() * step2;

    assert!(
        (&chained - &sequential).norm() < EXACT_F64,
        "composition order diverges from sequential application by {}",
        (chained - sequential).norm()
    );
}

#[test]
fn all_chains_build_with_expected_names() {
    let basis = study_basis();
    let chains = build_all_chains(&basis).unwrap();
    assert_eq!(chains.len(), 3);
    for ((name, op), expected) in chains.iter().zip(CHAIN_NAMES) {
        assert_eq!(*name, expected);
        assert_eq!(op.dim(), basis.dim());
        assert_eq!(op.offset().norm(), 0.0, "{name} must be linear");
    }
}

#[test]
fn whitening_conjugation_preserves_spectrum() {
    // W∘C∘W⁻¹ is a similarity transform: same eigenvalues, same radius.
    let basis = study_basis();
    let chain = build_chain_0(&basis).unwrap();
    let whitened = apply_whitening_if_enabled(chain.clone(), &basis, true).unwrap();

    let plain = analyze_operator(&chain).unwrap();
    let conj = analyze_operator(&whitened).unwrap();
    let rel = (plain.metrics.spectral_radius - conj.metrics.spectral_radius).abs()
        / plain.metrics.spectral_radius;
    assert!(
        rel < ITERATIVE_F64,
        "similarity transform changed the spectral radius by {rel}"
    );
}

#[test]
fn whitening_round_trip_is_lossless() {
    let basis = study_basis();
    let chain = build_chain_0(&basis).unwrap();
    let whitened = apply_whitening_if_enabled(chain.clone(), &basis, true).unwrap();
    let (w, w_inv) = whitening_operators(&basis).unwrap();
    let back = w_inv.compose(&whitened).unwrap().compose(&w).unwrap();
    let rel = (back.matrix() - chain.matrix()).norm() / chain.matrix().norm();
    assert!(rel < ITERATIVE_F64, "round-trip relative error {rel}");
}

#[test]
fn mismatched_dimensions_are_rejected() {
    let basis = study_basis();
    let wrong = SpectralOperator::<f64>::identity(basis.dim() + 1);
    let chain = build_chain_0(&basis).unwrap();
    assert!(matches!(
        chain.compose(&wrong),
        Err(FrstaError::DimensionMismatch { .. })
    ));

    let short = DVector::from_element(10, 1.0);
    assert!(matches!(
        build_multiplication_operator(&basis, &short),
        Err(FrstaError::DimensionMismatch { .. })
    ));
}

#[test]
fn chain_diagnostics_are_finite_and_consistent() {
    let basis = study_basis();
    for (name, chain) in build_all_chains(&basis).unwrap() {
        let diag = analyze_operator(&chain).unwrap();
        assert!(
            diag.metrics.spectral_radius.is_finite() && diag.metrics.spectral_radius > 0.0,
            "{name} radius {}",
            diag.metrics.spectral_radius
        );
        assert!(diag.metrics.condition_number >= 1.0, "{name} conditioning");
        assert!(diag.metrics.frobenius_norm > 0.0);
        assert!(diag.metrics.non_normality >= 0.0);
        // Radius never exceeds the largest singular value.
        let s_max: f64 = diag.singular_values[0];
        assert!(
            diag.metrics.spectral_radius <= s_max + ITERATIVE_F64,
            "{name}: radius {} above s_max {s_max}",
            diag.metrics.spectral_radius
        );
    }
}

#[test]
fn dispersion_operator_is_chain_2() {
    let basis = study_basis();
    let chains = build_all_chains(&basis).unwrap();
    let dispersion = dispersion_operator(&basis).unwrap();
    assert!((chains[2].1.matrix() - dispersion.matrix()).norm() < EXACT_F64);
}
