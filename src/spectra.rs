// SPDX-License-Identifier: AGPL-3.0-only

//! Probe-spectrum library: the input signals transported through chains.
//!
//! Two families:
//!   - **IRL** — physically plausible sources (blackbody radiators, LED-like
//!     Gaussians, broadband fills, a narrow laser line)
//!   - **HOSTILE** — signals built to stress the basis (near-edge lobes,
//!     high-frequency modulations, sub-resolution peaks)
//!
//! Every library entry is normalized to unit integral over the domain, with
//! a small epsilon guard so a pathological all-zero signal cannot divide by
//! zero.

use crate::error::FrstaError;
use crate::geometry::SpectralDomain;
use crate::precision::Real;
use crate::tolerances::DRIFT_EPSILON;
use nalgebra::DVector;

/// Planck constant (J·s), CODATA 2018 exact.
const PLANCK_H: f64 = 6.626_070_15e-34;
/// Speed of light in vacuum (m/s), exact.
const LIGHT_C: f64 = 2.997_924_58e8;
/// Boltzmann constant (J/K), CODATA 2018 exact.
const BOLTZMANN_K: f64 = 1.380_649e-23;

/// Unnormalized Gaussian bump `exp(−(λ−c)²/(2w²))` over the grid.
#[must_use]
pub fn gaussian<T: Real>(domain: &SpectralDomain<T>, center: f64, width: f64) -> DVector<T> {
    let c = T::from_f64_lossy(center);
    let w = T::from_f64_lossy(width);
    let two = T::from_f64_lossy(2.0);
    domain.lambda().map(|l| {
        let d = l - c;
        (-(d * d) / (two * w * w)).exp()
    })
}

/// Planck blackbody spectral radiance at temperature `t_kelvin`, sampled
/// over the nm wavelength grid (converted to meters internally).
#[must_use]
pub fn blackbody<T: Real>(domain: &SpectralDomain<T>, t_kelvin: f64) -> DVector<T> {
    let h = T::from_f64_lossy(PLANCK_H);
    let c = T::from_f64_lossy(LIGHT_C);
    let k = T::from_f64_lossy(BOLTZMANN_K);
    let temp = T::from_f64_lossy(t_kelvin);
    let nm = T::from_f64_lossy(1e-9);
    let one = T::one();
    let numerator = T::from_f64_lossy(2.0) * h * c * c;
    domain.lambda().map(|l| {
        let lm = l * nm;
        let exponent = (h * c) / (lm * k * temp);
        numerator / (lm.powi(5) * (exponent.exp() - one))
    })
}

/// Normalize a spectrum to unit integral over the domain.
///
/// # Errors
///
/// `DimensionMismatch` if the spectrum length differs from the domain.
pub fn normalize<T: Real>(
    domain: &SpectralDomain<T>,
    spectrum: DVector<T>,
) -> Result<DVector<T>, FrstaError> {
    let integral = domain.integrate(&spectrum)?;
    let eps = T::from_f64_lossy(DRIFT_EPSILON);
    Ok(spectrum / (integral + eps))
}

/// The full named probe library, unit-normalized, in a fixed order.
///
/// # Errors
///
/// Propagates `DimensionMismatch` from normalization (cannot occur for
/// spectra built over the same domain; kept for contract uniformity).
pub fn probe_library<T: Real>(
    domain: &SpectralDomain<T>,
) -> Result<Vec<(&'static str, DVector<T>)>, FrstaError> {
    let l = domain.lambda();
    let one = T::one();
    let half = T::from_f64_lossy(0.5);

    let raw: Vec<(&'static str, DVector<T>)> = vec![
        ("spectrum_00_IRL", blackbody(domain, 6500.0)),
        ("spectrum_01_IRL", blackbody(domain, 2800.0)),
        (
            "spectrum_02_IRL",
            gaussian(domain, 450.0, 18.0) + gaussian(domain, 580.0, 40.0) * T::from_f64_lossy(1.5),
        ),
        ("spectrum_03_IRL", gaussian(domain, 630.0, 15.0)),
        ("spectrum_04_IRL", gaussian(domain, 540.0, 18.0)),
        ("spectrum_05_IRL", gaussian(domain, 460.0, 15.0)),
        (
            "spectrum_06_IRL",
            gaussian(domain, 520.0, 80.0) * half + DVector::from_element(l.len(), T::from_f64_lossy(0.3)),
        ),
        ("spectrum_07_IRL", gaussian(domain, 532.0, 3.0)),
        (
            "spectrum_08_HOSTILE",
            gaussian(domain, 430.0, 10.0) + gaussian(domain, 610.0, 12.0),
        ),
        (
            "spectrum_09_HOSTILE",
            l.map(|x| one + T::from_f64_lossy(0.8) * (T::from_f64_lossy(0.05) * x).cos()),
        ),
        (
            "spectrum_10_HOSTILE",
            gaussian(domain, 500.0, 5.0) + DVector::from_element(l.len(), T::from_f64_lossy(0.2)),
        ),
        (
            "spectrum_11_HOSTILE",
            l.map(|x| one + half * (T::from_f64_lossy(0.12) * x).sin()),
        ),
        ("spectrum_12_HOSTILE", gaussian(domain, 390.0, 20.0)),
        ("spectrum_13_HOSTILE", gaussian(domain, 760.0, 25.0)),
        (
            "spectrum_14_HOSTILE",
            gaussian(domain, 450.0, 10.0)
                + gaussian(domain, 520.0, 15.0)
                + gaussian(domain, 610.0, 12.0),
        ),
        ("spectrum_15_HOSTILE", gaussian(domain, 555.0, 2.0)),
    ];

    raw.into_iter()
        .map(|(name, s)| normalize(domain, s).map(|n| (name, n)))
        .collect()
}
