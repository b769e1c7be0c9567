//! Transmittance of elliptical Gaussian beams through a circular aperture.
//!
//! Two routes are provided: the analytical elliptic-beam approximation
//! (Vasylyev, Semenov, Vogel), and direct numerical integration of the
//! intensity profile over the aperture disk.

use std::f64::consts::PI;

use crate::pdt::shape_parameters;
use crate::special::{bessel_i0e, lambert_w_exp};

/// Instantaneous elliptical beam at the receiver plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipticBeam {
    /// Centroid x coordinate.
    pub x0: f64,
    /// Centroid y coordinate.
    pub y0: f64,
    /// First semi-axis.
    pub w1: f64,
    /// Second semi-axis.
    pub w2: f64,
    /// Angle between the first semi-axis and the x axis.
    pub phi: f64,
}

/// Transmittance of the beam through a centred circular aperture of radius
/// `aperture`, in the elliptic-beam approximation.
pub fn elliptic_beam_transmittance(aperture: f64, beam: &EllipticBeam) -> f64 {
    let a2 = aperture * aperture;
    let (w1, w2) = (beam.w1, beam.w2);
    let inv1 = 1.0 / (w1 * w1);
    let inv2 = 1.0 / (w2 * w2);

    let eta0 = {
        let y_diff = (a2 * (inv1 - inv2)).abs();
        let y_sum = a2 * (inv1 + inv2);
        let centred = bessel_i0e(y_diff) * (y_diff - y_sum).exp();

        let xi = 1.0 / w1 - 1.0 / w2;
        let asymmetric = if xi == 0.0 {
            0.0
        } else {
            let y = a2 * xi * xi;
            let (lambda, scale) = shape_parameters(y);
            let ratio = (w1 + w2).powi(2) / (w1 * w1 - w2 * w2).abs();
            -2.0 * (-y / 2.0).exp_m1() * (-(ratio / scale).powf(lambda)).exp()
        };
        1.0 - centred - asymmetric
    };

    let r0 = beam.x0.hypot(beam.y0);
    if r0 == 0.0 {
        return eta0;
    }
    let angle = beam.phi - beam.y0.atan2(beam.x0);
    let (sin, cos) = angle.sin_cos();

    // y_eff = a² (2 / W_eff)² = W(z) with
    // ln z = ln(4a²/(W1 W2)) + (a²/W1²)(1 + 2cos²) + (a²/W2²)(1 + 2sin²)
    let ln_z = (4.0 * a2 / (w1 * w2)).ln()
        + a2 * inv1 * (1.0 + 2.0 * cos * cos)
        + a2 * inv2 * (1.0 + 2.0 * sin * sin);
    let y_eff = lambert_w_exp(ln_z);
    let (lambda, scale) = shape_parameters(y_eff);
    eta0 * (-(r0 / aperture / scale).powf(lambda)).exp()
}

/// Centroid and second central moments of a Gaussian intensity profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianProfile {
    pub x0: f64,
    pub y0: f64,
    /// Spot-size matrix `S = 4·cov`, entries `S_xx`, `S_yy`, `S_xy`.
    pub sxx: f64,
    pub syy: f64,
    pub sxy: f64,
}

/// Fraction of the beam power collected by a centred circular aperture,
/// integrated on a `resolution × resolution` grid spanning the aperture.
///
/// The intensity is `2/(π√det S) · exp(−2 (r−r0)ᵀ S⁻¹ (r−r0))`. Returns
/// `None` when `S` is not positive definite.
pub fn gaussian_aperture_power(
    aperture: f64,
    profile: &GaussianProfile,
    resolution: usize,
) -> Option<f64> {
    let det = profile.sxx * profile.syy - profile.sxy * profile.sxy;
    if !(det > 0.0 && profile.sxx > 0.0) || resolution == 0 {
        return None;
    }
    let (ixx, iyy, ixy) = (profile.syy / det, profile.sxx / det, -profile.sxy / det);
    let norm = 2.0 / (PI * det.sqrt());

    let cell = 2.0 * aperture / resolution as f64;
    let a2 = aperture * aperture;
    let mut power = 0.0;
    for i in 0..resolution {
        let x = -aperture + (i as f64 + 0.5) * cell;
        let dx = x - profile.x0;
        for j in 0..resolution {
            let y = -aperture + (j as f64 + 0.5) * cell;
            if x * x + y * y > a2 {
                continue;
            }
            let dy = y - profile.y0;
            let q = ixx * dx * dx + 2.0 * ixy * dx * dy + iyy * dy * dy;
            power += (-2.0 * q).exp();
        }
    }
    Some(power * norm * cell * cell)
}
