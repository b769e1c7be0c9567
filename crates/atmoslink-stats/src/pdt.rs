//! Closed-form probability densities of transmittance (PDT).
//!
//! Every function evaluates a density on a caller-supplied transmittance axis
//! and returns one value per axis point. Moment-matched laws return an all-zero
//! density when the supplied moments cannot describe a distribution on (0, 1].

use statrs::distribution::{Beta, Continuous, LogNormal};

use crate::special::{bessel_i1e, one_minus_bessel_i0e};

// ═══════════════════════════════════════════════════════════════════════════════
// Moment-matched laws
// ═══════════════════════════════════════════════════════════════════════════════

/// Log-normal density matched to the first two raw moments of the transmittance.
///
/// `σ² = ln(⟨η²⟩/⟨η⟩²)` and `μ = ln⟨η⟩ − σ²/2`.
pub fn lognormal_pdt(eta: &[f64], mean: f64, second_moment: f64) -> Vec<f64> {
    if !(mean > 0.0) || !(second_moment > mean * mean) {
        return vec![0.0; eta.len()];
    }
    let sigma2 = (second_moment / (mean * mean)).ln();
    let mu = mean.ln() - sigma2 / 2.0;
    let Ok(dist) = LogNormal::new(mu, sigma2.sqrt()) else {
        return vec![0.0; eta.len()];
    };
    eta.iter()
        .map(|&x| if x > 0.0 { dist.pdf(x) } else { 0.0 })
        .collect()
}

/// Beta density matched to the first two raw moments of the transmittance.
///
/// `α = ⟨η⟩(⟨η⟩ − ⟨η²⟩) / (⟨η²⟩ − ⟨η⟩²)` and `β = α(1 − ⟨η⟩)/⟨η⟩`.
pub fn beta_pdt(eta: &[f64], mean: f64, second_moment: f64) -> Vec<f64> {
    let variance = second_moment - mean * mean;
    if !(mean > 0.0 && mean < 1.0) || !(variance > 0.0) || !(second_moment < mean) {
        return vec![0.0; eta.len()];
    }
    let alpha = mean * (mean - second_moment) / variance;
    let beta = alpha * (1.0 - mean) / mean;
    let Ok(dist) = Beta::new(alpha, beta) else {
        return vec![0.0; eta.len()];
    };
    eta.iter()
        .map(|&x| if x > 0.0 && x < 1.0 { dist.pdf(x) } else { 0.0 })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Beam wandering
// ═══════════════════════════════════════════════════════════════════════════════

/// Shape and scale of the aperture transmittance law `exp(−(r/R)^λ)` for a
/// circular aperture of radius `a` and a Gaussian profile with inverse width
/// `ξ`, parameterised by `y = a²ξ²`.
///
/// Returns `(λ, R/a)`.
pub(crate) fn shape_parameters(y: f64) -> (f64, f64) {
    let numerator = -2.0 * (-y / 2.0).exp_m1();
    let denominator = one_minus_bessel_i0e(y);
    let ln_term = ((numerator - denominator) / denominator).ln_1p();
    let lambda = 2.0 * y * bessel_i1e(y) / denominator / ln_term;
    let scale = ln_term.powf(-1.0 / lambda);
    (lambda, scale)
}

/// Transmittance law of a round Gaussian beam wandering over a circular aperture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WanderingLaw {
    /// Transmittance of the centred beam.
    pub eta0: f64,
    /// Shape exponent.
    pub lambda: f64,
    /// Scale radius, in the units of the aperture radius.
    pub scale: f64,
}

impl WanderingLaw {
    /// Law for aperture radius `aperture` and squared short-term beam width `w2`.
    pub fn new(aperture: f64, w2: f64) -> Self {
        let y = 4.0 * aperture * aperture / w2;
        let (lambda, scale) = shape_parameters(y);
        Self {
            eta0: -(-y / 2.0).exp_m1(),
            lambda,
            scale: aperture * scale,
        }
    }

    /// Transmittance for a beam centroid displaced by `r0` from the aperture centre.
    pub fn transmittance(&self, r0: f64) -> f64 {
        self.eta0 * (-(r0 / self.scale).powf(self.lambda)).exp()
    }

    /// Density of transmittance when the displacement is Rayleigh distributed
    /// with per-axis variance `bw2`.
    pub fn pdf(&self, eta: f64, bw2: f64) -> f64 {
        if !(eta > 0.0 && eta < self.eta0) {
            return 0.0;
        }
        let l = (self.eta0 / eta).ln();
        let r2 = self.scale * self.scale;
        r2 / (bw2 * self.lambda * eta)
            * l.powf(2.0 / self.lambda - 1.0)
            * (-r2 * l.powf(2.0 / self.lambda) / (2.0 * bw2)).exp()
    }

    /// Cumulative distribution matching [`WanderingLaw::pdf`].
    pub fn cdf(&self, eta: f64, bw2: f64) -> f64 {
        if eta <= 0.0 {
            return 0.0;
        }
        if eta >= self.eta0 {
            return 1.0;
        }
        let l = (self.eta0 / eta).ln();
        (-self.scale * self.scale * l.powf(2.0 / self.lambda) / (2.0 * bw2)).exp()
    }
}

/// Beam-wandering PDT for aperture radius `aperture`, squared short-term beam
/// width `st2` and beam-wander variance `bw2`.
pub fn beam_wandering_pdt(eta: &[f64], aperture: f64, st2: f64, bw2: f64) -> Vec<f64> {
    let law = WanderingLaw::new(aperture, st2);
    eta.iter().map(|&x| law.pdf(x, bw2)).collect()
}
