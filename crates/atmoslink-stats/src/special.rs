//! Special functions used by the transmittance laws.
//!
//! The modified Bessel functions are returned exponentially scaled
//! (`e^{-x} I_n(x)`), which is the only form the aperture laws need and the
//! only form that stays finite for wide apertures. Moderate arguments go
//! through `scilib`; beyond [`ASYMPTOTIC_LIMIT`] the unscaled value would
//! overflow, so the scaled Hankel expansion takes over.

use scilib::math::bessel;

/// Power-series range of the `1 - I0e` tail.
const SERIES_LIMIT: f64 = 3.75;

/// Crossover between `scilib` and the scaled asymptotic expansion.
pub const ASYMPTOTIC_LIMIT: f64 = 30.0;

const MAX_SERIES_TERMS: usize = 64;
const MAX_ITERATIONS: usize = 64;

/// `Σ_{k≥1} (x²/4)^k / (k!)²`, i.e. `I0(x) - 1`.
fn i0_series_tail(x: f64) -> f64 {
    let q = x * x / 4.0;
    let mut term = 1.0;
    let mut sum = 0.0;
    for k in 1..MAX_SERIES_TERMS {
        let kf = k as f64;
        term *= q / (kf * kf);
        sum += term;
        if term < sum * f64::EPSILON {
            break;
        }
    }
    sum
}

/// `e^{-x} I_ν(x) ≈ (2πx)^{-1/2} Σ_k (-1)^k a_k(ν) / x^k` for large `x`,
/// truncated once the terms stop shrinking.
fn scaled_i_asymptotic(order: f64, x: f64) -> f64 {
    let mu = 4.0 * order * order;
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..MAX_SERIES_TERMS {
        let odd = (2 * k - 1) as f64;
        let next = -term * (mu - odd * odd) / (k as f64 * 8.0 * x);
        if next.abs() >= term.abs() {
            break;
        }
        term = next;
        sum += term;
        if term.abs() < sum.abs() * f64::EPSILON {
            break;
        }
    }
    sum / (2.0 * std::f64::consts::PI * x).sqrt()
}

/// `e^{-x} I_ν(x)` for `x >= 0`.
fn scaled_i(order: f64, x: f64) -> f64 {
    if x < ASYMPTOTIC_LIMIT {
        (-x).exp() * bessel::i_nu(order, x.into()).re
    } else {
        scaled_i_asymptotic(order, x)
    }
}

/// Exponentially scaled modified Bessel function of the first kind, order 0.
pub fn bessel_i0e(x: f64) -> f64 {
    let ax = x.abs();
    if ax == 0.0 {
        return 1.0;
    }
    scaled_i(0.0, ax)
}

/// Exponentially scaled modified Bessel function of the first kind, order 1.
pub fn bessel_i1e(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    let value = scaled_i(1.0, x.abs());
    if x < 0.0 { -value } else { value }
}

/// `1 - e^{-x} I0(x)` without cancellation for small `x`.
pub fn one_minus_bessel_i0e(x: f64) -> f64 {
    let ax = x.abs();
    if ax < SERIES_LIMIT {
        -(-ax).exp_m1() - (-ax).exp() * i0_series_tail(ax)
    } else {
        1.0 - bessel_i0e(ax)
    }
}

/// Principal branch of the Lambert W function evaluated at `z = e^{ln_z}`.
///
/// Taking the logarithm of the argument lets callers pass arguments whose
/// exponent would overflow `f64`, which is routine for wide apertures in the
/// elliptic-beam law.
pub fn lambert_w_exp(ln_z: f64) -> f64 {
    if ln_z.is_nan() {
        return f64::NAN;
    }
    if ln_z == f64::INFINITY {
        return f64::INFINITY;
    }

    if ln_z < 1.0 {
        // Halley iteration on w e^w = z, 0 <= w < 1.
        let z = ln_z.exp();
        let mut w = z.ln_1p();
        for _ in 0..MAX_ITERATIONS {
            let ew = w.exp();
            let f = w * ew - z;
            let wp1 = w + 1.0;
            let step = f / (ew * wp1 - (w + 2.0) * f / (2.0 * wp1));
            w -= step;
            if step.abs() <= 4.0 * f64::EPSILON * (1.0 + w.abs()) {
                break;
            }
        }
        return w;
    }

    // Newton iteration on w + ln w = ln z. The function is concave, so starting
    // left of the root the iterates increase monotonically onto it.
    let mut w = ln_z - ln_z.ln();
    for _ in 0..MAX_ITERATIONS {
        let f = w + w.ln() - ln_z;
        let step = f / (1.0 + 1.0 / w);
        w -= step;
        if step.abs() <= 4.0 * f64::EPSILON * w.abs() {
            break;
        }
    }
    w
}
