//! Transmittance distribution laws and goodness-of-fit statistics.
//!
//! Numeric kernel behind the `atmoslink` model family: density histograms over
//! fixed bin edges, cumulative densities, the Kolmogorov–Smirnov distance
//! between two binned distributions, and the closed-form and semi-analytical
//! transmittance laws of turbulent free-space channels.

pub mod elliptic;
pub mod pdt;
pub mod special;

use statrs::statistics::Statistics;

pub use elliptic::{EllipticBeam, GaussianProfile, elliptic_beam_transmittance, gaussian_aperture_power};
pub use pdt::{WanderingLaw, beam_wandering_pdt, beta_pdt, lognormal_pdt};

// ═══════════════════════════════════════════════════════════════════════════════
// Axes
// ═══════════════════════════════════════════════════════════════════════════════

/// `n` evenly spaced points from `start` to `end` inclusive. The last point is
/// exactly `end`.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut points: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            points[n - 1] = end;
            points
        }
    }
}

/// Midpoints of consecutive edges; one fewer element than `edges`.
pub fn midpoints(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Binned densities
// ═══════════════════════════════════════════════════════════════════════════════

/// Density histogram of `samples` over `edges`.
///
/// Bins are half-open except the last, which is closed. Samples outside the
/// edge range (and NaNs) are ignored; the density is normalised by the count of
/// in-range samples, so it integrates to one over the edges. An empty histogram
/// is all zeros.
pub fn density_histogram(samples: &[f64], edges: &[f64]) -> Vec<f64> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let bins = edges.len() - 1;
    let (first, last) = (edges[0], edges[bins]);
    let mut counts = vec![0u64; bins];
    for &x in samples {
        if !(x >= first && x <= last) {
            continue;
        }
        let idx = if x == last {
            bins - 1
        } else {
            edges.partition_point(|&e| e <= x) - 1
        };
        counts[idx] += 1;
    }

    let total: u64 = counts.iter().sum();
    if total == 0 {
        return vec![0.0; bins];
    }
    counts
        .iter()
        .zip(edges.windows(2))
        .map(|(&c, w)| c as f64 / total as f64 / (w[1] - w[0]))
        .collect()
}

/// Cumulative density: running sum of `pdt · Δedges`.
///
/// Returns `None` when `pdt` does not have one element per bin.
pub fn cumulative_density(pdt: &[f64], edges: &[f64]) -> Option<Vec<f64>> {
    if edges.len() != pdt.len() + 1 {
        return None;
    }
    let mut acc = 0.0;
    Some(
        pdt.iter()
            .zip(edges.windows(2))
            .map(|(&p, w)| {
                acc += p * (w[1] - w[0]);
                acc
            })
            .collect(),
    )
}

/// Kolmogorov–Smirnov distance between two cumulative densities sampled on the
/// same axis: `max |a − b|`.
///
/// Returns `None` when the lengths differ. NaN entries propagate.
pub fn ks_distance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    Some(
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, |acc, d| if d.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(d) }),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Moments
// ═══════════════════════════════════════════════════════════════════════════════

/// Population mean. Zero for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// First and second raw moments `(⟨x⟩, ⟨x²⟩)`.
pub fn raw_moments(data: &[f64]) -> (f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0);
    }
    let n = data.len() as f64;
    let (s1, s2) = data
        .iter()
        .fold((0.0, 0.0), |(s1, s2), &x| (s1 + x, s2 + x * x));
    (s1 / n, s2 / n)
}

/// Biased sample skewness `m3 / m2^{3/2}`.
pub fn skewness(data: &[f64]) -> f64 {
    let (m2, m3, _) = central_moments(data);
    if m2 == 0.0 { 0.0 } else { m3 / m2.powf(1.5) }
}

/// Biased excess kurtosis `m4 / m2² − 3`.
pub fn excess_kurtosis(data: &[f64]) -> f64 {
    let (m2, _, m4) = central_moments(data);
    if m2 == 0.0 { 0.0 } else { m4 / (m2 * m2) - 3.0 }
}

/// Sample variance with `n − 1` in the denominator. NaN below two values.
pub fn sample_variance(data: &[f64]) -> f64 {
    data.iter().variance()
}

/// Adjusted Fisher–Pearson skewness `G1 = g1 √(n(n−1)) / (n−2)`. NaN below
/// three values.
pub fn adjusted_skewness(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    if data.len() < 3 {
        return f64::NAN;
    }
    skewness(data) * (n * (n - 1.0)).sqrt() / (n - 2.0)
}

/// Unbiased excess kurtosis `G2 = ((n+1) g2 + 6)(n−1) / ((n−2)(n−3))`. NaN
/// below four values.
pub fn adjusted_excess_kurtosis(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    if data.len() < 4 {
        return f64::NAN;
    }
    let (m2, _, _) = central_moments(data);
    if m2 == 0.0 {
        return 0.0;
    }
    ((n + 1.0) * excess_kurtosis(data) + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

fn central_moments(data: &[f64]) -> (f64, f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mu = mean(data);
    let n = data.len() as f64;
    let (m2, m3, m4) = data.iter().fold((0.0, 0.0, 0.0), |(m2, m3, m4), &x| {
        let d = x - mu;
        let d2 = d * d;
        (m2 + d2, m3 + d2 * d, m4 + d2 * d2)
    });
    (m2 / n, m3 / n, m4 / n)
}

/// Pearson correlation coefficient. `None` for mismatched lengths or a
/// constant series.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.is_empty() {
        return None;
    }
    let (mx, my) = (mean(x), mean(y));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (&a, &b) in x.iter().zip(y) {
        let (da, db) = (a - mx, b - my);
        sxy += da * db;
        sxx += da * da;
        syy += db * db;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}
