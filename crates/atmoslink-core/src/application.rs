//! Squeezed-light transmission through a fading channel with post-selection.
//!
//! A quadrature-squeezed state with input squeezing `S_in` (dB, negative for
//! squeezing) sent through a channel of mean efficiency `⟨η⟩` keeps
//! `S_out = 10 log10(⟨η⟩ (10^{S_in/10} − 1) + 1)`. Post-selecting the
//! realisations with `η > t` raises `⟨η⟩` at the cost of discarded data.

use std::path::Path;

use serde::Serialize;

use crate::error::ModelResult;
use crate::export;

/// Output squeezing in dB for mean efficiency `mean_eta`.
pub fn output_squeezing(mean_eta: f64, squeezing_in_db: f64) -> f64 {
    let variance_in = 10f64.powf(squeezing_in_db / 10.0);
    10.0 * (mean_eta * (variance_in - 1.0) + 1.0).log10()
}

/// Mean efficiency of the curve points with `η > threshold`, weighted by
/// density. `None` when no density remains.
pub fn postselected_mean(curve: &[(f64, f64)], threshold: f64) -> Option<f64> {
    let (norm, product) = curve
        .iter()
        .filter(|(eta, _)| *eta > threshold)
        .fold((0.0, 0.0), |(norm, product), (eta, p)| (norm + p, product + p * eta));
    if norm > 0.0 { Some(product / norm) } else { None }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SqueezingPoint {
    pub threshold: f64,
    /// Output squeezing in dB; `None` when the threshold discards everything.
    pub squeezing_db: Option<f64>,
}

/// Detector and source settings of a squeezing evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SqueezingSetup {
    /// Detection efficiency applied on top of the channel transmittance.
    pub eta_det: f64,
    /// Input squeezing in dB.
    pub squeezing_in_db: f64,
}

impl SqueezingSetup {
    /// Detection efficiency from fibre losses in dB/km over `length_km` and an
    /// optical system efficiency.
    pub fn detection_efficiency(losses_db_per_km: f64, length_km: f64, optical: f64) -> f64 {
        10f64.powf(-losses_db_per_km * length_km / 10.0) * optical
    }

    /// Output squeezing for every threshold applied to the channel
    /// transmittance. `eta_det` scales the post-selected mean afterwards.
    pub fn sweep_channel(&self, curve: &[(f64, f64)], thresholds: &[f64]) -> Vec<SqueezingPoint> {
        thresholds
            .iter()
            .map(|&threshold| SqueezingPoint {
                threshold,
                squeezing_db: postselected_mean(curve, threshold)
                    .map(|mean| output_squeezing(self.eta_det * mean, self.squeezing_in_db)),
            })
            .collect()
    }

    /// Output squeezing for every threshold applied to the detected
    /// transmittance: the curve is scaled by `eta_det` before thresholding.
    pub fn sweep(&self, curve: &[(f64, f64)], thresholds: &[f64]) -> Vec<SqueezingPoint> {
        let detected: Vec<(f64, f64)> = curve
            .iter()
            .map(|&(eta, p)| (eta * self.eta_det, p))
            .collect();
        thresholds
            .iter()
            .map(|&threshold| SqueezingPoint {
                threshold,
                squeezing_db: postselected_mean(&detected, threshold)
                    .map(|mean| output_squeezing(mean, self.squeezing_in_db)),
            })
            .collect()
    }
}

/// Squeezing at fixed thresholds for one aperture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApertureSqueezing {
    pub aperture_radius: f64,
    /// Aperture radius divided by the long-term spot size `√lt2`.
    pub normed_radius: f64,
    pub points: Vec<SqueezingPoint>,
}

/// Sweep thresholds on the detected transmittance of one exported curve.
pub fn squeezing_for_aperture(
    results_dir: &Path,
    channel: &str,
    model: &str,
    radius: f64,
    setup: &SqueezingSetup,
    thresholds: &[f64],
) -> ModelResult<Vec<SqueezingPoint>> {
    let curve = export::read_curve(&export::curve_path(results_dir, channel, model, radius))?;
    Ok(setup.sweep(&curve, thresholds))
}

/// Squeezing at each threshold for every exported aperture of `model`.
/// Thresholds apply to the channel transmittance, before detection.
pub fn squeezing_by_aperture(
    results_dir: &Path,
    channel: &str,
    model: &str,
    setup: &SqueezingSetup,
    thresholds: &[f64],
) -> ModelResult<Vec<ApertureSqueezing>> {
    let params = export::read_beam_params(
        &export::channel_dir(results_dir, channel).join("beam_params.csv"),
    )?;
    let long_term = params.lt2.sqrt();
    export::exported_radii(results_dir, channel, model)?
        .into_iter()
        .map(|radius| {
            Ok(ApertureSqueezing {
                aperture_radius: radius,
                normed_radius: radius / long_term,
                points: setup.sweep_channel(
                    &export::read_curve(&export::curve_path(results_dir, channel, model, radius))?,
                    thresholds,
                ),
            })
        })
        .collect()
}
