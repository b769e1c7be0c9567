//! Beam-centroid statistics of a channel: how far the simulated beam departs
//! from the Gaussian wandering picture the analytical models assume.

use serde::Serialize;

use crate::aperture::ApertureMap;
use crate::beam::{BeamSamples, ChannelParams};
use crate::channel::ChannelLayout;
use crate::error::ModelResult;
use crate::table::{CENTROID_COLUMNS, Table};

/// Sample statistics of one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub mean: f64,
    pub variance: f64,
    pub skewness: f64,
    pub excess_kurtosis: f64,
}

impl SeriesStats {
    /// Population variance with the biased skewness and kurtosis.
    pub fn of(data: &[f64]) -> Self {
        let mean = atmoslink_stats::mean(data);
        let variance = atmoslink_stats::mean(
            &data.iter().map(|x| (x - mean) * (x - mean)).collect::<Vec<_>>(),
        );
        Self {
            mean,
            variance,
            skewness: atmoslink_stats::skewness(data),
            excess_kurtosis: atmoslink_stats::excess_kurtosis(data),
        }
    }

    /// Sample variance (`n − 1`) with the adjusted skewness and unbiased
    /// excess kurtosis.
    pub fn unbiased(data: &[f64]) -> Self {
        Self {
            mean: atmoslink_stats::mean(data),
            variance: atmoslink_stats::sample_variance(data),
            skewness: atmoslink_stats::adjusted_skewness(data),
            excess_kurtosis: atmoslink_stats::adjusted_excess_kurtosis(data),
        }
    }
}

/// Correlation between the centroid displacement and the transmittance at one
/// aperture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ApertureCorrelation {
    pub aperture_radius: f64,
    /// Aperture radius divided by the long-term spot size `√lt2`.
    pub normed_radius: f64,
    pub correlation: Option<f64>,
}

/// Beam-centroid details of one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeamDetails {
    pub channel: String,
    /// Statistics of the centroid x coordinate.
    pub centroid_x: SeriesStats,
    /// Pearson correlation of `r₀` with the radial spot size `W²_r`, when the
    /// radial moment was recorded.
    pub r0_w2r_correlation: Option<f64>,
    /// Pearson correlation of `x₀` with each squared semi-axis `W²₁`, `W²₂`.
    pub x0_w2i_correlation: [Option<f64>; 2],
    /// Unbiased statistics of `(Θ₁ + Θ₂)/√2` and `(Θ₁ − Θ₂)/√2`.
    pub rotated_theta: [SeriesStats; 2],
    pub r0_eta: Vec<ApertureCorrelation>,
    pub r0_eta_tracked: Vec<ApertureCorrelation>,
}

/// Correlation of `r₀` with the transmittance at every aperture.
pub fn r0_eta_correlation(
    beam: &BeamSamples,
    transmittance: &ApertureMap<Vec<f64>>,
) -> Vec<ApertureCorrelation> {
    let r0 = beam.centroid_radii();
    let long_term = beam.params().lt2.sqrt();
    transmittance
        .iter()
        .map(|(radius, eta)| ApertureCorrelation {
            aperture_radius: radius,
            normed_radius: radius / long_term,
            correlation: atmoslink_stats::pearson(&r0, eta),
        })
        .collect()
}

/// `(Θ₁ + Θ₂)/√2` and `(Θ₁ − Θ₂)/√2` for every iteration with a valid spot.
pub fn rotated_theta(beam: &BeamSamples, w0: f64) -> (Vec<f64>, Vec<f64>) {
    let w02 = w0 * w0;
    beam.semiaxes()
        .into_iter()
        .map(|(w1, w2)| ((w1 / w02).ln(), (w2 / w02).ln()))
        .filter(|(t1, t2)| t1.is_finite() && t2.is_finite())
        .map(|(t1, t2)| {
            (
                (t1 + t2) / std::f64::consts::SQRT_2,
                (t1 - t2) / std::f64::consts::SQRT_2,
            )
        })
        .unzip()
}

impl BeamDetails {
    pub fn compute(
        channel: &str,
        beam: &BeamSamples,
        params: &ChannelParams,
        transmittance: &ApertureMap<Vec<f64>>,
        tracked: &ApertureMap<Vec<f64>>,
    ) -> Self {
        let semiaxes = beam.semiaxes();
        let (w2_1, w2_2): (Vec<f64>, Vec<f64>) = semiaxes.into_iter().unzip();
        let r0_w2r_correlation = beam
            .radial_spot_size()
            .and_then(|w2r| atmoslink_stats::pearson(&beam.centroid_radii(), &w2r));
        let (sum, difference) = rotated_theta(beam, params.source.w0);

        Self {
            channel: channel.to_string(),
            centroid_x: SeriesStats::of(&beam.mean_x),
            r0_w2r_correlation,
            x0_w2i_correlation: [
                atmoslink_stats::pearson(&beam.mean_x, &w2_1),
                atmoslink_stats::pearson(&beam.mean_x, &w2_2),
            ],
            rotated_theta: [SeriesStats::unbiased(&sum), SeriesStats::unbiased(&difference)],
            r0_eta: r0_eta_correlation(beam, transmittance),
            r0_eta_tracked: r0_eta_correlation(beam, tracked),
        }
    }

    /// Load the channel's simulator output and compute its details.
    pub fn load(layout: &ChannelLayout) -> ModelResult<Self> {
        let beam = BeamSamples::read_csv(&layout.beam())?;
        let params = ChannelParams::read_json(&layout.params())?;
        let transmittance = Table::read_csv(&layout.transmittance())?.into_aperture_map()?;
        let mut tracked = Table::read_csv(&layout.tracked_transmittance())?;
        tracked.drop_columns(&CENTROID_COLUMNS);
        let tracked = tracked.into_aperture_map()?;
        Ok(Self::compute(
            &layout.name,
            &beam,
            &params,
            &transmittance,
            &tracked,
        ))
    }
}
