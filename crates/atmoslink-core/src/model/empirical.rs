//! The empirical reference model built directly from simulated samples.

use std::path::Path;

use crate::aperture::BinEdges;
use crate::beam::{BeamParams, BeamSamples};
use crate::error::{ModelError, ModelResult};
use crate::model::{DensityCache, Series, TransmittanceModel};
use crate::table::{CENTROID_COLUMNS, Table};

/// Which raw transmittance table the model was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Plain aperture columns.
    Untracked,
    /// Aperture-tracking compensated; the table carries centroid columns
    /// that are dropped before the aperture headers are read.
    Tracked,
}

impl SampleKind {
    pub fn model_name(self) -> &'static str {
        match self {
            Self::Untracked => "numerical",
            Self::Tracked => "tracked_numerical",
        }
    }
}

/// Ground-truth statistics of one channel.
#[derive(Debug)]
pub struct EmpiricalModel {
    kind: SampleKind,
    transmittance: Series,
    beam: BeamSamples,
    beam_params: BeamParams,
    bin_edges: BinEdges,
    cache: DensityCache,
}

impl EmpiricalModel {
    /// Histogram bins per aperture when the caller has no preference.
    pub const DEFAULT_ETA_BINS: usize = 100;

    /// Load samples from the transmittance and beam CSV files.
    pub fn load(
        transmittance_path: &Path,
        beam_path: &Path,
        kind: SampleKind,
        eta_bins: usize,
    ) -> ModelResult<Self> {
        let table = Table::read_csv(transmittance_path)?;
        let beam = BeamSamples::read_csv(beam_path)?;
        Self::from_table(table, beam, kind, eta_bins)
    }

    pub fn from_table(
        mut table: Table,
        beam: BeamSamples,
        kind: SampleKind,
        eta_bins: usize,
    ) -> ModelResult<Self> {
        if kind == SampleKind::Tracked {
            table.drop_columns(&CENTROID_COLUMNS);
        }
        Self::from_samples(table.into_aperture_map()?, beam, kind, eta_bins)
    }

    pub fn from_samples(
        transmittance: Series,
        beam: BeamSamples,
        kind: SampleKind,
        eta_bins: usize,
    ) -> ModelResult<Self> {
        if transmittance.is_empty() {
            return Err(ModelError::ShapeMismatch(
                "transmittance table has no aperture columns".to_string(),
            ));
        }
        let bin_edges = BinEdges::from_samples(&transmittance, eta_bins)?;
        let beam_params = beam.params();
        log::debug!(
            "{}: {} apertures, {} beam samples, bw2={:.3e} st2={:.3e} lt2={:.3e}",
            kind.model_name(),
            transmittance.len(),
            beam.len(),
            beam_params.bw2,
            beam_params.st2,
            beam_params.lt2
        );
        Ok(Self {
            kind,
            transmittance,
            beam,
            beam_params,
            bin_edges,
            cache: DensityCache::default(),
        })
    }

    pub fn beam(&self) -> &BeamSamples {
        &self.beam
    }

    pub fn beam_params(&self) -> BeamParams {
        self.beam_params
    }

    /// Raw samples. Unlike [`TransmittanceModel::transmittance`] this cannot fail.
    pub fn samples(&self) -> &Series {
        &self.transmittance
    }

    /// First and second raw moments of the samples at `radius`.
    pub fn moments(&self, radius: f64) -> ModelResult<(f64, f64)> {
        Ok(atmoslink_stats::raw_moments(
            self.transmittance.require(radius)?,
        ))
    }
}

impl TransmittanceModel for EmpiricalModel {
    fn name(&self) -> &'static str {
        self.kind.model_name()
    }

    fn bin_edges(&self) -> &BinEdges {
        &self.bin_edges
    }

    fn cache(&self) -> &DensityCache {
        &self.cache
    }

    fn transmittance(&self) -> ModelResult<&Series> {
        Ok(&self.transmittance)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic uniform samples on [0, 1) (simple LCG).
    pub(crate) fn pseudo_uniform(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 11) as f64 / (1u64 << 53) as f64
            })
            .collect()
    }

    /// Beam samples with centroids spread over ±`spread` and spot size `w2`.
    pub(crate) fn synthetic_beam(n: usize, spread: f64, w2: f64) -> BeamSamples {
        let xs: Vec<f64> = pseudo_uniform(n, 7).iter().map(|u| (u - 0.5) * 2.0 * spread).collect();
        let ys: Vec<f64> = pseudo_uniform(n, 11).iter().map(|u| (u - 0.5) * 2.0 * spread).collect();
        let wobble = pseudo_uniform(n, 13);
        BeamSamples {
            mean_x2: xs.iter().zip(&wobble).map(|(x, u)| x * x + w2 * (0.9 + 0.2 * u) / 4.0).collect(),
            mean_y2: ys.iter().zip(&wobble).map(|(y, u)| y * y + w2 * (1.1 - 0.2 * u) / 4.0).collect(),
            mean_xy: xs.iter().zip(&ys).zip(&wobble).map(|((x, y), u)| x * y + w2 * (u - 0.5) * 0.02).collect(),
            mean_x: xs,
            mean_y: ys,
            mean_x2_r: None,
        }
    }

    /// Single-aperture empirical model over uniform samples.
    pub(crate) fn uniform_model(n: usize, bins: usize) -> EmpiricalModel {
        let mut samples = Series::new();
        samples.insert(0.01, pseudo_uniform(n, 42));
        EmpiricalModel::from_samples(samples, synthetic_beam(500, 0.004, 4e-4), SampleKind::Untracked, bins)
            .unwrap()
    }

    #[test]
    fn test_uniform_samples_give_flat_pdt() {
        let model = uniform_model(1000, 10);
        let edges = model.bin_edges().edges(0.01).unwrap();
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[10], 1.0);
        for p in model.pdt().unwrap().get(0.01).unwrap() {
            assert!((p - 1.0).abs() < 0.35, "bin density {p}");
        }
    }

    #[test]
    fn test_default_bin_count() {
        let model = uniform_model(1000, EmpiricalModel::DEFAULT_ETA_BINS);
        let edges = model.bin_edges().edges(0.01).unwrap();
        assert_eq!(edges.len(), EmpiricalModel::DEFAULT_ETA_BINS + 1);
    }

    #[test]
    fn test_eta_axis_and_cdt_shapes() {
        let model = uniform_model(2000, 25);
        for &radius in model.radii() {
            let eta = model.eta_axis().get(radius).unwrap();
            let edges = model.bin_edges().edges(radius).unwrap();
            assert_eq!(eta.len(), edges.len() - 1);

            let pdt = model.pdt().unwrap().get(radius).unwrap();
            let cdt = model.cdt().unwrap().get(radius).unwrap();
            assert!(cdt.windows(2).all(|w| w[1] >= w[0]));
            let mass: f64 = pdt.iter().zip(edges.windows(2)).map(|(p, w)| p * (w[1] - w[0])).sum();
            assert!((cdt[cdt.len() - 1] - mass).abs() < 1e-12);
            assert!((mass - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tracked_table_drops_centroid_columns() {
        let text = "0.01,0.02,mean_x,mean_y\n0.3,0.5,0.001,0.002\n0.4,0.6,-0.001,0.0\n";
        let table = Table::parse(text, Path::new("tracked.csv")).unwrap();
        let beam = synthetic_beam(10, 0.001, 1e-4);
        let model = EmpiricalModel::from_table(table, beam, SampleKind::Tracked, 10).unwrap();
        assert_eq!(model.radii(), &[0.01, 0.02]);
        assert_eq!(model.name(), "tracked_numerical");

        let table = Table::parse(text, Path::new("untracked.csv")).unwrap();
        let beam = synthetic_beam(10, 0.001, 1e-4);
        assert!(matches!(
            EmpiricalModel::from_table(table, beam, SampleKind::Untracked, 10),
            Err(ModelError::Parse { .. })
        ));
    }

    #[test]
    fn test_moments() {
        let mut samples = Series::new();
        samples.insert(0.01, vec![0.2, 0.4]);
        let model = EmpiricalModel::from_samples(
            samples,
            synthetic_beam(10, 0.001, 1e-4),
            SampleKind::Untracked,
            5,
        )
        .unwrap();
        let (m1, m2) = model.moments(0.01).unwrap();
        assert!((m1 - 0.3).abs() < 1e-15);
        assert!((m2 - 0.1).abs() < 1e-15);
        assert!(model.moments(0.5).is_err());
        assert!(model.transmittance().is_ok());
    }
}
