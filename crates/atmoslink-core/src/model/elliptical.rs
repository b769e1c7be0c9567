//! Elliptical-beam models: transmittance samples drawn by Monte Carlo, then
//! histogrammed over the shared bin edges.

use std::f64::consts::FRAC_PI_2;

use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};

use atmoslink_stats::{EllipticBeam, GaussianProfile};

use crate::aperture::BinEdges;
use crate::beam::EllipseShape;
use crate::error::{ModelError, ModelResult};
use crate::model::{
    AnalyticalModel, DensityCache, EmpiricalModel, ModelState, Series, TransmittanceModel,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Elliptic-beam approximation
// ═══════════════════════════════════════════════════════════════════════════════

/// Draws random beam realisations from a fitted [`EllipseShape`].
#[derive(Debug, Clone)]
pub struct BeamSampler {
    shape: EllipseShape,
    cholesky: [[f64; 2]; 2],
    centroid: Normal<f64>,
}

impl BeamSampler {
    pub fn new(shape: EllipseShape) -> ModelResult<Self> {
        let centroid = Normal::new(0.0, shape.bw).map_err(|e| {
            ModelError::InvalidParameter(format!("beam-wander scale {}: {e}", shape.bw))
        })?;
        Ok(Self {
            cholesky: shape.theta_cholesky(),
            shape,
            centroid,
        })
    }

    /// One beam: `x₀, y₀ ~ N(0, bw²)`, `(Θ₁, Θ₂) ~ N₂(μ, Σ)` with
    /// `Wᵢ = W₀ exp(Θᵢ/2)`, and `φ ~ U[0, π/2)`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> EllipticBeam {
        let z1: f64 = StandardNormal.sample(rng);
        let z2: f64 = StandardNormal.sample(rng);
        let l = &self.cholesky;
        let theta1 = self.shape.theta_mean[0] + l[0][0] * z1;
        let theta2 = self.shape.theta_mean[1] + l[1][0] * z1 + l[1][1] * z2;
        EllipticBeam {
            x0: self.centroid.sample(rng),
            y0: self.centroid.sample(rng),
            w1: self.shape.w0 * (theta1 / 2.0).exp(),
            w2: self.shape.w0 * (theta2 / 2.0).exp(),
            phi: rng.random_range(0.0..FRAC_PI_2),
        }
    }
}

/// Elliptic-beam model (Vasylyev, Semenov, Vogel). Needs [`Self::calculate`]
/// before it can be queried.
#[derive(Debug)]
pub struct EllipticalBeamModel<'a> {
    reference: &'a EmpiricalModel,
    shape: Option<EllipseShape>,
    state: ModelState<Series>,
    cache: DensityCache,
}

impl<'a> EllipticalBeamModel<'a> {
    pub fn new(reference: &'a EmpiricalModel) -> Self {
        Self {
            reference,
            shape: None,
            state: ModelState::Uninitialized,
            cache: DensityCache::default(),
        }
    }

    /// The shape fitted by the last calculation.
    pub fn shape(&self) -> Option<&EllipseShape> {
        self.shape.as_ref()
    }

    /// Fit the ellipse shape once from the reference beam samples, then draw
    /// `iterations` transmittance samples per aperture.
    pub fn calculate<R: Rng + ?Sized>(
        &mut self,
        w0: f64,
        iterations: usize,
        rng: &mut R,
    ) -> ModelResult<()> {
        let shape = EllipseShape::fit(self.reference.beam(), w0)?;
        log::debug!(
            "elliptical_beam: bw={:.3e} theta_mean=[{:.3}, {:.3}]",
            shape.bw,
            shape.theta_mean[0],
            shape.theta_mean[1]
        );
        let sampler = BeamSampler::new(shape)?;
        let mut transmittance = Series::new();
        for &radius in self.reference.radii() {
            let samples = (0..iterations)
                .map(|_| atmoslink_stats::elliptic_beam_transmittance(radius, &sampler.draw(rng)))
                .collect();
            transmittance.insert(radius, samples);
        }
        self.shape = Some(shape);
        self.state = ModelState::Ready(transmittance);
        self.cache.invalidate();
        Ok(())
    }
}

impl TransmittanceModel for EllipticalBeamModel<'_> {
    fn name(&self) -> &'static str {
        "elliptical_beam"
    }

    fn bin_edges(&self) -> &BinEdges {
        self.reference.bin_edges()
    }

    fn cache(&self) -> &DensityCache {
        &self.cache
    }

    fn transmittance(&self) -> ModelResult<&Series> {
        self.state.ready(self.name())
    }
}

impl AnalyticalModel for EllipticalBeamModel<'_> {
    fn reference(&self) -> &EmpiricalModel {
        self.reference
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Numerical integration over simulated beam rows
// ═══════════════════════════════════════════════════════════════════════════════

/// Semi-analytical elliptical-beam model: each draw is a simulated beam row
/// whose Gaussian intensity is integrated over the aperture on a grid.
#[derive(Debug)]
pub struct NumEllipticalBeamModel<'a> {
    reference: &'a EmpiricalModel,
    state: ModelState<Series>,
    cache: DensityCache,
}

impl<'a> NumEllipticalBeamModel<'a> {
    pub fn new(reference: &'a EmpiricalModel) -> Self {
        Self {
            reference,
            state: ModelState::Uninitialized,
            cache: DensityCache::default(),
        }
    }

    /// For every aperture draw `iterations` beam rows (with replacement) and
    /// integrate each on a `grid_resolution²` grid. Rows whose spot matrix is
    /// not positive definite are skipped.
    pub fn calculate<R: Rng + ?Sized>(
        &mut self,
        iterations: usize,
        grid_resolution: usize,
        rng: &mut R,
    ) -> ModelResult<()> {
        if grid_resolution == 0 {
            return Err(ModelError::InvalidParameter(
                "grid resolution must be positive".to_string(),
            ));
        }
        let beam = self.reference.beam();
        if beam.is_empty() {
            return Err(ModelError::InvalidParameter(
                "beam table has no rows".to_string(),
            ));
        }

        let mut transmittance = Series::new();
        let mut skipped = 0;
        for &radius in self.reference.radii() {
            let samples: Vec<f64> = (0..iterations)
                .filter_map(|_| {
                    let row = rng.random_range(0..beam.len());
                    let s = beam.spot_matrix(row);
                    let profile = GaussianProfile {
                        x0: beam.mean_x[row],
                        y0: beam.mean_y[row],
                        sxx: s.sxx,
                        syy: s.syy,
                        sxy: s.sxy,
                    };
                    atmoslink_stats::gaussian_aperture_power(radius, &profile, grid_resolution)
                })
                .collect();
            skipped += iterations - samples.len();
            transmittance.insert(radius, samples);
        }
        if skipped > 0 {
            log::warn!("num_elliptical_beam: skipped {skipped} beam draws with a degenerate spot");
        }
        self.state = ModelState::Ready(transmittance);
        self.cache.invalidate();
        Ok(())
    }
}

impl TransmittanceModel for NumEllipticalBeamModel<'_> {
    fn name(&self) -> &'static str {
        "num_elliptical_beam"
    }

    fn bin_edges(&self) -> &BinEdges {
        self.reference.bin_edges()
    }

    fn cache(&self) -> &DensityCache {
        &self.cache
    }

    fn transmittance(&self) -> ModelResult<&Series> {
        self.state.ready(self.name())
    }
}

impl AnalyticalModel for NumEllipticalBeamModel<'_> {
    fn reference(&self) -> &EmpiricalModel {
        self.reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SampleKind;
    use crate::model::empirical::tests::{pseudo_uniform, synthetic_beam};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn reference() -> EmpiricalModel {
        let mut samples = Series::new();
        samples.insert(0.01, pseudo_uniform(500, 1).iter().map(|u| 0.3 + 0.4 * u).collect());
        samples.insert(0.02, pseudo_uniform(500, 2).iter().map(|u| 0.5 + 0.45 * u).collect());
        EmpiricalModel::from_samples(
            samples,
            synthetic_beam(400, 0.004, 4e-4),
            SampleKind::Untracked,
            20,
        )
        .unwrap()
    }

    #[test]
    fn test_not_calculated_before_calculate() {
        let empirical = reference();
        let model = EllipticalBeamModel::new(&empirical);
        assert!(matches!(
            model.pdt(),
            Err(ModelError::NotCalculated { model: "elliptical_beam" })
        ));
        assert!(matches!(
            model.transmittance(),
            Err(ModelError::NotCalculated { .. })
        ));
        let model = NumEllipticalBeamModel::new(&empirical);
        assert!(matches!(model.ks_values(), Err(ModelError::NotCalculated { .. })));
    }

    #[test]
    fn test_elliptical_beam_calculate() {
        let empirical = reference();
        let mut model = EllipticalBeamModel::new(&empirical);
        let mut rng = StdRng::seed_from_u64(5);
        model.calculate(0.02, 300, &mut rng).unwrap();
        assert!(model.shape().is_some());
        for &radius in empirical.radii() {
            let samples = model.transmittance().unwrap().get(radius).unwrap();
            assert_eq!(samples.len(), 300);
            assert!(samples.iter().all(|t| (0.0..=1.0).contains(t)));
            assert_eq!(
                model.pdt().unwrap().get(radius).unwrap().len(),
                model.eta_axis().get(radius).unwrap().len()
            );
        }
        let ks = model.ks_values().unwrap();
        assert_eq!(ks.len(), 2);
    }

    #[test]
    fn test_recalculate_invalidates_cache() {
        let empirical = reference();
        let mut model = EllipticalBeamModel::new(&empirical);
        let mut rng = StdRng::seed_from_u64(9);
        model.calculate(0.02, 50, &mut rng).unwrap();
        let first = model.pdt().unwrap().clone();
        model.calculate(0.02, 2000, &mut rng).unwrap();
        assert!(!model.cache().has_pdt());
        assert_ne!(&first, model.pdt().unwrap());
    }

    #[test]
    fn test_sampler_reproduces_fitted_shape() {
        let shape = EllipseShape {
            w0: 0.02,
            bw: 0.003,
            theta_mean: [0.2, -0.1],
            theta_cov: [[0.04, 0.01], [0.01, 0.09]],
        };
        let sampler = BeamSampler::new(shape).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let n = 20_000;
        let (mut t1, mut x0) = (Vec::with_capacity(n), Vec::with_capacity(n));
        for _ in 0..n {
            let beam = sampler.draw(&mut rng);
            t1.push((beam.w1 * beam.w1 / (0.02 * 0.02)).ln());
            x0.push(beam.x0);
            assert!((0.0..FRAC_PI_2).contains(&beam.phi));
        }
        assert!((atmoslink_stats::mean(&t1) - 0.2).abs() < 0.01);
        let var_x0 = x0.iter().map(|x| x * x).sum::<f64>() / n as f64;
        assert!((var_x0 / 9e-6 - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_num_elliptical_beam_calculate() {
        let empirical = reference();
        let mut model = NumEllipticalBeamModel::new(&empirical);
        let mut rng = StdRng::seed_from_u64(3);
        model.calculate(40, 32, &mut rng).unwrap();
        let samples = model.transmittance().unwrap();
        for &radius in empirical.radii() {
            let values = samples.get(radius).unwrap();
            assert_eq!(values.len(), 40);
            assert!(values.iter().all(|t| *t >= 0.0 && *t <= 1.05));
        }
        // Larger apertures collect more power on average.
        let small = atmoslink_stats::mean(samples.get(0.01).unwrap());
        let large = atmoslink_stats::mean(samples.get(0.02).unwrap());
        assert!(large > small);
        assert!(model.calculate(10, 0, &mut rng).is_err());
    }
}
