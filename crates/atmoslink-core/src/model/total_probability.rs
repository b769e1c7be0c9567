//! Total-probability models: a base law (lognormal or beta) marginalised over a
//! Gaussian beam-wander ensemble.
//!
//! For each draw `r₀ = |(x₀, y₀)|`, `x₀, y₀ ~ N(0, bw2)`, the beam-wandering law
//! gives the centroid-conditioned transmittance `T(r₀)`. The conditional mean
//! is `m(r₀) = T(r₀) ⟨η⟩ / ⟨T⟩` so that the ensemble reproduces the empirical
//! mean. The conditional variance `v = Var η − Var m` follows from the law of
//! total variance and is shared by every draw. The PDT is the ensemble average
//! of the base law with moments `(m, m² + v)`.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use atmoslink_stats::WanderingLaw;

use crate::aperture::BinEdges;
use crate::error::{ModelError, ModelResult};
use crate::model::{
    AnalyticalModel, BaseDistribution, DensityCache, EmpiricalModel, ModelState, Series,
    TransmittanceModel,
};

/// Floor of the conditional variance, for ensembles whose conditional means
/// already explain all of the empirical variance.
pub const MIN_CONDITIONAL_VARIANCE: f64 = 1e-12;

/// Conditional moments `(m, m² + v)` for each centroid-conditioned
/// transmittance in `conditioned`, given the empirical raw moments.
///
/// Returns `None` when the conditioned transmittances average to zero.
pub fn conditional_moments(
    eta_mean: f64,
    eta_second: f64,
    conditioned: &[f64],
) -> Option<Vec<(f64, f64)>> {
    let t_mean = atmoslink_stats::mean(conditioned);
    if !(t_mean > 0.0) {
        return None;
    }
    let means: Vec<f64> = conditioned.iter().map(|t| t * eta_mean / t_mean).collect();
    let (m1, m2) = atmoslink_stats::raw_moments(&means);
    let variance = ((eta_second - eta_mean * eta_mean) - (m2 - m1 * m1)).max(MIN_CONDITIONAL_VARIANCE);
    Some(means.into_iter().map(|m| (m, m * m + variance)).collect())
}

/// Total-probability model with a lognormal or beta base law. Needs
/// [`Self::calculate`] before it can be queried.
#[derive(Debug)]
pub struct TotalProbabilityModel<'a> {
    base: BaseDistribution,
    reference: &'a EmpiricalModel,
    state: ModelState<Series>,
    cache: DensityCache,
}

impl<'a> TotalProbabilityModel<'a> {
    pub fn new(reference: &'a EmpiricalModel, base: BaseDistribution) -> Self {
        Self {
            base,
            reference,
            state: ModelState::Uninitialized,
            cache: DensityCache::default(),
        }
    }

    pub fn lognormal(reference: &'a EmpiricalModel) -> Self {
        Self::new(reference, BaseDistribution::Lognormal)
    }

    pub fn beta(reference: &'a EmpiricalModel) -> Self {
        Self::new(reference, BaseDistribution::Beta)
    }

    /// Draw `r0_iterations` centroid displacements per aperture and average
    /// the base law over them.
    pub fn calculate<R: Rng + ?Sized>(&mut self, r0_iterations: usize, rng: &mut R) -> ModelResult<()> {
        if r0_iterations == 0 {
            return Err(ModelError::InvalidParameter(
                "total probability needs at least one r0 draw".to_string(),
            ));
        }
        let params = self.reference.beam_params();
        let centroid = Normal::new(0.0, params.bw2.sqrt()).map_err(|e| {
            ModelError::InvalidParameter(format!("beam-wander variance {}: {e}", params.bw2))
        })?;

        let eta_axis = self.reference.bin_edges().eta_axis();
        let mut pdt = Series::new();
        for (radius, eta) in eta_axis.iter() {
            let (eta_mean, eta_second) = self.reference.moments(radius)?;
            let law = WanderingLaw::new(radius, params.st2);
            let conditioned: Vec<f64> = (0..r0_iterations)
                .map(|_| {
                    let x0: f64 = centroid.sample(rng);
                    let y0: f64 = centroid.sample(rng);
                    law.transmittance(x0.hypot(y0))
                })
                .collect();

            let mut density = vec![0.0; eta.len()];
            match conditional_moments(eta_mean, eta_second, &conditioned) {
                Some(moments) => {
                    for (m, m2) in &moments {
                        for (acc, p) in density.iter_mut().zip(self.base.pdt(eta, *m, *m2)) {
                            *acc += p;
                        }
                    }
                    let n = moments.len() as f64;
                    density.iter_mut().for_each(|p| *p /= n);
                }
                None => log::warn!(
                    "{}: beam-wandering transmittance vanishes at aperture {radius}",
                    self.name()
                ),
            }
            pdt.insert(radius, density);
        }

        self.state = ModelState::Ready(pdt);
        self.cache.invalidate();
        Ok(())
    }
}

impl TransmittanceModel for TotalProbabilityModel<'_> {
    fn name(&self) -> &'static str {
        match self.base {
            BaseDistribution::Lognormal => "total_probability",
            BaseDistribution::Beta => "beta_total_probability",
        }
    }

    fn bin_edges(&self) -> &BinEdges {
        self.reference.bin_edges()
    }

    fn cache(&self) -> &DensityCache {
        &self.cache
    }

    fn pdt(&self) -> ModelResult<&Series> {
        self.state.ready(self.name())
    }
}

impl AnalyticalModel for TotalProbabilityModel<'_> {
    fn reference(&self) -> &EmpiricalModel {
        self.reference
    }
}
