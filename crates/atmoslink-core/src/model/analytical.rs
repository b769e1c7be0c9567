//! Closed-form models: queryable as soon as they are constructed.

use crate::aperture::BinEdges;
use crate::error::ModelResult;
use crate::model::{
    AnalyticalModel, BaseDistribution, DensityCache, EmpiricalModel, Series, TransmittanceModel,
};

/// Lognormal or beta law matched to the empirical first two moments per aperture.
#[derive(Debug)]
pub struct MomentMatchedModel<'a> {
    base: BaseDistribution,
    reference: &'a EmpiricalModel,
    cache: DensityCache,
}

impl<'a> MomentMatchedModel<'a> {
    pub fn new(reference: &'a EmpiricalModel, base: BaseDistribution) -> Self {
        Self {
            base,
            reference,
            cache: DensityCache::default(),
        }
    }

    pub fn lognormal(reference: &'a EmpiricalModel) -> Self {
        Self::new(reference, BaseDistribution::Lognormal)
    }

    pub fn beta(reference: &'a EmpiricalModel) -> Self {
        Self::new(reference, BaseDistribution::Beta)
    }
}

impl TransmittanceModel for MomentMatchedModel<'_> {
    fn name(&self) -> &'static str {
        match self.base {
            BaseDistribution::Lognormal => "lognormal",
            BaseDistribution::Beta => "beta",
        }
    }

    fn bin_edges(&self) -> &BinEdges {
        self.reference.bin_edges()
    }

    fn cache(&self) -> &DensityCache {
        &self.cache
    }

    fn compute_pdt(&self) -> ModelResult<Series> {
        self.eta_axis().try_map(|radius, eta| {
            let (mean, second) = self.reference.moments(radius)?;
            Ok(self.base.pdt(eta, mean, second))
        })
    }
}

impl AnalyticalModel for MomentMatchedModel<'_> {
    fn reference(&self) -> &EmpiricalModel {
        self.reference
    }
}

/// Beam-wandering law: depends only on the beam geometry `{st2, bw2}` and the
/// aperture radius.
#[derive(Debug)]
pub struct BeamWanderingModel<'a> {
    reference: &'a EmpiricalModel,
    cache: DensityCache,
}

impl<'a> BeamWanderingModel<'a> {
    pub fn new(reference: &'a EmpiricalModel) -> Self {
        Self {
            reference,
            cache: DensityCache::default(),
        }
    }

    /// Maximum transmittance `η₀` of the centred beam at `radius`.
    pub fn max_transmittance(&self, radius: f64) -> f64 {
        atmoslink_stats::WanderingLaw::new(radius, self.reference.beam_params().st2).eta0
    }
}

impl TransmittanceModel for BeamWanderingModel<'_> {
    fn name(&self) -> &'static str {
        "beam_wandering"
    }

    fn bin_edges(&self) -> &BinEdges {
        self.reference.bin_edges()
    }

    fn cache(&self) -> &DensityCache {
        &self.cache
    }

    fn compute_pdt(&self) -> ModelResult<Series> {
        let params = self.reference.beam_params();
        Ok(self.eta_axis().map(|radius, eta| {
            atmoslink_stats::beam_wandering_pdt(eta, radius, params.st2, params.bw2)
        }))
    }

    /// The density drops to zero at `η₀`; the terminal point `(η₀, 0)` is
    /// appended so plotted curves close at the discontinuity.
    fn curve(&self, radius: f64) -> ModelResult<Vec<(f64, f64)>> {
        let eta = self.eta_axis().require(radius)?;
        let pdt = self.pdt()?.require(radius)?;
        let mut points: Vec<(f64, f64)> = eta.iter().copied().zip(pdt.iter().copied()).collect();
        points.push((self.max_transmittance(radius), 0.0));
        Ok(points)
    }
}

impl AnalyticalModel for BeamWanderingModel<'_> {
    fn reference(&self) -> &EmpiricalModel {
        self.reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::empirical::tests::{pseudo_uniform, synthetic_beam, uniform_model};
    use crate::model::SampleKind;

    #[test]
    fn test_moment_models_score_without_calculation() {
        let empirical = uniform_model(1000, 10);
        for model in [
            MomentMatchedModel::lognormal(&empirical),
            MomentMatchedModel::beta(&empirical),
        ] {
            let ks = model.ks_values().unwrap();
            let value = *ks.get(0.01).unwrap();
            assert!((0.0..=1.0).contains(&value), "{}: {value}", model.name());
            assert_eq!(model.pdt().unwrap().get(0.01).unwrap().len(), 10);
        }
    }

    #[test]
    fn test_beta_fits_beta_like_samples_closely() {
        // Squares of uniforms follow Beta(1/2, 1).
        let mut samples = Series::new();
        samples.insert(0.02, pseudo_uniform(20_000, 3).iter().map(|u| u * u).collect());
        let empirical = EmpiricalModel::from_samples(
            samples,
            synthetic_beam(100, 0.001, 1e-4),
            SampleKind::Untracked,
            50,
        )
        .unwrap();
        let beta = MomentMatchedModel::beta(&empirical);
        let lognormal = MomentMatchedModel::lognormal(&empirical);
        let ks_beta = *beta.ks_values().unwrap().get(0.02).unwrap();
        let ks_lognormal = *lognormal.ks_values().unwrap().get(0.02).unwrap();
        assert!(ks_beta < 0.06, "beta KS {ks_beta}");
        assert!(ks_beta < ks_lognormal);
    }

    #[test]
    fn test_moment_models_do_not_own_samples() {
        let empirical = uniform_model(100, 10);
        let model = MomentMatchedModel::lognormal(&empirical);
        assert!(matches!(
            model.transmittance(),
            Err(crate::error::ModelError::NotLoaded { model: "lognormal" })
        ));
    }

    #[test]
    fn test_beam_wandering_curve_closes_at_max_transmittance() {
        let empirical = uniform_model(1000, 20);
        let model = BeamWanderingModel::new(&empirical);
        let curve = model.curve(0.01).unwrap();
        assert_eq!(curve.len(), 21);
        let (eta0, last) = curve[20];
        assert_eq!(last, 0.0);
        assert!(eta0 > 0.0 && eta0 <= 1.0);
        // KS scoring uses the plain eta axis.
        assert_eq!(model.cdt().unwrap().get(0.01).unwrap().len(), 20);
        for (eta, p) in &curve[..20] {
            if *eta >= eta0 {
                assert_eq!(*p, 0.0);
            }
        }
    }
}
