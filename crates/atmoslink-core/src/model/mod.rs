//! Transmittance models.
//!
//! Every model exposes the same capability set over a shared aperture set and
//! shared bin edges: raw transmittance samples (when it owns them), the PDT,
//! the CDT and the eta axis. Derived quantities are computed on first use and
//! cached per instance in a [`DensityCache`]; models with an explicit
//! calculation step hold their result in a [`ModelState`] and reset the cache
//! whenever they are recalculated.
//!
//! | Model | Calculation step | Source of the PDT |
//! |-------|------------------|-------------------|
//! | [`EmpiricalModel`] | none | histogram of simulated samples |
//! | [`MomentMatchedModel`] | none | lognormal or beta fit of the first two moments |
//! | [`BeamWanderingModel`] | none | closed form from `{st2, bw2}` |
//! | [`EllipticalBeamModel`] | `calculate` | histogram of elliptic-beam Monte-Carlo draws |
//! | [`NumEllipticalBeamModel`] | `calculate` | histogram of numerically integrated beam rows |
//! | [`TotalProbabilityModel`] | `calculate` | base law averaged over a beam-wander ensemble |
//! | [`NumTotalProbabilityModel`] | none | base law averaged over simulated shifts |

use std::cell::OnceCell;

use crate::aperture::{ApertureMap, BinEdges};
use crate::error::{ModelError, ModelResult};

pub mod analytical;
pub mod elliptical;
pub mod empirical;
pub mod semianalytical;
pub mod total_probability;

pub use analytical::{BeamWanderingModel, MomentMatchedModel};
pub use elliptical::{EllipticalBeamModel, NumEllipticalBeamModel};
pub use empirical::{EmpiricalModel, SampleKind};
pub use semianalytical::NumTotalProbabilityModel;
pub use total_probability::TotalProbabilityModel;

/// Per-aperture series of floats.
pub type Series = ApertureMap<Vec<f64>>;

// ═══════════════════════════════════════════════════════════════════════════════
// Model state
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of an explicit calculation step.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ModelState<T> {
    #[default]
    Uninitialized,
    Ready(T),
}

impl<T> ModelState<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The calculated value, or [`ModelError::NotCalculated`] naming `model`.
    pub fn ready(&self, model: &'static str) -> ModelResult<&T> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Uninitialized => Err(ModelError::NotCalculated { model }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Density cache
// ═══════════════════════════════════════════════════════════════════════════════

/// Lazily computed eta axis, PDT and CDT of one model instance.
///
/// The eta axis depends only on the (immutable) bin edges and survives
/// invalidation; PDT and CDT are always dropped together.
#[derive(Debug, Default)]
pub struct DensityCache {
    eta_axis: OnceCell<Series>,
    pdt: OnceCell<Series>,
    cdt: OnceCell<Series>,
}

impl DensityCache {
    pub fn eta_axis(&self, init: impl FnOnce() -> Series) -> &Series {
        self.eta_axis.get_or_init(init)
    }

    pub fn pdt(&self, init: impl FnOnce() -> ModelResult<Series>) -> ModelResult<&Series> {
        try_get_or_init(&self.pdt, init)
    }

    pub fn cdt(&self, init: impl FnOnce() -> ModelResult<Series>) -> ModelResult<&Series> {
        try_get_or_init(&self.cdt, init)
    }

    pub fn has_pdt(&self) -> bool {
        self.pdt.get().is_some()
    }

    /// Drop the cached PDT and CDT.
    pub fn invalidate(&mut self) {
        self.pdt.take();
        self.cdt.take();
    }
}

fn try_get_or_init<T>(
    cell: &OnceCell<T>,
    init: impl FnOnce() -> ModelResult<T>,
) -> ModelResult<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = init()?;
    Ok(cell.get_or_init(|| value))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Shared helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Density histogram of `samples` over `edges`, aperture by aperture.
pub fn histogram_pdt(samples: &Series, edges: &BinEdges) -> ModelResult<Series> {
    if !samples.same_radii(edges.as_map()) {
        return Err(ModelError::ShapeMismatch(
            "sample apertures differ from bin-edge apertures".to_string(),
        ));
    }
    edges.as_map().try_map(|radius, edges| {
        Ok(atmoslink_stats::density_histogram(samples.require(radius)?, edges))
    })
}

/// Cumulative density of `pdt` over `edges`, aperture by aperture.
pub fn cumulative(pdt: &Series, edges: &BinEdges) -> ModelResult<Series> {
    if !pdt.same_radii(edges.as_map()) {
        return Err(ModelError::ShapeMismatch(
            "PDT apertures differ from bin-edge apertures".to_string(),
        ));
    }
    pdt.try_map(|radius, density| {
        atmoslink_stats::cumulative_density(density, edges.edges(radius)?).ok_or_else(|| {
            ModelError::ShapeMismatch(format!(
                "PDT for aperture {radius} has {} points for {} bins",
                density.len(),
                edges.edges(radius).map_or(0, |e| e.len().saturating_sub(1))
            ))
        })
    })
}

/// Base law of the moment-matched and total-probability models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseDistribution {
    Lognormal,
    Beta,
}

impl BaseDistribution {
    /// Density on `eta` matched to the raw moments `(mean, second_moment)`.
    pub fn pdt(self, eta: &[f64], mean: f64, second_moment: f64) -> Vec<f64> {
        match self {
            Self::Lognormal => atmoslink_stats::lognormal_pdt(eta, mean, second_moment),
            Self::Beta => atmoslink_stats::beta_pdt(eta, mean, second_moment),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Model traits
// ═══════════════════════════════════════════════════════════════════════════════

/// Capability set shared by every transmittance model.
pub trait TransmittanceModel {
    /// Model name, used for result directories and table columns.
    fn name(&self) -> &'static str;

    /// Bin edges shared with the empirical reference.
    fn bin_edges(&self) -> &BinEdges;

    fn cache(&self) -> &DensityCache;

    /// Raw transmittance samples. Models without samples fail with
    /// [`ModelError::NotLoaded`].
    fn transmittance(&self) -> ModelResult<&Series> {
        Err(ModelError::NotLoaded { model: self.name() })
    }

    /// Compute the PDT from scratch. Defaults to a histogram of
    /// [`TransmittanceModel::transmittance`].
    fn compute_pdt(&self) -> ModelResult<Series> {
        histogram_pdt(self.transmittance()?, self.bin_edges())
    }

    fn pdt(&self) -> ModelResult<&Series> {
        self.cache().pdt(|| self.compute_pdt())
    }

    fn cdt(&self) -> ModelResult<&Series> {
        self.cache()
            .cdt(|| cumulative(self.pdt()?, self.bin_edges()))
    }

    fn eta_axis(&self) -> &Series {
        self.cache().eta_axis(|| self.bin_edges().eta_axis())
    }

    fn radii(&self) -> &[f64] {
        self.bin_edges().radii()
    }

    /// `(eta, pdt)` points of one aperture, ready for plotting or export.
    fn curve(&self, radius: f64) -> ModelResult<Vec<(f64, f64)>> {
        let eta = self.eta_axis().require(radius)?;
        let pdt = self.pdt()?.require(radius)?;
        Ok(eta.iter().copied().zip(pdt.iter().copied()).collect())
    }
}

/// A model bound to an empirical reference, scored against it.
pub trait AnalyticalModel: TransmittanceModel {
    fn reference(&self) -> &EmpiricalModel;

    /// KS distance to the reference for every aperture.
    fn ks_values(&self) -> ModelResult<ApertureMap<f64>> {
        crate::scoring::ks_values(self, self.reference())
    }
}
