//! Per-channel pipeline: load the simulator output, build and calculate every
//! model in dependency order, and collect curves and KS values.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::aperture::ApertureMap;
use crate::beam::{BeamParams, ChannelParams, EllipseShape};
use crate::config::AnalysisConfig;
use crate::error::{ModelError, ModelResult};
use crate::model::{
    AnalyticalModel, BaseDistribution, BeamWanderingModel, EllipticalBeamModel, EmpiricalModel,
    MomentMatchedModel, NumEllipticalBeamModel, NumTotalProbabilityModel, SampleKind,
    TotalProbabilityModel, TransmittanceModel,
};
use crate::scoring::KsTable;

// ═══════════════════════════════════════════════════════════════════════════════
// Layout
// ═══════════════════════════════════════════════════════════════════════════════

/// Files of one channel under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    pub name: String,
    pub dir: PathBuf,
}

impl ChannelLayout {
    pub fn new(data_dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            dir: data_dir.join(name),
        }
    }

    pub fn transmittance(&self) -> PathBuf {
        self.dir.join("transmittance.csv")
    }

    pub fn tracked_transmittance(&self) -> PathBuf {
        self.dir.join("tracked_transmittance.csv")
    }

    pub fn beam(&self) -> PathBuf {
        self.dir.join("beam.csv")
    }

    pub fn params(&self) -> PathBuf {
        self.dir.join("params.json")
    }

    pub fn shifted_aperture(&self) -> PathBuf {
        self.dir.join("shifted_aperture")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Report
// ═══════════════════════════════════════════════════════════════════════════════

/// `(eta, pdt)` curves of one model, per aperture.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCurves {
    pub name: String,
    pub curves: ApertureMap<Vec<(f64, f64)>>,
}

impl ModelCurves {
    pub fn from_model<M: TransmittanceModel + ?Sized>(model: &M) -> ModelResult<Self> {
        let mut curves = ApertureMap::new();
        for &radius in model.radii() {
            curves.insert(radius, model.curve(radius)?);
        }
        Ok(Self {
            name: model.name().to_string(),
            curves,
        })
    }
}

/// Everything computed for one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: String,
    pub params: ChannelParams,
    pub beam_params: BeamParams,
    /// Ellipse shape fitted by the elliptical-beam model.
    pub ellipse: Option<EllipseShape>,
    #[serde(rename = "ks_values")]
    pub ks: KsTable,
    /// Curves of the empirical references followed by every bound model.
    #[serde(skip)]
    pub models: Vec<ModelCurves>,
}

impl ChannelReport {
    pub fn model(&self, name: &str) -> Option<&ModelCurves> {
        self.models.iter().find(|m| m.name == name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════════════════════════

/// Analyse one channel with its own seeded generator.
pub fn analyze_channel(
    layout: &ChannelLayout,
    config: &AnalysisConfig,
    seed: u64,
) -> ModelResult<ChannelReport> {
    let started = Instant::now();
    let channel = layout.name.as_str();
    log::info!("{channel}: loading samples from {}", layout.dir.display());

    let empirical = EmpiricalModel::load(
        &layout.transmittance(),
        &layout.beam(),
        SampleKind::Untracked,
        config.eta_bins,
    )?;
    let tracked = EmpiricalModel::load(
        &layout.tracked_transmittance(),
        &layout.beam(),
        SampleKind::Tracked,
        config.eta_bins,
    )?;
    let params = ChannelParams::read_json(&layout.params())?;
    let mut rng = StdRng::seed_from_u64(seed);

    log::info!("{channel}: calculating elliptical beam model");
    let mut elliptical = EllipticalBeamModel::new(&empirical);
    elliptical.calculate(params.source.w0, config.transmittance_iterations, &mut rng)?;
    let ellipse = elliptical.shape().copied();

    log::info!("{channel}: calculating total probability models");
    let mut total = TotalProbabilityModel::lognormal(&empirical);
    total.calculate(config.r0_iterations, &mut rng)?;
    let mut beta_total = TotalProbabilityModel::beta(&empirical);
    beta_total.calculate(config.r0_iterations, &mut rng)?;

    let mut models: Vec<Box<dyn AnalyticalModel + '_>> = vec![
        Box::new(elliptical),
        Box::new(BeamWanderingModel::new(&empirical)),
        Box::new(MomentMatchedModel::lognormal(&empirical)),
        Box::new(total),
        Box::new(MomentMatchedModel::beta(&empirical)),
        Box::new(beta_total),
    ];

    let shifted = layout.shifted_aperture();
    if shifted.is_dir() {
        log::info!("{channel}: calculating semi-analytical models");
        models.push(Box::new(NumTotalProbabilityModel::load(
            &empirical,
            &shifted,
            BaseDistribution::Lognormal,
        )?));
        models.push(Box::new(NumTotalProbabilityModel::load(
            &empirical,
            &shifted,
            BaseDistribution::Beta,
        )?));
        let mut num_elliptical = NumEllipticalBeamModel::new(&empirical);
        num_elliptical.calculate(
            config.num_elliptical_iterations,
            config.grid_resolution,
            &mut rng,
        )?;
        models.push(Box::new(num_elliptical));
    } else {
        log::warn!(
            "{channel}: {} not found, skipping semi-analytical models",
            shifted.display()
        );
    }

    let mut curves = vec![
        ModelCurves::from_model(&empirical)?,
        ModelCurves::from_model(&tracked)?,
    ];
    let mut ks = KsTable::new(empirical.radii());
    for model in &models {
        log::debug!("{channel}: scoring {}", model.name());
        curves.push(ModelCurves::from_model(model.as_ref())?);
        ks.insert(model.name(), model.ks_values()?)?;
    }

    log::info!(
        "{channel}: {} models scored over {} apertures in {:.1}s",
        models.len(),
        empirical.radii().len(),
        started.elapsed().as_secs_f64()
    );

    Ok(ChannelReport {
        channel: channel.to_string(),
        params,
        beam_params: empirical.beam_params(),
        ellipse,
        ks,
        models: curves,
    })
}

/// Analyse the channel at `index` of the configured channel list and write
/// its results.
pub fn process_channel(config: &AnalysisConfig, index: usize) -> ModelResult<ChannelReport> {
    let name = config.channels.get(index).ok_or_else(|| {
        ModelError::InvalidParameter(format!("no channel at index {index}"))
    })?;
    let layout = ChannelLayout::new(&config.data_dir, name);
    let report = analyze_channel(&layout, config, config.channel_seed(index))?;
    let written = crate::export::write_channel_report(&report, &config.results_dir)?;
    log::info!("{name}: results stored in {}", written.display());
    Ok(report)
}

/// Run every configured channel on its own scoped thread. Channels succeed or
/// fail independently; results come back in configuration order.
pub fn analyze_channels(config: &AnalysisConfig) -> Vec<(String, ModelResult<ChannelReport>)> {
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..config.channels.len())
            .map(|index| s.spawn(move || process_channel(config, index)))
            .collect();

        handles
            .into_iter()
            .zip(&config.channels)
            .map(|(handle, name)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(ModelError::WorkerPanicked {
                        channel: name.clone(),
                    })
                });
                if let Err(e) = &result {
                    log::error!("{name}: {e}");
                }
                (name.clone(), result)
            })
            .collect()
    })
}
