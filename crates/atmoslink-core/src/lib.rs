//! # atmoslink-core
//!
//! Fits analytical and semi-analytical models of the probability density of
//! transmittance (PDT) to Monte-Carlo samples of a laser beam crossing a
//! turbulent channel, and scores every model against the empirical
//! distribution with the Kolmogorov–Smirnov statistic.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use atmoslink_core::{AnalyticalModel, EmpiricalModel, MomentMatchedModel, SampleKind};
//!
//! let empirical = EmpiricalModel::load(
//!     Path::new("data/weak_inf/transmittance.csv"),
//!     Path::new("data/weak_inf/beam.csv"),
//!     SampleKind::Untracked,
//!     EmpiricalModel::DEFAULT_ETA_BINS,
//! )?;
//! let lognormal = MomentMatchedModel::lognormal(&empirical);
//! for (radius, ks) in lognormal.ks_values()?.iter() {
//!     println!("{radius}: {ks:.3e}");
//! }
//! # Ok::<(), atmoslink_core::ModelError>(())
//! ```
//!
//! ## Pipeline
//!
//! [`analyze_channel`] loads one channel's simulator output, builds the
//! empirical references and every bound model, runs the calculation steps in
//! dependency order and returns a [`ChannelReport`]. [`analyze_channels`] runs
//! the configured channels on scoped threads and writes their results with
//! [`export::write_channel_report`].

pub mod aperture;
pub mod application;
pub mod beam;
pub mod channel;
pub mod config;
pub mod details;
pub mod error;
pub mod export;
pub mod model;
pub mod scoring;
pub mod table;

pub use aperture::{ApertureMap, BinEdges};
pub use application::{SqueezingPoint, SqueezingSetup};
pub use beam::{BeamParams, BeamSamples, ChannelParams, EllipseShape};
pub use channel::{ChannelLayout, ChannelReport, ModelCurves, analyze_channel, analyze_channels};
pub use config::AnalysisConfig;
pub use details::BeamDetails;
pub use error::{ModelError, ModelResult};
pub use model::{
    AnalyticalModel, BaseDistribution, BeamWanderingModel, DensityCache, EllipticalBeamModel,
    EmpiricalModel, ModelState, MomentMatchedModel, NumEllipticalBeamModel,
    NumTotalProbabilityModel, SampleKind, TotalProbabilityModel, TransmittanceModel,
};
pub use scoring::KsTable;
pub use table::Table;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
