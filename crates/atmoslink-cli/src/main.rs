//! CLI for atmoslink: transmittance statistics of turbulent optical channels.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "atmoslink")]
#[command(about = "atmoslink: fit and score transmittance models of turbulent optical channels")]
#[command(version = atmoslink_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit every transmittance model to the simulated channels, score them
    /// with the KS statistic and write curves and tables to the results directory.
    Analyze {
        /// JSON analysis config; flags below override its fields
        #[arg(long)]
        config: Option<String>,

        /// Directory with one sub-directory of simulator output per channel
        #[arg(long)]
        data_dir: Option<String>,

        /// Directory the per-channel results are written to
        #[arg(long)]
        results_dir: Option<String>,

        /// Comma-separated channel names
        #[arg(long)]
        channels: Option<String>,

        /// Histogram bins per aperture
        #[arg(long)]
        eta_bins: Option<usize>,

        /// Beam-wander draws per aperture for the total-probability models
        #[arg(long)]
        r0_iterations: Option<usize>,

        /// Elliptic-beam draws per aperture
        #[arg(long)]
        transmittance_iterations: Option<usize>,

        /// Beam rows integrated by the numerical elliptical-beam model
        #[arg(long)]
        num_elliptical_iterations: Option<usize>,

        /// Integration grid side length for the numerical elliptical-beam model
        #[arg(long)]
        grid_resolution: Option<usize>,

        /// Base random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Beam-centroid statistics: centroid moments and r0/transmittance correlations.
    Beam {
        /// Comma-separated channel names (default: every standard channel)
        #[arg(long)]
        channels: Option<String>,

        /// Directory with one sub-directory of simulator output per channel
        #[arg(long, default_value = "data")]
        data_dir: String,

        /// Write the details as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Output squeezing of a squeezed state after post-selection on an
    /// exported transmittance curve.
    Squeeze {
        /// Channel name
        channel: String,

        /// Model whose exported curves are used
        #[arg(long, default_value = "numerical")]
        model: String,

        /// Results directory written by `analyze`
        #[arg(long, default_value = "results")]
        results_dir: String,

        /// Single aperture radius; every exported aperture when omitted
        #[arg(long)]
        aperture: Option<f64>,

        /// Detection efficiency; computed from the loss flags when omitted
        #[arg(long)]
        eta_det: Option<f64>,

        /// Fibre losses in dB/km
        #[arg(long, default_value = "0.0")]
        losses_db_km: f64,

        /// Fibre length in km
        #[arg(long, default_value = "0.0")]
        fibre_km: f64,

        /// Optical system efficiency
        #[arg(long, default_value = "1.0")]
        optical_efficiency: f64,

        /// Input squeezing in dB
        #[arg(long, default_value = "-3.0", allow_hyphen_values = true)]
        squeeze_in: f64,

        /// Comma-separated post-selection thresholds
        #[arg(long, default_value = "0.0,0.1,0.2,0.3,0.4,0.5")]
        thresholds: String,

        /// Write the sweep as JSON
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            config,
            data_dir,
            results_dir,
            channels,
            eta_bins,
            r0_iterations,
            transmittance_iterations,
            num_elliptical_iterations,
            grid_resolution,
            seed,
        } => commands::analyze::run(commands::analyze::AnalyzeCommandConfig {
            config_path: config.as_deref(),
            data_dir: data_dir.as_deref(),
            results_dir: results_dir.as_deref(),
            channels: channels.as_deref(),
            eta_bins,
            r0_iterations,
            transmittance_iterations,
            num_elliptical_iterations,
            grid_resolution,
            seed,
        }),
        Commands::Beam {
            channels,
            data_dir,
            output,
        } => commands::beam::run(channels.as_deref(), &data_dir, output.as_deref()),
        Commands::Squeeze {
            channel,
            model,
            results_dir,
            aperture,
            eta_det,
            losses_db_km,
            fibre_km,
            optical_efficiency,
            squeeze_in,
            thresholds,
            output,
        } => commands::squeeze::run(commands::squeeze::SqueezeCommandConfig {
            channel: &channel,
            model: &model,
            results_dir: &results_dir,
            aperture,
            eta_det,
            losses_db_km,
            fibre_km,
            optical_efficiency,
            squeeze_in,
            thresholds: &thresholds,
            output_path: output.as_deref(),
        }),
    }
}
