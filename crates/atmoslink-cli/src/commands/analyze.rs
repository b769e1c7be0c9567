use std::path::{Path, PathBuf};
use std::time::Instant;

use atmoslink_core::{AnalysisConfig, ChannelReport, analyze_channels};

pub struct AnalyzeCommandConfig<'a> {
    pub config_path: Option<&'a str>,
    pub data_dir: Option<&'a str>,
    pub results_dir: Option<&'a str>,
    pub channels: Option<&'a str>,
    pub eta_bins: Option<usize>,
    pub r0_iterations: Option<usize>,
    pub transmittance_iterations: Option<usize>,
    pub num_elliptical_iterations: Option<usize>,
    pub grid_resolution: Option<usize>,
    pub seed: Option<u64>,
}

/// Config file (or defaults) with the command-line overrides applied.
fn resolve_config(cfg: &AnalyzeCommandConfig<'_>) -> Result<AnalysisConfig, String> {
    let mut config = match cfg.config_path {
        Some(path) => AnalysisConfig::load(Path::new(path))
            .map_err(|e| format!("Failed to load config {path}: {e}"))?,
        None => AnalysisConfig::default(),
    };
    if let Some(dir) = cfg.data_dir {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(dir) = cfg.results_dir {
        config.results_dir = PathBuf::from(dir);
    }
    if cfg.channels.is_some() {
        config.channels = super::parse_channels(cfg.channels);
    }
    if let Some(v) = cfg.eta_bins {
        config.eta_bins = v;
    }
    if let Some(v) = cfg.r0_iterations {
        config.r0_iterations = v;
    }
    if let Some(v) = cfg.transmittance_iterations {
        config.transmittance_iterations = v;
    }
    if let Some(v) = cfg.num_elliptical_iterations {
        config.num_elliptical_iterations = v;
    }
    if let Some(v) = cfg.grid_resolution {
        config.grid_resolution = v;
    }
    if let Some(v) = cfg.seed {
        config.seed = v;
    }
    config.validate().map_err(|e| e.to_string())?;
    if config.channels.is_empty() {
        return Err("No channels selected.".to_string());
    }
    Ok(config)
}

pub fn run(cfg: AnalyzeCommandConfig<'_>) {
    let config = match resolve_config(&cfg) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    println!(
        "Analyzing {} channel(s) from {} ({} bins, seed {})...\n",
        config.channels.len(),
        config.data_dir.display(),
        config.eta_bins,
        config.seed
    );
    let started = Instant::now();
    let outcomes = analyze_channels(&config);

    let mut failed = 0;
    for (channel, outcome) in &outcomes {
        match outcome {
            Ok(report) => print_summary(report),
            Err(e) => {
                failed += 1;
                eprintln!("  {channel}: FAILED: {e}");
            }
        }
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "{} of {} channel(s) analyzed in {:.1}s, results in {}",
        outcomes.len() - failed,
        outcomes.len(),
        started.elapsed().as_secs_f64(),
        config.results_dir.display()
    );
    if failed > 0 {
        std::process::exit(1);
    }
}

fn print_summary(report: &ChannelReport) {
    println!("  {}", report.channel);
    println!(
        "    bw2={:.3e}  st2={:.3e}  lt2={:.3e}",
        report.beam_params.bw2, report.beam_params.st2, report.beam_params.lt2
    );
    println!("    {:<12} {:<28} {:>10}", "Aperture", "Best model", "KS");
    for &radius in report.ks.radii() {
        match report.ks.best_model(radius) {
            Some((model, ks)) => println!("    {radius:<12} {model:<28} {ks:>10.3e}"),
            None => println!("    {radius:<12} {:<28} {:>10}", "-", "-"),
        }
    }
}
