use std::path::Path;

use serde::Serialize;

use atmoslink_core::application::{self, ApertureSqueezing};
use atmoslink_core::{ModelResult, SqueezingSetup, export};

pub struct SqueezeCommandConfig<'a> {
    pub channel: &'a str,
    pub model: &'a str,
    pub results_dir: &'a str,
    pub aperture: Option<f64>,
    pub eta_det: Option<f64>,
    pub losses_db_km: f64,
    pub fibre_km: f64,
    pub optical_efficiency: f64,
    pub squeeze_in: f64,
    pub thresholds: &'a str,
    pub output_path: Option<&'a str>,
}

#[derive(Serialize)]
struct SqueezeOutput<'a> {
    channel: &'a str,
    model: &'a str,
    setup: SqueezingSetup,
    apertures: Vec<ApertureSqueezing>,
}

fn setup_for(cfg: &SqueezeCommandConfig<'_>) -> Result<SqueezingSetup, String> {
    let eta_det = cfg.eta_det.unwrap_or_else(|| {
        SqueezingSetup::detection_efficiency(cfg.losses_db_km, cfg.fibre_km, cfg.optical_efficiency)
    });
    if !(eta_det > 0.0 && eta_det <= 1.0) {
        return Err(format!("detection efficiency {eta_det} is outside (0, 1]"));
    }
    Ok(SqueezingSetup {
        eta_det,
        squeezing_in_db: cfg.squeeze_in,
    })
}

fn single_aperture(
    results_dir: &Path,
    cfg: &SqueezeCommandConfig<'_>,
    radius: f64,
    setup: &SqueezingSetup,
    thresholds: &[f64],
) -> ModelResult<Vec<ApertureSqueezing>> {
    let params = export::read_beam_params(
        &export::channel_dir(results_dir, cfg.channel).join("beam_params.csv"),
    )?;
    let points = application::squeezing_for_aperture(
        results_dir,
        cfg.channel,
        cfg.model,
        radius,
        setup,
        thresholds,
    )?;
    Ok(vec![ApertureSqueezing {
        aperture_radius: radius,
        normed_radius: radius / params.lt2.sqrt(),
        points,
    }])
}

fn format_db(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |s| format!("{s:.3}"))
}

pub fn run(cfg: SqueezeCommandConfig<'_>) {
    let setup = match setup_for(&cfg) {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let thresholds = match super::parse_values(cfg.thresholds) {
        Ok(t) if !t.is_empty() => t,
        Ok(_) => {
            eprintln!("No thresholds given.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Invalid --thresholds: {e}");
            std::process::exit(1);
        }
    };

    let results_dir = Path::new(cfg.results_dir);
    let rows = match cfg.aperture {
        Some(radius) => single_aperture(results_dir, &cfg, radius, &setup, &thresholds),
        None => application::squeezing_by_aperture(
            results_dir,
            cfg.channel,
            cfg.model,
            &setup,
            &thresholds,
        ),
    };
    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("{}/{}: {e}", cfg.channel, cfg.model);
            std::process::exit(1);
        }
    };

    println!(
        "Squeezing for {} / {} (eta_det={:.3}, S_in={:.1} dB)\n",
        cfg.channel, cfg.model, setup.eta_det, setup.squeezing_in_db
    );
    let mut header = format!("{:<12} {:>10}", "Aperture", "a/sqrt(lt2)");
    for t in &thresholds {
        header.push_str(&format!(" {:>9}", format!("T>{t}")));
    }
    println!("{header}");
    println!("{}", "-".repeat(header.len()));
    for row in &rows {
        let mut line = format!("{:<12} {:>10.3}", row.aperture_radius, row.normed_radius);
        for point in &row.points {
            line.push_str(&format!(" {:>9}", format_db(point.squeezing_db)));
        }
        println!("{line}");
    }
    println!("\nValues in dB; '-' marks thresholds that discard every realisation.");

    if let Some(path) = cfg.output_path {
        let output = SqueezeOutput {
            channel: cfg.channel,
            model: cfg.model,
            setup,
            apertures: rows,
        };
        super::write_json(path, &output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg<'a>() -> SqueezeCommandConfig<'a> {
        SqueezeCommandConfig {
            channel: "weak_inf",
            model: "numerical",
            results_dir: "results",
            aperture: None,
            eta_det: None,
            losses_db_km: 0.2,
            fibre_km: 5.0,
            optical_efficiency: 0.9,
            squeeze_in: -3.0,
            thresholds: "0.0",
            output_path: None,
        }
    }

    #[test]
    fn test_setup_from_losses() {
        let setup = setup_for(&cfg()).unwrap();
        assert!((setup.eta_det - 0.9 * 10f64.powf(-0.1)).abs() < 1e-15);
        assert_eq!(setup.squeezing_in_db, -3.0);
    }

    #[test]
    fn test_explicit_eta_det_wins() {
        let setup = setup_for(&SqueezeCommandConfig {
            eta_det: Some(0.5),
            ..cfg()
        })
        .unwrap();
        assert_eq!(setup.eta_det, 0.5);
    }

    #[test]
    fn test_invalid_eta_det_rejected() {
        assert!(
            setup_for(&SqueezeCommandConfig {
                eta_det: Some(1.5),
                ..cfg()
            })
            .is_err()
        );
    }

    #[test]
    fn test_format_db() {
        assert_eq!(format_db(Some(-1.23456)), "-1.235");
        assert_eq!(format_db(None), "-");
    }
}
