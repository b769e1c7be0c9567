//! Integration tests for atmoslink-core.
//!
//! These tests run the full channel pipeline on a synthetic channel:
//! simulator-style CSV files → models → KS table → exported results.

use std::fs;
use std::io::Write;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use atmoslink_core::{
    AnalysisConfig, BeamDetails, ChannelLayout, ModelError, SqueezingSetup, analyze_channel,
    analyze_channels, application, export,
};
use atmoslink_stats::WanderingLaw;

const APERTURES: [f64; 2] = [0.01, 0.015];
const W0: f64 = 0.02;
const ROWS: usize = 400;

fn write(path: &Path, text: &str) {
    let mut file = fs::File::create(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

/// Write a synthetic channel: wandering round beam with a jittered spot.
fn write_channel(data_dir: &Path, name: &str, with_shifts: bool) {
    let dir = data_dir.join(name);
    fs::create_dir_all(&dir).unwrap();
    let mut rng = StdRng::seed_from_u64(17);
    let wander = Normal::new(0.0, 0.003).unwrap();
    let jitter = Normal::new(1.0, 0.05).unwrap();
    let w2 = W0 * W0;

    let mut beam = String::from("mean_x,mean_y,mean_x2,mean_y2,mean_xy,mean_x2_r\n");
    let mut eta = format!("{},{}\n", APERTURES[0], APERTURES[1]);
    let mut tracked = format!("{},{},mean_x,mean_y\n", APERTURES[0], APERTURES[1]);
    for _ in 0..ROWS {
        let (x, y): (f64, f64) = (wander.sample(&mut rng), wander.sample(&mut rng));
        let (sx, sy): (f64, f64) = (jitter.sample(&mut rng), jitter.sample(&mut rng));
        let (x2, y2) = (x * x + w2 * sx / 4.0, y * y + w2 * sy / 4.0);
        beam.push_str(&format!("{x},{y},{x2},{y2},{},{}\n", x * y, x2 + y2));

        let r0 = x.hypot(y);
        let row: Vec<f64> = APERTURES
            .iter()
            .map(|&a| WanderingLaw::new(a, w2 * (sx + sy) / 2.0).transmittance(r0))
            .collect();
        eta.push_str(&format!("{},{}\n", row[0], row[1]));
        let centred: Vec<f64> = APERTURES
            .iter()
            .map(|&a| WanderingLaw::new(a, w2 * (sx + sy) / 2.0).eta0)
            .collect();
        tracked.push_str(&format!("{},{},{x},{y}\n", centred[0], centred[1]));
    }
    write(&dir.join("beam.csv"), &beam);
    write(&dir.join("transmittance.csv"), &eta);
    write(&dir.join("tracked_transmittance.csv"), &tracked);
    write(
        &dir.join("params.json"),
        &format!(
            r#"{{
    "source": {{"W0": {W0}, "wvl": 8.08e-07, "F0": Infinity}},
    "path": {{"Cn2": 5e-15, "l0": 0.001, "L0": Infinity, "length": 1000}},
    "aperture": {{"radius": 0.05}}
}}"#
        ),
    );

    if with_shifts {
        let shifted = dir.join("shifted_aperture");
        fs::create_dir_all(&shifted).unwrap();
        for &a in &APERTURES {
            let mut text = String::from("mean_x,mean_y");
            let shifts = [0.0, 0.002, 0.004];
            for s in shifts {
                text.push_str(&format!(",{s}_0.0"));
            }
            text.push('\n');
            for _ in 0..50 {
                let spot: f64 = jitter.sample(&mut rng);
                text.push_str("0.0,0.0");
                for s in shifts {
                    let eta = WanderingLaw::new(a, w2 * spot).transmittance(s);
                    text.push_str(&format!(",{eta}"));
                }
                text.push('\n');
            }
            write(&shifted.join(format!("transmittance_{a}.csv")), &text);
        }
    }
}

fn small_config(data_dir: &Path, results_dir: &Path, channels: &[&str]) -> AnalysisConfig {
    AnalysisConfig {
        eta_bins: 20,
        r0_iterations: 200,
        transmittance_iterations: 300,
        num_elliptical_iterations: 30,
        grid_resolution: 24,
        seed: 1,
        data_dir: data_dir.to_path_buf(),
        results_dir: results_dir.to_path_buf(),
        channels: channels.iter().map(|c| c.to_string()).collect(),
    }
}

#[test]
fn full_channel_produces_all_models() {
    let data = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    write_channel(data.path(), "weak_inf", true);
    let config = small_config(data.path(), results.path(), &["weak_inf"]);

    let layout = ChannelLayout::new(data.path(), "weak_inf");
    let report = analyze_channel(&layout, &config, 7).unwrap();

    let names: Vec<&str> = report.ks.model_names().collect();
    assert_eq!(
        names,
        vec![
            "elliptical_beam",
            "beam_wandering",
            "lognormal",
            "total_probability",
            "beta",
            "beta_total_probability",
            "num_total_probability",
            "num_beta_total_probability",
            "num_elliptical_beam",
        ]
    );
    assert_eq!(report.ks.radii(), &APERTURES);
    for (_, values) in report.ks.rows() {
        for ks in values {
            assert!((0.0..=1.0).contains(&ks), "KS value {ks}");
        }
    }
    assert!(report.model("numerical").is_some());
    assert!(report.model("tracked_numerical").is_some());
    assert_eq!(report.ellipse.as_ref().unwrap().w0, W0);
    assert_eq!(report.params.source.f0, None);

    // Beam wandering curves carry the terminal (η₀, 0) point.
    let wandering = report.model("beam_wandering").unwrap();
    let numerical = report.model("numerical").unwrap();
    for &a in &APERTURES {
        let w = wandering.curves.get(a).unwrap();
        let n = numerical.curves.get(a).unwrap();
        assert_eq!(w.len(), n.len() + 1);
        assert_eq!(w.last().unwrap().1, 0.0);
    }
}

#[test]
fn channel_without_shifts_skips_semianalytical_models() {
    let data = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    write_channel(data.path(), "strong_zap", false);
    let config = small_config(data.path(), results.path(), &["strong_zap"]);

    let layout = ChannelLayout::new(data.path(), "strong_zap");
    let report = analyze_channel(&layout, &config, 3).unwrap();
    assert_eq!(report.ks.model_names().count(), 6);
    assert!(report.model("num_elliptical_beam").is_none());
}

#[test]
fn same_seed_reproduces_results() {
    let data = tempfile::tempdir().unwrap();
    write_channel(data.path(), "weak_zap", false);
    let config = small_config(data.path(), data.path(), &["weak_zap"]);
    let layout = ChannelLayout::new(data.path(), "weak_zap");
    let a = analyze_channel(&layout, &config, 11).unwrap();
    let b = analyze_channel(&layout, &config, 11).unwrap();
    assert_eq!(a.ks, b.ks);
}

#[test]
fn parallel_run_exports_results_and_isolates_failures() {
    let data = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    write_channel(data.path(), "weak_inf", true);
    write_channel(data.path(), "moderate_inf", false);
    let config = small_config(data.path(), results.path(), &["weak_inf", "missing", "moderate_inf"]);

    let outcomes = analyze_channels(&config);
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].1.is_ok());
    assert!(matches!(outcomes[1].1, Err(ModelError::MissingData { .. })));
    assert!(outcomes[2].1.is_ok());

    let channel = results.path().join("weak_inf");
    let ks = fs::read_to_string(channel.join("ks_values.csv")).unwrap();
    let mut lines = ks.lines();
    assert!(lines.next().unwrap().starts_with("aperture_radius,elliptical_beam,beam_wandering"));
    assert_eq!(lines.count(), APERTURES.len());

    let beam = fs::read_to_string(channel.join("beam_params.csv")).unwrap();
    assert!(beam.starts_with("bw2,st2,lt2\n"));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(channel.join("report.json")).unwrap()).unwrap();
    assert_eq!(report["channel"], "weak_inf");
    assert!(report["ks_values"]["0.01"]["lognormal"].is_number());

    for model in ["numerical", "tracked_numerical", "lognormal", "num_elliptical_beam"] {
        let radii = export::exported_radii(results.path(), "weak_inf", model).unwrap();
        assert_eq!(radii, APERTURES.to_vec(), "{model}");
    }
    let curve = export::read_curve(&export::curve_path(results.path(), "weak_inf", "beta", 0.015)).unwrap();
    assert_eq!(curve.len(), 20);

    // Squeezing from the exported empirical curves.
    let setup = SqueezingSetup { eta_det: 0.9, squeezing_in_db: -3.0 };
    let rows =
        application::squeezing_by_aperture(results.path(), "weak_inf", "numerical", &setup, &[0.0, 0.2])
            .unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        let s = row.points[0].squeezing_db.unwrap();
        assert!(s < 0.0 && s > -3.0);
    }
}

#[test]
fn beam_details_from_channel_files() {
    let data = tempfile::tempdir().unwrap();
    write_channel(data.path(), "moderate_zap", false);
    let details = BeamDetails::load(&ChannelLayout::new(data.path(), "moderate_zap")).unwrap();
    assert_eq!(details.r0_eta.len(), APERTURES.len());
    for c in &details.r0_eta {
        assert!(c.correlation.unwrap() < 0.0);
    }
    assert!(details.r0_w2r_correlation.is_some());
    assert!(details.centroid_x.excess_kurtosis.abs() < 1.0);
}
