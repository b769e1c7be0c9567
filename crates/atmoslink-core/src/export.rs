//! Results directory layout, writers and readers.
//!
//! Layout:
//! - `<results>/<channel>/<model>/<radius>.csv`: `transmittance,probability_density`
//!   (radius with `.` replaced by `_`)
//! - `<results>/<channel>/ks_values.csv`: `aperture_radius,<model>,…`
//! - `<results>/<channel>/beam_params.csv`: `bw2,st2,lt2`
//! - `<results>/<channel>/report.json`

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::beam::BeamParams;
use crate::channel::{ChannelReport, ModelCurves};
use crate::error::{ModelError, ModelResult};
use crate::scoring::KsTable;
use crate::table::Table;

/// `%.3e` formatting: three decimals and a signed exponent of at least two
/// digits (`1.235e-02`). NaN is written as an empty cell.
pub fn format_sci(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let formatted = format!("{value:.3e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}

/// File name of one aperture's curve: `0.015` becomes `0_015.csv`.
pub fn curve_file_name(radius: f64) -> String {
    format!("{}.csv", radius.to_string().replace('.', "_"))
}

/// Aperture radius encoded in a curve file name.
pub fn parse_curve_file_name(name: &str) -> Option<f64> {
    name.strip_suffix(".csv")?.replace('_', ".").parse().ok()
}

pub fn channel_dir(results_dir: &Path, channel: &str) -> PathBuf {
    results_dir.join(channel)
}

pub fn curve_path(results_dir: &Path, channel: &str, model: &str, radius: f64) -> PathBuf {
    channel_dir(results_dir, channel)
        .join(model)
        .join(curve_file_name(radius))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Writers
// ═══════════════════════════════════════════════════════════════════════════════

/// Write every curve, the KS table, the beam parameters and `report.json` of
/// one channel. Returns the channel directory.
pub fn write_channel_report(report: &ChannelReport, results_dir: &Path) -> ModelResult<PathBuf> {
    let dir = channel_dir(results_dir, &report.channel);
    fs::create_dir_all(&dir)?;
    for model in &report.models {
        write_model_curves(model, &dir)?;
    }
    write_ks_table(&report.ks, &dir.join("ks_values.csv"))?;
    write_beam_params(&report.beam_params, &dir.join("beam_params.csv"))?;

    let json = serde_json::to_string_pretty(report)?;
    fs::write(dir.join("report.json"), json)?;
    Ok(dir)
}

pub fn write_model_curves(model: &ModelCurves, channel_dir: &Path) -> ModelResult<()> {
    let model_dir = channel_dir.join(&model.name);
    fs::create_dir_all(&model_dir)?;
    for (radius, curve) in model.curves.iter() {
        write_curve(curve, &model_dir.join(curve_file_name(radius)))?;
    }
    Ok(())
}

pub fn write_curve(curve: &[(f64, f64)], path: &Path) -> ModelResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "transmittance,probability_density")?;
    for &(eta, pdt) in curve {
        writeln!(out, "{},{}", format_sci(eta), format_sci(pdt))?;
    }
    out.flush()?;
    Ok(())
}

/// Radii are written exactly so the file can be joined back on aperture.
pub fn write_ks_table(table: &KsTable, path: &Path) -> ModelResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut header = String::from("aperture_radius");
    for name in table.model_names() {
        header.push(',');
        header.push_str(name);
    }
    writeln!(out, "{header}")?;
    for (radius, values) in table.rows() {
        let cells: Vec<String> = values.iter().map(|v| format_sci(*v)).collect();
        if cells.is_empty() {
            writeln!(out, "{radius}")?;
        } else {
            writeln!(out, "{radius},{}", cells.join(","))?;
        }
    }
    out.flush()?;
    Ok(())
}

pub fn write_beam_params(params: &BeamParams, path: &Path) -> ModelResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "bw2,st2,lt2")?;
    writeln!(
        out,
        "{},{},{}",
        format_sci(params.bw2),
        format_sci(params.st2),
        format_sci(params.lt2)
    )?;
    out.flush()?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Readers
// ═══════════════════════════════════════════════════════════════════════════════

/// Read an exported `(eta, pdt)` curve.
pub fn read_curve(path: &Path) -> ModelResult<Vec<(f64, f64)>> {
    let table = Table::read_csv(path)?;
    let eta = table.require_column("transmittance")?;
    let pdt = table.require_column("probability_density")?;
    Ok(eta.iter().copied().zip(pdt.iter().copied()).collect())
}

pub fn read_beam_params(path: &Path) -> ModelResult<BeamParams> {
    let table = Table::read_csv(path)?;
    let first = |name: &str| -> ModelResult<f64> {
        table
            .require_column(name)?
            .first()
            .copied()
            .ok_or_else(|| ModelError::Parse {
                path: path.to_path_buf(),
                reason: "beam parameter table has no rows".to_string(),
            })
    };
    Ok(BeamParams {
        bw2: first("bw2")?,
        st2: first("st2")?,
        lt2: first("lt2")?,
    })
}

/// Aperture radii with an exported curve for `model`, ascending.
pub fn exported_radii(results_dir: &Path, channel: &str, model: &str) -> ModelResult<Vec<f64>> {
    let dir = channel_dir(results_dir, channel).join(model);
    let mut radii = Vec::new();
    for entry in fs::read_dir(&dir).map_err(|e| ModelError::from_io(&dir, e))? {
        let entry = entry?;
        if let Some(radius) = entry.file_name().to_str().and_then(parse_curve_file_name) {
            radii.push(radius);
        }
    }
    radii.sort_by(f64::total_cmp);
    Ok(radii)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aperture::ApertureMap;

    #[test]
    fn test_format_sci_matches_printf() {
        assert_eq!(format_sci(0.0123456), "1.235e-02");
        assert_eq!(format_sci(1234.56), "1.235e+03");
        assert_eq!(format_sci(0.0), "0.000e+00");
        assert_eq!(format_sci(-2.5e-120), "-2.500e-120");
        assert_eq!(format_sci(f64::NAN), "");
    }

    #[test]
    fn test_curve_file_names() {
        assert_eq!(curve_file_name(0.015), "0_015.csv");
        assert_eq!(parse_curve_file_name("0_015.csv"), Some(0.015));
        assert_eq!(parse_curve_file_name("ks_values.csv"), None);
    }

    #[test]
    fn test_curve_round_trip_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.csv");
        write_curve(&[(0.125, 1.5), (0.375, 0.25)], &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "transmittance,probability_density\n1.250e-01,1.500e+00\n3.750e-01,2.500e-01\n"
        );
        assert_eq!(read_curve(&path).unwrap(), vec![(0.125, 1.5), (0.375, 0.25)]);
    }

    #[test]
    fn test_ks_table_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ks_values.csv");
        let mut table = KsTable::new(&[0.01, 0.02]);
        table
            .insert("beta", ApertureMap::from_parts(vec![0.01, 0.02], vec![0.5, 0.25]).unwrap())
            .unwrap();
        write_ks_table(&table, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "aperture_radius,beta\n0.01,5.000e-01\n0.02,2.500e-01\n");
    }

    #[test]
    fn test_beam_params_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beam_params.csv");
        let params = BeamParams { bw2: 0.01, st2: 0.06, lt2: 0.1 };
        write_beam_params(&params, &path).unwrap();
        assert_eq!(read_beam_params(&path).unwrap(), params);
    }
}
