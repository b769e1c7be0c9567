//! Semi-analytical total probability over simulated centroid shifts.
//!
//! The simulator writes one `transmittance_<radius>.csv` per aperture into a
//! shifted-aperture directory. Each column holds transmittance samples under
//! one fixed centroid shift; `mean_x`/`mean_y` columns are dropped. The PDT is
//! the base law evaluated with each shift column's raw moments, averaged over
//! the columns.

use std::fs;
use std::path::Path;

use crate::aperture::{ApertureMap, BinEdges};
use crate::error::{ModelError, ModelResult};
use crate::model::{
    AnalyticalModel, BaseDistribution, DensityCache, EmpiricalModel, Series, TransmittanceModel,
};
use crate::table::{CENTROID_COLUMNS, Table};

const FILE_PREFIX: &str = "transmittance_";
const FILE_SUFFIX: &str = ".csv";

/// Name of the shifted-aperture file for `radius`.
pub fn shifted_file_name(radius: f64) -> String {
    format!("{FILE_PREFIX}{radius}{FILE_SUFFIX}")
}

/// Aperture radius encoded in a shifted-aperture file name.
pub fn parse_shifted_file_name(name: &str) -> Option<f64> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

/// Raw moments `(⟨η⟩, ⟨η²⟩)` of every shift column, NaN cells ignored.
fn shift_moments(table: &Table) -> ModelResult<Vec<(f64, f64)>> {
    if table.columns().is_empty() {
        return Err(ModelError::Parse {
            path: table.source().to_path_buf(),
            reason: "no shift columns".to_string(),
        });
    }
    Ok(table
        .columns()
        .iter()
        .map(|column| {
            let finite: Vec<f64> = column.iter().copied().filter(|x| !x.is_nan()).collect();
            atmoslink_stats::raw_moments(&finite)
        })
        .collect())
}

/// Numerically marginalised lognormal or beta model.
#[derive(Debug)]
pub struct NumTotalProbabilityModel<'a> {
    base: BaseDistribution,
    reference: &'a EmpiricalModel,
    shifts: ApertureMap<Vec<(f64, f64)>>,
    cache: DensityCache,
}

impl<'a> NumTotalProbabilityModel<'a> {
    /// Load the shifted-aperture tables in `dir`. The file set must cover the
    /// reference apertures exactly.
    pub fn load(
        reference: &'a EmpiricalModel,
        dir: &Path,
        base: BaseDistribution,
    ) -> ModelResult<Self> {
        let entries = fs::read_dir(dir).map_err(|e| ModelError::from_io(dir, e))?;
        let mut shifts = ApertureMap::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(radius) = name.to_str().and_then(parse_shifted_file_name) else {
                continue;
            };
            let mut table = Table::read_csv(&entry.path())?;
            table.drop_columns(&CENTROID_COLUMNS);
            shifts.insert(radius, shift_moments(&table)?);
        }

        // An absent file is missing data; unexpected files are a shape error.
        let expected = reference.radii();
        let unexpected = shifts
            .radii()
            .iter()
            .any(|r| !expected.iter().any(|e| e.to_bits() == r.to_bits()));
        if !unexpected {
            if let Some(&radius) = expected.iter().find(|&&r| shifts.get(r).is_none()) {
                return Err(ModelError::MissingData {
                    path: dir.join(shifted_file_name(radius)),
                });
            }
        }
        Self::from_shift_moments(reference, shifts, base)
    }

    /// Build from precomputed per-shift moments.
    pub fn from_shift_moments(
        reference: &'a EmpiricalModel,
        shifts: ApertureMap<Vec<(f64, f64)>>,
        base: BaseDistribution,
    ) -> ModelResult<Self> {
        let expected = reference.radii();
        let covered = shifts.len() == expected.len()
            && expected.iter().all(|&radius| shifts.get(radius).is_some());
        if !covered {
            return Err(ModelError::ShapeMismatch(format!(
                "shifted-aperture data covers apertures {:?}, expected {:?}",
                shifts.radii(),
                expected
            )));
        }
        Ok(Self {
            base,
            reference,
            shifts,
            cache: DensityCache::default(),
        })
    }

    pub fn shift_count(&self, radius: f64) -> Option<usize> {
        self.shifts.get(radius).map(Vec::len)
    }
}

impl TransmittanceModel for NumTotalProbabilityModel<'_> {
    fn name(&self) -> &'static str {
        match self.base {
            BaseDistribution::Lognormal => "num_total_probability",
            BaseDistribution::Beta => "num_beta_total_probability",
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
            let moments = self.shifts.require(radius)?;
            let mut density = vec![0.0; eta.len()];
            for &(mean, second) in moments {
                for (acc, p) in density.iter_mut().zip(self.base.pdt(eta, mean, second)) {
                    *acc += p;
                }
            }
            let n = moments.len() as f64;
            density.iter_mut().for_each(|p| *p /= n);
            Ok(density)
        })
    }
}

impl AnalyticalModel for NumTotalProbabilityModel<'_> {
    fn reference(&self) -> &EmpiricalModel {
        self.reference
    }
}
