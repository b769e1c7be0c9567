//! Kolmogorov–Smirnov scoring of models against the empirical reference.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::aperture::ApertureMap;
use crate::error::{ModelError, ModelResult};
use crate::model::TransmittanceModel;

/// `ks(a) = max |cdt_model(a) − cdt_reference(a)|` for every aperture.
///
/// Both models must share bin edges bit for bit; any difference in aperture set
/// or edges is a [`ModelError::ShapeMismatch`].
pub fn ks_values<M, R>(model: &M, reference: &R) -> ModelResult<ApertureMap<f64>>
where
    M: TransmittanceModel + ?Sized,
    R: TransmittanceModel + ?Sized,
{
    if !model.bin_edges().matches(reference.bin_edges()) {
        return Err(ModelError::ShapeMismatch(format!(
            "'{}' and '{}' use different bin edges",
            model.name(),
            reference.name()
        )));
    }
    let ours = model.cdt()?;
    let theirs = reference.cdt()?;
    ours.try_map(|radius, cdt| {
        atmoslink_stats::ks_distance(cdt, theirs.require(radius)?).ok_or_else(|| {
            ModelError::ShapeMismatch(format!("CDT lengths differ at aperture {radius}"))
        })
    })
}

/// KS values of several models over one aperture set, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KsTable {
    radii: Vec<f64>,
    models: Vec<(String, ApertureMap<f64>)>,
}

impl KsTable {
    pub fn new(radii: &[f64]) -> Self {
        Self {
            radii: radii.to_vec(),
            models: Vec::new(),
        }
    }

    /// Add a model column. Its apertures must equal the table's.
    pub fn insert(&mut self, model: &str, values: ApertureMap<f64>) -> ModelResult<()> {
        let same_radii = values.len() == self.radii.len()
            && values
                .radii()
                .iter()
                .zip(&self.radii)
                .all(|(a, b)| a.to_bits() == b.to_bits());
        if !same_radii {
            return Err(ModelError::ShapeMismatch(format!(
                "KS values of '{model}' cover a different aperture set"
            )));
        }
        match self.models.iter_mut().find(|(name, _)| name == model) {
            Some((_, existing)) => *existing = values,
            None => self.models.push((model.to_string(), values)),
        }
        Ok(())
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, radius: f64, model: &str) -> Option<f64> {
        self.models
            .iter()
            .find(|(name, _)| name == model)
            .and_then(|(_, values)| values.get(radius).copied())
    }

    /// Model with the smallest KS value at `radius`.
    pub fn best_model(&self, radius: f64) -> Option<(&str, f64)> {
        self.models
            .iter()
            .filter_map(|(name, values)| Some((name.as_str(), *values.get(radius)?)))
            .filter(|(_, ks)| !ks.is_nan())
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// One row per aperture: the radius and the KS value of every model in
    /// column order.
    pub fn rows(&self) -> impl Iterator<Item = (f64, Vec<f64>)> + '_ {
        self.radii.iter().map(move |&radius| {
            let values = self
                .models
                .iter()
                .map(|(_, values)| values.get(radius).copied().unwrap_or(f64::NAN))
                .collect();
            (radius, values)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Serialized as `{ "<radius>": { "<model>": ks, … }, … }`.
impl Serialize for KsTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Row<'a>(&'a KsTable, f64);

        impl Serialize for Row<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.models.len()))?;
                for (name, values) in &self.0.models {
                    map.serialize_entry(name, &values.get(self.1))?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(self.radii.len()))?;
        for &radius in &self.radii {
            map.serialize_entry(&radius.to_string(), &Row(self, radius))?;
        }
        map.end()
    }
}
