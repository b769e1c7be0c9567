//! Aperture-keyed containers and the shared histogram binning.
//!
//! Aperture radii are `f64` keys compared by bit pattern: a radius read from a
//! table header is reused verbatim by every map derived from it, so lookups
//! never depend on rounding.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{ModelError, ModelResult};

/// Left edge below which the histogram range is clamped to 0.
pub const LEFT_CLAMP: f64 = 0.1;
/// Right edge above which the histogram range is clamped to 1.
pub const RIGHT_CLAMP: f64 = 0.9;
/// Relative margin added around the sample range.
pub const EDGE_MARGIN: f64 = 1.1;

fn same_radius(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits()
}

/// Ordered map from aperture radius to a per-aperture value.
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureMap<T> {
    radii: Vec<f64>,
    values: Vec<T>,
}

impl<T> Default for ApertureMap<T> {
    fn default() -> Self {
        Self {
            radii: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T> ApertureMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parallel vectors. Fails on length mismatch or repeated radii.
    pub fn from_parts(radii: Vec<f64>, values: Vec<T>) -> ModelResult<Self> {
        if radii.len() != values.len() {
            return Err(ModelError::ShapeMismatch(format!(
                "{} aperture radii for {} value sets",
                radii.len(),
                values.len()
            )));
        }
        for (i, &r) in radii.iter().enumerate() {
            if radii[..i].iter().any(|&q| same_radius(q, r)) {
                return Err(ModelError::ShapeMismatch(format!(
                    "aperture radius {r} appears twice"
                )));
            }
        }
        Ok(Self { radii, values })
    }

    /// Insert or replace the value for `radius`, keeping first-insertion order.
    pub fn insert(&mut self, radius: f64, value: T) {
        match self.position(radius) {
            Some(i) => self.values[i] = value,
            None => {
                self.radii.push(radius);
                self.values.push(value);
            }
        }
    }

    fn position(&self, radius: f64) -> Option<usize> {
        self.radii.iter().position(|&r| same_radius(r, radius))
    }

    pub fn get(&self, radius: f64) -> Option<&T> {
        self.position(radius).map(|i| &self.values[i])
    }

    /// Like [`ApertureMap::get`], but an absent radius is a shape mismatch.
    pub fn require(&self, radius: f64) -> ModelResult<&T> {
        self.get(radius)
            .ok_or_else(|| ModelError::ShapeMismatch(format!("no data for aperture {radius}")))
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &T)> {
        self.radii.iter().copied().zip(self.values.iter())
    }

    /// True when both maps hold the same radii in the same order.
    pub fn same_radii<U>(&self, other: &ApertureMap<U>) -> bool {
        self.radii.len() == other.radii.len()
            && self
                .radii
                .iter()
                .zip(&other.radii)
                .all(|(&a, &b)| same_radius(a, b))
    }

    pub fn map<U>(&self, mut f: impl FnMut(f64, &T) -> U) -> ApertureMap<U> {
        ApertureMap {
            radii: self.radii.clone(),
            values: self.iter().map(|(r, v)| f(r, v)).collect(),
        }
    }

    pub fn try_map<U, E>(
        &self,
        mut f: impl FnMut(f64, &T) -> Result<U, E>,
    ) -> Result<ApertureMap<U>, E> {
        let values = self
            .iter()
            .map(|(r, v)| f(r, v))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(ApertureMap {
            radii: self.radii.clone(),
            values,
        })
    }
}

impl<T: Serialize> Serialize for ApertureMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (radius, value) in self.iter() {
            map.serialize_entry(&radius.to_string(), value)?;
        }
        map.end()
    }
}

/// Histogram edges for transmittance samples.
///
/// `left = min / 1.1` (0 when below 0.1), `right = max · 1.1` (1 when above
/// 0.9), `bins + 1` evenly spaced edges. Returns `None` for an empty sample set
/// or an empty range.
pub fn bin_edges_for(samples: &[f64], bins: usize) -> Option<Vec<f64>> {
    let (min, max) = samples
        .iter()
        .copied()
        .filter(|x| !x.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
    if bins == 0 || min > max {
        return None;
    }
    let mut left = min / EDGE_MARGIN;
    let mut right = max * EDGE_MARGIN;
    if left < LEFT_CLAMP {
        left = 0.0;
    }
    if right > RIGHT_CLAMP {
        right = 1.0;
    }
    if !(right > left) {
        return None;
    }
    Some(atmoslink_stats::linspace(left, right, bins + 1))
}

/// Immutable per-aperture histogram edges shared by an empirical model and
/// every model bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges(ApertureMap<Vec<f64>>);

impl BinEdges {
    /// Derive edges for every aperture of `samples`.
    pub fn from_samples(samples: &ApertureMap<Vec<f64>>, bins: usize) -> ModelResult<Self> {
        if bins == 0 {
            return Err(ModelError::InvalidParameter(
                "histogram needs at least one bin".to_string(),
            ));
        }
        samples
            .try_map(|radius, values| {
                bin_edges_for(values, bins)
                    .ok_or(ModelError::DegenerateSamples { aperture: radius })
            })
            .map(Self)
    }

    pub fn edges(&self, radius: f64) -> ModelResult<&[f64]> {
        self.0.require(radius).map(Vec::as_slice)
    }

    pub fn radii(&self) -> &[f64] {
        self.0.radii()
    }

    pub fn as_map(&self) -> &ApertureMap<Vec<f64>> {
        &self.0
    }

    /// Bin midpoints per aperture.
    pub fn eta_axis(&self) -> ApertureMap<Vec<f64>> {
        self.0.map(|_, edges| atmoslink_stats::midpoints(edges))
    }

    /// Bit-for-bit equality of radii and edges.
    pub fn matches(&self, other: &BinEdges) -> bool {
        self.0.same_radii(&other.0)
            && self.0.values().iter().zip(other.0.values()).all(|(a, b)| {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_clamp_to_unit_interval() {
        let edges = bin_edges_for(&[0.05, 0.3, 0.999], 10).unwrap();
        assert_eq!(edges.len(), 11);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[10], 1.0);
    }

    #[test]
    fn test_edges_unclamped_inside_range() {
        let edges = bin_edges_for(&[0.5, 0.6, 0.8], 4).unwrap();
        assert_eq!(edges[0], 0.5 / 1.1);
        assert_eq!(edges[4], 0.8 * 1.1);
    }

    #[test]
    fn test_edges_reject_degenerate_samples() {
        assert!(bin_edges_for(&[0.0, 0.0], 10).is_none());
        assert!(bin_edges_for(&[], 10).is_none());
        assert!(bin_edges_for(&[0.5], 0).is_none());
    }

    #[test]
    fn test_map_lookup_is_exact() {
        let mut map = ApertureMap::new();
        map.insert(0.1, "a");
        map.insert(0.2, "b");
        assert_eq!(map.get(0.1), Some(&"a"));
        assert_eq!(map.get(0.30000000000000004), None);
        map.insert(0.1, "c");
        assert_eq!(map.len(), 2);
        assert_eq!(map.radii(), &[0.1, 0.2]);
        assert!(map.require(0.3).is_err());
    }

    #[test]
    fn test_from_parts_rejects_duplicates() {
        assert!(ApertureMap::from_parts(vec![0.1, 0.1], vec![1, 2]).is_err());
        assert!(ApertureMap::from_parts(vec![0.1], vec![1, 2]).is_err());
    }

    #[test]
    fn test_eta_axis_length() {
        let mut samples = ApertureMap::new();
        samples.insert(0.01, vec![0.2, 0.4, 0.7]);
        samples.insert(0.02, vec![0.5, 0.95]);
        let edges = BinEdges::from_samples(&samples, 7).unwrap();
        let eta = edges.eta_axis();
        for (radius, axis) in eta.iter() {
            assert_eq!(axis.len(), edges.edges(radius).unwrap().len() - 1);
        }
    }

    #[test]
    fn test_degenerate_aperture_is_reported() {
        let mut samples = ApertureMap::new();
        samples.insert(0.01, vec![0.0, 0.0]);
        let err = BinEdges::from_samples(&samples, 5).unwrap_err();
        assert!(matches!(err, ModelError::DegenerateSamples { .. }));
    }

    #[test]
    fn test_serialize_as_radius_keyed_object() {
        let mut map = ApertureMap::new();
        map.insert(0.01, 1.5);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"0.01":1.5}"#);
    }
}
