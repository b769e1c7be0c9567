//! Beam-centroid samples, the channel beam parameters derived from them, and
//! the channel's physical parameter file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::table::Table;

// ═══════════════════════════════════════════════════════════════════════════════
// Beam parameters
// ═══════════════════════════════════════════════════════════════════════════════

/// Channel beam parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamParams {
    /// Beam-wander variance per axis, `⟨x₀²⟩`.
    pub bw2: f64,
    /// Squared short-term spot size, `4 (⟨x²⟩ − ⟨x₀²⟩)`.
    pub st2: f64,
    /// Squared long-term spot size, `4 ⟨x²⟩`.
    pub lt2: f64,
}

/// Spot-size matrix `S = 4·cov` of one beam realisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotMatrix {
    pub sxx: f64,
    pub syy: f64,
    pub sxy: f64,
}

impl SpotMatrix {
    /// Squared principal semi-axes `(W²₁, W²₂)`:
    /// `(tr S ± sign(S_xy) √(tr² S − 4 det S)) / 2`, with `sign(0) = 0`.
    pub fn semiaxes(&self) -> (f64, f64) {
        let trace = self.sxx + self.syy;
        let det = self.sxx * self.syy - self.sxy * self.sxy;
        let sign = if self.sxy > 0.0 {
            1.0
        } else if self.sxy < 0.0 {
            -1.0
        } else {
            0.0
        };
        let root = (trace * trace - 4.0 * det).max(0.0).sqrt();
        ((trace + sign * root) / 2.0, (trace - sign * root) / 2.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Beam samples
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-iteration beam-centroid moments from `beam.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamSamples {
    pub mean_x: Vec<f64>,
    pub mean_y: Vec<f64>,
    pub mean_x2: Vec<f64>,
    pub mean_y2: Vec<f64>,
    pub mean_xy: Vec<f64>,
    /// Radial second moment, present in tracked simulations only.
    pub mean_x2_r: Option<Vec<f64>>,
}

impl BeamSamples {
    pub fn read_csv(path: &Path) -> ModelResult<Self> {
        Self::from_table(&Table::read_csv(path)?)
    }

    pub fn from_table(table: &Table) -> ModelResult<Self> {
        let samples = Self {
            mean_x: table.require_column("mean_x")?.to_vec(),
            mean_y: table.require_column("mean_y")?.to_vec(),
            mean_x2: table.require_column("mean_x2")?.to_vec(),
            mean_y2: table.require_column("mean_y2")?.to_vec(),
            mean_xy: table.require_column("mean_xy")?.to_vec(),
            mean_x2_r: table.column("mean_x2_r").map(<[f64]>::to_vec),
        };
        if samples.is_empty() {
            return Err(ModelError::Parse {
                path: table.source().to_path_buf(),
                reason: "beam table has no rows".to_string(),
            });
        }
        Ok(samples)
    }

    pub fn len(&self) -> usize {
        self.mean_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean_x.is_empty()
    }

    /// Beam parameters from population means over all iterations.
    pub fn params(&self) -> BeamParams {
        let bw2 = atmoslink_stats::mean(&self.mean_x.iter().map(|x| x * x).collect::<Vec<_>>());
        let x2 = atmoslink_stats::mean(&self.mean_x2);
        BeamParams {
            bw2,
            st2: 4.0 * (x2 - bw2),
            lt2: 4.0 * x2,
        }
    }

    /// Centroid displacement `r₀ = √(x₀² + y₀²)` per iteration.
    pub fn centroid_radii(&self) -> Vec<f64> {
        self.mean_x
            .iter()
            .zip(&self.mean_y)
            .map(|(x, y)| x.hypot(*y))
            .collect()
    }

    /// Spot-size matrix of iteration `i`.
    pub fn spot_matrix(&self, i: usize) -> SpotMatrix {
        let (x, y) = (self.mean_x[i], self.mean_y[i]);
        SpotMatrix {
            sxx: 4.0 * (self.mean_x2[i] - x * x),
            syy: 4.0 * (self.mean_y2[i] - y * y),
            sxy: 4.0 * (self.mean_xy[i] - x * y),
        }
    }

    /// Squared principal semi-axes of every iteration.
    pub fn semiaxes(&self) -> Vec<(f64, f64)> {
        (0..self.len()).map(|i| self.spot_matrix(i).semiaxes()).collect()
    }

    /// Squared radial spot size `W²_r = 4 (⟨r²⟩ − r₀²)`, when the radial moment
    /// was recorded.
    pub fn radial_spot_size(&self) -> Option<Vec<f64>> {
        let x2_r = self.mean_x2_r.as_ref()?;
        Some(
            x2_r.iter()
                .zip(self.centroid_radii())
                .map(|(m, r0)| 4.0 * (m - r0 * r0))
                .collect(),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Ellipse shape statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Statistics of the beam ellipse shared by every aperture of a channel:
/// beam-wander scale and the mean and covariance of `Θᵢ = ln(W²ᵢ/W₀²)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EllipseShape {
    /// Initial beam radius the semi-axes are normalised by.
    pub w0: f64,
    /// Beam-wander standard deviation, `√bw2`.
    pub bw: f64,
    pub theta_mean: [f64; 2],
    /// Sample covariance (`N − 1` normalisation).
    pub theta_cov: [[f64; 2]; 2],
}

impl EllipseShape {
    /// Fit the shape from beam samples. Iterations with a degenerate spot
    /// (non-positive semi-axis) are skipped.
    pub fn fit(beam: &BeamSamples, w0: f64) -> ModelResult<Self> {
        if !(w0 > 0.0) {
            return Err(ModelError::InvalidParameter(format!(
                "initial beam radius must be positive, got {w0}"
            )));
        }
        let w02 = w0 * w0;
        let thetas: Vec<[f64; 2]> = beam
            .semiaxes()
            .into_iter()
            .map(|(w1, w2)| [(w1 / w02).ln(), (w2 / w02).ln()])
            .filter(|t| t[0].is_finite() && t[1].is_finite())
            .collect();
        let skipped = beam.len() - thetas.len();
        if skipped > 0 {
            log::warn!("skipped {skipped} beam samples with a degenerate spot");
        }
        if thetas.len() < 2 {
            return Err(ModelError::InvalidParameter(
                "need at least two beam samples with a valid spot to fit the ellipse".to_string(),
            ));
        }

        let n = thetas.len() as f64;
        let mean = [
            thetas.iter().map(|t| t[0]).sum::<f64>() / n,
            thetas.iter().map(|t| t[1]).sum::<f64>() / n,
        ];
        let mut cov = [[0.0; 2]; 2];
        for t in &thetas {
            let d = [t[0] - mean[0], t[1] - mean[1]];
            for i in 0..2 {
                for j in 0..2 {
                    cov[i][j] += d[i] * d[j];
                }
            }
        }
        for row in &mut cov {
            for c in row.iter_mut() {
                *c /= n - 1.0;
            }
        }

        Ok(Self {
            w0,
            bw: beam.params().bw2.sqrt(),
            theta_mean: mean,
            theta_cov: cov,
        })
    }

    /// Lower-triangular Cholesky factor of the Θ covariance. A singular
    /// covariance yields a zero column.
    pub fn theta_cholesky(&self) -> [[f64; 2]; 2] {
        let c = &self.theta_cov;
        let l11 = c[0][0].max(0.0).sqrt();
        let l21 = if l11 > 0.0 { c[1][0] / l11 } else { 0.0 };
        let l22 = (c[1][1] - l21 * l21).max(0.0).sqrt();
        [[l11, 0.0], [l21, l22]]
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Channel parameters
// ═══════════════════════════════════════════════════════════════════════════════

/// Physical channel parameters written by the simulator as `params.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    pub source: SourceParams,
    pub path: PathParams,
    pub aperture: ApertureParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceParams {
    /// Initial beam radius.
    #[serde(rename = "W0")]
    pub w0: f64,
    /// Wavelength.
    pub wvl: f64,
    /// Focal length; `None` for a collimated beam.
    #[serde(rename = "F0")]
    pub f0: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathParams {
    #[serde(rename = "Cn2")]
    pub cn2: f64,
    /// Inner scale of turbulence.
    pub l0: Option<f64>,
    /// Outer scale of turbulence; `None` when infinite.
    #[serde(rename = "L0")]
    pub outer_scale: Option<f64>,
    pub length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApertureParams {
    pub radius: f64,
}

impl ChannelParams {
    pub fn read_json(path: &Path) -> ModelResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ModelError::from_io(path, e))?;
        Self::parse(&text)
    }

    /// Parse `params.json`. Non-finite tokens (`Infinity`, `-Infinity`,
    /// `NaN`) are read as `null`.
    pub fn parse(text: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(&replace_non_finite(text))?)
    }
}

fn replace_non_finite(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else {
            let token = ["-Infinity", "Infinity", "NaN"]
                .into_iter()
                .find(|t| rest.starts_with(t));
            if let Some(token) = token {
                out.push_str("null");
                rest = &rest[token.len()..];
                continue;
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(mean_x: Vec<f64>, mean_x2: Vec<f64>) -> BeamSamples {
        let n = mean_x.len();
        BeamSamples {
            mean_x,
            mean_y: vec![0.0; n],
            mean_x2: mean_x2.clone(),
            mean_y2: mean_x2,
            mean_xy: vec![0.0; n],
            mean_x2_r: None,
        }
    }

    #[test]
    fn test_beam_params_population_means() {
        let params = samples(vec![0.1, -0.1], vec![0.02, 0.03]).params();
        assert!((params.bw2 - 0.01).abs() < 1e-15);
        assert!((params.lt2 - 0.1).abs() < 1e-15);
        assert!((params.st2 - 0.06).abs() < 1e-15);
    }

    #[test]
    fn test_from_table_requires_moment_columns() {
        let table = Table::parse("mean_x,mean_y\n0.1,0.2\n", Path::new("beam.csv")).unwrap();
        assert!(matches!(
            BeamSamples::from_table(&table),
            Err(ModelError::Parse { .. })
        ));

        let table = Table::parse(
            "mean_x,mean_y,mean_x2,mean_y2,mean_xy,mean_x2_r\n0.1,0.0,0.02,0.02,0.0,0.05\n",
            Path::new("beam.csv"),
        )
        .unwrap();
        let beam = BeamSamples::from_table(&table).unwrap();
        assert_eq!(beam.len(), 1);
        let w2r = beam.radial_spot_size().unwrap();
        assert!((w2r[0] - 4.0 * (0.05 - 0.01)).abs() < 1e-15);
    }

    #[test]
    fn test_semiaxes_of_rotated_ellipse() {
        // S = R diag(4, 1) Rᵀ with 45° rotation
        let s = SpotMatrix { sxx: 2.5, syy: 2.5, sxy: 1.5 };
        let (w1, w2) = s.semiaxes();
        assert!((w1 - 4.0).abs() < 1e-12);
        assert!((w2 - 1.0).abs() < 1e-12);

        let s = SpotMatrix { sxx: 2.5, syy: 2.5, sxy: -1.5 };
        let (w1, w2) = s.semiaxes();
        assert!((w1 - 1.0).abs() < 1e-12);
        assert!((w2 - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_semiaxes_preserve_trace() {
        let s = SpotMatrix { sxx: 3.0, syy: 1.0, sxy: 0.4 };
        let (w1, w2) = s.semiaxes();
        assert!((w1 + w2 - 4.0).abs() < 1e-12);
        assert!((w1 * w2 - (3.0 - 0.16)).abs() < 1e-12);
    }

    #[test]
    fn test_ellipse_shape_fit() {
        let mut beam = samples(vec![0.001, -0.001, 0.002], vec![0.0, 0.0, 0.0]);
        let w0 = 0.02;
        // Round spots of W² = 4e-4, 8e-4, 4e-4 around each centroid.
        for (i, w2) in [4e-4, 8e-4, 4e-4].into_iter().enumerate() {
            let x = beam.mean_x[i];
            beam.mean_x2[i] = w2 / 4.0 + x * x;
            beam.mean_y2[i] = w2 / 4.0;
        }
        let shape = EllipseShape::fit(&beam, w0).unwrap();
        assert!(shape.theta_mean[0] > 0.0);
        assert!((shape.theta_cov[0][1] - shape.theta_cov[1][0]).abs() < 1e-15);
        assert!((shape.bw - (2e-6f64).sqrt()).abs() < 1e-12);
        let l = shape.theta_cholesky();
        let c00 = l[0][0] * l[0][0];
        assert!((c00 - shape.theta_cov[0][0]).abs() < 1e-12);
    }

    #[test]
    fn test_ellipse_shape_rejects_bad_radius() {
        let beam = samples(vec![0.1, -0.1], vec![0.02, 0.03]);
        assert!(EllipseShape::fit(&beam, 0.0).is_err());
    }

    #[test]
    fn test_channel_params_with_infinite_focus() {
        let text = r#"{
            "source": {"W0": 0.02, "wvl": 8.08e-07, "F0": Infinity},
            "path": {"Cn2": 1.5e-14, "l0": 0.001, "L0": Infinity, "length": 1000},
            "aperture": {"radius": 0.05}
        }"#;
        let params = ChannelParams::parse(text).unwrap();
        assert_eq!(params.source.w0, 0.02);
        assert_eq!(params.source.f0, None);
        assert_eq!(params.path.outer_scale, None);
        assert_eq!(params.path.l0, Some(0.001));
        assert_eq!(params.aperture.radius, 0.05);
    }

    #[test]
    fn test_non_finite_tokens_inside_strings_survive() {
        assert_eq!(replace_non_finite(r#"{"a": "NaN", "b": NaN}"#), r#"{"a": "NaN", "b": null}"#);
        assert_eq!(replace_non_finite("[-Infinity, 1]"), "[null, 1]");
    }
}
