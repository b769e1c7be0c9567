//! Column-oriented numeric tables read from the simulator's CSV output.
//!
//! Every file the pipeline consumes is a plain comma-separated table with a
//! single header row and numeric cells. Empty cells read as NaN. A leading
//! unnamed column (a written-out row index) is discarded.

use std::fs;
use std::path::{Path, PathBuf};

use crate::aperture::ApertureMap;
use crate::error::{ModelError, ModelResult};

/// Centroid columns carried alongside transmittance columns in tracked and
/// shifted-aperture tables.
pub const CENTROID_COLUMNS: [&str; 2] = ["mean_x", "mean_y"];

/// A parsed numeric table: named columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    columns: Vec<Vec<f64>>,
    source: PathBuf,
}

impl Table {
    /// Read and parse a CSV file. An absent file is [`ModelError::MissingData`].
    pub fn read_csv(path: &Path) -> ModelResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ModelError::from_io(path, e))?;
        Self::parse(&text, path)
    }

    /// Parse CSV text. `source` is used only in error messages.
    pub fn parse(text: &str, source: &Path) -> ModelResult<Self> {
        let parse_err = |reason: String| ModelError::Parse {
            path: source.to_path_buf(),
            reason,
        };

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header_line = lines
            .next()
            .ok_or_else(|| parse_err("empty file".to_string()))?;
        let mut headers: Vec<String> = header_line.split(',').map(clean_cell).collect();
        let skip_index = headers.len() > 1 && headers[0].is_empty();
        if skip_index {
            headers.remove(0);
        }

        let mut columns = vec![Vec::new(); headers.len()];
        for (row, line) in lines.enumerate() {
            let mut cells = line.split(',').map(clean_cell);
            if skip_index {
                cells.next();
            }
            let cells: Vec<String> = cells.collect();
            if cells.len() != headers.len() {
                return Err(parse_err(format!(
                    "row {} has {} cells, expected {}",
                    row + 1,
                    cells.len(),
                    headers.len()
                )));
            }
            for (column, cell) in columns.iter_mut().zip(&cells) {
                column.push(parse_number(cell).ok_or_else(|| {
                    parse_err(format!("row {}: '{cell}' is not a number", row + 1))
                })?);
            }
        }

        Ok(Self {
            headers,
            columns,
            source: source.to_path_buf(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Number of data rows.
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Like [`Table::column`], but absence is a parse error naming the column.
    pub fn require_column(&self, name: &str) -> ModelResult<&[f64]> {
        self.column(name).ok_or_else(|| ModelError::Parse {
            path: self.source.clone(),
            reason: format!("missing column '{name}'"),
        })
    }

    /// Remove the named columns. Names that are not present are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let mut i = 0;
        while i < self.headers.len() {
            if names.contains(&self.headers[i].as_str()) {
                self.headers.remove(i);
                self.columns.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Interpret every header as an aperture radius and key the columns by it.
    pub fn into_aperture_map(self) -> ModelResult<ApertureMap<Vec<f64>>> {
        let source = self.source;
        let radii = self
            .headers
            .iter()
            .map(|h| {
                h.parse::<f64>().map_err(|_| ModelError::Parse {
                    path: source.clone(),
                    reason: format!("column '{h}' is not an aperture radius"),
                })
            })
            .collect::<ModelResult<Vec<f64>>>()?;
        ApertureMap::from_parts(radii, self.columns)
    }
}

fn clean_cell(cell: &str) -> String {
    cell.trim().trim_matches('"').to_string()
}

fn parse_number(cell: &str) -> Option<f64> {
    match cell {
        "" | "nan" | "NaN" => Some(f64::NAN),
        "inf" | "Infinity" => Some(f64::INFINITY),
        "-inf" | "-Infinity" => Some(f64::NEG_INFINITY),
        _ => cell.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ModelResult<Table> {
        Table::parse(text, Path::new("test.csv"))
    }

    #[test]
    fn test_parse_aperture_table() {
        let table = parse("0.01,0.02\n0.5,0.7\n0.6,0.8\n").unwrap();
        assert_eq!(table.rows(), 2);
        let map = table.into_aperture_map().unwrap();
        assert_eq!(map.radii(), &[0.01, 0.02]);
        assert_eq!(map.get(0.02).unwrap(), &vec![0.7, 0.8]);
    }

    #[test]
    fn test_leading_index_column_is_dropped() {
        let table = parse(",mean_x,mean_y\n0,0.1,0.2\n1,0.3,0.4\n").unwrap();
        assert_eq!(table.headers(), &["mean_x", "mean_y"]);
        assert_eq!(table.column("mean_y").unwrap(), &[0.2, 0.4]);
    }

    #[test]
    fn test_drop_centroid_columns() {
        let mut table = parse("0.01,mean_x,0.02,mean_y\n0.5,1.0,0.7,2.0\n").unwrap();
        table.drop_columns(&CENTROID_COLUMNS);
        let map = table.into_aperture_map().unwrap();
        assert_eq!(map.radii(), &[0.01, 0.02]);
    }

    #[test]
    fn test_non_numeric_header_is_parse_error() {
        let table = parse("0.01,mean_x\n0.5,1.0\n").unwrap();
        let err = table.into_aperture_map().unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
    }

    #[test]
    fn test_ragged_row_is_parse_error() {
        assert!(matches!(parse("a,b\n1.0\n"), Err(ModelError::Parse { .. })));
        assert!(matches!(parse("a\nx\n"), Err(ModelError::Parse { .. })));
        assert!(matches!(parse(""), Err(ModelError::Parse { .. })));
    }

    #[test]
    fn test_empty_cell_reads_as_nan() {
        let table = parse("a,b\n1.0,\n").unwrap();
        assert!(table.column("b").unwrap()[0].is_nan());
    }

    #[test]
    fn test_missing_file_is_missing_data() {
        let dir = tempfile::tempdir().unwrap();
        let err = Table::read_csv(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, ModelError::MissingData { .. }));
    }
}
