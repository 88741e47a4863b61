//! One ASCII elevation grid (`.asc`): a short `key value` header followed by
//! `nrows` lines of `ncols` heights, northernmost row first.
//!
//! Heights are stored south to north so both axes ascend from the lower-left
//! corner. Grid nodes sit at `corner + i * cellsize`.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::TerrainError;

/// Slack, in cells, for points that land on the far edge after rounding.
const EDGE_EPS: f64 = 1e-9;

/// What to store for cells equal to the file's NODATA_value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodataPolicy {
    /// Store 0.0. Indistinguishable from sea level afterwards.
    #[default]
    ZeroFill,
    /// Keep the hole; lookups that need the cell return None.
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElevationTile {
    nrows: usize,
    ncols: usize,
    xll: f64,
    yll: f64,
    cellsize: f64,
    nodata: Option<f64>,
    /// Row-major, row 0 = southernmost.
    z: Vec<f64>,
}

#[derive(Default)]
struct Header {
    nrows: Option<usize>,
    ncols: Option<usize>,
    xll: Option<f64>,
    yll: Option<f64>,
    cellsize: Option<f64>,
    nodata: Option<f64>,
}

impl ElevationTile {
    pub fn load(path: &Path, policy: NodataPolicy) -> Result<Self, TerrainError> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            // not UTF-8: the file is there but its content is not a grid
            std::io::ErrorKind::InvalidData => TerrainError::malformed(path, format!("not a text grid: {e}")),
            _ => TerrainError::io(path, e),
        })?;
        Self::parse(path, &text, policy)
    }

    /// Parse tile text. `source` only labels errors and log lines.
    pub fn parse(source: &Path, text: &str, policy: NodataPolicy) -> Result<Self, TerrainError> {
        let bad = |reason: String| TerrainError::malformed(source, reason);

        let mut hdr = Header::default();
        // top-to-bottom as read
        let mut rows: Vec<Vec<f64>> = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let lineno = idx + 1;
            let mut tokens = line.split_whitespace();
            let Some(first) = tokens.next() else { continue };

            // nan and inf are valid heights, so a row is anything that opens with a number
            if first.parse::<f64>().is_err() {
                if !rows.is_empty() {
                    return Err(bad(format!("line {lineno}: header key '{first}' after data rows")));
                }
                let value = tokens
                    .next()
                    .ok_or_else(|| bad(format!("line {lineno}: header key '{first}' has no value")))?;
                let key = first.to_ascii_lowercase();
                match key.as_str() {
                    "nrows" => hdr.nrows = Some(parse_count(value).map_err(|r| bad(format!("line {lineno}: nrows {r}")))?),
                    "ncols" => hdr.ncols = Some(parse_count(value).map_err(|r| bad(format!("line {lineno}: ncols {r}")))?),
                    // Grid nodes are cell centres, so a centre-registered origin is
                    // already the lower-left node and takes no half-cell shift.
                    "xllcorner" | "xllcenter" => hdr.xll = Some(parse_num(value).map_err(|r| bad(format!("line {lineno}: {key} {r}")))?),
                    "yllcorner" | "yllcenter" => hdr.yll = Some(parse_num(value).map_err(|r| bad(format!("line {lineno}: {key} {r}")))?),
                    "cellsize" => hdr.cellsize = Some(parse_num(value).map_err(|r| bad(format!("line {lineno}: cellsize {r}")))?),
                    "nodata_value" => hdr.nodata = Some(parse_num(value).map_err(|r| bad(format!("line {lineno}: NODATA_value {r}")))?),
                    _ => return Err(bad(format!("line {lineno}: unknown header key '{first}'"))),
                }
                debug!("tile {}: {} = {}", source.display(), key, value);
                continue;
            }

            let ncols = hdr.ncols.ok_or_else(|| bad(format!("line {lineno}: data row before ncols")))?;
            let nrows = hdr.nrows.ok_or_else(|| bad(format!("line {lineno}: data row before nrows")))?;
            if rows.len() == nrows {
                return Err(bad(format!("more than {nrows} data rows")));
            }

            let mut row = Vec::with_capacity(ncols);
            for tok in std::iter::once(first).chain(tokens) {
                let v = parse_num(tok).map_err(|r| bad(format!("line {lineno}: height {r}")))?;
                row.push(v);
            }
            if row.len() != ncols {
                return Err(bad(format!("line {lineno}: {} values, expected {ncols}", row.len())));
            }
            rows.push(row);
        }

        let nrows = hdr.nrows.ok_or_else(|| bad("missing nrows".into()))?;
        let ncols = hdr.ncols.ok_or_else(|| bad("missing ncols".into()))?;
        let xll = hdr.xll.ok_or_else(|| bad("missing xllcorner".into()))?;
        let yll = hdr.yll.ok_or_else(|| bad("missing yllcorner".into()))?;
        let cellsize = hdr.cellsize.ok_or_else(|| bad("missing cellsize".into()))?;
        if !(cellsize > 0.0) {
            return Err(bad(format!("cellsize must be positive, got {cellsize}")));
        }
        if rows.len() != nrows {
            return Err(bad(format!("header says {nrows} rows, read {}", rows.len())));
        }

        let fill = match policy {
            NodataPolicy::ZeroFill => 0.0,
            NodataPolicy::Missing => f64::NAN,
        };
        let mut z = Vec::with_capacity(nrows * ncols);
        for row in rows.into_iter().rev() {
            z.extend(row.into_iter().map(|v| match hdr.nodata {
                Some(nd) if v == nd => fill,
                _ => v,
            }));
        }

        debug!("tile {}: read {} rows", source.display(), nrows);
        Ok(Self { nrows, ncols, xll, yll, cellsize, nodata: hdr.nodata, z })
    }

    pub fn nrows(&self) -> usize { self.nrows }
    pub fn ncols(&self) -> usize { self.ncols }
    pub fn cellsize(&self) -> f64 { self.cellsize }
    pub fn nodata(&self) -> Option<f64> { self.nodata }

    /// Lower-left grid node.
    pub fn origin(&self) -> (f64, f64) {
        (self.xll, self.yll)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min_x: self.xll,
            min_y: self.yll,
            max_x: self.xll + (self.ncols - 1) as f64 * self.cellsize,
            max_y: self.yll + (self.nrows - 1) as f64 * self.cellsize,
        }
    }

    /// Ascending x coordinate of every column.
    pub fn x_axis(&self) -> Vec<f64> {
        (0..self.ncols).map(|i| self.xll + i as f64 * self.cellsize).collect()
    }

    /// Ascending y coordinate of every row.
    pub fn y_axis(&self) -> Vec<f64> {
        (0..self.nrows).map(|j| self.yll + j as f64 * self.cellsize).collect()
    }

    /// Stored height, row 0 = south. NaN only under [`NodataPolicy::Missing`].
    pub fn height(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.nrows || col >= self.ncols {
            return None;
        }
        Some(self.z[row * self.ncols + col])
    }

    /// Bilinear height at (x, y); None outside the tile or over a hole.
    pub fn lookup(&self, x: f64, y: f64) -> Option<f64> {
        let (i, tx) = axis_cell(x, self.xll, self.cellsize, self.ncols)?;
        let (j, ty) = axis_cell(y, self.yll, self.cellsize, self.nrows)?;

        let i1 = (i + 1).min(self.ncols - 1);
        let j1 = (j + 1).min(self.nrows - 1);
        let corners = [
            ((1.0 - tx) * (1.0 - ty), j, i),
            (tx * (1.0 - ty), j, i1),
            ((1.0 - tx) * ty, j1, i),
            (tx * ty, j1, i1),
        ];

        let mut acc = 0.0;
        for (w, row, col) in corners {
            // zero-weight corners may be holes we never touch
            if w == 0.0 {
                continue;
            }
            let z = self.z[row * self.ncols + col];
            if z.is_nan() {
                return None;
            }
            acc += w * z;
        }
        Some(acc)
    }
}

/// Cell index and fractional offset of `v` along one axis.
fn axis_cell(v: f64, origin: f64, cellsize: f64, n: usize) -> Option<(usize, f64)> {
    let max = (n - 1) as f64;
    let f = (v - origin) / cellsize;
    if f.is_nan() || f < -EDGE_EPS || f > max + EDGE_EPS {
        return None;
    }
    if n == 1 {
        return Some((0, 0.0));
    }
    let f = f.clamp(0.0, max);
    let i = (f.floor() as usize).min(n - 2);
    Some((i, f - i as f64))
}

fn parse_count(v: &str) -> Result<usize, String> {
    match v.parse::<usize>() {
        Ok(0) => Err("must be at least 1".into()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{v}' is not a count")),
    }
}

fn parse_num(v: &str) -> Result<f64, String> {
    v.parse::<f64>().map_err(|_| format!("'{v}' is not a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ElevationTile, TerrainError> {
        ElevationTile::parse(Path::new("test.asc"), text, NodataPolicy::ZeroFill)
    }

    const TWO_BY_TWO: &str = "nrows 2\nncols 2\nxllcorner 100\nyllcorner 200\ncellsize 10\n1 2\n3 4\n";

    #[test]
    fn two_by_two_loads_south_first() {
        let t = parse(TWO_BY_TWO).unwrap();
        assert_eq!((t.nrows(), t.ncols()), (2, 2));
        // first line in the file is the northern row
        assert_eq!(t.height(1, 0), Some(1.0));
        assert_eq!(t.height(1, 1), Some(2.0));
        assert_eq!(t.height(0, 0), Some(3.0));
        assert_eq!(t.height(0, 1), Some(4.0));
        assert_eq!(t.x_axis(), vec![100.0, 110.0]);
        assert_eq!(t.y_axis(), vec![200.0, 210.0]);
    }

    #[test]
    fn row_count_mismatch_is_fatal() {
        let text = "nrows 3\nncols 2\nxllcorner 100\nyllcorner 200\ncellsize 10\n1 2\n3 4\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, TerrainError::MalformedTile { .. }), "{err}");
        assert!(err.to_string().contains("header says 3 rows, read 2"));
    }

    #[test]
    fn too_many_rows_is_fatal() {
        let text = "nrows 1\nncols 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2\n3 4\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn wrong_column_count_is_fatal() {
        let text = "nrows 2\nncols 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2\n3 4 5\n";
        let err = parse(text).unwrap_err();
        assert!(err.to_string().contains("3 values, expected 2"));
    }

    #[test]
    fn data_before_ncols_is_fatal() {
        let text = "nrows 2\n1 2\nncols 2\n";
        let err = parse(text).unwrap_err();
        assert!(err.to_string().contains("data row before ncols"));
    }

    #[test]
    fn header_keys_any_case_and_order() {
        let text = "NCOLS 3\nNROWS 1\nXLLCENTER 0\nYLLCENTER 0\nCELLSIZE 5\nNODATA_value -9999\n\n7 -9999 9\n";
        let t = parse(text).unwrap();
        assert_eq!(t.nodata(), Some(-9999.0));
        assert_eq!(t.height(0, 1), Some(0.0));
        assert_eq!(t.bounds().max_x, 10.0);
    }

    #[test]
    fn missing_policy_keeps_holes() {
        let text = "nrows 1\nncols 3\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -1\n5 -1 7\n";
        let t = ElevationTile::parse(Path::new("h.asc"), text, NodataPolicy::Missing).unwrap();
        assert!(t.height(0, 1).unwrap().is_nan());
        assert_eq!(t.lookup(0.0, 0.0), Some(5.0));
        assert_eq!(t.lookup(0.5, 0.0), None);
        assert_eq!(t.lookup(2.0, 0.0), Some(7.0));
    }

    #[test]
    fn unknown_header_key_is_fatal() {
        let text = "nrows 1\nncols 1\nbogus 3\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn non_finite_rows_are_data() {
        let text = "nrows 2\nncols 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nnan 2\ninf 4\n";
        let t = parse(text).unwrap();
        assert!(t.height(1, 0).unwrap().is_nan());
        assert_eq!(t.height(0, 0), Some(f64::INFINITY));
        assert_eq!(t.height(0, 1), Some(4.0));
        // a NaN corner with weight poisons the lookup
        assert_eq!(t.lookup(0.5, 0.5), None);
    }

    #[test]
    fn header_after_data_is_fatal() {
        let text = "nrows 2\nncols 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1\ncellsize 2\n2\n";
        let err = parse(text).unwrap_err();
        assert!(err.to_string().contains("header key 'cellsize' after data rows"), "{err}");
    }

    #[test]
    fn centre_origin_is_first_node() {
        let text = "nrows 1\nncols 2\nxllcenter 102.5\nyllcenter 7.5\ncellsize 5\n1 3\n";
        let t = parse(text).unwrap();
        assert_eq!(t.origin(), (102.5, 7.5));
        assert_eq!(t.lookup(102.5, 7.5), Some(1.0));
        assert_eq!(t.lookup(105.0, 7.5), Some(2.0));
    }

    #[test]
    fn non_utf8_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.asc");
        std::fs::write(&path, [0x6e, 0x72, 0xff, 0xfe, 0x00, 0x81]).unwrap();
        let err = ElevationTile::load(&path, NodataPolicy::ZeroFill).unwrap_err();
        assert!(matches!(err, TerrainError::MalformedTile { .. }), "{err}");

        let err = ElevationTile::load(&dir.path().join("absent.asc"), NodataPolicy::ZeroFill).unwrap_err();
        assert!(matches!(err, TerrainError::Io { .. }), "{err}");
    }

    #[test]
    fn lookup_at_nodes_is_exact() {
        let t = parse(TWO_BY_TWO).unwrap();
        assert_eq!(t.lookup(100.0, 200.0), Some(3.0));
        assert_eq!(t.lookup(110.0, 200.0), Some(4.0));
        assert_eq!(t.lookup(100.0, 210.0), Some(1.0));
        assert_eq!(t.lookup(110.0, 210.0), Some(2.0));
    }

    #[test]
    fn lookup_interpolates() {
        let t = parse(TWO_BY_TWO).unwrap();
        assert_eq!(t.lookup(105.0, 205.0), Some(2.5));
        assert_eq!(t.lookup(105.0, 200.0), Some(3.5));
    }

    #[test]
    fn lookup_outside_is_none() {
        let t = parse(TWO_BY_TWO).unwrap();
        assert_eq!(t.lookup(99.9, 205.0), None);
        assert_eq!(t.lookup(105.0, 210.1), None);
        assert_eq!(t.lookup(f64::NAN, 205.0), None);
    }
}
