use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::TerrainError;
use crate::tile::{Bounds, ElevationTile, NodataPolicy};

/// Maximum directory depth followed while scanning for tiles
const MAX_SCAN_DEPTH: usize = 64;

/// Order tiles are consulted in; the first tile with a value wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileOrder {
    /// Whatever order the filesystem lists entries in.
    #[default]
    Discovery,
    /// Sorted by path, so seams resolve the same way on every machine.
    Lexical,
}

#[derive(Debug, Clone)]
pub struct MosaicOptions {
    /// Recognised file extensions, matched case-insensitively.
    pub extensions: Vec<String>,
    pub nodata: NodataPolicy,
    pub order: TileOrder,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["asc".into()],
            nodata: NodataPolicy::default(),
            order: TileOrder::default(),
        }
    }
}

/// Many tiles answering point queries as one surface.
#[derive(Debug, Clone, Default)]
pub struct ElevationMosaic {
    tiles: Vec<ElevationTile>,
    paths: Vec<PathBuf>,
}

impl ElevationMosaic {
    /// Load every matching tile under `root`. One bad tile fails the whole
    /// mosaic; there is no partial load.
    pub fn load(root: &Path, opts: &MosaicOptions) -> Result<Self, TerrainError> {
        let mut visited = HashSet::new();
        let mut paths = Vec::new();
        scan_dir(root, opts, &mut visited, &mut paths, 0)?;

        if opts.order == TileOrder::Lexical {
            paths.sort();
        }

        let mut tiles = Vec::with_capacity(paths.len());
        for p in &paths {
            debug!("terrain: loading {}", p.display());
            tiles.push(ElevationTile::load(p, opts.nodata)?);
        }
        info!("terrain: loaded {} tiles from {}", tiles.len(), root.display());
        Ok(Self { tiles, paths })
    }

    /// Mosaic over already-parsed tiles, consulted in the given order.
    pub fn from_tiles(tiles: Vec<ElevationTile>) -> Self {
        Self { tiles, paths: Vec::new() }
    }

    pub fn tiles(&self) -> &[ElevationTile] {
        &self.tiles
    }

    /// Source files in load order; empty for [`from_tiles`](Self::from_tiles).
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Union of all tile extents.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut it = self.tiles.iter().map(|t| t.bounds());
        let first = it.next()?;
        Some(it.fold(first, |acc, b| acc.union(&b)))
    }

    /// Ground height at (x, y) from the first tile that covers it.
    pub fn lookup(&self, x: f64, y: f64) -> Option<f64> {
        self.tiles.iter().find_map(|t| t.lookup(x, y))
    }
}

fn has_tile_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|want| want.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn scan_dir(
    dir: &Path,
    opts: &MosaicOptions,
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<PathBuf>,
    depth: usize,
) -> Result<(), TerrainError> {
    if depth > MAX_SCAN_DEPTH {
        debug!("terrain: not descending past {}", dir.display());
        return Ok(());
    }
    let canonical = dir.canonicalize().map_err(|e| TerrainError::io(dir, e))?;
    if !visited.insert(canonical) {
        // symlink loop
        return Ok(());
    }

    let entries = fs::read_dir(dir).map_err(|e| TerrainError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| TerrainError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            scan_dir(&path, opts, visited, out, depth + 1)?;
        } else if path.is_file() && has_tile_extension(&path, &opts.extensions) {
            out.push(path);
        }
    }
    Ok(())
}
