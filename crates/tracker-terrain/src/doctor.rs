use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;

use crate::{ElevationMosaic, TerrainConfig};

/// Checks the tile directory exists and every tile in it parses.
pub fn check_tiles(cfg: &TerrainConfig) -> Result<ElevationMosaic> {
    let p = Path::new(&cfg.dir);
    anyhow::ensure!(p.is_dir(), "terrain.dir is not a dir: {}", cfg.dir);
    if let Some(exts) = &cfg.extensions {
        anyhow::ensure!(!exts.is_empty(), "terrain.extensions is empty");
    }
    let mosaic = cfg.load_mosaic().with_context(|| format!("load terrain from {}", cfg.dir))?;
    if mosaic.is_empty() {
        warn!("terrain: no tiles found under {}", cfg.dir);
    }
    Ok(mosaic)
}
