pub mod doctor;
pub mod error;
pub mod grid;
pub mod mosaic;
pub mod tile;

pub use error::TerrainError;
pub use grid::GridProjection;
pub use mosaic::{ElevationMosaic, MosaicOptions, TileOrder};
pub use tile::{Bounds, ElevationTile, NodataPolicy};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TerrainConfig {
    /// Root directory scanned recursively for tiles.
    pub dir: String,

    /// Tile file extensions, case-insensitive. Default ["asc"].
    pub extensions: Option<Vec<String>>,

    /// Coordinate system the tiles are cut in. Default British National Grid.
    #[serde(default)]
    pub grid: GridProjection,

    #[serde(default)]
    pub nodata: NodataPolicy,

    #[serde(default)]
    pub tile_order: TileOrder,
}

impl TerrainConfig {
    pub fn mosaic_options(&self) -> MosaicOptions {
        let mut opts = MosaicOptions {
            nodata: self.nodata,
            order: self.tile_order,
            ..MosaicOptions::default()
        };
        if let Some(exts) = &self.extensions {
            opts.extensions = exts.clone();
        }
        opts
    }

    pub fn load_mosaic(&self) -> Result<ElevationMosaic, TerrainError> {
        ElevationMosaic::load(std::path::Path::new(&self.dir), &self.mosaic_options())
    }
}

/// Terrain with the projection needed to query it from telemetry positions.
#[derive(Debug, Clone)]
pub struct Terrain {
    pub mosaic: ElevationMosaic,
    pub grid: GridProjection,
}

impl Terrain {
    pub fn new(mosaic: ElevationMosaic, grid: GridProjection) -> Self {
        Self { mosaic, grid }
    }

    /// Ground height under a WGS84 position.
    pub fn elevation_at(&self, lat: f64, lon: f64) -> Option<f64> {
        let (x, y) = self.grid.project(lat, lon);
        self.mosaic.lookup(x, y)
    }
}
