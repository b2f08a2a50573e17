//! Elevation tile loading
//!
//! Tiles live on disk as SRTM `.hgt` files named by their south-west corner
//! (`N37W122.hgt`). The loader reads them into the shared
//! [`TileCache`] that the ray caster samples:
//!
//! ```text
//!  heading ──▶ missing_along_ray ──▶ [N37W122, N38W122]
//!                                         │
//!                          <root>/N37W122.hgt ──▶ decode ──▶ cache.insert
//! ```
//!
//! A tile that is not on disk is not an error; the caster falls back to the
//! remote point source for that stretch of the ray.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};

use rangefinder_core::pipeline::CancellationToken;
use rangefinder_core::terrain::{ElevationTile, TileCache, TileKey};
use rangefinder_core::types::GeoPoint;

use crate::tasks::FrameTask;
use crate::ConnectorError;

/// Reads `.hgt` tiles from a directory into a shared cache
#[derive(Clone)]
pub struct TileLoader {
    root: PathBuf,
    cache: Arc<TileCache>,
}

impl TileLoader {
    /// Loader for tiles under `root`
    pub fn new(root: impl Into<PathBuf>, cache: Arc<TileCache>) -> Self {
        Self {
            root: root.into(),
            cache,
        }
    }

    /// Tile directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache the loader fills
    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    /// Expected path of a tile
    pub fn path_for(&self, key: TileKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Load one tile
    ///
    /// Returns `Ok(true)` when the tile was read and inserted, `Ok(false)` when
    /// it was already cached or has no file on disk.
    pub fn load(&self, key: TileKey) -> Result<bool, ConnectorError> {
        if self.cache.contains(key) {
            return Ok(false);
        }
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no tile on disk for {}", key);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let tile = ElevationTile::from_hgt_bytes(key, &bytes)?;
        info!("loaded tile {} ({} posts) from {}", key, tile.posts(), path.display());
        self.cache.insert(tile);
        Ok(true)
    }

    /// Load every uncached tile a ray would cross
    ///
    /// Undecodable tiles are logged and skipped. Returns the number of tiles
    /// inserted.
    pub fn load_along_ray(&self, observer: &GeoPoint, heading_deg: f64, max_search_m: f64) -> Result<usize, ConnectorError> {
        let mut loaded = 0;
        for key in self.cache.missing_along_ray(observer, heading_deg, max_search_m) {
            match self.load(key) {
                Ok(true) => loaded += 1,
                Ok(false) => {}
                Err(ConnectorError::Core(e)) => warn!("skipping tile {}: {}", key, e),
                Err(e) => return Err(e),
            }
        }
        Ok(loaded)
    }

    /// Tiles present on disk, sorted
    pub fn available(&self) -> Result<Vec<TileKey>, ConnectorError> {
        let mut keys: Vec<TileKey> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(|name| TileKey::parse(name).ok()))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Prefetch request for [`TilePrefetch`]
#[derive(Debug, Clone, Copy)]
pub struct PrefetchRequest {
    /// Observer position
    pub observer: GeoPoint,
    /// Heading (deg clockwise from true north)
    pub heading_deg: f64,
    /// How far along the heading to look (m)
    pub max_search_m: f64,
}

/// Background tile prefetch, run inside an [`InFlightWorker`](crate::InFlightWorker)
pub struct TilePrefetch {
    loader: TileLoader,
}

impl TilePrefetch {
    /// Prefetch through `loader`
    pub fn new(loader: TileLoader) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl FrameTask for TilePrefetch {
    type Input = PrefetchRequest;
    type Output = usize;

    async fn run(&self, request: PrefetchRequest, cancel: &CancellationToken) -> Result<usize, ConnectorError> {
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        let loader = self.loader.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            loader.load_along_ray(&request.observer, request.heading_deg, request.max_search_m)
        })
        .await
        .map_err(|e| ConnectorError::Task(e.to_string()))??;
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rangefinder_core::terrain::ElevationSource;
    use tokio::runtime::Handle;

    use crate::tasks::{InFlightWorker, WorkerConfig};

    const HOME: TileKey = TileKey { lat: 37, lon: -122 };
    const NORTH: TileKey = TileKey { lat: 38, lon: -122 };

    fn write_flat(dir: &Path, key: TileKey, elevation: f64) {
        let tile = ElevationTile::from_fn(key, 121, |_, _| elevation).unwrap();
        fs::write(dir.join(key.file_name()), tile.to_hgt_bytes()).unwrap();
    }

    #[test]
    fn loads_tile_into_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_flat(dir.path(), HOME, 250.0);
        let loader = TileLoader::new(dir.path(), Arc::new(TileCache::default()));

        assert!(loader.load(HOME).unwrap());
        assert!(loader.cache().contains(HOME));
        assert_eq!(loader.cache().elevation_at(37.5, -121.5), Some(250.0));

        // Second load is a cache hit
        assert!(!loader.load(HOME).unwrap());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TileLoader::new(dir.path(), Arc::new(TileCache::default()));
        assert!(!loader.load(HOME).unwrap());
        assert!(loader.cache().is_empty());
    }

    #[test]
    fn corrupt_tile_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(HOME.file_name()), [0u8; 7]).unwrap();
        let loader = TileLoader::new(dir.path(), Arc::new(TileCache::default()));
        assert!(matches!(loader.load(HOME), Err(ConnectorError::Core(_))));
    }

    #[test]
    fn ray_loads_every_crossed_tile() {
        let dir = tempfile::tempdir().unwrap();
        write_flat(dir.path(), HOME, 100.0);
        write_flat(dir.path(), NORTH, 120.0);
        let loader = TileLoader::new(dir.path(), Arc::new(TileCache::default()));

        // 0.9° south of the northern edge, 150 km north crosses into N38
        let observer = GeoPoint::new(37.1, -121.5, 200.0);
        assert_eq!(loader.load_along_ray(&observer, 0.0, 150_000.0).unwrap(), 2);
        assert!(loader.cache().contains(NORTH));
        assert_eq!(loader.load_along_ray(&observer, 0.0, 150_000.0).unwrap(), 0);
    }

    #[test]
    fn ray_skips_corrupt_tiles() {
        let dir = tempfile::tempdir().unwrap();
        write_flat(dir.path(), HOME, 100.0);
        fs::write(dir.path().join(NORTH.file_name()), [1u8; 3]).unwrap();
        let loader = TileLoader::new(dir.path(), Arc::new(TileCache::default()));

        let observer = GeoPoint::new(37.1, -121.5, 200.0);
        assert_eq!(loader.load_along_ray(&observer, 0.0, 150_000.0).unwrap(), 1);
        assert!(!loader.cache().contains(NORTH));
    }

    #[test]
    fn lists_tiles_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        write_flat(dir.path(), NORTH, 0.0);
        write_flat(dir.path(), HOME, 0.0);
        fs::write(dir.path().join("README.txt"), b"srtm").unwrap();
        let loader = TileLoader::new(dir.path(), Arc::new(TileCache::default()));
        assert_eq!(loader.available().unwrap(), vec![HOME, NORTH]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn prefetch_runs_in_worker() {
        let dir = tempfile::tempdir().unwrap();
        write_flat(dir.path(), HOME, 100.0);
        let cache = Arc::new(TileCache::default());
        let loader = TileLoader::new(dir.path(), Arc::clone(&cache));
        let worker = InFlightWorker::spawn(TilePrefetch::new(loader), WorkerConfig::terrain(), &Handle::current());

        let mut updates = worker.subscribe();
        let request = PrefetchRequest {
            observer: GeoPoint::new(37.5, -121.5, 140.0),
            heading_deg: 90.0,
            max_search_m: 5_000.0,
        };
        assert!(worker.submit(request, 0).is_ok());
        tokio::time::timeout(Duration::from_secs(5), updates.changed())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(worker.latest().unwrap().value, 1);
        assert!(cache.contains(HOME));
    }
}
