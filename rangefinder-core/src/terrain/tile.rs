//! Gridded elevation tiles
//!
//! ## HGT Layout
//!
//! SRTM `.hgt` files are square grids of big-endian `i16` metres. Rows run
//! north to south, columns west to east, and the outer rows/columns overlap the
//! neighbouring tiles:
//!
//! ```text
//!  (lat+1, lon) ●───────────● (lat+1, lon+1)     row 0
//!               │           │
//!               │   n × n   │
//!               │   posts   │
//!  (lat, lon)   ●───────────● (lat, lon+1)       row n−1
//! ```
//!
//! `n` is 1201 for 3 arc-second and 3601 for 1 arc-second data. Voids are
//! marked with −32768.
//!
//! ## Interpolation
//!
//! Bilinear over the four posts surrounding the query point:
//!
//! ```text
//! z = z00·(1−u)(1−v) + z10·u(1−v) + z01·(1−u)v + z11·u·v
//! ```
//!
//! A void among the four posts makes the point unavailable.

use log::warn;

use crate::constants::terrain::{HGT_VOID, METERS_PER_DEGREE};
use crate::errors::{RangeError, RangeResult};

use super::geo::TileKey;

/// One square elevation grid covering a 1° × 1° cell
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationTile {
    key: TileKey,
    posts: usize,
    data: Vec<i16>,
}

impl ElevationTile {
    /// Decode raw `.hgt` bytes
    pub fn from_hgt_bytes(key: TileKey, bytes: &[u8]) -> RangeResult<Self> {
        if bytes.len() % 2 != 0 {
            return Err(RangeError::Tile(format!("{}: odd byte count {}", key, bytes.len())));
        }
        let samples = bytes.len() / 2;
        let posts = libm::sqrt(samples as f64).round() as usize;
        if posts < 2 || posts * posts != samples {
            return Err(RangeError::Tile(format!("{}: {} samples is not a square grid", key, samples)));
        }

        let data: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        let tile = Self { key, posts, data };
        let voids = tile.void_count();
        if voids > 0 {
            warn!("tile {} has {} void posts", key, voids);
        }
        Ok(tile)
    }

    /// Synthetic tile sampled from `f(lat, lon)` at every post
    pub fn from_fn(key: TileKey, posts: usize, f: impl Fn(f64, f64) -> f64) -> RangeResult<Self> {
        if posts < 2 {
            return Err(RangeError::Tile(format!("{}: need at least 2 posts per side", key)));
        }
        let step = 1.0 / (posts - 1) as f64;
        let mut data = Vec::with_capacity(posts * posts);
        for row in 0..posts {
            let lat = f64::from(key.lat) + 1.0 - row as f64 * step;
            for col in 0..posts {
                let lon = f64::from(key.lon) + col as f64 * step;
                let z = f(lat, lon).round();
                data.push(z.clamp(f64::from(i16::MIN + 1), f64::from(i16::MAX)) as i16);
            }
        }
        Ok(Self { key, posts, data })
    }

    /// Encode back to `.hgt` bytes
    pub fn to_hgt_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|z| z.to_be_bytes()).collect()
    }

    /// Tile identity
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Posts per side
    pub fn posts(&self) -> usize {
        self.posts
    }

    /// Number of void posts
    pub fn void_count(&self) -> usize {
        self.data.iter().filter(|z| **z == HGT_VOID).count()
    }

    /// Post spacing along the finer axis at `latitude` (m)
    pub fn resolution_m(&self, latitude: f64) -> f64 {
        let north = METERS_PER_DEGREE / (self.posts - 1) as f64;
        let east = north * libm::cos(latitude.to_radians()).abs();
        north.min(east).max(1.0)
    }

    fn post(&self, row: usize, col: usize) -> Option<f64> {
        let z = *self.data.get(row * self.posts + col)?;
        (z != HGT_VOID).then_some(f64::from(z))
    }

    /// Bilinear elevation at a point inside the tile
    pub fn elevation_at(&self, latitude: f64, longitude: f64) -> Option<f64> {
        if !self.key.contains(latitude, longitude) {
            return None;
        }
        let span = (self.posts - 1) as f64;
        let row_f = (f64::from(self.key.lat) + 1.0 - latitude) * span;
        let col_f = (longitude - f64::from(self.key.lon)) * span;

        let row0 = (libm::floor(row_f) as usize).min(self.posts - 2);
        let col0 = (libm::floor(col_f) as usize).min(self.posts - 2);
        let v = row_f - row0 as f64;
        let u = col_f - col0 as f64;

        let z00 = self.post(row0, col0)?;
        let z10 = self.post(row0, col0 + 1)?;
        let z01 = self.post(row0 + 1, col0)?;
        let z11 = self.post(row0 + 1, col0 + 1)?;

        Some(z00 * (1.0 - u) * (1.0 - v) + z10 * u * (1.0 - v) + z01 * (1.0 - u) * v + z11 * u * v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> TileKey {
        TileKey { lat: 46, lon: 7 }
    }

    #[test]
    fn decodes_big_endian_rows_north_to_south() {
        // 2×2: NW=100, NE=200, SW=300, SE=400
        let bytes: Vec<u8> = [100i16, 200, 300, 400].iter().flat_map(|z| z.to_be_bytes()).collect();
        let tile = ElevationTile::from_hgt_bytes(key(), &bytes).unwrap();
        assert_eq!(tile.elevation_at(47.0, 7.0), Some(100.0));
        assert_eq!(tile.elevation_at(46.0, 8.0), Some(400.0));
        assert_eq!(tile.elevation_at(46.5, 7.5), Some(250.0));
    }

    #[test]
    fn rejects_non_square() {
        assert!(ElevationTile::from_hgt_bytes(key(), &[0u8; 6]).is_err());
        assert!(ElevationTile::from_hgt_bytes(key(), &[0u8; 7]).is_err());
    }

    #[test]
    fn void_posts_make_point_unavailable() {
        let bytes: Vec<u8> = [100i16, HGT_VOID, 300, 400].iter().flat_map(|z| z.to_be_bytes()).collect();
        let tile = ElevationTile::from_hgt_bytes(key(), &bytes).unwrap();
        assert_eq!(tile.void_count(), 1);
        assert_eq!(tile.elevation_at(46.5, 7.5), None);
    }

    #[test]
    fn outside_tile_is_none() {
        let tile = ElevationTile::from_fn(key(), 11, |_, _| 500.0).unwrap();
        assert_eq!(tile.elevation_at(45.9, 7.5), None);
        assert_eq!(tile.elevation_at(46.5, 7.5), Some(500.0));
    }

    #[test]
    fn synthetic_plane_interpolates_exactly() {
        let tile = ElevationTile::from_fn(key(), 101, |lat, _| (lat - 46.0) * 1000.0).unwrap();
        let z = tile.elevation_at(46.255, 7.3).unwrap();
        assert!((z - 255.0).abs() < 1e-6);
    }

    #[test]
    fn hgt_round_trip() {
        let tile = ElevationTile::from_fn(key(), 5, |lat, lon| lat * 10.0 + lon).unwrap();
        let back = ElevationTile::from_hgt_bytes(key(), &tile.to_hgt_bytes()).unwrap();
        assert_eq!(back, tile);
    }

    #[test]
    fn resolution_of_three_arcsecond_tile() {
        let tile = ElevationTile::from_fn(key(), 1201, |_, _| 0.0).unwrap();
        let res = tile.resolution_m(0.0);
        assert!((res - 92.66).abs() < 0.1);
        assert!(tile.resolution_m(60.0) < res * 0.51);
    }
}
