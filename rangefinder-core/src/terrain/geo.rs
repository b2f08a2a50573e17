//! Local geodesy for ray marching
//!
//! Rays never leave a few kilometres around the observer, so a local
//! East-North-Up frame on a spherical Earth is accurate to well under the
//! elevation grid's post spacing:
//!
//! ```text
//! Δlat = north / M            M = metres per degree of latitude
//! Δlon = east  / (M · cos φ)  φ = observer latitude
//! ```

use core::fmt;

use crate::constants::terrain::METERS_PER_DEGREE;
use crate::errors::{RangeError, RangeResult};
use crate::types::GeoPoint;

/// Unit direction in the local ENU frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnuDirection {
    /// East component
    pub east: f64,
    /// North component
    pub north: f64,
    /// Up component
    pub up: f64,
}

impl EnuDirection {
    /// Direction from heading (deg clockwise from true north) and pitch (rad, negative = down)
    ///
    /// `up = sin(pitch)`, so positive pitch climbs.
    pub fn from_heading_pitch(heading_deg: f64, pitch_rad: f64) -> Self {
        let heading = heading_deg.to_radians();
        let horizontal = libm::cos(pitch_rad);
        Self {
            east: horizontal * libm::sin(heading),
            north: horizontal * libm::cos(heading),
            up: libm::sin(pitch_rad),
        }
    }

    /// Horizontal share of a unit step
    pub fn horizontal(&self) -> f64 {
        libm::sqrt(self.east * self.east + self.north * self.north)
    }
}

/// Point `slant_m` metres from `origin` along `dir`
pub fn advance(origin: &GeoPoint, dir: &EnuDirection, slant_m: f64) -> GeoPoint {
    offset(origin, dir.east * slant_m, dir.north * slant_m, dir.up * slant_m)
}

/// Displace `origin` by local ENU metres
pub fn offset(origin: &GeoPoint, east_m: f64, north_m: f64, up_m: f64) -> GeoPoint {
    let cos_lat = libm::cos(origin.latitude.to_radians()).max(1e-6);
    GeoPoint {
        latitude: origin.latitude + north_m / METERS_PER_DEGREE,
        longitude: origin.longitude + east_m / (METERS_PER_DEGREE * cos_lat),
        altitude_m: origin.altitude_m + up_m,
    }
}

/// Equirectangular ground distance between two points (m)
pub fn ground_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let mean_lat = ((a.latitude + b.latitude) * 0.5).to_radians();
    let north = (b.latitude - a.latitude) * METERS_PER_DEGREE;
    let east = (b.longitude - a.longitude) * METERS_PER_DEGREE * libm::cos(mean_lat);
    libm::sqrt(north * north + east * east)
}

/// Smallest signed difference between two headings (deg)
pub fn heading_delta(a_deg: f64, b_deg: f64) -> f64 {
    let mut d = (b_deg - a_deg) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d < -180.0 {
        d += 360.0;
    }
    d
}

/// One-degree elevation tile, named by its south-west corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Integer latitude of the southern edge
    pub lat: i32,
    /// Integer longitude of the western edge
    pub lon: i32,
}

impl TileKey {
    /// Tile containing a point
    pub fn for_point(latitude: f64, longitude: f64) -> Self {
        Self {
            lat: libm::floor(latitude) as i32,
            lon: libm::floor(longitude) as i32,
        }
    }

    /// Point falls inside this tile (edges inclusive)
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        let lat0 = f64::from(self.lat);
        let lon0 = f64::from(self.lon);
        latitude >= lat0 && latitude <= lat0 + 1.0 && longitude >= lon0 && longitude <= lon0 + 1.0
    }

    /// Conventional file name, e.g. `N37W122.hgt`
    pub fn file_name(&self) -> String {
        format!("{}.hgt", self)
    }

    /// Parse `N37W122` with or without the `.hgt` suffix
    pub fn parse(name: &str) -> RangeResult<Self> {
        let stem = name.trim_end_matches(".hgt").trim_end_matches(".HGT");
        let bad = || RangeError::Tile(format!("malformed tile name '{}'", name));
        if stem.len() != 7 || !stem.is_ascii() {
            return Err(bad());
        }
        let (lat_part, lon_part) = stem.split_at(3);
        let lat_sign = match &lat_part[..1] {
            "N" | "n" => 1,
            "S" | "s" => -1,
            _ => return Err(bad()),
        };
        let lon_sign = match &lon_part[..1] {
            "E" | "e" => 1,
            "W" | "w" => -1,
            _ => return Err(bad()),
        };
        let lat: i32 = lat_part[1..].parse().map_err(|_| bad())?;
        let lon: i32 = lon_part[1..].parse().map_err(|_| bad())?;
        if lat > 90 || lon > 180 {
            return Err(bad());
        }
        Ok(Self {
            lat: lat_sign * lat,
            lon: lon_sign * lon,
        })
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.lat >= 0 { 'N' } else { 'S' };
        let ew = if self.lon >= 0 { 'E' } else { 'W' };
        write!(f, "{}{:02}{}{:03}", ns, self.lat.abs(), ew, self.lon.abs())
    }
}
