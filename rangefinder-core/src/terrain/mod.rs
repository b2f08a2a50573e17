//! Terrain ranging
//!
//! Distance to the ground along the line of sight, from a gridded elevation
//! model:
//!
//! | module     | role                                                  |
//! |------------|-------------------------------------------------------|
//! | `geo`      | local ENU frame, tile naming                          |
//! | `tile`     | `.hgt` decoding and bilinear interpolation            |
//! | `cache`    | LRU of decoded tiles shared with the background loader |
//! | `provider` | [`ElevationSource`] trait, tiles-then-remote layering  |
//! | `raycast`  | march + bisection, result reuse cache                 |

mod cache;
mod geo;
mod provider;
mod raycast;
mod tile;

pub use cache::TileCache;
pub use geo::{advance, ground_distance, heading_delta, offset, EnuDirection, TileKey};
pub use provider::{ElevationSource, LayeredElevation, PointElevationSource};
pub use raycast::{terrain_reading, terrain_uncertainty, RayQuery, TerrainRayCache, TerrainRayCaster};
pub use tile::ElevationTile;
