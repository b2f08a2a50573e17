//! I/O edge for Rangefinder
//!
//! ## Overview
//!
//! The frame pipeline in `rangefinder-core` is synchronous and never waits on
//! slow work. Everything that can take longer than a frame lives here:
//!
//! | module  | what                                     | cadence      |
//! |---------|------------------------------------------|--------------|
//! | `tasks` | one-in-flight subsystem workers          | 2 - 15 Hz    |
//! | `tiles` | HGT elevation tile loading and prefetch  | on demand    |
//! | `http`  | remote point-elevation client            | on tile miss |
//!
//! ## Worker Model
//!
//! Neural inference, object detection and terrain ray casting each run in an
//! [`tasks::InFlightWorker`]:
//!
//! ```text
//!   frame loop                      worker task
//!   ──────────                      ───────────
//!   submit(input) ──[queue: 1]──▶  run(input)
//!        │  WouldBlock if busy           │
//!        │  or rate-limited              ▼
//!   latest() ◀──────[watch]─────── publish(result)
//! ```
//!
//! The frame loop keeps using the last published result until a fresh one
//! lands. A cancelled worker finishes its current step and publishes nothing.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use rangefinder_connectors::tiles::TileLoader;
//! use rangefinder_core::terrain::TileCache;
//! use rangefinder_core::types::GeoPoint;
//!
//! let cache = Arc::new(TileCache::default());
//! let loader = TileLoader::new("/data/srtm", Arc::clone(&cache));
//! let observer = GeoPoint::new(37.5, -121.5, 140.0);
//! let loaded = loader.load_along_ray(&observer, 0.0, 5000.0)?;
//! println!("{} tiles loaded", loaded);
//! # Ok::<(), rangefinder_connectors::ConnectorError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod tasks;
pub mod tiles;

#[cfg(feature = "http")]
pub mod http;

// Re-export common types
pub use tasks::{FrameTask, InFlightWorker, Stamped, WorkerConfig};
pub use tiles::{TileLoader, TilePrefetch};

#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpError, RemoteElevationClient};

use rangefinder_core::errors::RangeError;
use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Worker already has a job in flight
    #[error("Worker busy")]
    WorkerBusy,

    /// Work was cancelled before it could publish
    #[error("Cancelled")]
    Cancelled,

    /// Worker task has shut down
    #[error("Worker closed")]
    Closed,

    /// Task failed
    #[error("Task error: {0}")]
    Task(String),

    /// Tile could not be read or decoded
    #[error("Tile error: {0}")]
    Tile(String),

    /// Error reported by the core crate
    #[error(transparent)]
    Core(#[from] RangeError),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request statistics common to the remote connectors
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Requests answered successfully
    pub requests_sent: u64,
    /// Requests that failed after all retries
    pub requests_failed: u64,
    /// Points that came back with an elevation
    pub points_resolved: u64,
    /// Retries issued
    pub retries: u32,
    /// Last error message
    pub last_error: Option<String>,
}
