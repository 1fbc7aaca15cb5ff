//!
//! # radarflow
//! Live and historical ingestion pipeline for weather radar products: object
//! store discovery and download, incremental chunk assembly, time-indexed
//! record caching with adaptive refresh, and polar-to-geographic sweep
//! computation for rendering.
//!
//! This facade re-exports the workspace's member crates behind feature
//! flags:
//!
//! - `model`: core data structures (sites, radials, moments, volume files)
//! - `data`: object store access and the archive/chunked data providers
//! - `manager`: per-site product management and refresh scheduling
//! - `render`: sweep computation for the rendering layer
//!

#![forbid(unsafe_code)]

#[cfg(feature = "data")]
pub use radarflow_data as data;

#[cfg(feature = "manager")]
pub use radarflow_manager as manager;

#[cfg(feature = "model")]
pub use radarflow_model as model;

#[cfg(feature = "render")]
pub use radarflow_render as render;
