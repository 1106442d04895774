//! Voronoi Admin - approximate administrative boundaries from gazetteer points
//!
//! This library builds a proximity tessellation over a country's populated
//! places, aggregates its cells into per-admin-area regions and cleans the
//! tessellation noise out of the result. The `generate` binary drives it in
//! batches of (country, admin level) tasks.

pub mod batch;
pub mod clean;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod load;
pub mod models;
pub mod region;
pub mod select;
pub mod tessellation;

pub use clean::CleanStrategy;
pub use error::GenerateError;
pub use models::{AdminCodes, AdminLevel, CountryOutline, Gazetteer, OutlineTable, Place};
