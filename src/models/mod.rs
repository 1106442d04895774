//! Core data models for gazetteer-driven polygon generation.

pub mod admin;
pub mod outline;
pub mod place;
pub mod task;

pub use admin::{AdminCodes, AdminLevel, DEFAULT_ADMIN_LEVELS, MAX_ADMIN_DEPTH};
pub use outline::{CountryOutline, OutlineTable};
pub use place::{Gazetteer, Place};
pub use task::{AreaPolygons, Task, TaskOutput};
