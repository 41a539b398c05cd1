//! Herdwatch Geo - Geofence geometry for livestock tracking
//!
//! This crate contains the pure, side-effect free parts of the geofence:
//! polygon boundaries, the ray-casting membership test, and the synthetic
//! herd generator used to exercise it. Coordinates are planar `f64`
//! latitude/longitude pairs; no geodesic correction is applied.

mod boundary;
mod classify;
mod entity;
mod generator;

pub use boundary::*;
pub use classify::*;
pub use entity::*;
pub use generator::*;
