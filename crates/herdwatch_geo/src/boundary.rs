//! Boundary Types
//!
//! Defines coordinates and the operator-drawn polygon.

use serde::{Deserialize, Serialize};

/// Minimum number of vertices for a boundary to enclose anything
pub const MIN_VERTICES: usize = 3;

/// Relative tolerance for the collinearity test
const COLLINEAR_EPSILON: f64 = 1e-12;

/// A planar coordinate pair
///
/// Serialized as a `[lat, lng]` array, which is the persisted fence layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<(f64, f64)> for LatLng {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for (f64, f64) {
    fn from(p: LatLng) -> Self {
        (p.lat, p.lng)
    }
}

/// Axis-aligned bounding box of a set of vertices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Grow the box by `buffer` units on every side
    pub fn expand(&self, buffer: f64) -> Self {
        Self {
            min_lat: self.min_lat - buffer,
            max_lat: self.max_lat + buffer,
            min_lng: self.min_lng - buffer,
            max_lng: self.max_lng + buffer,
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lng_span(&self) -> f64 {
        self.max_lng - self.min_lng
    }
}

/// An ordered polygon in the order its vertices were added
///
/// A boundary with fewer than [`MIN_VERTICES`] points is inactive and
/// encloses nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Boundary {
    vertices: Vec<LatLng>,
}

impl Boundary {
    /// Create an empty (inactive) boundary
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a boundary from a complete vertex list
    pub fn from_vertices(vertices: impl IntoIterator<Item = LatLng>) -> Self {
        Self {
            vertices: vertices.into_iter().collect(),
        }
    }

    /// Append a vertex
    pub fn push(&mut self, point: LatLng) {
        self.vertices.push(point);
    }

    /// Remove all vertices
    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    pub fn vertices(&self) -> &[LatLng] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether the boundary has enough vertices to classify against
    pub fn is_active(&self) -> bool {
        self.vertices.len() >= MIN_VERTICES
    }

    /// Bounding box of the vertices, `None` when the boundary is empty
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.vertices.first()?;
        let init = BoundingBox {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lng: first.lng,
            max_lng: first.lng,
        };

        Some(self.vertices.iter().fold(init, |b, p| BoundingBox {
            min_lat: b.min_lat.min(p.lat),
            max_lat: b.max_lat.max(p.lat),
            min_lng: b.min_lng.min(p.lng),
            max_lng: b.max_lng.max(p.lng),
        }))
    }

    /// Whether every vertex lies on one straight line
    ///
    /// Such a boundary encloses nothing. Self-intersecting boundaries are not
    /// collinear even when their signed area cancels out.
    pub fn is_collinear(&self) -> bool {
        let Some(bbox) = self.bounding_box() else {
            return true;
        };
        let Some(&origin) = self.vertices.first() else {
            return true;
        };
        // First vertex distinct from the origin fixes the line's direction
        let Some(&toward) = self.vertices.iter().find(|p| **p != origin) else {
            return true;
        };

        let scale = (bbox.lat_span() + bbox.lng_span()).powi(2);
        let (dx, dy) = (toward.lat - origin.lat, toward.lng - origin.lng);
        self.vertices.iter().all(|p| {
            let cross = dx * (p.lng - origin.lng) - dy * (p.lat - origin.lat);
            cross.abs() <= COLLINEAR_EPSILON * scale
        })
    }

    /// Whether `point` lies inside this boundary
    pub fn contains(&self, point: LatLng) -> bool {
        crate::classify(point, &self.vertices)
    }
}

impl FromIterator<LatLng> for Boundary {
    fn from_iter<I: IntoIterator<Item = LatLng>>(iter: I) -> Self {
        Self::from_vertices(iter)
    }
}
