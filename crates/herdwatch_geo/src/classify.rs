//! Boundary Classifier
//!
//! Ray-casting point-in-polygon test. Latitude is treated as the x axis and
//! longitude as the y axis; a horizontal ray is cast from the point towards
//! increasing x and edge crossings are counted by parity.

use crate::boundary::{Boundary, LatLng, MIN_VERTICES};

/// Classify a point against a polygon, `true` when inside
///
/// Polygons with fewer than three vertices enclose nothing. Points lying
/// exactly on an edge or vertex get whatever the crossing parity yields,
/// which is stable for identical inputs.
pub fn classify(point: LatLng, polygon: &[LatLng]) -> bool {
    if polygon.len() < MIN_VERTICES {
        return false;
    }

    let (x, y) = (point.lat, point.lng);
    let mut inside = false;
    let mut j = polygon.len() - 1;

    for i in 0..polygon.len() {
        let (xi, yi) = (polygon[i].lat, polygon[i].lng);
        let (xj, yj) = (polygon[j].lat, polygon[j].lng);

        // The straddle check guarantees yj != yi, so the division is finite
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }

        j = i;
    }

    inside
}

/// Items split by boundary membership, each side in input order
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<T> {
    pub inside: Vec<T>,
    pub outside: Vec<T>,
}

impl<T> Default for Partition<T> {
    fn default() -> Self {
        Self {
            inside: Vec::new(),
            outside: Vec::new(),
        }
    }
}

/// Partition positioned items into inside / outside sets
///
/// An inactive boundary puts every item outside.
pub fn partition<T, I, F>(boundary: &Boundary, items: I, position: F) -> Partition<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> LatLng,
{
    let mut result = Partition::default();
    for item in items {
        if boundary.contains(position(&item)) {
            result.inside.push(item);
        } else {
            result.outside.push(item);
        }
    }
    result
}
