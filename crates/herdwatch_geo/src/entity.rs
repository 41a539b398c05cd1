//! Tracked Entities
//!
//! Display records for simulated livestock positioned around a fence.

use serde::Serialize;

use crate::boundary::LatLng;

/// A simulated animal with a classified position
///
/// Entities are only produced by the generator; `is_inside` always reflects
/// the classification of `position` at generation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedEntity {
    id: String,
    name: String,
    device: String,
    position: LatLng,
    is_inside: bool,
}

impl TrackedEntity {
    pub(crate) fn new(id: String, label: &IdentityLabel, position: LatLng, is_inside: bool) -> Self {
        Self {
            id,
            name: label.name(),
            device: label.device(),
            position,
            is_inside,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn position(&self) -> LatLng {
        self.position
    }

    pub fn is_inside(&self) -> bool {
        self.is_inside
    }
}

/// An identity drawn from the shuffled label pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityLabel(pub usize);

impl IdentityLabel {
    /// Animal label, e.g. `ID_7`
    pub fn name(&self) -> String {
        format!("ID_{}", self.0)
    }

    /// Collar tag paired with the label, e.g. `Collar 7`
    pub fn device(&self) -> String {
        format!("Collar {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_formats() {
        let label = IdentityLabel(7);
        assert_eq!(label.name(), "ID_7");
        assert_eq!(label.device(), "Collar 7");
    }

    #[test]
    fn test_entity_serialize() {
        let entity = TrackedEntity::new(
            "animal-inside-0".to_string(),
            &IdentityLabel(3),
            LatLng::new(12.97, 77.59),
            true,
        );
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["name"], "ID_3");
        assert_eq!(json["device"], "Collar 3");
        assert_eq!(json["position"], serde_json::json!([12.97, 77.59]));
        assert_eq!(json["is_inside"], true);
    }
}
