//! Entity Position Generator
//!
//! Produces a synthetic herd around a boundary by rejection sampling inside
//! its bounding box. Inside targets are drawn from the exact box, outside
//! targets from the box grown by a small buffer so they stay near the fence.

use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::boundary::{Boundary, BoundingBox, LatLng};
use crate::entity::{IdentityLabel, TrackedEntity};

/// Which side of the fence a sample must land on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Inside,
    Outside,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Inside => write!(f, "inside"),
            Placement::Outside => write!(f, "outside"),
        }
    }
}

/// Errors that can occur while generating entities
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Invalid generator parameters: {0}")]
    InvalidParameters(String),

    #[error("Could not place {missing} {placement} entities within {attempts} attempts")]
    Unsatisfiable {
        placement: Placement,
        missing: usize,
        attempts: usize,
        /// Entities placed before the cap was hit
        partial: Vec<TrackedEntity>,
    },
}

/// Largest herd a generator will place
pub const MAX_COUNT: usize = 10_000;

/// Generator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Total number of entities to place
    pub count: usize,

    /// Share of `count` placed inside the fence (floored)
    pub inside_fraction: f64,

    /// Expansion of the bounding box used for outside samples
    pub outside_buffer: f64,

    /// Sampling attempts allowed per placement before giving up
    pub max_attempts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: 15,
            inside_fraction: 0.7,
            outside_buffer: 0.001,
            max_attempts: 100_000,
        }
    }
}

impl GeneratorConfig {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), GenerationError> {
        if !self.inside_fraction.is_finite() || !(0.0..=1.0).contains(&self.inside_fraction) {
            return Err(GenerationError::InvalidParameters(format!(
                "inside_fraction must be within [0, 1], got {}",
                self.inside_fraction
            )));
        }
        if !self.outside_buffer.is_finite() || self.outside_buffer < 0.0 {
            return Err(GenerationError::InvalidParameters(format!(
                "outside_buffer must be a non-negative number, got {}",
                self.outside_buffer
            )));
        }
        if self.count > MAX_COUNT {
            return Err(GenerationError::InvalidParameters(format!(
                "count must be at most {}, got {}",
                MAX_COUNT, self.count
            )));
        }
        if self.max_attempts == 0 {
            return Err(GenerationError::InvalidParameters(
                "max_attempts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of entities targeted inside the fence
    pub fn inside_count(&self) -> usize {
        (self.count as f64 * self.inside_fraction).floor() as usize
    }
}

/// Synthetic herd generator
#[derive(Debug, Clone, Default)]
pub struct EntityGenerator {
    config: GeneratorConfig,
}

impl EntityGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate entities around `boundary`
    ///
    /// Inside entities come first, then outside entities, each group in
    /// generation order. An inactive boundary yields an empty herd.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        boundary: &Boundary,
        rng: &mut R,
    ) -> Result<Vec<TrackedEntity>, GenerationError> {
        self.config.validate()?;

        let bbox = match boundary.bounding_box() {
            Some(bbox) if boundary.is_active() => bbox,
            _ => return Ok(Vec::new()),
        };

        let count = self.config.count;
        let inside_count = self.config.inside_count().min(count);
        let outside_count = count - inside_count;

        if inside_count > 0 && boundary.is_collinear() {
            return Err(GenerationError::Unsatisfiable {
                placement: Placement::Inside,
                missing: inside_count,
                attempts: 0,
                partial: Vec::new(),
            });
        }

        let mut labels: Vec<IdentityLabel> = (0..count).map(IdentityLabel).collect();
        labels.shuffle(rng);
        let mut labels = labels.into_iter();

        let mut herd = Vec::with_capacity(count);
        self.place(boundary, bbox, Placement::Inside, inside_count, &mut labels, &mut herd, rng)?;

        let buffered = bbox.expand(self.config.outside_buffer);
        self.place(boundary, buffered, Placement::Outside, outside_count, &mut labels, &mut herd, rng)?;

        Ok(herd)
    }

    #[allow(clippy::too_many_arguments)]
    fn place<R: Rng + ?Sized>(
        &self,
        boundary: &Boundary,
        area: BoundingBox,
        placement: Placement,
        quota: usize,
        labels: &mut impl Iterator<Item = IdentityLabel>,
        herd: &mut Vec<TrackedEntity>,
        rng: &mut R,
    ) -> Result<(), GenerationError> {
        let want_inside = placement == Placement::Inside;
        let mut placed = 0;
        let mut attempts = 0;

        while placed < quota {
            if attempts == self.config.max_attempts {
                return Err(GenerationError::Unsatisfiable {
                    placement,
                    missing: quota - placed,
                    attempts,
                    partial: std::mem::take(herd),
                });
            }
            attempts += 1;

            let candidate = LatLng::new(
                area.min_lat + rng.r#gen::<f64>() * area.lat_span(),
                area.min_lng + rng.r#gen::<f64>() * area.lng_span(),
            );
            if boundary.contains(candidate) != want_inside {
                continue;
            }

            let Some(label) = labels.next() else {
                break;
            };
            let id = format!("animal-{}-{}", placement, placed);
            herd.push(TrackedEntity::new(id, &label, candidate, want_inside));
            placed += 1;
        }

        Ok(())
    }
}

/// Generate a herd with default parameters except `count` and `inside_fraction`
pub fn generate<R: Rng + ?Sized>(
    boundary: &Boundary,
    count: usize,
    inside_fraction: f64,
    rng: &mut R,
) -> Result<Vec<TrackedEntity>, GenerationError> {
    EntityGenerator::new(GeneratorConfig {
        count,
        inside_fraction,
        ..Default::default()
    })
    .generate(boundary, rng)
}
