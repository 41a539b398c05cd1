//! Fence Editor
//!
//! Single-writer operator workflow. Points are appended while the fence is
//! unlocked; saving persists and locks it; resetting clears everything,
//! including the persisted copy.

use herdwatch_geo::{Boundary, EntityGenerator, GenerationError, LatLng, Partition, TrackedEntity};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use super::GeofenceConfig;
use super::store::{FenceStore, StoreError};

/// Errors raised by fence editing
#[derive(Debug, thiserror::Error)]
pub enum FenceError {
    #[error("Fence is saved; reset it before editing")]
    Locked,

    #[error("Cannot save an empty fence")]
    Empty,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Operator-owned boundary plus its simulated herd
pub struct FenceEditor {
    boundary: Boundary,
    locked: bool,
    entities: Vec<TrackedEntity>,
    generator: EntityGenerator,
    store: FenceStore,
    key: String,
    rng: StdRng,
}

impl FenceEditor {
    pub fn new(config: &GeofenceConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create an editor with a fixed random source
    pub fn with_rng(config: &GeofenceConfig, rng: StdRng) -> Self {
        Self {
            boundary: Boundary::new(),
            locked: false,
            entities: Vec::new(),
            generator: EntityGenerator::new(config.generator.clone()),
            store: FenceStore::new(&config.store_path),
            key: config.fence_key.clone(),
            rng,
        }
    }

    /// Load the saved fence, if any, and lock it
    ///
    /// Returns whether a saved fence was found.
    pub async fn restore(&mut self) -> Result<bool, FenceError> {
        let Some(boundary) = self.store.load(&self.key).await? else {
            return Ok(false);
        };

        info!(points = boundary.len(), "Restored saved fence");
        self.boundary = boundary;
        self.locked = true;
        self.regenerate();
        Ok(true)
    }

    /// Append a vertex to an unlocked fence
    pub fn add_point(&mut self, point: LatLng) -> Result<(), FenceError> {
        if self.locked {
            return Err(FenceError::Locked);
        }

        self.boundary.push(point);
        self.regenerate();
        Ok(())
    }

    /// Persist the fence and lock it against further edits
    pub async fn save(&mut self) -> Result<(), FenceError> {
        if self.locked {
            return Err(FenceError::Locked);
        }
        if self.boundary.is_empty() {
            return Err(FenceError::Empty);
        }

        self.store.save(&self.key, &self.boundary).await?;
        self.locked = true;
        info!(points = self.boundary.len(), "Fence saved");
        Ok(())
    }

    /// Clear the fence, its herd, and the persisted copy
    pub async fn reset(&mut self) -> Result<(), FenceError> {
        self.store.remove(&self.key).await?;
        self.boundary.clear();
        self.entities.clear();
        self.locked = false;
        info!("Fence reset");
        Ok(())
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn entities(&self) -> &[TrackedEntity] {
        &self.entities
    }

    /// Herd split by fence membership
    pub fn partition(&self) -> Partition<&TrackedEntity> {
        herdwatch_geo::partition(&self.boundary, &self.entities, |e| e.position())
    }

    /// Classify an arbitrary point against the current fence
    pub fn classify(&self, point: LatLng) -> bool {
        self.boundary.contains(point)
    }

    fn regenerate(&mut self) {
        self.entities = match self.generator.generate(&self.boundary, &mut self.rng) {
            Ok(entities) => entities,
            Err(GenerationError::Unsatisfiable { placement, missing, attempts, .. }) => {
                warn!(%placement, missing, attempts, "Could not place simulated herd for fence");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Could not generate simulated herd");
                Vec::new()
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn config(dir: &TempDir) -> GeofenceConfig {
        GeofenceConfig {
            store_path: dir.path().join("state.json"),
            ..Default::default()
        }
    }

    fn editor(dir: &TempDir) -> FenceEditor {
        FenceEditor::with_rng(&config(dir), StdRng::seed_from_u64(42))
    }

    fn draw(editor: &mut FenceEditor) {
        for (lat, lng) in [(12.9716, 77.5946), (12.975, 77.6), (12.97, 77.605), (12.966, 77.599)] {
            editor.add_point(LatLng::new(lat, lng)).unwrap();
        }
    }

    #[test]
    fn test_herd_appears_with_third_point() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);

        editor.add_point(LatLng::new(0.0, 0.0)).unwrap();
        editor.add_point(LatLng::new(0.0, 10.0)).unwrap();
        assert!(editor.entities().is_empty());

        editor.add_point(LatLng::new(10.0, 10.0)).unwrap();
        assert_eq!(editor.entities().len(), 15);

        let split = editor.partition();
        assert_eq!(split.inside.len(), 10);
        assert_eq!(split.outside.len(), 5);
    }

    #[tokio::test]
    async fn test_save_locks_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        draw(&mut editor);

        editor.save().await.unwrap();
        assert!(editor.is_locked());
        assert!(matches!(
            editor.add_point(LatLng::new(1.0, 1.0)),
            Err(FenceError::Locked)
        ));
        assert!(matches!(editor.save().await, Err(FenceError::Locked)));
        assert_eq!(editor.boundary().len(), 4);

        let mut restored = FenceEditor::with_rng(&config(&dir), StdRng::seed_from_u64(1));
        assert!(restored.restore().await.unwrap());
        assert!(restored.is_locked());
        assert_eq!(restored.boundary(), editor.boundary());
        assert_eq!(restored.entities().len(), 15);
    }

    #[tokio::test]
    async fn test_save_empty_rejected() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        assert!(matches!(editor.save().await, Err(FenceError::Empty)));
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        draw(&mut editor);
        editor.save().await.unwrap();

        editor.reset().await.unwrap();
        assert!(!editor.is_locked());
        assert!(editor.boundary().is_empty());
        assert!(editor.entities().is_empty());

        let mut fresh = FenceEditor::with_rng(&config(&dir), StdRng::seed_from_u64(1));
        assert!(!fresh.restore().await.unwrap());

        // Unlocked again
        editor.add_point(LatLng::new(1.0, 1.0)).unwrap();
    }

    #[test]
    fn test_collinear_fence_has_no_herd() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        for i in 0..4 {
            editor.add_point(LatLng::new(i as f64, i as f64)).unwrap();
        }
        assert!(editor.entities().is_empty());
    }

    #[test]
    fn test_classify_point() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor(&dir);
        assert!(!editor.classify(LatLng::new(5.0, 5.0)));

        for (lat, lng) in [(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)] {
            editor.add_point(LatLng::new(lat, lng)).unwrap();
        }
        assert!(editor.classify(LatLng::new(5.0, 5.0)));
        assert!(!editor.classify(LatLng::new(15.0, 15.0)));
    }
}
