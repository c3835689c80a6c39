use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::UnitKind;
use crate::unit::ProcessingUnit;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind} unit already registered at {path}")]
    DuplicatePath { kind: UnitKind, path: String },
    #[error("no {kind} unit registered at {path}")]
    NotFound { kind: UnitKind, path: String },
}

/// Every unit created during a run, keyed by folder path.
///
/// Reconstruction and texture units live in separate mappings. A path may
/// appear in at most one of them, and an existing entry is never replaced:
/// it borrows a live engine handle that would otherwise be orphaned.
///
/// Iteration follows insertion order, but pairing always goes through
/// [`UnitRegistry::get`] with an explicit key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRegistry {
    reconstruction: IndexMap<String, ProcessingUnit>,
    texture: IndexMap<String, ProcessingUnit>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, kind: UnitKind) -> &IndexMap<String, ProcessingUnit> {
        match kind {
            UnitKind::Reconstruction => &self.reconstruction,
            UnitKind::Texture => &self.texture,
        }
    }

    fn map_mut(&mut self, kind: UnitKind) -> &mut IndexMap<String, ProcessingUnit> {
        match kind {
            UnitKind::Reconstruction => &mut self.reconstruction,
            UnitKind::Texture => &mut self.texture,
        }
    }

    /// Register a unit under its own kind and path.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicatePath`] if the path is already present
    /// in either mapping; the existing entry is left untouched.
    pub fn insert(&mut self, unit: ProcessingUnit) -> Result<&mut ProcessingUnit, RegistryError> {
        for kind in [UnitKind::Reconstruction, UnitKind::Texture] {
            if self.map(kind).contains_key(&unit.path) {
                return Err(RegistryError::DuplicatePath {
                    kind,
                    path: unit.path,
                });
            }
        }
        let kind = unit.kind;
        let entry = self.map_mut(kind).entry(unit.path.clone());
        Ok(entry.or_insert(unit))
    }

    pub fn get(&self, kind: UnitKind, path: &str) -> Result<&ProcessingUnit, RegistryError> {
        self.map(kind)
            .get(path)
            .ok_or_else(|| RegistryError::NotFound {
                kind,
                path: path.to_string(),
            })
    }

    pub fn get_mut(
        &mut self,
        kind: UnitKind,
        path: &str,
    ) -> Result<&mut ProcessingUnit, RegistryError> {
        self.map_mut(kind)
            .get_mut(path)
            .ok_or_else(|| RegistryError::NotFound {
                kind,
                path: path.to_string(),
            })
    }

    pub fn contains(&self, kind: UnitKind, path: &str) -> bool {
        self.map(kind).contains_key(path)
    }

    /// Lazily iterate `(path, unit)` pairs of one kind in insertion order.
    ///
    /// The iterator borrows the registry, so the set cannot change while it
    /// is alive; calling `iter` again yields the same pairs.
    pub fn iter(&self, kind: UnitKind) -> impl Iterator<Item = (&str, &ProcessingUnit)> + '_ {
        self.map(kind)
            .iter()
            .map(|(path, unit)| (path.as_str(), unit))
    }

    /// Snapshot of the paths of one kind, for loops that mutate units.
    pub fn paths(&self, kind: UnitKind) -> Vec<String> {
        self.map(kind).keys().cloned().collect()
    }

    pub fn len(&self, kind: UnitKind) -> usize {
        self.map(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.reconstruction.is_empty() && self.texture.is_empty()
    }
}
