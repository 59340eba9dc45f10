// src/material.rs
//
// Compiled haptic effects and the store that owns them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::curve::{Curve, Transient};
use crate::engine::EngineError;

/// Identifier of a material, and of the source bound to it.
pub type MaterialId = i32;

/// Sentinel returned across the C boundary when a material cannot be added.
pub const INVALID_MATERIAL_ID: MaterialId = -1;

/// Output range of the pitch curve, in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchRange {
    pub min: f64,
    pub max: f64,
}

impl PitchRange {
    /// Map a normalized pitch value into the range.
    #[inline]
    pub fn map(&self, normalized: f64) -> f64 {
        self.min + normalized.clamp(0.0, 1.0) * (self.max - self.min)
    }
}

impl Default for PitchRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// A compiled haptic effect.
///
/// Built by [`crate::compile`]; immutable afterwards. Replacing a material
/// swaps the whole value in the store.
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub(crate) amplitude: Curve,
    pub(crate) pitch: Curve,
    pub(crate) pitch_range: PitchRange,
    /// Sorted by time.
    pub(crate) transients: Vec<Transient>,
    pub(crate) looping: bool,
    /// Spatial curves, keyed by position rather than time.
    pub(crate) texture: Curve,
    pub(crate) stiffness: Curve,
}

impl Material {
    pub fn amplitude(&self) -> &Curve {
        &self.amplitude
    }

    pub fn pitch(&self) -> &Curve {
        &self.pitch
    }

    pub fn pitch_range(&self) -> PitchRange {
        self.pitch_range
    }

    pub fn transients(&self) -> &[Transient] {
        &self.transients
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn has_transients(&self) -> bool {
        !self.transients.is_empty()
    }

    /// Length of one playback cycle: the latest time any temporal part uses.
    pub fn duration(&self) -> f64 {
        let transient_end = self.transients.last().map_or(0.0, |t| t.time);
        self.amplitude
            .duration()
            .max(self.pitch.duration())
            .max(transient_end)
    }

    /// Normalized amplitude at effect time `t` (already reduced into a cycle).
    #[inline]
    pub fn amplitude_at(&self, t: f64) -> f64 {
        self.amplitude.value_at(t)
    }

    /// Pitch in Hz at effect time `t`.
    #[inline]
    pub fn pitch_at(&self, t: f64) -> f64 {
        self.pitch_range.map(self.pitch.value_at(t))
    }

    /// Texture value at a spatial position. Textures repeat over their span.
    pub fn texture_at(&self, position: f64) -> f64 {
        self.texture
            .sample(position, true, self.texture.duration())
    }

    /// Stiffness value at a spatial position, held flat past the ends.
    pub fn stiffness_at(&self, position: f64) -> f64 {
        self.stiffness.value_at(position)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Material store
// ═══════════════════════════════════════════════════════════════════

/// Owns every compiled material, keyed by id.
///
/// Ids are allocated monotonically and never handed out twice, so a stale
/// source can never bind to unrelated new content.
#[derive(Debug, Default)]
pub struct MaterialStore {
    materials: HashMap<MaterialId, Arc<Material>>,
    next_id: MaterialId,
}

impl MaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a material under a fresh id.
    pub fn add(&mut self, material: Material) -> Result<MaterialId, EngineError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(EngineError::IdsExhausted)?;
        self.materials.insert(id, Arc::new(material));
        Ok(id)
    }

    /// Store a material under a caller-chosen id.
    pub fn insert(&mut self, id: MaterialId, material: Material) -> Result<(), EngineError> {
        if id < 0 {
            return Err(EngineError::InvalidMaterialId(id));
        }
        if self.materials.contains_key(&id) {
            return Err(EngineError::MaterialIdInUse(id));
        }
        if id >= self.next_id {
            self.next_id = id.checked_add(1).ok_or(EngineError::IdsExhausted)?;
        }
        self.materials.insert(id, Arc::new(material));
        Ok(())
    }

    /// Overwrite an existing material, keeping its id.
    pub fn replace(&mut self, id: MaterialId, material: Material) -> Result<(), EngineError> {
        match self.materials.get_mut(&id) {
            Some(slot) => {
                *slot = Arc::new(material);
                Ok(())
            }
            None => Err(EngineError::UnknownMaterial(id)),
        }
    }

    pub fn remove(&mut self, id: MaterialId) -> Option<Arc<Material>> {
        self.materials.remove(&id)
    }

    pub fn get(&self, id: MaterialId) -> Option<&Arc<Material>> {
        self.materials.get(&id)
    }

    pub fn contains(&self, id: MaterialId) -> bool {
        self.materials.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }
}
