// src/source.rs

use crate::material::MaterialId;
use crate::target::TargetSet;

/// Lifecycle of a source.
///
/// `Idle` is never stored: a source in the registry is either `Active` or
/// `Inactive`, and a missing entry reads as `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceState {
    Idle,
    Active,
    Inactive,
}

/// Start offsets, in seconds, for the three effect channels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offsets {
    pub vibration: f64,
    pub texture: f64,
    pub stiffness: f64,
}

impl Offsets {
    pub fn new(vibration: f64, texture: f64, stiffness: f64) -> Self {
        Self {
            vibration: finite_or_zero(vibration),
            texture: finite_or_zero(texture),
            stiffness: finite_or_zero(stiffness),
        }
    }
}

#[inline]
fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Clamp an intensity factor to a finite, non-negative value.
#[inline]
pub(crate) fn sanitize_intensity(v: f64) -> f64 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

/// A live playback instance of one material.
///
/// Sources do NOT own their material. They look it up by id every frame,
/// so a replaced material is picked up on the next compute pass.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: MaterialId,
    pub state: SourceState,
    /// Seconds of playback since the last `play`.
    pub elapsed: f64,
    pub offsets: Offsets,
    intensity: f64,
    /// Playback count for non-looping materials; 1 or less plays once.
    pub loops: i32,
    pub targets: TargetSet,
}

impl Source {
    #[inline]
    pub fn new(id: MaterialId) -> Self {
        Self {
            id,
            state: SourceState::Inactive,
            elapsed: 0.0,
            offsets: Offsets::default(),
            intensity: 1.0,
            loops: 1,
            targets: TargetSet::new(),
        }
    }

    /// Restart playback from the beginning. Targets, intensity and loop
    /// count are kept.
    pub fn play(&mut self, offsets: Offsets) {
        self.state = SourceState::Active;
        self.elapsed = 0.0;
        self.offsets = offsets;
    }

    pub fn stop(&mut self) {
        if self.state == SourceState::Active {
            self.state = SourceState::Inactive;
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == SourceState::Active
    }

    #[inline]
    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn set_intensity(&mut self, intensity: f64) {
        self.intensity = sanitize_intensity(intensity);
    }

    /// Current position in effect time. Negative while a negative vibration
    /// offset is still delaying the start.
    #[inline]
    pub fn effect_time(&self) -> f64 {
        self.elapsed + self.offsets.vibration
    }

    /// Number of cycles to play; `None` repeats until stopped.
    pub fn cycles(&self, looping: bool) -> Option<u64> {
        if looping {
            None
        } else {
            Some(self.loops.max(1) as u64)
        }
    }
}
