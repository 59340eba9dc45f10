// src/source_registry.rs

use std::collections::HashMap;

use log::debug;

use crate::material::MaterialId;
use crate::source::{Offsets, Source, SourceState, sanitize_intensity};
use crate::target::Target;

/// Owns every source, keyed by material id.
///
/// Responsibilities:
/// - create sources on first play and retain them after stop
/// - apply per-source mutations from the host
/// - free sources on explicit clear
///
/// Does NOT:
/// - evaluate curves (the scheduler does)
/// - fail on unknown ids; mutations of a missing source are no-ops
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: HashMap<MaterialId, Source>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on an existing source. Returns false if there is none.
    fn with_source(&mut self, id: MaterialId, op: &str, f: impl FnOnce(&mut Source)) -> bool {
        match self.sources.get_mut(&id) {
            Some(source) => {
                f(source);
                true
            }
            None => {
                debug!("{op}: no source for material {id}");
                false
            }
        }
    }

    /// Start (or restart) the source for `id`, creating it if needed.
    pub fn play(&mut self, id: MaterialId, offsets: Offsets) {
        self.sources
            .entry(id)
            .or_insert_with(|| Source::new(id))
            .play(offsets);
    }

    pub fn stop(&mut self, id: MaterialId) -> bool {
        self.with_source(id, "stop", Source::stop)
    }

    /// Stop every active source. Returns how many were stopped.
    pub fn stop_all(&mut self) -> usize {
        let mut stopped = 0;
        for source in self.sources.values_mut().filter(|s| s.is_active()) {
            source.stop();
            stopped += 1;
        }
        stopped
    }

    /// Free one source regardless of its state.
    pub fn clear(&mut self, id: MaterialId) -> bool {
        self.sources.remove(&id).is_some()
    }

    /// Free every inactive source. Returns how many were freed.
    pub fn clear_inactive(&mut self) -> usize {
        self.clear_where(|s| s.state == SourceState::Inactive)
    }

    /// Free every active source. Returns how many were freed.
    pub fn clear_active(&mut self) -> usize {
        self.clear_where(Source::is_active)
    }

    pub fn clear_all(&mut self) {
        self.sources.clear();
    }

    fn clear_where(&mut self, pred: impl Fn(&Source) -> bool) -> usize {
        let before = self.sources.len();
        self.sources.retain(|_, s| !pred(s));
        before - self.sources.len()
    }

    // ═══════════════════════════════════════════════════════════════
    // In-place mutation
    // ═══════════════════════════════════════════════════════════════

    pub fn add_targets(&mut self, id: MaterialId, targets: &[Target]) -> bool {
        self.with_source(id, "add_targets", |s| {
            s.targets.union(targets);
        })
    }

    pub fn remove_targets(&mut self, id: MaterialId, targets: &[Target]) -> bool {
        self.with_source(id, "remove_targets", |s| {
            s.targets.difference(targets);
        })
    }

    pub fn remove_all_targets(&mut self, id: MaterialId) -> bool {
        self.with_source(id, "remove_all_targets", |s| s.targets.clear())
    }

    /// Set spatial positions on the listed targets (exact matches only).
    pub fn update_positions(
        &mut self,
        id: MaterialId,
        targets: &[Target],
        texture_position: f64,
        stiffness_position: f64,
    ) -> bool {
        self.with_source(id, "update_positions", |s| {
            for target in targets {
                if let Some(entry) = s.targets.get_mut(target) {
                    entry.texture_position = texture_position;
                    entry.stiffness_position = stiffness_position;
                }
            }
        })
    }

    pub fn set_offsets(&mut self, id: MaterialId, offsets: Offsets) -> bool {
        self.with_source(id, "set_offsets", |s| s.offsets = offsets)
    }

    pub fn set_intensity(&mut self, id: MaterialId, intensity: f64) -> bool {
        self.with_source(id, "set_intensity", |s| s.set_intensity(intensity))
    }

    pub fn set_loop(&mut self, id: MaterialId, loops: i32) -> bool {
        self.with_source(id, "set_loop", |s| s.loops = loops)
    }

    /// Set the override intensity of the listed targets (exact matches only).
    pub fn set_target_intensity(&mut self, id: MaterialId, targets: &[Target], intensity: f64) -> bool {
        let intensity = sanitize_intensity(intensity);
        self.with_source(id, "set_target_intensity", |s| {
            for target in targets {
                if let Some(entry) = s.targets.get_mut(target) {
                    entry.intensity = intensity;
                }
            }
        })
    }

    // ═══════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════

    pub fn state(&self, id: MaterialId) -> SourceState {
        self.sources.get(&id).map_or(SourceState::Idle, |s| s.state)
    }

    pub fn get(&self, id: MaterialId) -> Option<&Source> {
        self.sources.get(&id)
    }

    /// Iterate over active sources.
    pub fn active_sources(&self) -> impl Iterator<Item = &Source> + '_ {
        self.sources.values().filter(|s| s.is_active())
    }

    pub(crate) fn active_sources_mut(&mut self) -> impl Iterator<Item = &mut Source> + '_ {
        self.sources.values_mut().filter(|s| s.is_active())
    }

    /// Number of currently active sources.
    pub fn active_count(&self) -> usize {
        self.active_sources().count()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Group, Side};

    #[test]
    fn test_lifecycle() {
        let mut registry = SourceRegistry::new();
        assert_eq!(registry.state(1), SourceState::Idle);

        registry.play(1, Offsets::default());
        assert_eq!(registry.state(1), SourceState::Active);

        assert!(registry.stop(1));
        assert_eq!(registry.state(1), SourceState::Inactive);

        registry.play(1, Offsets::default());
        assert_eq!(registry.state(1), SourceState::Active);

        assert!(registry.clear(1));
        assert_eq!(registry.state(1), SourceState::Idle);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut registry = SourceRegistry::new();
        assert!(!registry.stop(9));
        assert!(registry.is_empty());

        registry.play(2, Offsets::default());
        registry.stop(2);
        registry.stop(2);
        assert_eq!(registry.state(2), SourceState::Inactive);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear_by_state() {
        let mut registry = SourceRegistry::new();
        for id in 0..4 {
            registry.play(id, Offsets::default());
        }
        registry.stop(0);
        registry.stop(1);

        assert_eq!(registry.clear_inactive(), 2);
        assert_eq!(registry.active_count(), 2);
        assert_eq!(registry.clear_active(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stop_all() {
        let mut registry = SourceRegistry::new();
        registry.play(0, Offsets::default());
        registry.play(1, Offsets::default());
        registry.stop(1);
        assert_eq!(registry.stop_all(), 1);
        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_mutating_unknown_source_is_noop() {
        let mut registry = SourceRegistry::new();
        let arm = Target::plus(Group::Arm, Side::Right);
        assert!(!registry.add_targets(5, &[arm]));
        assert!(!registry.set_intensity(5, 0.5));
        assert!(!registry.set_loop(5, 3));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_target_intensity_is_exact() {
        let mut registry = SourceRegistry::new();
        let hand = Target::plus(Group::Hand, Side::Left);
        registry.play(0, Offsets::default());
        registry.add_targets(0, &[hand]);

        // Ancestor does not address the stored target
        registry.set_target_intensity(0, &[Target::plus(Group::Arm, Side::Left)], 0.2);
        registry.set_target_intensity(0, &[hand], -1.0);
        registry.update_positions(0, &[hand], 0.3, 0.7);

        let entry = registry.get(0).unwrap().targets.get(&hand).copied().unwrap();
        assert_eq!(entry.intensity, 0.0);
        assert_eq!(entry.texture_position, 0.3);
        assert_eq!(entry.stiffness_position, 0.7);
    }

    #[test]
    fn test_mutation_applies_to_inactive_sources() {
        let mut registry = SourceRegistry::new();
        registry.play(0, Offsets::default());
        registry.stop(0);
        assert!(registry.set_offsets(0, Offsets::new(1.0, 2.0, 3.0)));
        assert_eq!(registry.get(0).unwrap().offsets.stiffness, 3.0);
    }
}
