//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { somatic_init, SomaticEngine } from './somatic.js';
//!
//! await init();
//! somatic_init();
//!
//! const engine = new SomaticEngine();
//! const id = engine.add_material('{"amplitude": [[0, 0], [2, 1]]}');
//! engine.play(id, 0, 0, 0);
//! engine.add_targets(id, new Int32Array([1, 200, 1])); // plus, arm, right
//!
//! // Once per animation frame
//! engine.compute(performance.now() / 1000 - start);
//! const samples = engine.frame_amplitude(200, 1);
//! ```

use log::warn;
use wasm_bindgen::prelude::*;

use crate::body::{Group, Side, Sign};
use crate::compile::MaterialDesc;
use crate::engine::{EngineConfig, HapticEngine};
use crate::material::{INVALID_MATERIAL_ID, MaterialId};
use crate::source::SourceState;
use crate::target::{Endpoint, Target};

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn somatic_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

/// Decode flat `[sign, group, side, ...]` triples, skipping invalid ones.
fn decode_targets(codes: &[i32]) -> Vec<Target> {
    if codes.len() % 3 != 0 {
        warn!("Target array length {} is not a multiple of 3", codes.len());
    }
    codes
        .chunks_exact(3)
        .filter_map(|c| match Target::from_codes(c[0], c[1], c[2]) {
            Ok(target) => Some(target),
            Err(e) => {
                warn!("Skipping target {c:?}: {e}");
                None
            }
        })
        .collect()
}

fn decode_endpoint(group: i32, side: i32) -> Option<Endpoint> {
    Some(Endpoint::new(
        Group::try_from(group).ok()?,
        Side::try_from(side).ok()?,
    ))
}

// ═══════════════════════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════════════════════

/// Haptic engine handle for JavaScript.
#[wasm_bindgen]
pub struct SomaticEngine {
    inner: HapticEngine,
}

impl Default for SomaticEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl SomaticEngine {
    /// Create an initialized engine with the default control rate.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            inner: HapticEngine::new(EngineConfig::default()),
        }
    }

    /// Create an engine with a custom control rate in Hz and per-frame
    /// sample and transient limits.
    pub fn with_config(control_rate: f64, max_frame_samples: u32, max_frame_transients: u32) -> Self {
        Self {
            inner: HapticEngine::new(EngineConfig {
                control_rate,
                max_frame_samples: max_frame_samples as usize,
                max_frame_transients: max_frame_transients as usize,
            }),
        }
    }

    pub fn init(&self) -> bool {
        self.inner.init()
    }

    pub fn quit(&self) {
        self.inner.shutdown();
    }

    // ─── Materials ───────────────────────────────────────────────────────

    /// Returns the new material id, or -1 on failure.
    pub fn add_material(&self, content: &str) -> MaterialId {
        self.inner.add_material(content).unwrap_or(INVALID_MATERIAL_ID)
    }

    /// Returns the new material id, or -1 on failure.
    pub fn add_parametric_material(
        &self,
        amplitude: &[f64],
        pitch: &[f64],
        pitch_min: f64,
        pitch_max: f64,
        transients: &[f64],
        looping: bool,
    ) -> MaterialId {
        MaterialDesc::from_flat(amplitude, pitch, pitch_min, pitch_max, transients, looping)
            .map_err(Into::into)
            .and_then(|desc| self.inner.add_parametric_material(&desc))
            .unwrap_or(INVALID_MATERIAL_ID)
    }

    pub fn replace_material(&self, id: MaterialId, content: &str) -> bool {
        self.inner.replace_material(id, content).is_ok()
    }

    pub fn remove_material(&self, id: MaterialId) -> bool {
        self.inner.remove_material(id)
    }

    // ─── Global intensity ────────────────────────────────────────────────

    pub fn set_global_intensity(&self, intensity: f64) {
        self.inner.set_global_intensity(intensity);
    }

    /// Returns -1 after `quit`.
    pub fn global_intensity(&self) -> f64 {
        self.inner.global_intensity()
    }

    // ─── Event control ───────────────────────────────────────────────────

    pub fn play(&self, id: MaterialId, vibration_offset: f64, texture_offset: f64, stiffness_offset: f64) {
        self.inner
            .play(id, vibration_offset, texture_offset, stiffness_offset);
    }

    pub fn stop(&self, id: MaterialId) {
        self.inner.stop(id);
    }

    pub fn stop_all(&self) {
        self.inner.stop_all();
    }

    /// `targets` holds `[sign, group, side]` triples.
    pub fn add_targets(&self, id: MaterialId, targets: &[i32]) {
        self.inner.add_targets(id, &decode_targets(targets));
    }

    /// `targets` holds `[sign, group, side]` triples.
    pub fn remove_targets(&self, id: MaterialId, targets: &[i32]) {
        self.inner.remove_targets(id, &decode_targets(targets));
    }

    pub fn remove_all_targets(&self, id: MaterialId) {
        self.inner.remove_all_targets(id);
    }

    pub fn update_positions(
        &self,
        id: MaterialId,
        targets: &[i32],
        texture_position: f64,
        stiffness_position: f64,
    ) {
        self.inner.update_positions(
            id,
            &decode_targets(targets),
            texture_position,
            stiffness_position,
        );
    }

    pub fn set_offsets(&self, id: MaterialId, vibration_offset: f64, texture_offset: f64, stiffness_offset: f64) {
        self.inner
            .set_offsets(id, vibration_offset, texture_offset, stiffness_offset);
    }

    pub fn set_intensity(&self, id: MaterialId, intensity: f64) {
        self.inner.set_intensity(id, intensity);
    }

    pub fn set_loop(&self, id: MaterialId, loops: i32) {
        self.inner.set_loop(id, loops);
    }

    pub fn set_target_intensity(&self, id: MaterialId, targets: &[i32], intensity: f64) {
        self.inner
            .set_target_intensity(id, &decode_targets(targets), intensity);
    }

    pub fn clear(&self, id: MaterialId) {
        self.inner.clear(id);
    }

    pub fn clear_inactive(&self) {
        self.inner.clear_inactive();
    }

    pub fn clear_active(&self) {
        self.inner.clear_active();
    }

    pub fn clear_all(&self) {
        self.inner.clear_all();
    }

    // ─── Frames ──────────────────────────────────────────────────────────

    /// Compute the frame ending at `current_time` (seconds since init).
    pub fn compute(&self, current_time: f64) {
        self.inner.compute_all_events(current_time);
    }

    /// Whether an active source targeting one of `groups` carries a transient.
    pub fn has_transient(&self, groups: &[i32]) -> bool {
        let queries: Vec<Target> = groups
            .iter()
            .filter_map(|&code| Group::try_from(code).ok())
            .map(|group| Target::new(Sign::Neutral, group, Side::Global))
            .collect();
        self.inner.has_transient(&queries)
    }

    /// 0 idle, 1 active, 2 inactive.
    pub fn source_state(&self, id: MaterialId) -> u8 {
        match self.inner.source_state(id) {
            SourceState::Idle => 0,
            SourceState::Active => 1,
            SourceState::Inactive => 2,
        }
    }

    pub fn active_count(&self) -> u32 {
        self.inner.active_count() as u32
    }

    /// Amplitude samples of the latest frame for one endpoint (empty if the
    /// endpoint received nothing).
    pub fn frame_amplitude(&self, group: i32, side: i32) -> Vec<f32> {
        let Some(endpoint) = decode_endpoint(group, side) else {
            return Vec::new();
        };
        self.inner
            .with_frame(|f| f.get(&endpoint).map(|t| t.amplitude.clone()))
            .flatten()
            .unwrap_or_default()
    }

    /// Peak amplitude of the latest frame for one endpoint.
    pub fn frame_peak(&self, group: i32, side: i32) -> f32 {
        decode_endpoint(group, side)
            .and_then(|endpoint| self.inner.with_frame(|f| f.peak(&endpoint)))
            .unwrap_or(0.0)
    }

    /// Transient offsets (seconds after frame start) for one endpoint.
    pub fn frame_transients(&self, group: i32, side: i32) -> Vec<f64> {
        let Some(endpoint) = decode_endpoint(group, side) else {
            return Vec::new();
        };
        self.inner
            .with_frame(|f| {
                f.get(&endpoint)
                    .map(|t| t.transients.iter().map(|h| h.offset).collect())
            })
            .flatten()
            .unwrap_or_default()
    }
}
