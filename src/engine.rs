// src/engine.rs
//
// The engine context: every registry the host talks to, behind one lock.

use log::{debug, info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::compile::{CompileError, JsonMaterialCompiler, MaterialCompiler, MaterialDesc};
use crate::frame::Frame;
use crate::material::{Material, MaterialId, MaterialStore};
use crate::scheduler::Scheduler;
use crate::source::{Offsets, SourceState, sanitize_intensity};
use crate::source_registry::SourceRegistry;
use crate::target::{BodyMap, IdentityBodyMap, Target};

/// Default control rate for amplitude and pitch samples, in Hz.
pub const DEFAULT_CONTROL_RATE: f64 = 1000.0;

/// Default cap on control samples in one frame (4 s at the default rate).
pub const DEFAULT_MAX_FRAME_SAMPLES: usize = 4096;

/// Default cap on transients one source reports in one frame.
pub const DEFAULT_MAX_FRAME_TRANSIENTS: usize = 256;

/// Global intensity reported by an engine that is not initialized.
pub const UNINITIALIZED_INTENSITY: f64 = -1.0;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("unknown material {0}")]
    UnknownMaterial(MaterialId),

    #[error("material id {0} is already in use")]
    MaterialIdInUse(MaterialId),

    #[error("material id {0} is not a valid id")]
    InvalidMaterialId(MaterialId),

    #[error("no material ids left")]
    IdsExhausted,

    #[error("engine is not initialized")]
    NotInitialized,
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Amplitude/pitch samples per second of engine time.
    pub control_rate: f64,

    /// Upper bound on samples per frame. A longer frame is sampled more
    /// coarsely so catching up after a long gap stays cheap.
    pub max_frame_samples: usize,

    /// Upper bound on transients one source reports per frame. When a gap
    /// holds more, the most recent ones are kept.
    pub max_frame_transients: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            control_rate: DEFAULT_CONTROL_RATE,
            max_frame_samples: DEFAULT_MAX_FRAME_SAMPLES,
            max_frame_transients: DEFAULT_MAX_FRAME_TRANSIENTS,
        }
    }
}

impl EngineConfig {
    /// Replace out-of-range fields with their defaults.
    fn validated(mut self) -> Self {
        if !(self.control_rate.is_finite() && self.control_rate > 0.0) {
            warn!(
                "Invalid control rate {}, using {} Hz",
                self.control_rate, DEFAULT_CONTROL_RATE
            );
            self.control_rate = DEFAULT_CONTROL_RATE;
        }
        if self.max_frame_samples == 0 {
            warn!("max_frame_samples must be positive, using {DEFAULT_MAX_FRAME_SAMPLES}");
            self.max_frame_samples = DEFAULT_MAX_FRAME_SAMPLES;
        }
        if self.max_frame_transients == 0 {
            warn!("max_frame_transients must be positive, using {DEFAULT_MAX_FRAME_TRANSIENTS}");
            self.max_frame_transients = DEFAULT_MAX_FRAME_TRANSIENTS;
        }
        self
    }
}

/// Everything that lives between `init` and `shutdown`.
struct EngineState {
    materials: MaterialStore,
    sources: SourceRegistry,
    scheduler: Scheduler,
    global_intensity: f64,
    frame: Frame,
}

impl EngineState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            materials: MaterialStore::new(),
            sources: SourceRegistry::new(),
            scheduler: Scheduler::new(config),
            global_intensity: 1.0,
            frame: Frame::default(),
        }
    }
}

/// Haptic rendering engine.
///
/// Thread-safe: mutations may come from a gameplay thread while another
/// thread drives `compute_all_events`. One mutex covers all state and is
/// held for each whole call, so a frame never observes a half-applied
/// mutation. Content compilation happens before the lock is taken.
pub struct HapticEngine {
    config: EngineConfig,
    body_map: Box<dyn BodyMap>,
    compiler: Box<dyn MaterialCompiler>,
    state: Mutex<Option<EngineState>>,
}

impl Default for HapticEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl HapticEngine {
    /// Create an initialized engine with the identity body map and the JSON
    /// material compiler.
    pub fn new(config: EngineConfig) -> Self {
        let config = config.validated();
        Self {
            state: Mutex::new(Some(EngineState::new(&config))),
            config,
            body_map: Box::new(IdentityBodyMap),
            compiler: Box::new(JsonMaterialCompiler),
        }
    }

    /// Replace the body map collaborator.
    pub fn with_body_map(mut self, body_map: impl BodyMap + 'static) -> Self {
        self.body_map = Box::new(body_map);
        self
    }

    /// Replace the content compiler collaborator.
    pub fn with_compiler(mut self, compiler: impl MaterialCompiler + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> Option<R> {
        self.state.lock().as_mut().map(f)
    }

    // ═══════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════

    /// (Re)initialize the engine, discarding any previous state.
    ///
    /// Always reports success.
    pub fn init(&self) -> bool {
        *self.state.lock() = Some(EngineState::new(&self.config));
        info!(
            "Haptic engine initialized ({} Hz control rate)",
            self.config.control_rate
        );
        true
    }

    /// Release every material and source. Until the next `init`, queries
    /// return sentinels and mutations are ignored.
    pub fn shutdown(&self) {
        if self.state.lock().take().is_some() {
            info!("Haptic engine shut down");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().is_some()
    }

    // ═══════════════════════════════════════════════════════════════
    // Materials
    // ═══════════════════════════════════════════════════════════════

    /// Compile `content` and store it under a fresh id.
    pub fn add_material(&self, content: &str) -> EngineResult<MaterialId> {
        let material = self.compile_content(content)?;
        self.store_material(material)
    }

    /// Compile an explicit description and store it under a fresh id.
    pub fn add_parametric_material(&self, desc: &MaterialDesc) -> EngineResult<MaterialId> {
        let material = compile_desc(desc)?;
        self.store_material(material)
    }

    /// Compile `content` and store it under a caller-chosen id.
    pub fn add_material_with_id(&self, id: MaterialId, content: &str) -> EngineResult<()> {
        let material = self.compile_content(content)?;
        self.with_state(|s| s.materials.insert(id, material))
            .ok_or(EngineError::NotInitialized)??;
        debug!("Added material {id}");
        Ok(())
    }

    /// Swap the content of an existing material. Bound sources pick it up
    /// on their next frame.
    pub fn replace_material(&self, id: MaterialId, content: &str) -> EngineResult<()> {
        let material = self.compile_content(content)?;
        self.swap_material(id, material)
    }

    pub fn replace_parametric_material(&self, id: MaterialId, desc: &MaterialDesc) -> EngineResult<()> {
        let material = compile_desc(desc)?;
        self.swap_material(id, material)
    }

    /// Delete a material. Sources bound to it stay alive but go silent.
    pub fn remove_material(&self, id: MaterialId) -> bool {
        let removed = self
            .with_state(|s| s.materials.remove(id).is_some())
            .unwrap_or(false);
        if removed {
            debug!("Removed material {id}");
        } else {
            debug!("remove_material: unknown material {id}");
        }
        removed
    }

    pub fn has_material(&self, id: MaterialId) -> bool {
        self.with_state(|s| s.materials.contains(id)).unwrap_or(false)
    }

    pub fn material_count(&self) -> usize {
        self.with_state(|s| s.materials.len()).unwrap_or(0)
    }

    fn compile_content(&self, content: &str) -> EngineResult<Material> {
        self.compiler.compile(content).map_err(|e| {
            warn!("Material compilation failed: {e}");
            EngineError::from(e)
        })
    }

    fn store_material(&self, material: Material) -> EngineResult<MaterialId> {
        let id = self
            .with_state(|s| s.materials.add(material))
            .ok_or(EngineError::NotInitialized)??;
        debug!("Added material {id}");
        Ok(id)
    }

    fn swap_material(&self, id: MaterialId, material: Material) -> EngineResult<()> {
        self.with_state(|s| s.materials.replace(id, material))
            .ok_or(EngineError::NotInitialized)??;
        debug!("Replaced material {id}");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    // Global mixer
    // ═══════════════════════════════════════════════════════════════

    /// Set the multiplier applied to every source. Negative values clamp to 0.
    pub fn set_global_intensity(&self, intensity: f64) {
        self.with_state(|s| s.global_intensity = sanitize_intensity(intensity));
    }

    /// Current global multiplier, or [`UNINITIALIZED_INTENSITY`] after shutdown.
    pub fn global_intensity(&self) -> f64 {
        self.with_state(|s| s.global_intensity)
            .unwrap_or(UNINITIALIZED_INTENSITY)
    }

    // ═══════════════════════════════════════════════════════════════
    // Event control
    // ═══════════════════════════════════════════════════════════════

    /// Start (or restart) the source for material `id`.
    ///
    /// The source is created on first play. A source bound to a material
    /// that does not exist (yet) plays silently.
    pub fn play(&self, id: MaterialId, vibration_offset: f64, texture_offset: f64, stiffness_offset: f64) {
        let offsets = Offsets::new(vibration_offset, texture_offset, stiffness_offset);
        self.with_state(|s| {
            if !s.materials.contains(id) {
                debug!("play: material {id} is not loaded");
            }
            s.sources.play(id, offsets);
        });
    }

    pub fn stop(&self, id: MaterialId) {
        self.with_state(|s| s.sources.stop(id));
    }

    pub fn stop_all(&self) {
        self.with_state(|s| s.sources.stop_all());
    }

    pub fn add_targets(&self, id: MaterialId, targets: &[Target]) {
        self.with_state(|s| s.sources.add_targets(id, targets));
    }

    /// Remove targets that exactly equal one of `targets`.
    pub fn remove_targets(&self, id: MaterialId, targets: &[Target]) {
        self.with_state(|s| s.sources.remove_targets(id, targets));
    }

    pub fn remove_all_targets(&self, id: MaterialId) {
        self.with_state(|s| s.sources.remove_all_targets(id));
    }

    /// Set texture and stiffness positions on the listed targets.
    pub fn update_positions(
        &self,
        id: MaterialId,
        targets: &[Target],
        texture_position: f64,
        stiffness_position: f64,
    ) {
        self.with_state(|s| {
            s.sources
                .update_positions(id, targets, texture_position, stiffness_position)
        });
    }

    pub fn set_offsets(&self, id: MaterialId, vibration_offset: f64, texture_offset: f64, stiffness_offset: f64) {
        let offsets = Offsets::new(vibration_offset, texture_offset, stiffness_offset);
        self.with_state(|s| s.sources.set_offsets(id, offsets));
    }

    pub fn set_intensity(&self, id: MaterialId, intensity: f64) {
        self.with_state(|s| s.sources.set_intensity(id, intensity));
    }

    pub fn set_loop(&self, id: MaterialId, loops: i32) {
        self.with_state(|s| s.sources.set_loop(id, loops));
    }

    pub fn set_target_intensity(&self, id: MaterialId, targets: &[Target], intensity: f64) {
        self.with_state(|s| s.sources.set_target_intensity(id, targets, intensity));
    }

    pub fn clear(&self, id: MaterialId) {
        self.with_state(|s| s.sources.clear(id));
    }

    pub fn clear_inactive(&self) {
        self.with_state(|s| s.sources.clear_inactive());
    }

    pub fn clear_active(&self) {
        self.with_state(|s| s.sources.clear_active());
    }

    pub fn clear_all(&self) {
        self.with_state(|s| s.sources.clear_all());
    }

    // ═══════════════════════════════════════════════════════════════
    // Frames
    // ═══════════════════════════════════════════════════════════════

    /// Compute the frame ending at `current_time` (seconds since init).
    ///
    /// Everything that happened since the previous call is synthesized.
    /// The frame is kept as the latest frame until the next call.
    pub fn compute_all_events(&self, current_time: f64) {
        let body_map = self.body_map.as_ref();
        self.with_state(|s| {
            s.scheduler.compute(
                current_time,
                &mut s.frame,
                &mut s.sources,
                &s.materials,
                body_map,
                s.global_intensity,
            );
        });
    }

    /// Copy of the latest frame (empty when not initialized).
    pub fn latest_frame(&self) -> Frame {
        self.with_frame(Frame::clone).unwrap_or_default()
    }

    /// Borrow the latest frame under the engine lock.
    pub fn with_frame<R>(&self, f: impl FnOnce(&Frame) -> R) -> Option<R> {
        self.with_state(|s| f(&s.frame))
    }

    /// Whether any active source targeting one of `targets` has transients.
    ///
    /// Matching is hierarchy-aware: a coarse query group finds sources
    /// targeting any of its descendants. A source whose `Minus` targets
    /// exclude the queried body part does not count.
    pub fn has_transient(&self, targets: &[Target]) -> bool {
        self.with_state(|s| {
            s.sources.active_sources().any(|source| {
                s.materials
                    .get(source.id)
                    .is_some_and(|m| m.has_transients())
                    && targets.iter().any(|q| source.targets.drives(q))
            })
        })
        .unwrap_or(false)
    }

    pub fn source_state(&self, id: MaterialId) -> SourceState {
        self.with_state(|s| s.sources.state(id))
            .unwrap_or(SourceState::Idle)
    }

    pub fn active_count(&self) -> usize {
        self.with_state(|s| s.sources.active_count()).unwrap_or(0)
    }

    pub fn source_count(&self) -> usize {
        self.with_state(|s| s.sources.len()).unwrap_or(0)
    }

    /// Engine time of the latest computed frame.
    pub fn current_time(&self) -> f64 {
        self.with_state(|s| s.scheduler.clock().last_time())
            .unwrap_or(0.0)
    }
}

fn compile_desc(desc: &MaterialDesc) -> EngineResult<Material> {
    desc.compile().map_err(|e| {
        warn!("Material compilation failed: {e}");
        EngineError::from(e)
    })
}
