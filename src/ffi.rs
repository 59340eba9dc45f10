// C-compatible FFI bindings for native hosts (Swift, C#, C++).
//
// Safety requirements:
// - Engine pointers must be non-null unless documented otherwise
// - All handles must be created by this module and not fabricated
// - String parameters must be valid null-terminated UTF-8
// - Array parameters must hold at least the stated number of elements
// - Caller must call `somatic_destroy` for each `somatic_create`
//
// Every function tolerates a null engine and returns the documented
// sentinel instead of failing.

use std::ffi::{CStr, c_char};

use log::warn;

use crate::body::{Group, InvalidCode, Side, Sign};
use crate::compile::MaterialDesc;
use crate::engine::{
    DEFAULT_CONTROL_RATE, DEFAULT_MAX_FRAME_SAMPLES, DEFAULT_MAX_FRAME_TRANSIENTS, EngineConfig,
    EngineResult, HapticEngine, UNINITIALIZED_INTENSITY,
};
use crate::material::{INVALID_MATERIAL_ID, MaterialId};
use crate::source::SourceState;
use crate::target::{Endpoint, Target};

#[cfg(feature = "ios")]
use log::LevelFilter;
#[cfg(feature = "ios")]
use oslog::OsLogger;

// Logger subsystem identifier
#[cfg(feature = "ios")]
const LOG_SUBSYSTEM: &str = "com.somatic.engine";

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// Call once at application startup. Output appears in Console.app and
/// Xcode's debug console.
#[cfg(feature = "ios")]
#[unsafe(no_mangle)]
pub extern "C" fn somatic_init_logger() {
    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle & FFI Types
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to a haptic engine.
pub struct SomaticEngine {
    inner: HapticEngine,
}

/// Engine configuration.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SomaticConfig {
    /// Amplitude/pitch samples per second (e.g., 1000.0).
    pub control_rate: f64,
    /// Most samples in one frame; longer frames are sampled coarsely.
    pub max_frame_samples: u32,
    /// Most transients one source reports in one frame.
    pub max_frame_transients: u32,
}

impl Default for SomaticConfig {
    fn default() -> Self {
        Self {
            control_rate: DEFAULT_CONTROL_RATE,
            max_frame_samples: DEFAULT_MAX_FRAME_SAMPLES as u32,
            max_frame_transients: DEFAULT_MAX_FRAME_TRANSIENTS as u32,
        }
    }
}

impl From<SomaticConfig> for EngineConfig {
    fn from(c: SomaticConfig) -> Self {
        Self {
            control_rate: c.control_rate,
            max_frame_samples: c.max_frame_samples as usize,
            max_frame_transients: c.max_frame_transients as usize,
        }
    }
}

/// A target as three integer codes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SomaticTarget {
    /// -1 minus, 0 neutral, 1 plus
    pub sign: i32,
    /// Body group code
    pub group: i32,
    /// -1 unknown, 0 global, 1 right, 2 left, 3 center
    pub side: i32,
}

impl TryFrom<SomaticTarget> for Target {
    type Error = InvalidCode;

    fn try_from(t: SomaticTarget) -> Result<Self, Self::Error> {
        Target::from_codes(t.sign, t.group, t.side)
    }
}

/// Source state codes returned by `somatic_source_state`.
pub const SOMATIC_STATE_IDLE: i32 = 0;
pub const SOMATIC_STATE_ACTIVE: i32 = 1;
pub const SOMATIC_STATE_INACTIVE: i32 = 2;

// ═══════════════════════════════════════════════════════════════════════════
// Marshaling helpers
// ═══════════════════════════════════════════════════════════════════════════

unsafe fn engine_ref<'a>(engine: *const SomaticEngine) -> Option<&'a HapticEngine> {
    unsafe { engine.as_ref() }.map(|e| &e.inner)
}

/// Read a C string, or `None` if null or not UTF-8.
unsafe fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    match unsafe { CStr::from_ptr(s) }.to_str() {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Material content is not valid UTF-8: {e}");
            None
        }
    }
}

/// View a host array. A null pointer is only accepted with length 0.
unsafe fn slice_arg<'a, T>(ptr: *const T, len: u32) -> Option<&'a [T]> {
    if len == 0 {
        return Some(&[]);
    }
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts(ptr, len as usize) })
}

/// Convert host targets, skipping (and logging) invalid codes.
unsafe fn targets_arg(targets: *const SomaticTarget, size: u32) -> Vec<Target> {
    let raw = unsafe { slice_arg(targets, size) }.unwrap_or_default();
    raw.iter()
        .filter_map(|t| match Target::try_from(*t) {
            Ok(target) => Some(target),
            Err(e) => {
                warn!("Skipping target {t:?}: {e}");
                None
            }
        })
        .collect()
}

fn endpoint_arg(group: i32, side: i32) -> Option<Endpoint> {
    Some(Endpoint::new(
        Group::try_from(group).ok()?,
        Side::try_from(side).ok()?,
    ))
}

#[allow(clippy::too_many_arguments)]
unsafe fn parametric_arg(
    amplitude: *const f64,
    amplitude_len: u32,
    pitch: *const f64,
    pitch_len: u32,
    pitch_min: f64,
    pitch_max: f64,
    transients: *const f64,
    transients_len: u32,
    looping: bool,
) -> Option<MaterialDesc> {
    let amplitude = unsafe { slice_arg(amplitude, amplitude_len) }?;
    let pitch = unsafe { slice_arg(pitch, pitch_len) }?;
    let transients = unsafe { slice_arg(transients, transients_len) }?;
    match MaterialDesc::from_flat(amplitude, pitch, pitch_min, pitch_max, transients, looping) {
        Ok(desc) => Some(desc),
        Err(e) => {
            warn!("Rejected parametric material: {e}");
            None
        }
    }
}

fn id_or_invalid(result: EngineResult<MaterialId>) -> MaterialId {
    result.unwrap_or(INVALID_MATERIAL_ID)
}

// ═══════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

/// Get the default configuration values.
#[unsafe(no_mangle)]
pub extern "C" fn somatic_default_config() -> SomaticConfig {
    SomaticConfig::default()
}

/// Create an initialized engine with default configuration.
///
/// Returns an opaque pointer that must be freed with `somatic_destroy`.
#[unsafe(no_mangle)]
pub extern "C" fn somatic_create() -> *mut SomaticEngine {
    unsafe { somatic_create_with_config(std::ptr::null()) }
}

/// Create an initialized engine.
///
/// # Safety
/// `config` must be a valid pointer to a `SomaticConfig` or NULL for defaults.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_create_with_config(
    config: *const SomaticConfig,
) -> *mut SomaticEngine {
    let cfg = if config.is_null() {
        SomaticConfig::default()
    } else {
        unsafe { std::ptr::read(config) }
    };
    Box::into_raw(Box::new(SomaticEngine {
        inner: HapticEngine::new(cfg.into()),
    }))
}

/// Destroy an engine handle.
///
/// # Safety
/// `engine` must be a valid pointer returned by `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_destroy(engine: *mut SomaticEngine) {
    if !engine.is_null() {
        unsafe { drop(Box::from_raw(engine)) };
    }
}

/// (Re)initialize the engine. Always returns `true` for a valid handle.
///
/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_init(engine: *const SomaticEngine) -> bool {
    match unsafe { engine_ref(engine) } {
        Some(e) => e.init(),
        None => false,
    }
}

/// Release all materials and sources. The handle stays valid.
///
/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_quit(engine: *const SomaticEngine) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.shutdown();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Materials
// ═══════════════════════════════════════════════════════════════════════════

/// Compile serialized content into a new material.
///
/// Returns the material id, or -1 on failure.
///
/// # Safety
/// `content` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_add_material(
    engine: *const SomaticEngine,
    content: *const c_char,
) -> MaterialId {
    let (Some(e), Some(content)) = (unsafe { engine_ref(engine) }, unsafe { str_arg(content) })
    else {
        return INVALID_MATERIAL_ID;
    };
    id_or_invalid(e.add_material(content))
}

/// Compile serialized content under a caller-chosen id.
///
/// # Safety
/// `content` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_add_material_with_id(
    engine: *const SomaticEngine,
    id: MaterialId,
    content: *const c_char,
) -> bool {
    let (Some(e), Some(content)) = (unsafe { engine_ref(engine) }, unsafe { str_arg(content) })
    else {
        return false;
    };
    e.add_material_with_id(id, content).is_ok()
}

/// Build a material from flat arrays.
///
/// - `amplitude`, `pitch`: time/value pairs back to back
/// - `transients`: time/amplitude/frequency triples
///
/// Returns the material id, or -1 on failure.
///
/// # Safety
/// Each array must hold at least its stated length (or be NULL with length 0).
#[allow(clippy::too_many_arguments)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_add_parametric_material(
    engine: *const SomaticEngine,
    amplitude: *const f64,
    amplitude_len: u32,
    pitch: *const f64,
    pitch_len: u32,
    pitch_min: f64,
    pitch_max: f64,
    transients: *const f64,
    transients_len: u32,
    looping: bool,
) -> MaterialId {
    let Some(e) = (unsafe { engine_ref(engine) }) else {
        return INVALID_MATERIAL_ID;
    };
    let desc = unsafe {
        parametric_arg(
            amplitude,
            amplitude_len,
            pitch,
            pitch_len,
            pitch_min,
            pitch_max,
            transients,
            transients_len,
            looping,
        )
    };
    match desc {
        Some(desc) => id_or_invalid(e.add_parametric_material(&desc)),
        None => INVALID_MATERIAL_ID,
    }
}

/// Replace the content of an existing material.
///
/// # Safety
/// `content` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_replace_material(
    engine: *const SomaticEngine,
    id: MaterialId,
    content: *const c_char,
) -> bool {
    let (Some(e), Some(content)) = (unsafe { engine_ref(engine) }, unsafe { str_arg(content) })
    else {
        return false;
    };
    e.replace_material(id, content).is_ok()
}

/// Replace an existing material from flat arrays.
///
/// # Safety
/// Each array must hold at least its stated length (or be NULL with length 0).
#[allow(clippy::too_many_arguments)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_replace_parametric_material(
    engine: *const SomaticEngine,
    id: MaterialId,
    amplitude: *const f64,
    amplitude_len: u32,
    pitch: *const f64,
    pitch_len: u32,
    pitch_min: f64,
    pitch_max: f64,
    transients: *const f64,
    transients_len: u32,
    looping: bool,
) -> bool {
    let Some(e) = (unsafe { engine_ref(engine) }) else {
        return false;
    };
    let desc = unsafe {
        parametric_arg(
            amplitude,
            amplitude_len,
            pitch,
            pitch_len,
            pitch_min,
            pitch_max,
            transients,
            transients_len,
            looping,
        )
    };
    desc.is_some_and(|desc| e.replace_parametric_material(id, &desc).is_ok())
}

/// Delete a material. Returns `false` if it did not exist.
///
/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_remove_material(engine: *const SomaticEngine, id: MaterialId) -> bool {
    unsafe { engine_ref(engine) }.is_some_and(|e| e.remove_material(id))
}

// ═══════════════════════════════════════════════════════════════════════════
// Global intensity
// ═══════════════════════════════════════════════════════════════════════════

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_set_global_intensity(engine: *const SomaticEngine, intensity: f64) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.set_global_intensity(intensity);
    }
}

/// Returns -1 for a null or shut-down engine.
///
/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_get_global_intensity(engine: *const SomaticEngine) -> f64 {
    unsafe { engine_ref(engine) }.map_or(UNINITIALIZED_INTENSITY, HapticEngine::global_intensity)
}

// ═══════════════════════════════════════════════════════════════════════════
// Event control
// ═══════════════════════════════════════════════════════════════════════════

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_play(
    engine: *const SomaticEngine,
    id: MaterialId,
    vibration_offset: f64,
    texture_offset: f64,
    stiffness_offset: f64,
) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.play(id, vibration_offset, texture_offset, stiffness_offset);
    }
}

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_stop(engine: *const SomaticEngine, id: MaterialId) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.stop(id);
    }
}

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_stop_all(engine: *const SomaticEngine) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.stop_all();
    }
}

/// Add targets to a source. Invalid codes are skipped.
///
/// # Safety
/// `targets` must point to at least `size` elements.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_add_targets(
    engine: *const SomaticEngine,
    id: MaterialId,
    targets: *const SomaticTarget,
    size: u32,
) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.add_targets(id, &unsafe { targets_arg(targets, size) });
    }
}

/// Remove targets that exactly match one of `targets`.
///
/// # Safety
/// `targets` must point to at least `size` elements.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_remove_targets(
    engine: *const SomaticEngine,
    id: MaterialId,
    targets: *const SomaticTarget,
    size: u32,
) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.remove_targets(id, &unsafe { targets_arg(targets, size) });
    }
}

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_remove_all_targets(engine: *const SomaticEngine, id: MaterialId) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.remove_all_targets(id);
    }
}

/// Set texture/stiffness positions on exactly matching targets.
///
/// # Safety
/// `targets` must point to at least `size` elements.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_update_positions(
    engine: *const SomaticEngine,
    id: MaterialId,
    targets: *const SomaticTarget,
    size: u32,
    texture_position: f64,
    stiffness_position: f64,
) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        let targets = unsafe { targets_arg(targets, size) };
        e.update_positions(id, &targets, texture_position, stiffness_position);
    }
}

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_set_offsets(
    engine: *const SomaticEngine,
    id: MaterialId,
    vibration_offset: f64,
    texture_offset: f64,
    stiffness_offset: f64,
) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.set_offsets(id, vibration_offset, texture_offset, stiffness_offset);
    }
}

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_set_intensity(engine: *const SomaticEngine, id: MaterialId, intensity: f64) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.set_intensity(id, intensity);
    }
}

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_set_loop(engine: *const SomaticEngine, id: MaterialId, loops: i32) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.set_loop(id, loops);
    }
}

/// Set the override intensity of exactly matching targets.
///
/// # Safety
/// `targets` must point to at least `size` elements.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_set_target_intensity(
    engine: *const SomaticEngine,
    id: MaterialId,
    targets: *const SomaticTarget,
    size: u32,
    intensity: f64,
) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.set_target_intensity(id, &unsafe { targets_arg(targets, size) }, intensity);
    }
}

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_clear(engine: *const SomaticEngine, id: MaterialId) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.clear(id);
    }
}

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_clear_inactive(engine: *const SomaticEngine) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.clear_inactive();
    }
}

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_clear_active(engine: *const SomaticEngine) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.clear_active();
    }
}

/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_clear_all(engine: *const SomaticEngine) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.clear_all();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Frames & queries
// ═══════════════════════════════════════════════════════════════════════════

/// Compute the frame ending at `current_time` (seconds since init).
///
/// Must not be called concurrently with itself.
///
/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_compute(engine: *const SomaticEngine, current_time: f64) {
    if let Some(e) = unsafe { engine_ref(engine) } {
        e.compute_all_events(current_time);
    }
}

/// Whether any active source targeting one of the given groups (any side,
/// any sign) carries a transient.
///
/// # Safety
/// `groups` must point to at least `size` elements.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_has_transient(
    engine: *const SomaticEngine,
    groups: *const i32,
    size: u32,
) -> bool {
    let Some(e) = (unsafe { engine_ref(engine) }) else {
        return false;
    };
    let Some(groups) = (unsafe { slice_arg(groups, size) }) else {
        return false;
    };
    let queries: Vec<Target> = groups
        .iter()
        .filter_map(|&code| Group::try_from(code).ok())
        .map(|group| Target::new(Sign::Neutral, group, Side::Global))
        .collect();
    e.has_transient(&queries)
}

/// Source state: 0 idle, 1 active, 2 inactive.
///
/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_source_state(engine: *const SomaticEngine, id: MaterialId) -> i32 {
    let state = unsafe { engine_ref(engine) }.map_or(SourceState::Idle, |e| e.source_state(id));
    match state {
        SourceState::Idle => SOMATIC_STATE_IDLE,
        SourceState::Active => SOMATIC_STATE_ACTIVE,
        SourceState::Inactive => SOMATIC_STATE_INACTIVE,
    }
}

/// Number of endpoints in the latest frame.
///
/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_frame_endpoint_count(engine: *const SomaticEngine) -> u32 {
    unsafe { engine_ref(engine) }
        .and_then(|e| e.with_frame(|f| f.len() as u32))
        .unwrap_or(0)
}

/// Number of amplitude samples per endpoint in the latest frame.
///
/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_frame_sample_count(engine: *const SomaticEngine) -> u32 {
    unsafe { engine_ref(engine) }
        .and_then(|e| e.with_frame(|f| f.samples as u32))
        .unwrap_or(0)
}

/// Copy the latest frame's amplitude samples for one endpoint.
///
/// Returns the number of samples written (0 if the endpoint received
/// nothing).
///
/// # Safety
/// `out` must have space for `capacity` floats.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_frame_amplitude(
    engine: *const SomaticEngine,
    group: i32,
    side: i32,
    out: *mut f32,
    capacity: u32,
) -> u32 {
    let (Some(e), Some(endpoint)) = (unsafe { engine_ref(engine) }, endpoint_arg(group, side)) else {
        return 0;
    };
    if out.is_null() || capacity == 0 {
        return 0;
    }
    let out = unsafe { std::slice::from_raw_parts_mut(out, capacity as usize) };
    e.with_frame(|f| {
        f.get(&endpoint).map_or(0, |target| {
            let n = target.amplitude.len().min(out.len());
            out[..n].copy_from_slice(&target.amplitude[..n]);
            n as u32
        })
    })
    .unwrap_or(0)
}

/// Peak amplitude for one endpoint in the latest frame.
///
/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_frame_peak(engine: *const SomaticEngine, group: i32, side: i32) -> f32 {
    let (Some(e), Some(endpoint)) = (unsafe { engine_ref(engine) }, endpoint_arg(group, side)) else {
        return 0.0;
    };
    e.with_frame(|f| f.peak(&endpoint)).unwrap_or(0.0)
}

/// Number of transients for one endpoint in the latest frame.
///
/// # Safety
/// `engine` must be NULL or a live pointer from `somatic_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn somatic_frame_transient_count(
    engine: *const SomaticEngine,
    group: i32,
    side: i32,
) -> u32 {
    let (Some(e), Some(endpoint)) = (unsafe { engine_ref(engine) }, endpoint_arg(group, side)) else {
        return 0;
    };
    e.with_frame(|f| f.get(&endpoint).map_or(0, |t| t.transients.len() as u32))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    const ARM_RIGHT: SomaticTarget = SomaticTarget {
        sign: 1,
        group: 200,
        side: 1,
    };

    #[test]
    fn test_null_engine_sentinels() {
        let null = std::ptr::null();
        unsafe {
            assert_eq!(somatic_get_global_intensity(null), UNINITIALIZED_INTENSITY);
            assert_eq!(somatic_add_material(null, std::ptr::null()), INVALID_MATERIAL_ID);
            assert!(!somatic_init(null));
            assert_eq!(somatic_source_state(null, 0), SOMATIC_STATE_IDLE);
            somatic_play(null, 0, 0.0, 0.0, 0.0);
            somatic_compute(null, 1.0);
        }
    }

    #[test]
    fn test_parametric_round_trip() {
        let engine = somatic_create();
        let amplitude = [0.0, 0.0, 2.0, 1.0];
        unsafe {
            let id = somatic_add_parametric_material(
                engine,
                amplitude.as_ptr(),
                amplitude.len() as u32,
                std::ptr::null(),
                0,
                0.0,
                1.0,
                std::ptr::null(),
                0,
                false,
            );
            assert!(id >= 0);

            somatic_play(engine, id, 0.0, 0.0, 0.0);
            somatic_add_targets(engine, id, &ARM_RIGHT, 1);
            somatic_compute(engine, 1.0);

            assert_eq!(somatic_frame_endpoint_count(engine), 1);
            let mut out = vec![0.0f32; 2000];
            let written = somatic_frame_amplitude(engine, 200, 1, out.as_mut_ptr(), out.len() as u32);
            assert_eq!(written, somatic_frame_sample_count(engine));
            assert!(somatic_frame_peak(engine, 200, 1) > 0.0);

            somatic_destroy(engine);
        }
    }

    #[test]
    fn test_invalid_targets_are_skipped() {
        let engine = somatic_create();
        let content = CString::new(r#"{"transients": [[0.1, 1.0, 90.0]]}"#).unwrap();
        let bad = SomaticTarget {
            sign: 7,
            group: 200,
            side: 1,
        };
        unsafe {
            let id = somatic_add_material(engine, content.as_ptr());
            somatic_play(engine, id, 0.0, 0.0, 0.0);
            somatic_add_targets(engine, id, [bad, ARM_RIGHT].as_ptr(), 2);

            let groups = [200];
            assert!(somatic_has_transient(engine, groups.as_ptr(), 1));
            let groups = [300];
            assert!(!somatic_has_transient(engine, groups.as_ptr(), 1));

            somatic_quit(engine);
            assert_eq!(somatic_get_global_intensity(engine), UNINITIALIZED_INTENSITY);
            assert!(somatic_init(engine));
            assert_eq!(somatic_get_global_intensity(engine), 1.0);

            somatic_destroy(engine);
        }
    }

    #[test]
    fn test_config_caps_frame_samples() {
        let config = SomaticConfig {
            max_frame_samples: 16,
            ..somatic_default_config()
        };
        let content = CString::new(r#"{"amplitude": [[0.0, 1.0], [1.0, 1.0]], "looping": true}"#).unwrap();
        unsafe {
            let engine = somatic_create_with_config(&config);
            let id = somatic_add_material(engine, content.as_ptr());
            somatic_play(engine, id, 0.0, 0.0, 0.0);
            somatic_add_targets(engine, id, &ARM_RIGHT, 1);

            somatic_compute(engine, 3600.0);
            assert_eq!(somatic_frame_sample_count(engine), 16);
            assert_eq!(somatic_frame_peak(engine, 200, 1), 1.0);
            assert_eq!(somatic_source_state(engine, id), SOMATIC_STATE_ACTIVE);

            somatic_destroy(engine);
        }
    }
}
