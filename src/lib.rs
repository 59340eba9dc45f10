// src/lib.rs
//
// Library entry point for Rust consumers and FFI hosts (iOS/Swift, Unity, web).

mod body;
mod clock;
mod compile;
mod curve;
mod engine;
mod frame;
mod material;
mod scheduler;
mod source;
mod source_registry;
mod target;

pub mod ffi;

#[cfg(feature = "web")]
pub mod wasm;

// Re-export key types for Rust consumers
pub use body::{Group, InvalidCode, Side, Sign};
pub use clock::{FrameClock, FrameSpan};
pub use compile::{
    CompileError, CompileResult, JsonMaterialCompiler, MaterialCompiler, MaterialDesc, compile,
};
pub use curve::{Curve, CurveError, Keyframe, Transient, transients_in, transients_through};
pub use engine::{
    DEFAULT_CONTROL_RATE, DEFAULT_MAX_FRAME_SAMPLES, DEFAULT_MAX_FRAME_TRANSIENTS, EngineConfig,
    EngineError, EngineResult, HapticEngine, UNINITIALIZED_INTENSITY,
};
pub use frame::{Frame, TargetFrame, TransientHit};
pub use material::{INVALID_MATERIAL_ID, Material, MaterialId, MaterialStore, PitchRange};
pub use scheduler::Scheduler;
pub use source::{Offsets, Source, SourceState};
pub use source_registry::SourceRegistry;
pub use target::{
    BodyMap, Endpoint, EndpointMap, IdentityBodyMap, ResolvedEndpoint, Target, TargetEntry,
    TargetSet, matches,
};
