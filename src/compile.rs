// src/compile.rs
//
// Compiles material descriptions into runtime `Material`s.
//
// Two entry paths share the same validation:
// - explicit parametric arrays (`MaterialDesc::from_flat`)
// - serialized content through a `MaterialCompiler`
//
// Proprietary effect formats plug in by implementing `MaterialCompiler`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::curve::{Curve, CurveError, Keyframe, Transient};
use crate::material::{Material, PitchRange};

/// Error during material compilation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("invalid {curve} curve: {source}")]
    Curve {
        curve: &'static str,
        #[source]
        source: CurveError,
    },

    #[error("{what} array has length {len}, expected a multiple of {stride}")]
    FlatArrayLength {
        what: &'static str,
        len: usize,
        stride: usize,
    },

    #[error("invalid pitch range [{min}, {max}]")]
    PitchRange { min: f64, max: f64 },

    #[error("transient {index} is malformed")]
    Transient { index: usize },

    #[error("material has no amplitude, transient, texture or stiffness content")]
    Empty,

    #[error("malformed content: {0}")]
    Syntax(String),
}

/// Result of material compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Declarative description of a material.
///
/// This is also the JSON shape accepted by [`JsonMaterialCompiler`]; every
/// field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDesc {
    /// `[time, value]` pairs.
    pub amplitude: Vec<[f64; 2]>,
    /// `[time, value]` pairs, normalized; mapped into `pitch_range`.
    pub pitch: Vec<[f64; 2]>,
    /// `[min, max]` in Hz.
    pub pitch_range: [f64; 2],
    /// `[time, amplitude, frequency]` triples.
    pub transients: Vec<[f64; 3]>,
    pub looping: bool,
    /// `[position, value]` pairs.
    pub texture: Vec<[f64; 2]>,
    /// `[position, value]` pairs.
    pub stiffness: Vec<[f64; 2]>,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            amplitude: Vec::new(),
            pitch: Vec::new(),
            pitch_range: [0.0, 1.0],
            transients: Vec::new(),
            looping: false,
            texture: Vec::new(),
            stiffness: Vec::new(),
        }
    }
}

impl MaterialDesc {
    /// Build a description from flat host arrays.
    ///
    /// `amplitude` and `pitch` hold time/value pairs back to back;
    /// `transients` holds time/amplitude/frequency triples.
    pub fn from_flat(
        amplitude: &[f64],
        pitch: &[f64],
        pitch_min: f64,
        pitch_max: f64,
        transients: &[f64],
        looping: bool,
    ) -> CompileResult<Self> {
        Ok(Self {
            amplitude: pairs("amplitude", amplitude)?,
            pitch: pairs("pitch", pitch)?,
            pitch_range: [pitch_min, pitch_max],
            transients: triples("transient", transients)?,
            looping,
            ..Default::default()
        })
    }

    /// Validate and compile into a runtime material.
    pub fn compile(&self) -> CompileResult<Material> {
        compile(self)
    }
}

fn pairs(what: &'static str, flat: &[f64]) -> CompileResult<Vec<[f64; 2]>> {
    if flat.len() % 2 != 0 {
        return Err(CompileError::FlatArrayLength {
            what,
            len: flat.len(),
            stride: 2,
        });
    }
    Ok(flat.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
}

fn triples(what: &'static str, flat: &[f64]) -> CompileResult<Vec<[f64; 3]>> {
    if flat.len() % 3 != 0 {
        return Err(CompileError::FlatArrayLength {
            what,
            len: flat.len(),
            stride: 3,
        });
    }
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

fn curve(name: &'static str, pairs: &[[f64; 2]]) -> CompileResult<Curve> {
    let keys = pairs.iter().map(|p| Keyframe::new(p[0], p[1])).collect();
    Curve::new(keys).map_err(|source| CompileError::Curve {
        curve: name,
        source,
    })
}

/// Compile a description into a runtime `Material`.
///
/// This function:
/// 1. Validates and normalizes every curve
/// 2. Validates the pitch range
/// 3. Validates, normalizes and sorts transients
/// 4. Rejects descriptions with nothing to render
pub fn compile(desc: &MaterialDesc) -> CompileResult<Material> {
    let amplitude = curve("amplitude", &desc.amplitude)?;
    let pitch = curve("pitch", &desc.pitch)?;
    let texture = curve("texture", &desc.texture)?;
    let stiffness = curve("stiffness", &desc.stiffness)?;

    let [min, max] = desc.pitch_range;
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(CompileError::PitchRange { min, max });
    }

    let mut transients = Vec::with_capacity(desc.transients.len());
    for (index, &[time, amplitude, frequency]) in desc.transients.iter().enumerate() {
        let valid = time.is_finite()
            && time >= 0.0
            && amplitude.is_finite()
            && frequency.is_finite()
            && frequency >= 0.0;
        if !valid {
            return Err(CompileError::Transient { index });
        }
        transients.push(Transient::new(time, amplitude.clamp(0.0, 1.0), frequency));
    }
    transients.sort_by(|a, b| a.time.total_cmp(&b.time));

    if amplitude.is_empty() && transients.is_empty() && texture.is_empty() && stiffness.is_empty()
    {
        return Err(CompileError::Empty);
    }

    Ok(Material {
        amplitude,
        pitch,
        pitch_range: PitchRange { min, max },
        transients,
        looping: desc.looping,
        texture,
        stiffness,
    })
}

// ═══════════════════════════════════════════════════════════════════
// Content compilers
// ═══════════════════════════════════════════════════════════════════

/// Turns serialized effect content into a material.
///
/// The engine holds one compiler and calls it outside its state lock.
pub trait MaterialCompiler: Send + Sync {
    fn compile(&self, content: &str) -> CompileResult<Material>;
}

/// Compiles the JSON form of [`MaterialDesc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMaterialCompiler;

impl MaterialCompiler for JsonMaterialCompiler {
    fn compile(&self, content: &str) -> CompileResult<Material> {
        let desc: MaterialDesc =
            serde_json::from_str(content).map_err(|e| CompileError::Syntax(e.to_string()))?;
        compile(&desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_flat_arrays() {
        let desc = MaterialDesc::from_flat(
            &[0.0, 0.0, 2.0, 1.0],
            &[0.0, 0.5],
            60.0,
            200.0,
            &[1.0, 0.8, 120.0],
            false,
        )
        .unwrap();
        let material = desc.compile().unwrap();
        assert_eq!(material.duration(), 2.0);
        assert_eq!(material.pitch_at(1.0), 130.0);
        assert_eq!(material.transients().len(), 1);
    }

    #[test]
    fn test_rejects_odd_flat_arrays() {
        let result = MaterialDesc::from_flat(&[0.0, 0.0, 1.0], &[], 0.0, 1.0, &[], false);
        assert!(matches!(
            result,
            Err(CompileError::FlatArrayLength { stride: 2, .. })
        ));
        let result = MaterialDesc::from_flat(&[0.0, 1.0], &[], 0.0, 1.0, &[1.0, 1.0], false);
        assert!(matches!(
            result,
            Err(CompileError::FlatArrayLength { stride: 3, .. })
        ));
    }

    #[test]
    fn test_rejects_bad_pitch_range() {
        let desc = MaterialDesc {
            amplitude: vec![[0.0, 1.0]],
            pitch_range: [300.0, 100.0],
            ..Default::default()
        };
        assert!(matches!(compile(&desc), Err(CompileError::PitchRange { .. })));
    }

    #[test]
    fn test_rejects_empty_material() {
        assert_eq!(compile(&MaterialDesc::default()).err(), Some(CompileError::Empty));
    }

    #[test]
    fn test_transients_are_sorted_and_normalized() {
        let desc = MaterialDesc {
            transients: vec![[2.0, 3.0, 80.0], [0.5, 0.5, 80.0]],
            ..Default::default()
        };
        let material = compile(&desc).unwrap();
        assert_eq!(material.transients()[0].time, 0.5);
        assert_eq!(material.transients()[1].amplitude, 1.0);
    }

    #[test]
    fn test_json_compiler() {
        let content = r#"{
            "amplitude": [[0.0, 0.0], [2.0, 1.0]],
            "transients": [[1.0, 1.0, 90.0]],
            "looping": true
        }"#;
        let material = JsonMaterialCompiler.compile(content).unwrap();
        assert!(material.is_looping());
        assert_eq!(material.amplitude_at(1.0), 0.5);
        assert_eq!(material.pitch_range(), PitchRange::default());
    }

    #[test]
    fn test_json_compiler_rejects_garbage() {
        assert!(matches!(
            JsonMaterialCompiler.compile("{ not json"),
            Err(CompileError::Syntax(_))
        ));
        assert!(matches!(
            JsonMaterialCompiler.compile(r#"{"amplitude": [[1.0, 0.0], [0.0, 1.0]]}"#),
            Err(CompileError::Curve { curve: "amplitude", .. })
        ));
    }
}
