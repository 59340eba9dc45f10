// src/frame.rs
//
// Per-frame output buffer, keyed by resolved endpoint.
//
// Sample buffers span the whole frame (not just its endpoint), so a
// device layer catching up after a frame drop sees everything that
// happened in the gap.

use std::collections::BTreeMap;

use crate::material::MaterialId;
use crate::target::Endpoint;

/// A transient that fires inside the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransientHit {
    /// Seconds after the frame start.
    pub offset: f64,
    /// Mixed amplitude (all intensity factors applied).
    pub amplitude: f32,
    pub frequency: f32,
    pub source: MaterialId,
}

/// Output for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFrame {
    pub endpoint: Endpoint,
    /// Mixed amplitude in [0, 1], one value per control sample.
    pub amplitude: Vec<f32>,
    /// Amplitude-weighted pitch in Hz, one value per control sample.
    pub pitch: Vec<f32>,
    /// Sorted by offset.
    pub transients: Vec<TransientHit>,
    pub texture: f32,
    pub stiffness: f32,
    pitch_weight: Vec<f32>,
}

impl TargetFrame {
    fn new(endpoint: Endpoint, samples: usize) -> Self {
        Self {
            endpoint,
            amplitude: vec![0.0; samples],
            pitch: vec![0.0; samples],
            transients: Vec::new(),
            texture: 0.0,
            stiffness: 0.0,
            pitch_weight: vec![0.0; samples],
        }
    }

    /// Reuse this buffer for another endpoint, keeping its allocations.
    fn reset(&mut self, endpoint: Endpoint, samples: usize) {
        self.endpoint = endpoint;
        for buffer in [&mut self.amplitude, &mut self.pitch, &mut self.pitch_weight] {
            buffer.clear();
            buffer.resize(samples, 0.0);
        }
        self.transients.clear();
        self.texture = 0.0;
        self.stiffness = 0.0;
    }

    /// Accumulate one source's contribution.
    ///
    /// `amplitude` and `pitch` are unscaled per-sample values; `gain` is the
    /// product of every intensity factor for this endpoint.
    pub(crate) fn mix(&mut self, amplitude: &[f32], pitch: &[f32], gain: f32) {
        let samples = self
            .amplitude
            .iter_mut()
            .zip(self.pitch.iter_mut())
            .zip(self.pitch_weight.iter_mut());
        for (((out, out_pitch), weight), (&a, &p)) in samples.zip(amplitude.iter().zip(pitch)) {
            let a = a * gain;
            *out += a;
            *out_pitch += a * p;
            *weight += a;
        }
    }

    pub(crate) fn push_transient(&mut self, hit: TransientHit) {
        self.transients.push(hit);
    }

    pub(crate) fn mix_spatial(&mut self, texture: f32, stiffness: f32) {
        self.texture = self.texture.max(texture);
        self.stiffness = self.stiffness.max(stiffness);
    }

    fn finish(&mut self) {
        for ((a, p), w) in self
            .amplitude
            .iter_mut()
            .zip(self.pitch.iter_mut())
            .zip(self.pitch_weight.drain(..))
        {
            *p = if w > 0.0 { *p / w } else { 0.0 };
            *a = a.clamp(0.0, 1.0);
        }
        for hit in &mut self.transients {
            hit.amplitude = hit.amplitude.clamp(0.0, 1.0);
        }
        self.transients.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        self.texture = self.texture.clamp(0.0, 1.0);
        self.stiffness = self.stiffness.clamp(0.0, 1.0);
    }

    /// Largest amplitude sample in the frame.
    pub fn peak(&self) -> f32 {
        self.amplitude.iter().copied().fold(0.0, f32::max)
    }

    /// Whether the endpoint has anything to render this frame.
    pub fn is_silent(&self) -> bool {
        self.peak() <= 0.0 && self.transients.is_empty()
    }
}

/// Everything computed by one frame pass.
///
/// The engine keeps one frame and recomputes it in place, so endpoint
/// buffers are reused from frame to frame.
#[derive(Debug, Default)]
pub struct Frame {
    /// Engine time at the start of the frame.
    pub start: f64,
    /// Engine time the frame was computed for.
    pub end: f64,
    /// Samples per second of engine time. Below the control rate when a
    /// long frame was sampled more coarsely.
    pub sample_rate: f64,
    /// Samples in every buffer of this frame.
    pub samples: usize,
    targets: BTreeMap<Endpoint, TargetFrame>,
    spare: Vec<TargetFrame>,
}

impl Clone for Frame {
    fn clone(&self) -> Self {
        Self {
            start: self.start,
            end: self.end,
            sample_rate: self.sample_rate,
            samples: self.samples,
            targets: self.targets.clone(),
            spare: Vec::new(),
        }
    }
}

impl Frame {
    /// Start a new frame, keeping the previous frame's buffers for reuse.
    pub(crate) fn reset(&mut self, start: f64, end: f64, sample_rate: f64, samples: usize) {
        self.start = start;
        self.end = end;
        self.sample_rate = sample_rate;
        self.samples = samples;
        let previous = std::mem::take(&mut self.targets);
        self.spare.extend(previous.into_values());
    }

    pub(crate) fn target_mut(&mut self, endpoint: Endpoint) -> &mut TargetFrame {
        let samples = self.samples;
        let spare = &mut self.spare;
        self.targets.entry(endpoint).or_insert_with(|| match spare.pop() {
            Some(mut target) => {
                target.reset(endpoint, samples);
                target
            }
            None => TargetFrame::new(endpoint, samples),
        })
    }

    /// Normalize accumulated values. Called once after every source mixed in.
    pub(crate) fn finish(&mut self) {
        for target in self.targets.values_mut() {
            target.finish();
        }
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn get(&self, endpoint: &Endpoint) -> Option<&TargetFrame> {
        self.targets.get(endpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetFrame> {
        self.targets.values()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Peak amplitude for an endpoint, 0 if it received nothing.
    pub fn peak(&self, endpoint: &Endpoint) -> f32 {
        self.get(endpoint).map_or(0.0, TargetFrame::peak)
    }

    /// True if no endpoint has any amplitude or transient to render.
    pub fn is_silent(&self) -> bool {
        self.targets.values().all(TargetFrame::is_silent)
    }

    pub fn transient_count(&self) -> usize {
        self.targets.values().map(|t| t.transients.len()).sum()
    }
}
