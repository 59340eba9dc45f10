// src/scheduler.rs
//
// Frame computation.
//
// Each call covers the whole span since the previous one. Amplitude and
// pitch are sampled across the span at the control rate, and transients are
// collected from every loop cycle the span crosses, so a late call never
// skips content that fell in the gap.
//
// Work per call is bounded by the frame limits in `EngineConfig`: a span
// longer than the sample cap is sampled more coarsely, and a source reports
// at most its most recent `max_frame_transients` transients.

use log::{debug, warn};

use crate::clock::FrameClock;
use crate::curve::{Transient, transients_in, transients_through};
use crate::engine::EngineConfig;
use crate::frame::{Frame, TransientHit};
use crate::material::{Material, MaterialStore};
use crate::source::{Source, SourceState};
use crate::source_registry::SourceRegistry;
use crate::target::{BodyMap, ResolvedEndpoint};

/// Turns source state into output frames.
///
/// Owned by the engine state and only ever driven under its lock, so there
/// is at most one compute pass at a time.
#[derive(Debug)]
pub struct Scheduler {
    clock: FrameClock,

    /// Control samples per second
    control_rate: f64,

    max_samples: usize,
    max_transients: usize,

    /// Pre-allocated scratch for one source's unscaled amplitude samples
    amplitude_scratch: Vec<f32>,

    /// Pre-allocated scratch for one source's pitch samples
    pitch_scratch: Vec<f32>,

    /// Transients of one source in the current span, as (frame offset, event)
    transient_scratch: Vec<(f64, Transient)>,

    /// Endpoints one source resolves to
    endpoint_scratch: Vec<ResolvedEndpoint>,
}

impl Scheduler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            clock: FrameClock::new(),
            control_rate: config.control_rate,
            max_samples: config.max_frame_samples.max(1),
            max_transients: config.max_frame_transients.max(1),
            amplitude_scratch: Vec::with_capacity(64),
            pitch_scratch: Vec::with_capacity(64),
            transient_scratch: Vec::with_capacity(16),
            endpoint_scratch: Vec::with_capacity(8),
        }
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    #[inline]
    pub fn control_rate(&self) -> f64 {
        self.control_rate
    }

    /// Compute the frame ending at `now` into `frame`, reusing its buffers.
    ///
    /// Advances every active source by the elapsed span and retires sources
    /// whose content ends inside it. Sources bound to a missing material
    /// keep advancing but produce nothing.
    pub fn compute(
        &mut self,
        now: f64,
        frame: &mut Frame,
        sources: &mut SourceRegistry,
        materials: &MaterialStore,
        body_map: &dyn BodyMap,
        global_intensity: f64,
    ) {
        let span = self.clock.advance(now);
        let elapsed = span.elapsed();
        let wanted = span.samples(self.control_rate);
        let samples = wanted.min(self.max_samples);
        let sample_rate = if samples < wanted {
            debug!("{elapsed:.3}s frame sampled at {samples} of {wanted} samples");
            samples as f64 / elapsed
        } else {
            self.control_rate
        };
        frame.reset(span.start, span.end, sample_rate, samples);

        if samples == 0 {
            return;
        }
        let window = Window {
            elapsed,
            dt: elapsed / samples as f64,
            samples,
        };

        for source in sources.active_sources_mut() {
            match materials.get(source.id) {
                Some(material) => {
                    self.render_source(source, material, &window, body_map, global_intensity, frame)
                }
                None => source.elapsed += elapsed,
            }
        }

        frame.finish();
    }

    fn render_source(
        &mut self,
        source: &mut Source,
        material: &Material,
        window: &Window,
        body_map: &dyn BodyMap,
        global_intensity: f64,
        frame: &mut Frame,
    ) {
        let start = source.effect_time();
        let end = start + window.elapsed;

        // Content with no temporal extent (texture only, or everything at
        // t = 0) has nothing to loop over and plays until stopped.
        let duration = material.duration();
        let cycles = if duration > 0.0 {
            source.cycles(material.is_looping())
        } else {
            None
        };
        let playback = Playback {
            duration,
            cycles,
            content_end: cycles.map(|n| n as f64 * duration),
        };
        let finished = playback.content_end.is_some_and(|e| end >= e);

        source.targets.resolve_into(body_map, &mut self.endpoint_scratch);
        if !self.endpoint_scratch.is_empty() {
            self.sample_curves(material, &playback, start, window);
            self.collect_transients(material, &playback, start, end, finished);
            if self.transient_scratch.len() > self.max_transients {
                let dropped = self.transient_scratch.len() - self.max_transients;
                self.transient_scratch.drain(..dropped);
                warn!(
                    "source {}: dropped {dropped} transient(s) older than the frame limit",
                    source.id
                );
            }

            let gain = source.intensity() * global_intensity;
            for resolved in &self.endpoint_scratch {
                let g = gain * resolved.intensity;
                let target = frame.target_mut(resolved.endpoint);
                target.mix(&self.amplitude_scratch, &self.pitch_scratch, g as f32);

                for &(offset, transient) in &self.transient_scratch {
                    target.push_transient(TransientHit {
                        offset,
                        amplitude: (transient.amplitude * g) as f32,
                        frequency: transient.frequency as f32,
                        source: source.id,
                    });
                }

                let texture = material.texture_at(resolved.texture_position + source.offsets.texture);
                let stiffness =
                    material.stiffness_at(resolved.stiffness_position + source.offsets.stiffness);
                target.mix_spatial((texture * g) as f32, (stiffness * g) as f32);
            }
        }

        source.elapsed += window.elapsed;
        if finished {
            source.state = SourceState::Inactive;
            debug!(
                "source {} finished after {} cycle(s)",
                source.id,
                cycles.unwrap_or(0)
            );
        }
    }

    /// Fill the amplitude and pitch scratch buffers for one source.
    ///
    /// Curves are only evaluated up to the end of finite content; the rest
    /// of the window is silence.
    fn sample_curves(&mut self, material: &Material, playback: &Playback, start: f64, window: &Window) {
        self.amplitude_scratch.clear();
        self.pitch_scratch.clear();

        let live = match playback.content_end {
            Some(e) => (((e - start) / window.dt).ceil().max(0.0) as usize).min(window.samples),
            None => window.samples,
        };
        for i in 0..live {
            let t = start + i as f64 * window.dt;
            match playback.local_time(t) {
                Some(local) => {
                    self.amplitude_scratch.push(material.amplitude_at(local) as f32);
                    self.pitch_scratch.push(material.pitch_at(local) as f32);
                }
                None => {
                    self.amplitude_scratch.push(0.0);
                    self.pitch_scratch.push(0.0);
                }
            }
        }
        self.amplitude_scratch.resize(window.samples, 0.0);
        self.pitch_scratch.resize(window.samples, 0.0);
    }

    /// Collect transients with effect time in `[start, end)`, from every
    /// cycle the window crosses, oldest first.
    ///
    /// When the content ends inside the window, a transient at exactly the
    /// end time is included too. Cycles too old to survive the transient
    /// limit are not scanned.
    fn collect_transients(
        &mut self,
        material: &Material,
        playback: &Playback,
        start: f64,
        end: f64,
        finished: bool,
    ) {
        self.transient_scratch.clear();
        let transients = material.transients();
        if transients.is_empty() {
            return;
        }

        let lo = start.max(0.0);
        let hi = playback.content_end.map_or(end, |e| end.min(e));
        if hi < lo {
            return;
        }

        let duration = playback.duration;
        if duration <= 0.0 {
            for t in transients_in(transients, lo, hi) {
                self.transient_scratch.push((t.time - start, *t));
            }
            return;
        }

        // A transient at the very end of a cycle lands on the next cycle's
        // start, so scanning begins one cycle early.
        let mut first = ((lo / duration).floor() as u64).saturating_sub(1);
        let mut last = (hi / duration).floor() as u64;
        if let Some(n) = playback.cycles {
            last = last.min(n.saturating_sub(1));
        }
        let keep = (self.max_transients as u64).div_ceil(transients.len() as u64) + 1;
        first = first.max(last.saturating_sub(keep));

        for cycle in first..=last {
            let base = cycle as f64 * duration;
            let is_last = finished && playback.cycles.is_some_and(|n| cycle + 1 == n);
            let hits = if is_last {
                transients_through(transients, lo - base, hi - base)
            } else {
                transients_in(transients, lo - base, hi - base)
            };
            for t in hits {
                self.transient_scratch.push((base + t.time - start, *t));
            }
        }
    }
}

/// Per-frame sampling grid.
#[derive(Debug, Clone, Copy)]
struct Window {
    elapsed: f64,
    dt: f64,
    samples: usize,
}

/// How a source plays its material.
#[derive(Debug, Clone, Copy)]
struct Playback {
    /// Length of one cycle.
    duration: f64,
    /// `None` repeats until stopped.
    cycles: Option<u64>,
    content_end: Option<f64>,
}

impl Playback {
    /// Map effect time onto a position inside one cycle, or `None` when the
    /// source is silent at `t`.
    fn local_time(&self, t: f64) -> Option<f64> {
        if t < 0.0 || self.content_end.is_some_and(|e| t >= e) {
            return None;
        }
        let repeats = self.duration > 0.0 && self.cycles != Some(1);
        Some(if repeats { t.rem_euclid(self.duration) } else { t })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Group, Side};
    use crate::compile::MaterialDesc;
    use crate::source::Offsets;
    use crate::target::{Endpoint, IdentityBodyMap, Target};

    const RATE: f64 = 100.0;

    fn new_scheduler() -> Scheduler {
        Scheduler::new(&EngineConfig {
            control_rate: RATE,
            ..Default::default()
        })
    }

    fn render(
        scheduler: &mut Scheduler,
        now: f64,
        sources: &mut SourceRegistry,
        materials: &MaterialStore,
        global_intensity: f64,
    ) -> Frame {
        let mut frame = Frame::default();
        scheduler.compute(now, &mut frame, sources, materials, &IdentityBodyMap, global_intensity);
        frame
    }

    fn arm() -> Endpoint {
        Endpoint::new(Group::Arm, Side::Right)
    }

    fn setup(desc: MaterialDesc) -> (MaterialStore, SourceRegistry) {
        let mut materials = MaterialStore::new();
        let id = materials.add(desc.compile().unwrap()).unwrap();
        let mut sources = SourceRegistry::new();
        sources.play(id, Offsets::default());
        sources.add_targets(id, &[Target::plus(Group::Arm, Side::Right)]);
        (materials, sources)
    }

    fn ramp(looping: bool) -> MaterialDesc {
        MaterialDesc {
            amplitude: vec![[0.0, 0.0], [1.0, 1.0]],
            looping,
            ..Default::default()
        }
    }

    #[test]
    fn test_window_is_fully_sampled() {
        let (materials, mut sources) = setup(ramp(false));
        let mut scheduler = new_scheduler();
        let frame = render(&mut scheduler, 0.5, &mut sources, &materials, 1.0);

        assert_eq!(frame.samples, 50);
        let target = frame.get(&arm()).unwrap();
        assert_eq!(target.amplitude.len(), 50);
        assert_eq!(target.amplitude[0], 0.0);
        assert!((target.amplitude[25] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_looping_wraps_inside_one_window() {
        let (materials, mut sources) = setup(ramp(true));
        let mut scheduler = new_scheduler();
        let frame = render(&mut scheduler, 2.0, &mut sources, &materials, 1.0);

        let target = frame.get(&arm()).unwrap();
        assert!((target.amplitude[150] - 0.5).abs() < 1e-6);
        assert_eq!(sources.state(0), SourceState::Active);
    }

    #[test]
    fn test_silent_after_content_end() {
        let (materials, mut sources) = setup(ramp(false));
        let mut scheduler = new_scheduler();
        let frame = render(&mut scheduler, 2.0, &mut sources, &materials, 1.0);

        let target = frame.get(&arm()).unwrap();
        assert!(target.amplitude[99] > 0.9);
        assert!(target.amplitude[100..].iter().all(|&a| a == 0.0));
        assert_eq!(sources.state(0), SourceState::Inactive);
    }

    #[test]
    fn test_transients_from_every_cycle() {
        let desc = MaterialDesc {
            amplitude: vec![[0.0, 0.5], [1.0, 0.5]],
            transients: vec![[0.5, 1.0, 80.0]],
            looping: true,
            ..Default::default()
        };
        let (materials, mut sources) = setup(desc);
        let mut scheduler = new_scheduler();
        let frame = render(&mut scheduler, 3.0, &mut sources, &materials, 1.0);

        let offsets: Vec<f64> = frame
            .get(&arm())
            .unwrap()
            .transients
            .iter()
            .map(|t| t.offset)
            .collect();
        assert_eq!(offsets, vec![0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_transient_at_content_end_fires_once() {
        let desc = MaterialDesc {
            transients: vec![[0.0, 1.0, 80.0], [1.0, 1.0, 80.0]],
            ..Default::default()
        };
        let (materials, mut sources) = setup(desc);
        sources.set_loop(0, 2);
        let mut scheduler = new_scheduler();

        let frame = render(&mut scheduler, 1.5, &mut sources, &materials, 1.0);
        assert_eq!(frame.transient_count(), 3);
        let frame = render(&mut scheduler, 2.5, &mut sources, &materials, 1.0);
        assert_eq!(frame.transient_count(), 1);
        assert_eq!(sources.state(0), SourceState::Inactive);
    }

    #[test]
    fn test_negative_offset_delays_start() {
        let (materials, mut sources) = setup(ramp(false));
        sources.set_offsets(0, Offsets::new(-1.0, 0.0, 0.0));
        let mut scheduler = new_scheduler();

        let frame = render(&mut scheduler, 1.0, &mut sources, &materials, 1.0);
        assert_eq!(frame.peak(&arm()), 0.0);
        let frame = render(&mut scheduler, 1.5, &mut sources, &materials, 1.0);
        assert!(frame.peak(&arm()) > 0.0);
    }

    #[test]
    fn test_missing_material_still_advances() {
        let (mut materials, mut sources) = setup(ramp(false));
        materials.remove(0);
        let mut scheduler = new_scheduler();
        let frame = render(&mut scheduler, 0.5, &mut sources, &materials, 1.0);

        assert!(frame.is_empty());
        assert_eq!(sources.get(0).unwrap().elapsed, 0.5);
    }

    #[test]
    fn test_global_intensity_scales_output() {
        let (materials, mut sources) = setup(ramp(false));
        let mut scheduler = new_scheduler();
        let frame = render(&mut scheduler, 0.5, &mut sources, &materials, 0.5);
        let target = frame.get(&arm()).unwrap();
        assert!((target.amplitude[25] - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_backward_time_produces_empty_frame() {
        let (materials, mut sources) = setup(ramp(false));
        let mut scheduler = new_scheduler();
        render(&mut scheduler, 0.5, &mut sources, &materials, 1.0);
        let frame = render(&mut scheduler, 0.25, &mut sources, &materials, 1.0);

        assert_eq!(frame.samples, 0);
        assert_eq!(sources.get(0).unwrap().elapsed, 0.5);
    }

    fn limited(max_frame_samples: usize, max_frame_transients: usize) -> Scheduler {
        Scheduler::new(&EngineConfig {
            control_rate: RATE,
            max_frame_samples,
            max_frame_transients,
        })
    }

    fn pulsing() -> MaterialDesc {
        MaterialDesc {
            amplitude: vec![[0.0, 0.5], [1.0, 0.5]],
            transients: vec![[0.5, 1.0, 80.0]],
            looping: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_long_gap_is_sampled_coarsely() {
        let (materials, mut sources) = setup(pulsing());
        let mut scheduler = limited(10, 64);
        let frame = render(&mut scheduler, 100.0, &mut sources, &materials, 1.0);

        assert_eq!(frame.samples, 10);
        assert_eq!(frame.sample_rate, 0.1);
        let target = frame.get(&arm()).unwrap();
        assert_eq!(target.amplitude, vec![0.5; 10]);
        assert_eq!(sources.get(0).unwrap().elapsed, 100.0);
    }

    #[test]
    fn test_transient_limit_keeps_latest() {
        let (materials, mut sources) = setup(pulsing());
        let mut scheduler = limited(4096, 4);
        let frame = render(&mut scheduler, 100.0, &mut sources, &materials, 1.0);

        let offsets: Vec<f64> = frame
            .get(&arm())
            .unwrap()
            .transients
            .iter()
            .map(|t| t.offset)
            .collect();
        assert_eq!(offsets, vec![96.5, 97.5, 98.5, 99.5]);
    }

    #[test]
    fn test_finite_content_stops_sampling_at_end() {
        let (materials, mut sources) = setup(ramp(false));
        let mut scheduler = limited(8, 64);
        let frame = render(&mut scheduler, 1e6, &mut sources, &materials, 1.0);

        let target = frame.get(&arm()).unwrap();
        assert_eq!(target.amplitude.len(), 8);
        assert!(target.amplitude.iter().all(|&a| a == 0.0));
        assert_eq!(sources.state(0), SourceState::Inactive);
    }

    #[test]
    fn test_texture_and_stiffness_follow_positions() {
        let desc = MaterialDesc {
            texture: vec![[0.0, 0.0], [1.0, 1.0]],
            stiffness: vec![[0.0, 0.0], [1.0, 1.0]],
            ..Default::default()
        };
        let (materials, mut sources) = setup(desc);
        let target = Target::plus(Group::Arm, Side::Right);
        let mut scheduler = new_scheduler();

        let frame = render(&mut scheduler, 0.1, &mut sources, &materials, 1.0);
        let out = frame.get(&arm()).unwrap();
        assert_eq!((out.texture, out.stiffness), (0.0, 0.0));

        sources.update_positions(0, &[target], 0.5, 0.25);
        let frame = render(&mut scheduler, 0.2, &mut sources, &materials, 1.0);
        let out = frame.get(&arm()).unwrap();
        assert_eq!((out.texture, out.stiffness), (0.5, 0.25));

        // Offsets shift the positions; output is scaled by intensity
        sources.set_offsets(0, Offsets::new(0.0, 0.25, 0.5));
        let frame = render(&mut scheduler, 0.3, &mut sources, &materials, 0.5);
        let out = frame.get(&arm()).unwrap();
        assert_eq!((out.texture, out.stiffness), (0.375, 0.375));
        assert_eq!(sources.state(0), SourceState::Active);
    }
}
