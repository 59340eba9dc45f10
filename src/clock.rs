// src/clock.rs
//
// Engine-wide frame clock.
//
// Host time is in seconds, measured from engine initialization. The clock
// keeps a high-water mark and never moves backward.

/// The span of engine time one frame covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSpan {
    pub start: f64,
    pub end: f64,
}

impl FrameSpan {
    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.end - self.start
    }

    /// Number of control samples needed to cover the span at `rate` Hz.
    ///
    /// Any non-empty span gets at least one sample.
    pub fn samples(&self, rate: f64) -> usize {
        let elapsed = self.elapsed();
        if elapsed <= 0.0 || rate <= 0.0 {
            return 0;
        }
        ((elapsed * rate).round() as usize).max(1)
    }
}

/// Tracks the last computed engine time.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_time: f64,
    frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to `now` and return the span since the previous frame.
    ///
    /// A time at or before the high-water mark (or a non-finite one)
    /// yields an empty span and leaves the mark where it is.
    pub fn advance(&mut self, now: f64) -> FrameSpan {
        self.frames += 1;
        let start = self.last_time;
        if !now.is_finite() || now <= start {
            return FrameSpan { start, end: start };
        }
        self.last_time = now;
        FrameSpan { start, end: now }
    }

    #[inline]
    pub fn last_time(&self) -> f64 {
        self.last_time
    }

    /// Number of frames computed so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_starts_at_zero() {
        let mut clock = FrameClock::new();
        let span = clock.advance(1.0);
        assert_eq!(span, FrameSpan { start: 0.0, end: 1.0 });
        assert_eq!(span.samples(1000.0), 1000);
    }

    #[test]
    fn test_time_never_moves_backward() {
        let mut clock = FrameClock::new();
        clock.advance(2.0);
        let span = clock.advance(1.5);
        assert_eq!(span.elapsed(), 0.0);
        assert_eq!(span.samples(1000.0), 0);
        assert_eq!(clock.last_time(), 2.0);

        let span = clock.advance(f64::NAN);
        assert_eq!(span.elapsed(), 0.0);
        assert_eq!(clock.frame_count(), 3);
    }

    #[test]
    fn test_short_span_gets_one_sample() {
        let span = FrameSpan { start: 1.0, end: 1.0001 };
        assert_eq!(span.samples(1000.0), 1);
    }
}
