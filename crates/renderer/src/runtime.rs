use std::time::{Duration, Instant};

use crate::frame::FrameState;

/// High-level behaviour requested by the caller.
///
/// The render policy decides whether frames animate from the wall clock or
/// are evaluated at a fixed timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPolicy {
    /// Run the render loop continuously, optionally clamping the frame rate.
    Animate {
        /// Optional requested frames-per-second cap.
        target_fps: Option<f32>,
    },
    /// Keep redrawing with time frozen at `time_ms`.
    Still {
        /// Animation time every frame is evaluated at, in milliseconds.
        time_ms: f64,
    },
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self::Animate { target_fps: None }
    }
}

impl RenderPolicy {
    pub fn target_fps(&self) -> Option<f32> {
        match self {
            RenderPolicy::Animate { target_fps } => *target_fps,
            RenderPolicy::Still { .. } => None,
        }
    }

    /// State the first frame starts from. A still policy starts with its
    /// frozen time already elapsed; its fixed clock never adds more.
    pub fn initial_frame_state(&self) -> FrameState {
        match self {
            RenderPolicy::Animate { .. } => FrameState::new(),
            RenderPolicy::Still { time_ms } => FrameState::starting_at(*time_ms),
        }
    }
}

/// Abstraction over where tick timestamps originate from.
pub trait TimeSource: Send {
    /// Timestamp for the next tick, in milliseconds.
    fn sample_ms(&mut self) -> f64;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    /// Creates a system time source initialised to `Instant::now()`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn sample_ms(&mut self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time_ms: f64,
}

impl FixedTimeSource {
    pub fn new(time_ms: f64) -> Self {
        Self { time_ms }
    }
}

impl TimeSource for FixedTimeSource {
    fn sample_ms(&mut self) -> f64 {
        self.time_ms
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Builds a time source suited to the requested render policy.
pub fn time_source_for_policy(policy: &RenderPolicy) -> BoxedTimeSource {
    match policy {
        RenderPolicy::Animate { .. } => Box::new(SystemTimeSource::new()),
        RenderPolicy::Still { time_ms } => Box::new(FixedTimeSource::new(*time_ms)),
    }
}

/// Optional frame-rate cap applied between redraw requests.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    min_interval: Option<Duration>,
    last_frame: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(target_fps: Option<f32>) -> Self {
        let min_interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)));
        Self {
            min_interval,
            last_frame: None,
        }
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.min_interval, self.last_frame) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    /// Earliest instant the next frame may be drawn, when capped.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.min_interval, self.last_frame) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_never_advances() {
        let mut source = time_source_for_policy(&RenderPolicy::Still { time_ms: 1500.0 });
        assert_eq!(source.sample_ms(), 1500.0);
        assert_eq!(source.sample_ms(), 1500.0);
    }

    #[test]
    fn still_policy_stays_at_its_frozen_time() {
        let policy = RenderPolicy::Still { time_ms: 1500.0 };
        let mut source = time_source_for_policy(&policy);
        let mut state = policy.initial_frame_state();
        for _ in 0..3 {
            state = state.advance(source.sample_ms());
            assert_eq!(state.elapsed_ms(), 1500.0);
        }

        let animate = RenderPolicy::default().initial_frame_state();
        assert_eq!(animate.elapsed_ms(), 0.0);
        assert_eq!(animate.frame_index(), 0);
    }

    #[test]
    fn system_source_is_monotonic() {
        let mut source = SystemTimeSource::new();
        let first = source.sample_ms();
        let second = source.sample_ms();
        assert!(second >= first);
        assert!(first >= 0.0);
    }

    #[test]
    fn uncapped_scheduler_is_always_ready() {
        let mut scheduler = FrameScheduler::new(None);
        let now = Instant::now();
        scheduler.mark_rendered(now);
        assert!(scheduler.ready_for_frame(now));
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn capped_scheduler_waits_for_interval() {
        let mut scheduler = FrameScheduler::new(Some(10.0));
        let start = Instant::now();
        assert!(scheduler.ready_for_frame(start));

        scheduler.mark_rendered(start);
        assert!(!scheduler.ready_for_frame(start + Duration::from_millis(50)));
        assert!(scheduler.ready_for_frame(start + Duration::from_millis(100)));
        assert_eq!(
            scheduler.next_deadline(),
            Some(start + Duration::from_millis(100))
        );

        scheduler.reset();
        assert!(scheduler.ready_for_frame(start));
    }

    #[test]
    fn non_positive_fps_disables_cap() {
        assert_eq!(FrameScheduler::new(Some(0.0)).min_interval(), None);
        assert_eq!(FrameScheduler::new(Some(-5.0)).min_interval(), None);
    }
}
