use crate::*;
use std::time::*;

/// The entry points of a module that the render driver calls.
pub trait GuestModule {
    /// Called once, before the first frame.
    fn init(&mut self, width: u32, height: u32) -> Result<(), PaneError>;

    /// Called once per frame.
    fn render(&mut self) -> Result<(), PaneError>;
}

impl<M: GuestModule + ?Sized> GuestModule for &mut M {
    fn init(&mut self, width: u32, height: u32) -> Result<(), PaneError> {
        (**self).init(width, height)
    }

    fn render(&mut self) -> Result<(), PaneError> {
        (**self).render()
    }
}

/// Frame timing snapshot.
#[derive(Copy, Clone, Debug)]
pub struct FrameTime {
    /// Time elapsed since the previous frame, in seconds.
    pub dt: f32,
    /// Monotonic timestamp taken at the tick.
    pub now: Instant,
    /// Monotonic frame counter.
    pub frame_index: u64
}

/// Produces [`FrameTime`] snapshots. Delta time is clamped so that stalls
/// and tight loops do not yield pathological values.
#[derive(Clone, Debug)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration
}

impl FrameClock {
    /// Creates a new clock with default clamps.
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    /// Creates a clock with custom delta-time clamps.
    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min,
            dt_max
        }
    }

    /// The number of ticks so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// When the clock last ticked.
    pub fn last_tick(&self) -> Instant {
        self.last
    }

    /// Advances the clock.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last).clamp(self.dt_min, self.dt_max);
        self.last = now;

        let result = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        result
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of waiting for the next display refresh.
#[derive(Copy, Clone, Debug)]
pub enum Refresh {
    /// A frame should be rendered.
    Frame(FrameTime),
    /// The display is gone; rendering should end.
    Stop
}

/// A source of display refresh signals. Waiting is the only point at
/// which the render loop suspends.
pub trait RefreshSource {
    /// Blocks until the next refresh.
    fn next_refresh(&mut self) -> Refresh;
}

/// Signals refreshes at a fixed interval, optionally stopping after a
/// number of frames. A frame that overruns the interval delays the next
/// one; missed refreshes are not caught up.
#[derive(Clone, Debug)]
pub struct FixedRateRefresh {
    clock: FrameClock,
    interval: Duration,
    max_frames: Option<u64>,
    started: bool
}

impl FixedRateRefresh {
    /// Creates a refresh source with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            clock: FrameClock::new(),
            interval,
            max_frames: None,
            started: false
        }
    }

    /// Creates a refresh source from the interval and frame limit of a config.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.frame_interval).with_max_frames(config.max_frames)
    }

    /// Stops after the given number of frames.
    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }
}

impl RefreshSource for FixedRateRefresh {
    fn next_refresh(&mut self) -> Refresh {
        if self.max_frames.is_some_and(|max| self.clock.frame_index() >= max) {
            return Refresh::Stop;
        }

        if self.started {
            let elapsed = self.clock.last_tick().elapsed();
            if let Some(remaining) = self.interval.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
        else {
            self.started = true;
        }

        Refresh::Frame(self.clock.tick())
    }
}

impl<R: RefreshSource + ?Sized> RefreshSource for Box<R> {
    fn next_refresh(&mut self) -> Refresh {
        (**self).next_refresh()
    }
}

/// A summary of a completed render loop.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverReport {
    /// The number of frames rendered.
    pub frames: u64
}

/// Initializes a module and then renders it once per refresh.
#[derive(Debug)]
pub struct RenderDriver<R: RefreshSource> {
    refresh: R,
    width: u32,
    height: u32
}

impl<R: RefreshSource> RenderDriver<R> {
    /// Creates a driver for a surface of the given size.
    pub fn new(refresh: R, width: u32, height: u32) -> Self {
        Self {
            refresh,
            width,
            height
        }
    }

    /// Calls `init` once and then `render` on every refresh, until the
    /// refresh source stops or a call fails. Frames never overlap.
    pub fn run(&mut self, mut module: impl GuestModule) -> Result<DriverReport, PaneError> {
        module.init(self.width, self.height).map_err(Self::report)?;

        let mut report = DriverReport::default();
        while let Refresh::Frame(time) = self.refresh.next_refresh() {
            log::trace!("Rendering frame {} (dt = {:.4}s)", time.frame_index, time.dt);
            module.render().map_err(Self::report)?;
            report.frames += 1;
        }

        log::debug!("Render loop finished after {} frames", report.frames);
        Ok(report)
    }

    fn report(error: PaneError) -> PaneError {
        if error.is_fatal() {
            log::error!("Module raised a fatal error: {error}");
        }
        else {
            log::error!("Render loop aborted: {error}");
        }
        error
    }
}

impl RenderDriver<FixedRateRefresh> {
    /// Creates a fixed-rate driver using the surface size, frame interval and
    /// frame limit of a config.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(FixedRateRefresh::from_config(config), config.surface_width, config.surface_height)
    }
}
