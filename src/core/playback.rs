use std::time::Instant;

/// Audio/video playback as seen by the judging core. Only its clock and the
/// play/stop/seek controls are used.
pub trait PlaybackTransport {
    /// Position in the media, in seconds. Zero until playback really started.
    fn current_time_seconds(&self) -> f64;
    fn play(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, seconds: f64);
    fn is_playing(&self) -> bool;
}

/// Maps frame timestamps to elapsed song seconds. Anchored once, when the
/// transport first reports a running position, and free-running on the
/// frame clock afterwards.
#[derive(Debug, Clone, Copy)]
pub struct SongClock {
    anchor: Instant,
    elapsed_at_anchor: f64,
}

impl SongClock {
    /// `offset_seconds` is the chart's beat-0 offset.
    pub fn anchor(now: Instant, music_time: f64, offset_seconds: f64) -> Self {
        Self {
            anchor: now,
            elapsed_at_anchor: music_time + offset_seconds,
        }
    }

    pub fn elapsed_at(&self, now: Instant) -> f64 {
        self.elapsed_at_anchor + now.saturating_duration_since(self.anchor).as_secs_f64()
    }
}

/// Transport driven by explicit `advance` calls, for headless runs and tests.
/// `startup_latency` models the delay before a real player starts reporting time.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    position: f64,
    playing: bool,
    startup_latency: f64,
}

impl SimulatedTransport {
    pub fn new(startup_latency: f64) -> Self {
        Self {
            position: 0.0,
            playing: false,
            startup_latency: startup_latency.max(0.0),
        }
    }

    pub fn advance(&mut self, dt: f64) {
        if self.playing {
            self.position += dt;
        }
    }
}

impl PlaybackTransport for SimulatedTransport {
    fn current_time_seconds(&self) -> f64 {
        self.position.max(0.0)
    }

    fn play(&mut self) {
        if !self.playing {
            self.playing = true;
            self.position -= self.startup_latency;
        }
    }

    fn stop(&mut self) {
        self.playing = false;
        self.position = 0.0;
    }

    fn seek(&mut self, seconds: f64) {
        self.position = seconds;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}
