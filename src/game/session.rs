use crate::core::playback::{PlaybackTransport, SongClock};
use crate::game::gameplay::{Outcome, Round};
use crate::game::scores::StatsSink;
use log::{debug, info};
use std::time::Instant;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    /// `play` was issued but the transport has not reported a position yet.
    WaitingForAudio,
    Playing,
    GameOver,
}

/// All rounds sharing one song: owns the transport, anchors the song clock
/// once audio is actually running and ticks every round from the same clock.
pub struct Session<T> {
    rounds: Vec<Round>,
    transport: T,
    offset_seconds: f64,
    clock: Option<SongClock>,
    phase: SessionPhase,
    reported: Vec<bool>,
}

impl<T: PlaybackTransport> Session<T> {
    /// `offset_seconds` is the chart offset added to the music position.
    pub fn new(transport: T, offset_seconds: f64) -> Self {
        Self {
            rounds: Vec::new(),
            transport,
            offset_seconds,
            clock: None,
            phase: SessionPhase::Idle,
            reported: Vec::new(),
        }
    }

    pub fn add_round(&mut self, round: Round) -> usize {
        self.rounds.push(round);
        self.reported.push(false);
        self.rounds.len() - 1
    }

    pub fn start(&mut self) {
        if self.phase != SessionPhase::Idle {
            return;
        }
        info!(
            "Session starting with {} round(s), offset {:.3}s.",
            self.rounds.len(),
            self.offset_seconds
        );
        self.transport.play();
        self.phase = SessionPhase::WaitingForAudio;
    }

    /// Drives one frame. Sends each round's summary to `sink` the frame it
    /// ends, unless the round is in training mode.
    pub fn update(&mut self, now: Instant, sink: &mut dyn StatsSink) -> SessionPhase {
        match self.phase {
            SessionPhase::Idle | SessionPhase::GameOver => return self.phase,
            SessionPhase::WaitingForAudio => {
                let music_time = self.transport.current_time_seconds();
                if music_time <= 0.0 {
                    return self.phase;
                }
                debug!("Audio running at {:.3}s; anchoring song clock.", music_time);
                self.clock = Some(SongClock::anchor(now, music_time, self.offset_seconds));
                self.phase = SessionPhase::Playing;
            }
            SessionPhase::Playing => {}
        }

        let Some(elapsed) = self.elapsed(now) else {
            return self.phase;
        };
        for (round, reported) in self.rounds.iter_mut().zip(self.reported.iter_mut()) {
            if round.tick(elapsed) == Outcome::InProgress || *reported {
                continue;
            }
            *reported = true;
            if !round.is_training() {
                sink.record_round(&round.summary());
            }
        }

        if self.rounds.iter().all(|r| r.outcome() != Outcome::InProgress) {
            info!("Game over at {:.3}s.", elapsed);
            self.phase = SessionPhase::GameOver;
        }
        self.phase
    }

    /// Song time at `now`, once the clock is anchored.
    pub fn elapsed(&self, now: Instant) -> Option<f64> {
        self.clock.map(|clock| clock.elapsed_at(now))
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn rounds_mut(&mut self) -> &mut [Round] {
        &mut self.rounds
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Stops playback. Rounds keep their final state for the results screen.
    pub fn teardown(&mut self) {
        if self.transport.is_playing() {
            self.transport.stop();
        }
        self.clock = None;
        if self.phase != SessionPhase::GameOver {
            self.phase = SessionPhase::Idle;
        }
        info!("Session torn down.");
    }
}
