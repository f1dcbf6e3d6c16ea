use crate::autoplay::AutoPlayer;
use crate::song::SongFile;
use dancejudge::config;
use dancejudge::core::gamepad::ButtonPad;
use dancejudge::core::playback::SimulatedTransport;
use dancejudge::game::gameplay::{Round, RoundEvent};
use dancejudge::game::scores::LogSink;
use dancejudge::game::session::{Session, SessionPhase};
use dancejudge::game::timeline::StepTimeline;
use log::{error, info, warn, LevelFilter};
use std::cell::Cell;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod autoplay;
mod song;

const FRAME_SECONDS: f64 = 1.0 / 60.0;
const STARTUP_LATENCY_SECONDS: f64 = 0.1;
const AUTOPLAY_JITTER_SECONDS: f64 = 0.04;
/// How long to keep running past the last arrow before giving up.
const TRAILING_SECONDS: f64 = 5.0;

fn main() -> Result<(), Box<dyn Error>> {
    // --- Logging Setup ---
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .filter_module("dancejudge::game::gameplay", LevelFilter::Info) // Debug shows every judgement
        .filter_module("dancejudge::config", LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(song_path) = args.next() else {
        error!("Usage: dancejudge <song.json> [config.ini] [chart]");
        return Err("missing song file argument".into());
    };
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let wanted_chart = args.next();

    // --- Config & Song ---
    config::load(&config_path);
    let cfg = config::get();

    let song = SongFile::load(Path::new(&song_path))?;
    let tempo = Arc::new(song.tempo_map()?);
    let chart = song
        .chart(wanted_chart.as_deref())
        .ok_or("no matching chart in song file")?;
    let timeline = StepTimeline::from_chart(&chart.step_chart())?;
    info!(
        "Playing '{}' [{} {}], {} arrows, max BPM {:.1}.",
        song.title,
        chart.difficulty,
        chart.meter,
        timeline.len(),
        tempo.max_bpm()
    );

    // --- Session Setup ---
    let song_time = Rc::new(Cell::new(0.0));
    let end_seconds = tempo.time_at(timeline.last_beat()) + TRAILING_SECONDS;
    let mut session = Session::new(SimulatedTransport::new(STARTUP_LATENCY_SECONDS), song.offset);
    for player in &cfg.players {
        let autoplay = AutoPlayer::new(
            &tempo,
            timeline.arrows(),
            &player.button_bindings,
            AUTOPLAY_JITTER_SECONDS,
            Rc::clone(&song_time),
        );
        let pad = ButtonPad::new(autoplay, player.button_bindings.clone());
        info!("Adding '{}' on simulated pad (gamepad #{:?} in config).", player.name, player.pad_index);
        session.add_round(Round::new(
            &player.name,
            &chart.name,
            Arc::clone(&tempo),
            timeline.clone(),
            Box::new(pad),
            cfg.judge,
        ));
    }
    session.start();

    // --- Frame Loop ---
    let base = Instant::now();
    let mut log_sink = LogSink;
    let mut frame: u64 = 0;
    loop {
        frame += 1;
        let now = base + Duration::from_secs_f64(frame as f64 * FRAME_SECONDS);
        session.transport_mut().advance(FRAME_SECONDS);
        song_time.set(session.elapsed(now).unwrap_or(0.0));

        let phase = session.update(now, &mut log_sink);
        for round in session.rounds_mut() {
            for event in round.drain_events() {
                match event {
                    RoundEvent::InputLost => warn!("{}: input lost.", round.player()),
                    RoundEvent::InputRestored => info!("{}: input restored.", round.player()),
                    _ => {}
                }
            }
        }

        if phase == SessionPhase::GameOver {
            break;
        }
        if session.elapsed(now).is_some_and(|t| t > end_seconds) {
            warn!("Song ran {:.1}s past its last arrow without ending; stopping.", TRAILING_SECONDS);
            break;
        }
    }
    session.teardown();
    info!("Ran {} frames.", frame);

    // --- Results ---
    for round in session.rounds() {
        println!("{}", serde_json::to_string_pretty(&round.summary())?);
    }

    info!("Application exited gracefully.");
    Ok(())
}
