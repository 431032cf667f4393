use std::io::Write;
use std::sync::Arc;

use clap::Subcommand;
use pomofocus_core::timer::{format_clock, TimerCheckpoint};
use pomofocus_core::{
    Clock, Config, Database, DatabaseError, Event, SessionRecorder, SystemClock, TimerEngine, TimerRunner,
    TimerSettings, TimerState,
};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

const ENGINE_KEY: &str = "timer_engine";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a session in the current mode
    Start,
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// End the current session early and move to the next mode
    Skip,
    /// Discard the current session without recording it
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Count down in the foreground until the next mode is ready
    Run,
}

fn load_engine(
    db: &Database,
    settings: TimerSettings,
    clock: Arc<dyn Clock>,
) -> Result<TimerEngine, DatabaseError> {
    if let Some(json) = db.kv_get(ENGINE_KEY)? {
        match serde_json::from_str::<TimerCheckpoint>(&json) {
            Ok(checkpoint) => return Ok(TimerEngine::restore(checkpoint, settings, clock)),
            Err(e) => warn!("discarding unreadable timer checkpoint: {e}"),
        }
    }
    Ok(TimerEngine::new(settings, clock))
}

fn save_engine(db: &Database, checkpoint: &TimerCheckpoint) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(checkpoint)?;
    db.kv_set(ENGINE_KEY, &json)?;
    Ok(())
}

/// Bring a restored engine up to date with the wall clock. A session may
/// have run out, and its grace period passed, while no process was alive.
fn catch_up(engine: &mut TimerEngine) -> Vec<Event> {
    let mut events = engine.tick();
    if engine.state() == TimerState::Completed {
        events.extend(engine.tick());
    }
    events
}

fn open() -> pomofocus_core::error::Result<(TimerSettings, Database)> {
    let settings = Config::load()?.timer_settings()?;
    Ok((settings, Database::open()?))
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let (settings, db) = open()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let recorder = SessionRecorder::new(&db, clock.clone());

    let mut engine = load_engine(&db, settings, clock.clone())?;
    let mut events = catch_up(&mut engine);

    match action {
        TimerAction::Start => events.extend(engine.start()),
        TimerAction::Pause => events.extend(engine.pause()),
        TimerAction::Resume => events.extend(engine.resume()),
        TimerAction::Skip => events.extend(engine.skip()),
        TimerAction::Reset => events.extend(engine.reset()),
        TimerAction::Status => {}
        TimerAction::Run => {
            let caught_up_error = recorder.handle_all(&events).err();
            let (checkpoint, foreground_error) = run_foreground(engine, &recorder)?;
            save_engine(&db, &checkpoint)?;
            return match caught_up_error.or(foreground_error) {
                Some(e) => Err(e.into()),
                None => Ok(()),
            };
        }
    }

    // The engine has moved on whether or not the session made it to disk.
    save_engine(&db, &engine.checkpoint())?;
    let recorded = recorder.handle_all(&events);

    events.retain(|e| !matches!(e, Event::Tick { .. }));
    let out = json!({
        "events": events,
        "snapshot": engine.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);

    recorded?;
    Ok(())
}

/// Drive the engine with the async runner, recording and printing events
/// until the session ends and the next mode is ready. Ctrl-C detaches and
/// leaves a running session counting down.
///
/// Returns the final checkpoint together with the first recording failure,
/// if any; a failed insert never stops the countdown.
fn run_foreground(
    engine: TimerEngine,
    recorder: &SessionRecorder<&Database>,
) -> Result<(TimerCheckpoint, Option<DatabaseError>), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let runner = TimerRunner::new(engine);
        let mut rx = runner.subscribe();
        let mut record_error = None;

        match runner.snapshot().await.state {
            TimerState::Idle => {
                runner.start().await;
            }
            TimerState::Paused => {
                runner.resume().await;
            }
            TimerState::Running | TimerState::Completed => runner.attach().await,
        }

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(Event::Tick { remaining_secs, .. }) => {
                        eprint!("\r{}", format_clock(remaining_secs));
                        let _ = std::io::stderr().flush();
                    }
                    Ok(event) => {
                        if let Err(e) = recorder.handle(&event) {
                            warn!("session not recorded, timer continues: {e}");
                            if record_error.is_none() {
                                record_error = Some(e);
                            }
                        }
                        match serde_json::to_string(&event) {
                            Ok(line) => println!("{line}"),
                            Err(e) => warn!("failed to encode event: {e}"),
                        }
                        if matches!(event, Event::ModeChanged { .. } | Event::TimerReset { .. }) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "event receiver lagged"),
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    eprintln!();
                    break;
                }
            }
        }

        runner.shutdown().await;
        Ok::<_, Box<dyn std::error::Error>>((runner.checkpoint().await, record_error))
    })
}
