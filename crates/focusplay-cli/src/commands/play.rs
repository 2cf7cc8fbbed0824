//! Interactive play area for CLI.
//!
//! Events are printed to stdout as JSON lines. Commands are read from stdin,
//! one per line.

use clap::Args;
use focusplay_core::{
    AlertPromptController, AlertResponse, ChannelSink, Config, Database, Event, FocusSession,
    PlayArea, StatsRecord, TimerMode,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Args)]
pub struct PlayArgs {
    /// Project the session and its stats belong to
    #[arg(long)]
    project: Option<String>,
    /// Task name shown in alert prompts
    #[arg(long, default_value = "Focus")]
    task: String,
    /// Do not print per-second tick events
    #[arg(long)]
    quiet_ticks: bool,
}

enum Flow {
    Continue,
    Quit,
}

pub fn run(args: PlayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(play(args))
}

async fn play(args: PlayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let db = Database::open()?;
    let (sink, mut records) = ChannelSink::new();

    let mut session = FocusSession::new(config.timer_settings())?.with_sink(sink.clone());
    let mut alerts = AlertPromptController::new(config.alerts.default_response).with_sink(sink);
    if let Some(project) = &args.project {
        session = session.with_project(project.clone());
        alerts = alerts.with_project(project.clone());
    }

    let (area, mut events) = PlayArea::mount(session, alerts, config.alert_schedule(), args.task);
    tracing::info!(project = ?args.project, "play area ready");
    print_event(&area.snapshot(), false);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => print_event(&event, args.quiet_ticks),
            Some(record) = records.recv() => store(&db, &record),
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Flow::Quit = handle_command(&area, line.trim()) {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(%err, "stdin unreadable; ending session");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    area.unmount().await;
    while let Ok(event) = events.try_recv() {
        print_event(&event, args.quiet_ticks);
    }
    drain_records(&db, &mut records).await;
    Ok(())
}

fn handle_command(area: &PlayArea, line: &str) -> Flow {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let result = match command {
        "" => Ok(()),
        "start" | "s" => {
            area.start();
            Ok(())
        }
        "pause" | "p" => {
            area.pause();
            Ok(())
        }
        "reset" | "r" => {
            area.reset();
            Ok(())
        }
        "mode" => match rest.parse::<TimerMode>() {
            Ok(mode) => area.set_mode(mode).map_err(|e| e.to_string()),
            Err(e) => Err(e),
        },
        "focused" | "deviated" | "f" | "d" => match command.parse::<AlertResponse>() {
            Ok(response) => area.respond(response).map_err(|e| e.to_string()),
            Err(e) => Err(e),
        },
        "task" if !rest.is_empty() => {
            area.set_task_name(rest);
            Ok(())
        }
        "alert" => area.prompt_now().map_err(|e| e.to_string()),
        "reload" => Config::load()
            .and_then(|config| {
                area.reconfigure(config.timer_settings(), config.alerts.default_response)
            })
            .map_err(|e| e.to_string()),
        "status" => {
            print_event(&area.snapshot(), false);
            Ok(())
        }
        "quit" | "q" | "exit" => return Flow::Quit,
        other => Err(format!("unknown command: {other}")),
    };

    if let Err(message) = result {
        println!("{}", json!({ "type": "Error", "message": message }));
    }
    Flow::Continue
}

fn print_event(event: &Event, quiet_ticks: bool) {
    if quiet_ticks && event.is_tick() {
        return;
    }
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(err) => tracing::warn!(%err, "event not serializable"),
    }
}

fn store(db: &Database, record: &StatsRecord) {
    if let Err(err) = db.record(record) {
        tracing::warn!(%err, "stats record dropped");
    }
}

/// Both controllers are gone once unmount returns, so the channel closes
/// after the last pending record.
async fn drain_records(db: &Database, records: &mut mpsc::UnboundedReceiver<StatsRecord>) {
    while let Some(record) = records.recv().await {
        store(db, &record);
    }
}
