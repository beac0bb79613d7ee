//! Fari host - Main entry point.
//!
//! Starts a game, prints the identity players join with and reads GM
//! commands from stdin.

use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fari_domain::{AspectId, DiceRollKind, PeerId};
use fari_host::api::WsAcceptor;
use fari_host::infrastructure::{config::HostConfig, tick::IntervalTick};
use fari_host::{App, Services};

const HELP: &str = "commands: roll [4dF|1dF|2d6|coin-toss], offline, remove <player-id>, \
aspect <title>, confetti, cannon, reset-initiative, reset, players, quit";

#[derive(Debug, PartialEq, Eq)]
enum GmCommand {
    Roll(DiceRollKind),
    AddOffline,
    Remove(PeerId),
    Aspect(String),
    Confetti,
    Cannon,
    ResetInitiative,
    Reset,
    Players,
    Quit,
}

fn parse_command(line: &str) -> Result<GmCommand, String> {
    let line = line.trim();
    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match head {
        "roll" if rest.is_empty() => Ok(GmCommand::Roll(DiceRollKind::FourFate)),
        "roll" => DiceRollKind::from_str(rest)
            .map(GmCommand::Roll)
            .map_err(|e| e.to_string()),
        "offline" => Ok(GmCommand::AddOffline),
        "remove" if !rest.is_empty() => Ok(GmCommand::Remove(PeerId::new(rest))),
        "aspect" if !rest.is_empty() => Ok(GmCommand::Aspect(rest.to_string())),
        "confetti" => Ok(GmCommand::Confetti),
        "cannon" => Ok(GmCommand::Cannon),
        "reset-initiative" => Ok(GmCommand::ResetInitiative),
        "reset" => Ok(GmCommand::Reset),
        "players" => Ok(GmCommand::Players),
        "quit" | "exit" => Ok(GmCommand::Quit),
        _ => Err(HELP.to_string()),
    }
}

fn run_command(app: &App, command: GmCommand) {
    match command {
        GmCommand::Roll(kind) => {
            let roll = app.roll_for_gm(kind);
            println!("GM rolled {roll}");
        }
        GmCommand::AddOffline => {
            if let Some(id) = app.store.add_offline_player() {
                println!("Offline player added: {id}");
            }
        }
        GmCommand::Remove(id) => {
            if app.store.remove_player(&id) {
                println!("Removed {id}");
            } else {
                println!("No player {id}");
            }
        }
        GmCommand::Aspect(title) => {
            let id: Option<AspectId> = app.store.add_aspect();
            if let Some(id) = id {
                app.store.update_aspect_title(&id, title);
                println!("Aspect added: {id}");
            }
        }
        GmCommand::Confetti => {
            app.store.fire_good_confetti();
        }
        GmCommand::Cannon => {
            app.store.fire_bad_confetti();
        }
        GmCommand::ResetInitiative => {
            app.store.reset_initiative();
        }
        GmCommand::Reset => {
            app.store.reset();
        }
        GmCommand::Players => print_players(app),
        GmCommand::Quit => {}
    }
}

fn print_players(app: &App) {
    let Some(session) = app.store.snapshot() else {
        return;
    };
    for player in session.everyone() {
        let status = if player.offline { " (offline)" } else { "" };
        let played = if player.played_during_turn { " [played]" } else { "" };
        let latest = player
            .latest_roll()
            .map(|roll| format!(" last roll {roll}"))
            .unwrap_or_default();
        println!(
            "{} {}{status}{played} - {} pts{latest}",
            player.id, player.player_name, player.points
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = HostConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Fari host");

    let transport = Arc::new(WsAcceptor::new(config.bind_addr));
    let tick = Box::new(IntervalTick::every(config.poll_interval));
    let app = App::start(transport, tick, Services::default()).await?;

    println!("Share this link with your players:");
    println!("{}", app.identity());
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(GmCommand::Quit) => break,
                    Ok(command) => run_command(&app, command),
                    Err(help) => println!("{help}"),
                }
            }
        }
    }

    app.dispose().await;
    Ok(())
}
