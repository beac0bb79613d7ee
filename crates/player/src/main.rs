//! Fari player - Main entry point.
//!
//! Joins a host, mirrors its session and reads player commands from stdin.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fari_domain::{DiceRollKind, PeerId};
use fari_player::infrastructure::{config::PlayerConfig, websocket::WsDialer};
use fari_player::{PlayerClient, PlayerSync, SessionReplica};
use fari_shared::{roll_dice, JoinMeta, LogConfetti, PeerAction, PeerTransport, SystemRandom};

const HELP: &str = "commands: roll [4dF|1dF|2d6|coin-toss], points <n>, played, status, quit";

#[derive(Debug, PartialEq, Eq)]
enum PlayerCommand {
    Roll(DiceRollKind),
    Points(i32),
    Played,
    Status,
    Quit,
}

fn parse_command(line: &str) -> Result<PlayerCommand, String> {
    let line = line.trim();
    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match head {
        "roll" if rest.is_empty() => Ok(PlayerCommand::Roll(DiceRollKind::FourFate)),
        "roll" => DiceRollKind::from_str(rest)
            .map(PlayerCommand::Roll)
            .map_err(|e| e.to_string()),
        "points" => rest
            .parse()
            .map(PlayerCommand::Points)
            .map_err(|_| format!("Not a number: {rest}")),
        "played" => Ok(PlayerCommand::Played),
        "status" => Ok(PlayerCommand::Status),
        "quit" | "exit" => Ok(PlayerCommand::Quit),
        _ => Err(HELP.to_string()),
    }
}

fn print_status(replica: &SessionReplica, user_id: &PeerId) {
    let Some(session) = replica.snapshot() else {
        println!("Waiting for the host...");
        return;
    };
    for player in session.everyone() {
        let me = if &player.id == user_id { " (you)" } else { "" };
        let played = if player.played_during_turn { " [played]" } else { "" };
        let latest = player
            .latest_roll()
            .map(|roll| format!(" last roll {roll}"))
            .unwrap_or_default();
        println!(
            "{}{me}{played} - {} pts{latest}",
            player.player_name, player.points
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PlayerConfig::from_env().with_args(std::env::args().skip(1));

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host_id = config
        .host_id
        .clone()
        .context("usage: fari-player <HOST_ID> <PLAYER_NAME> (or set FARI_HOST_ID)")?;
    let player_name = config
        .player_name
        .clone()
        .context("usage: fari-player <HOST_ID> <PLAYER_NAME> (or set FARI_PLAYER_NAME)")?;
    let meta = JoinMeta::new(player_name)?;

    let dialer = Arc::new(WsDialer::new());
    let client = PlayerClient::new(dialer.clone());
    let connection = client.connect(&host_id, meta).await?;
    let user_id = client
        .user_id()
        .context("identity lost right after joining")?;

    let replica = Arc::new(SessionReplica::new());
    let cancel = CancellationToken::new();
    let sync = PlayerSync::new(Arc::clone(&replica), user_id.clone())
        .with_confetti(Arc::new(LogConfetti));
    let sync_task = tokio::spawn(sync.run(connection.subscribe(), cancel.clone()));

    println!("Joined as {user_id}");
    println!("{HELP}");

    let random = SystemRandom;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = connection.closed() => {
                println!("The host closed the game.");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let action = match parse_command(&line) {
                    Ok(PlayerCommand::Quit) => break,
                    Ok(PlayerCommand::Status) => {
                        print_status(&replica, &user_id);
                        continue;
                    }
                    Ok(PlayerCommand::Roll(kind)) => {
                        let roll = roll_dice(kind, &random);
                        println!("You rolled {roll}");
                        PeerAction::Roll(roll)
                    }
                    Ok(PlayerCommand::Points(points)) => PeerAction::UpdateFatePoint(points),
                    Ok(PlayerCommand::Played) => {
                        let played = replica
                            .user_character_sheet(&user_id)
                            .is_some_and(|p| p.played_during_turn);
                        PeerAction::PlayedInTurnOrder(!played)
                    }
                    Err(help) => {
                        println!("{help}");
                        continue;
                    }
                };
                if let Err(e) = client.send_to_host(&action) {
                    println!("{e}");
                }
            }
        }
    }

    cancel.cancel();
    client.disconnect();
    dialer.destroy().await;
    if let Err(e) = sync_task.await {
        tracing::error!(error = %e, "Sync task ended abnormally");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_player_commands() {
        assert_eq!(parse_command("roll"), Ok(PlayerCommand::Roll(DiceRollKind::FourFate)));
        assert_eq!(
            parse_command("roll coin-toss"),
            Ok(PlayerCommand::Roll(DiceRollKind::CoinToss))
        );
        assert_eq!(parse_command("points -1"), Ok(PlayerCommand::Points(-1)));
        assert_eq!(parse_command(" played "), Ok(PlayerCommand::Played));
        assert_eq!(parse_command("quit"), Ok(PlayerCommand::Quit));
    }

    #[test]
    fn bad_input_is_explained() {
        assert_eq!(parse_command("points lots"), Err("Not a number: lots".to_string()));
        assert_eq!(parse_command("dance"), Err(HELP.to_string()));
    }
}
