//! The WebSocket acceptor driven by a real WebSocket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use fari_domain::{DiceRollKind, PeerId};
use fari_host::api::WsAcceptor;
use fari_host::infrastructure::tick::ManualTick;
use fari_host::{App, Services};
use fari_shared::{decode_session, AcceptConnections, PeerAction};

#[tokio::test]
async fn player_joins_over_websocket_and_rolls() {
    let acceptor = Arc::new(WsAcceptor::new(SocketAddr::from(([127, 0, 0, 1], 0))));
    let (tick, ticker) = ManualTick::new();
    let app = App::start(acceptor, Box::new(tick), Services::default())
        .await
        .unwrap();

    let url = format!("{}?label=p-1&playerName=Magnus", app.identity());
    let (mut socket, _) = connect_async(url.as_str()).await.unwrap();

    // the upgrade completes on the server shortly after the handshake
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            ticker.tick();
            let joined = app
                .store
                .snapshot()
                .is_some_and(|s| s.player(&PeerId::new("p-1")).is_some());
            if joined {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Message::Text(payload) = first else {
        panic!("expected a text frame, got {first:?}");
    };
    let replica = decode_session(&payload).unwrap();
    assert_eq!(replica.players[0].player_name, "Magnus");

    let roll = DiceRollKind::TwoSixSided.roll_with(|_| 5);
    socket
        .send(Message::Text(PeerAction::Roll(roll.clone()).to_payload().unwrap()))
        .await
        .unwrap();

    let rolled = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Message::Text(payload) = rolled else {
        panic!("expected a text frame, got {rolled:?}");
    };
    let replica = decode_session(&payload).unwrap();
    assert_eq!(replica.players[0].rolls[0].total, 12);

    app.dispose().await;
}

#[tokio::test]
async fn unknown_session_is_rejected() {
    let acceptor = Arc::new(WsAcceptor::new(SocketAddr::from(([127, 0, 0, 1], 0))));
    let (tick, _ticker) = ManualTick::new();
    let app = App::start(acceptor, Box::new(tick), Services::default())
        .await
        .unwrap();

    let identity = app.identity().to_string();
    let base = identity.rsplit_once('/').unwrap().0;
    let url = format!("{base}/not-this-one?label=p-1&playerName=Magnus");
    assert!(connect_async(url.as_str()).await.is_err());

    app.dispose().await;
}

#[tokio::test]
async fn rejoining_with_the_same_label_replaces_the_old_socket() {
    let acceptor = Arc::new(WsAcceptor::new(SocketAddr::from(([127, 0, 0, 1], 0))));
    let (tick, ticker) = ManualTick::new();
    let app = App::start(acceptor.clone(), Box::new(tick), Services::default())
        .await
        .unwrap();
    let url = format!("{}?label=p-1&playerName=Magnus", app.identity());

    let (mut first, _) = connect_async(url.as_str()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while acceptor.connections().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let (mut second, _) = connect_async(url.as_str()).await.unwrap();

    // the host closes the stale socket once the new one is registered
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match first.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .unwrap();
    let connections = acceptor.connections();
    assert_eq!(connections.len(), 1);
    assert!(connections[0].is_open());
    assert_eq!(connections[0].label(), &PeerId::new("p-1"));

    ticker.tick();
    let joined = tokio::time::timeout(Duration::from_secs(2), second.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Message::Text(payload) = joined else {
        panic!("expected a text frame, got {joined:?}");
    };
    assert_eq!(decode_session(&payload).unwrap().players.len(), 1);

    second
        .send(Message::Text(PeerAction::UpdateFatePoint(4).to_payload().unwrap()))
        .await
        .unwrap();
    let updated = tokio::time::timeout(Duration::from_secs(2), second.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Message::Text(payload) = updated else {
        panic!("expected a text frame, got {updated:?}");
    };
    assert_eq!(decode_session(&payload).unwrap().players[0].points, "4");

    app.dispose().await;
}
