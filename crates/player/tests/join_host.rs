//! A player tab against a real host, over both transports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fari_domain::{DiceRollKind, PeerId, Session, DEFAULT_POINTS};
use fari_host::api::WsAcceptor;
use fari_host::infrastructure::tick::{IntervalTick, ManualTick};
use fari_host::{App, Services};
use fari_player::infrastructure::websocket::WsDialer;
use fari_player::{PlayerClient, PlayerSync, SessionReplica};
use fari_shared::{encode_session, JoinMeta, MemoryNetwork, PeerAction};

/// Wait until the replica satisfies `check`.
async fn replica_eventually(replica: &SessionReplica, check: impl Fn(&Session) -> bool) -> Session {
    let mut sessions = replica.subscribe();
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let current = sessions.borrow_and_update().clone();
            if let Some(session) = current {
                if check(&session) {
                    return session;
                }
            }
            sessions.changed().await.unwrap();
        }
    })
    .await
    .expect("replica never matched")
}

struct Seat {
    client: PlayerClient,
    replica: Arc<SessionReplica>,
    user_id: PeerId,
    cancel: CancellationToken,
}

async fn join(client: PlayerClient, host: &PeerId, name: &str) -> Seat {
    let connection = client
        .connect(host, JoinMeta::new(name).unwrap())
        .await
        .unwrap();
    let user_id = client.user_id().unwrap();
    let replica = Arc::new(SessionReplica::new());
    let cancel = CancellationToken::new();
    let sync = PlayerSync::new(Arc::clone(&replica), user_id.clone());
    tokio::spawn(sync.run(connection.subscribe(), cancel.clone()));
    Seat {
        client,
        replica,
        user_id,
        cancel,
    }
}

#[tokio::test]
async fn replica_matches_the_host_after_join_and_actions() {
    let network = MemoryNetwork::new();
    let (tick, ticker) = ManualTick::new();
    let app = App::start(Arc::new(network.peer()), Box::new(tick), Services::default())
        .await
        .unwrap();
    let offline = app.store.add_offline_player().unwrap();

    let seat = join(
        PlayerClient::new(Arc::new(network.peer())),
        app.identity(),
        "Magnus",
    )
    .await;
    ticker.tick();

    let replica = replica_eventually(&seat.replica, |s| s.players.len() == 2).await;
    assert_eq!(replica, app.store.snapshot().unwrap());
    let magnus = replica.player(&seat.user_id).unwrap();
    assert!(!magnus.offline);
    assert_eq!(magnus.points, DEFAULT_POINTS);
    assert!(magnus.rolls.is_empty());
    assert!(replica.player(&offline).unwrap().offline);

    let roll = DiceRollKind::FourFate.roll_with(|_| 0);
    seat.client.send_to_host(&PeerAction::Roll(roll.clone())).unwrap();
    seat.client
        .send_to_host(&PeerAction::UpdateFatePoint(1))
        .unwrap();
    seat.client
        .send_to_host(&PeerAction::PlayedInTurnOrder(true))
        .unwrap();

    let replica = replica_eventually(&seat.replica, |s| {
        s.player(&seat.user_id)
            .is_some_and(|p| p.played_during_turn)
    })
    .await;
    let magnus = replica.player(&seat.user_id).unwrap();
    assert_eq!(magnus.rolls, vec![roll]);
    assert_eq!(magnus.points, "1");
    assert_eq!(replica, app.store.snapshot().unwrap());

    seat.cancel.cancel();
    app.dispose().await;
}

#[tokio::test]
async fn rejoining_from_the_same_tab_keeps_the_seat_working() {
    let network = MemoryNetwork::new();
    let (tick, ticker) = ManualTick::new();
    let app = App::start(Arc::new(network.peer()), Box::new(tick), Services::default())
        .await
        .unwrap();

    let seat = join(
        PlayerClient::new(Arc::new(network.peer())),
        app.identity(),
        "Magnus",
    )
    .await;
    ticker.tick();
    replica_eventually(&seat.replica, |s| s.players.len() == 1).await;

    // same transport, so the host sees the same label on a new link
    let connection = seat
        .client
        .connect(app.identity(), JoinMeta::new("Magnus").unwrap())
        .await
        .unwrap();
    assert_eq!(seat.client.user_id(), Some(seat.user_id.clone()));
    let replica = Arc::new(SessionReplica::new());
    let sync = PlayerSync::new(Arc::clone(&replica), seat.user_id.clone());
    tokio::spawn(sync.run(connection.subscribe(), seat.cancel.clone()));
    ticker.tick();

    replica_eventually(&replica, |s| s.players.len() == 1).await;
    seat.client
        .send_to_host(&PeerAction::UpdateFatePoint(2))
        .unwrap();
    let session = replica_eventually(&replica, |s| {
        s.players.first().is_some_and(|p| p.points == "2")
    })
    .await;
    assert_eq!(session.players[0].id, seat.user_id);
    assert_eq!(session, app.store.snapshot().unwrap());

    seat.cancel.cancel();
    app.dispose().await;
}

#[tokio::test]
async fn repeated_broadcasts_do_not_disturb_the_replica() {
    let replica = Arc::new(SessionReplica::new());
    let sync = PlayerSync::new(Arc::clone(&replica), PeerId::new("p1"));
    let mut changes = replica.subscribe();

    let session = Session::new(PeerId::new("gm"));
    let payload = encode_session(&session).unwrap();
    assert!(sync.apply_payload(&payload));
    changes.borrow_and_update();

    assert!(!sync.apply_payload(&payload));
    assert!(!sync.apply_payload(&payload));
    assert!(!changes.has_changed().unwrap());
}

#[tokio::test]
async fn player_joins_over_websocket() {
    let acceptor = Arc::new(WsAcceptor::new(SocketAddr::from(([127, 0, 0, 1], 0))));
    let tick = IntervalTick::every(Duration::from_millis(20));
    let app = App::start(acceptor, Box::new(tick), Services::default())
        .await
        .unwrap();

    let seat = join(
        PlayerClient::new(Arc::new(WsDialer::new())),
        app.identity(),
        "Magnus",
    )
    .await;
    assert!(seat.client.is_connected_to_host());

    replica_eventually(&seat.replica, |s| s.players.len() == 1).await;
    seat.client
        .send_to_host(&PeerAction::UpdateFatePoint(5))
        .unwrap();
    let replica = replica_eventually(&seat.replica, |s| {
        s.players.first().is_some_and(|p| p.points == "5")
    })
    .await;
    assert_eq!(replica.players[0].id, seat.user_id);
    assert_eq!(replica.players[0].player_name, "Magnus");

    seat.client.disconnect();
    seat.cancel.cancel();
    app.dispose().await;
}
