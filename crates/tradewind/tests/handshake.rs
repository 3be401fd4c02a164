//! Connection setup: versions, names, and the order of the first frames.

mod common;

use common::*;
use tradewind::prelude::*;
use tradewind_protocol::{JoinGame, MessageRegistry, Name, PeerVersion, Text, status};
use tradewind_transport::Connection;

fn read(conn: &dyn Connection, codec: &MessageRegistry) -> Message {
    let line = conn.recv().unwrap().expect("connection ended");
    codec.decode(&line).unwrap()
}

#[test]
fn test_join_auth_arrives_before_game_state() {
    let registry = LocalRegistry::new();
    let handle = local_server(&registry, "handshake", ServerConfig::default());
    let codec = MessageRegistry::standard();

    let conn = registry.connect("handshake").unwrap();
    assert!(conn.is_accepted());
    assert!(eventually(|| handle.connection_count() == 1));

    let version = PeerVersion::current().to_message();
    conn.send(&Message::from(version).encode()).unwrap();
    conn.send(
        &Message::from(JoinGame {
            game: GameName::new("harbor").unwrap(),
            nickname: Name::new("ann").unwrap(),
            password: Text::empty(),
        })
        .encode(),
    )
    .unwrap();

    let mut seen = Vec::new();
    loop {
        let m = read(&conn, &codec);
        let done = matches!(m, Message::GameStateMsg(_));
        seen.push(m);
        if done {
            break;
        }
    }
    assert!(matches!(seen[0], Message::Version(_)));
    assert!(matches!(seen[1], Message::Games(_)));
    let auth = seen
        .iter()
        .position(|m| matches!(m, Message::JoinGameAuth(_)))
        .expect("no JoinGameAuth");
    let members = seen
        .iter()
        .position(|m| matches!(m, Message::GameMembers(_)))
        .expect("no GameMembers");
    assert!(auth < members);
    assert_eq!(handle.games(), vec![GameName::new("harbor").unwrap()]);

    conn.disconnect();
    assert!(eventually(|| handle.connection_count() == 0));
}

#[test]
fn test_client_records_server_version() {
    let registry = LocalRegistry::new();
    let _handle = local_server(&registry, "version", ServerConfig::default());
    let (client, _rx) = connect(&registry, "version", "ann");
    assert!(eventually(|| client.server_version().is_some()));
    assert_eq!(client.server_version(), Some(PeerVersion::current()));
}

#[test]
fn test_second_connection_cannot_take_a_used_name() {
    let registry = LocalRegistry::new();
    let _handle = local_server(&registry, "names", ServerConfig::default());
    let (ann, ann_rx) = connect(&registry, "names", "ann");
    join(&ann, &ann_rx, "harbor");

    let (imposter, rx) = connect(&registry, "names", "ann");
    imposter.join("harbor").unwrap();
    let refused = wait_for(&rx, |m| matches!(m, Message::StatusMessage(_)));
    let Message::StatusMessage(refused) = refused else {
        unreachable!()
    };
    assert_eq!(refused.status, status::NAME_IN_USE);
    assert!(imposter.games().is_empty());
}

#[test]
fn test_members_see_each_other_join_and_leave() {
    let registry = LocalRegistry::new();
    let _handle = local_server(&registry, "members", ServerConfig::default());
    let (ann, ann_rx) = connect(&registry, "members", "ann");
    let (bob, bob_rx) = connect(&registry, "members", "bob");
    let game = join(&ann, &ann_rx, "harbor");
    join(&bob, &bob_rx, "harbor");

    wait_for(&ann_rx, |m| matches!(m, Message::JoinGame(j) if j.nickname.as_str() == "bob"));
    let members = ann
        .shadow(&game, |s| s.members().iter().map(|n| n.as_str().to_string()).collect::<Vec<_>>())
        .unwrap();
    assert_eq!(members, vec!["ann".to_string(), "bob".to_string()]);

    bob.leave(&game).unwrap();
    wait_for(&ann_rx, |m| matches!(m, Message::LeaveGame(l) if l.nickname.as_str() == "bob"));
    assert_eq!(ann.shadow(&game, |s| s.members().len()), Some(1));
}
