//! Integration tests for the reader thread, routing and capped queues,
//! driven over the in-process transport.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tradewind_game::{GameState, Seat};
use tradewind_protocol::{
    Codec, GameName, GameStateMsg, JoinGameAuth, Message, MessageRegistry, PeerVersion,
    ServerPing, Turn, WireMessage,
};
use tradewind_session::{
    CappedQueue, ConnectionRegistry, Handler, QueueError, Route, RoutingTable, SessionError,
    spawn_reader,
};
use tradewind_transport::{Connection, LocalConnection, LocalRegistry, Transport};

// =========================================================================
// Helpers
// =========================================================================

fn pair(port: &str) -> (Arc<dyn Connection>, LocalConnection) {
    let registry = LocalRegistry::new();
    let listener = registry.bind(port, 2).unwrap();
    let client = {
        let registry = registry.clone();
        let port = port.to_string();
        thread::spawn(move || registry.connect(&port).unwrap())
    };
    let server_end: Arc<dyn Connection> = Arc::new(listener.accept().unwrap());
    (server_end, client.join().unwrap())
}

fn game() -> GameName {
    GameName::new("harbor").unwrap()
}

#[derive(Debug, PartialEq)]
enum Event {
    First(Message),
    Message(Message),
    Lost(Option<String>),
}

struct Recorder(Mutex<mpsc::Sender<Event>>);

impl Handler for Recorder {
    fn on_first(&self, _conn: &Arc<dyn Connection>, message: Message) {
        let _ = self.0.lock().unwrap().send(Event::First(message));
    }

    fn on_message(&self, _conn: &Arc<dyn Connection>, message: Message) {
        let _ = self.0.lock().unwrap().send(Event::Message(message));
    }

    fn on_lost(&self, _conn: &Arc<dyn Connection>, error: Option<String>) {
        let _ = self.0.lock().unwrap().send(Event::Lost(error));
    }
}

fn recorder() -> (Arc<Recorder>, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel();
    (Arc::new(Recorder(Mutex::new(tx))), rx)
}

fn codec() -> Arc<dyn Codec> {
    Arc::new(MessageRegistry::standard())
}

const WAIT: Duration = Duration::from_secs(5);

// =========================================================================
// Reader thread
// =========================================================================

#[test]
fn test_reader_separates_first_message() {
    let (server_end, client_end) = pair("first");
    let (handler, events) = recorder();
    let reader = spawn_reader(Arc::clone(&server_end), codec(), handler).unwrap();

    let version = PeerVersion::current().to_message();
    client_end.send(&version.encode()).unwrap();
    let ping = ServerPing { sleep_time: 30 };
    client_end.send(&ping.encode()).unwrap();
    client_end.disconnect();

    assert_eq!(
        events.recv_timeout(WAIT).unwrap(),
        Event::First(version.into())
    );
    assert_eq!(
        events.recv_timeout(WAIT).unwrap(),
        Event::Message(ping.into())
    );
    assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Lost(None));
    reader.join().unwrap();
    assert!(server_end.is_closed());
}

#[test]
fn test_reader_survives_garbage_frames() {
    let (server_end, client_end) = pair("garbage");
    let (handler, events) = recorder();
    let reader = spawn_reader(server_end, codec(), handler).unwrap();

    for junk in ["", "abc", "1026|harbor", "4242|x", "1013|,,,,,,"] {
        client_end.send(junk).unwrap();
    }
    let ping = ServerPing { sleep_time: 1 };
    client_end.send(&ping.encode()).unwrap();
    client_end.disconnect();

    // Garbage never counts as the first message.
    assert_eq!(
        events.recv_timeout(WAIT).unwrap(),
        Event::First(ping.into())
    );
    assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Lost(None));
    reader.join().unwrap();
}

#[test]
fn test_reader_reports_lost_exactly_once_on_local_disconnect() {
    let (server_end, _client_end) = pair("once");
    let (handler, events) = recorder();
    let reader = spawn_reader(Arc::clone(&server_end), codec(), handler).unwrap();
    server_end.disconnect();
    server_end.disconnect();
    reader.join().unwrap();
    assert_eq!(events.recv_timeout(WAIT).unwrap(), Event::Lost(None));
    assert!(events.try_recv().is_err());
}

// =========================================================================
// Routing into a capped queue
// =========================================================================

/// Handles direct messages inline and queues the rest.
struct Router {
    table: RoutingTable,
    queue: Arc<CappedQueue<Message>>,
    direct: Mutex<Vec<Message>>,
}

impl Handler for Router {
    fn on_message(&self, _conn: &Arc<dyn Connection>, message: Message) {
        match self.table.route_of(&message) {
            Route::Direct => self.direct.lock().unwrap().push(message),
            Route::Queue => {
                let _ = self.queue.deposit_blocking(message);
            }
            Route::Drop => {}
        }
    }

    fn on_lost(&self, _conn: &Arc<dyn Connection>, _error: Option<String>) {
        self.queue.close();
    }
}

#[test]
fn test_robot_routing_preserves_order_through_queue() {
    let (server_end, client_end) = pair("robot");
    let router = Arc::new(Router {
        table: RoutingTable::robot(),
        queue: Arc::new(CappedQueue::new(2)),
        direct: Mutex::new(Vec::new()),
    });
    let reader = spawn_reader(server_end, codec(), router.clone()).unwrap();

    let auth = JoinGameAuth { game: game() };
    client_end.send(&auth.encode()).unwrap();
    let mut expected = Vec::new();
    for seat in 0..4 {
        let turn = Turn {
            game: game(),
            seat: Seat(seat),
            state: GameState::RollOrCard,
        };
        client_end.send(&turn.encode()).unwrap();
        expected.push(Message::from(turn));
    }
    let state = GameStateMsg {
        game: game(),
        state: GameState::Over,
    };
    client_end.send(&state.encode()).unwrap();
    expected.push(state.into());
    client_end.disconnect();

    // The queue holds two at a time; the reader blocks until we take.
    let mut taken = Vec::new();
    while let Some(message) = router.queue.take() {
        taken.push(message);
    }
    reader.join().unwrap();
    assert_eq!(taken, expected);
    assert_eq!(*router.direct.lock().unwrap(), vec![Message::from(auth)]);
}

#[test]
fn test_full_queue_never_grows() {
    let queue = CappedQueue::new(3);
    let mut refused = 0;
    for i in 0..10 {
        if queue.deposit(i) == Err(QueueError::Full) {
            refused += 1;
        }
    }
    assert_eq!(refused, 7);
    assert_eq!(queue.len(), 3);
}

// =========================================================================
// Connection registry
// =========================================================================

#[test]
fn test_registry_tracks_names_and_versions() {
    let (server_end, _client_end) = pair("registry");
    let registry = ConnectionRegistry::new();
    let id = server_end.id();
    registry.register(Arc::clone(&server_end));
    assert!(!registry.version(id).supports_player_elements());

    registry.set_version(id, PeerVersion::current()).unwrap();
    assert!(registry.version(id).supports_decline());

    let alice = tradewind_protocol::Name::new("alice").unwrap();
    registry.claim_name(id, &alice).unwrap();
    registry.claim_name(id, &alice).unwrap();
    assert_eq!(server_end.name().as_deref(), Some("alice"));
    assert_eq!(registry.by_name("alice"), Some(id));

    let (other, _other_client) = pair("registry2");
    registry.register(Arc::clone(&other));
    assert!(matches!(
        registry.claim_name(other.id(), &alice),
        Err(SessionError::NameInUse(_))
    ));

    registry.join_game(id, &game()).unwrap();
    assert!(registry.info(id).unwrap().games.contains(&game()));
    let info = registry.remove(id).unwrap();
    assert_eq!(info.nickname, Some(alice));
    assert_eq!(registry.by_name("alice"), None);
}

#[test]
fn test_registry_refuses_updates_after_removal() {
    let (server_end, _client_end) = pair("gone");
    let registry = ConnectionRegistry::new();
    let id = server_end.id();
    registry.register(Arc::clone(&server_end));
    registry.remove(id).unwrap();

    assert!(matches!(
        registry.set_version(id, PeerVersion::current()),
        Err(SessionError::NotFound(_))
    ));
    assert!(matches!(
        registry.mark_robot(id),
        Err(SessionError::NotFound(_))
    ));
    assert!(!registry.is_robot(id));
    assert!(!registry.version(id).supports_decline());
}
