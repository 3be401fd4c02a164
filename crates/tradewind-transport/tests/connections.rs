//! Integration tests for both transports.
//!
//! Each test drives a real accept/connect pair on separate threads and
//! checks the lifecycle contract from both ends.

use std::sync::Arc;
use std::thread;

use tradewind_transport::{
    CannotConnect, Connection, LinkState, LocalConnection, LocalRegistry, Transport,
    TransportError,
};

// =========================================================================
// In-process transport
// =========================================================================

fn local_pair(registry: &LocalRegistry, port: &str) -> (LocalConnection, LocalConnection) {
    let listener = registry.bind(port, 4).unwrap();
    let client = {
        let registry = registry.clone();
        let port = port.to_string();
        thread::spawn(move || registry.connect(&port).unwrap())
    };
    let server_end = listener.accept().unwrap();
    let client_end = client.join().unwrap();
    (server_end, client_end)
}

#[test]
fn test_local_accept_marks_both_ends_accepted() {
    let registry = LocalRegistry::new();
    let (server_end, client_end) = local_pair(&registry, "accept");
    assert!(server_end.is_accepted());
    assert!(client_end.is_accepted());
    assert_eq!(server_end.state(), LinkState::Connected);
}

#[test]
fn test_local_frames_flow_both_ways_in_order() {
    let registry = LocalRegistry::new();
    let (server_end, client_end) = local_pair(&registry, "flow");
    for i in 0..50 {
        client_end.send(&format!("c{i}")).unwrap();
        server_end.send(&format!("s{i}")).unwrap();
    }
    for i in 0..50 {
        assert_eq!(server_end.recv().unwrap(), Some(format!("c{i}")));
        assert_eq!(client_end.recv().unwrap(), Some(format!("s{i}")));
    }
}

#[test]
fn test_local_disconnect_twice_notifies_peer_once() {
    let registry = LocalRegistry::new();
    let (server_end, client_end) = local_pair(&registry, "twice");
    client_end.send("last words").unwrap();
    client_end.disconnect();
    client_end.disconnect();
    assert!(client_end.is_closed());
    assert!(client_end.send("more").is_err());

    assert_eq!(server_end.recv().unwrap().as_deref(), Some("last words"));
    assert_eq!(server_end.recv().unwrap(), None);
    assert!(server_end.is_closed());
    // Nothing else arrives after the single marker.
    assert_eq!(server_end.recv().unwrap(), None);
}

#[test]
fn test_local_soft_disconnect_drains_outbound() {
    let registry = LocalRegistry::new();
    let (server_end, client_end) = local_pair(&registry, "soft");
    server_end.send("a").unwrap();
    server_end.send("b").unwrap();
    server_end.disconnect_soft();
    assert!(server_end.recv().unwrap().is_none());
    assert_eq!(client_end.recv().unwrap().as_deref(), Some("a"));
    assert_eq!(client_end.recv().unwrap().as_deref(), Some("b"));
    assert_eq!(client_end.recv().unwrap(), None);
}

#[test]
fn test_local_disconnect_interrupts_blocked_reader() {
    let registry = LocalRegistry::new();
    let (server_end, _client_end) = local_pair(&registry, "interrupt");
    let server_end = Arc::new(server_end);
    let reader = {
        let conn = Arc::clone(&server_end);
        thread::spawn(move || conn.recv())
    };
    server_end.disconnect();
    assert!(reader.join().unwrap().unwrap().is_none());
}

#[test]
fn test_local_full_backlog_refuses_connect() {
    let registry = LocalRegistry::new();
    let listener = registry.bind("full", 1).unwrap();
    // Nobody accepts: one client fills the backlog and waits, the other is
    // refused. Which is which depends on scheduling.
    let (tx, rx) = std::sync::mpsc::channel();
    for _ in 0..2 {
        let registry = registry.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            let _ = tx.send(registry.connect("full").map(|_| ()));
        });
    }
    assert!(matches!(
        rx.recv().unwrap(),
        Err(TransportError::CannotConnect {
            reason: CannotConnect::Full,
            ..
        })
    ));
    drop(listener);
    assert!(matches!(
        rx.recv().unwrap(),
        Err(TransportError::CannotConnect {
            reason: CannotConnect::Closed,
            ..
        })
    ));
}

#[test]
fn test_local_connect_after_shutdown_not_found() {
    let registry = LocalRegistry::new();
    let listener = registry.bind("gone", 2).unwrap();
    listener.shutdown().unwrap();
    assert!(matches!(
        registry.connect("gone"),
        Err(TransportError::CannotConnect {
            reason: CannotConnect::NotFound,
            ..
        })
    ));
    assert!(matches!(listener.accept(), Err(TransportError::Shutdown)));
}

#[test]
fn test_local_name_set_once() {
    let registry = LocalRegistry::new();
    let (server_end, _client_end) = local_pair(&registry, "name");
    server_end.set_name("alice").unwrap();
    assert!(matches!(
        server_end.set_name("bob"),
        Err(TransportError::NameAlreadySet)
    ));
    assert_eq!(server_end.name().as_deref(), Some("alice"));
}

// =========================================================================
// TCP transport
// =========================================================================

#[cfg(feature = "tcp")]
mod tcp {
    use super::*;
    use tradewind_transport::{TcpConnection, TcpTransport};

    fn tcp_pair() -> (TcpConnection, TcpConnection) {
        let transport = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = transport.local_addr();
        let client = thread::spawn(move || TcpConnection::connect(addr).unwrap());
        let server_end = transport.accept().unwrap();
        (server_end, client.join().unwrap())
    }

    #[test]
    fn test_tcp_frames_flow_both_ways() {
        let (server_end, client_end) = tcp_pair();
        assert!(server_end.is_accepted());
        client_end.send("1013|harbor,alice,\t").unwrap();
        assert_eq!(
            server_end.recv().unwrap().as_deref(),
            Some("1013|harbor,alice,\t")
        );
        server_end.send("1021|harbor").unwrap();
        assert_eq!(client_end.recv().unwrap().as_deref(), Some("1021|harbor"));
    }

    #[test]
    fn test_tcp_concurrent_senders_never_split_frames() {
        let (server_end, client_end) = tcp_pair();
        let client_end = Arc::new(client_end);
        let senders: Vec<_> = (0..4)
            .map(|t| {
                let conn = Arc::clone(&client_end);
                thread::spawn(move || {
                    for i in 0..100 {
                        conn.send(&format!("{t}:{i}:{}", "x".repeat(200))).unwrap();
                    }
                })
            })
            .collect();
        for s in senders {
            s.join().unwrap();
        }
        let mut last = [None::<u32>; 4];
        for _ in 0..400 {
            let line = server_end.recv().unwrap().unwrap();
            let mut parts = line.splitn(3, ':');
            let t: usize = parts.next().unwrap().parse().unwrap();
            let i: u32 = parts.next().unwrap().parse().unwrap();
            assert_eq!(parts.next().unwrap().len(), 200);
            // Per-sender order is preserved.
            assert!(last[t].is_none_or(|prev| prev < i));
            last[t] = Some(i);
        }
    }

    #[test]
    fn test_tcp_disconnect_is_idempotent_and_peer_sees_eof() {
        let (server_end, client_end) = tcp_pair();
        client_end.disconnect();
        client_end.disconnect();
        assert!(client_end.send("x").is_err());
        assert_eq!(server_end.recv().unwrap(), None);
        assert!(server_end.is_closed());
    }

    #[test]
    fn test_tcp_soft_disconnect_drains() {
        let (server_end, client_end) = tcp_pair();
        server_end.send("a").unwrap();
        server_end.send("b").unwrap();
        server_end.disconnect_soft();
        assert_eq!(client_end.recv().unwrap().as_deref(), Some("a"));
        assert_eq!(client_end.recv().unwrap().as_deref(), Some("b"));
        assert_eq!(client_end.recv().unwrap(), None);
    }

    #[test]
    fn test_tcp_frame_that_is_not_utf8_is_skipped() {
        use std::io::Write;

        let transport = TcpTransport::bind("127.0.0.1:0").unwrap();
        let mut raw = std::net::TcpStream::connect(transport.local_addr()).unwrap();
        let server_end = transport.accept().unwrap();
        raw.write_all(&[0, 2, 0xff, 0xfe, 0, 2, b'h', b'i']).unwrap();
        raw.flush().unwrap();

        assert_eq!(server_end.recv().unwrap().as_deref(), Some("hi"));
        assert!(!server_end.is_closed());
        drop(raw);
        assert_eq!(server_end.recv().unwrap(), None);
    }

    #[test]
    fn test_tcp_oversized_send_rejected() {
        let (_server_end, client_end) = tcp_pair();
        let big = "x".repeat(tradewind_transport::MAX_FRAME_LEN + 1);
        assert!(matches!(
            client_end.send(&big),
            Err(TransportError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn test_tcp_shutdown_wakes_accept() {
        let transport = Arc::new(TcpTransport::bind("127.0.0.1:0").unwrap());
        let acceptor = {
            let transport = Arc::clone(&transport);
            thread::spawn(move || transport.accept())
        };
        transport.shutdown().unwrap();
        assert!(matches!(
            acceptor.join().unwrap(),
            Err(TransportError::Shutdown)
        ));
    }
}
