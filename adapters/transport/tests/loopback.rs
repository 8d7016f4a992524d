use std::{
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use glam::Vec2;
use magnet_defence_core::{EnemyKind, Greeting, NetworkId, PeerMessage, SpawnEnemyPayload};
use magnet_defence_system_replication::Authority;
use magnet_defence_transport::{
    connect, resolve, ConnectError, Discovery, LinkConfig, LinkEvent, Registry, RendezvousServer,
};

const WAIT: Duration = Duration::from_secs(3);

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn free_port() -> SocketAddr {
    UdpSocket::bind(loopback())
        .and_then(|socket| socket.local_addr())
        .expect("ephemeral port")
}

fn greeting(text: &str) -> PeerMessage {
    PeerMessage::Greeting(Greeting {
        text: text.to_owned(),
    })
}

#[test]
fn direct_handshake_connects_both_sides_and_carries_messages() {
    let host_addr = free_port();
    let registry = Arc::new(Registry::standard());

    let host_registry = Arc::clone(&registry);
    let host = thread::spawn(move || {
        connect(
            &LinkConfig::new(host_addr, Discovery::Listen, "host"),
            host_registry,
        )
    });
    thread::sleep(Duration::from_millis(50));
    let peer = connect(
        &LinkConfig::new(loopback(), Discovery::Dial { peer: host_addr }, "peer"),
        registry,
    )
    .expect("peer connects");
    let host = host.join().expect("host thread").expect("host connects");

    assert!(host.is_connected() && peer.is_connected());
    assert_eq!(host.authority(), Authority::Host);
    assert_eq!(peer.authority(), Authority::Peer);
    assert_eq!(host.peer_addr(), peer.local_addr());
    assert_eq!(peer.peer_addr(), host_addr);

    peer.send(&greeting("hello from the peer")).expect("send");
    assert_eq!(
        host.recv_timeout(WAIT),
        Some(LinkEvent::Message(greeting("hello from the peer")))
    );

    let spawn = PeerMessage::SpawnEnemy(SpawnEnemyPayload {
        kind: EnemyKind::new("drone"),
        position: Vec2::new(0.5, 0.25),
        network_id: NetworkId::new(1),
    });
    host.sender().send(&spawn).expect("send");
    assert_eq!(peer.recv_timeout(WAIT), Some(LinkEvent::Message(spawn)));
}

#[test]
fn rendezvous_pairs_register_and_await_then_hands_over() {
    let mut server = RendezvousServer::bind(loopback()).expect("service binds");
    let server_addr = server.local_addr().expect("service address");
    let shutdown = Arc::new(AtomicBool::new(false));
    let service_shutdown = Arc::clone(&shutdown);
    let service = thread::spawn(move || server.serve(&service_shutdown));

    let registry = Arc::new(Registry::standard());
    let alice_registry = Arc::clone(&registry);
    let alice = thread::spawn(move || {
        connect(
            &LinkConfig::new(
                loopback(),
                Discovery::Register {
                    server: server_addr,
                    name: String::from("alice"),
                },
                "alice",
            ),
            alice_registry,
        )
    });
    let bob = connect(
        &LinkConfig::new(
            loopback(),
            Discovery::Await {
                server: server_addr,
                name: String::from("alice"),
            },
            "bob",
        ),
        registry,
    )
    .expect("bob connects");
    let alice = alice.join().expect("alice thread").expect("alice connects");

    assert_eq!(alice.authority(), Authority::Host);
    assert_eq!(bob.authority(), Authority::Peer);
    assert_eq!(alice.peer_addr(), bob.local_addr());
    assert_eq!(bob.peer_addr(), alice.local_addr());

    alice.send(&greeting("welcome")).expect("send");
    assert_eq!(
        bob.recv_timeout(WAIT),
        Some(LinkEvent::Message(greeting("welcome")))
    );

    shutdown.store(true, Ordering::Relaxed);
    service
        .join()
        .expect("service thread")
        .expect("service stops cleanly");
}

#[test]
fn handshake_times_out_when_nobody_answers() {
    let silent = UdpSocket::bind(loopback()).expect("silent socket");
    let mut config = LinkConfig::new(
        loopback(),
        Discovery::Dial {
            peer: silent.local_addr().expect("address"),
        },
        "lonely",
    );
    config.handshake_timeout = Duration::from_millis(300);
    config.resend_interval = Duration::from_millis(50);

    let result = connect(&config, Arc::new(Registry::standard()));
    assert!(
        matches!(result, Err(ConnectError::Timeout(_))),
        "expected a timeout, got {result:?}"
    );
}

#[test]
fn datagrams_from_strangers_and_garbage_are_dropped() {
    let host_addr = free_port();
    let registry = Arc::new(Registry::standard());
    let host_registry = Arc::clone(&registry);
    let host = thread::spawn(move || {
        connect(
            &LinkConfig::new(host_addr, Discovery::Listen, "host"),
            host_registry,
        )
    });
    thread::sleep(Duration::from_millis(50));
    let peer = connect(
        &LinkConfig::new(loopback(), Discovery::Dial { peer: host_addr }, "peer"),
        registry,
    )
    .expect("peer connects");
    let host = host.join().expect("host thread").expect("host connects");

    let stranger = UdpSocket::bind(loopback()).expect("stranger");
    let forged = magnet_defence_transport::envelope::encode(&greeting("forged")).expect("encode");
    let _ = stranger.send_to(&forged, host_addr).expect("send");
    let _ = stranger.send_to(b"{\"type\":99}", host_addr).expect("send");

    peer.send(&greeting("genuine")).expect("send");
    assert_eq!(
        host.recv_timeout(WAIT),
        Some(LinkEvent::Message(greeting("genuine")))
    );
    assert!(host.drain().is_empty());
    assert!(host.is_connected());
}

#[test]
fn resolve_reports_unusable_addresses() {
    assert_eq!(
        resolve("127.0.0.1:4100").expect("literal resolves"),
        SocketAddr::from(([127, 0, 0, 1], 4100))
    );
    assert!(matches!(
        resolve("definitely not an address"),
        Err(ConnectError::Resolve { .. })
    ));
}
