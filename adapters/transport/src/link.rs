//! Session establishment and the running game link.

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use magnet_defence_core::PeerMessage;
use magnet_defence_system_replication::Authority;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::{
    envelope::{encode, Registry},
    rendezvous::RendezvousMessage,
};

/// Capacity of the inbound message queue.
pub const INBOUND_CAPACITY: usize = 1000;

/// Default limit for the whole handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between retransmitted handshake lines.
pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_millis(250);

const MAX_DATAGRAM: usize = 64 * 1024;

/// Setup failures reported by [`connect`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// An address could not be resolved.
    #[error("could not resolve address `{address}`")]
    Resolve {
        /// Address as given.
        address: String,
    },
    /// The local socket could not be bound.
    #[error("could not bind {address}: {source}")]
    Bind {
        /// Requested local address.
        address: SocketAddr,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// No peer completed the handshake in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),
    /// The other side answered with an unexpected line.
    #[error("protocol mismatch: {0}")]
    Protocol(String),
    /// Socket failure during the handshake.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures while sending on an established link.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The message could not be encoded.
    #[error("could not encode message: {0}")]
    Encode(#[from] serde_json::Error),
    /// The datagram could not be written.
    #[error("send failed: {0}")]
    Send(#[from] io::Error),
    /// The link has already closed.
    #[error("link is closed")]
    Closed,
}

/// How the two peers find each other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Discovery {
    /// Publish under `name` at the rendezvous service and wait for a peer.
    Register {
        /// Rendezvous service address.
        server: SocketAddr,
        /// Session name.
        name: String,
    },
    /// Ask the rendezvous service for the peer published under `name`.
    Await {
        /// Rendezvous service address.
        server: SocketAddr,
        /// Session name.
        name: String,
    },
    /// Wait for a peer to dial this socket.
    Listen,
    /// Dial a known peer address.
    Dial {
        /// Peer address.
        peer: SocketAddr,
    },
}

impl Discovery {
    /// Authority this side holds once connected.
    ///
    /// The registering or listening side is the host.
    #[must_use]
    pub const fn authority(&self) -> Authority {
        match self {
            Discovery::Register { .. } | Discovery::Listen => Authority::Host,
            Discovery::Await { .. } | Discovery::Dial { .. } => Authority::Peer,
        }
    }
}

/// Parameters of a connection attempt.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    /// Local socket address.
    pub bind: SocketAddr,
    /// Peer discovery strategy.
    pub discovery: Discovery,
    /// Name sent in hello lines.
    pub hello: String,
    /// Limit for the whole handshake.
    pub handshake_timeout: Duration,
    /// Interval between retransmitted lines.
    pub resend_interval: Duration,
}

impl LinkConfig {
    /// Configuration with default timings.
    #[must_use]
    pub fn new(bind: SocketAddr, discovery: Discovery, hello: impl Into<String>) -> Self {
        Self {
            bind,
            discovery,
            hello: hello.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            resend_interval: DEFAULT_RESEND_INTERVAL,
        }
    }
}

/// Resolves a `host:port` string to the first matching socket address.
pub fn resolve(address: &str) -> Result<SocketAddr, ConnectError> {
    address
        .to_socket_addrs()
        .ok()
        .and_then(|mut candidates| candidates.next())
        .ok_or_else(|| ConnectError::Resolve {
            address: address.to_owned(),
        })
}

/// Item delivered by the receive worker.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkEvent {
    /// Decoded message from the peer.
    Message(PeerMessage),
    /// The socket failed; no further events follow.
    Closed(String),
}

/// Cloneable sending half of a link.
#[derive(Clone, Debug)]
pub struct LinkSender {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    connected: Arc<AtomicBool>,
}

impl LinkSender {
    /// Encodes and writes one message to the peer.
    pub fn send(&self, message: &PeerMessage) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let bytes = encode(message)?;
        let _ = self.socket.send_to(&bytes, self.peer)?;
        Ok(())
    }
}

/// Established session with the other peer.
#[derive(Debug)]
pub struct Link {
    sender: LinkSender,
    inbound: Receiver<LinkEvent>,
    local: SocketAddr,
    peer: SocketAddr,
    authority: Authority,
}

impl Link {
    /// Address of the other peer.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Address of the local socket.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Authority fixed at handshake time.
    #[must_use]
    pub fn authority(&self) -> Authority {
        self.authority
    }

    /// Snapshot of the connected flag.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.sender.connected.load(Ordering::Acquire)
    }

    /// Cloneable sending half.
    #[must_use]
    pub fn sender(&self) -> LinkSender {
        self.sender.clone()
    }

    /// Sends one message to the peer.
    pub fn send(&self, message: &PeerMessage) -> Result<(), TransportError> {
        self.sender.send(message)
    }

    /// Takes every event queued so far without blocking.
    pub fn drain(&self) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        loop {
            match self.inbound.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return events,
            }
        }
    }

    /// Blocks for the next event up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LinkEvent> {
        self.inbound.recv_timeout(timeout).ok()
    }
}

/// Establishes a session and starts the receive worker.
///
/// Returns once both sides have recorded each other's address and answered a
/// hello, or fails with a [`ConnectError`].
pub fn connect(config: &LinkConfig, registry: Arc<Registry>) -> Result<Link, ConnectError> {
    let socket = UdpSocket::bind(config.bind).map_err(|source| ConnectError::Bind {
        address: config.bind,
        source,
    })?;
    socket.set_read_timeout(Some(config.resend_interval))?;
    let local = socket.local_addr()?;
    let deadline = Instant::now() + config.handshake_timeout;
    let authority = config.discovery.authority();
    info!(%local, ?authority, discovery = ?config.discovery, "connecting");

    let mut handshake = Handshake {
        socket: &socket,
        hello: &config.hello,
        registry: &registry,
        deadline,
        timeout: config.handshake_timeout,
        resend: config.resend_interval,
        early: Vec::new(),
    };
    let peer = match &config.discovery {
        Discovery::Register { server, name } => {
            let peer = handshake.rendezvous(*server, RendezvousMessage::Register(name.clone()))?;
            handshake.exchange_hello(peer)?;
            peer
        }
        Discovery::Await { server, name } => {
            let peer = handshake.rendezvous(*server, RendezvousMessage::Await(name.clone()))?;
            handshake.exchange_hello(peer)?;
            peer
        }
        Discovery::Listen => {
            let peer = handshake.listen()?;
            handshake.send(&RendezvousMessage::Hello(config.hello.clone()), peer)?;
            peer
        }
        Discovery::Dial { peer } => {
            handshake.exchange_hello(*peer)?;
            *peer
        }
    };
    let early = handshake.early;

    socket.set_read_timeout(None)?;
    let socket = Arc::new(socket);
    let connected = Arc::new(AtomicBool::new(true));
    let (tx, rx) = bounded(INBOUND_CAPACITY);
    for message in early {
        let _ = tx.try_send(LinkEvent::Message(message));
    }

    let worker = Worker {
        socket: Arc::clone(&socket),
        peer,
        hello: config.hello.clone(),
        answer_hellos: authority.is_host(),
        registry,
        connected: Arc::clone(&connected),
        outbound: tx,
    };
    let _ = thread::Builder::new()
        .name(String::from("link-receive"))
        .spawn(move || worker.run())?;

    info!(%peer, ?authority, "link established");
    Ok(Link {
        sender: LinkSender {
            socket,
            peer,
            connected,
        },
        inbound: rx,
        local,
        peer,
        authority,
    })
}

struct Handshake<'a> {
    socket: &'a UdpSocket,
    hello: &'a str,
    registry: &'a Registry,
    deadline: Instant,
    timeout: Duration,
    resend: Duration,
    early: Vec<PeerMessage>,
}

impl Handshake<'_> {
    /// Receives one datagram, or `None` when the resend interval elapses.
    fn receive(&self, buffer: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, ConnectError> {
        if Instant::now() >= self.deadline {
            return Err(ConnectError::Timeout(self.timeout));
        }
        match self.socket.recv_from(buffer) {
            Ok(received) => Ok(Some(received)),
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn send(&self, line: &RendezvousMessage, to: SocketAddr) -> Result<(), ConnectError> {
        trace!(%to, %line, "handshake send");
        let _ = self.socket.send_to(&line.to_bytes(), to)?;
        Ok(())
    }

    fn rendezvous(
        &mut self,
        server: SocketAddr,
        request: RendezvousMessage,
    ) -> Result<SocketAddr, ConnectError> {
        let mut buffer = [0_u8; 512];
        let mut resend_at = Instant::now();
        loop {
            if Instant::now() >= resend_at {
                self.send(&request, server)?;
                resend_at = Instant::now() + self.resend;
            }
            let Some((length, from)) = self.receive(&mut buffer)? else {
                continue;
            };
            if from != server {
                debug!(%from, "ignoring datagram from unknown sender during rendezvous");
                continue;
            }
            match RendezvousMessage::parse(&buffer[..length]) {
                Ok(RendezvousMessage::Arrived(peer)) => {
                    info!(%peer, "rendezvous matched");
                    return Ok(peer);
                }
                Ok(other) => {
                    return Err(ConnectError::Protocol(format!(
                        "expected arrival from rendezvous service, got `{other}`"
                    )));
                }
                Err(error) => return Err(ConnectError::Protocol(error.to_string())),
            }
        }
    }

    fn listen(&mut self) -> Result<SocketAddr, ConnectError> {
        let mut buffer = vec![0_u8; MAX_DATAGRAM];
        loop {
            let Some((length, from)) = self.receive(&mut buffer)? else {
                continue;
            };
            match RendezvousMessage::parse(&buffer[..length]) {
                Ok(RendezvousMessage::Hello(name)) => {
                    info!(%from, %name, "peer dialled in");
                    return Ok(from);
                }
                _ => debug!(%from, "ignoring datagram while listening"),
            }
        }
    }

    /// Sends hellos until the peer's hello (or first envelope) arrives, then
    /// sends a final one so the peer can finish too.
    ///
    /// Only the host's receive worker answers hellos after the handshake, so
    /// the two sides never bounce hellos back and forth.
    fn exchange_hello(&mut self, peer: SocketAddr) -> Result<(), ConnectError> {
        let hello = RendezvousMessage::Hello(self.hello.to_owned());
        let mut buffer = vec![0_u8; MAX_DATAGRAM];
        let mut resend_at = Instant::now();
        loop {
            if Instant::now() >= resend_at {
                self.send(&hello, peer)?;
                resend_at = Instant::now() + self.resend;
            }
            let Some((length, from)) = self.receive(&mut buffer)? else {
                continue;
            };
            if from != peer {
                debug!(%from, "ignoring datagram from unknown sender during hello");
                continue;
            }
            let datagram = &buffer[..length];
            match RendezvousMessage::parse(datagram) {
                Ok(RendezvousMessage::Hello(name)) => {
                    debug!(%peer, %name, "hello answered");
                    self.send(&hello, peer)?;
                    return Ok(());
                }
                Ok(other) => debug!(%peer, line = %other, "ignoring line during hello"),
                Err(_) => {
                    if let Ok(message) = self.registry.decode(datagram) {
                        debug!(%peer, "peer already in game, treating envelope as hello");
                        self.early.push(message);
                        return Ok(());
                    }
                    debug!(%peer, "ignoring undecodable datagram during hello");
                }
            }
        }
    }
}

struct Worker {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    hello: String,
    answer_hellos: bool,
    registry: Arc<Registry>,
    connected: Arc<AtomicBool>,
    outbound: Sender<LinkEvent>,
}

impl Worker {
    fn run(self) {
        let mut buffer = vec![0_u8; MAX_DATAGRAM];
        loop {
            let (length, from) = match self.socket.recv_from(&mut buffer) {
                Ok(received) => received,
                Err(error) => {
                    warn!(%error, "link read failed, closing session");
                    self.connected.store(false, Ordering::Release);
                    let _ = self.outbound.send(LinkEvent::Closed(error.to_string()));
                    return;
                }
            };
            if from != self.peer {
                warn!(%from, "dropping datagram from unexpected sender");
                continue;
            }

            let datagram = &buffer[..length];
            if let Ok(RendezvousMessage::Hello(_)) = RendezvousMessage::parse(datagram) {
                if !self.answer_hellos {
                    trace!("ignoring late hello");
                    continue;
                }
                trace!("late hello, answering");
                let reply = RendezvousMessage::Hello(self.hello.clone()).to_bytes();
                if let Err(error) = self.socket.send_to(&reply, self.peer) {
                    warn!(%error, "could not answer late hello");
                }
                continue;
            }

            match self.registry.decode(datagram) {
                Ok(message) => {
                    if self.outbound.send(LinkEvent::Message(message)).is_err() {
                        debug!("link dropped, stopping receive worker");
                        return;
                    }
                }
                Err(error) => warn!(%error, "dropping malformed envelope"),
            }
        }
    }
}
