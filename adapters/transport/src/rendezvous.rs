//! Text protocol spoken with the rendezvous service and during the hello
//! exchange, plus a minimal in-process implementation of the service.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    io,
    net::{SocketAddr, UdpSocket},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Failures of the rendezvous protocol and service.
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// A datagram is not a well-formed protocol line.
    #[error("malformed rendezvous line {line:?}")]
    Malformed {
        /// Offending text, lossily decoded.
        line: String,
    },
    /// Socket failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One line of the rendezvous protocol, `"<code> <payload>"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RendezvousMessage {
    /// `0 <name>`: publish this address under a name.
    Register(String),
    /// `1 <name>`: wait for the peer registered under a name.
    Await(String),
    /// `2 <address>`: the other side's address.
    Arrived(SocketAddr),
    /// `3 <name>`: direct hello between the two peers.
    Hello(String),
}

impl RendezvousMessage {
    /// Parses a datagram.
    pub fn parse(bytes: &[u8]) -> Result<Self, RendezvousError> {
        let malformed = || RendezvousError::Malformed {
            line: String::from_utf8_lossy(bytes).into_owned(),
        };
        let text = std::str::from_utf8(bytes).map_err(|_| malformed())?;
        let (code, payload) = text.trim_end().split_once(' ').ok_or_else(malformed)?;
        if payload.is_empty() {
            return Err(malformed());
        }
        match code {
            "0" => Ok(Self::Register(payload.to_owned())),
            "1" => Ok(Self::Await(payload.to_owned())),
            "2" => payload.parse().map(Self::Arrived).map_err(|_| malformed()),
            "3" => Ok(Self::Hello(payload.to_owned())),
            _ => Err(malformed()),
        }
    }

    /// Encodes the message as a datagram.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for RendezvousMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(name) => write!(f, "0 {name}"),
            Self::Await(name) => write!(f, "1 {name}"),
            Self::Arrived(address) => write!(f, "2 {address}"),
            Self::Hello(name) => write!(f, "3 {name}"),
        }
    }
}

/// Pairings kept to answer resends that arrive after a name was released.
const RECENT_PAIRINGS: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Pairing {
    name: String,
    host: SocketAddr,
    peer: SocketAddr,
}

/// Pairs registering and awaiting clients by name.
#[derive(Clone, Debug, Default)]
pub struct Matchmaker {
    registered: HashMap<String, SocketAddr>,
    awaiting: HashMap<String, Vec<SocketAddr>>,
    paired: VecDeque<Pairing>,
}

impl Matchmaker {
    /// Handles one protocol line and returns the replies to send.
    ///
    /// Once a name has both a registered and an awaiting client, each side
    /// receives the other's address and the name is released. A client that
    /// repeats its request after being paired gets the same answer again.
    pub fn handle(
        &mut self,
        from: SocketAddr,
        message: RendezvousMessage,
    ) -> Vec<(SocketAddr, RendezvousMessage)> {
        match message {
            RendezvousMessage::Register(name) => {
                if let Some(other) = self.paired_with(&name, from) {
                    return vec![(from, RendezvousMessage::Arrived(other))];
                }
                match self
                    .awaiting
                    .remove(&name)
                    .and_then(|waiting| waiting.into_iter().next())
                {
                    Some(peer) => self.pair(name, from, peer),
                    None => {
                        let _ = self.registered.insert(name, from);
                        Vec::new()
                    }
                }
            }
            RendezvousMessage::Await(name) => {
                if let Some(other) = self.paired_with(&name, from) {
                    return vec![(from, RendezvousMessage::Arrived(other))];
                }
                match self.registered.get(&name).copied() {
                    Some(host) if host != from => self.pair(name, host, from),
                    _ => {
                        let waiting = self.awaiting.entry(name).or_default();
                        if !waiting.contains(&from) {
                            waiting.push(from);
                        }
                        Vec::new()
                    }
                }
            }
            RendezvousMessage::Arrived(_) | RendezvousMessage::Hello(_) => Vec::new(),
        }
    }

    /// Number of names currently published.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.registered.len()
    }

    /// Number of clients waiting for a name to be published.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.awaiting.values().map(Vec::len).sum()
    }

    fn paired_with(&self, name: &str, from: SocketAddr) -> Option<SocketAddr> {
        self.paired
            .iter()
            .rev()
            .filter(|pairing| pairing.name == name)
            .find_map(|pairing| {
                if pairing.host == from {
                    Some(pairing.peer)
                } else if pairing.peer == from {
                    Some(pairing.host)
                } else {
                    None
                }
            })
    }

    fn pair(
        &mut self,
        name: String,
        host: SocketAddr,
        peer: SocketAddr,
    ) -> Vec<(SocketAddr, RendezvousMessage)> {
        let _ = self.registered.remove(&name);
        let _ = self.awaiting.remove(&name);
        if self.paired.len() == RECENT_PAIRINGS {
            let _ = self.paired.pop_front();
        }
        self.paired.push_back(Pairing { name, host, peer });
        vec![
            (host, RendezvousMessage::Arrived(peer)),
            (peer, RendezvousMessage::Arrived(host)),
        ]
    }
}

/// UDP rendezvous service.
#[derive(Debug)]
pub struct RendezvousServer {
    socket: UdpSocket,
    matchmaker: Matchmaker,
}

impl RendezvousServer {
    /// Binds the service socket.
    pub fn bind(address: SocketAddr) -> Result<Self, RendezvousError> {
        let socket = UdpSocket::bind(address)?;
        socket.set_read_timeout(Some(Duration::from_millis(100)))?;
        Ok(Self {
            socket,
            matchmaker: Matchmaker::default(),
        })
    }

    /// Address the service listens on.
    pub fn local_addr(&self) -> Result<SocketAddr, RendezvousError> {
        Ok(self.socket.local_addr()?)
    }

    /// Serves requests until `shutdown` is raised.
    pub fn serve(&mut self, shutdown: &AtomicBool) -> Result<(), RendezvousError> {
        info!(address = ?self.socket.local_addr().ok(), "rendezvous service listening");
        let mut buffer = [0_u8; 512];
        while !shutdown.load(Ordering::Relaxed) {
            let (length, from) = match self.socket.recv_from(&mut buffer) {
                Ok(received) => received,
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    continue;
                }
                Err(error) if error.kind() == io::ErrorKind::ConnectionReset => {
                    warn!(%error, "a rendezvous client went away");
                    continue;
                }
                Err(error) => return Err(error.into()),
            };

            let message = match RendezvousMessage::parse(&buffer[..length]) {
                Ok(message) => message,
                Err(error) => {
                    warn!(%from, %error, "dropping rendezvous datagram");
                    continue;
                }
            };
            debug!(%from, %message, "rendezvous request");

            let replies = self.matchmaker.handle(from, message);
            let _ = self.reply_all(replies);
        }
        Ok(())
    }

    /// Sends each reply, logging and skipping the ones the socket refuses.
    /// Returns how many were sent.
    fn reply_all(&self, replies: Vec<(SocketAddr, RendezvousMessage)>) -> usize {
        let mut sent = 0;
        for (to, reply) in replies {
            info!(%to, %reply, "answering rendezvous client");
            match self.socket.send_to(&reply.to_bytes(), to) {
                Ok(_) => sent += 1,
                Err(error) => warn!(%to, %error, "failed to answer rendezvous client"),
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn lines_parse_and_print_symmetrically() {
        let arrived = RendezvousMessage::parse(b"2 127.0.0.1:4000").expect("parses");
        assert_eq!(arrived, RendezvousMessage::Arrived(addr(4000)));
        assert_eq!(arrived.to_string(), "2 127.0.0.1:4000");
        assert_eq!(
            RendezvousMessage::parse(b"3 bob\n").expect("parses"),
            RendezvousMessage::Hello(String::from("bob"))
        );
    }

    #[test]
    fn malformed_lines_are_rejected() {
        for line in [&b"9 x"[..], b"0", b"0 ", b"2 nowhere", b"\xff\xfe"] {
            assert!(
                matches!(
                    RendezvousMessage::parse(line),
                    Err(RendezvousError::Malformed { .. })
                ),
                "accepted {line:?}"
            );
        }
    }

    #[test]
    fn register_then_await_pairs_both_sides() {
        let mut matchmaker = Matchmaker::default();
        assert!(matchmaker
            .handle(addr(1), RendezvousMessage::Register(String::from("alice")))
            .is_empty());
        assert_eq!(matchmaker.registered(), 1);

        let replies = matchmaker.handle(addr(2), RendezvousMessage::Await(String::from("alice")));
        assert_eq!(
            replies,
            vec![
                (addr(1), RendezvousMessage::Arrived(addr(2))),
                (addr(2), RendezvousMessage::Arrived(addr(1))),
            ]
        );
        assert_eq!(matchmaker.registered(), 0);
    }

    #[test]
    fn await_before_register_is_remembered() {
        let mut matchmaker = Matchmaker::default();
        for _ in 0..3 {
            assert!(matchmaker
                .handle(addr(2), RendezvousMessage::Await(String::from("alice")))
                .is_empty());
        }
        let replies =
            matchmaker.handle(addr(1), RendezvousMessage::Register(String::from("alice")));
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], (addr(1), RendezvousMessage::Arrived(addr(2))));
        assert_eq!(matchmaker.registered(), 0);
    }

    #[test]
    fn pairing_releases_the_name_on_both_sides() {
        let mut matchmaker = Matchmaker::default();
        let _ = matchmaker.handle(addr(2), RendezvousMessage::Await(String::from("alice")));
        assert_eq!(matchmaker.pending(), 1);
        let replies =
            matchmaker.handle(addr(1), RendezvousMessage::Register(String::from("alice")));
        assert_eq!(replies.len(), 2);
        assert_eq!(matchmaker.pending(), 0);
        assert_eq!(matchmaker.registered(), 0);
    }

    #[test]
    fn resends_after_pairing_repeat_the_answer() {
        let mut matchmaker = Matchmaker::default();
        let _ = matchmaker.handle(addr(1), RendezvousMessage::Register(String::from("alice")));
        let _ = matchmaker.handle(addr(2), RendezvousMessage::Await(String::from("alice")));

        let again = matchmaker.handle(addr(1), RendezvousMessage::Register(String::from("alice")));
        assert_eq!(again, vec![(addr(1), RendezvousMessage::Arrived(addr(2)))]);
        let again = matchmaker.handle(addr(2), RendezvousMessage::Await(String::from("alice")));
        assert_eq!(again, vec![(addr(2), RendezvousMessage::Arrived(addr(1)))]);
        assert_eq!(matchmaker.registered(), 0);
        assert_eq!(matchmaker.pending(), 0);

        assert!(matchmaker
            .handle(addr(3), RendezvousMessage::Register(String::from("alice")))
            .is_empty());
        assert_eq!(matchmaker.registered(), 1);
    }

    #[test]
    fn only_recent_pairings_are_remembered() {
        let mut matchmaker = Matchmaker::default();
        for index in 0..=RECENT_PAIRINGS as u16 {
            let name = format!("session-{index}");
            let _ = matchmaker.handle(addr(1000 + index), RendezvousMessage::Register(name.clone()));
            let _ = matchmaker.handle(addr(2000 + index), RendezvousMessage::Await(name));
        }
        assert_eq!(matchmaker.paired.len(), RECENT_PAIRINGS);
        assert!(matchmaker
            .handle(addr(1000), RendezvousMessage::Register(String::from("session-0")))
            .is_empty());
        assert_eq!(matchmaker.registered(), 1);
    }

    #[test]
    fn failed_replies_do_not_stop_the_others() {
        let server = RendezvousServer::bind(addr(0)).expect("service binds");
        let client = UdpSocket::bind(addr(0)).expect("client binds");
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("timeout set");
        let client_addr = client.local_addr().expect("client address");
        let unreachable = SocketAddr::from((std::net::Ipv6Addr::LOCALHOST, 9));

        let sent = server.reply_all(vec![
            (unreachable, RendezvousMessage::Arrived(client_addr)),
            (client_addr, RendezvousMessage::Arrived(unreachable)),
        ]);
        assert_eq!(sent, 1);

        let mut buffer = [0_u8; 128];
        let (length, _) = client.recv_from(&mut buffer).expect("reply arrives");
        assert_eq!(
            RendezvousMessage::parse(&buffer[..length]).expect("parses"),
            RendezvousMessage::Arrived(unreachable)
        );
    }

    #[test]
    fn names_do_not_cross() {
        let mut matchmaker = Matchmaker::default();
        let _ = matchmaker.handle(addr(1), RendezvousMessage::Register(String::from("alice")));
        assert!(matchmaker
            .handle(addr(2), RendezvousMessage::Await(String::from("carol")))
            .is_empty());
        assert_eq!(matchmaker.registered(), 1);
    }
}
