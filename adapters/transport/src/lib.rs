#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! UDP link between the two Magnet Defence peers.
//!
//! A session is established either through the rendezvous service or by
//! dialling a known address. Both paths end in a direct hello exchange, after
//! which a receive worker decodes typed JSON envelopes into a bounded queue
//! that the simulation thread drains once per tick.

pub mod envelope;
mod link;
pub mod rendezvous;

pub use envelope::{DecodeError, Registry};
pub use link::{
    connect, resolve, ConnectError, Discovery, Link, LinkConfig, LinkEvent, LinkSender,
    TransportError, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_RESEND_INTERVAL, INBOUND_CAPACITY,
};
pub use rendezvous::{Matchmaker, RendezvousError, RendezvousMessage, RendezvousServer};
