//! Messages exchanged between the two peers once a session is established.
//!
//! Only effects whose outcome is decided by one side travel on the wire:
//! player actions, host-side enemy spawns, trashes of mirrored entities,
//! readiness declarations, and the host's core health and session outcome.
//! Everything else is re-derived locally.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{Action, EnemyKind, Mode, NetworkId, PlayerId, Request, TrashTarget};

/// Free-form greeting exchanged right after the handshake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    /// Text of the greeting.
    pub text: String,
}

/// Action chain applied to the mirror of a player's actor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    /// Player whose actor receives the chain.
    pub player: PlayerId,
    /// Actions in execution order.
    pub actions: Vec<Action>,
    /// Whether the chain may be replaced before it completes.
    pub replaceable: bool,
}

/// Host-authored enemy spawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnEnemyPayload {
    /// Configured enemy kind.
    pub kind: EnemyKind,
    /// Spawn position chosen by the host.
    pub position: Vec2,
    /// Identity allocated by the host.
    pub network_id: NetworkId,
}

/// Removal of a mirrored entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashEntityPayload {
    /// Identity of the removed entity.
    pub network_id: NetworkId,
}

/// Readiness declaration for a mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartModePayload {
    /// Player declaring readiness.
    pub player: PlayerId,
    /// Mode the player wants to enter.
    pub mode: Mode,
}

/// Core health as tracked by the host.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoreHealthPayload {
    /// Remaining health of the core.
    pub health: f32,
}

/// Mode change decided by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetModePayload {
    /// Mode to enter.
    pub mode: Mode,
}

/// Every message the peer link carries in-game.
#[derive(Clone, Debug, PartialEq)]
pub enum PeerMessage {
    /// Application-level hello after the handshake.
    Greeting(Greeting),
    /// Player intent for a mirrored actor.
    Action(ActionMessage),
    /// Host-authored enemy spawn.
    SpawnEnemy(SpawnEnemyPayload),
    /// Removal of a mirrored entity.
    TrashEntity(TrashEntityPayload),
    /// Readiness declaration.
    StartMode(StartModePayload),
    /// Host-side core health after it changed.
    CoreHealth(CoreHealthPayload),
    /// Host-decided mode change, sent for the end of play.
    SetMode(SetModePayload),
}

impl PeerMessage {
    /// Wire form of a dispatched request, if the request kind ever crosses the link.
    ///
    /// Spawns without an allocated identity and trashes addressed by local
    /// handle have no wire form.
    #[must_use]
    pub fn from_request(request: &Request) -> Option<Self> {
        match request {
            Request::SpawnEnemy {
                kind,
                position,
                network_id: Some(network_id),
            } => Some(PeerMessage::SpawnEnemy(SpawnEnemyPayload {
                kind: kind.clone(),
                position: *position,
                network_id: *network_id,
            })),
            Request::TrashEntity {
                target: TrashTarget::Network(network_id),
            } => Some(PeerMessage::TrashEntity(TrashEntityPayload {
                network_id: *network_id,
            })),
            Request::StartMode { player, mode } => {
                Some(PeerMessage::StartMode(StartModePayload {
                    player: *player,
                    mode: *mode,
                }))
            }
            Request::SetMode { mode } => Some(PeerMessage::SetMode(SetModePayload { mode: *mode })),
            _ => None,
        }
    }

    /// Request the world dispatches for an inbound effect message.
    ///
    /// Greetings, actions and core health reports are not effects and yield `None`.
    #[must_use]
    pub fn into_request(self) -> Option<Request> {
        match self {
            PeerMessage::SpawnEnemy(payload) => Some(Request::SpawnEnemy {
                kind: payload.kind,
                position: payload.position,
                network_id: Some(payload.network_id),
            }),
            PeerMessage::TrashEntity(payload) => Some(Request::TrashEntity {
                target: TrashTarget::Network(payload.network_id),
            }),
            PeerMessage::StartMode(payload) => Some(Request::StartMode {
                player: payload.player,
                mode: payload.mode,
            }),
            PeerMessage::SetMode(payload) => Some(Request::SetMode { mode: payload.mode }),
            PeerMessage::Greeting(_) | PeerMessage::Action(_) | PeerMessage::CoreHealth(_) => None,
        }
    }
}
