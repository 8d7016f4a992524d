//! Typed JSON envelopes carried by the game link.
//!
//! Every datagram is a single object `{"type": <tag>, "data": <payload>}`.
//! Decoding looks the tag up in an immutable [`Registry`] built once per
//! session and shared with the receive worker.

use std::collections::BTreeMap;

use magnet_defence_core::{
    ActionMessage, CoreHealthPayload, Greeting, PeerMessage, SetModePayload, SpawnEnemyPayload,
    StartModePayload, TrashEntityPayload,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire tags of the envelope payloads.
pub mod tag {
    /// Greeting exchanged after the handshake.
    pub const GREETING: u16 = 1;
    /// Action chain for the peer's mirror actor.
    pub const ACTION: u16 = 10;
    /// Host-authored enemy spawn.
    pub const SPAWN_ENEMY: u16 = 20;
    /// Removal of a mirrored entity.
    pub const TRASH_ENTITY: u16 = 21;
    /// Host-side core health.
    pub const CORE_HEALTH: u16 = 22;
    /// Readiness declaration.
    pub const START_MODE: u16 = 30;
    /// Host-decided mode change.
    pub const SET_MODE: u16 = 31;
}

/// Failure to turn a datagram into a [`PeerMessage`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The datagram is not a JSON envelope.
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    /// No decoder is registered for the tag.
    #[error("unknown envelope tag {0}")]
    UnknownTag(u16),
    /// The payload does not match the tag's schema.
    #[error("malformed payload for tag {tag}: {source}")]
    Payload {
        /// Tag of the envelope.
        tag: u16,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    tag: u16,
    data: Value,
}

type Decoder = fn(Value) -> Result<PeerMessage, serde_json::Error>;

/// Immutable mapping from envelope tags to payload decoders.
#[derive(Clone, Debug)]
pub struct Registry {
    decoders: BTreeMap<u16, Decoder>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Registry {
    /// Registry covering every in-game message.
    #[must_use]
    pub fn standard() -> Self {
        let entries: [(u16, Decoder); 7] = [
            (tag::GREETING, |data| {
                serde_json::from_value::<Greeting>(data).map(PeerMessage::Greeting)
            }),
            (tag::ACTION, |data| {
                serde_json::from_value::<ActionMessage>(data).map(PeerMessage::Action)
            }),
            (tag::SPAWN_ENEMY, |data| {
                serde_json::from_value::<SpawnEnemyPayload>(data).map(PeerMessage::SpawnEnemy)
            }),
            (tag::TRASH_ENTITY, |data| {
                serde_json::from_value::<TrashEntityPayload>(data).map(PeerMessage::TrashEntity)
            }),
            (tag::CORE_HEALTH, |data| {
                serde_json::from_value::<CoreHealthPayload>(data).map(PeerMessage::CoreHealth)
            }),
            (tag::START_MODE, |data| {
                serde_json::from_value::<StartModePayload>(data).map(PeerMessage::StartMode)
            }),
            (tag::SET_MODE, |data| {
                serde_json::from_value::<SetModePayload>(data).map(PeerMessage::SetMode)
            }),
        ];
        Self {
            decoders: entries.into_iter().collect(),
        }
    }

    /// Tags the registry can decode, in ascending order.
    pub fn tags(&self) -> impl Iterator<Item = u16> + '_ {
        self.decoders.keys().copied()
    }

    /// Decodes a datagram.
    pub fn decode(&self, bytes: &[u8]) -> Result<PeerMessage, DecodeError> {
        let envelope: Envelope = serde_json::from_slice(bytes).map_err(DecodeError::Envelope)?;
        let decoder = self
            .decoders
            .get(&envelope.tag)
            .ok_or(DecodeError::UnknownTag(envelope.tag))?;
        decoder(envelope.data).map_err(|source| DecodeError::Payload {
            tag: envelope.tag,
            source,
        })
    }
}

/// Tag a message travels under.
#[must_use]
pub fn tag_of(message: &PeerMessage) -> u16 {
    match message {
        PeerMessage::Greeting(_) => tag::GREETING,
        PeerMessage::Action(_) => tag::ACTION,
        PeerMessage::SpawnEnemy(_) => tag::SPAWN_ENEMY,
        PeerMessage::TrashEntity(_) => tag::TRASH_ENTITY,
        PeerMessage::StartMode(_) => tag::START_MODE,
        PeerMessage::CoreHealth(_) => tag::CORE_HEALTH,
        PeerMessage::SetMode(_) => tag::SET_MODE,
    }
}

/// Encodes a message as an envelope datagram.
pub fn encode(message: &PeerMessage) -> Result<Vec<u8>, serde_json::Error> {
    let data = match message {
        PeerMessage::Greeting(payload) => serde_json::to_value(payload)?,
        PeerMessage::Action(payload) => serde_json::to_value(payload)?,
        PeerMessage::SpawnEnemy(payload) => serde_json::to_value(payload)?,
        PeerMessage::TrashEntity(payload) => serde_json::to_value(payload)?,
        PeerMessage::StartMode(payload) => serde_json::to_value(payload)?,
        PeerMessage::CoreHealth(payload) => serde_json::to_value(payload)?,
        PeerMessage::SetMode(payload) => serde_json::to_value(payload)?,
    };
    serde_json::to_vec(&Envelope {
        tag: tag_of(message),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use magnet_defence_core::{Mode, NetworkId, PlayerId};

    #[test]
    fn envelope_uses_type_and_data_fields() {
        let message = PeerMessage::TrashEntity(TrashEntityPayload {
            network_id: NetworkId::new(9),
        });
        let bytes = encode(&message).expect("encodes");
        let value: Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(value["type"], 21);
        assert_eq!(value["data"]["network_id"], 9);
        assert_eq!(Registry::standard().decode(&bytes).expect("decodes"), message);
    }

    #[test]
    fn registry_lists_sparse_tags() {
        let tags: Vec<u16> = Registry::standard().tags().collect();
        assert_eq!(tags, vec![1, 10, 20, 21, 22, 30, 31]);
    }

    #[test]
    fn decode_rejects_unknown_tags_and_bad_payloads() {
        let registry = Registry::standard();
        assert!(matches!(
            registry.decode(br#"{"type":99,"data":{}}"#),
            Err(DecodeError::UnknownTag(99))
        ));
        assert!(matches!(
            registry.decode(br#"{"type":30,"data":{"player":0}}"#),
            Err(DecodeError::Payload { tag: 30, .. })
        ));
        assert!(matches!(
            registry.decode(b"0 alice"),
            Err(DecodeError::Envelope(_))
        ));
    }

    #[test]
    fn start_mode_payload_is_readable_by_hand() {
        let message = PeerMessage::StartMode(StartModePayload {
            player: PlayerId::PEER,
            mode: Mode::Build,
        });
        let text = String::from_utf8(encode(&message).expect("encodes")).expect("utf8");
        assert_eq!(text, r#"{"type":30,"data":{"mode":"build","player":1}}"#);
    }
}
