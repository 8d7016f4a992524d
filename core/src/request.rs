//! Deferred effects produced by entity updates and applied by the world's dispatcher.

use glam::Vec2;

use crate::{
    CellCoord, EnemyKind, EntityId, EntityKind, Mode, NetworkId, PlayerId, Polarity, ToolKind,
};

/// What a tool does when used.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolUse {
    /// Commit a blocking entity to a cell.
    Place {
        /// Cell receiving the entity.
        cell: CellCoord,
        /// Entity to create.
        entity: EntityKind,
        /// Charge of the created entity.
        polarity: Polarity,
    },
    /// Fire a projectile toward a point.
    Fire {
        /// Point the projectile is aimed at.
        target: Vec2,
        /// Charge of the projectile.
        polarity: Polarity,
    },
    /// Remove the blocking entity standing on a cell.
    Remove {
        /// Cell whose occupant is removed.
        cell: CellCoord,
    },
}

/// Entity addressed by a trash request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrashTarget {
    /// Entity known by its local handle.
    Local(EntityId),
    /// Entity known by its host-assigned identity.
    Network(NetworkId),
}

/// Closed set of effects the world dispatcher understands.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    /// An actor used a toolbelt item.
    UseTool {
        /// Actor using the tool.
        user: EntityId,
        /// Tool being used.
        tool: ToolKind,
        /// What the tool does.
        usage: ToolUse,
    },
    /// Create a projectile.
    SpawnProjectile {
        /// Player credited with kills, if any.
        owner: Option<PlayerId>,
        /// Launch position.
        position: Vec2,
        /// Launch velocity in cells per tick.
        velocity: Vec2,
        /// Charge of the projectile.
        polarity: Polarity,
        /// Damage dealt on impact.
        damage: f32,
        /// Ticks before the projectile expires.
        lifetime: u32,
        /// Entity the projectile steers toward.
        homing: Option<EntityId>,
    },
    /// Create an enemy. Only the host originates these.
    SpawnEnemy {
        /// Configured enemy kind.
        kind: EnemyKind,
        /// Spawn position.
        position: Vec2,
        /// Identity assigned by the host; `None` until the host allocates it.
        network_id: Option<NetworkId>,
    },
    /// Remove an entity at the end of the tick.
    TrashEntity {
        /// Entity to remove.
        target: TrashTarget,
    },
    /// Several effects produced by a single update.
    Multi(Vec<Request>),
    /// Move the mode machine immediately.
    SetMode {
        /// Requested mode.
        mode: Mode,
    },
    /// Declare a player ready to enter a mode.
    StartMode {
        /// Player declaring readiness.
        player: PlayerId,
        /// Mode the player wants to enter.
        mode: Mode,
    },
    /// Select a toolbelt slot.
    SelectToolbeltItem {
        /// Player changing the selection.
        player: PlayerId,
        /// Slot to select.
        index: usize,
    },
}

impl Request {
    /// Folds a list of requests into at most one request.
    #[must_use]
    pub fn combine(mut requests: Vec<Request>) -> Option<Request> {
        match requests.len() {
            0 => None,
            1 => requests.pop(),
            _ => Some(Request::Multi(requests)),
        }
    }

    /// Flattens nested aggregates into a list of leaf requests in order.
    pub fn flatten_into(self, out: &mut Vec<Request>) {
        match self {
            Request::Multi(children) => {
                for child in children {
                    child.flatten_into(out);
                }
            }
            leaf => out.push(leaf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_keeps_single_requests_bare() {
        let single = Request::SetMode { mode: Mode::Build };
        assert_eq!(Request::combine(vec![single.clone()]), Some(single));
        assert_eq!(Request::combine(Vec::new()), None);
    }

    #[test]
    fn flatten_preserves_order() {
        let nested = Request::Multi(vec![
            Request::SetMode { mode: Mode::Build },
            Request::Multi(vec![Request::SelectToolbeltItem {
                player: PlayerId::HOST,
                index: 2,
            }]),
            Request::SetMode { mode: Mode::Wave },
        ]);

        let mut flat = Vec::new();
        nested.flatten_into(&mut flat);

        assert_eq!(
            flat,
            vec![
                Request::SetMode { mode: Mode::Build },
                Request::SelectToolbeltItem {
                    player: PlayerId::HOST,
                    index: 2,
                },
                Request::SetMode { mode: Mode::Wave },
            ]
        );
    }
}
