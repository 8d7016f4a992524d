#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Magnet Defence engine.
//!
//! This crate defines the vocabulary that connects adapters, the world and the
//! pure systems. Adapters attach [`Action`] chains to player actors, entity
//! updates inside the world produce [`Request`] values that the world
//! dispatches in a second pass, and the world reports [`Event`] values so that
//! presentation layers can react. Effects that must cross the peer link are
//! expressed as [`PeerMessage`] values.

pub mod action;
pub mod config;
pub mod message;
pub mod physics;
pub mod request;

pub use action::{Action, ActionQueue, ToolKind};
pub use config::{
    BeamTargeting, CellKind, ConfigBundle, EnemyKind, EntityConfig, Level, LevelCell, LevelError,
    LevelLayout, WaveChain, WaveSegment,
};
pub use message::{
    ActionMessage, CoreHealthPayload, Greeting, PeerMessage, SetModePayload, SpawnEnemyPayload,
    StartModePayload, TrashEntityPayload,
};
pub use physics::{Kinematics, Magnetism, Polarity};
pub use request::{Request, ToolUse, TrashTarget};

use serde::{Deserialize, Serialize};

/// Number of simulation ticks per simulated second.
pub const TICKS_PER_SECOND: u32 = 60;

/// Maximum number of player actors a session supports.
pub const MAX_PLAYERS: usize = 2;

/// Local handle assigned to an entity by the world. Never leaves the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Host-assigned identity that correlates an entity across both peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(u64);

impl NetworkId {
    /// Creates a network identity with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identity.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Index of a player actor. Player 0 belongs to the host, player 1 to the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(u8);

impl PlayerId {
    /// Player controlled by the hosting side.
    pub const HOST: PlayerId = PlayerId(0);
    /// Player controlled by the joining side.
    pub const PEER: PlayerId = PlayerId(1);

    /// Creates a player identifier from its slot index.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Slot index of the player.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Slot index widened for indexing player tables.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column().abs_diff(other.column()) + self.row().abs_diff(other.row())
    }
}

/// Global game mode driving what the simulation allows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Session assembled, players not yet building.
    PreGame,
    /// Players place turrets and walls before the next wave.
    Build,
    /// Spawners emit enemies that march on the core.
    Wave,
    /// The core fell.
    Loss,
    /// Every spawner exhausted its waves.
    Victory,
    /// Results screen after a loss or a victory.
    PostGame,
}

impl Mode {
    /// Reports whether the mode machine permits moving from `self` to `next`.
    ///
    /// `Wave` may be re-entered from itself as waves progress.
    #[must_use]
    pub const fn can_transition_to(self, next: Mode) -> bool {
        matches!(
            (self, next),
            (Mode::PreGame, Mode::Build)
                | (Mode::Build, Mode::Wave)
                | (Mode::Wave, Mode::Wave)
                | (Mode::Wave, Mode::Loss)
                | (Mode::Wave, Mode::Victory)
                | (Mode::Loss, Mode::PostGame)
                | (Mode::Victory, Mode::PostGame)
        )
    }

    /// Reports whether the mode ends a session's play. Only the host decides these.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Mode::Loss | Mode::Victory)
    }

    /// Reports whether blocking placements are accepted in this mode.
    #[must_use]
    pub const fn allows_placement(self) -> bool {
        matches!(self, Mode::Build | Mode::Wave)
    }
}

/// Closed set of entity variants simulated by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Player-controlled actor.
    Actor,
    /// Objective the enemies attack.
    Core,
    /// Hostile unit walking toward the core.
    Enemy,
    /// Direct-fire turret.
    Turret,
    /// Homing beam turret.
    TurretBeam,
    /// Shot fired by a turret or actor.
    Projectile,
    /// Cell that emits enemies during waves.
    Spawner,
    /// Inert blocking wall.
    Wall,
}

impl EntityKind {
    /// Number of entity variants.
    pub const COUNT: usize = 8;

    /// Every variant in table order.
    pub const ALL: [EntityKind; Self::COUNT] = [
        EntityKind::Actor,
        EntityKind::Core,
        EntityKind::Enemy,
        EntityKind::Turret,
        EntityKind::TurretBeam,
        EntityKind::Projectile,
        EntityKind::Spawner,
        EntityKind::Wall,
    ];

    /// Position of the variant inside per-kind lookup tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            EntityKind::Actor => 0,
            EntityKind::Core => 1,
            EntityKind::Enemy => 2,
            EntityKind::Turret => 3,
            EntityKind::TurretBeam => 4,
            EntityKind::Projectile => 5,
            EntityKind::Spawner => 6,
            EntityKind::Wall => 7,
        }
    }

    /// Capability flags of the variant.
    #[must_use]
    pub const fn capabilities(self) -> Capabilities {
        CAPABILITIES[self.index()]
    }
}

/// Behavioural traits an entity variant may or may not possess.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Capabilities {
    /// Integrates its own velocity every tick.
    pub movable: bool,
    /// Carries health and takes part in combat resolution.
    pub combat: bool,
    /// Needs a finite route to the objective at all times.
    pub pathfinding: bool,
    /// Occupies its cell exclusively and blocks traversal.
    pub blocking: bool,
}

impl Capabilities {
    const fn new(movable: bool, combat: bool, pathfinding: bool, blocking: bool) -> Self {
        Self {
            movable,
            combat,
            pathfinding,
            blocking,
        }
    }
}

const CAPABILITIES: [Capabilities; EntityKind::COUNT] = [
    Capabilities::new(true, false, false, false),
    Capabilities::new(false, true, false, false),
    Capabilities::new(true, true, true, false),
    Capabilities::new(false, true, false, true),
    Capabilities::new(false, true, false, true),
    Capabilities::new(true, false, false, false),
    Capabilities::new(false, false, true, false),
    Capabilities::new(false, false, false, true),
];

/// Events reported by the world after each tick for presentation layers.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The global mode changed.
    ModeChanged {
        /// Mode before the transition.
        from: Mode,
        /// Mode after the transition.
        to: Mode,
    },
    /// A spawner started a further wave chain while the world stayed in wave mode.
    WaveAdvanced {
        /// One-based number of the wave now running.
        wave: u32,
    },
    /// An entity joined the world.
    EntitySpawned {
        /// Local handle of the new entity.
        entity: EntityId,
        /// Variant of the new entity.
        kind: EntityKind,
        /// Network identity, when the entity is mirrored across peers.
        network_id: Option<NetworkId>,
    },
    /// An entity was trashed and will be pruned at the end of the tick.
    EntityTrashed {
        /// Local handle of the trashed entity.
        entity: EntityId,
        /// Variant of the trashed entity.
        kind: EntityKind,
        /// Network identity, when the entity is mirrored across peers.
        network_id: Option<NetworkId>,
    },
    /// A blocking entity was committed to the grid.
    Placed {
        /// Local handle of the placed entity.
        entity: EntityId,
        /// Variant that was placed.
        kind: EntityKind,
        /// Cell now occupied by the entity.
        cell: CellCoord,
    },
    /// A player selected a toolbelt slot.
    ToolbeltSelected {
        /// Player that changed the selection.
        player: PlayerId,
        /// Slot now selected.
        index: usize,
    },
    /// A player declared readiness for a mode.
    PlayerReady {
        /// Player that became ready.
        player: PlayerId,
        /// Mode the player wants to enter.
        mode: Mode,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = CellCoord::new(1, 1);
        let destination = CellCoord::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert_eq!(destination.manhattan_distance(origin), 5);
    }

    #[test]
    fn capability_table_follows_kind_order() {
        for (index, kind) in EntityKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), index, "{kind:?} out of table order");
        }

        assert!(EntityKind::Enemy.capabilities().pathfinding);
        assert!(EntityKind::Spawner.capabilities().pathfinding);
        assert!(EntityKind::Wall.capabilities().blocking);
        assert!(EntityKind::Turret.capabilities().blocking);
        assert!(!EntityKind::Core.capabilities().blocking);
        assert!(EntityKind::Projectile.capabilities().movable);
    }

    #[test]
    fn mode_machine_follows_game_flow() {
        assert!(Mode::PreGame.can_transition_to(Mode::Build));
        assert!(Mode::Build.can_transition_to(Mode::Wave));
        assert!(Mode::Wave.can_transition_to(Mode::Wave));
        assert!(Mode::Wave.can_transition_to(Mode::Loss));
        assert!(Mode::Wave.can_transition_to(Mode::Victory));
        assert!(Mode::Victory.can_transition_to(Mode::PostGame));
        assert!(Mode::Loss.can_transition_to(Mode::PostGame));

        assert!(!Mode::PreGame.can_transition_to(Mode::Wave));
        assert!(!Mode::Build.can_transition_to(Mode::Victory));
        assert!(!Mode::PostGame.can_transition_to(Mode::Build));
        assert!(!Mode::Loss.can_transition_to(Mode::Victory));
    }

    #[test]
    fn network_id_serializes_as_bare_integer() {
        let json = serde_json::to_string(&NetworkId::new(42)).expect("serialize");
        assert_eq!(json, "42");
    }
}
