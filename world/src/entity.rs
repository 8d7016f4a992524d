//! Entity records owned by the world.

use std::collections::VecDeque;

use glam::Vec2;
use magnet_defence_core::{
    physics::per_tick, ActionQueue, CellCoord, EnemyKind, EntityConfig, EntityId, EntityKind,
    Kinematics, Magnetism, NetworkId, PlayerId, Polarity,
};
use magnet_defence_system_spawning::WaveCursor;
use magnet_defence_system_tower_targeting::{BeamHead, FireRate};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const SPAWNER_SEED: u64 = 0x6d61_676e_6574_0001;

/// State specific to a single entity variant.
#[derive(Clone, Debug)]
pub(crate) enum KindState {
    Actor {
        player: PlayerId,
        speed: f32,
    },
    Core,
    Enemy {
        archetype: EnemyKind,
        speed: f32,
        damage: f32,
        reward: u32,
    },
    Turret {
        owner: Option<PlayerId>,
        gun: Gun,
    },
    TurretBeam {
        owner: Option<PlayerId>,
        gun: Gun,
        lock: Option<EntityId>,
        head: BeamHead,
    },
    Projectile {
        owner: Option<PlayerId>,
        damage: f32,
        ttl: u32,
        speed: f32,
        homing: Option<EntityId>,
    },
    Spawner {
        index: usize,
        cursor: WaveCursor,
        rng: ChaCha8Rng,
        chain_advanced: bool,
    },
    Wall,
}

/// Firing parameters shared by both turret variants.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Gun {
    pub(crate) fire: FireRate,
    pub(crate) range: f32,
    pub(crate) damage: f32,
    pub(crate) projectile_speed: f32,
    pub(crate) lifetime: u32,
}

impl Gun {
    pub(crate) fn from_config(config: &EntityConfig) -> Self {
        Self {
            fire: FireRate::new(config.attack_rate),
            range: config.attack_range,
            damage: config.damage,
            projectile_speed: per_tick(config.projectile_speed),
            lifetime: config.projectile_lifetime_ticks(),
        }
    }
}

/// Live simulation unit.
#[derive(Clone, Debug)]
pub(crate) struct Entity {
    pub(crate) id: EntityId,
    pub(crate) kind: EntityKind,
    pub(crate) kinematics: Kinematics,
    pub(crate) polarity: Polarity,
    pub(crate) magnetism: Magnetism,
    pub(crate) health: f32,
    pub(crate) max_health: f32,
    pub(crate) trashed: bool,
    pub(crate) actions: ActionQueue,
    pub(crate) network_id: Option<NetworkId>,
    pub(crate) path: VecDeque<CellCoord>,
    pub(crate) anchor: Option<CellCoord>,
    pub(crate) state: KindState,
}

impl Entity {
    fn base(id: EntityId, kind: EntityKind, position: Vec2, config: &EntityConfig) -> Self {
        Self {
            id,
            kind,
            kinematics: Kinematics::at(position),
            polarity: config.polarity,
            magnetism: config.magnetism,
            health: config.health,
            max_health: config.health,
            trashed: false,
            actions: ActionQueue::new(),
            network_id: None,
            path: VecDeque::new(),
            anchor: None,
            state: KindState::Wall,
        }
    }

    pub(crate) fn actor(id: EntityId, player: PlayerId, position: Vec2, config: &EntityConfig) -> Self {
        Self {
            state: KindState::Actor {
                player,
                speed: per_tick(config.speed),
            },
            ..Self::base(id, EntityKind::Actor, position, config)
        }
    }

    pub(crate) fn core(id: EntityId, cell: CellCoord, position: Vec2, config: &EntityConfig) -> Self {
        Self {
            anchor: Some(cell),
            state: KindState::Core,
            ..Self::base(id, EntityKind::Core, position, config)
        }
    }

    pub(crate) fn enemy(
        id: EntityId,
        archetype: EnemyKind,
        position: Vec2,
        network_id: Option<NetworkId>,
        config: &EntityConfig,
    ) -> Self {
        Self {
            network_id,
            state: KindState::Enemy {
                archetype,
                speed: per_tick(config.speed),
                damage: config.damage,
                reward: config.reward,
            },
            ..Self::base(id, EntityKind::Enemy, position, config)
        }
    }

    /// Placed turret, beam turret or wall anchored to `cell`.
    pub(crate) fn placed(
        id: EntityId,
        kind: EntityKind,
        cell: CellCoord,
        position: Vec2,
        polarity: Polarity,
        owner: Option<PlayerId>,
        config: &EntityConfig,
    ) -> Self {
        let state = match kind {
            EntityKind::Turret => KindState::Turret {
                owner,
                gun: Gun::from_config(config),
            },
            EntityKind::TurretBeam => KindState::TurretBeam {
                owner,
                gun: Gun::from_config(config),
                lock: None,
                head: BeamHead::default(),
            },
            _ => KindState::Wall,
        };
        Self {
            polarity,
            anchor: Some(cell),
            state,
            ..Self::base(id, kind, position, config)
        }
    }

    pub(crate) fn projectile(id: EntityId, spawn: ProjectileSpawn, config: &EntityConfig) -> Self {
        let mut entity = Self::base(id, EntityKind::Projectile, spawn.position, config);
        entity.kinematics.velocity = spawn.velocity;
        entity.polarity = spawn.polarity;
        entity.state = KindState::Projectile {
            owner: spawn.owner,
            damage: spawn.damage,
            ttl: spawn.lifetime.max(1),
            speed: spawn.velocity.length(),
            homing: spawn.homing,
        };
        entity
    }

    pub(crate) fn spawner(id: EntityId, index: usize, cell: CellCoord, position: Vec2) -> Self {
        let config = EntityConfig::default();
        Self {
            anchor: Some(cell),
            state: KindState::Spawner {
                index,
                cursor: WaveCursor::new(),
                rng: ChaCha8Rng::seed_from_u64(SPAWNER_SEED ^ index as u64),
                chain_advanced: false,
            },
            ..Self::base(id, EntityKind::Spawner, position, &config)
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        !self.trashed
    }

    pub(crate) fn player(&self) -> Option<PlayerId> {
        match self.state {
            KindState::Actor { player, .. } => Some(player),
            _ => None,
        }
    }

    pub(crate) fn snapshot(&self) -> EntitySnapshot {
        let (player, archetype, head_angle, owner) = match &self.state {
            KindState::Actor { player, .. } => (Some(*player), None, None, None),
            KindState::Enemy { archetype, .. } => (None, Some(archetype.clone()), None, None),
            KindState::Turret { owner, .. } => (None, None, None, *owner),
            KindState::TurretBeam { owner, head, .. } => (None, None, Some(head.angle()), *owner),
            KindState::Projectile { owner, .. } => (None, None, None, *owner),
            KindState::Core | KindState::Spawner { .. } | KindState::Wall => {
                (None, None, None, None)
            }
        };
        EntitySnapshot {
            id: self.id,
            kind: self.kind,
            position: self.kinematics.position,
            velocity: self.kinematics.velocity,
            polarity: self.polarity,
            magnetism: self.magnetism,
            health: self.health,
            max_health: self.max_health,
            network_id: self.network_id,
            cell: self.anchor,
            player,
            owner,
            archetype,
            head_angle,
        }
    }
}

/// Parameters of a projectile about to be created.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ProjectileSpawn {
    pub(crate) owner: Option<PlayerId>,
    pub(crate) position: Vec2,
    pub(crate) velocity: Vec2,
    pub(crate) polarity: Polarity,
    pub(crate) damage: f32,
    pub(crate) lifetime: u32,
    pub(crate) homing: Option<EntityId>,
}

/// Read-only view of an entity at the start of a tick or at query time.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySnapshot {
    /// Local handle.
    pub id: EntityId,
    /// Variant of the entity.
    pub kind: EntityKind,
    /// Position in world units.
    pub position: Vec2,
    /// Velocity in world units per tick.
    pub velocity: Vec2,
    /// Charge of the entity.
    pub polarity: Polarity,
    /// Magnetic field parameters.
    pub magnetism: Magnetism,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Host-assigned identity for mirrored entities.
    pub network_id: Option<NetworkId>,
    /// Cell the entity is anchored to, for grid-bound kinds.
    pub cell: Option<CellCoord>,
    /// Player controlling an actor.
    pub player: Option<PlayerId>,
    /// Player credited with kills by turrets and projectiles.
    pub owner: Option<PlayerId>,
    /// Enemy archetype.
    pub archetype: Option<EnemyKind>,
    /// Head angle of a beam turret in radians.
    pub head_angle: Option<f32>,
}
