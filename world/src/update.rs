//! Per-kind entity updates, dispatched through a table indexed by [`EntityKind`].
//!
//! An update may only touch its own entity: kinematics, health, action queue
//! and kind state. Everything else it wants to happen is returned as a
//! [`Request`] and applied by the dispatcher afterwards.

use glam::Vec2;
use magnet_defence_core::{
    physics::{cell_at, cell_center, clamp_speed, magnetic_force, seek},
    Action, CellCoord, ConfigBundle, EntityId, EntityKind, Mode, PlayerId, Polarity, Request,
    ToolKind, ToolUse, TrashTarget,
};
use magnet_defence_system_spawning::spread_offset;
use magnet_defence_system_tower_targeting::{
    lock_holds, nearest_target, weakest_target, Candidate,
};
use rand::Rng;
use thiserror::Error;

use crate::{
    entity::{Entity, Gun, KindState},
    grid::Grid,
};

/// Distance from a cell centre at which an actor can build on the cell.
pub(crate) const PLACE_REACH: f32 = 1.5;

/// Radius of the circle enemies spawned together are spread on.
const SPAWN_SPREAD: f32 = 0.3;

/// Maximum random offset added to each spawn position on either axis.
const SPAWN_JITTER: f32 = 0.05;

/// Failure raised by a single entity's update.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum UpdateError {
    /// The entity's kinematics or action target left the finite range.
    #[error("entity {entity:?} produced non-finite kinematics")]
    NonFinite {
        /// Offending entity.
        entity: EntityId,
    },
    /// The entity's kind state does not match its kind.
    #[error("entity {entity:?} carries state for a different kind than {kind:?}")]
    StateMismatch {
        /// Offending entity.
        entity: EntityId,
        /// Declared kind.
        kind: EntityKind,
    },
}

/// Read view of the world handed to every update.
pub(crate) struct UpdateContext<'a> {
    pub(crate) enemies: &'a [Candidate],
    pub(crate) grid: &'a Grid,
    pub(crate) config: &'a ConfigBundle,
    pub(crate) mode: Mode,
}

impl UpdateContext<'_> {
    fn position_of(&self, id: EntityId) -> Option<Vec2> {
        self.enemies
            .iter()
            .find(|candidate| candidate.id == id && candidate.health > 0.0)
            .map(|candidate| candidate.position)
    }

    fn inside(&self, position: Vec2) -> bool {
        position.x >= 0.0
            && position.y >= 0.0
            && position.x < self.grid.columns() as f32
            && position.y < self.grid.rows() as f32
    }
}

type UpdateFn = fn(&mut Entity, &UpdateContext<'_>) -> Result<Option<Request>, UpdateError>;

const UPDATES: [UpdateFn; EntityKind::COUNT] = [
    update_actor,
    update_inert,
    update_enemy,
    update_turret,
    update_turret_beam,
    update_projectile,
    update_spawner,
    update_inert,
];

/// Runs the update registered for the entity's kind and checks its kinematics.
pub(crate) fn run(
    entity: &mut Entity,
    context: &UpdateContext<'_>,
) -> Result<Option<Request>, UpdateError> {
    let request = UPDATES[entity.kind.index()](entity, context)?;
    if !entity.kinematics.is_finite() || !entity.health.is_finite() {
        return Err(UpdateError::NonFinite { entity: entity.id });
    }
    Ok(request)
}

fn mismatch(entity: &Entity) -> UpdateError {
    UpdateError::StateMismatch {
        entity: entity.id,
        kind: entity.kind,
    }
}

fn update_inert(
    entity: &mut Entity,
    _context: &UpdateContext<'_>,
) -> Result<Option<Request>, UpdateError> {
    entity.kinematics.velocity = Vec2::ZERO;
    Ok(None)
}

fn update_actor(
    entity: &mut Entity,
    _context: &UpdateContext<'_>,
) -> Result<Option<Request>, UpdateError> {
    let KindState::Actor { speed, .. } = entity.state else {
        return Err(mismatch(entity));
    };

    let Some(action) = entity.actions.current().cloned() else {
        entity.kinematics.velocity = Vec2::ZERO;
        return Ok(None);
    };

    match action {
        Action::Move {
            target,
            arrival_distance,
        } => {
            if !target.is_finite() {
                return Err(UpdateError::NonFinite { entity: entity.id });
            }
            if walk_toward(entity, target, arrival_distance, speed) {
                let _ = entity.actions.complete();
            }
            Ok(None)
        }
        Action::Place {
            cell,
            tool,
            entity: kind,
            polarity,
        } => {
            if !walk_toward(entity, cell_center(cell), PLACE_REACH, speed) {
                return Ok(None);
            }
            let _ = entity.actions.complete();
            let usage = match tool {
                ToolKind::Wrench => ToolUse::Remove { cell },
                _ => ToolUse::Place {
                    cell,
                    entity: kind,
                    polarity,
                },
            };
            Ok(Some(Request::UseTool {
                user: entity.id,
                tool,
                usage,
            }))
        }
        Action::Shoot { target, polarity } => {
            if !target.is_finite() {
                return Err(UpdateError::NonFinite { entity: entity.id });
            }
            entity.kinematics.velocity = Vec2::ZERO;
            let _ = entity.actions.complete();
            Ok(Some(Request::UseTool {
                user: entity.id,
                tool: ToolKind::Blaster,
                usage: ToolUse::Fire { target, polarity },
            }))
        }
    }
}

/// Moves toward `target`; returns `true` once within `arrival` of it.
fn walk_toward(entity: &mut Entity, target: Vec2, arrival: f32, speed: f32) -> bool {
    let position = entity.kinematics.position;
    if position.distance(target) <= arrival {
        entity.kinematics.velocity = Vec2::ZERO;
        return true;
    }
    entity.kinematics.velocity = seek(position, target, speed);
    entity.kinematics.integrate();
    entity.kinematics.position.distance(target) <= arrival
}

fn update_enemy(
    entity: &mut Entity,
    _context: &UpdateContext<'_>,
) -> Result<Option<Request>, UpdateError> {
    let KindState::Enemy { speed, .. } = entity.state else {
        return Err(mismatch(entity));
    };

    let Some(&waypoint) = entity.path.front() else {
        entity.kinematics.velocity = Vec2::ZERO;
        return Ok(None);
    };

    let target = cell_center(waypoint);
    entity.kinematics.velocity = seek(entity.kinematics.position, target, speed);
    entity.kinematics.integrate();
    if entity.kinematics.position.distance_squared(target) <= f32::EPSILON {
        let _ = entity.path.pop_front();
    }
    Ok(None)
}

fn update_turret(
    entity: &mut Entity,
    context: &UpdateContext<'_>,
) -> Result<Option<Request>, UpdateError> {
    let mismatched = mismatch(entity);
    let origin = entity.kinematics.position;
    let polarity = entity.polarity;
    let KindState::Turret { owner, gun } = &mut entity.state else {
        return Err(mismatched);
    };

    let Some(target) = nearest_target(origin, gun.range, context.enemies) else {
        gun.fire.recover();
        return Ok(None);
    };
    let aim = context.position_of(target).unwrap_or(origin);
    if !has_bearing(origin, aim) || !gun.fire.can_fire() {
        return Ok(None);
    }
    Ok(Some(shot(*owner, gun, origin, aim, polarity, None)))
}

fn update_turret_beam(
    entity: &mut Entity,
    context: &UpdateContext<'_>,
) -> Result<Option<Request>, UpdateError> {
    let mismatched = mismatch(entity);
    let origin = entity.kinematics.position;
    let polarity = entity.polarity;
    let KindState::TurretBeam {
        owner,
        gun,
        lock,
        head,
    } = &mut entity.state
    else {
        return Err(mismatched);
    };

    let held = lock.filter(|locked| lock_holds(origin, gun.range, *locked, context.enemies));
    *lock = held.or_else(|| {
        weakest_target(
            origin,
            gun.range,
            polarity,
            context.config.beam_targeting,
            context.enemies,
        )
    });

    let Some(target) = *lock else {
        head.release();
        gun.fire.recover();
        return Ok(None);
    };

    let aim = context.position_of(target).unwrap_or(origin);
    head.oscillate(origin, aim);
    if !has_bearing(origin, aim) || !gun.fire.can_fire() {
        return Ok(None);
    }
    Ok(Some(shot(*owner, gun, origin, aim, polarity, Some(target))))
}

/// A shot needs a direction; an aim point on the muzzle has none.
fn has_bearing(origin: Vec2, aim: Vec2) -> bool {
    origin.distance_squared(aim) > f32::EPSILON
}

fn shot(
    owner: Option<PlayerId>,
    gun: &Gun,
    origin: Vec2,
    aim: Vec2,
    polarity: Polarity,
    homing: Option<EntityId>,
) -> Request {
    Request::SpawnProjectile {
        owner,
        position: origin,
        velocity: (aim - origin).normalize_or_zero() * gun.projectile_speed,
        polarity,
        damage: gun.damage,
        lifetime: gun.lifetime,
        homing,
    }
}

fn update_projectile(
    entity: &mut Entity,
    context: &UpdateContext<'_>,
) -> Result<Option<Request>, UpdateError> {
    let mismatched = mismatch(entity);
    let id = entity.id;
    let position = entity.kinematics.position;
    let polarity = entity.polarity;
    let field = entity.magnetism;
    let KindState::Projectile {
        ttl,
        speed,
        homing,
        ..
    } = &mut entity.state
    else {
        return Err(mismatched);
    };

    *ttl = ttl.saturating_sub(1);
    if *ttl == 0 {
        return Ok(Some(trash(id)));
    }

    let mut velocity = entity.kinematics.velocity;
    match homing.and_then(|target| context.position_of(target)) {
        Some(target) => velocity = seek(position, target, *speed),
        None => {
            *homing = None;
            for enemy in context.enemies {
                velocity += magnetic_force(position, polarity, enemy.position, enemy.polarity, field);
            }
            velocity = clamp_speed(velocity, *speed);
        }
    }

    entity.kinematics.velocity = velocity;
    entity.kinematics.integrate();

    if !context.inside(entity.kinematics.position) {
        return Ok(Some(trash(id)));
    }
    Ok(None)
}

fn update_spawner(
    entity: &mut Entity,
    context: &UpdateContext<'_>,
) -> Result<Option<Request>, UpdateError> {
    let mismatched = mismatch(entity);
    let origin = entity.kinematics.position;
    let KindState::Spawner {
        cursor,
        rng,
        chain_advanced,
        ..
    } = &mut entity.state
    else {
        return Err(mismatched);
    };

    if context.mode != Mode::Wave {
        return Ok(None);
    }

    let tick = cursor.tick();
    *chain_advanced |= tick.chain_advanced;
    let Some(emission) = tick.emission else {
        return Ok(None);
    };

    let count = emission.kinds.len();
    let requests = emission
        .kinds
        .into_iter()
        .enumerate()
        .map(|(index, kind)| {
            let (dx, dy) = spread_offset(index, count, SPAWN_SPREAD);
            let jitter = Vec2::new(
                rng.gen_range(-SPAWN_JITTER..=SPAWN_JITTER),
                rng.gen_range(-SPAWN_JITTER..=SPAWN_JITTER),
            );
            Request::SpawnEnemy {
                kind,
                position: origin + Vec2::new(dx, dy) + jitter,
                network_id: None,
            }
        })
        .collect();
    Ok(Request::combine(requests))
}

fn trash(id: EntityId) -> Request {
    Request::TrashEntity {
        target: TrashTarget::Local(id),
    }
}

/// Cell an entity currently stands on, if inside the grid.
pub(crate) fn standing_cell(grid: &Grid, position: Vec2) -> Option<CellCoord> {
    cell_at(position).filter(|cell| grid.contains(*cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use magnet_defence_core::Level;

    fn turret_on(cell: CellCoord, config: &ConfigBundle) -> Entity {
        Entity::placed(
            EntityId::new(1),
            EntityKind::Turret,
            cell,
            cell_center(cell),
            Polarity::Positive,
            Some(PlayerId::HOST),
            &config.turret,
        )
    }

    fn grid() -> Grid {
        let layout = Level::from_ascii("update", &["S...O"], Vec::new())
            .parse_layout()
            .expect("valid layout");
        Grid::from_layout(&layout)
    }

    fn enemy_at(position: Vec2) -> Candidate {
        Candidate {
            id: EntityId::new(2),
            position,
            health: 3.0,
            polarity: Polarity::Negative,
        }
    }

    fn fire_ready(turret: &Entity) -> bool {
        match &turret.state {
            KindState::Turret { gun, .. } => gun.fire.is_ready(),
            _ => false,
        }
    }

    #[test]
    fn turret_fires_at_an_enemy_in_range() {
        let config = ConfigBundle::standard();
        let grid = grid();
        let cell = CellCoord::new(2, 0);
        let mut turret = turret_on(cell, &config);
        let enemies = [enemy_at(cell_center(cell) + Vec2::new(1.0, 0.0))];
        let context = UpdateContext {
            enemies: &enemies,
            grid: &grid,
            config: &config,
            mode: Mode::Wave,
        };

        let request = run(&mut turret, &context).expect("update succeeds");
        let Some(Request::SpawnProjectile { velocity, .. }) = request else {
            panic!("expected a projectile, got {request:?}");
        };
        assert!(velocity.x > 0.0 && velocity.y.abs() < 1e-6);
        assert!(!fire_ready(&turret));
    }

    #[test]
    fn turret_holds_fire_when_the_aim_point_is_its_own_position() {
        let config = ConfigBundle::standard();
        let grid = grid();
        let cell = CellCoord::new(2, 0);
        let mut turret = turret_on(cell, &config);
        let enemies = [enemy_at(cell_center(cell))];
        let context = UpdateContext {
            enemies: &enemies,
            grid: &grid,
            config: &config,
            mode: Mode::Wave,
        };

        assert_eq!(run(&mut turret, &context).expect("update succeeds"), None);
        assert!(fire_ready(&turret), "the fire window is not spent on a dud");
    }
}
