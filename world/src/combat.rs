//! Hit detection and objective damage, run by the world after entity updates.

use std::collections::HashSet;

use glam::Vec2;
use magnet_defence_core::{CellCoord, EntityId, PlayerId, Request, TrashTarget};

use crate::{
    entity::{Entity, KindState},
    grid::Grid,
    update::standing_cell,
};

/// Distance at which a projectile connects with an enemy.
pub(crate) const HIT_RADIUS: f32 = 0.4;

/// Points earned by a player for a kill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Award {
    pub(crate) player: PlayerId,
    pub(crate) points: u32,
}

/// Applies projectile hits and objective arrivals.
///
/// Enemy and core health are adjusted in place. Consumed projectiles, dead
/// enemies and enemies that reached the objective are returned as trash
/// requests so that removals flow through the dispatcher. Arrivals only
/// wound the core when `damage_core` is set; otherwise the core's health
/// arrives from the other side.
pub(crate) fn resolve(
    entities: &mut [Entity],
    grid: &Grid,
    objective: CellCoord,
    damage_core: bool,
    out: &mut Vec<Request>,
    awards: &mut Vec<Award>,
) {
    let mut removed: HashSet<EntityId> = HashSet::new();

    let projectiles: Vec<(EntityId, Vec2, f32, Option<PlayerId>)> = entities
        .iter()
        .filter(|entity| entity.is_live())
        .filter_map(|entity| match entity.state {
            KindState::Projectile { damage, owner, .. } => {
                Some((entity.id, entity.kinematics.position, damage, owner))
            }
            _ => None,
        })
        .collect();

    for (projectile, position, damage, owner) in projectiles {
        let Some(enemy) = entities.iter_mut().find(|entity| {
            entity.is_live()
                && matches!(entity.state, KindState::Enemy { .. })
                && entity.health > 0.0
                && entity.kinematics.position.distance(position) <= HIT_RADIUS
        }) else {
            continue;
        };

        enemy.health -= damage;
        out.push(trash(projectile));

        if enemy.health <= 0.0 && removed.insert(enemy.id) {
            out.push(trash(enemy.id));
            if let (Some(player), KindState::Enemy { reward, .. }) = (owner, &enemy.state) {
                awards.push(Award {
                    player,
                    points: *reward,
                });
            }
        }
    }

    let mut core_damage = 0.0;
    for enemy in entities.iter().filter(|entity| entity.is_live()) {
        let KindState::Enemy { damage, .. } = enemy.state else {
            continue;
        };
        if enemy.health <= 0.0 || removed.contains(&enemy.id) {
            continue;
        }
        if standing_cell(grid, enemy.kinematics.position) == Some(objective) {
            core_damage += damage;
            let _ = removed.insert(enemy.id);
            out.push(trash(enemy.id));
        }
    }

    if damage_core && core_damage > 0.0 {
        if let Some(core) = entities
            .iter_mut()
            .find(|entity| entity.is_live() && matches!(entity.state, KindState::Core))
        {
            core.health -= core_damage;
        }
    }
}

fn trash(id: EntityId) -> Request {
    Request::TrashEntity {
        target: TrashTarget::Local(id),
    }
}
