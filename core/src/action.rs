//! Player intent attached to actors.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{CellCoord, EntityKind, Polarity};

/// Tools a player can select from the toolbelt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Places a direct-fire turret.
    Turret,
    /// Places a homing beam turret.
    TurretBeam,
    /// Places a wall.
    Wall,
    /// Hand-held gun that fires projectiles.
    Blaster,
    /// Removes a placed turret or wall.
    Wrench,
}

impl ToolKind {
    /// Entity a placement tool creates, if any.
    #[must_use]
    pub const fn placed_kind(self) -> Option<EntityKind> {
        match self {
            ToolKind::Turret => Some(EntityKind::Turret),
            ToolKind::TurretBeam => Some(EntityKind::TurretBeam),
            ToolKind::Wall => Some(EntityKind::Wall),
            ToolKind::Blaster | ToolKind::Wrench => None,
        }
    }
}

/// Single unit of player intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Walk toward a point until within `arrival_distance` of it.
    Move {
        /// Destination in world units.
        target: Vec2,
        /// Distance at which the move counts as complete.
        arrival_distance: f32,
    },
    /// Use a placement tool on a cell.
    Place {
        /// Cell receiving the new entity.
        cell: CellCoord,
        /// Tool performing the placement.
        tool: ToolKind,
        /// Entity the placement creates.
        entity: EntityKind,
        /// Charge given to the placed entity.
        polarity: Polarity,
    },
    /// Fire the blaster toward a point.
    Shoot {
        /// Point the projectile is aimed at.
        target: Vec2,
        /// Charge of the projectile.
        polarity: Polarity,
    },
}

#[derive(Clone, Debug, PartialEq)]
struct QueuedAction {
    action: Action,
    replaceable: bool,
}

/// Ordered queue of pending actions for one actor.
///
/// The head is the action currently running. Assigning a new chain replaces
/// the whole queue when the head is replaceable; otherwise the head runs to
/// completion and the new chain follows it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionQueue {
    pending: VecDeque<QueuedAction>,
}

impl ActionQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new chain of actions.
    ///
    /// Returns `true` when the chain took over the head immediately.
    pub fn assign(&mut self, chain: Vec<Action>, replaceable: bool) -> bool {
        let head_locked = self
            .pending
            .front()
            .is_some_and(|queued| !queued.replaceable);

        if head_locked {
            self.pending.truncate(1);
        } else {
            self.pending.clear();
        }

        self.pending.extend(chain.into_iter().map(|action| QueuedAction {
            action,
            replaceable,
        }));
        !head_locked
    }

    /// Action currently running, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Action> {
        self.pending.front().map(|queued| &queued.action)
    }

    /// Whether the running action may be replaced wholesale.
    #[must_use]
    pub fn current_replaceable(&self) -> bool {
        self.pending.front().is_some_and(|queued| queued.replaceable)
    }

    /// Marks the running action complete and hands control to the next one.
    pub fn complete(&mut self) -> Option<Action> {
        self.pending.pop_front().map(|queued| queued.action)
    }

    /// Number of queued actions including the running one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Reports whether no action is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every queued action.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(x: f32) -> Action {
        Action::Move {
            target: Vec2::new(x, 0.0),
            arrival_distance: 0.1,
        }
    }

    #[test]
    fn replaceable_head_is_replaced_wholesale() {
        let mut queue = ActionQueue::new();
        assert!(queue.assign(vec![walk(1.0), walk(2.0)], true));
        assert!(queue.assign(vec![walk(5.0)], true));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.current(), Some(&walk(5.0)));
    }

    #[test]
    fn locked_head_runs_to_completion_before_new_chain() {
        let mut queue = ActionQueue::new();
        let _ = queue.assign(vec![walk(1.0), walk(2.0)], false);
        assert!(!queue.assign(vec![walk(7.0)], true));

        assert_eq!(queue.current(), Some(&walk(1.0)));
        assert_eq!(queue.complete(), Some(walk(1.0)));
        assert_eq!(queue.current(), Some(&walk(7.0)));
        assert!(queue.current_replaceable());
        assert_eq!(queue.complete(), Some(walk(7.0)));
        assert!(queue.is_empty());
    }

    #[test]
    fn placement_tools_map_to_entities() {
        assert_eq!(ToolKind::Wall.placed_kind(), Some(EntityKind::Wall));
        assert_eq!(ToolKind::Blaster.placed_kind(), None);
    }
}
