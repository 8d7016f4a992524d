#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Magnet Defence.
//!
//! The world owns the grid, every entity, the global mode and the wave
//! bindings. Each [`tick`] runs in two phases: entity updates read a snapshot
//! of the world and return [`Request`] values, then a single dispatcher applies
//! those requests after passing them through the host-authority filter.
//! Effects that must reach the other peer are appended to the caller's
//! outbound message list.

mod combat;
mod entity;
mod grid;
mod navigation;
mod update;

use std::{collections::VecDeque, sync::Arc};

use glam::Vec2;
use magnet_defence_core::{
    physics::{cell_center, per_tick},
    Action, ActionMessage, CellCoord, ConfigBundle, CoreHealthPayload, EnemyKind, EntityId,
    EntityKind, Event, Level, LevelError, Mode, NetworkId, PeerMessage, PlayerId, Polarity,
    Request, ToolKind, ToolUse, TrashEntityPayload, TrashTarget, WaveChain,
};
use magnet_defence_system_replication::{Authority, Origin, Replication};
use magnet_defence_system_tower_targeting::Candidate;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

pub use entity::EntitySnapshot;
pub use grid::{Cell, Grid, IMPASSABLE};
pub use update::UpdateError;

use entity::{Entity, KindState, ProjectileSpawn};
use navigation::{PathCache, ReachabilityField};
use update::{standing_cell, UpdateContext};

/// Errors raised while building a world from a level.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The level layout failed validation.
    #[error(transparent)]
    Level(#[from] LevelError),
    /// A wave chain names an enemy archetype the configuration lacks.
    #[error("wave chain {chain} spawns unknown enemy kind `{kind}`")]
    UnknownEnemy {
        /// Index of the offending chain.
        chain: usize,
        /// Name of the missing archetype.
        kind: String,
    },
    /// A spawner cannot reach the objective on the initial grid.
    #[error("spawner at column {}, row {} has no route to the objective", .cell.column(), .cell.row())]
    UnreachableSpawner {
        /// Cell of the spawner.
        cell: CellCoord,
    },
}

/// Per-player session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerState {
    points: u32,
    toolbelt_index: usize,
    ready: Option<Mode>,
}

impl PlayerState {
    /// Points available for placements.
    #[must_use]
    pub const fn points(&self) -> u32 {
        self.points
    }

    /// Selected toolbelt slot.
    #[must_use]
    pub const fn toolbelt_index(&self) -> usize {
        self.toolbelt_index
    }

    /// Mode the player declared readiness for, if any.
    #[must_use]
    pub const fn ready(&self) -> Option<Mode> {
        self.ready
    }
}

/// Outcome of applying a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Applied {
    Ignored,
    Done,
    Trashed(Option<NetworkId>),
}

/// Represents the authoritative Magnet Defence world state.
#[derive(Debug)]
pub struct World {
    config: Arc<ConfigBundle>,
    level_name: String,
    tileset: String,
    grid: Grid,
    objective: CellCoord,
    entities: Vec<Entity>,
    next_entity: u32,
    mode: Mode,
    waves: Vec<WaveChain>,
    wave: u32,
    players: Vec<PlayerState>,
    replication: Replication,
    path_cache: PathCache,
    geometry_dirty: bool,
    pending: Vec<Request>,
    tick_index: u64,
}

impl World {
    /// Builds a world from a level description and a configuration bundle.
    ///
    /// The core is placed on the objective, one spawner on every spawn cell
    /// and one actor per player start, in row-major order.
    pub fn new(
        level: &Level,
        config: Arc<ConfigBundle>,
        authority: Authority,
    ) -> Result<Self, WorldError> {
        let layout = level.parse_layout()?;
        for (chain_index, chain) in level.waves.iter().enumerate() {
            let unknown = chain
                .segments
                .iter()
                .flat_map(|segment| segment.enemies.iter())
                .find(|kind| config.enemy(kind).is_none());
            if let Some(kind) = unknown {
                return Err(WorldError::UnknownEnemy {
                    chain: chain_index,
                    kind: kind.as_str().to_owned(),
                });
            }
        }

        let mut world = Self {
            grid: Grid::from_layout(&layout),
            objective: layout.objective,
            level_name: level.name.clone(),
            tileset: level.tileset.clone(),
            entities: Vec::new(),
            next_entity: 1,
            mode: Mode::PreGame,
            waves: level.waves.clone(),
            wave: 0,
            players: Vec::new(),
            replication: Replication::new(authority),
            path_cache: PathCache::default(),
            geometry_dirty: false,
            pending: Vec::new(),
            tick_index: 0,
            config,
        };

        let core_id = world.allocate_id();
        let core = Entity::core(
            core_id,
            layout.objective,
            cell_center(layout.objective),
            &world.config.core,
        );
        world.entities.push(core);
        world.grid.occupy(layout.objective, core_id, false);

        for (index, &cell) in layout.spawners.iter().enumerate() {
            let id = world.allocate_id();
            world
                .entities
                .push(Entity::spawner(id, index, cell, cell_center(cell)));
            world.grid.occupy(cell, id, false);
        }

        for (index, &cell) in layout.player_starts.iter().enumerate() {
            let id = world.allocate_id();
            let player = PlayerId::new(index as u8);
            world.entities.push(Entity::actor(
                id,
                player,
                cell_center(cell),
                &world.config.actor,
            ));
            world.players.push(PlayerState {
                points: world.config.starting_points,
                toolbelt_index: 0,
                ready: None,
            });
        }

        world.recompute_paths();
        let stranded = world.entities.iter().find(|entity| {
            entity.kind == EntityKind::Spawner
                && entity.path.is_empty()
                && entity.anchor != Some(world.objective)
        });
        if let Some(spawner) = stranded {
            return Err(WorldError::UnreachableSpawner {
                cell: spawner.anchor.unwrap_or(world.objective),
            });
        }

        info!(
            level = %world.level_name,
            columns = world.grid.columns(),
            rows = world.grid.rows(),
            players = world.players.len(),
            ?authority,
            "world ready"
        );
        Ok(world)
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId::new(self.next_entity);
        self.next_entity += 1;
        id
    }

    fn receive(
        &mut self,
        message: PeerMessage,
        out_events: &mut Vec<Event>,
        out_messages: &mut Vec<PeerMessage>,
    ) {
        match message {
            PeerMessage::Greeting(greeting) => info!(text = %greeting.text, "peer greeted"),
            PeerMessage::Action(message) => {
                if !self.assign(message.player, message.actions, message.replaceable) {
                    debug!(player = message.player.get(), "actions for unknown player dropped");
                }
            }
            PeerMessage::CoreHealth(payload) => self.adopt_core_health(payload.health),
            effect => {
                if let Some(request) = effect.into_request() {
                    self.dispatch(request, Origin::Remote, out_events, out_messages);
                }
            }
        }
    }

    fn assign(&mut self, player: PlayerId, actions: Vec<Action>, replaceable: bool) -> bool {
        let Some(actor) = self
            .entities
            .iter_mut()
            .find(|entity| entity.is_live() && entity.player() == Some(player))
        else {
            return false;
        };
        let _ = actor.actions.assign(actions, replaceable);
        true
    }

    fn update_entities(&mut self) -> Vec<Request> {
        let enemies: Vec<Candidate> = self
            .entities
            .iter()
            .filter(|entity| entity.is_live() && entity.kind == EntityKind::Enemy)
            .map(|entity| Candidate {
                id: entity.id,
                position: entity.kinematics.position,
                health: entity.health,
                polarity: entity.polarity,
            })
            .collect();
        let context = UpdateContext {
            enemies: &enemies,
            grid: &self.grid,
            config: self.config.as_ref(),
            mode: self.mode,
        };

        let mut requests = Vec::new();
        for entity in self.entities.iter_mut().filter(|entity| entity.is_live()) {
            match update::run(entity, &context) {
                Ok(Some(request)) => requests.push(request),
                Ok(None) => {}
                Err(error) => {
                    warn!(%error, entity = entity.id.get(), kind = ?entity.kind, "entity update failed, trashing entity");
                    requests.push(Request::TrashEntity {
                        target: TrashTarget::Local(entity.id),
                    });
                }
            }
        }
        requests
    }

    fn note_wave_progress(&mut self, out_events: &mut Vec<Event>) {
        let mut advanced = false;
        for entity in &mut self.entities {
            if let KindState::Spawner { chain_advanced, .. } = &mut entity.state {
                advanced |= std::mem::take(chain_advanced);
            }
        }
        if advanced && self.mode == Mode::Wave {
            self.wave += 1;
            out_events.push(Event::ModeChanged {
                from: Mode::Wave,
                to: Mode::Wave,
            });
            out_events.push(Event::WaveAdvanced { wave: self.wave });
            info!(wave = self.wave, "wave advanced");
        }
    }

    fn dispatch(
        &mut self,
        request: Request,
        origin: Origin,
        out_events: &mut Vec<Event>,
        out_messages: &mut Vec<PeerMessage>,
    ) {
        let mut leaves = Vec::new();
        request.flatten_into(&mut leaves);

        for leaf in leaves {
            let Some(admitted) = self.replication.admit(leaf, origin) else {
                trace!(?origin, "request dropped by authority filter");
                continue;
            };

            let outcome = self.apply(&admitted.request, out_events);
            if !admitted.forward {
                continue;
            }
            match outcome {
                Applied::Trashed(Some(network_id)) => {
                    out_messages.push(PeerMessage::TrashEntity(TrashEntityPayload { network_id }));
                }
                Applied::Done => {
                    if let Some(message) = PeerMessage::from_request(&admitted.request) {
                        out_messages.push(message);
                    }
                }
                Applied::Trashed(None) | Applied::Ignored => {}
            }
        }
    }

    fn apply(&mut self, request: &Request, out_events: &mut Vec<Event>) -> Applied {
        match request {
            Request::UseTool { user, tool, usage } => {
                self.use_tool(*user, *tool, usage, out_events)
            }
            Request::SpawnProjectile {
                owner,
                position,
                velocity,
                polarity,
                damage,
                lifetime,
                homing,
            } => self.spawn_projectile(
                ProjectileSpawn {
                    owner: *owner,
                    position: *position,
                    velocity: *velocity,
                    polarity: *polarity,
                    damage: *damage,
                    lifetime: *lifetime,
                    homing: *homing,
                },
                out_events,
            ),
            Request::SpawnEnemy {
                kind,
                position,
                network_id,
            } => self.spawn_enemy(kind, *position, *network_id, out_events),
            Request::TrashEntity { target } => self.trash(*target, out_events),
            Request::Multi(_) => Applied::Ignored,
            Request::SetMode { mode } => {
                if !self.mode.can_transition_to(*mode) {
                    debug!(from = ?self.mode, to = ?mode, "illegal mode change ignored");
                    return Applied::Ignored;
                }
                self.transition(*mode, out_events);
                Applied::Done
            }
            Request::StartMode { player, mode } => self.start_mode(*player, *mode, out_events),
            Request::SelectToolbeltItem { player, index } => {
                let slots = self.config.toolbelt.len();
                let Some(state) = self.players.get_mut(player.index()) else {
                    return Applied::Ignored;
                };
                if *index >= slots {
                    debug!(index, slots, "toolbelt slot out of range");
                    return Applied::Ignored;
                }
                state.toolbelt_index = *index;
                out_events.push(Event::ToolbeltSelected {
                    player: *player,
                    index: *index,
                });
                Applied::Done
            }
        }
    }

    fn use_tool(
        &mut self,
        user: EntityId,
        tool: ToolKind,
        usage: &ToolUse,
        out_events: &mut Vec<Event>,
    ) -> Applied {
        let Some((player, origin)) = self
            .entities
            .iter()
            .find(|entity| entity.is_live() && entity.id == user)
            .and_then(|actor| Some((actor.player()?, actor.kinematics.position)))
        else {
            debug!(user = user.get(), "tool used by unknown actor");
            return Applied::Ignored;
        };
        if !self.config.toolbelt.contains(&tool) {
            debug!(?tool, "tool missing from toolbelt");
            return Applied::Ignored;
        }

        match usage {
            ToolUse::Place {
                cell,
                entity,
                polarity,
            } => self.place(player, tool, *cell, *entity, *polarity, out_events),
            ToolUse::Fire { target, polarity } => {
                if tool != ToolKind::Blaster {
                    return Applied::Ignored;
                }
                let tuning = self.config.projectile;
                let spawn = ProjectileSpawn {
                    owner: Some(player),
                    position: origin,
                    velocity: (*target - origin).normalize_or_zero()
                        * per_tick(tuning.projectile_speed),
                    polarity: *polarity,
                    damage: tuning.damage,
                    lifetime: tuning.projectile_lifetime_ticks(),
                    homing: None,
                };
                self.spawn_projectile(spawn, out_events)
            }
            ToolUse::Remove { cell } => {
                if tool != ToolKind::Wrench || !self.mode.allows_placement() {
                    return Applied::Ignored;
                }
                let occupant = self.grid.cell(*cell).and_then(Cell::occupant);
                let removable = occupant.filter(|id| {
                    self.entities.iter().any(|entity| {
                        entity.is_live() && entity.id == *id && entity.kind.capabilities().blocking
                    })
                });
                match removable {
                    Some(id) => self.trash(TrashTarget::Local(id), out_events),
                    None => {
                        debug!(?cell, "nothing removable on cell");
                        Applied::Ignored
                    }
                }
            }
        }
    }

    fn place(
        &mut self,
        player: PlayerId,
        tool: ToolKind,
        cell: CellCoord,
        kind: EntityKind,
        polarity: Polarity,
        out_events: &mut Vec<Event>,
    ) -> Applied {
        if !self.mode.allows_placement() {
            debug!(?cell, mode = ?self.mode, "placement outside build modes ignored");
            return Applied::Ignored;
        }
        if tool.placed_kind() != Some(kind) {
            debug!(?tool, ?kind, "tool cannot place this entity");
            return Applied::Ignored;
        }
        let Some(tuning) = self.config.entity(kind).copied() else {
            return Applied::Ignored;
        };
        let Some(points) = self.players.get(player.index()).map(PlayerState::points) else {
            return Applied::Ignored;
        };
        if points < tuning.cost {
            debug!(points, cost = tuning.cost, "insufficient points for placement");
            return Applied::Ignored;
        }
        if !self.is_placement_valid(cell) {
            debug!(?cell, ?kind, "invalid placement ignored");
            return Applied::Ignored;
        }

        let id = self.allocate_id();
        self.entities.push(Entity::placed(
            id,
            kind,
            cell,
            cell_center(cell),
            polarity,
            Some(player),
            &tuning,
        ));
        self.grid.occupy(cell, id, true);
        if let Some(state) = self.players.get_mut(player.index()) {
            state.points -= tuning.cost;
        }
        self.geometry_dirty = true;

        out_events.push(Event::EntitySpawned {
            entity: id,
            kind,
            network_id: None,
        });
        out_events.push(Event::Placed {
            entity: id,
            kind,
            cell,
        });
        Applied::Done
    }

    fn is_placement_valid(&self, cell: CellCoord) -> bool {
        if !self.grid.cell(cell).is_some_and(Cell::is_buildable) {
            return false;
        }
        let stood_on = self.entities.iter().any(|entity| {
            entity.is_live()
                && matches!(entity.kind, EntityKind::Enemy | EntityKind::Actor)
                && standing_cell(&self.grid, entity.kinematics.position) == Some(cell)
        });
        if stood_on {
            return false;
        }

        let mut field = ReachabilityField::default();
        field.rebuild_with(&self.grid, self.objective, |candidate| {
            candidate != cell && self.grid.is_traversable(candidate)
        });

        self.entities
            .iter()
            .filter(|entity| entity.is_live() && entity.kind.capabilities().pathfinding)
            .filter_map(|entity| {
                entity
                    .anchor
                    .or_else(|| standing_cell(&self.grid, entity.kinematics.position))
            })
            .all(|start| field.reaches(start))
    }

    fn spawn_projectile(&mut self, spawn: ProjectileSpawn, out_events: &mut Vec<Event>) -> Applied {
        if !spawn.position.is_finite() || !spawn.velocity.is_finite() {
            warn!("projectile with non-finite kinematics ignored");
            return Applied::Ignored;
        }
        let id = self.allocate_id();
        self.entities
            .push(Entity::projectile(id, spawn, &self.config.projectile));
        out_events.push(Event::EntitySpawned {
            entity: id,
            kind: EntityKind::Projectile,
            network_id: None,
        });
        Applied::Done
    }

    fn spawn_enemy(
        &mut self,
        kind: &EnemyKind,
        position: Vec2,
        network_id: Option<NetworkId>,
        out_events: &mut Vec<Event>,
    ) -> Applied {
        if !position.is_finite() {
            warn!(kind = kind.as_str(), "enemy spawn with non-finite position ignored");
            return Applied::Ignored;
        }
        let Some(tuning) = self.config.enemy(kind).copied() else {
            warn!(kind = kind.as_str(), "enemy spawn with unknown kind ignored");
            return Applied::Ignored;
        };
        if let Some(network_id) = network_id {
            if self
                .entities
                .iter()
                .any(|entity| entity.network_id == Some(network_id))
            {
                debug!(network_id = network_id.get(), "duplicate enemy spawn ignored");
                return Applied::Ignored;
            }
        }

        let id = self.allocate_id();
        let mut enemy = Entity::enemy(id, kind.clone(), position, network_id, &tuning);
        if let Some(start) = standing_cell(&self.grid, position) {
            enemy.path = self
                .path_cache
                .route(&self.grid, start, self.objective)
                .map(VecDeque::from)
                .unwrap_or_default();
        }
        self.entities.push(enemy);

        trace!(entity = id.get(), kind = kind.as_str(), ?network_id, "enemy spawned");
        out_events.push(Event::EntitySpawned {
            entity: id,
            kind: EntityKind::Enemy,
            network_id,
        });
        Applied::Done
    }

    fn trash(&mut self, target: TrashTarget, out_events: &mut Vec<Event>) -> Applied {
        let Some(entity) = self.entities.iter_mut().find(|entity| {
            entity.is_live()
                && match target {
                    TrashTarget::Local(id) => entity.id == id,
                    TrashTarget::Network(network_id) => entity.network_id == Some(network_id),
                }
        }) else {
            trace!(?target, "trash target already gone");
            return Applied::Ignored;
        };

        entity.trashed = true;
        let (id, kind, network_id, anchor) =
            (entity.id, entity.kind, entity.network_id, entity.anchor);
        if let Some(cell) = anchor {
            if self.grid.vacate(cell, id) {
                self.geometry_dirty = true;
            }
        }

        out_events.push(Event::EntityTrashed {
            entity: id,
            kind,
            network_id,
        });
        Applied::Trashed(network_id)
    }

    fn start_mode(&mut self, player: PlayerId, mode: Mode, out_events: &mut Vec<Event>) -> Applied {
        let Some(state) = self.players.get_mut(player.index()) else {
            debug!(player = player.get(), "readiness from unknown player ignored");
            return Applied::Ignored;
        };
        state.ready = Some(mode);
        out_events.push(Event::PlayerReady { player, mode });

        let everyone_ready = self.players.iter().all(|state| state.ready == Some(mode));
        if everyone_ready {
            if self.mode.can_transition_to(mode) {
                self.transition(mode, out_events);
            } else {
                debug!(from = ?self.mode, to = ?mode, "players ready for an unreachable mode");
            }
        }
        Applied::Done
    }

    fn transition(&mut self, to: Mode, out_events: &mut Vec<Event>) {
        let from = self.mode;
        self.mode = to;
        for state in &mut self.players {
            state.ready = None;
        }
        info!(?from, ?to, "mode changed");
        out_events.push(Event::ModeChanged { from, to });

        if from == Mode::Build && to == Mode::Wave {
            self.bind_waves();
            self.wave = 1;
            out_events.push(Event::WaveAdvanced { wave: self.wave });
        }
    }

    fn bind_waves(&mut self) {
        for chain in &self.waves {
            for entity in &mut self.entities {
                if let KindState::Spawner { index, cursor, .. } = &mut entity.state {
                    if *index == chain.spawner {
                        cursor.bind(chain);
                    }
                }
            }
        }
    }

    fn core_health(&self) -> Option<f32> {
        self.entities
            .iter()
            .find(|entity| entity.is_live() && entity.kind == EntityKind::Core)
            .map(|core| core.health)
    }

    fn adopt_core_health(&mut self, health: f32) {
        if self.replication.authority().is_host() || !health.is_finite() {
            debug!(health, "core health update dropped");
            return;
        }
        if let Some(core) = self
            .entities
            .iter_mut()
            .find(|entity| entity.is_live() && entity.kind == EntityKind::Core)
        {
            core.health = health;
        }
    }

    fn spawners_complete(&self) -> bool {
        self.entities.iter().all(|entity| match &entity.state {
            KindState::Spawner { cursor, .. } => cursor.is_complete(),
            _ => true,
        })
    }

    /// Ends play on the host; the peer waits for the host's verdict.
    fn resolve_mode(&mut self, out_events: &mut Vec<Event>, out_messages: &mut Vec<PeerMessage>) {
        if self.mode != Mode::Wave || !self.replication.authority().is_host() {
            return;
        }
        let outcome = if self.core_health().is_some_and(|health| health <= 0.0) {
            Mode::Loss
        } else if self.spawners_complete()
            && !self
                .entities
                .iter()
                .any(|entity| entity.is_live() && entity.kind == EntityKind::Enemy)
        {
            Mode::Victory
        } else {
            return;
        };
        self.dispatch(
            Request::SetMode { mode: outcome },
            Origin::Local,
            out_events,
            out_messages,
        );
    }

    fn recompute_paths(&mut self) {
        self.path_cache.clear();
        let goal = self.objective;
        for entity in self
            .entities
            .iter_mut()
            .filter(|entity| entity.is_live() && entity.kind.capabilities().pathfinding)
        {
            let start = entity
                .anchor
                .or_else(|| standing_cell(&self.grid, entity.kinematics.position));
            entity.path = start
                .and_then(|start| self.path_cache.route(&self.grid, start, goal))
                .map(VecDeque::from)
                .unwrap_or_default();
        }
        self.geometry_dirty = false;
    }
}

/// Advances the world by one fixed tick.
///
/// Inbound peer messages are applied first, then every live entity updates,
/// combat resolves, and all produced requests are dispatched. On the host a
/// changed core health and the end of play are sent to the peer. Events for
/// presentation layers and messages for the peer are appended to the output
/// buffers.
pub fn tick(
    world: &mut World,
    inbound: Vec<PeerMessage>,
    out_events: &mut Vec<Event>,
    out_messages: &mut Vec<PeerMessage>,
) {
    world.tick_index = world.tick_index.saturating_add(1);

    for message in inbound {
        world.receive(message, out_events, out_messages);
    }

    let mut requests = world.update_entities();
    world.note_wave_progress(out_events);

    let is_host = world.replication.authority().is_host();
    let health_before = world.core_health();
    let mut awards = Vec::new();
    combat::resolve(
        &mut world.entities,
        &world.grid,
        world.objective,
        is_host,
        &mut requests,
        &mut awards,
    );
    if is_host && world.core_health() != health_before {
        if let Some(health) = world.core_health() {
            out_messages.push(PeerMessage::CoreHealth(CoreHealthPayload { health }));
        }
    }
    for award in awards {
        if let Some(state) = world.players.get_mut(award.player.index()) {
            state.points = state.points.saturating_add(award.points);
        }
    }

    requests.append(&mut world.pending);
    for request in requests {
        world.dispatch(request, Origin::Local, out_events, out_messages);
    }

    world.resolve_mode(out_events, out_messages);
    world.entities.retain(Entity::is_live);
    if world.geometry_dirty {
        world.recompute_paths();
    }
}

/// Attaches an action chain to a player's actor and queues it for the peer.
///
/// Returns `false` when the player has no live actor.
pub fn assign_actions(
    world: &mut World,
    player: PlayerId,
    actions: Vec<Action>,
    replaceable: bool,
    out_messages: &mut Vec<PeerMessage>,
) -> bool {
    if !world.assign(player, actions.clone(), replaceable) {
        return false;
    }
    out_messages.push(PeerMessage::Action(ActionMessage {
        player,
        actions,
        replaceable,
    }));
    true
}

/// Queues a locally originated request for dispatch on the next tick.
pub fn submit(world: &mut World, request: Request) {
    world.pending.push(request);
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use magnet_defence_core::{CellCoord, EntityId, EntityKind, Mode, NetworkId, PlayerId, ToolKind};
    use magnet_defence_system_replication::Authority;

    use super::{navigation, EntitySnapshot, Grid, PlayerState, World};

    /// Current global mode.
    #[must_use]
    pub fn mode(world: &World) -> Mode {
        world.mode
    }

    /// Authority this side was assigned when the session was established.
    #[must_use]
    pub fn authority(world: &World) -> Authority {
        world.replication.authority()
    }

    /// Provides read-only access to the cell grid.
    #[must_use]
    pub fn grid(world: &World) -> &Grid {
        &world.grid
    }

    /// Cell holding the core.
    #[must_use]
    pub fn objective(world: &World) -> CellCoord {
        world.objective
    }

    /// Display name of the loaded level.
    #[must_use]
    pub fn level_name(world: &World) -> &str {
        &world.level_name
    }

    /// Tileset requested by the loaded level.
    #[must_use]
    pub fn tileset(world: &World) -> &str {
        &world.tileset
    }

    /// Number of ticks simulated so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// One-based number of the running wave, zero before the first wave.
    #[must_use]
    pub fn wave(world: &World) -> u32 {
        world.wave
    }

    /// Per-player state indexed by [`PlayerId::index`].
    #[must_use]
    pub fn players(world: &World) -> &[PlayerState] {
        &world.players
    }

    /// Toolbelt slots shared by every player.
    #[must_use]
    pub fn toolbelt(world: &World) -> &[ToolKind] {
        &world.config.toolbelt
    }

    /// Current health of the core.
    #[must_use]
    pub fn core_health(world: &World) -> Option<f32> {
        world.core_health()
    }

    /// Reports whether every spawner is idle with nothing queued.
    #[must_use]
    pub fn spawners_complete(world: &World) -> bool {
        world.spawners_complete()
    }

    /// Reports whether a blocking entity could be committed to the cell now.
    ///
    /// The cell must be open, unoccupied and free of entities, and blocking it
    /// must leave every pathfinding entity a finite route to the objective.
    #[must_use]
    pub fn is_placement_valid(world: &World, cell: CellCoord) -> bool {
        world.is_placement_valid(cell)
    }

    /// Cheapest route from a cell to the objective on the current grid.
    #[must_use]
    pub fn route_from(world: &World, start: CellCoord) -> Option<Vec<CellCoord>> {
        navigation::find_path(&world.grid, start, world.objective)
    }

    /// Remaining step queue of a pathfinding entity.
    #[must_use]
    pub fn path(world: &World, entity: EntityId) -> Option<Vec<CellCoord>> {
        world
            .entities
            .iter()
            .find(|candidate| candidate.is_live() && candidate.id == entity)
            .map(|found| found.path.iter().copied().collect())
    }

    /// Local handle of the actor controlled by `player`.
    #[must_use]
    pub fn actor(world: &World, player: PlayerId) -> Option<EntityId> {
        world
            .entities
            .iter()
            .find(|entity| entity.is_live() && entity.player() == Some(player))
            .map(|entity| entity.id)
    }

    /// Local handle of the live entity carrying a network identity.
    #[must_use]
    pub fn by_network_id(world: &World, network_id: NetworkId) -> Option<EntityId> {
        world
            .entities
            .iter()
            .find(|entity| entity.is_live() && entity.network_id == Some(network_id))
            .map(|entity| entity.id)
    }

    /// Captures a read-only view of the live entities in collection order.
    #[must_use]
    pub fn entity_view(world: &World) -> EntityView {
        EntityView {
            snapshots: world
                .entities
                .iter()
                .filter(|entity| entity.is_live())
                .map(|entity| entity.snapshot())
                .collect(),
        }
    }

    /// Read-only snapshot of every live entity.
    #[derive(Clone, Debug, Default)]
    pub struct EntityView {
        snapshots: Vec<EntitySnapshot>,
    }

    impl EntityView {
        /// Iterator over the snapshots in collection order.
        pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
            self.snapshots.iter()
        }

        /// Iterator over the snapshots of one kind.
        pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &EntitySnapshot> {
            self.snapshots
                .iter()
                .filter(move |snapshot| snapshot.kind == kind)
        }

        /// Snapshot of a specific entity.
        #[must_use]
        pub fn get(&self, id: EntityId) -> Option<&EntitySnapshot> {
            self.snapshots.iter().find(|snapshot| snapshot.id == id)
        }

        /// Number of live entities.
        #[must_use]
        pub fn len(&self) -> usize {
            self.snapshots.len()
        }

        /// Reports whether the view is empty.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.snapshots.is_empty()
        }

        /// Consumes the view, returning the snapshots.
        #[must_use]
        pub fn into_vec(self) -> Vec<EntitySnapshot> {
            self.snapshots
        }
    }
}
