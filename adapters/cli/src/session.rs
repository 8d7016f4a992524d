//! Fixed-rate session driver shared by linked and headless runs.

use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use magnet_defence_core::{
    Action, CellCoord, EntityConfig, EntityKind, Event, Mode, PeerMessage, PlayerId, Request,
    ToolKind, TICKS_PER_SECOND,
};
use magnet_defence_transport::{Link, LinkEvent};
use magnet_defence_world::{self as world, query, World};
use tracing::{debug, info, warn};

/// Ticks a player lingers in a mode before declaring readiness for the next.
const READY_DELAY: u64 = 3 * TICKS_PER_SECOND as u64;

/// Turrets each automated player tries to place during the build phase.
const DEFENCES_PER_PLAYER: usize = 2;

/// Mode a player declares readiness for while the world is in `mode`.
pub(crate) const fn next_mode(mode: Mode) -> Option<Mode> {
    match mode {
        Mode::PreGame => Some(Mode::Build),
        Mode::Build => Some(Mode::Wave),
        Mode::Loss | Mode::Victory => Some(Mode::PostGame),
        Mode::Wave | Mode::PostGame => None,
    }
}

/// Steps a world on behalf of the players this process controls.
#[derive(Debug)]
pub(crate) struct Driver {
    world: World,
    players: Vec<PlayerId>,
    turret: Option<EntityConfig>,
    auto_ready: bool,
    max_ticks: Option<u64>,
    mode_entered: u64,
    defences_planned: bool,
}

impl Driver {
    pub(crate) fn new(
        world: World,
        players: Vec<PlayerId>,
        turret: Option<EntityConfig>,
        auto_ready: bool,
        max_ticks: Option<u64>,
    ) -> Self {
        Self {
            world,
            players,
            turret,
            auto_ready,
            max_ticks,
            mode_entered: 0,
            defences_planned: false,
        }
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Runs one tick and returns the events it produced.
    pub(crate) fn step(
        &mut self,
        inbound: Vec<PeerMessage>,
        out_messages: &mut Vec<PeerMessage>,
    ) -> Vec<Event> {
        if self.auto_ready {
            self.automate(out_messages);
        }

        let mut events = Vec::new();
        world::tick(&mut self.world, inbound, &mut events, out_messages);
        if events
            .iter()
            .any(|event| matches!(event, Event::ModeChanged { from, to } if from != to))
        {
            self.mode_entered = query::tick_index(&self.world);
        }
        report(&events);
        events
    }

    /// Reports whether the session has run its course.
    pub(crate) fn finished(&self) -> bool {
        let ticks = query::tick_index(&self.world);
        query::mode(&self.world) == Mode::PostGame
            || self.max_ticks.is_some_and(|limit| ticks >= limit)
    }

    fn automate(&mut self, out_messages: &mut Vec<PeerMessage>) {
        let mode = query::mode(&self.world);
        if mode == Mode::Build && !self.defences_planned {
            self.defences_planned = true;
            self.plan_defences(out_messages);
        }

        let Some(next) = next_mode(mode) else {
            return;
        };
        let lingered = query::tick_index(&self.world).saturating_sub(self.mode_entered);
        if mode != Mode::PreGame && lingered < READY_DELAY {
            return;
        }
        for &player in &self.players {
            let ready = query::players(&self.world)
                .get(player.index())
                .and_then(|state| state.ready());
            if ready != Some(next) {
                world::submit(&mut self.world, Request::StartMode { player, mode: next });
            }
        }
    }

    /// Queues turret placements next to the first spawner's route.
    fn plan_defences(&mut self, out_messages: &mut Vec<PeerMessage>) {
        let Some(turret) = self.turret else {
            return;
        };
        let mut candidates = defence_sites(&self.world).into_iter();

        for &player in &self.players {
            let points = query::players(&self.world)
                .get(player.index())
                .map_or(0, |state| state.points());
            let affordable = match turret.cost {
                0 => DEFENCES_PER_PLAYER,
                cost => usize::try_from(points / cost).unwrap_or(usize::MAX),
            };
            let actions: Vec<Action> = candidates
                .by_ref()
                .take(affordable.min(DEFENCES_PER_PLAYER))
                .map(|cell| Action::Place {
                    cell,
                    tool: ToolKind::Turret,
                    entity: EntityKind::Turret,
                    polarity: turret.polarity,
                })
                .collect();
            if actions.is_empty() {
                continue;
            }
            debug!(?player, sites = actions.len(), "planning defences");
            if !world::assign_actions(&mut self.world, player, actions, false, out_messages) {
                warn!(?player, "no actor to carry out the build plan");
            }
        }
    }
}

/// Buildable cells flanking the route from the first spawner, nearest the
/// spawner first.
fn defence_sites(world: &World) -> Vec<CellCoord> {
    let Some(spawner) = query::entity_view(world)
        .of_kind(EntityKind::Spawner)
        .find_map(|snapshot| snapshot.cell)
    else {
        return Vec::new();
    };
    let Some(route) = query::route_from(world, spawner) else {
        return Vec::new();
    };

    let grid = query::grid(world);
    let mut sites = Vec::new();
    for step in route.iter().skip(1) {
        for cell in grid.neighbors(*step) {
            if !route.contains(&cell)
                && !sites.contains(&cell)
                && query::is_placement_valid(world, cell)
            {
                sites.push(cell);
            }
        }
    }
    sites
}

fn report(events: &[Event]) {
    for event in events {
        match event {
            Event::ModeChanged { from, to } if from != to => {
                info!(?from, ?to, "mode changed");
            }
            Event::WaveAdvanced { wave } => info!(wave, "wave started"),
            Event::PlayerReady { player, mode } => info!(?player, ?mode, "player ready"),
            Event::Placed { kind, cell, .. } => info!(?kind, ?cell, "placed"),
            other => debug!(event = ?other, "world event"),
        }
    }
}

fn summarize(driver: &Driver) {
    let world = driver.world();
    let points: Vec<u32> = query::players(world)
        .iter()
        .map(|state| state.points())
        .collect();
    info!(
        level = query::level_name(world),
        mode = ?query::mode(world),
        wave = query::wave(world),
        ticks = query::tick_index(world),
        core_health = ?query::core_health(world),
        ?points,
        "session over"
    );
}

/// Runs a session without a peer as fast as the simulation allows.
pub(crate) fn run_headless(mut driver: Driver) {
    let mut discarded = Vec::new();
    while !driver.finished() {
        let _ = driver.step(Vec::new(), &mut discarded);
        discarded.clear();
    }
    summarize(&driver);
}

/// Runs a linked session at the fixed tick rate until it ends or the link
/// closes.
pub(crate) fn run_linked(mut driver: Driver, link: &Link) -> Result<()> {
    let period = Duration::from_secs(1) / TICKS_PER_SECOND;
    let mut deadline = Instant::now();
    let mut outbound = Vec::new();

    while !driver.finished() {
        let mut inbound = Vec::new();
        for event in link.drain() {
            match event {
                LinkEvent::Message(message) => inbound.push(message),
                LinkEvent::Closed(reason) => {
                    warn!(%reason, "link closed");
                    summarize(&driver);
                    return Ok(());
                }
            }
        }

        let _ = driver.step(inbound, &mut outbound);
        for message in outbound.drain(..) {
            link.send(&message).context("failed to send to the other player")?;
        }

        deadline += period;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else {
            deadline = now;
        }
    }
    summarize(&driver);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use magnet_defence_core::ConfigBundle;
    use magnet_defence_system_replication::Authority;

    use super::*;
    use crate::config::builtin_level;

    fn headless(max_ticks: Option<u64>) -> Driver {
        let config = ConfigBundle::standard();
        let turret = config.entity(EntityKind::Turret).copied();
        let world = World::new(&builtin_level(), Arc::new(config), Authority::Host)
            .expect("builtin level builds");
        Driver::new(
            world,
            vec![PlayerId::HOST, PlayerId::PEER],
            turret,
            true,
            max_ticks,
        )
    }

    fn advance(driver: &mut Driver, ticks: u64) -> Vec<Event> {
        let mut events = Vec::new();
        let mut outbound = Vec::new();
        for _ in 0..ticks {
            events.extend(driver.step(Vec::new(), &mut outbound));
        }
        events
    }

    #[test]
    fn readiness_follows_the_mode_machine() {
        assert_eq!(next_mode(Mode::PreGame), Some(Mode::Build));
        assert_eq!(next_mode(Mode::Build), Some(Mode::Wave));
        assert_eq!(next_mode(Mode::Victory), Some(Mode::PostGame));
        assert_eq!(next_mode(Mode::Loss), Some(Mode::PostGame));
        assert_eq!(next_mode(Mode::Wave), None);
        assert_eq!(next_mode(Mode::PostGame), None);
    }

    #[test]
    fn automated_players_build_then_start_the_wave() {
        let mut driver = headless(None);
        let _ = advance(&mut driver, 2);
        assert_eq!(query::mode(driver.world()), Mode::Build);

        let events = advance(&mut driver, READY_DELAY + 2);
        assert_eq!(query::mode(driver.world()), Mode::Wave);
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::WaveAdvanced { wave: 1 })));
        assert!(
            query::entity_view(driver.world())
                .of_kind(EntityKind::Turret)
                .next()
                .is_some(),
            "actors placed turrets during the build phase"
        );
    }

    #[test]
    fn defence_sites_flank_the_route() {
        let driver = headless(None);
        let world = driver.world();
        let sites = defence_sites(world);
        assert!(!sites.is_empty());
        let spawner = CellCoord::new(0, 0);
        let route = query::route_from(world, spawner).expect("route");
        for site in sites {
            assert!(!route.contains(&site));
            assert!(query::is_placement_valid(world, site));
        }
    }

    #[test]
    fn tick_limit_ends_the_session() {
        let mut driver = headless(Some(5));
        let mut outbound = Vec::new();
        let mut steps = 0;
        while !driver.finished() {
            let _ = driver.step(Vec::new(), &mut outbound);
            steps += 1;
        }
        assert_eq!(steps, 5);
    }
}
