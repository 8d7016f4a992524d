#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that hosts, joins, or simulates Magnet Defence
//! sessions, and runs the rendezvous service.

mod config;
mod session;

use std::{
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use magnet_defence_core::{EntityKind, Greeting, PeerMessage, PlayerId};
use magnet_defence_system_replication::Authority;
use magnet_defence_transport::{connect, resolve, Link, Registry, RendezvousServer};
use magnet_defence_world::World;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{JoinMode, NetworkConfig, SessionConfig},
    session::Driver,
};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "magnet-defence", version, about = "Cooperative magnet tower defence")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the rendezvous service that pairs players by session name.
    Rendezvous {
        /// Address the service listens on.
        #[arg(long, default_value = "0.0.0.0:7000")]
        bind: String,
    },
    /// Join a two-player session.
    Play(PlayArgs),
    /// Run a session without a peer, controlling every player.
    Simulate {
        /// Session file; only its `[game]` table is used.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Stop after this many ticks.
        #[arg(long, default_value_t = 36_000)]
        ticks: u64,
    },
}

/// Overrides applied on top of the session file.
#[derive(Debug, Args)]
struct PlayArgs {
    /// Session file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// How to find the other player.
    #[arg(long, value_enum)]
    mode: Option<JoinMode>,
    /// Local address to bind.
    #[arg(long)]
    bind: Option<String>,
    /// Peer address when dialling.
    #[arg(long)]
    peer: Option<String>,
    /// Rendezvous service address.
    #[arg(long)]
    server: Option<String>,
    /// Session name at the rendezvous service.
    #[arg(long)]
    name: Option<String>,
    /// Declare readiness for each next mode without input.
    #[arg(long)]
    auto_ready: bool,
    /// Stop after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,
}

impl PlayArgs {
    fn apply(self, config: &mut SessionConfig) {
        let network = &mut config.network;
        if let Some(mode) = self.mode {
            network.mode = mode;
        }
        if let Some(bind) = self.bind {
            network.bind = bind;
        }
        if self.peer.is_some() {
            network.peer = self.peer;
        }
        if self.server.is_some() {
            network.server = self.server;
        }
        if let Some(name) = self.name {
            network.name = name;
        }
        config.game.auto_ready |= self.auto_ready;
        if self.max_ticks.is_some() {
            config.game.max_ticks = self.max_ticks;
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Rendezvous { bind } => rendezvous(&bind),
        Command::Play(args) => {
            let path = args.config.clone();
            let mut config = SessionConfig::load(path.as_deref())?;
            args.apply(&mut config);
            play(&config)
        }
        Command::Simulate { config, ticks } => {
            let config = SessionConfig::load(config.as_deref())?;
            simulate(&config, ticks)
        }
    }
}

fn rendezvous(bind: &str) -> Result<()> {
    let address = resolve(bind).context("invalid bind address")?;
    let mut server = RendezvousServer::bind(address).context("failed to bind rendezvous service")?;
    let shutdown = AtomicBool::new(false);
    server.serve(&shutdown).context("rendezvous service failed")
}

fn driver(
    config: &SessionConfig,
    authority: Authority,
    players: Vec<PlayerId>,
    auto_ready: bool,
    max_ticks: Option<u64>,
) -> Result<Driver> {
    let level = config.level()?;
    let entities = config.entities()?;
    let turret = entities.entity(EntityKind::Turret).copied();
    let world = World::new(&level, Arc::new(entities), authority)
        .with_context(|| format!("level `{}` cannot be played", level.name))?;
    Ok(Driver::new(world, players, turret, auto_ready, max_ticks))
}

fn play(config: &SessionConfig) -> Result<()> {
    let link = connect_with_retries(&config.network)?;
    let authority = link.authority();
    let player = match authority {
        Authority::Host => PlayerId::HOST,
        Authority::Peer => PlayerId::PEER,
    };
    info!(
        local = %link.local_addr(),
        peer = %link.peer_addr(),
        ?authority,
        "connected"
    );

    let driver = driver(
        config,
        authority,
        vec![player],
        config.game.auto_ready,
        config.game.max_ticks,
    )?;
    link.send(&PeerMessage::Greeting(Greeting {
        text: format!("{} joined as {player:?}", config.network.name),
    }))
    .context("failed to greet the other player")?;
    session::run_linked(driver, &link)
}

fn simulate(config: &SessionConfig, ticks: u64) -> Result<()> {
    let max_ticks = config.game.max_ticks.map_or(ticks, |limit| limit.min(ticks));
    let driver = driver(
        config,
        Authority::Host,
        vec![PlayerId::HOST, PlayerId::PEER],
        true,
        Some(max_ticks),
    )?;
    session::run_headless(driver);
    Ok(())
}

fn connect_with_retries(network: &NetworkConfig) -> Result<Link> {
    let link_config = network.link_config()?;
    let registry = Arc::new(Registry::standard());
    let attempts = network.connect_attempts.max(1);
    let mut attempt = 1;
    loop {
        match connect(&link_config, Arc::clone(&registry)) {
            Ok(link) => return Ok(link),
            Err(error) if attempt < attempts => {
                warn!(attempt, attempts, %error, "connection attempt failed, retrying");
                attempt += 1;
            }
            Err(error) => return Err(error).context("failed to reach the other player"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_overrides_replace_file_values() {
        let cli = Cli::try_parse_from([
            "magnet-defence",
            "play",
            "--mode",
            "await",
            "--server",
            "127.0.0.1:7000",
            "--name",
            "alice",
            "--auto-ready",
            "--max-ticks",
            "120",
        ])
        .expect("arguments parse");
        let Command::Play(args) = cli.command else {
            panic!("expected the play command");
        };

        let mut config = SessionConfig::default();
        args.apply(&mut config);
        assert_eq!(config.network.mode, JoinMode::Await);
        assert_eq!(config.network.server.as_deref(), Some("127.0.0.1:7000"));
        assert_eq!(config.network.name, "alice");
        assert_eq!(config.network.peer, None);
        assert!(config.game.auto_ready);
        assert_eq!(config.game.max_ticks, Some(120));
    }

    #[test]
    fn absent_overrides_keep_file_values() {
        let cli = Cli::try_parse_from(["magnet-defence", "play"]).expect("arguments parse");
        let Command::Play(args) = cli.command else {
            panic!("expected the play command");
        };
        let mut config = SessionConfig::default();
        config.network.peer = Some(String::from("10.0.0.2:7777"));
        config.game.max_ticks = Some(10);
        args.apply(&mut config);
        assert_eq!(config.network.peer.as_deref(), Some("10.0.0.2:7777"));
        assert_eq!(config.game.max_ticks, Some(10));
        assert!(!config.game.auto_ready);
    }

    #[test]
    fn rendezvous_and_simulate_have_defaults() {
        let cli = Cli::try_parse_from(["magnet-defence", "rendezvous"]).expect("arguments parse");
        assert!(matches!(cli.command, Command::Rendezvous { bind } if bind == "0.0.0.0:7000"));

        let cli = Cli::try_parse_from(["magnet-defence", "simulate", "--ticks", "10"])
            .expect("arguments parse");
        assert!(matches!(
            cli.command,
            Command::Simulate { config: None, ticks: 10 }
        ));
    }

    #[test]
    fn unknown_join_modes_are_rejected() {
        assert!(Cli::try_parse_from(["magnet-defence", "play", "--mode", "teleport"]).is_err());
    }

    #[test]
    fn headless_simulation_honours_the_tick_limit() {
        let config = SessionConfig::default();
        simulate(&config, 30).expect("simulation runs");
    }
}
