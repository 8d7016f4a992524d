//! TOML session configuration.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use magnet_defence_core::{ConfigBundle, EnemyKind, Level, WaveChain, WaveSegment};
use magnet_defence_transport::{resolve, Discovery, LinkConfig, DEFAULT_RESEND_INTERVAL};
use serde::Deserialize;

/// How this side finds the other peer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub(crate) enum JoinMode {
    /// Wait for a peer to dial in; becomes host.
    #[default]
    Listen,
    /// Dial a known peer address.
    Dial,
    /// Publish a session name at the rendezvous service; becomes host.
    Register,
    /// Join the session published under a name.
    Await,
}

/// `[network]` table.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct NetworkConfig {
    pub(crate) bind: String,
    pub(crate) mode: JoinMode,
    pub(crate) peer: Option<String>,
    pub(crate) server: Option<String>,
    pub(crate) name: String,
    pub(crate) hello: String,
    pub(crate) handshake_timeout_ms: u64,
    pub(crate) connect_attempts: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: String::from("0.0.0.0:7777"),
            mode: JoinMode::Listen,
            peer: None,
            server: None,
            name: String::from("magnet"),
            hello: String::from("magnet-defence"),
            handshake_timeout_ms: 10_000,
            connect_attempts: 3,
        }
    }
}

impl NetworkConfig {
    /// Resolves addresses and builds the link parameters.
    pub(crate) fn link_config(&self) -> Result<LinkConfig> {
        let bind = resolve(&self.bind).context("invalid bind address")?;
        let discovery = match self.mode {
            JoinMode::Listen => Discovery::Listen,
            JoinMode::Dial => Discovery::Dial {
                peer: resolve(self.required_peer()?).context("invalid peer address")?,
            },
            JoinMode::Register => Discovery::Register {
                server: resolve(self.required_server()?).context("invalid rendezvous address")?,
                name: self.name.clone(),
            },
            JoinMode::Await => Discovery::Await {
                server: resolve(self.required_server()?).context("invalid rendezvous address")?,
                name: self.name.clone(),
            },
        };
        Ok(LinkConfig {
            bind,
            discovery,
            hello: self.hello.clone(),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            resend_interval: DEFAULT_RESEND_INTERVAL,
        })
    }

    fn required_peer(&self) -> Result<&str> {
        match self.peer.as_deref() {
            Some(peer) => Ok(peer),
            None => bail!("`network.peer` is required when dialling"),
        }
    }

    fn required_server(&self) -> Result<&str> {
        match self.server.as_deref() {
            Some(server) => Ok(server),
            None => bail!("`network.server` is required for rendezvous sessions"),
        }
    }
}

/// `[game]` table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    /// Level file; the built-in level is used when absent.
    pub(crate) level: Option<PathBuf>,
    /// Entity tuning file; standard tuning is used when absent.
    pub(crate) entities: Option<PathBuf>,
    /// Declare readiness for each next mode without input.
    pub(crate) auto_ready: bool,
    /// Stop after this many ticks.
    pub(crate) max_ticks: Option<u64>,
}

/// Complete session file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SessionConfig {
    pub(crate) network: NetworkConfig,
    pub(crate) game: GameConfig,
}

impl SessionConfig {
    /// Reads a session file, or returns defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => parse_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Loads the configured level or the built-in one.
    pub(crate) fn level(&self) -> Result<Level> {
        match &self.game.level {
            Some(path) => parse_file(path),
            None => Ok(builtin_level()),
        }
    }

    /// Loads the configured entity tuning or the standard one.
    pub(crate) fn entities(&self) -> Result<ConfigBundle> {
        match &self.game.entities {
            Some(path) => parse_file(path),
            None => Ok(ConfigBundle::standard()),
        }
    }
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Small two-player level with two waves from a single spawner.
pub(crate) fn builtin_level() -> Level {
    let segment = |kind: &str, count, spawn_rate| WaveSegment {
        enemies: vec![EnemyKind::new(kind)],
        count,
        spawn_rate,
    };
    Level::from_ascii(
        "Crossing",
        &[
            "S..........",
            ".,,,.#.,,,.",
            "...........",
            "P.#.,,,.#.P",
            "...........",
            ".,,,.#.,,,.",
            ".........O.",
        ],
        vec![
            WaveChain {
                spawner: 0,
                segments: vec![segment("drone", 6, 45), segment("hulk", 2, 90)],
            },
            WaveChain {
                spawner: 0,
                segments: vec![segment("drone", 10, 30), segment("hulk", 4, 60)],
            },
        ],
    )
}
