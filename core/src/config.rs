//! Immutable configuration records consumed by the world.
//!
//! A [`ConfigBundle`] is built once per session and shared with the world;
//! nothing in the simulation mutates it. A [`Level`] describes the grid layout
//! and the wave chains bound to each spawner.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    physics::{Magnetism, Polarity},
    CellCoord, EntityKind, ToolKind, MAX_PLAYERS, TICKS_PER_SECOND,
};

/// Terrain classification of a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Walkable, buildable floor.
    Open,
    /// Solid terrain.
    Blocked,
    /// Void outside the playable area.
    Empty,
    /// Enemy spawner location.
    Spawn,
    /// Location of the core.
    Objective,
    /// Starting location of a player actor.
    PlayerStart,
}

impl CellKind {
    /// Whether enemies may walk across cells of this kind.
    #[must_use]
    pub const fn traversable(self) -> bool {
        matches!(
            self,
            CellKind::Open | CellKind::Spawn | CellKind::Objective | CellKind::PlayerStart
        )
    }

    /// Whether blocking entities may be placed on cells of this kind.
    #[must_use]
    pub const fn buildable(self) -> bool {
        matches!(self, CellKind::Open)
    }
}

/// Name of a configured enemy archetype.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnemyKind(String);

impl EnemyKind {
    /// Creates an enemy kind from its configured name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Configured name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which enemies a beam turret considers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamTargeting {
    /// Enemies sharing the turret's polarity.
    SamePolarity,
    /// Enemies carrying the opposite polarity.
    #[default]
    OppositePolarity,
}

/// Per-kind tuning values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Starting and maximum health.
    pub health: f32,
    /// Movement speed in cells per second.
    pub speed: f32,
    /// Damage dealt per hit, or to the core on arrival for enemies.
    pub damage: f32,
    /// Attack radius in cells.
    pub attack_range: f32,
    /// Seconds between shots.
    pub attack_rate: f32,
    /// Projectile speed in cells per second.
    pub projectile_speed: f32,
    /// Projectile lifetime in seconds.
    pub projectile_lifetime: f32,
    /// Default charge.
    pub polarity: Polarity,
    /// Magnetic field parameters.
    pub magnetism: Magnetism,
    /// Points spent to place the entity.
    pub cost: u32,
    /// Points awarded for destroying the entity.
    pub reward: u32,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            health: 1.0,
            speed: 0.0,
            damage: 0.0,
            attack_range: 0.0,
            attack_rate: 1.0,
            projectile_speed: 0.0,
            projectile_lifetime: 1.0,
            polarity: Polarity::Neutral,
            magnetism: Magnetism::default(),
            cost: 0,
            reward: 0,
        }
    }
}

impl EntityConfig {
    /// Projectile lifetime converted to whole ticks, never zero.
    #[must_use]
    pub fn projectile_lifetime_ticks(&self) -> u32 {
        let ticks = (self.projectile_lifetime * TICKS_PER_SECOND as f32).ceil();
        if ticks.is_finite() && ticks >= 1.0 {
            ticks as u32
        } else {
            1
        }
    }
}

/// Every tuning record the world needs, built once per session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigBundle {
    /// Player actor tuning.
    pub actor: EntityConfig,
    /// Core tuning.
    pub core: EntityConfig,
    /// Direct turret tuning.
    pub turret: EntityConfig,
    /// Beam turret tuning.
    pub turret_beam: EntityConfig,
    /// Blaster projectile tuning.
    pub projectile: EntityConfig,
    /// Wall tuning.
    pub wall: EntityConfig,
    /// Enemy archetypes keyed by name.
    pub enemies: BTreeMap<EnemyKind, EntityConfig>,
    /// Toolbelt slots in display order.
    pub toolbelt: Vec<ToolKind>,
    /// Target filter used by beam turrets.
    pub beam_targeting: BeamTargeting,
    /// Points each player starts with.
    pub starting_points: u32,
}

impl Default for ConfigBundle {
    fn default() -> Self {
        Self::standard()
    }
}

impl ConfigBundle {
    /// Balanced defaults used when no configuration file is supplied.
    #[must_use]
    pub fn standard() -> Self {
        let mut enemies = BTreeMap::new();
        let _ = enemies.insert(
            EnemyKind::new("drone"),
            EntityConfig {
                health: 3.0,
                speed: 1.5,
                damage: 1.0,
                polarity: Polarity::Positive,
                reward: 2,
                ..EntityConfig::default()
            },
        );
        let _ = enemies.insert(
            EnemyKind::new("hulk"),
            EntityConfig {
                health: 8.0,
                speed: 0.8,
                damage: 3.0,
                polarity: Polarity::Negative,
                reward: 5,
                ..EntityConfig::default()
            },
        );

        Self {
            actor: EntityConfig {
                health: 100.0,
                speed: 4.0,
                ..EntityConfig::default()
            },
            core: EntityConfig {
                health: 20.0,
                ..EntityConfig::default()
            },
            turret: EntityConfig {
                health: 50.0,
                damage: 1.0,
                attack_range: 3.5,
                attack_rate: 0.5,
                projectile_speed: 12.0,
                projectile_lifetime: 0.5,
                cost: 10,
                ..EntityConfig::default()
            },
            turret_beam: EntityConfig {
                health: 50.0,
                damage: 0.5,
                attack_range: 4.5,
                attack_rate: 0.25,
                projectile_speed: 8.0,
                projectile_lifetime: 1.0,
                magnetism: Magnetism::new(0.05, 3.0),
                cost: 25,
                ..EntityConfig::default()
            },
            projectile: EntityConfig {
                damage: 1.0,
                projectile_speed: 10.0,
                projectile_lifetime: 1.0,
                magnetism: Magnetism::new(0.02, 2.0),
                ..EntityConfig::default()
            },
            wall: EntityConfig {
                health: 1.0,
                cost: 2,
                ..EntityConfig::default()
            },
            enemies,
            toolbelt: vec![
                ToolKind::Turret,
                ToolKind::TurretBeam,
                ToolKind::Wall,
                ToolKind::Blaster,
                ToolKind::Wrench,
            ],
            beam_targeting: BeamTargeting::OppositePolarity,
            starting_points: 50,
        }
    }

    /// Tuning for a non-enemy entity kind.
    ///
    /// Enemies are configured per archetype through [`ConfigBundle::enemy`];
    /// spawners carry no tuning.
    #[must_use]
    pub fn entity(&self, kind: EntityKind) -> Option<&EntityConfig> {
        match kind {
            EntityKind::Actor => Some(&self.actor),
            EntityKind::Core => Some(&self.core),
            EntityKind::Turret => Some(&self.turret),
            EntityKind::TurretBeam => Some(&self.turret_beam),
            EntityKind::Projectile => Some(&self.projectile),
            EntityKind::Wall => Some(&self.wall),
            EntityKind::Enemy | EntityKind::Spawner => None,
        }
    }

    /// Tuning for an enemy archetype.
    #[must_use]
    pub fn enemy(&self, kind: &EnemyKind) -> Option<&EntityConfig> {
        self.enemies.get(kind)
    }
}

/// One step of a wave chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveSegment {
    /// Enemy kinds emitted together at every spawn.
    pub enemies: Vec<EnemyKind>,
    /// Number of spawns in the segment.
    pub count: u32,
    /// Ticks between spawns.
    pub spawn_rate: u32,
}

/// Ordered segments consumed by a single spawner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveChain {
    /// Index of the spawner, in row-major order of spawn cells.
    pub spawner: usize,
    /// Segments in emission order.
    pub segments: Vec<WaveSegment>,
}

/// Level description supplied by the level loader.
///
/// The layout is one string per grid row. Glyphs: `.` open, `,` open with the
/// alternate tile, `#` blocked, space empty, `S` spawn, `O` objective,
/// `P` player start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Display name of the level.
    pub name: String,
    /// Tileset the renderer should use.
    #[serde(default)]
    pub tileset: String,
    /// Grid rows, top to bottom.
    pub layout: Vec<String>,
    /// Wave chains bound to spawners.
    #[serde(default)]
    pub waves: Vec<WaveChain>,
}

/// Single parsed cell of a level layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelCell {
    /// Terrain classification.
    pub kind: CellKind,
    /// Whether the alternate tile is drawn.
    pub alternate: bool,
}

/// Validated grid extracted from a [`Level`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelLayout {
    /// Number of columns.
    pub columns: u32,
    /// Number of rows.
    pub rows: u32,
    /// Cells in row-major order.
    pub cells: Vec<LevelCell>,
    /// Cell holding the core.
    pub objective: CellCoord,
    /// Spawn cells in row-major order.
    pub spawners: Vec<CellCoord>,
    /// Player start cells in row-major order.
    pub player_starts: Vec<CellCoord>,
}

/// Reasons a level fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LevelError {
    /// The layout has no rows or no columns.
    #[error("level layout is empty")]
    EmptyLayout,
    /// A row length differs from the first row.
    #[error("row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        /// Offending row.
        row: u32,
        /// Columns expected from the first row.
        expected: u32,
        /// Columns found.
        found: u32,
    },
    /// A glyph is not part of the layout alphabet.
    #[error("unknown glyph {glyph:?} at column {column}, row {row}")]
    UnknownGlyph {
        /// Offending glyph.
        glyph: char,
        /// Column of the glyph.
        column: u32,
        /// Row of the glyph.
        row: u32,
    },
    /// No objective cell exists.
    #[error("level has no objective cell")]
    MissingObjective,
    /// More than one objective cell exists.
    #[error("level has {0} objective cells, expected one")]
    MultipleObjectives(usize),
    /// More player starts than supported players.
    #[error("level has {0} player starts, at most {max} are supported", max = MAX_PLAYERS)]
    TooManyPlayers(usize),
    /// A wave chain references a spawner index that does not exist.
    #[error("wave chain {chain} targets spawner {spawner}, level has {available}")]
    UnknownSpawner {
        /// Index of the chain.
        chain: usize,
        /// Referenced spawner index.
        spawner: usize,
        /// Number of spawners in the layout.
        available: usize,
    },
}

impl Level {
    /// Builds a level from layout rows.
    #[must_use]
    pub fn from_ascii(name: &str, rows: &[&str], waves: Vec<WaveChain>) -> Self {
        Self {
            name: name.to_owned(),
            tileset: String::from("default"),
            layout: rows.iter().map(|row| (*row).to_owned()).collect(),
            waves,
        }
    }

    /// Parses and validates the layout.
    pub fn parse_layout(&self) -> Result<LevelLayout, LevelError> {
        let rows = u32::try_from(self.layout.len()).map_err(|_| LevelError::EmptyLayout)?;
        let columns = self
            .layout
            .first()
            .map(|row| row.chars().count())
            .and_then(|count| u32::try_from(count).ok())
            .unwrap_or(0);
        if rows == 0 || columns == 0 {
            return Err(LevelError::EmptyLayout);
        }

        let mut cells = Vec::with_capacity(rows as usize * columns as usize);
        let mut objectives = Vec::new();
        let mut spawners = Vec::new();
        let mut player_starts = Vec::new();

        for (row_index, line) in self.layout.iter().enumerate() {
            let row = row_index as u32;
            let found = line.chars().count() as u32;
            if found != columns {
                return Err(LevelError::RaggedRow {
                    row,
                    expected: columns,
                    found,
                });
            }

            for (column_index, glyph) in line.chars().enumerate() {
                let column = column_index as u32;
                let cell = parse_glyph(glyph).ok_or(LevelError::UnknownGlyph {
                    glyph,
                    column,
                    row,
                })?;
                let coord = CellCoord::new(column, row);
                match cell.kind {
                    CellKind::Objective => objectives.push(coord),
                    CellKind::Spawn => spawners.push(coord),
                    CellKind::PlayerStart => player_starts.push(coord),
                    CellKind::Open | CellKind::Blocked | CellKind::Empty => {}
                }
                cells.push(cell);
            }
        }

        let objective = match objectives.as_slice() {
            [] => return Err(LevelError::MissingObjective),
            [single] => *single,
            many => return Err(LevelError::MultipleObjectives(many.len())),
        };

        if player_starts.len() > MAX_PLAYERS {
            return Err(LevelError::TooManyPlayers(player_starts.len()));
        }

        for (chain_index, chain) in self.waves.iter().enumerate() {
            if chain.spawner >= spawners.len() {
                return Err(LevelError::UnknownSpawner {
                    chain: chain_index,
                    spawner: chain.spawner,
                    available: spawners.len(),
                });
            }
        }

        Ok(LevelLayout {
            columns,
            rows,
            cells,
            objective,
            spawners,
            player_starts,
        })
    }
}

fn parse_glyph(glyph: char) -> Option<LevelCell> {
    let (kind, alternate) = match glyph {
        '.' => (CellKind::Open, false),
        ',' => (CellKind::Open, true),
        '#' => (CellKind::Blocked, false),
        ' ' => (CellKind::Empty, false),
        'S' => (CellKind::Spawn, false),
        'O' => (CellKind::Objective, false),
        'P' => (CellKind::PlayerStart, false),
        _ => return None,
    };
    Some(LevelCell { kind, alternate })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_records_special_cells_in_row_major_order() {
        let level = Level::from_ascii("test", &["S..S", ".,P.", "..O."], Vec::new());
        let layout = level.parse_layout().expect("valid layout");

        assert_eq!((layout.columns, layout.rows), (4, 3));
        assert_eq!(layout.objective, CellCoord::new(2, 2));
        assert_eq!(
            layout.spawners,
            vec![CellCoord::new(0, 0), CellCoord::new(3, 0)]
        );
        assert_eq!(layout.player_starts, vec![CellCoord::new(2, 1)]);
        assert!(layout.cells[5].alternate);
        assert_eq!(layout.cells[5].kind, CellKind::Open);
    }

    #[test]
    fn layout_rejects_malformed_levels() {
        let missing = Level::from_ascii("m", &["S.."], Vec::new());
        assert_eq!(missing.parse_layout(), Err(LevelError::MissingObjective));

        let ragged = Level::from_ascii("r", &["S..", "O."], Vec::new());
        assert!(matches!(
            ragged.parse_layout(),
            Err(LevelError::RaggedRow { row: 1, .. })
        ));

        let unknown = Level::from_ascii("u", &["S?O"], Vec::new());
        assert!(matches!(
            unknown.parse_layout(),
            Err(LevelError::UnknownGlyph { glyph: '?', .. })
        ));

        let chain = WaveChain {
            spawner: 3,
            segments: Vec::new(),
        };
        let unbound = Level::from_ascii("w", &["S.O"], vec![chain]);
        assert!(matches!(
            unbound.parse_layout(),
            Err(LevelError::UnknownSpawner { spawner: 3, .. })
        ));
    }

    #[test]
    fn standard_bundle_covers_placeable_kinds() {
        let bundle = ConfigBundle::standard();
        for tool in &bundle.toolbelt {
            if let Some(kind) = tool.placed_kind() {
                assert!(bundle.entity(kind).is_some(), "{kind:?} lacks tuning");
            }
        }
        assert!(bundle.enemy(&EnemyKind::new("drone")).is_some());
        assert_eq!(bundle.turret.projectile_lifetime_ticks(), 30);
    }
}
