#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic wave cursor that drives timed enemy emission for one spawner.
//!
//! A cursor is bound to zero or more wave chains. It walks the segments of the
//! active chain in order, emitting one batch of enemy kinds every
//! `spawn_rate` ticks until the segment's count is used up, then moves to the
//! next segment, the next queued chain, or goes idle.

use std::collections::VecDeque;

use magnet_defence_core::{EnemyKind, WaveChain, WaveSegment};

/// Observable state of a spawner's cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnerPhase {
    /// No wave bound; nothing is emitted.
    Idle,
    /// The current segment still has spawns left.
    Spawning,
    /// The current segment ran out; the cursor advances on the next tick.
    SegmentExhausted,
}

/// Batch of enemies emitted on a single tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Emission {
    /// Enemy kinds to spawn together, one enemy per entry.
    pub kinds: Vec<EnemyKind>,
    /// Zero-based index of this emission across the cursor's lifetime.
    pub ordinal: u32,
}

/// Result of advancing a cursor by one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CursorTick {
    /// Batch emitted on this tick, if the spawn timer elapsed.
    pub emission: Option<Emission>,
    /// Set when a further queued chain became active on this tick.
    pub chain_advanced: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ActiveSegment {
    kinds: Vec<EnemyKind>,
    remaining: u32,
    spawn_rate: u32,
}

impl ActiveSegment {
    fn from_segment(segment: WaveSegment) -> Self {
        Self {
            kinds: segment.enemies,
            remaining: segment.count,
            spawn_rate: segment.spawn_rate.max(1),
        }
    }
}

/// Per-spawner wave state machine.
#[derive(Clone, Debug, Default)]
pub struct WaveCursor {
    queued_chains: VecDeque<Vec<WaveSegment>>,
    segments: VecDeque<WaveSegment>,
    active: Option<ActiveSegment>,
    elapsed: u32,
    emitted: u32,
}

impl WaveCursor {
    /// Creates an idle cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a chain behind any chain already bound.
    ///
    /// An idle cursor starts the chain's first segment immediately.
    pub fn bind(&mut self, chain: &WaveChain) {
        self.queued_chains.push_back(chain.segments.clone());
        if self.active.is_none() && self.segments.is_empty() {
            let _ = self.start_next_chain();
        }
    }

    /// Current phase of the state machine.
    #[must_use]
    pub fn phase(&self) -> SpawnerPhase {
        match &self.active {
            None => SpawnerPhase::Idle,
            Some(segment) if segment.remaining == 0 => SpawnerPhase::SegmentExhausted,
            Some(_) => SpawnerPhase::Spawning,
        }
    }

    /// Reports whether no segment is active and nothing is queued.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.active.is_none() && self.segments.is_empty() && self.queued_chains.is_empty()
    }

    /// Number of emissions produced so far.
    #[must_use]
    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    /// Spawns left in the active segment.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.active.as_ref().map_or(0, |segment| segment.remaining)
    }

    /// Advances the cursor by one tick.
    pub fn tick(&mut self) -> CursorTick {
        match self.phase() {
            SpawnerPhase::Idle => CursorTick::default(),
            SpawnerPhase::SegmentExhausted => CursorTick {
                emission: None,
                chain_advanced: self.advance(),
            },
            SpawnerPhase::Spawning => CursorTick {
                emission: self.step_timer(),
                chain_advanced: false,
            },
        }
    }

    fn step_timer(&mut self) -> Option<Emission> {
        let segment = self.active.as_mut()?;
        self.elapsed = self.elapsed.saturating_add(1);
        if self.elapsed < segment.spawn_rate {
            return None;
        }

        self.elapsed = 0;
        segment.remaining -= 1;
        let emission = Emission {
            kinds: segment.kinds.clone(),
            ordinal: self.emitted,
        };
        self.emitted = self.emitted.saturating_add(1);
        Some(emission)
    }

    /// Moves past an exhausted segment. Returns `true` when a new chain began.
    fn advance(&mut self) -> bool {
        self.elapsed = 0;
        if let Some(next) = self.segments.pop_front() {
            self.active = Some(ActiveSegment::from_segment(next));
            return false;
        }
        self.start_next_chain()
    }

    fn start_next_chain(&mut self) -> bool {
        self.elapsed = 0;
        while let Some(chain) = self.queued_chains.pop_front() {
            self.segments = chain.into();
            if let Some(first) = self.segments.pop_front() {
                self.active = Some(ActiveSegment::from_segment(first));
                return true;
            }
        }
        self.active = None;
        false
    }
}

/// Offset of the `index`-th of `count` enemies spawned together, in cells.
///
/// Batches are spread evenly on a circle of the given radius so that enemies
/// emitted on the same tick do not overlap.
#[must_use]
pub fn spread_offset(index: usize, count: usize, radius: f32) -> (f32, f32) {
    if count <= 1 {
        return (0.0, 0.0);
    }
    let angle = std::f32::consts::TAU * index as f32 / count as f32;
    (angle.cos() * radius, angle.sin() * radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(count: u32, spawn_rate: u32) -> WaveSegment {
        WaveSegment {
            enemies: vec![EnemyKind::new("drone")],
            count,
            spawn_rate,
        }
    }

    #[test]
    fn bound_cursor_starts_spawning() {
        let mut cursor = WaveCursor::new();
        assert_eq!(cursor.phase(), SpawnerPhase::Idle);

        cursor.bind(&WaveChain {
            spawner: 0,
            segments: vec![segment(2, 3)],
        });
        assert_eq!(cursor.phase(), SpawnerPhase::Spawning);
        assert_eq!(cursor.remaining(), 2);
    }

    #[test]
    fn zero_spawn_rate_emits_every_tick() {
        let mut cursor = WaveCursor::new();
        cursor.bind(&WaveChain {
            spawner: 0,
            segments: vec![segment(2, 0)],
        });

        assert!(cursor.tick().emission.is_some());
        assert!(cursor.tick().emission.is_some());
        assert_eq!(cursor.phase(), SpawnerPhase::SegmentExhausted);
    }

    #[test]
    fn spread_keeps_single_spawns_centred() {
        assert_eq!(spread_offset(0, 1, 0.3), (0.0, 0.0));
        let (x, y) = spread_offset(1, 2, 0.5);
        assert!((x + 0.5).abs() < 1e-5);
        assert!(y.abs() < 1e-5);
    }
}
