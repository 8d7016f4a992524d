#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure turret helpers: fire-rate gating and deterministic target selection.
//!
//! Candidates are supplied in world collection order. Every selection breaks
//! ties by that order so both peers pick the same target from the same state.

use glam::Vec2;
use magnet_defence_core::{BeamTargeting, EntityId, Polarity, TICKS_PER_SECOND};

/// Tick counter that lets a turret fire once per ready window.
///
/// The counter starts at zero (ready). Firing sets it to one; it then
/// increments every tick until it reaches the window length and wraps back to
/// zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FireRate {
    period: u32,
    counter: u32,
}

impl FireRate {
    /// Creates a counter firing once every `rate_seconds`.
    ///
    /// The window is `ceil(rate_seconds * 60)` ticks and never shorter than one tick.
    #[must_use]
    pub fn new(rate_seconds: f32) -> Self {
        let ticks = (rate_seconds * TICKS_PER_SECOND as f32).ceil();
        let period = if ticks.is_finite() && ticks >= 1.0 {
            ticks as u32
        } else {
            1
        };
        Self::from_ticks(period)
    }

    /// Creates a counter with an explicit window length in ticks.
    #[must_use]
    pub fn from_ticks(period: u32) -> Self {
        Self {
            period: period.max(1),
            counter: 0,
        }
    }

    /// Length of the ready window in ticks.
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.period
    }

    /// Current counter value.
    #[must_use]
    pub const fn counter(&self) -> u32 {
        self.counter
    }

    /// Reports whether the next [`FireRate::can_fire`] call would succeed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.counter == 0
    }

    /// Consumes the ready window. Returns `true` at most once per window.
    pub fn can_fire(&mut self) -> bool {
        if self.counter == 0 {
            self.counter = 1;
            return true;
        }
        self.step();
        false
    }

    /// Advances a running window without firing. A ready counter stays ready.
    pub fn recover(&mut self) {
        if self.counter != 0 {
            self.step();
        }
    }

    fn step(&mut self) {
        self.counter += 1;
        if self.counter >= self.period {
            self.counter = 0;
        }
    }
}

/// Enemy considered by target selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// Local handle of the enemy.
    pub id: EntityId,
    /// Position in world units.
    pub position: Vec2,
    /// Current health.
    pub health: f32,
    /// Charge of the enemy.
    pub polarity: Polarity,
}

impl Candidate {
    fn in_range(&self, origin: Vec2, range: f32) -> bool {
        self.health > 0.0 && self.position.distance_squared(origin) <= range * range
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BestCandidate {
    score: f32,
    order: usize,
    id: EntityId,
}

impl BestCandidate {
    fn precedes(&self, other: &Self) -> bool {
        if self.score != other.score {
            return self.score < other.score;
        }
        self.order < other.order
    }
}

fn select_by<F>(candidates: &[Candidate], mut score: F) -> Option<EntityId>
where
    F: FnMut(&Candidate) -> Option<f32>,
{
    let mut best: Option<BestCandidate> = None;
    for (order, candidate) in candidates.iter().enumerate() {
        let Some(score) = score(candidate) else {
            continue;
        };
        let current = BestCandidate {
            score,
            order,
            id: candidate.id,
        };
        match &mut best {
            Some(existing) => {
                if current.precedes(existing) {
                    *existing = current;
                }
            }
            None => best = Some(current),
        }
    }
    best.map(|candidate| candidate.id)
}

/// Nearest living enemy within `range` of `origin`. Ties go to the earlier candidate.
#[must_use]
pub fn nearest_target(origin: Vec2, range: f32, candidates: &[Candidate]) -> Option<EntityId> {
    select_by(candidates, |candidate| {
        candidate
            .in_range(origin, range)
            .then(|| candidate.position.distance_squared(origin))
    })
}

/// Reports whether a beam turret's polarity rule accepts an enemy.
#[must_use]
pub fn polarity_matches(rule: BeamTargeting, turret: Polarity, enemy: Polarity) -> bool {
    match rule {
        BeamTargeting::SamePolarity => enemy == turret,
        BeamTargeting::OppositePolarity => enemy == turret.opposite() && enemy != turret,
    }
}

/// Weakest enemy within `range` whose polarity satisfies `rule`.
///
/// Ties on health go to the earlier candidate.
#[must_use]
pub fn weakest_target(
    origin: Vec2,
    range: f32,
    turret_polarity: Polarity,
    rule: BeamTargeting,
    candidates: &[Candidate],
) -> Option<EntityId> {
    select_by(candidates, |candidate| {
        (candidate.in_range(origin, range)
            && polarity_matches(rule, turret_polarity, candidate.polarity))
        .then_some(candidate.health)
    })
}

/// Reports whether a locked target is still alive and within range.
#[must_use]
pub fn lock_holds(origin: Vec2, range: f32, lock: EntityId, candidates: &[Candidate]) -> bool {
    candidates
        .iter()
        .any(|candidate| candidate.id == lock && candidate.in_range(origin, range))
}

/// Swinging head of a beam turret.
///
/// While locked the head oscillates around the bearing to its target; without a
/// lock it rests where it last pointed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BeamHead {
    angle: f32,
    phase: u32,
}

impl BeamHead {
    /// Ticks per full swing.
    pub const SWING_PERIOD: u32 = 60;
    /// Peak deviation from the bearing, in radians.
    pub const SWING_AMPLITUDE: f32 = 0.35;

    /// Current head angle in radians.
    #[must_use]
    pub const fn angle(&self) -> f32 {
        self.angle
    }

    /// Swings the head around the bearing from `origin` to `target`.
    pub fn oscillate(&mut self, origin: Vec2, target: Vec2) {
        let delta = target - origin;
        let bearing = delta.y.atan2(delta.x);
        self.phase = (self.phase + 1) % Self::SWING_PERIOD;
        let swing = (std::f32::consts::TAU * self.phase as f32 / Self::SWING_PERIOD as f32).sin();
        self.angle = bearing + swing * Self::SWING_AMPLITUDE;
    }

    /// Drops the swing and keeps the head where it is.
    pub fn release(&mut self) {
        self.phase = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enemy(id: u32, x: f32, y: f32, health: f32, polarity: Polarity) -> Candidate {
        Candidate {
            id: EntityId::new(id),
            position: Vec2::new(x, y),
            health,
            polarity,
        }
    }

    #[test]
    fn fire_rate_never_fires_while_counting() {
        assert_eq!(FireRate::new(0.5).period(), 30);

        let mut rate = FireRate::from_ticks(3);

        assert!(rate.can_fire());
        assert_eq!(rate.counter(), 1);
        assert!(!rate.can_fire());
        assert!(!rate.can_fire());
        assert!(rate.can_fire(), "window of three ticks elapsed");
    }

    #[test]
    fn recover_leaves_ready_counter_alone() {
        let mut rate = FireRate::from_ticks(4);
        rate.recover();
        assert!(rate.is_ready());

        assert!(rate.can_fire());
        rate.recover();
        rate.recover();
        rate.recover();
        assert!(rate.is_ready(), "counter wraps after the window");
    }

    #[test]
    fn degenerate_rates_clamp_to_one_tick() {
        assert_eq!(FireRate::new(0.0).period(), 1);
        assert_eq!(FireRate::new(f32::NAN).period(), 1);
        let mut rate = FireRate::new(-3.0);
        assert!(rate.can_fire());
        assert!(!rate.can_fire());
        assert!(rate.can_fire());
    }

    #[test]
    fn nearest_prefers_collection_order_on_ties() {
        let candidates = [
            enemy(9, 2.0, 0.0, 1.0, Polarity::Neutral),
            enemy(3, -2.0, 0.0, 1.0, Polarity::Neutral),
            enemy(5, 5.0, 0.0, 1.0, Polarity::Neutral),
        ];
        assert_eq!(
            nearest_target(Vec2::ZERO, 3.0, &candidates),
            Some(EntityId::new(9))
        );
        assert_eq!(nearest_target(Vec2::ZERO, 1.0, &candidates), None);
    }

    #[test]
    fn weakest_respects_polarity_rule() {
        let candidates = [
            enemy(1, 1.0, 0.0, 5.0, Polarity::Negative),
            enemy(2, 1.0, 1.0, 1.0, Polarity::Positive),
            enemy(3, 0.0, 1.0, 2.0, Polarity::Negative),
        ];
        let opposite = weakest_target(
            Vec2::ZERO,
            3.0,
            Polarity::Positive,
            BeamTargeting::OppositePolarity,
            &candidates,
        );
        assert_eq!(opposite, Some(EntityId::new(3)));

        let same = weakest_target(
            Vec2::ZERO,
            3.0,
            Polarity::Positive,
            BeamTargeting::SamePolarity,
            &candidates,
        );
        assert_eq!(same, Some(EntityId::new(2)));
    }

    #[test]
    fn lock_breaks_when_target_leaves_range_or_dies() {
        let mut candidates = [enemy(4, 1.0, 0.0, 2.0, Polarity::Neutral)];
        assert!(lock_holds(Vec2::ZERO, 2.0, EntityId::new(4), &candidates));

        candidates[0].position = Vec2::new(4.0, 0.0);
        assert!(!lock_holds(Vec2::ZERO, 2.0, EntityId::new(4), &candidates));

        candidates[0].position = Vec2::new(1.0, 0.0);
        candidates[0].health = 0.0;
        assert!(!lock_holds(Vec2::ZERO, 2.0, EntityId::new(4), &candidates));
    }

    #[test]
    fn head_swings_around_bearing() {
        let mut head = BeamHead::default();
        let target = Vec2::new(0.0, 3.0);
        let bearing = std::f32::consts::FRAC_PI_2;
        for _ in 0..BeamHead::SWING_PERIOD {
            head.oscillate(Vec2::ZERO, target);
            assert!((head.angle() - bearing).abs() <= BeamHead::SWING_AMPLITUDE + 1e-4);
        }
    }
}
