//! Geometry and magnetism primitives. Pure functions, no state.
//!
//! World units are cells: the centre of cell `(c, r)` sits at `(c + 0.5, r + 0.5)`.
//! Velocities are expressed in cells per tick.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{CellCoord, TICKS_PER_SECOND};

/// Magnetic charge carried by entities and projectiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Neither attracts nor repels.
    #[default]
    Neutral,
    /// Positive charge.
    Positive,
    /// Negative charge.
    Negative,
}

impl Polarity {
    /// Opposite charge. Neutral stays neutral.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Polarity::Neutral => Polarity::Neutral,
            Polarity::Positive => Polarity::Negative,
            Polarity::Negative => Polarity::Positive,
        }
    }

    /// Sign of the interaction between two charges.
    ///
    /// Returns `1.0` for attraction (opposite charges), `-1.0` for repulsion
    /// (equal charges) and `0.0` when either side is neutral.
    #[must_use]
    pub fn interaction(self, other: Polarity) -> f32 {
        match (self, other) {
            (Polarity::Neutral, _) | (_, Polarity::Neutral) => 0.0,
            (a, b) if a == b => -1.0,
            _ => 1.0,
        }
    }
}

/// Strength and reach of an entity's magnetic field.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Magnetism {
    /// Peak acceleration in cells per tick squared, applied at zero distance.
    pub strength: f32,
    /// Distance in cells beyond which the field has no effect.
    pub radius: f32,
}

impl Magnetism {
    /// Creates magnetism parameters.
    #[must_use]
    pub const fn new(strength: f32, radius: f32) -> Self {
        Self { strength, radius }
    }
}

/// Position and velocity of a movable entity.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Kinematics {
    /// Position in world units.
    pub position: Vec2,
    /// Velocity in world units per tick.
    pub velocity: Vec2,
}

impl Kinematics {
    /// Kinematics at rest at the provided position.
    #[must_use]
    pub const fn at(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
        }
    }

    /// Advances the position by one tick of velocity.
    pub fn integrate(&mut self) {
        self.position += self.velocity;
    }

    /// Reports whether both vectors hold finite components.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

/// Converts a per-second speed into cells per tick.
#[must_use]
pub fn per_tick(per_second: f32) -> f32 {
    per_second / TICKS_PER_SECOND as f32
}

/// Centre of the provided cell in world units.
#[must_use]
pub fn cell_center(cell: CellCoord) -> Vec2 {
    Vec2::new(cell.column() as f32 + 0.5, cell.row() as f32 + 0.5)
}

/// Cell containing the provided position, if it lies in the positive quadrant.
#[must_use]
pub fn cell_at(position: Vec2) -> Option<CellCoord> {
    if !position.is_finite() || position.x < 0.0 || position.y < 0.0 {
        return None;
    }
    Some(CellCoord::new(position.x as u32, position.y as u32))
}

/// Velocity that moves `position` toward `target` at `speed` without overshooting.
#[must_use]
pub fn seek(position: Vec2, target: Vec2, speed: f32) -> Vec2 {
    let delta = target - position;
    let distance = delta.length();
    if distance <= speed {
        delta
    } else {
        delta / distance * speed
    }
}

/// Clamps the length of a velocity to `max_speed`.
#[must_use]
pub fn clamp_speed(velocity: Vec2, max_speed: f32) -> Vec2 {
    velocity.clamp_length_max(max_speed.max(0.0))
}

/// Force exerted on a charge at `subject` by a field centred at `source`.
///
/// Opposite charges pull the subject toward the source, equal charges push it
/// away. Magnitude falls off linearly from `strength` at the source to zero at
/// `radius`.
#[must_use]
pub fn magnetic_force(
    subject: Vec2,
    subject_polarity: Polarity,
    source: Vec2,
    source_polarity: Polarity,
    field: Magnetism,
) -> Vec2 {
    let sign = subject_polarity.interaction(source_polarity);
    if sign == 0.0 || field.radius <= 0.0 {
        return Vec2::ZERO;
    }

    let delta = source - subject;
    let distance = delta.length();
    if distance <= f32::EPSILON || distance >= field.radius {
        return Vec2::ZERO;
    }

    let magnitude = field.strength * (1.0 - distance / field.radius);
    delta / distance * magnitude * sign
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD: Magnetism = Magnetism::new(1.0, 4.0);

    #[test]
    fn opposite_charges_attract() {
        let force = magnetic_force(
            Vec2::ZERO,
            Polarity::Positive,
            Vec2::new(2.0, 0.0),
            Polarity::Negative,
            FIELD,
        );
        assert!(force.x > 0.0, "subject must be pulled toward the source");
        assert!((force.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn equal_charges_repel() {
        let force = magnetic_force(
            Vec2::ZERO,
            Polarity::Negative,
            Vec2::new(0.0, 1.0),
            Polarity::Negative,
            FIELD,
        );
        assert!(force.y < 0.0, "subject must be pushed away from the source");
    }

    #[test]
    fn neutral_or_distant_sources_exert_nothing() {
        let neutral = magnetic_force(
            Vec2::ZERO,
            Polarity::Neutral,
            Vec2::new(1.0, 0.0),
            Polarity::Positive,
            FIELD,
        );
        let distant = magnetic_force(
            Vec2::ZERO,
            Polarity::Positive,
            Vec2::new(10.0, 0.0),
            Polarity::Negative,
            FIELD,
        );
        assert_eq!(neutral, Vec2::ZERO);
        assert_eq!(distant, Vec2::ZERO);
    }

    #[test]
    fn seek_stops_on_target() {
        let velocity = seek(Vec2::ZERO, Vec2::new(0.1, 0.0), 0.5);
        assert_eq!(velocity, Vec2::new(0.1, 0.0));

        let velocity = seek(Vec2::ZERO, Vec2::new(3.0, 4.0), 0.5);
        assert!((velocity.length() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn cell_round_trip_through_centre() {
        let cell = CellCoord::new(3, 7);
        assert_eq!(cell_at(cell_center(cell)), Some(cell));
        assert_eq!(cell_at(Vec2::new(-0.2, 1.0)), None);
    }
}
