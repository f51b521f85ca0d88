//! Contact classification: grounded / flipped / ground-normal facts
//!
//! Turns raw contact points reported by the physics layer into the discrete
//! facts the vehicle controller drives on. The ground normal is the
//! arithmetic mean of the contact normals and is intentionally not
//! re-normalized; it is meaningful only while the vehicle is grounded and
//! goes stale the moment it leaves the surface.

use glam::Vec3;

/// What kind of surface a contact point belongs to. Both kinds count as
/// ground for the purposes of landing and jump replenishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Ground,
    GoalWall,
}

/// One contact point reported by the collision layer for the current tick.
#[derive(Debug, Clone, Copy)]
pub struct ContactPoint {
    pub point: Vec3,
    pub normal: Vec3,
    pub surface: Surface,
}

/// Dot threshold between the ground normal and the vehicle's up axis below
/// which the vehicle counts as flipped. Deliberately strict: anything short
/// of nearly flat on its wheels is treated as upside-down.
pub const FLIPPED_THRESHOLD: f32 = 0.98;

/// Arithmetic mean of the contact normals, used as-is.
pub fn average_normal(contacts: &[ContactPoint]) -> Vec3 {
    let mut sum = Vec3::ZERO;
    for c in contacts {
        sum += c.normal;
    }
    sum / contacts.len() as f32
}

/// A vehicle is flipped unless its up axis is almost exactly aligned with
/// the surface it is resting on.
pub fn is_flipped(ground_normal: Vec3, up: Vec3) -> bool {
    ground_normal.dot(up) < FLIPPED_THRESHOLD
}
