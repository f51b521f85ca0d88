//! Minimal rigid-body collaborator for the arena simulation
//!
//! This is deliberately not a general-purpose physics engine: the arena is a
//! box of axis-aligned planes, bodies are spheres, and the vehicle controller
//! overrides velocity and orientation directly for arcade feel. What this
//! module provides is the interface the controllers consume: force/impulse
//! application with explicit force modes, contact enumeration with per-point
//! normals, trigger-volume overlap, and a per-body collision toggle.

use glam::{Quat, Vec3};

use crate::game::contact::{ContactPoint, Surface};

/// Downward gravity, tuned for arcade hang-time rather than realism.
pub const GRAVITY: Vec3 = Vec3::new(0.0, -13.0, 0.0);

/// How a force is applied to a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceMode {
    /// Instantaneous change in velocity, ignoring the timestep.
    VelocityChange,
    /// Continuous acceleration, integrated over the timestep.
    Acceleration,
}

/// Rigid state owned by each simulated entity.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub linvel: Vec3,
    pub angvel: Vec3,
    /// Gravity applies during integration only while set.
    pub gravity_enabled: bool,
    /// While false, no contacts are generated and no penetration is resolved.
    pub detect_collisions: bool,
}

impl RigidBody {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            linvel: Vec3::ZERO,
            angvel: Vec3::ZERO,
            gravity_enabled: true,
            detect_collisions: true,
        }
    }

    /// Local forward axis in world space (-Z convention).
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Local up axis in world space.
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Local right axis in world space.
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn speed(&self) -> f32 {
        self.linvel.length()
    }

    /// Apply a linear force with the given mode.
    pub fn apply_force(&mut self, force: Vec3, mode: ForceMode, dt: f32) {
        match mode {
            ForceMode::VelocityChange => self.linvel += force,
            ForceMode::Acceleration => self.linvel += force * dt,
        }
    }

    /// Apply a torque (world-space axis) with the given mode.
    pub fn apply_torque(&mut self, torque: Vec3, mode: ForceMode, dt: f32) {
        match mode {
            ForceMode::VelocityChange => self.angvel += torque,
            ForceMode::Acceleration => self.angvel += torque * dt,
        }
    }

    /// Radial impulse from an explosion center, with linear falloff to zero
    /// at `radius`. Bodies outside the radius are unaffected.
    pub fn apply_explosion_impulse(&mut self, center: Vec3, impulse: f32, radius: f32) {
        let offset = self.position - center;
        let dist = offset.length();
        if dist >= radius {
            return;
        }
        let falloff = 1.0 - dist / radius;
        let dir = if dist > 1e-4 { offset / dist } else { Vec3::Y };
        self.linvel += dir * impulse * falloff;
    }

    /// Integrate velocities into position and orientation.
    pub fn integrate(&mut self, dt: f32) {
        if self.gravity_enabled {
            self.linvel += GRAVITY * dt;
        }
        self.position += self.linvel * dt;
        if self.angvel.length_squared() > 1e-10 {
            self.rotation = (Quat::from_scaled_axis(self.angvel * dt) * self.rotation).normalize();
        }
    }

    /// Zero all motion.
    pub fn halt(&mut self) {
        self.linvel = Vec3::ZERO;
        self.angvel = Vec3::ZERO;
    }
}

/// Project `v` onto the plane with unit-ish normal `n`.
pub fn project_on_plane(v: Vec3, n: Vec3) -> Vec3 {
    v - n * v.dot(n)
}

/// Axis-aligned trigger volume.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// The static collision box the match is played inside.
#[derive(Debug, Clone, Copy)]
pub struct ArenaBounds {
    /// Half extent along X.
    pub half_width: f32,
    /// Half extent along Z. The Z walls back the goals.
    pub half_length: f32,
    /// Ceiling height above the floor at y = 0.
    pub ceiling: f32,
}

/// One boundary plane of the arena, with its surface tag.
struct BoundaryPlane {
    normal: Vec3,
    /// Signed distance such that a point is inside while
    /// `point.dot(normal) + offset >= 0`.
    offset: f32,
    surface: Surface,
}

fn boundary_planes(bounds: &ArenaBounds) -> [BoundaryPlane; 6] {
    [
        // Floor
        BoundaryPlane {
            normal: Vec3::Y,
            offset: 0.0,
            surface: Surface::Ground,
        },
        // Ceiling
        BoundaryPlane {
            normal: Vec3::NEG_Y,
            offset: bounds.ceiling,
            surface: Surface::Ground,
        },
        // Side walls
        BoundaryPlane {
            normal: Vec3::X,
            offset: bounds.half_width,
            surface: Surface::Ground,
        },
        BoundaryPlane {
            normal: Vec3::NEG_X,
            offset: bounds.half_width,
            surface: Surface::Ground,
        },
        // End walls (the goals are recessed into these)
        BoundaryPlane {
            normal: Vec3::Z,
            offset: bounds.half_length,
            surface: Surface::GoalWall,
        },
        BoundaryPlane {
            normal: Vec3::NEG_Z,
            offset: bounds.half_length,
            surface: Surface::GoalWall,
        },
    ]
}

/// Enumerate current contacts between a sphere body and the arena boundary.
///
/// Contact points carry the plane normal; a body with collision detection
/// suppressed reports no contacts at all.
pub fn sphere_contacts(body: &RigidBody, radius: f32, bounds: &ArenaBounds) -> Vec<ContactPoint> {
    const CONTACT_SLOP: f32 = 0.02;

    if !body.detect_collisions {
        return Vec::new();
    }

    let mut contacts = Vec::new();
    for plane in boundary_planes(bounds) {
        let dist = body.position.dot(plane.normal) + plane.offset;
        if dist <= radius + CONTACT_SLOP {
            contacts.push(ContactPoint {
                point: body.position - plane.normal * dist,
                normal: plane.normal,
                surface: plane.surface,
            });
        }
    }
    contacts
}

/// Push a sphere body out of the arena boundary and kill (or reflect) the
/// inward velocity component. `restitution` of 0 rests the body on the
/// surface, higher values bounce.
pub fn resolve_against_bounds(
    body: &mut RigidBody,
    radius: f32,
    bounds: &ArenaBounds,
    restitution: f32,
) {
    if !body.detect_collisions {
        return;
    }

    for plane in boundary_planes(bounds) {
        let dist = body.position.dot(plane.normal) + plane.offset;
        if dist < radius {
            body.position += plane.normal * (radius - dist);
            let inward = body.linvel.dot(plane.normal);
            if inward < 0.0 {
                body.linvel -= plane.normal * inward * (1.0 + restitution);
            }
        }
    }
}

/// Separate two sphere bodies of equal standing (vehicle vs. vehicle),
/// pushing each half the overlap apart.
pub fn separate_spheres(a: &mut RigidBody, ra: f32, b: &mut RigidBody, rb: f32) {
    let offset = b.position - a.position;
    let dist = offset.length();
    let combined = ra + rb;
    if dist >= combined {
        return;
    }

    let normal = if dist > 1e-4 {
        offset / dist
    } else {
        Vec3::X
    };
    let push = (combined - dist) * 0.5 + 0.01;
    a.position -= normal * push;
    b.position += normal * push;
}

/// Vehicle-vs-ball impact: move the ball out of penetration and transfer
/// the approach velocity into it. Returns the impact speed if a strike
/// happened this tick (used for audio cues), `None` otherwise.
pub fn strike_ball(
    vehicle: &RigidBody,
    vehicle_radius: f32,
    ball: &mut RigidBody,
    ball_radius: f32,
) -> Option<f32> {
    // Arcade transfer factor: the ball flies a little faster than the hit.
    const BALL_KICK: f32 = 1.35;

    let offset = ball.position - vehicle.position;
    let dist = offset.length();
    let combined = vehicle_radius + ball_radius;
    if dist >= combined {
        return None;
    }

    let normal = if dist > 1e-4 {
        offset / dist
    } else {
        Vec3::Y
    };
    ball.position += normal * (combined - dist + 0.01);

    let approach = (vehicle.linvel - ball.linvel).dot(normal);
    if approach <= 0.0 {
        return None;
    }
    ball.linvel += normal * approach * BALL_KICK;
    Some(approach)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resting_body(y: f32) -> RigidBody {
        RigidBody::new(Vec3::new(0.0, y, 0.0), Quat::IDENTITY)
    }

    fn test_bounds() -> ArenaBounds {
        ArenaBounds {
            half_width: 40.0,
            half_length: 60.0,
            ceiling: 20.0,
        }
    }

    #[test]
    fn test_force_modes() {
        let mut body = resting_body(5.0);
        body.apply_force(Vec3::new(10.0, 0.0, 0.0), ForceMode::VelocityChange, 0.5);
        assert_eq!(body.linvel.x, 10.0);

        body.apply_force(Vec3::new(10.0, 0.0, 0.0), ForceMode::Acceleration, 0.5);
        assert_eq!(body.linvel.x, 15.0);
    }

    #[test]
    fn test_floor_contact_reported() {
        let body = resting_body(0.75);
        let contacts = sphere_contacts(&body, 0.75, &test_bounds());
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].normal, Vec3::Y);
        assert_eq!(contacts[0].surface, Surface::Ground);
    }

    #[test]
    fn test_no_contacts_while_detection_suppressed() {
        let mut body = resting_body(0.75);
        body.detect_collisions = false;
        assert!(sphere_contacts(&body, 0.75, &test_bounds()).is_empty());
    }

    #[test]
    fn test_end_wall_tagged_goal_wall() {
        let bounds = test_bounds();
        let mut body = resting_body(5.0);
        body.position.z = -bounds.half_length + 0.5;
        let contacts = sphere_contacts(&body, 0.75, &bounds);
        assert!(contacts.iter().any(|c| c.surface == Surface::GoalWall));
    }

    #[test]
    fn test_resolve_rests_body_on_floor() {
        let mut body = resting_body(0.3);
        body.linvel = Vec3::new(3.0, -8.0, 0.0);
        resolve_against_bounds(&mut body, 0.75, &test_bounds(), 0.0);
        assert!((body.position.y - 0.75).abs() < 1e-5);
        assert_eq!(body.linvel.y, 0.0);
        // Tangential velocity untouched
        assert_eq!(body.linvel.x, 3.0);
    }

    #[test]
    fn test_explosion_falloff() {
        let mut near = resting_body(1.0);
        let mut far = resting_body(1.0);
        far.position.x = 50.0;
        let mut outside = resting_body(1.0);
        outside.position.x = 150.0;

        let center = Vec3::new(0.0, 1.0, 0.0);
        // `near` sits on the center: pushed straight up at full strength.
        near.apply_explosion_impulse(center, 40.0, 100.0);
        far.apply_explosion_impulse(center, 40.0, 100.0);
        outside.apply_explosion_impulse(center, 40.0, 100.0);

        assert!((near.linvel.length() - 40.0).abs() < 1e-3);
        assert!((far.linvel.length() - 20.0).abs() < 1e-3);
        assert_eq!(outside.linvel, Vec3::ZERO);
    }

    #[test]
    fn test_strike_ball_transfers_approach_velocity() {
        let mut vehicle = resting_body(1.0);
        vehicle.linvel = Vec3::new(0.0, 0.0, -20.0);
        let mut ball = resting_body(1.0);
        ball.position.z = -1.5;

        let impact = strike_ball(&vehicle, 0.75, &mut ball, 1.1);
        assert!(impact.is_some());
        assert!(ball.linvel.z < -20.0);
        // Ball pushed clear of the vehicle
        let gap = (ball.position - vehicle.position).length();
        assert!(gap >= 0.75 + 1.1);
    }
}
