//! Arcade vehicle controller
//!
//! All tuning constants are expressed per second and integrated against the
//! fixed tick delta, except the two angular decay factors which are applied
//! once per tick. Ground driving overrides velocity directly for arcade
//! grip; airborne control is pure torque. The controller never reads the
//! clock, it only ever sees the tick delta, so simulation stays
//! deterministic for a given input stream.

use glam::{Quat, Vec2, Vec3};
use uuid::Uuid;

use crate::game::contact::{average_normal, is_flipped, ContactPoint};
use crate::game::layout::{SpawnPoint, Team};
use crate::game::physics::{project_on_plane, ForceMode, RigidBody};
use crate::game::TickInput;

pub const VEHICLE_RADIUS: f32 = 0.75;

// Ground driving
pub const ACCELERATION: f32 = 75.0;
pub const BRAKE_STRENGTH: f32 = 75.0;
/// Degrees per second at full grip.
pub const STEERING_STRENGTH_GROUNDED: f32 = 150.0;
pub const MAX_SPEED: f32 = 50.0;
pub const MAX_SPEED_BOOSTED: f32 = 75.0;

// Airborne torque
pub const PITCH_TORQUE: f32 = 8.0;
pub const ROLL_TORQUE: f32 = 20.0;
pub const YAW_TORQUE: f32 = 8.0;
/// Per-tick angular velocity decay.
pub const ANGULAR_VELOCITY_DECAY: f32 = 0.96;
/// Per-tick decay while a dodge is in flight; much weaker so the dodge
/// rotation carries.
pub const DODGE_ANGULAR_DECAY: f32 = 0.995;

// Jumps and dodges
pub const JUMPS_ALLOWED: u8 = 2;
pub const JUMP_IMPULSE: f32 = 20.0;
/// Combined stick magnitude at or above which an air jump becomes a dodge.
pub const DODGE_THRESHOLD: f32 = 0.5;
pub const DODGE_IMPULSE: f32 = 15.0;
pub const DODGE_TORQUE: f32 = 10.0;
pub const DODGE_DURATION: f32 = 0.75;
/// Impulse and torque strength of the roof-recovery flip.
pub const FLIP_IMPULSE: f32 = 15.0;

// Boost
pub const MAX_BOOST: f32 = 100.0;
pub const INITIAL_BOOST: f32 = 30.0;
pub const BOOST_BURN_PER_SECOND: f32 = 33.33;
pub const BOOST_ACCELERATION: f32 = 50.0;

/// A discrete maneuver started this tick, reported upward for audio cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maneuver {
    Jump,
    Flip,
    DodgeFlip,
}

/// One player's car.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub user_id: Uuid,
    pub display_name: String,
    pub team: Team,
    pub body: RigidBody,

    pub grounded: bool,
    pub flipped: bool,
    /// Cleared during round resets and countdowns; while false the
    /// controller is inert and leaves the collision toggle alone.
    pub movement_enabled: bool,
    pub boosting: bool,
    pub jumps_left: u8,
    pub boost: f32,

    /// Seconds left on an in-flight dodge; zero when not dodging.
    dodge_remaining: f32,
    /// Last surface normal seen while grounded. Frozen on takeoff so
    /// airborne dodges stay parallel to the surface that was left.
    ground_normal: Vec3,

    jump_was_held: bool,
    restart_was_held: bool,
    last_input: TickInput,
    last_input_seq: u32,
}

impl Vehicle {
    pub fn new(user_id: Uuid, display_name: String, team: Team, spawn: &SpawnPoint) -> Self {
        Self {
            user_id,
            display_name,
            team,
            body: RigidBody::new(spawn.position, spawn.rotation),
            grounded: false,
            flipped: false,
            movement_enabled: false,
            boosting: false,
            jumps_left: JUMPS_ALLOWED,
            boost: INITIAL_BOOST,
            dodge_remaining: 0.0,
            ground_normal: Vec3::Y,
            jump_was_held: false,
            restart_was_held: false,
            last_input: TickInput::default(),
            last_input_seq: 0,
        }
    }

    /// Accept a new input frame. Stale frames (sequence number behind the
    /// last applied one) are dropped so out-of-order delivery cannot rewind
    /// held buttons.
    pub fn set_input(&mut self, input: TickInput) {
        if input.seq < self.last_input_seq {
            return;
        }
        self.last_input_seq = input.seq;
        self.last_input = input;
    }

    /// Edge-detect the restart button. Consuming: the held state updates.
    pub fn take_restart_edge(&mut self) -> bool {
        let pressed = self.last_input.restart && !self.restart_was_held;
        self.restart_was_held = self.last_input.restart;
        pressed
    }

    /// Fold this tick's contact report into grounded / flipped state.
    ///
    /// On an empty report the last ground normal and flipped flag are kept
    /// as-is; they describe the surface the vehicle took off from. Jumps
    /// replenish only on the airborne-to-grounded transition.
    pub fn update_contacts(&mut self, contacts: &[ContactPoint]) {
        if contacts.is_empty() {
            self.grounded = false;
            return;
        }
        let was_grounded = self.grounded;
        self.grounded = true;
        self.ground_normal = average_normal(contacts);
        self.flipped = is_flipped(self.ground_normal, self.body.up());
        if !was_grounded {
            self.jumps_left = JUMPS_ALLOWED;
        }
    }

    /// Run one control tick. Returns the maneuver started this tick, if any.
    ///
    /// Collision detection suppressed by a previous tick's jump is restored
    /// here, at the top, so the suppression covers exactly one integration
    /// step.
    pub fn tick(&mut self, dt: f32) -> Option<Maneuver> {
        if !self.movement_enabled {
            return None;
        }

        self.body.detect_collisions = true;

        let input = self.last_input;

        let mut maneuver = None;
        if input.jump && !self.jump_was_held {
            maneuver = self.attempt_jump(&input, dt);
        }
        self.jump_was_held = input.jump;

        if input.boost {
            self.attempt_boost(dt);
        } else if self.boosting {
            self.end_boost();
        }

        self.drive(&input, dt);
        maneuver
    }

    fn drive(&mut self, input: &TickInput, dt: f32) {
        if self.grounded && !self.flipped {
            self.drive_grounded(input, dt);
        } else if self.grounded {
            // On its roof: no control, just bleed any spin.
            self.body.angvel *= ANGULAR_VELOCITY_DECAY;
        } else if self.dodge_remaining > 0.0 {
            self.dodge_remaining -= dt;
            self.body.angvel *= DODGE_ANGULAR_DECAY;
            if self.dodge_remaining <= 0.0 {
                self.dodge_remaining = 0.0;
                self.body.gravity_enabled = true;
            }
        } else {
            self.drive_airborne(input, dt);
        }
    }

    fn drive_grounded(&mut self, input: &TickInput, dt: f32) {
        let cap = if self.boosting {
            MAX_SPEED_BOOSTED
        } else {
            MAX_SPEED
        };

        let forward = project_on_plane(self.body.forward(), self.ground_normal).normalize_or_zero();
        let mut speed = self.body.speed();
        if self.body.linvel.dot(forward) < 0.0 {
            speed = -speed;
        }

        // Steering authority grows with speed, saturating at the cap.
        // Reversed while rolling backwards, like real steering geometry.
        let grip = (speed.abs() / cap).clamp(0.0, 1.0).sqrt();
        let mut steer = input.horizontal * STEERING_STRENGTH_GROUNDED * grip;
        if speed < 0.0 {
            steer = -steer;
        }
        self.body.rotation =
            (self.body.rotation * Quat::from_rotation_y(-steer.to_radians() * dt)).normalize();

        // Grip is absolute: all momentum follows the (possibly just
        // steered) forward axis.
        let forward = project_on_plane(self.body.forward(), self.ground_normal).normalize_or_zero();
        self.body.linvel = forward * speed;

        let force = input.gas * ACCELERATION - input.brake * BRAKE_STRENGTH;
        if speed.abs() < cap - force.abs() * dt {
            self.body.apply_force(forward * force, ForceMode::Acceleration, dt);
        }

        self.body.angvel *= ANGULAR_VELOCITY_DECAY;
    }

    fn drive_airborne(&mut self, input: &TickInput, dt: f32) {
        // Stick up pitches the nose down (forward-flip direction).
        let pitch = self.body.right() * (PITCH_TORQUE * -input.vertical);
        self.body.apply_torque(pitch, ForceMode::Acceleration, dt);

        if input.roll {
            let roll = self.body.forward() * (ROLL_TORQUE * input.horizontal);
            self.body.apply_torque(roll, ForceMode::Acceleration, dt);
        } else {
            let yaw = self.body.up() * (YAW_TORQUE * -input.horizontal);
            self.body.apply_torque(yaw, ForceMode::Acceleration, dt);
        }

        self.body.angvel *= ANGULAR_VELOCITY_DECAY;
    }

    /// Dispatch a fresh jump press to the right maneuver.
    fn attempt_jump(&mut self, input: &TickInput, dt: f32) -> Option<Maneuver> {
        if self.grounded && self.flipped {
            self.flip();
            Some(Maneuver::Flip)
        } else if self.grounded {
            self.jump(dt);
            Some(Maneuver::Jump)
        } else if self.jumps_left > 0 {
            let stick = Vec2::new(input.horizontal, input.vertical);
            if stick.length() >= DODGE_THRESHOLD {
                self.dodge_flip(stick);
                Some(Maneuver::DodgeFlip)
            } else {
                self.jump(dt);
                Some(Maneuver::Jump)
            }
        } else {
            None
        }
    }

    /// Plain jump along the vehicle's up axis. The small position nudge and
    /// one tick of suppressed collision detection keep the jump from being
    /// swallowed by the contact the vehicle is still resting on.
    fn jump(&mut self, dt: f32) {
        let up = self.body.up();
        self.body
            .apply_force(up * JUMP_IMPULSE, ForceMode::VelocityChange, 0.0);
        self.body.position += up * JUMP_IMPULSE * dt;
        self.body.detect_collisions = false;
        self.jumps_left = self.jumps_left.saturating_sub(1);
    }

    /// Roof recovery: push off along the surface normal and tumble the car
    /// back over. The tumble torque scales with how upside-down the car is,
    /// so a car lying nearly flat on its wheels barely rotates.
    fn flip(&mut self) {
        let n = self.ground_normal;
        let flip_factor = 0.5 - 0.5 * self.body.up().dot(n);

        self.body
            .apply_force(n * FLIP_IMPULSE, ForceMode::VelocityChange, 0.0);
        let axis = project_on_plane(self.body.forward(), n).normalize_or_zero();
        self.body
            .apply_torque(axis * FLIP_IMPULSE * flip_factor, ForceMode::VelocityChange, 0.0);
        self.body.detect_collisions = false;
        self.jumps_left = self.jumps_left.saturating_sub(1);
    }

    /// Directional dodge: impulse along the stick direction in the last
    /// ground plane, matching tumble, and motion along the ground normal
    /// cancelled so the dodge travels flat. Both axes are projected onto
    /// the ground plane and normalized first, so a pitched car still
    /// dodges at full strength parallel to the surface it left. Gravity
    /// stays off until the dodge timer runs out.
    fn dodge_flip(&mut self, stick: Vec2) {
        let n = self.ground_normal;
        let forward = project_on_plane(self.body.forward(), n).normalize_or_zero();
        let right = project_on_plane(self.body.right(), n).normalize_or_zero();

        // Forward dodge front-flips, sideways dodge barrel-rolls.
        let torque = (right * -stick.y + forward * stick.x) * DODGE_TORQUE;
        self.body.apply_torque(torque, ForceMode::VelocityChange, 0.0);

        let impulse = (right * stick.x + forward * stick.y) * DODGE_IMPULSE;
        self.body.apply_force(impulse, ForceMode::VelocityChange, 0.0);

        self.body.linvel = project_on_plane(self.body.linvel, n);
        self.body.gravity_enabled = false;
        self.body.detect_collisions = false;
        self.dodge_remaining = DODGE_DURATION;
        self.jumps_left = self.jumps_left.saturating_sub(1);
    }

    fn attempt_boost(&mut self, dt: f32) {
        if self.boost <= 0.0 {
            self.end_boost();
            return;
        }
        self.boosting = true;
        if self.body.speed() < MAX_SPEED_BOOSTED {
            self.body
                .apply_force(self.body.forward() * BOOST_ACCELERATION, ForceMode::Acceleration, dt);
        }
        self.boost = (self.boost - BOOST_BURN_PER_SECOND * dt).max(0.0);
    }

    fn end_boost(&mut self) {
        self.boosting = false;
    }

    /// Add boost from a pad, clamped to the tank size.
    pub fn give_boost(&mut self, amount: f32) {
        self.boost = (self.boost + amount).min(MAX_BOOST);
    }

    /// Place the vehicle at its spawn with all transient state cleared.
    /// Held-button state survives so a button held across a reset does not
    /// retrigger on the first tick back.
    pub fn reset(&mut self, spawn: &SpawnPoint) {
        self.body = RigidBody::new(spawn.position, spawn.rotation);
        self.grounded = false;
        self.flipped = false;
        self.boosting = false;
        self.jumps_left = JUMPS_ALLOWED;
        self.boost = INITIAL_BOOST;
        self.dodge_remaining = 0.0;
        self.ground_normal = Vec3::Y;
    }

    pub fn dodging(&self) -> bool {
        self.dodge_remaining > 0.0
    }

    /// Sequence number of the last applied input frame.
    pub fn last_input_seq(&self) -> u32 {
        self.last_input_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::contact::Surface;
    use crate::util::time::tick_delta;

    fn spawn() -> SpawnPoint {
        SpawnPoint {
            team: Team::Blue,
            position: Vec3::new(0.0, VEHICLE_RADIUS, -20.0),
            rotation: Quat::IDENTITY,
        }
    }

    fn test_vehicle() -> Vehicle {
        let mut v = Vehicle::new(Uuid::new_v4(), "tester".into(), Team::Blue, &spawn());
        v.movement_enabled = true;
        v
    }

    fn floor_contact() -> ContactPoint {
        ContactPoint {
            point: Vec3::ZERO,
            normal: Vec3::Y,
            surface: Surface::Ground,
        }
    }

    fn input(seq: u32) -> TickInput {
        TickInput {
            seq,
            ..TickInput::default()
        }
    }

    #[test]
    fn test_boost_stays_within_bounds() {
        let mut v = test_vehicle();
        assert_eq!(v.boost, INITIAL_BOOST);

        v.give_boost(1000.0);
        assert_eq!(v.boost, MAX_BOOST);

        // Burn the whole tank; it must bottom out at exactly zero and
        // boosting must stop.
        v.update_contacts(&[floor_contact()]);
        let mut frame = input(1);
        frame.boost = true;
        v.set_input(frame);
        for _ in 0..600 {
            v.tick(tick_delta());
        }
        assert_eq!(v.boost, 0.0);
        assert!(!v.boosting);
    }

    #[test]
    fn test_two_jumps_then_exhausted() {
        let mut v = test_vehicle();
        v.update_contacts(&[floor_contact()]);

        let mut frame = input(1);
        frame.jump = true;
        v.set_input(frame);
        assert_eq!(v.tick(tick_delta()), Some(Maneuver::Jump));
        assert_eq!(v.jumps_left, 1);

        // Release, go airborne, press again: second jump.
        v.update_contacts(&[]);
        let mut frame = input(2);
        frame.jump = false;
        v.set_input(frame);
        v.tick(tick_delta());
        let mut frame = input(3);
        frame.jump = true;
        v.set_input(frame);
        assert_eq!(v.tick(tick_delta()), Some(Maneuver::Jump));
        assert_eq!(v.jumps_left, 0);

        // Third press does nothing.
        let mut frame = input(4);
        frame.jump = false;
        v.set_input(frame);
        v.tick(tick_delta());
        let mut frame = input(5);
        frame.jump = true;
        v.set_input(frame);
        assert_eq!(v.tick(tick_delta()), None);

        // Landing replenishes.
        v.update_contacts(&[floor_contact()]);
        assert_eq!(v.jumps_left, JUMPS_ALLOWED);
    }

    #[test]
    fn test_held_jump_does_not_retrigger() {
        let mut v = test_vehicle();
        v.update_contacts(&[floor_contact()]);

        let mut frame = input(1);
        frame.jump = true;
        v.set_input(frame);
        assert_eq!(v.tick(tick_delta()), Some(Maneuver::Jump));

        v.update_contacts(&[]);
        let mut frame = input(2);
        frame.jump = true;
        v.set_input(frame);
        // Still held: no second maneuver even though a jump remains.
        assert_eq!(v.tick(tick_delta()), None);
        assert_eq!(v.jumps_left, 1);
    }

    #[test]
    fn test_dodge_cancels_velocity_along_ground_normal() {
        let mut v = test_vehicle();
        v.update_contacts(&[floor_contact()]);

        // First jump off the ground.
        let mut frame = input(1);
        frame.jump = true;
        v.set_input(frame);
        v.tick(tick_delta());
        assert!(v.body.linvel.y > 0.0);

        v.update_contacts(&[]);
        let mut frame = input(2);
        frame.jump = false;
        v.set_input(frame);
        v.tick(tick_delta());

        // Dodge forward: full stick, fresh press.
        let mut frame = input(3);
        frame.jump = true;
        frame.vertical = 1.0;
        v.set_input(frame);
        assert_eq!(v.tick(tick_delta()), Some(Maneuver::DodgeFlip));
        assert!(v.dodging());
        // Vertical motion gone, gravity off for the dodge window.
        assert!(v.body.linvel.y.abs() < 1e-4);
        assert!(!v.body.gravity_enabled);

        // Run out the dodge timer; gravity comes back.
        let mut frame = input(4);
        frame.jump = false;
        v.set_input(frame);
        for _ in 0..60 {
            v.tick(tick_delta());
        }
        assert!(!v.dodging());
        assert!(v.body.gravity_enabled);
    }

    #[test]
    fn test_dodge_axes_follow_ground_plane() {
        let mut v = test_vehicle();
        v.update_contacts(&[]);
        // Nose pitched 60 degrees down: the raw forward axis points well
        // out of the ground plane.
        v.body.rotation = Quat::from_rotation_x(-std::f32::consts::FRAC_PI_3);

        let mut frame = input(1);
        frame.jump = true;
        frame.vertical = 1.0;
        v.set_input(frame);
        assert_eq!(v.tick(tick_delta()), Some(Maneuver::DodgeFlip));

        // Full impulse survives in the ground plane, nothing is lost to
        // the vertical cancellation.
        let planar = project_on_plane(v.body.linvel, Vec3::Y);
        assert!((planar.length() - DODGE_IMPULSE).abs() < 1e-3);
        assert!(v.body.linvel.y.abs() < 1e-4);
        // The tumble axis stays parallel to the surface.
        assert!(v.body.angvel.y.abs() < 1e-4);
    }

    #[test]
    fn test_weak_stick_air_press_is_plain_jump() {
        let mut v = test_vehicle();
        v.update_contacts(&[]);
        v.ground_normal = Vec3::Y;

        let mut frame = input(1);
        frame.jump = true;
        frame.horizontal = 0.3; // below the dodge threshold
        v.set_input(frame);
        assert_eq!(v.tick(tick_delta()), Some(Maneuver::Jump));
    }

    #[test]
    fn test_flipped_vehicle_recovers_with_flip() {
        let mut v = test_vehicle();
        // Resting on its roof.
        v.body.rotation = Quat::from_rotation_z(std::f32::consts::PI);
        v.update_contacts(&[floor_contact()]);
        assert!(v.flipped);

        let mut frame = input(1);
        frame.jump = true;
        v.set_input(frame);
        assert_eq!(v.tick(tick_delta()), Some(Maneuver::Flip));
        // Pushed off along the floor normal, not the car's (downward) up.
        assert!(v.body.linvel.y > 0.0);
        assert_eq!(v.jumps_left, JUMPS_ALLOWED - 1);
    }

    #[test]
    fn test_flipped_grounded_ignores_drive_input() {
        let mut v = test_vehicle();
        v.body.rotation = Quat::from_rotation_z(std::f32::consts::PI);
        v.update_contacts(&[floor_contact()]);

        let mut frame = input(1);
        frame.gas = 1.0;
        frame.horizontal = 1.0;
        v.set_input(frame);
        let rotation_before = v.body.rotation;
        v.tick(tick_delta());
        assert_eq!(v.body.linvel, Vec3::ZERO);
        assert_eq!(v.body.rotation, rotation_before);
    }

    #[test]
    fn test_steering_reverses_in_reverse() {
        let mut v = test_vehicle();
        v.update_contacts(&[floor_contact()]);

        // Rolling backwards with the wheel turned right.
        v.body.linvel = v.body.forward() * -10.0;
        let mut frame = input(1);
        frame.horizontal = 1.0;
        v.set_input(frame);
        let heading_before = v.body.forward();
        v.tick(tick_delta());
        let heading_after = v.body.forward();

        // Compare with the same wheel input while rolling forwards.
        let mut fwd = test_vehicle();
        fwd.update_contacts(&[floor_contact()]);
        fwd.body.linvel = fwd.body.forward() * 10.0;
        fwd.set_input(frame);
        fwd.tick(tick_delta());

        let yaw_rev = heading_before.cross(heading_after).y;
        let yaw_fwd = heading_before.cross(fwd.body.forward()).y;
        assert!(yaw_rev * yaw_fwd < 0.0);
    }

    #[test]
    fn test_movement_disabled_is_inert() {
        let mut v = test_vehicle();
        v.movement_enabled = false;
        v.update_contacts(&[floor_contact()]);

        let mut frame = input(1);
        frame.gas = 1.0;
        frame.jump = true;
        frame.boost = true;
        v.set_input(frame);
        assert_eq!(v.tick(tick_delta()), None);
        assert_eq!(v.body.linvel, Vec3::ZERO);
        assert_eq!(v.boost, INITIAL_BOOST);
    }

    #[test]
    fn test_stale_input_dropped() {
        let mut v = test_vehicle();
        let mut frame = input(10);
        frame.gas = 1.0;
        v.set_input(frame);

        let mut stale = input(4);
        stale.gas = 0.0;
        v.set_input(stale);
        assert_eq!(v.last_input.seq, 10);
        assert_eq!(v.last_input.gas, 1.0);
    }

    #[test]
    fn test_jump_suppresses_collisions_for_one_tick() {
        let mut v = test_vehicle();
        v.update_contacts(&[floor_contact()]);

        let mut frame = input(1);
        frame.jump = true;
        v.set_input(frame);
        v.tick(tick_delta());
        assert!(!v.body.detect_collisions);

        // Next tick restores detection before anything else runs.
        v.update_contacts(&[]);
        let mut frame = input(2);
        frame.jump = false;
        v.set_input(frame);
        v.tick(tick_delta());
        assert!(v.body.detect_collisions);
    }
}
