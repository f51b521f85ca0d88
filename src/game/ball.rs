//! The match ball
//!
//! A bouncy sphere that reacts to vehicle strikes, detects goal entry as an
//! edge (fires once per entry), and blows itself up after scoring.

use glam::{Quat, Vec3};

use crate::game::layout::{Goal, Team};
use crate::game::physics::RigidBody;
use crate::game::vehicle::Vehicle;

pub const BALL_RADIUS: f32 = 1.1;
pub const BALL_RESTITUTION: f32 = 0.7;
/// Velocity-change strength of the post-goal explosion at its center.
pub const EXPLOSION_IMPULSE: f32 = 40.0;
/// Falloff radius of the explosion; covers the whole arena.
pub const EXPLOSION_RADIUS: f32 = 100.0;

#[derive(Debug, Clone)]
pub struct Ball {
    pub body: RigidBody,
    /// False between a goal and the next round reset; the ball is out of
    /// play and excluded from simulation.
    pub visible: bool,
    /// Which goal volume the ball is currently inside, by defending team.
    inside_goal: Option<Team>,
}

impl Ball {
    pub fn new(spawn: Vec3) -> Self {
        Self {
            body: RigidBody::new(spawn, Quat::IDENTITY),
            visible: true,
            inside_goal: None,
        }
    }

    /// Back to center: motionless, upright, in play.
    pub fn reset(&mut self, spawn: Vec3) {
        self.body = RigidBody::new(spawn, Quat::IDENTITY);
        self.visible = true;
        self.inside_goal = None;
    }

    /// Edge-triggered goal check: returns the defending team of a goal the
    /// ball entered this tick. Staying inside fires nothing further.
    pub fn check_goal(&mut self, goals: &[Goal]) -> Option<Team> {
        let now_inside = goals
            .iter()
            .find(|g| g.volume.contains(self.body.position))
            .map(|g| g.team);

        let entered = match (self.inside_goal, now_inside) {
            (None, Some(team)) => Some(team),
            _ => None,
        };
        self.inside_goal = now_inside;
        entered
    }

    /// Post-goal blast: shove every vehicle away from the ball and take the
    /// ball out of play until the next reset.
    pub fn explode(&mut self, vehicles: &mut [Vehicle]) {
        for vehicle in vehicles.iter_mut() {
            vehicle
                .body
                .apply_explosion_impulse(self.body.position, EXPLOSION_IMPULSE, EXPLOSION_RADIUS);
        }
        self.visible = false;
        self.body.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::layout::ArenaLayout;
    use uuid::Uuid;

    fn ball_in_goal(layout: &ArenaLayout, team: Team) -> Ball {
        let goal = layout.goals.iter().find(|g| g.team == team).unwrap();
        Ball::new(goal.volume.center())
    }

    #[test]
    fn test_goal_entry_fires_once() {
        let layout = ArenaLayout::standard();
        let mut ball = ball_in_goal(&layout, Team::Blue);

        assert_eq!(ball.check_goal(&layout.goals), Some(Team::Blue));
        // Still inside next tick: no repeat.
        assert_eq!(ball.check_goal(&layout.goals), None);

        // Leave and re-enter: fires again.
        ball.body.position = layout.ball_spawn;
        assert_eq!(ball.check_goal(&layout.goals), None);
        ball.body.position = layout
            .goals
            .iter()
            .find(|g| g.team == Team::Blue)
            .unwrap()
            .volume
            .center();
        assert_eq!(ball.check_goal(&layout.goals), Some(Team::Blue));
    }

    #[test]
    fn test_ball_at_center_is_in_no_goal() {
        let layout = ArenaLayout::standard();
        let mut ball = Ball::new(layout.ball_spawn);
        assert_eq!(ball.check_goal(&layout.goals), None);
    }

    #[test]
    fn test_explosion_shoves_vehicles_and_hides_ball() {
        let layout = ArenaLayout::standard();
        let mut ball = Ball::new(Vec3::new(0.0, BALL_RADIUS, -55.0));
        let spawn = layout.spawn_for_team(Team::Blue);
        let mut vehicles = vec![Vehicle::new(
            Uuid::new_v4(),
            "v".into(),
            Team::Blue,
            spawn,
        )];

        ball.explode(&mut vehicles);
        assert!(!ball.visible);
        assert_eq!(ball.body.linvel, Vec3::ZERO);
        // Vehicle pushed away from the blast.
        let away = vehicles[0].body.position - Vec3::new(0.0, BALL_RADIUS, -55.0);
        assert!(vehicles[0].body.linvel.dot(away) > 0.0);
    }

    #[test]
    fn test_reset_returns_ball_to_play() {
        let layout = ArenaLayout::standard();
        let mut ball = ball_in_goal(&layout, Team::Orange);
        ball.check_goal(&layout.goals);
        ball.explode(&mut []);

        ball.reset(layout.ball_spawn);
        assert!(ball.visible);
        assert_eq!(ball.body.position, layout.ball_spawn);
        assert_eq!(ball.check_goal(&layout.goals), None);
    }
}
