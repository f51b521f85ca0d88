//! Static arena data: teams, spawn points, goal volumes, boost pads
//!
//! Everything here is resolved and validated once when an arena is built;
//! a missing spawn point or goal is a fatal configuration error, not a
//! runtime condition.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::game::physics::{Aabb, ArenaBounds};

/// The two competing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Orange,
    Blue,
}

impl Team {
    /// The other team. Goal credit and end-wall ownership both go through
    /// this rather than any numeric inversion trick.
    pub fn opponent(self) -> Team {
        match self {
            Team::Orange => Team::Blue,
            Team::Blue => Team::Orange,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Team::Orange => "Orange",
            Team::Blue => "Blue",
        }
    }
}

/// Per-team score pair. Exactly two teams, kept explicit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TeamScores {
    pub orange: u32,
    pub blue: u32,
}

impl TeamScores {
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Orange => self.orange,
            Team::Blue => self.blue,
        }
    }

    pub fn add(&mut self, team: Team) {
        match team {
            Team::Orange => self.orange += 1,
            Team::Blue => self.blue += 1,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Higher score wins; equal scores is a draw (`None`).
    pub fn leader(&self) -> Option<Team> {
        match self.orange.cmp(&self.blue) {
            std::cmp::Ordering::Greater => Some(Team::Orange),
            std::cmp::Ordering::Less => Some(Team::Blue),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Where a team's vehicles are placed on round reset.
#[derive(Debug, Clone, Copy)]
pub struct SpawnPoint {
    pub team: Team,
    pub position: Vec3,
    pub rotation: Quat,
}

/// A goal trigger volume, tagged with the team that defends it. Scoring
/// happens when the ball enters the *opposing* team's goal.
#[derive(Debug, Clone, Copy)]
pub struct Goal {
    pub team: Team,
    pub volume: Aabb,
}

/// Default boost granted by a small pad.
pub const SMALL_PAD_BOOST: f32 = 12.0;
/// Boost granted by a full-recharge pad.
pub const FULL_PAD_BOOST: f32 = 100.0;
/// Seconds before a collected pad re-arms.
pub const PAD_RESPAWN_SECS: f32 = 10.0;

/// A timed boost pickup volume. Armed until collected, then disabled for a
/// fixed respawn delay.
#[derive(Debug, Clone, Copy)]
pub struct BoostPad {
    pub position: Vec3,
    pub radius: f32,
    pub amount: f32,
    pub respawn_secs: f32,
    cooldown: f32,
}

impl BoostPad {
    pub fn new(position: Vec3, radius: f32, amount: f32) -> Self {
        Self {
            position,
            radius,
            amount,
            respawn_secs: PAD_RESPAWN_SECS,
            cooldown: 0.0,
        }
    }

    pub fn armed(&self) -> bool {
        self.cooldown <= 0.0
    }

    pub fn tick(&mut self, dt: f32) {
        if self.cooldown > 0.0 {
            self.cooldown = (self.cooldown - dt).max(0.0);
        }
    }

    /// Take the pad's boost and start its respawn timer.
    pub fn collect(&mut self) -> f32 {
        self.cooldown = self.respawn_secs;
        self.amount
    }
}

/// Fatal arena configuration errors, surfaced at construction.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("no spawn point defined for team {0:?}")]
    MissingSpawnPoint(Team),

    #[error("no goal volume defined for team {0:?}")]
    MissingGoal(Team),

    #[error("ball spawn point lies outside the arena bounds")]
    BallSpawnOutOfBounds,
}

/// The full static description of one arena.
#[derive(Debug, Clone)]
pub struct ArenaLayout {
    pub bounds: ArenaBounds,
    pub spawn_points: Vec<SpawnPoint>,
    pub goals: Vec<Goal>,
    pub ball_spawn: Vec3,
    pub pads: Vec<BoostPad>,
    /// Index into `spawn_points`, resolved once at validation.
    spawn_index: [usize; 2],
}

impl ArenaLayout {
    /// Validate a layout and resolve the team -> spawn-point mapping.
    ///
    /// Multiple spawn points per team are tolerated; only the first is used.
    pub fn new(
        bounds: ArenaBounds,
        spawn_points: Vec<SpawnPoint>,
        goals: Vec<Goal>,
        ball_spawn: Vec3,
        pads: Vec<BoostPad>,
    ) -> Result<Self, LayoutError> {
        let mut spawn_index = [usize::MAX; 2];
        for (i, sp) in spawn_points.iter().enumerate() {
            let slot = &mut spawn_index[sp.team as usize];
            if *slot == usize::MAX {
                *slot = i;
            }
        }
        for team in [Team::Orange, Team::Blue] {
            if spawn_index[team as usize] == usize::MAX {
                return Err(LayoutError::MissingSpawnPoint(team));
            }
            if !goals.iter().any(|g| g.team == team) {
                return Err(LayoutError::MissingGoal(team));
            }
        }

        let inside = ball_spawn.x.abs() < bounds.half_width
            && ball_spawn.z.abs() < bounds.half_length
            && ball_spawn.y > 0.0
            && ball_spawn.y < bounds.ceiling;
        if !inside {
            return Err(LayoutError::BallSpawnOutOfBounds);
        }

        Ok(Self {
            bounds,
            spawn_points,
            goals,
            ball_spawn,
            pads,
            spawn_index,
        })
    }

    /// The spawn point used for the given team's vehicles.
    pub fn spawn_for_team(&self, team: Team) -> &SpawnPoint {
        &self.spawn_points[self.spawn_index[team as usize]]
    }

    /// The standard stadium: Blue defends the -Z end, Orange the +Z end.
    pub fn standard() -> Self {
        let bounds = ArenaBounds {
            half_width: 40.0,
            half_length: 60.0,
            ceiling: 20.0,
        };

        let goal_half_width = 10.0;
        let goal_height = 8.0;
        let goal_depth = 3.0;

        let spawn_points = vec![
            SpawnPoint {
                team: Team::Blue,
                position: Vec3::new(0.0, 0.75, -20.0),
                // Facing the ball at center field (+Z, so yawed around)
                rotation: Quat::from_rotation_y(std::f32::consts::PI),
            },
            SpawnPoint {
                team: Team::Orange,
                position: Vec3::new(0.0, 0.75, 20.0),
                rotation: Quat::IDENTITY,
            },
        ];

        let goals = vec![
            Goal {
                team: Team::Blue,
                volume: Aabb::new(
                    Vec3::new(-goal_half_width, 0.0, -bounds.half_length),
                    Vec3::new(goal_half_width, goal_height, -bounds.half_length + goal_depth),
                ),
            },
            Goal {
                team: Team::Orange,
                volume: Aabb::new(
                    Vec3::new(-goal_half_width, 0.0, bounds.half_length - goal_depth),
                    Vec3::new(goal_half_width, goal_height, bounds.half_length),
                ),
            },
        ];

        let pads = vec![
            BoostPad::new(Vec3::new(-30.0, 0.5, -40.0), 2.5, SMALL_PAD_BOOST),
            BoostPad::new(Vec3::new(30.0, 0.5, -40.0), 2.5, SMALL_PAD_BOOST),
            BoostPad::new(Vec3::new(-30.0, 0.5, 40.0), 2.5, SMALL_PAD_BOOST),
            BoostPad::new(Vec3::new(30.0, 0.5, 40.0), 2.5, SMALL_PAD_BOOST),
            BoostPad::new(Vec3::new(-32.0, 0.5, 0.0), 2.5, FULL_PAD_BOOST),
            BoostPad::new(Vec3::new(32.0, 0.5, 0.0), 2.5, FULL_PAD_BOOST),
        ];

        Self::new(
            bounds,
            spawn_points,
            goals,
            Vec3::new(0.0, 1.1, 0.0),
            pads,
        )
        .expect("standard layout is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_is_involutive() {
        assert_eq!(Team::Orange.opponent(), Team::Blue);
        assert_eq!(Team::Blue.opponent(), Team::Orange);
        for team in [Team::Orange, Team::Blue] {
            assert_eq!(team.opponent().opponent(), team);
        }
    }

    #[test]
    fn test_scores_leader() {
        let mut scores = TeamScores::default();
        assert_eq!(scores.leader(), None);
        scores.add(Team::Blue);
        assert_eq!(scores.leader(), Some(Team::Blue));
        scores.add(Team::Orange);
        scores.add(Team::Orange);
        assert_eq!(scores.leader(), Some(Team::Orange));
    }

    #[test]
    fn test_standard_layout_valid() {
        let layout = ArenaLayout::standard();
        assert_eq!(layout.spawn_for_team(Team::Blue).team, Team::Blue);
        assert_eq!(layout.spawn_for_team(Team::Orange).team, Team::Orange);
    }

    #[test]
    fn test_missing_spawn_point_is_fatal() {
        let std = ArenaLayout::standard();
        let only_blue: Vec<SpawnPoint> = std
            .spawn_points
            .iter()
            .copied()
            .filter(|sp| sp.team == Team::Blue)
            .collect();
        let err = ArenaLayout::new(
            std.bounds,
            only_blue,
            std.goals.clone(),
            std.ball_spawn,
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::MissingSpawnPoint(Team::Orange)));
    }

    #[test]
    fn test_first_spawn_point_wins_for_duplicates() {
        let std = ArenaLayout::standard();
        let mut points = std.spawn_points.clone();
        points.push(SpawnPoint {
            team: Team::Blue,
            position: Vec3::new(5.0, 0.75, -30.0),
            rotation: Quat::IDENTITY,
        });
        let layout = ArenaLayout::new(
            std.bounds,
            points.clone(),
            std.goals.clone(),
            std.ball_spawn,
            Vec::new(),
        )
        .unwrap();
        assert_eq!(
            layout.spawn_for_team(Team::Blue).position,
            points[0].position
        );
    }

    #[test]
    fn test_boost_pad_respawn_cycle() {
        let mut pad = BoostPad::new(Vec3::ZERO, 2.5, SMALL_PAD_BOOST);
        assert!(pad.armed());
        assert_eq!(pad.collect(), SMALL_PAD_BOOST);
        assert!(!pad.armed());

        // Tick just short of the respawn delay: still disarmed.
        pad.tick(PAD_RESPAWN_SECS - 0.1);
        assert!(!pad.armed());
        pad.tick(0.2);
        assert!(pad.armed());
    }
}
