//! Arena state and authoritative tick loop
//!
//! One task per arena: inputs arrive over an mpsc channel, the simulation
//! runs at a fixed tick rate, and snapshots plus round events fan out over
//! a broadcast channel. Round flow is a plain state machine stepped once
//! per tick; every transition is an explicit assignment, so there is never
//! more than one pending phase and a reset simply overwrites whatever was
//! in flight.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{info, warn};
use uuid::Uuid;

use crate::util::time::{tick_delta, SIMULATION_TPS, SNAPSHOT_TPS};
use crate::ws::protocol::{ClientMsg, GameEvent, PlayerInfo, ServerMsg};

use super::ball::{Ball, BALL_RADIUS, BALL_RESTITUTION};
use super::layout::{ArenaLayout, Team, TeamScores};
use super::physics::{resolve_against_bounds, separate_spheres, sphere_contacts, strike_ball};
use super::snapshot::SnapshotBuilder;
use super::vehicle::{Maneuver, Vehicle, VEHICLE_RADIUS};
use super::{PlayerInput, TickInput};

/// Seconds of "3, 2, 1" before a round goes live.
pub const COUNTDOWN_SECS: f32 = 3.0;
/// Hold after a reset before the countdown begins, so clients see the
/// repositioned field for a beat.
pub const ROUND_START_DELAY: f32 = 1.0;
/// Pause between a goal and the next round reset.
pub const POST_GOAL_DELAY: f32 = 3.0;
/// How long the "GO" display lingers once controls are live.
pub const GO_DISPLAY_SECS: f32 = 1.0;

/// Round phase. `Starting` is already live (controls enabled, ball in
/// play); it only exists so clients know the GO display is still up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundPhase {
    /// Waiting for players
    Waiting,
    /// Field reset, countdown about to begin
    PreCountdown { remaining: f32 },
    Countdown { remaining: f32, displayed: u32 },
    Starting { remaining: f32 },
    Active,
    /// Celebration pause after a goal
    GoalPause { remaining: f32, scorer: Team },
    /// Match clock expired; a restart press starts a fresh match
    Ended,
}

impl RoundPhase {
    pub fn name(&self) -> &'static str {
        match self {
            RoundPhase::Waiting => "waiting",
            RoundPhase::PreCountdown { .. } => "pre_countdown",
            RoundPhase::Countdown { .. } => "countdown",
            RoundPhase::Starting { .. } => "starting",
            RoundPhase::Active => "active",
            RoundPhase::GoalPause { .. } => "goal_pause",
            RoundPhase::Ended => "ended",
        }
    }

    /// Controls enabled and goals armed.
    pub fn live(&self) -> bool {
        matches!(self, RoundPhase::Starting { .. } | RoundPhase::Active)
    }
}

/// Arena state (owned by the arena task)
pub struct ArenaState {
    pub id: Uuid,
    pub tick: u64,
    pub phase: RoundPhase,
    pub scores: TeamScores,
    /// Configured match length in seconds
    pub match_time: f32,
    pub time_left: f32,
    /// The match clock only runs while a round is live; goals and resets
    /// stop it independently of the phase machine.
    pub timer_running: bool,
    pub vehicles: Vec<Vehicle>,
    pub ball: Ball,
    pub layout: ArenaLayout,
    pub min_players: usize,
    pub max_players: usize,
}

impl ArenaState {
    pub fn new(
        id: Uuid,
        layout: ArenaLayout,
        match_time: f32,
        min_players: usize,
        max_players: usize,
    ) -> Self {
        let ball = Ball::new(layout.ball_spawn);
        Self {
            id,
            tick: 0,
            phase: RoundPhase::Waiting,
            scores: TeamScores::default(),
            match_time,
            time_left: match_time,
            timer_running: false,
            vehicles: Vec::new(),
            ball,
            layout,
            min_players,
            max_players,
        }
    }

    fn team_count(&self, team: Team) -> usize {
        self.vehicles.iter().filter(|v| v.team == team).count()
    }

    fn vehicle_mut(&mut self, user_id: Uuid) -> Option<&mut Vehicle> {
        self.vehicles.iter_mut().find(|v| v.user_id == user_id)
    }
}

/// Handle to a running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub event_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<std::sync::atomic::AtomicUsize>,
}

impl ArenaHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Registry of all active arenas
pub struct ArenaRegistry {
    arenas: DashMap<Uuid, ArenaHandle>,
}

impl ArenaRegistry {
    pub fn new() -> Self {
        Self {
            arenas: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<ArenaHandle> {
        self.arenas.get(id).map(|a| a.value().clone())
    }

    pub fn insert(&self, handle: ArenaHandle) {
        self.arenas.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<ArenaHandle> {
        self.arenas.remove(id).map(|(_, h)| h)
    }

    pub fn active_arenas(&self) -> usize {
        self.arenas.len()
    }

    pub fn total_players(&self) -> usize {
        self.arenas.iter().map(|a| a.value().player_count()).sum()
    }

    /// Find an arena with open slots
    pub fn find_available(&self, max_players: usize) -> Option<ArenaHandle> {
        for entry in self.arenas.iter() {
            if entry.value().player_count() < max_players {
                return Some(entry.value().clone());
            }
        }
        None
    }
}

impl Default for ArenaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative arena
pub struct GameArena {
    state: ArenaState,
    input_rx: mpsc::Receiver<PlayerInput>,
    event_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    /// Events since the last snapshot
    pending_events: Vec<GameEvent>,
    /// Set once the first player joins; an arena that has been occupied
    /// and emptied again tears down, whatever phase it is in.
    had_players: bool,
    player_count: Arc<std::sync::atomic::AtomicUsize>,
}

impl GameArena {
    pub fn new(
        id: Uuid,
        layout: ArenaLayout,
        match_time: f32,
        min_players: usize,
        max_players: usize,
    ) -> (Self, ArenaHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handle = ArenaHandle {
            id,
            input_tx,
            event_tx: event_tx.clone(),
            player_count: player_count.clone(),
        };

        let snapshot_interval = SIMULATION_TPS / SNAPSHOT_TPS;
        let arena = Self {
            state: ArenaState::new(id, layout, match_time, min_players, max_players),
            input_rx,
            event_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            pending_events: Vec::new(),
            had_players: false,
            player_count,
        };

        (arena, handle)
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        info!(arena_id = %self.state.id, "Arena started");

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain input queue
            self.process_inputs();

            // Run simulation tick
            self.run_tick();

            // Build and broadcast snapshot if needed
            if self.snapshot_builder.should_send() {
                let events = std::mem::take(&mut self.pending_events);
                let snapshot = self.snapshot_builder.build(
                    self.state.tick,
                    self.state.phase.name(),
                    self.state.scores,
                    self.state.time_left,
                    self.state.timer_running,
                    &self.state.vehicles,
                    &self.state.ball,
                    events,
                );
                let _ = self.event_tx.send(snapshot);
            }

            // Tear down once everyone has left
            if self.should_close() {
                info!(arena_id = %self.state.id, "All players left, closing arena");
                break;
            }
        }
    }

    /// Process all pending inputs from players
    fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            match input.msg {
                ClientMsg::JoinArena {
                    team, display_name, ..
                } => {
                    self.handle_join(input.user_id, team, display_name);
                }
                ClientMsg::InputTick {
                    seq,
                    gas,
                    brake,
                    horizontal,
                    vertical,
                    jump,
                    boost,
                    roll,
                    restart,
                } => {
                    let frame = TickInput {
                        seq,
                        gas: gas.clamp(0.0, 1.0),
                        brake: brake.clamp(0.0, 1.0),
                        horizontal: horizontal.clamp(-1.0, 1.0),
                        vertical: vertical.clamp(-1.0, 1.0),
                        jump,
                        boost,
                        roll,
                        restart,
                    };
                    if let Some(vehicle) = self.state.vehicle_mut(input.user_id) {
                        vehicle.set_input(frame);
                    }
                }
                ClientMsg::Ping { .. } => {
                    // Pongs are answered by the session layer; broadcasting
                    // them would send every player's pong to everyone.
                }
                ClientMsg::LeaveArena => {
                    self.handle_leave(input.user_id);
                }
            }
        }
    }

    /// Handle player join request
    fn handle_join(&mut self, user_id: Uuid, team: Option<Team>, display_name: Option<String>) {
        if self.state.vehicles.iter().any(|v| v.user_id == user_id) {
            warn!(user_id = %user_id, "Player already in arena");
            return;
        }

        if self.state.vehicles.len() >= self.state.max_players {
            let _ = self.event_tx.send(ServerMsg::Error {
                code: "arena_full".to_string(),
                message: "Arena is full".to_string(),
            });
            return;
        }

        // Balance teams when the client has no preference.
        let team = team.unwrap_or_else(|| {
            if self.state.team_count(Team::Blue) <= self.state.team_count(Team::Orange) {
                Team::Blue
            } else {
                Team::Orange
            }
        });

        let display_name =
            display_name.unwrap_or_else(|| format!("Player_{}", &user_id.to_string()[..8]));

        let spawn = self.state.layout.spawn_for_team(team);
        let mut vehicle = Vehicle::new(user_id, display_name, team, spawn);
        // Late joiners in a live round drive immediately.
        vehicle.movement_enabled = self.state.phase.live();

        let player_info = PlayerInfo {
            user_id,
            display_name: vehicle.display_name.clone(),
            team,
        };

        self.state.vehicles.push(vehicle);
        self.had_players = true;
        self.player_count.store(
            self.state.vehicles.len(),
            std::sync::atomic::Ordering::Relaxed,
        );

        let _ = self.event_tx.send(ServerMsg::PlayerJoined {
            player: player_info,
        });

        let players: Vec<PlayerInfo> = self
            .state
            .vehicles
            .iter()
            .map(|v| PlayerInfo {
                user_id: v.user_id,
                display_name: v.display_name.clone(),
                team: v.team,
            })
            .collect();

        let _ = self.event_tx.send(ServerMsg::ArenaJoined {
            arena_id: self.state.id,
            team,
            players,
        });

        info!(
            arena_id = %self.state.id,
            user_id = %user_id,
            team = team.name(),
            player_count = self.state.vehicles.len(),
            "Player joined arena"
        );

        if self.state.phase == RoundPhase::Waiting
            && self.state.vehicles.len() >= self.state.min_players
        {
            self.start_match();
        }
    }

    /// Handle player leave
    fn handle_leave(&mut self, user_id: Uuid) {
        let before = self.state.vehicles.len();
        self.state.vehicles.retain(|v| v.user_id != user_id);
        if self.state.vehicles.len() == before {
            return;
        }

        self.player_count.store(
            self.state.vehicles.len(),
            std::sync::atomic::Ordering::Relaxed,
        );

        let _ = self.event_tx.send(ServerMsg::PlayerLeft {
            user_id,
            reason: "disconnected".to_string(),
        });

        info!(
            arena_id = %self.state.id,
            user_id = %user_id,
            "Player left arena"
        );
    }

    /// True once every player who ever joined has left again. A freshly
    /// created arena stays up waiting for its first join.
    fn should_close(&self) -> bool {
        self.had_players && self.state.vehicles.is_empty()
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) {
        self.state.tick += 1;
        let dt = tick_delta();

        // Restart edges are consumed every tick so a button held through
        // earlier phases cannot fire the moment the match ends.
        let mut restart_requested = false;
        for vehicle in &mut self.state.vehicles {
            restart_requested |= vehicle.take_restart_edge();
        }

        // The match clock runs independently of the phase machine.
        if self.state.timer_running {
            self.state.time_left = (self.state.time_left - dt).max(0.0);
            if self.state.time_left == 0.0 {
                self.end_match();
            }
        }

        match self.state.phase {
            RoundPhase::Waiting => {}
            RoundPhase::PreCountdown { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.state.phase = RoundPhase::Countdown {
                        remaining: COUNTDOWN_SECS,
                        // One above the first displayed value so the first
                        // tick emits it.
                        displayed: COUNTDOWN_SECS as u32 + 1,
                    };
                } else {
                    self.state.phase = RoundPhase::PreCountdown { remaining };
                }
            }
            RoundPhase::Countdown {
                remaining,
                displayed,
            } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.go_live();
                } else {
                    let shown = remaining.ceil() as u32;
                    if shown < displayed {
                        let _ = self.event_tx.send(ServerMsg::Countdown { value: shown });
                    }
                    self.state.phase = RoundPhase::Countdown {
                        remaining,
                        displayed: shown.min(displayed),
                    };
                }
            }
            RoundPhase::Starting { remaining } => {
                let remaining = remaining - dt;
                self.state.phase = if remaining <= 0.0 {
                    RoundPhase::Active
                } else {
                    RoundPhase::Starting { remaining }
                };
            }
            RoundPhase::Active => {}
            RoundPhase::GoalPause { remaining, scorer } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.start_round();
                } else {
                    self.state.phase = RoundPhase::GoalPause { remaining, scorer };
                }
            }
            RoundPhase::Ended => {
                if restart_requested {
                    self.start_match();
                }
            }
        }

        self.step_simulation(dt);
    }

    /// Advance physics and gameplay by one fixed step. Runs in every phase;
    /// vehicles with movement disabled are inert and simply rest on their
    /// spawns.
    fn step_simulation(&mut self, dt: f32) {
        // Contacts and vehicle control
        for vehicle in &mut self.state.vehicles {
            let contacts = sphere_contacts(&vehicle.body, VEHICLE_RADIUS, &self.state.layout.bounds);
            vehicle.update_contacts(&contacts);
            if let Some(maneuver) = vehicle.tick(dt) {
                self.pending_events.push(match maneuver {
                    Maneuver::Jump => GameEvent::Jump {
                        user_id: vehicle.user_id,
                    },
                    Maneuver::Flip => GameEvent::Flip {
                        user_id: vehicle.user_id,
                    },
                    Maneuver::DodgeFlip => GameEvent::DodgeFlip {
                        user_id: vehicle.user_id,
                    },
                });
            }
        }

        // Integrate and resolve against the arena boundary
        for vehicle in &mut self.state.vehicles {
            vehicle.body.integrate(dt);
            resolve_against_bounds(&mut vehicle.body, VEHICLE_RADIUS, &self.state.layout.bounds, 0.0);
        }
        if self.state.ball.visible {
            self.state.ball.body.integrate(dt);
            resolve_against_bounds(
                &mut self.state.ball.body,
                BALL_RADIUS,
                &self.state.layout.bounds,
                BALL_RESTITUTION,
            );
        }

        // Vehicle vs. vehicle separation
        for i in 0..self.state.vehicles.len() {
            for j in (i + 1)..self.state.vehicles.len() {
                let (left, right) = self.state.vehicles.split_at_mut(j);
                separate_spheres(
                    &mut left[i].body,
                    VEHICLE_RADIUS,
                    &mut right[0].body,
                    VEHICLE_RADIUS,
                );
            }
        }

        // Ball strikes
        if self.state.ball.visible {
            for vehicle in &self.state.vehicles {
                if let Some(speed) = strike_ball(
                    &vehicle.body,
                    VEHICLE_RADIUS,
                    &mut self.state.ball.body,
                    BALL_RADIUS,
                ) {
                    self.pending_events.push(GameEvent::BallStruck {
                        user_id: vehicle.user_id,
                        speed,
                    });
                }
            }
        }

        // Boost pads
        for pad in &mut self.state.layout.pads {
            pad.tick(dt);
            if !pad.armed() {
                continue;
            }
            for vehicle in &mut self.state.vehicles {
                if (vehicle.body.position - pad.position).length() <= pad.radius + VEHICLE_RADIUS {
                    let amount = pad.collect();
                    vehicle.give_boost(amount);
                    self.pending_events.push(GameEvent::BoostCollected {
                        user_id: vehicle.user_id,
                        amount,
                    });
                    break;
                }
            }
        }

        // Goal detection only while the round is live and the ball in play
        if self.state.phase.live() && self.state.ball.visible {
            if let Some(defending) = self.state.ball.check_goal(&self.state.layout.goals) {
                let scorer = defending.opponent();
                self.state.ball.explode(&mut self.state.vehicles);
                self.register_goal(scorer);
            }
        }
    }

    /// Credit a goal and enter the celebration pause.
    fn register_goal(&mut self, scorer: Team) {
        self.state.scores.add(scorer);
        self.state.timer_running = false;

        info!(
            arena_id = %self.state.id,
            team = scorer.name(),
            orange = self.state.scores.orange,
            blue = self.state.scores.blue,
            "Goal scored"
        );

        let _ = self.event_tx.send(ServerMsg::GoalScored {
            team: scorer,
            scores: self.state.scores,
        });
        self.snapshot_builder.force_next();

        self.state.phase = RoundPhase::GoalPause {
            remaining: POST_GOAL_DELAY,
            scorer,
        };
    }

    /// Begin a fresh match: clear the board and run the first round.
    fn start_match(&mut self) {
        self.state.scores.reset();
        self.state.time_left = self.state.match_time;
        self.state.timer_running = false;

        info!(arena_id = %self.state.id, "Match starting");
        let _ = self.event_tx.send(ServerMsg::MatchStarted {
            scores: self.state.scores,
        });

        self.start_round();
    }

    /// Reset the field for a round. Overwrites whatever phase was active,
    /// which is the entire cancellation story: there is no pending timer
    /// elsewhere to forget about.
    fn start_round(&mut self) {
        let layout = &self.state.layout;
        for vehicle in &mut self.state.vehicles {
            vehicle.reset(layout.spawn_for_team(vehicle.team));
            vehicle.movement_enabled = false;
        }
        self.state.ball.reset(self.state.layout.ball_spawn);

        self.state.phase = RoundPhase::PreCountdown {
            remaining: ROUND_START_DELAY,
        };
        self.snapshot_builder.force_next();
    }

    /// Countdown hit zero: unfreeze everyone and start the clock.
    fn go_live(&mut self) {
        for vehicle in &mut self.state.vehicles {
            vehicle.movement_enabled = true;
        }
        self.state.timer_running = true;

        // Zero is the "GO" display.
        let _ = self.event_tx.send(ServerMsg::Countdown { value: 0 });
        let _ = self.event_tx.send(ServerMsg::RoundLive {
            tick: self.state.tick,
        });
        self.snapshot_builder.force_next();

        self.state.phase = RoundPhase::Starting {
            remaining: GO_DISPLAY_SECS,
        };
    }

    /// Match clock expired.
    fn end_match(&mut self) {
        self.state.timer_running = false;
        for vehicle in &mut self.state.vehicles {
            vehicle.movement_enabled = false;
        }

        let winner = self.state.scores.leader();
        info!(
            arena_id = %self.state.id,
            winner = winner.map(Team::name).unwrap_or("draw"),
            "Match ended"
        );

        let _ = self.event_tx.send(ServerMsg::MatchEnded {
            winner,
            scores: self.state.scores,
        });
        self.snapshot_builder.force_next();

        self.state.phase = RoundPhase::Ended;
    }
}
