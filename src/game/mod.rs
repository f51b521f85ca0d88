//! Game simulation modules

pub mod arena;
pub mod ball;
pub mod contact;
pub mod layout;
pub mod physics;
pub mod snapshot;
pub mod vehicle;

pub use arena::{ArenaHandle, ArenaRegistry, GameArena, RoundPhase};
pub use layout::{ArenaLayout, Team};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Player input received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub user_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}

/// Input state for a single tick (processed from ClientMsg::InputTick)
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    pub seq: u32,
    pub gas: f32,
    pub brake: f32,
    pub horizontal: f32,
    pub vertical: f32,
    pub jump: bool,
    pub boost: bool,
    pub roll: bool,
    pub restart: bool,
}
