//! Snapshot building and pacing

use crate::game::ball::Ball;
use crate::game::layout::TeamScores;
use crate::game::vehicle::Vehicle;
use crate::ws::protocol::{BallSnapshot, GameEvent, ServerMsg, VehicleSnapshot};

/// Paces and builds state snapshots for network transmission. Snapshots go
/// out every `snapshot_interval` simulation ticks, or immediately when
/// forced by a phase change.
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for phase transitions)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &mut self,
        tick: u64,
        phase: &'static str,
        scores: TeamScores,
        time_left: f32,
        timer_running: bool,
        vehicles: &[Vehicle],
        ball: &Ball,
        events: Vec<GameEvent>,
    ) -> ServerMsg {
        let vehicle_snapshots: Vec<VehicleSnapshot> = vehicles
            .iter()
            .map(|v| VehicleSnapshot {
                user_id: v.user_id,
                team: v.team,
                position: v.body.position,
                rotation: v.body.rotation,
                velocity: v.body.linvel,
                boost: v.boost,
                grounded: v.grounded,
                flipped: v.flipped,
                boosting: v.boosting,
                last_input_seq: v.last_input_seq(),
            })
            .collect();

        ServerMsg::Snapshot {
            tick,
            phase: phase.to_owned(),
            scores,
            time_left,
            timer_running,
            vehicles: vehicle_snapshots,
            ball: BallSnapshot {
                position: ball.body.position,
                velocity: ball.body.linvel,
                visible: ball.visible,
            },
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_pacing() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());
        assert!(!builder.should_send());
    }

    #[test]
    fn test_force_next_overrides_pacing() {
        let mut builder = SnapshotBuilder::new(3);
        builder.force_next();
        assert!(builder.should_send());
        // Counter reset: back to normal pacing afterwards.
        assert!(!builder.should_send());
    }
}
