//! Snapshot building and the renderer seam

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::ws::protocol::{AgentSnapshot, MatchSnapshot, ServerMsg, SupplySnapshot};

use super::r#match::MatchState;

/// Anything that draws the match. Renderers only ever see immutable snapshots.
pub trait Renderer: Send {
    fn render(&mut self, snapshot: &MatchSnapshot);
}

/// Decides when to emit snapshots and builds them
pub struct SnapshotBuilder {
    /// Frames since the last snapshot
    frames_since_snapshot: u32,
    /// Snapshot interval in frames
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        let snapshot_interval = snapshot_interval.max(1);
        Self {
            frames_since_snapshot: snapshot_interval,
            snapshot_interval,
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.frames_since_snapshot += 1;
        if self.frames_since_snapshot >= self.snapshot_interval {
            self.frames_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for phase changes)
    pub fn force_next(&mut self) {
        self.frames_since_snapshot = self.snapshot_interval;
    }

    /// Build an immutable view of the match
    pub fn build(state: &MatchState) -> MatchSnapshot {
        let agents = state
            .agents
            .iter()
            .map(|a| AgentSnapshot {
                username: a.username.clone(),
                avatar: a.avatar.clone(),
                weapon: a.weapon,
                x: a.x,
                y: a.y,
                facing: a.facing,
                radius: a.radius,
                hp: a.hp,
                max_hp: a.max_hp,
                alive: a.alive,
                kills: a.kills,
                powered: a.damage.value > 1.0,
                hasted: a.speed.value > 1.0,
                slowed: a.speed.value < 1.0,
            })
            .collect();

        let supplies = state
            .supplies
            .iter()
            .map(|s| SupplySnapshot {
                id: s.id,
                kind: s.kind,
                x: s.x,
                y: s.y,
                radius: s.pickup_radius,
            })
            .collect();

        MatchSnapshot {
            match_id: state.id,
            frame: state.clock.frame,
            phase: state.phase,
            arena_radius: state.config.arena_radius,
            zone_radius: state.zone.radius,
            agents,
            supplies,
            lobby: state.lobby.iter().map(|p| p.username.clone()).collect(),
            winner: state.winner.clone(),
        }
    }
}

/// Renderer that fans snapshots out to overlay WebSockets and keeps the
/// latest one for late joiners and the HTTP endpoint
#[derive(Clone)]
pub struct BroadcastRenderer {
    tx: broadcast::Sender<ServerMsg>,
    latest: Arc<RwLock<Option<MatchSnapshot>>>,
}

impl BroadcastRenderer {
    pub fn new(tx: broadcast::Sender<ServerMsg>, latest: Arc<RwLock<Option<MatchSnapshot>>>) -> Self {
        Self { tx, latest }
    }
}

impl Renderer for BroadcastRenderer {
    fn render(&mut self, snapshot: &MatchSnapshot) {
        *self.latest.write() = Some(snapshot.clone());
        // No receivers is fine: nobody is watching yet
        let _ = self.tx.send(ServerMsg::Snapshot {
            snapshot: snapshot.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use uuid::Uuid;

    #[test]
    fn sends_on_interval_and_when_forced() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(builder.should_send());
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn broadcast_renderer_keeps_latest() {
        let (tx, mut rx) = broadcast::channel(4);
        let latest = Arc::new(RwLock::new(None));
        let mut renderer = BroadcastRenderer::new(tx, latest.clone());

        let state = MatchState::new(Uuid::new_v4(), 1, GameConfig::default());
        let snapshot = SnapshotBuilder::build(&state);
        renderer.render(&snapshot);

        assert_eq!(latest.read().as_ref(), Some(&snapshot));
        assert!(matches!(rx.try_recv(), Ok(ServerMsg::Snapshot { .. })));
    }
}
