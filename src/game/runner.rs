//! Real-time frame loop driving a match

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::store::{AvatarResolver, LeaderboardSink};
use crate::util::time::{frame_duration, Timer};
use crate::ws::protocol::{GameEvent, MatchSnapshot, ServerMsg};

use super::r#match::{step, MatchCommand, MatchError, MatchOutcome, MatchState, StepReport};
use super::snapshot::{BroadcastRenderer, Renderer, SnapshotBuilder};

/// A command plus an optional slot for its result
#[derive(Debug)]
pub struct Envelope {
    pub command: MatchCommand,
    pub reply: Option<oneshot::Sender<Result<(), MatchError>>>,
}

/// Why a command sent through a [`MatchHandle`] did not succeed
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("match loop is not running")]
    Stopped,

    #[error(transparent)]
    Rejected(#[from] MatchError),
}

/// Handle to the running match
#[derive(Clone)]
pub struct MatchHandle {
    command_tx: mpsc::Sender<Envelope>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    latest: Arc<RwLock<Option<MatchSnapshot>>>,
}

impl MatchHandle {
    /// Queue a command for the next frame without waiting for the result
    pub async fn send(&self, command: MatchCommand) -> Result<(), CommandError> {
        self.command_tx
            .send(Envelope {
                command,
                reply: None,
            })
            .await
            .map_err(|_| CommandError::Stopped)
    }

    /// Queue a command and wait for the frame that applies it
    pub async fn request(&self, command: MatchCommand) -> Result<(), CommandError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(Envelope {
                command,
                reply: Some(tx),
            })
            .await
            .map_err(|_| CommandError::Stopped)?;

        rx.await.map_err(|_| CommandError::Stopped)??;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.broadcast_tx.subscribe()
    }

    /// Most recent snapshot, if any frame has been rendered yet
    pub fn latest_snapshot(&self) -> Option<MatchSnapshot> {
        self.latest.read().clone()
    }
}

/// The authoritative match loop
pub struct GameMatch {
    state: MatchState,
    command_rx: mpsc::Receiver<Envelope>,
    /// Feeds async results (avatars) back into the loop
    command_tx: mpsc::Sender<Envelope>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    renderer: Box<dyn Renderer>,
    snapshot_builder: SnapshotBuilder,
    leaderboard: Arc<dyn LeaderboardSink>,
    avatars: Arc<dyn AvatarResolver>,
}

impl GameMatch {
    pub fn new(
        config: GameConfig,
        leaderboard: Arc<dyn LeaderboardSink>,
        avatars: Arc<dyn AvatarResolver>,
    ) -> (Self, MatchHandle) {
        let (command_tx, command_rx) = mpsc::channel(1024);
        let (broadcast_tx, _) = broadcast::channel(256);
        let latest = Arc::new(RwLock::new(None));

        let handle = MatchHandle {
            command_tx: command_tx.clone(),
            broadcast_tx: broadcast_tx.clone(),
            latest: latest.clone(),
        };

        let seed = config.seed.unwrap_or_else(rand::random);
        let snapshot_builder = SnapshotBuilder::new(config.snapshot_every_frames);
        let game_match = Self {
            state: MatchState::new(Uuid::new_v4(), seed, config),
            command_rx,
            command_tx,
            broadcast_tx: broadcast_tx.clone(),
            renderer: Box::new(BroadcastRenderer::new(broadcast_tx, latest)),
            snapshot_builder,
            leaderboard,
            avatars,
        };

        (game_match, handle)
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Run the frame loop forever
    pub async fn run(mut self) {
        info!(
            match_id = %self.state.id,
            seed = self.state.seed,
            fps = self.state.config.frames_per_second,
            "Match loop started"
        );

        let mut frame_interval = interval(frame_duration(self.state.config.frames_per_second));
        frame_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            frame_interval.tick().await;
            self.frame();
        }
    }

    /// Drain queued commands and advance one frame
    pub fn frame(&mut self) {
        let timer = Timer::new();
        let mut commands = Vec::new();
        let mut replies = Vec::new();
        while let Ok(envelope) = self.command_rx.try_recv() {
            commands.push(envelope.command);
            replies.push(envelope.reply);
        }

        let report = step(&mut self.state, commands);

        for (reply, result) in replies.into_iter().zip(report.results.iter()) {
            if let Some(tx) = reply {
                // The requester may have given up waiting
                let _ = tx.send(result.clone());
            }
        }

        self.publish(report);

        let budget = frame_duration(self.state.config.frames_per_second).as_micros() as u64;
        let elapsed = timer.elapsed_micros();
        if elapsed > budget {
            warn!(
                match_id = %self.state.id,
                frame = self.state.clock.frame,
                alive = self.state.alive_count(),
                elapsed_us = elapsed,
                "Frame exceeded its time budget"
            );
        }
    }

    fn publish(&mut self, report: StepReport) {
        for event in &report.events {
            match event {
                GameEvent::Joined { username, .. } => self.resolve_avatar(username),
                GameEvent::Kill {
                    killer,
                    victim,
                    cause,
                } => {
                    debug!(
                        match_id = %self.state.id,
                        victim = %victim,
                        killer = ?killer,
                        cause = ?cause,
                        "Agent down"
                    );
                }
                _ => {}
            }
        }

        if !report.events.is_empty() {
            let _ = self.broadcast_tx.send(ServerMsg::Events {
                frame: self.state.clock.frame,
                events: report.events,
            });
        }

        if report.phase_changed {
            debug!(match_id = %self.state.id, phase = ?self.state.phase, "Phase changed");
            let _ = self.broadcast_tx.send(ServerMsg::PhaseChanged {
                phase: self.state.phase,
            });
            self.snapshot_builder.force_next();
        }

        if self.snapshot_builder.should_send() {
            let snapshot = SnapshotBuilder::build(&self.state);
            self.renderer.render(&snapshot);
        }

        if let Some(outcome) = report.outcome {
            let winner = match outcome {
                MatchOutcome::Winner(record) => {
                    self.leaderboard.record_win(&record);
                    Some(record.username)
                }
                MatchOutcome::Draw => None,
            };
            info!(
                match_id = %self.state.id,
                winner = ?winner,
                kills = self.state.total_kills(),
                frames = self.state.clock.frame - self.state.battle_started_frame,
                "Match ended"
            );
            let _ = self.broadcast_tx.send(ServerMsg::MatchEnd {
                winner,
                stats: self.state.build_match_stats(),
            });
        }
    }

    /// Look the avatar up off-loop and feed the answer back as a command
    fn resolve_avatar(&self, username: &str) {
        let lookup = self.avatars.resolve(username);
        let tx = self.command_tx.clone();
        let username = username.to_string();
        tokio::spawn(async move {
            let avatar = lookup.await;
            if avatar.is_some() {
                let _ = tx
                    .send(Envelope {
                        command: MatchCommand::AvatarResolved { username, avatar },
                        reply: None,
                    })
                    .await;
            }
        });
    }
}
