//! Match state and the per-frame step function

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::lobby::{parse_join, ChatEvent, JoinQueue, JoinRejected, PendingJoin};
use crate::store::WinRecord;
use crate::util::time::FrameClock;
use crate::ws::protocol::{
    AgentMatchStats, GameEvent, KillCause, MatchPhase, MatchStats,
};

use super::agent::Agent;
use super::combat::{CombatRules, CombatSystem};
use super::physics::{PhysicsSystem, Wall};
use super::supply::{SupplyItem, SupplySystem};
use super::zone::Zone;

/// Things the outside world can ask of a match
#[derive(Debug, Clone)]
pub enum MatchCommand {
    /// SETUP -> LOBBY
    OpenLobby,
    /// Chat message that may be a join
    Chat(ChatEvent),
    /// Avatar lookup finished for a participant
    AvatarResolved {
        username: String,
        avatar: Option<String>,
    },
    /// LOBBY -> BATTLE
    StartBattle,
    /// Admin removes a living agent
    Eliminate { username: String },
    /// Any phase -> SETUP
    Reset,
}

/// Reasons a command was refused; the match is left untouched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("command needs phase {expected:?}, match is in {actual:?}")]
    WrongPhase {
        expected: MatchPhase,
        actual: MatchPhase,
    },

    #[error("need at least 2 participants, have {0}")]
    NotEnoughParticipants(usize),

    #[error("no living agent named {0}")]
    UnknownAgent(String),

    #[error("message is not a join request")]
    NotAJoin,

    #[error(transparent)]
    Join(#[from] JoinRejected),
}

/// How a round ended
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Winner(WinRecord),
    Draw,
}

/// Everything one call to [`step`] produced
#[derive(Debug, Default)]
pub struct StepReport {
    /// One result per command, in input order
    pub results: Vec<Result<(), MatchError>>,
    pub events: Vec<GameEvent>,
    /// Set on the frame the round ends, never again
    pub outcome: Option<MatchOutcome>,
    pub phase_changed: bool,
}

/// Authoritative state of one match
#[derive(Debug, Clone)]
pub struct MatchState {
    pub id: Uuid,
    pub seed: u64,
    pub phase: MatchPhase,
    pub config: GameConfig,
    pub clock: FrameClock,
    pub lobby: JoinQueue,
    pub agents: Vec<Agent>,
    pub zone: Zone,
    pub supply: SupplySystem,
    pub supplies: Vec<SupplyItem>,
    pub combat: CombatRules,
    pub rng: ChaCha8Rng,
    /// Participants frozen at battle start
    pub initial_count: usize,
    pub battle_started_frame: u64,
    pub winner: Option<String>,
}

impl MatchState {
    pub fn new(id: Uuid, seed: u64, config: GameConfig) -> Self {
        Self {
            id,
            seed,
            phase: MatchPhase::Setup,
            clock: FrameClock::new(config.frames_per_second),
            lobby: JoinQueue::new(config.max_participants),
            agents: Vec::new(),
            zone: Zone::idle(config.arena_radius),
            supply: SupplySystem::new(&config),
            supplies: Vec::new(),
            combat: CombatRules::new(config.clash_chance, config.combat_chance, 0),
            rng: ChaCha8Rng::seed_from_u64(seed),
            initial_count: 0,
            battle_started_frame: 0,
            winner: None,
            config,
        }
    }

    /// Count alive agents
    pub fn alive_count(&self) -> usize {
        self.agents.iter().filter(|a| a.alive).count()
    }

    pub fn total_kills(&self) -> u32 {
        self.agents.iter().map(|a| a.kills).sum()
    }

    /// Apply one external command
    pub fn apply(&mut self, command: MatchCommand) -> Result<Vec<GameEvent>, MatchError> {
        match command {
            MatchCommand::OpenLobby => {
                self.expect_phase(MatchPhase::Setup)?;
                self.lobby.clear();
                self.phase = MatchPhase::Lobby;
                info!(match_id = %self.id, "Lobby open");
                Ok(Vec::new())
            }
            MatchCommand::Chat(event) => self.handle_chat(&event),
            MatchCommand::AvatarResolved { username, avatar } => {
                if !self.lobby.set_avatar(&username, avatar.clone()) {
                    if let Some(agent) = self.agents.iter_mut().find(|a| a.username == username) {
                        agent.avatar = avatar;
                    }
                }
                Ok(Vec::new())
            }
            MatchCommand::StartBattle => self.start_battle(),
            MatchCommand::Eliminate { username } => self.eliminate(&username),
            MatchCommand::Reset => {
                self.reset();
                Ok(Vec::new())
            }
        }
    }

    fn expect_phase(&self, expected: MatchPhase) -> Result<(), MatchError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(MatchError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    fn handle_chat(&mut self, event: &ChatEvent) -> Result<Vec<GameEvent>, MatchError> {
        if self.phase != MatchPhase::Lobby {
            return Err(JoinRejected::LobbyClosed.into());
        }

        let request = parse_join(
            event,
            &self.config.join_keyword,
            self.config.join_sticker.as_deref(),
        )
        .ok_or(MatchError::NotAJoin)?;

        let joined = GameEvent::Joined {
            username: request.username.clone(),
            weapon: request.weapon,
        };
        self.lobby.enqueue(PendingJoin::from(request))?;
        debug!(match_id = %self.id, lobby_size = self.lobby.len(), "Participant joined");
        Ok(vec![joined])
    }

    /// Freeze the lobby into agents and begin the fight
    fn start_battle(&mut self) -> Result<Vec<GameEvent>, MatchError> {
        self.expect_phase(MatchPhase::Lobby)?;
        let count = self.lobby.len();
        if count < 2 {
            return Err(MatchError::NotEnoughParticipants(count));
        }

        let roster = self.lobby.drain();
        let arena = self.config.arena_radius;
        self.agents = roster
            .into_iter()
            .map(|join| {
                let mut agent = Agent::spawn(join.username, join.weapon, count, arena, &mut self.rng);
                agent.avatar = join.avatar;
                agent
            })
            .collect();

        self.zone = Zone::start(
            arena,
            self.config.zone_floor_radius,
            self.config.round_duration_secs,
            self.config.frames_per_second,
        );
        self.supply = SupplySystem::new(&self.config);
        self.supply.reset(self.clock.now());
        self.supplies.clear();
        self.combat = CombatRules::new(self.config.clash_chance, self.config.combat_chance, count);
        self.initial_count = count;
        self.battle_started_frame = self.clock.frame;
        self.winner = None;
        self.phase = MatchPhase::Battle;

        info!(match_id = %self.id, participants = count, "Battle started");
        Ok(vec![GameEvent::BattleStarted {
            participants: count as u32,
        }])
    }

    /// Admin removal outside the combat path
    fn eliminate(&mut self, username: &str) -> Result<Vec<GameEvent>, MatchError> {
        self.expect_phase(MatchPhase::Battle)?;
        let frame = self.clock.frame;
        let agent = self
            .agents
            .iter_mut()
            .find(|a| a.alive && a.username == username)
            .ok_or_else(|| MatchError::UnknownAgent(username.to_string()))?;

        agent.hp = 0.0;
        agent.settle_death(frame);
        info!(match_id = %self.id, username = %username, "Agent eliminated by admin");

        Ok(vec![GameEvent::Kill {
            killer: None,
            victim: username.to_string(),
            cause: KillCause::Eliminated,
        }])
    }

    /// Back to SETUP for a re-match
    fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.phase = MatchPhase::Setup;
        self.lobby.clear();
        self.agents.clear();
        self.supplies.clear();
        self.zone = Zone::idle(self.config.arena_radius);
        self.initial_count = 0;
        self.winner = None;
        info!(match_id = %self.id, "Match reset");
    }

    /// Advance the battle by one frame: physics, supplies, combat, zone
    fn simulate_frame(&mut self, events: &mut Vec<GameEvent>) {
        let now = self.clock.now();
        let frame = self.clock.frame;
        let wall = Wall {
            arena_radius: self.config.arena_radius,
            zone_radius: self.zone.radius,
            sudden_death: self.zone.at_floor(),
        };

        for agent in self.agents.iter_mut() {
            let storm = PhysicsSystem::step_agent(
                agent,
                &wall,
                now,
                self.config.storm_damage_per_frame,
            );
            if storm > 0.0 && agent.settle_death(frame) {
                events.push(GameEvent::Kill {
                    killer: None,
                    victim: agent.username.clone(),
                    cause: KillCause::Storm,
                });
            }
        }

        self.supply.expire(&mut self.supplies, now, events);
        if let Some(item) = self.supply.try_spawn(now, self.zone.radius, &mut self.rng) {
            events.push(GameEvent::SupplySpawned {
                id: item.id,
                kind: item.kind,
                x: item.x,
                y: item.y,
            });
            self.supplies.push(item);
        }
        let items = std::mem::take(&mut self.supplies);
        self.supplies = SupplySystem::resolve_pickups(&mut self.agents, items, now, frame, events);

        events.extend(CombatSystem::resolve(
            &mut self.agents,
            &self.combat,
            frame,
            &mut self.rng,
        ));

        self.zone.step();
    }

    /// Move to WINNER or DRAW when the battle is decided
    fn evaluate_termination(&mut self, events: &mut Vec<GameEvent>) -> Option<MatchOutcome> {
        if self.phase != MatchPhase::Battle {
            return None;
        }

        let mut alive = self.agents.iter().filter(|a| a.alive);
        let first = alive.next();
        let more = alive.next().is_some();

        match (first, more) {
            (None, _) => {
                self.phase = MatchPhase::Draw;
                info!(match_id = %self.id, frame = self.clock.frame, "Match ended in a draw");
                events.push(GameEvent::Draw);
                Some(MatchOutcome::Draw)
            }
            (Some(survivor), false) if self.initial_count >= 2 => {
                let record = WinRecord {
                    username: survivor.username.clone(),
                    avatar: survivor.avatar.clone(),
                    kills: survivor.kills,
                    points: self.config.win_points + survivor.kills * self.config.points_per_kill,
                };
                self.phase = MatchPhase::Winner;
                self.winner = Some(record.username.clone());
                info!(
                    match_id = %self.id,
                    winner = %record.username,
                    kills = record.kills,
                    "Match won"
                );
                events.push(GameEvent::Winner {
                    username: record.username.clone(),
                    kills: record.kills,
                    points: record.points,
                });
                Some(MatchOutcome::Winner(record))
            }
            _ => None,
        }
    }

    /// Build end-of-round stats; placement follows death order
    pub fn build_match_stats(&self) -> MatchStats {
        let end_frame = self.clock.frame;
        let fps = self.clock.fps as f32;
        let survived =
            |died: Option<u64>| (died.unwrap_or(end_frame) - self.battle_started_frame) as f32 / fps;

        let mut order: Vec<&Agent> = self.agents.iter().collect();
        // Living first, then the latest deaths
        order.sort_by(|a, b| {
            let a_key = a.died_at_frame.unwrap_or(u64::MAX);
            let b_key = b.died_at_frame.unwrap_or(u64::MAX);
            b_key.cmp(&a_key)
        });

        let agent_stats = order
            .into_iter()
            .enumerate()
            .map(|(i, a)| AgentMatchStats {
                username: a.username.clone(),
                weapon: a.weapon,
                kills: a.kills,
                placement: (i + 1) as u32,
                survived_secs: survived(a.died_at_frame),
            })
            .collect();

        MatchStats {
            duration_secs: (end_frame - self.battle_started_frame) as f32 / fps,
            total_participants: self.initial_count as u32,
            agent_stats,
        }
    }
}

/// Advance a match by one frame.
///
/// Commands are applied first, in order; a battle is then checked for a
/// decision, simulated and checked again. Nothing else mutates the state, so
/// a renderer only ever observes whole frames.
pub fn step(state: &mut MatchState, commands: Vec<MatchCommand>) -> StepReport {
    let mut report = StepReport::default();
    let phase_before = state.phase;

    state.clock.advance();

    for command in commands {
        match state.apply(command) {
            Ok(events) => {
                report.events.extend(events);
                report.results.push(Ok(()));
            }
            Err(e) => {
                debug!(match_id = %state.id, error = %e, "Command rejected");
                report.results.push(Err(e));
            }
        }
    }

    if state.phase == MatchPhase::Battle {
        report.outcome = state.evaluate_termination(&mut report.events);
        if report.outcome.is_none() {
            state.simulate_frame(&mut report.events);
            report.outcome = state.evaluate_termination(&mut report.events);
        }
    }

    report.phase_changed = state.phase != phase_before;
    report
}
