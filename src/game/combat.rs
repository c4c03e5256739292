//! Pairwise collision, clash and combat resolution

use rand::Rng;

use crate::ws::protocol::{GameEvent, KillCause};

use super::agent::{weapon_damage, Agent};
use super::physics::{collision_normal, PhysicsSystem};

/// Weapon reach as a multiple of the two body radii
pub const REACH_FACTOR: f32 = 2.2;
/// Velocity impulse applied to both sides of a clash
pub const CLASH_IMPULSE: f32 = 4.0;
/// Frames an agent sits out of clashes after one
pub const CLASH_COOLDOWN_FRAMES: u32 = 30;
/// Knockback velocity per point of damage taken
pub const KNOCKBACK_PER_DAMAGE: f32 = 0.1;
/// Share of max hp restored to a killer
pub const KILL_HEAL_FRACTION: f32 = 0.2;

/// Damage multiplier from the roster size: `sqrt(N) / 5`, capped at 1
pub fn damage_scaling(total_agents: usize) -> f32 {
    ((total_agents.max(1) as f32).sqrt() / 5.0).min(1.0)
}

/// Per-match combat parameters
#[derive(Debug, Clone, Copy)]
pub struct CombatRules {
    pub clash_chance: f64,
    pub combat_chance: f64,
    pub scaling: f32,
}

impl CombatRules {
    pub fn new(clash_chance: f64, combat_chance: f64, total_agents: usize) -> Self {
        Self {
            clash_chance: clash_chance.clamp(0.0, 1.0),
            combat_chance: combat_chance.clamp(0.0, 1.0),
            scaling: damage_scaling(total_agents),
        }
    }

    /// Damage `attacker` deals in one exchange
    pub fn damage_from(&self, attacker: &Agent) -> f32 {
        weapon_damage(attacker.weapon) * attacker.damage.value * self.scaling
    }
}

/// Combat system for resolving agent pairs
pub struct CombatSystem;

impl CombatSystem {
    /// Resolve every unordered pair of living agents, in index order
    pub fn resolve<R: Rng + ?Sized>(
        agents: &mut [Agent],
        rules: &CombatRules,
        frame: u64,
        rng: &mut R,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();

        for i in 0..agents.len() {
            let (left, right) = agents.split_at_mut(i + 1);
            let a = &mut left[i];
            for b in right.iter_mut() {
                if !a.alive {
                    break;
                }
                if !b.alive {
                    continue;
                }
                Self::resolve_pair(a, b, rules, frame, rng, &mut events);
            }
        }

        events
    }

    fn resolve_pair<R: Rng + ?Sized>(
        a: &mut Agent,
        b: &mut Agent,
        rules: &CombatRules,
        frame: u64,
        rng: &mut R,
        events: &mut Vec<GameEvent>,
    ) {
        if PhysicsSystem::overlapping(a, b) {
            PhysicsSystem::separate(a, b);
            PhysicsSystem::elastic_bounce(a, b);
        }

        let (nx, ny, dist) = collision_normal(a.x, a.y, b.x, b.y);
        if dist > REACH_FACTOR * (a.radius + b.radius) {
            return;
        }

        if a.clash_cooldown == 0 && b.clash_cooldown == 0 && rng.gen_bool(rules.clash_chance) {
            Self::clash(a, b, nx, ny);
            events.push(GameEvent::Clash {
                a: a.username.clone(),
                b: b.username.clone(),
                x: (a.x + b.x) * 0.5,
                y: (a.y + b.y) * 0.5,
            });
        }

        if rng.gen_bool(rules.combat_chance) {
            Self::exchange(a, b, nx, ny, rules, frame, events);
        }
    }

    /// Non-damaging knockback plus a mutual cooldown
    pub fn clash(a: &mut Agent, b: &mut Agent, nx: f32, ny: f32) {
        a.vx -= nx * CLASH_IMPULSE;
        a.vy -= ny * CLASH_IMPULSE;
        b.vx += nx * CLASH_IMPULSE;
        b.vy += ny * CLASH_IMPULSE;
        a.clash_cooldown = CLASH_COOLDOWN_FRAMES;
        b.clash_cooldown = CLASH_COOLDOWN_FRAMES;
    }

    /// Simultaneous, symmetric damage exchange
    pub fn exchange(
        a: &mut Agent,
        b: &mut Agent,
        nx: f32,
        ny: f32,
        rules: &CombatRules,
        frame: u64,
        events: &mut Vec<GameEvent>,
    ) {
        let to_b = rules.damage_from(a);
        let to_a = rules.damage_from(b);

        a.take_damage(to_a);
        b.take_damage(to_b);

        a.vx -= nx * to_a * KNOCKBACK_PER_DAMAGE;
        a.vy -= ny * to_a * KNOCKBACK_PER_DAMAGE;
        b.vx += nx * to_b * KNOCKBACK_PER_DAMAGE;
        b.vy += ny * to_b * KNOCKBACK_PER_DAMAGE;

        events.push(GameEvent::Hit {
            attacker: a.username.clone(),
            target: b.username.clone(),
            damage: to_b,
        });
        events.push(GameEvent::Hit {
            attacker: b.username.clone(),
            target: a.username.clone(),
            damage: to_a,
        });

        let a_died = a.settle_death(frame);
        let b_died = b.settle_death(frame);

        match (a_died, b_died) {
            (true, true) => {
                // Mutual kill: nobody gets the credit
                for victim in [&a.username, &b.username] {
                    events.push(GameEvent::Kill {
                        killer: None,
                        victim: victim.clone(),
                        cause: KillCause::Combat,
                    });
                }
            }
            (false, true) => Self::credit_kill(a, b, events),
            (true, false) => Self::credit_kill(b, a, events),
            (false, false) => {}
        }
    }

    fn credit_kill(killer: &mut Agent, victim: &Agent, events: &mut Vec<GameEvent>) {
        killer.kills += 1;
        killer.heal(killer.max_hp * KILL_HEAL_FRACTION);
        events.push(GameEvent::Kill {
            killer: Some(killer.username.clone()),
            victim: victim.username.clone(),
            cause: KillCause::Combat,
        });
    }
}
