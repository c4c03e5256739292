//! Timed supply drops that buff or debuff agents

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::ws::protocol::{GameEvent, KillCause};

use super::agent::Agent;

/// Supplies land inside this fraction of the current zone
const SPAWN_ZONE_FRACTION: f32 = 0.8;

/// Supply drop effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyKind {
    /// +50% max hp
    Heal,
    /// Double damage for a while
    Power,
    /// Faster movement for a while
    Speed,
    /// Instant damage and a slow
    Hazard,
}

impl SupplyKind {
    const WITH_HAZARD: [SupplyKind; 4] = [
        SupplyKind::Heal,
        SupplyKind::Power,
        SupplyKind::Speed,
        SupplyKind::Hazard,
    ];
    const WITHOUT_HAZARD: [SupplyKind; 3] =
        [SupplyKind::Heal, SupplyKind::Power, SupplyKind::Speed];

    /// Apply the effect to `agent` at match time `now`
    pub fn apply(self, agent: &mut Agent, now: f64) {
        match self {
            SupplyKind::Heal => agent.heal(agent.max_hp * 0.5),
            SupplyKind::Power => agent.damage.set(2.0, now, 10.0),
            SupplyKind::Speed => agent.speed.set(1.8, now, 8.0),
            SupplyKind::Hazard => {
                agent.take_damage(agent.max_hp * 0.3);
                agent.speed.set(0.5, now, 5.0);
            }
        }
    }
}

/// A supply sitting on the field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyItem {
    pub id: u32,
    pub kind: SupplyKind,
    pub x: f32,
    pub y: f32,
    pub pickup_radius: f32,
    /// Match time it landed at
    pub spawned_at: f64,
}

impl SupplyItem {
    /// True when the pickup circle overlaps the agent's body
    pub fn touches(&self, agent: &Agent) -> bool {
        let dx = agent.x - self.x;
        let dy = agent.y - self.y;
        let reach = self.pickup_radius + agent.radius;
        dx * dx + dy * dy < reach * reach
    }
}

/// Spawn timer and drop settings for one match
#[derive(Debug, Clone)]
pub struct SupplySystem {
    pub enabled: bool,
    pub hazards_enabled: bool,
    pub interval_secs: f64,
    pub pickup_radius: f32,
    /// None = items stay until picked up
    pub lifetime_secs: Option<f64>,
    last_spawn_at: f64,
    next_id: u32,
}

impl SupplySystem {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            enabled: config.supplies_enabled,
            hazards_enabled: config.hazards_enabled,
            interval_secs: config.supply_interval_secs.max(0.0) as f64,
            pickup_radius: config.supply_pickup_radius,
            lifetime_secs: (config.supply_lifetime_secs > 0.0)
                .then_some(config.supply_lifetime_secs as f64),
            last_spawn_at: 0.0,
            next_id: 1,
        }
    }

    /// Restart the spawn timer (battle start)
    pub fn reset(&mut self, now: f64) {
        self.last_spawn_at = now;
    }

    /// Drop a new supply if the interval has elapsed
    pub fn try_spawn<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        zone_radius: f32,
        rng: &mut R,
    ) -> Option<SupplyItem> {
        if !self.enabled || now - self.last_spawn_at < self.interval_secs {
            return None;
        }

        let pool: &[SupplyKind] = if self.hazards_enabled {
            &SupplyKind::WITH_HAZARD
        } else {
            &SupplyKind::WITHOUT_HAZARD
        };
        let kind = *pool.choose(rng)?;

        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = zone_radius.max(0.0) * SPAWN_ZONE_FRACTION * rng.gen::<f32>().sqrt();

        self.last_spawn_at = now;
        let id = self.next_id;
        self.next_id += 1;

        Some(SupplyItem {
            id,
            kind,
            x: angle.cos() * distance,
            y: angle.sin() * distance,
            pickup_radius: self.pickup_radius,
            spawned_at: now,
        })
    }

    /// Hand each item to the first living agent touching it.
    /// Returns the items left on the field.
    pub fn resolve_pickups(
        agents: &mut [Agent],
        items: Vec<SupplyItem>,
        now: f64,
        frame: u64,
        events: &mut Vec<GameEvent>,
    ) -> Vec<SupplyItem> {
        let mut remaining = Vec::with_capacity(items.len());

        for item in items {
            let Some(agent) = agents.iter_mut().find(|a| a.alive && item.touches(a)) else {
                remaining.push(item);
                continue;
            };

            item.kind.apply(agent, now);
            events.push(GameEvent::SupplyPicked {
                id: item.id,
                kind: item.kind,
                username: agent.username.clone(),
            });

            if agent.settle_death(frame) {
                events.push(GameEvent::Kill {
                    killer: None,
                    victim: agent.username.clone(),
                    cause: KillCause::Hazard,
                });
            }
        }

        remaining
    }

    /// Drop items that outlived their lifetime
    pub fn expire(&self, items: &mut Vec<SupplyItem>, now: f64, events: &mut Vec<GameEvent>) {
        let Some(lifetime) = self.lifetime_secs else {
            return;
        };
        items.retain(|item| {
            let keep = now - item.spawned_at < lifetime;
            if !keep {
                events.push(GameEvent::SupplyExpired { id: item.id });
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::agent::Weapon;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn agent_at(x: f32, y: f32) -> Agent {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut agent = Agent::spawn("picker".into(), Some(Weapon::Bat), 100, 500.0, &mut rng);
        agent.x = x;
        agent.y = y;
        agent
    }

    fn item(kind: SupplyKind, x: f32, y: f32) -> SupplyItem {
        SupplyItem {
            id: 1,
            kind,
            x,
            y,
            pickup_radius: 18.0,
            spawned_at: 0.0,
        }
    }

    #[test]
    fn spawns_on_interval_inside_the_zone() {
        let config = GameConfig::default();
        let mut system = SupplySystem::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        system.reset(0.0);

        assert!(system.try_spawn(1.0, 300.0, &mut rng).is_none());
        let item = system.try_spawn(4.0, 300.0, &mut rng).expect("interval elapsed");
        assert!((item.x * item.x + item.y * item.y).sqrt() <= 240.0 + 1e-3);
        assert!(system.try_spawn(5.0, 300.0, &mut rng).is_none());
        let next = system.try_spawn(8.0, 300.0, &mut rng).expect("second drop");
        assert_eq!(next.id, item.id + 1);
    }

    #[test]
    fn disabled_supplies_never_spawn() {
        let config = GameConfig {
            supplies_enabled: false,
            ..GameConfig::default()
        };
        let mut system = SupplySystem::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        for step in 0..10_000 {
            assert!(system.try_spawn(step as f64, 300.0, &mut rng).is_none());
        }
    }

    #[test]
    fn hazard_excluded_when_disabled() {
        let config = GameConfig {
            hazards_enabled: false,
            supply_interval_secs: 0.0,
            ..GameConfig::default()
        };
        let mut system = SupplySystem::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let kinds: Vec<SupplyKind> = (0..500)
            .filter_map(|i| system.try_spawn(i as f64, 300.0, &mut rng))
            .map(|item| item.kind)
            .collect();
        assert_eq!(kinds.len(), 500);
        assert!(!kinds.contains(&SupplyKind::Hazard));
        assert!(kinds.contains(&SupplyKind::Heal));
    }

    #[test]
    fn pickup_applies_effects() {
        let mut agents = vec![agent_at(0.0, 0.0)];
        agents[0].hp = 30.0;
        let mut events = Vec::new();

        let items = vec![
            item(SupplyKind::Heal, 10.0, 0.0),
            item(SupplyKind::Power, 0.0, 10.0),
            item(SupplyKind::Speed, 400.0, 0.0),
        ];
        let left = SupplySystem::resolve_pickups(&mut agents, items, 2.0, 120, &mut events);

        assert_eq!(left.len(), 1);
        assert_eq!(left[0].kind, SupplyKind::Speed);
        assert_eq!(agents[0].hp, 80.0);
        assert_eq!(agents[0].damage.value, 2.0);
        assert_eq!(agents[0].damage.expires_at, Some(12.0));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn heal_is_capped_at_max_hp() {
        let mut agents = vec![agent_at(0.0, 0.0)];
        agents[0].hp = 90.0;
        let mut events = Vec::new();
        SupplySystem::resolve_pickups(
            &mut agents,
            vec![item(SupplyKind::Heal, 0.0, 0.0)],
            0.0,
            1,
            &mut events,
        );
        assert_eq!(agents[0].hp, agents[0].max_hp);
    }

    #[test]
    fn hazard_can_finish_off_an_agent() {
        let mut agents = vec![agent_at(0.0, 0.0)];
        agents[0].hp = 20.0;
        let mut events = Vec::new();

        SupplySystem::resolve_pickups(
            &mut agents,
            vec![item(SupplyKind::Hazard, 0.0, 0.0)],
            3.0,
            180,
            &mut events,
        );

        assert!(!agents[0].alive);
        assert_eq!(agents[0].hp, 0.0);
        assert_eq!(agents[0].speed.value, 0.5);
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::Kill { killer: None, cause: KillCause::Hazard, .. }
        )));
    }

    #[test]
    fn dead_agents_do_not_collect() {
        let mut agents = vec![agent_at(0.0, 0.0)];
        agents[0].alive = false;
        let mut events = Vec::new();
        let left = SupplySystem::resolve_pickups(
            &mut agents,
            vec![item(SupplyKind::Heal, 0.0, 0.0)],
            0.0,
            1,
            &mut events,
        );
        assert_eq!(left.len(), 1);
        assert!(events.is_empty());
    }

    #[test]
    fn stale_items_expire() {
        let system = SupplySystem::new(&GameConfig::default());
        let mut items = vec![item(SupplyKind::Heal, 0.0, 0.0)];
        let mut events = Vec::new();

        system.expire(&mut items, 11.0, &mut events);
        assert_eq!(items.len(), 1);

        system.expire(&mut items, 12.0, &mut events);
        assert!(items.is_empty());
        assert_eq!(events.len(), 1);
    }
}
