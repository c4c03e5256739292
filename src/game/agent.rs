//! Agents and their weapons

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Smallest agent radius, reached in very crowded matches
pub const MIN_AGENT_RADIUS: f32 = 16.0;
/// Largest agent radius, used for tiny matches
pub const MAX_AGENT_RADIUS: f32 = 85.0;
/// Hit points every agent starts the battle with
pub const BASE_MAX_HP: f32 = 100.0;
/// Initial speed range in arena units per frame
const SPAWN_SPEED: std::ops::Range<f32> = 1.5..3.5;

/// Melee weapons available to agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weapon {
    Hammer,
    Axe,
    Sword,
    Spear,
    Bat,
    Saw,
}

impl Weapon {
    pub const ALL: [Weapon; 6] = [
        Weapon::Hammer,
        Weapon::Axe,
        Weapon::Sword,
        Weapon::Spear,
        Weapon::Bat,
        Weapon::Saw,
    ];

    /// Uniform random pick from the weapon pool
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        *Self::ALL.choose(rng).unwrap_or(&Weapon::Sword)
    }

    /// Facing-angle advance per frame in radians.
    ///
    /// The saw trades damage for a much faster spin.
    pub fn spin_rate(self) -> f32 {
        match self {
            Weapon::Hammer => 0.06,
            Weapon::Axe => 0.08,
            Weapon::Sword => 0.10,
            Weapon::Spear => 0.09,
            Weapon::Bat => 0.11,
            Weapon::Saw => 0.30,
        }
    }

    /// Match a chat keyword (English or Arabic) to a weapon
    pub fn from_keyword(word: &str) -> Option<Self> {
        let word = word.trim().to_lowercase();
        let weapon = match word.as_str() {
            "hammer" | "مطرقة" | "مطرقه" => Weapon::Hammer,
            "axe" | "فأس" | "فاس" => Weapon::Axe,
            "sword" | "سيف" => Weapon::Sword,
            "spear" | "رمح" => Weapon::Spear,
            "bat" | "مضرب" => Weapon::Bat,
            "saw" | "منشار" => Weapon::Saw,
            _ => return None,
        };
        Some(weapon)
    }
}

/// Base damage dealt by one combat exchange with this weapon
pub fn weapon_damage(weapon: Weapon) -> f32 {
    match weapon {
        Weapon::Hammer => 40.0,
        Weapon::Axe => 32.0,
        Weapon::Sword => 28.0,
        Weapon::Spear => 22.0,
        Weapon::Bat => 18.0,
        Weapon::Saw => 12.0,
    }
}

/// Agent radius for a match of `participant_count` agents
pub fn agent_radius(participant_count: usize) -> f32 {
    let count = participant_count.max(1) as f32;
    (550.0 / count.sqrt()).clamp(MIN_AGENT_RADIUS, MAX_AGENT_RADIUS)
}

/// Agent mass derived from its radius
pub fn agent_mass(radius: f32) -> f32 {
    2.0 + radius / 20.0
}

/// A multiplier that reverts to 1.0 once match time passes `expires_at`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedMultiplier {
    pub value: f32,
    pub expires_at: Option<f64>,
}

impl Default for TimedMultiplier {
    fn default() -> Self {
        Self {
            value: 1.0,
            expires_at: None,
        }
    }
}

impl TimedMultiplier {
    pub fn set(&mut self, value: f32, now: f64, duration_secs: f64) {
        self.value = value;
        self.expires_at = Some(now + duration_secs);
    }

    /// Reset to neutral if expired; returns true when it reverted
    pub fn expire(&mut self, now: f64) -> bool {
        match self.expires_at {
            Some(at) if now >= at => {
                *self = Self::default();
                true
            }
            _ => false,
        }
    }
}

/// One simulated combatant (authoritative)
#[derive(Debug, Clone)]
pub struct Agent {
    pub username: String,
    pub avatar: Option<String>,
    pub weapon: Weapon,

    // Position and movement
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub facing: f32,
    pub radius: f32,
    pub mass: f32,

    // Combat
    pub hp: f32,
    pub max_hp: f32,
    pub alive: bool,
    pub kills: u32,
    /// Frames left before this agent can clash again
    pub clash_cooldown: u32,

    // Modifiers
    pub damage: TimedMultiplier,
    pub speed: TimedMultiplier,

    /// Frame the agent died on
    pub died_at_frame: Option<u64>,
}

impl Agent {
    /// Place a fresh agent somewhere inside the arena with a random heading
    pub fn spawn<R: Rng + ?Sized>(
        username: String,
        weapon: Option<Weapon>,
        participant_count: usize,
        arena_radius: f32,
        rng: &mut R,
    ) -> Self {
        let radius = agent_radius(participant_count);
        let weapon = weapon.unwrap_or_else(|| Weapon::random(rng));

        // Uniform over the disc that keeps the whole body inside the arena
        let usable = (arena_radius - radius).max(0.0);
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = usable * rng.gen::<f32>().sqrt();
        let heading = rng.gen_range(0.0..std::f32::consts::TAU);
        let speed = rng.gen_range(SPAWN_SPEED);

        Self {
            username,
            avatar: None,
            weapon,
            x: angle.cos() * distance,
            y: angle.sin() * distance,
            vx: heading.cos() * speed,
            vy: heading.sin() * speed,
            facing: rng.gen_range(0.0..std::f32::consts::TAU),
            radius,
            mass: agent_mass(radius),
            hp: BASE_MAX_HP,
            max_hp: BASE_MAX_HP,
            alive: true,
            kills: 0,
            clash_cooldown: 0,
            damage: TimedMultiplier::default(),
            speed: TimedMultiplier::default(),
            died_at_frame: None,
        }
    }

    /// Subtract hit points, clamping at zero
    pub fn take_damage(&mut self, amount: f32) {
        self.hp = (self.hp - amount.max(0.0)).clamp(0.0, self.max_hp);
    }

    /// Restore hit points, clamping at max
    pub fn heal(&mut self, amount: f32) {
        self.hp = (self.hp + amount.max(0.0)).clamp(0.0, self.max_hp);
    }

    /// Mark the agent dead if its hp ran out. Returns true only on the
    /// frame it transitions, so a death is never counted twice.
    pub fn settle_death(&mut self, frame: u64) -> bool {
        if self.alive && self.hp <= 0.0 {
            self.hp = 0.0;
            self.alive = false;
            self.died_at_frame = Some(frame);
            true
        } else {
            false
        }
    }

    pub fn speed_sq(&self) -> f32 {
        self.vx * self.vx + self.vy * self.vy
    }

    pub fn distance_to_center(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn radius_is_clamped_by_participant_count() {
        assert_eq!(agent_radius(2), MAX_AGENT_RADIUS);
        assert_eq!(agent_radius(5000), MIN_AGENT_RADIUS);
        let mid = agent_radius(100);
        assert!((mid - 55.0).abs() < 1e-4);
        assert!((agent_mass(mid) - 4.75).abs() < 1e-4);
        // A lone participant must not divide by zero
        assert_eq!(agent_radius(0), MAX_AGENT_RADIUS);
    }

    #[test]
    fn damage_table_matches_weapon_ranking() {
        assert_eq!(weapon_damage(Weapon::Hammer), 40.0);
        assert_eq!(weapon_damage(Weapon::Axe), 32.0);
        assert_eq!(weapon_damage(Weapon::Sword), 28.0);
        assert_eq!(weapon_damage(Weapon::Spear), 22.0);
        assert_eq!(weapon_damage(Weapon::Bat), 18.0);
        assert_eq!(weapon_damage(Weapon::Saw), 12.0);
        assert!(Weapon::ALL
            .iter()
            .all(|w| *w == Weapon::Saw || w.spin_rate() < Weapon::Saw.spin_rate()));
    }

    #[test]
    fn keywords_resolve_in_both_languages() {
        assert_eq!(Weapon::from_keyword("AXE"), Some(Weapon::Axe));
        assert_eq!(Weapon::from_keyword(" سيف "), Some(Weapon::Sword));
        assert_eq!(Weapon::from_keyword("bazooka"), None);
    }

    #[test]
    fn spawned_agent_fits_inside_arena() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for i in 0..200 {
            let agent = Agent::spawn(format!("user{i}"), None, 50, 500.0, &mut rng);
            assert!(agent.distance_to_center() + agent.radius <= 500.0 + 1e-3);
            assert!(agent.alive);
            assert_eq!(agent.hp, agent.max_hp);
        }
        let chosen = Agent::spawn("x".into(), Some(Weapon::Saw), 2, 500.0, &mut rng);
        assert_eq!(chosen.weapon, Weapon::Saw);
    }

    #[test]
    fn death_settles_exactly_once() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut agent = Agent::spawn("a".into(), None, 2, 500.0, &mut rng);
        agent.take_damage(250.0);
        assert_eq!(agent.hp, 0.0);
        assert!(agent.settle_death(10));
        assert!(!agent.settle_death(11));
        assert_eq!(agent.died_at_frame, Some(10));
    }

    #[test]
    fn multiplier_reverts_after_expiry() {
        let mut m = TimedMultiplier::default();
        m.set(2.0, 1.0, 10.0);
        assert!(!m.expire(10.9));
        assert_eq!(m.value, 2.0);
        assert!(m.expire(11.0));
        assert_eq!(m, TimedMultiplier::default());
    }
}
