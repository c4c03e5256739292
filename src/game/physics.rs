//! Agent movement, arena containment and two-body collision response

use super::agent::Agent;

/// Velocity kept after bouncing off the wall
pub const WALL_DAMPING: f32 = 0.9;
/// Agents never drift slower than this (units per frame)
pub const MIN_SPEED: f32 = 0.8;
/// Knockback cannot push agents faster than this (units per frame)
pub const MAX_SPEED: f32 = 14.0;
/// Distances below this are treated as coincident centers
pub const DISTANCE_EPSILON: f32 = 1e-3;

/// The boundary an agent is contained by this frame
#[derive(Debug, Clone, Copy)]
pub struct Wall {
    /// Absolute arena radius
    pub arena_radius: f32,
    /// Current safe-zone radius
    pub zone_radius: f32,
    /// Zone reached its floor: the storm hits everyone
    pub sudden_death: bool,
}

impl Wall {
    /// The lesser of the arena and the zone
    pub fn effective_radius(&self) -> f32 {
        self.arena_radius.min(self.zone_radius)
    }

    /// True once the zone has closed inside the arena edge
    pub fn storm_active(&self) -> bool {
        self.zone_radius < self.arena_radius
    }
}

/// Unit vector from `(x1, y1)` to `(x2, y2)` and the distance between them.
/// Coincident points get an arbitrary but fixed normal.
pub fn collision_normal(x1: f32, y1: f32, x2: f32, y2: f32) -> (f32, f32, f32) {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist < DISTANCE_EPSILON {
        (1.0, 0.0, 0.0)
    } else {
        (dx / dist, dy / dist, dist)
    }
}

/// Physics system for advancing agents each frame
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one living agent by a frame.
    /// Returns the storm damage it took this frame.
    pub fn step_agent(agent: &mut Agent, wall: &Wall, now: f64, storm_damage: f32) -> f32 {
        if !agent.alive {
            return 0.0;
        }

        agent.damage.expire(now);
        agent.speed.expire(now);
        agent.clash_cooldown = agent.clash_cooldown.saturating_sub(1);

        let speed_mult = agent.speed.value;
        agent.x += agent.vx * speed_mult;
        agent.y += agent.vy * speed_mult;
        agent.facing = (agent.facing + agent.weapon.spin_rate() * speed_mult)
            .rem_euclid(std::f32::consts::TAU);

        let touching = Self::contain(agent, wall.effective_radius());
        Self::clamp_speed(agent);

        let storm = if wall.sudden_death || (touching && wall.storm_active()) {
            storm_damage
        } else {
            0.0
        };
        if storm > 0.0 {
            agent.take_damage(storm);
        }
        storm
    }

    /// Keep the agent's body inside `wall_radius`, bouncing it back.
    /// Returns true when the agent is pressed against the wall.
    pub fn contain(agent: &mut Agent, wall_radius: f32) -> bool {
        let dist = agent.distance_to_center();
        if dist + agent.radius <= wall_radius {
            return false;
        }

        let (nx, ny) = if dist < DISTANCE_EPSILON {
            (1.0, 0.0)
        } else {
            (agent.x / dist, agent.y / dist)
        };

        let outward = agent.vx * nx + agent.vy * ny;
        if outward > 0.0 {
            agent.vx -= 2.0 * outward * nx;
            agent.vy -= 2.0 * outward * ny;
        }
        agent.vx *= WALL_DAMPING;
        agent.vy *= WALL_DAMPING;

        let rest = (wall_radius - agent.radius).max(0.0);
        agent.x = nx * rest;
        agent.y = ny * rest;
        true
    }

    /// Keep speed within [MIN_SPEED, MAX_SPEED]
    pub fn clamp_speed(agent: &mut Agent) {
        let speed = agent.speed_sq().sqrt();
        if speed > MAX_SPEED {
            let scale = MAX_SPEED / speed;
            agent.vx *= scale;
            agent.vy *= scale;
        } else if speed < MIN_SPEED {
            if speed < DISTANCE_EPSILON {
                agent.vx = agent.facing.cos() * MIN_SPEED;
                agent.vy = agent.facing.sin() * MIN_SPEED;
            } else {
                let scale = MIN_SPEED / speed;
                agent.vx *= scale;
                agent.vy *= scale;
            }
        }
    }

    /// Check overlap between two agent bodies
    pub fn overlapping(a: &Agent, b: &Agent) -> bool {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let combined = a.radius + b.radius;
        dx * dx + dy * dy < combined * combined
    }

    /// Push two overlapping agents apart along the collision normal.
    /// Each one moves by the other's share of the combined mass.
    pub fn separate(a: &mut Agent, b: &mut Agent) {
        let (nx, ny, dist) = collision_normal(a.x, a.y, b.x, b.y);
        let overlap = a.radius + b.radius - dist;
        if overlap <= 0.0 {
            return;
        }

        let total = a.mass + b.mass;
        let push_a = overlap * (b.mass / total);
        let push_b = overlap * (a.mass / total);

        a.x -= nx * push_a;
        a.y -= ny * push_a;
        b.x += nx * push_b;
        b.y += ny * push_b;
    }

    /// Perfectly elastic 2D collision along the center line.
    /// Momentum and kinetic energy are conserved; separating pairs are left alone.
    pub fn elastic_bounce(a: &mut Agent, b: &mut Agent) {
        let (nx, ny, _) = collision_normal(a.x, a.y, b.x, b.y);

        // Closing speed along the normal (positive = approaching)
        let closing = (a.vx - b.vx) * nx + (a.vy - b.vy) * ny;
        if closing <= 0.0 {
            return;
        }

        let total = a.mass + b.mass;
        let impulse_a = 2.0 * b.mass / total * closing;
        let impulse_b = 2.0 * a.mass / total * closing;

        a.vx -= impulse_a * nx;
        a.vy -= impulse_a * ny;
        b.vx += impulse_b * nx;
        b.vy += impulse_b * ny;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::agent::Weapon;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn agent_at(x: f32, y: f32, vx: f32, vy: f32) -> Agent {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut agent = Agent::spawn("t".into(), Some(Weapon::Sword), 100, 500.0, &mut rng);
        agent.x = x;
        agent.y = y;
        agent.vx = vx;
        agent.vy = vy;
        agent
    }

    fn energy(a: &Agent) -> f32 {
        0.5 * a.mass * a.speed_sq()
    }

    fn open_wall() -> Wall {
        Wall {
            arena_radius: 500.0,
            zone_radius: 600.0,
            sudden_death: false,
        }
    }

    #[test]
    fn integrates_velocity_with_speed_multiplier() {
        let mut agent = agent_at(0.0, 0.0, 2.0, 1.0);
        agent.speed.set(1.8, 0.0, 8.0);
        let facing = agent.facing;

        let storm = PhysicsSystem::step_agent(&mut agent, &open_wall(), 1.0, 0.5);

        assert_eq!(storm, 0.0);
        assert!((agent.x - 3.6).abs() < 1e-5);
        assert!((agent.y - 1.8).abs() < 1e-5);
        let expected = (facing + Weapon::Sword.spin_rate() * 1.8).rem_euclid(std::f32::consts::TAU);
        assert!((agent.facing - expected).abs() < 1e-5);
    }

    #[test]
    fn expired_modifiers_reset_before_moving() {
        let mut agent = agent_at(0.0, 0.0, 2.0, 0.0);
        agent.speed.set(0.5, 0.0, 5.0);
        agent.damage.set(2.0, 0.0, 5.0);

        PhysicsSystem::step_agent(&mut agent, &open_wall(), 5.0, 0.0);

        assert_eq!(agent.speed.value, 1.0);
        assert_eq!(agent.damage.value, 1.0);
        assert!((agent.x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn wall_reflects_and_damps_velocity() {
        let mut agent = agent_at(440.0, 0.0, 5.0, 0.0);
        let touching = PhysicsSystem::contain(&mut agent, 480.0);

        assert!(touching);
        assert!((agent.vx + 4.5).abs() < 1e-5);
        assert!((agent.x + agent.radius - 480.0).abs() < 1e-3);
    }

    #[test]
    fn storm_only_hurts_once_zone_is_inside_arena() {
        let mut agent = agent_at(440.0, 0.0, 5.0, 0.0);
        let storm = PhysicsSystem::step_agent(&mut agent, &open_wall(), 0.0, 0.5);
        assert_eq!(storm, 0.0);

        let closed = Wall {
            arena_radius: 500.0,
            zone_radius: 450.0,
            sudden_death: false,
        };
        let mut agent = agent_at(440.0, 0.0, 5.0, 0.0);
        let storm = PhysicsSystem::step_agent(&mut agent, &closed, 0.0, 0.5);
        assert_eq!(storm, 0.5);
        assert_eq!(agent.hp, agent.max_hp - 0.5);
    }

    #[test]
    fn sudden_death_hits_agents_away_from_the_wall() {
        let wall = Wall {
            arena_radius: 500.0,
            zone_radius: 60.0,
            sudden_death: true,
        };
        let mut agent = agent_at(0.0, 0.0, 1.0, 0.0);
        agent.radius = 16.0;
        let storm = PhysicsSystem::step_agent(&mut agent, &wall, 0.0, 0.5);
        assert_eq!(storm, 0.5);
    }

    #[test]
    fn separation_splits_overlap_by_mass() {
        let mut a = agent_at(0.0, 0.0, 0.0, 0.0);
        let mut b = agent_at(50.0, 0.0, 0.0, 0.0);
        b.mass = a.mass * 3.0;

        PhysicsSystem::separate(&mut a, &mut b);

        let gap = b.x - a.x;
        assert!((gap - (a.radius + b.radius)).abs() < 1e-3);
        // The lighter agent moves three times as far
        assert!((a.x.abs() - 3.0 * (b.x - 50.0)).abs() < 1e-2);
    }

    #[test]
    fn coincident_centers_still_separate() {
        let mut a = agent_at(10.0, 10.0, 0.0, 0.0);
        let mut b = agent_at(10.0, 10.0, 0.0, 0.0);
        PhysicsSystem::separate(&mut a, &mut b);
        assert!(a.x.is_finite() && b.x.is_finite());
        assert!(b.x > a.x);
    }

    #[test]
    fn elastic_bounce_conserves_momentum_without_adding_energy() {
        let mut a = agent_at(0.0, 0.0, 3.0, 0.5);
        let mut b = agent_at(100.0, 20.0, -2.0, 1.0);
        b.mass = 7.0;

        let p_before = (a.mass * a.vx + b.mass * b.vx, a.mass * a.vy + b.mass * b.vy);
        let e_before = energy(&a) + energy(&b);

        PhysicsSystem::elastic_bounce(&mut a, &mut b);

        let p_after = (a.mass * a.vx + b.mass * b.vx, a.mass * a.vy + b.mass * b.vy);
        let e_after = energy(&a) + energy(&b);

        assert!((p_before.0 - p_after.0).abs() < 1e-3);
        assert!((p_before.1 - p_after.1).abs() < 1e-3);
        assert!(e_after <= e_before * (1.0 + 1e-5));
        // They now separate along the normal
        let (nx, ny, _) = collision_normal(a.x, a.y, b.x, b.y);
        assert!((a.vx - b.vx) * nx + (a.vy - b.vy) * ny <= 1e-5);
    }
}
