//! Force models: buoyancy with Coanda attachment, drag, suction pull and
//! surface interaction.

use super::{FlowClass, Particle};
use nalgebra as na;
use rand::Rng;

pub const GRAVITY: f32 = 9.81;

/// Reference air temperature for the density difference [K]
pub const REFERENCE_TEMP_K: f32 = 293.0;

/// Visual gain on the buoyancy acceleration
pub const BUOYANCY_GAIN: f32 = 4.0;

/// Ceiling band, as a fraction of room height, in which jets stay attached
pub const COANDA_BAND: f32 = 0.15;
/// Horizontal speed below which an attached jet separates [m/s]
pub const COANDA_MIN_SPEED: f32 = 0.3;
/// Share of downward buoyancy removed while attached
pub const COANDA_SUPPRESSION: f32 = 0.9;
/// Upward pull toward the ceiling while attached [m/s²]
pub const COANDA_LIFT: f32 = 0.6;

pub const SUCTION_STRENGTH: f32 = 1.5;
pub const SUCTION_MIN_DIST_SQ: f32 = 0.05;
pub const SUCTION_MAX_ACCEL: f32 = 30.0;
/// Particles closer than this to an extract source are swallowed [m]
pub const SUCTION_CAPTURE_RADIUS: f32 = 0.06;

pub const WALL_DAMPING: f32 = 0.6;
pub const CEILING_DAMPING: f32 = 0.5;
/// Random tangential kick on surface contact [m/s]
pub const TURBULENCE_KICK: f32 = 0.3;
/// Random horizontal impulse on floor contact [m/s]
pub const FLOOR_SPREAD: f32 = 0.6;

/// Buoyancy acceleration for `delta_t = supply - room`; positive is upward
pub fn buoyancy_accel(delta_t: f32) -> f32 {
    delta_t / REFERENCE_TEMP_K * GRAVITY * BUOYANCY_GAIN
}

/// Applies buoyancy, with Coanda attachment for ceiling jets still inside
/// the ceiling band and moving fast enough.
pub fn apply_buoyancy(p: &mut Particle, delta_t: f32, ceiling: f32, room_height: f32, dt: f32) {
    let mut accel = buoyancy_accel(delta_t) * p.buoyancy;

    if p.class == FlowClass::CeilingJet && is_attached(p, ceiling, room_height) {
        if accel < 0.0 {
            accel *= 1.0 - COANDA_SUPPRESSION;
        }
        accel += COANDA_LIFT;
    }

    p.velocity.y += accel * dt;
}

pub fn is_attached(p: &Particle, ceiling: f32, room_height: f32) -> bool {
    let horizontal = (p.velocity.x * p.velocity.x + p.velocity.z * p.velocity.z).sqrt();
    ceiling - p.position.y < COANDA_BAND * room_height && horizontal > COANDA_MIN_SPEED
}

/// Per-variant velocity decay. `drag` is the factor retained per 1/60 s.
pub fn apply_drag(p: &mut Particle, dt: f32) {
    p.velocity *= p.drag.powf(dt * 60.0);
}

/// Inverse-square pull toward the particle's source. Returns `true` once the
/// particle reaches the source.
pub fn apply_suction(p: &mut Particle, dt: f32) -> bool {
    let to_source: na::Vector3<f32> = p.source - p.position;
    let dist_sq = to_source.norm_squared();
    if dist_sq.sqrt() < SUCTION_CAPTURE_RADIUS {
        return true;
    }
    let accel = (SUCTION_STRENGTH / dist_sq.max(SUCTION_MIN_DIST_SQ)).min(SUCTION_MAX_ACCEL);
    p.velocity += to_source / dist_sq.sqrt() * (accel * dt);
    false
}

/// Jet strikes the floor: vertical motion stops, horizontal motion gains a
/// random spreading impulse away from the axis.
pub fn spread_on_floor<R: Rng>(p: &mut Particle, rng: &mut R) {
    p.position.y = 0.0;
    p.velocity.y = 0.0;

    let mut outward = na::Vector3::new(p.position.x - p.source.x, 0.0, p.position.z - p.source.z);
    if outward.norm_squared() < 1e-6 {
        let angle = rng.random_range(0.0..std::f32::consts::TAU);
        outward = na::Vector3::new(angle.cos(), 0.0, angle.sin());
    }
    let outward = outward.normalize();
    let impulse = FLOOR_SPREAD * rng.random_range(0.5..1.0);
    p.velocity.x += outward.x * impulse + rng.random_range(-0.1..0.1);
    p.velocity.z += outward.z * impulse + rng.random_range(-0.1..0.1);
}

/// Inelastic bounce off the ceiling
pub fn bounce_ceiling(p: &mut Particle, ceiling: f32) {
    if p.position.y > ceiling {
        p.position.y = ceiling;
        if p.velocity.y > 0.0 {
            p.velocity.y = -p.velocity.y * CEILING_DAMPING;
        }
    }
}

/// Bounces off the side walls of a box centered on the axis, with damping
/// and a random kick on the tangential components.
pub fn bounce_walls<R: Rng>(p: &mut Particle, half_width: f32, half_length: f32, rng: &mut R) {
    if p.position.x.abs() > half_width {
        p.position.x = p.position.x.clamp(-half_width, half_width);
        p.velocity.x = -p.velocity.x * WALL_DAMPING;
        p.velocity.y += rng.random_range(-TURBULENCE_KICK..TURBULENCE_KICK);
        p.velocity.z += rng.random_range(-TURBULENCE_KICK..TURBULENCE_KICK);
    }
    if p.position.z.abs() > half_length {
        p.position.z = p.position.z.clamp(-half_length, half_length);
        p.velocity.z = -p.velocity.z * WALL_DAMPING;
        p.velocity.x += rng.random_range(-TURBULENCE_KICK..TURBULENCE_KICK);
        p.velocity.y += rng.random_range(-TURBULENCE_KICK..TURBULENCE_KICK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn jet(position: na::Vector3<f32>, velocity: na::Vector3<f32>, class: FlowClass) -> Particle {
        Particle {
            active: true,
            position,
            velocity,
            class,
            drag: 0.98,
            life: 3.0,
            ..Particle::default()
        }
    }

    #[test]
    fn test_warm_air_rises() {
        let mut p = jet(na::Vector3::new(0.0, 1.5, 0.0), na::Vector3::zeros(), FlowClass::Jet);
        apply_buoyancy(&mut p, 8.0, 3.0, 3.0, 0.1);
        assert!(p.velocity.y > 0.0);

        let mut p = jet(na::Vector3::new(0.0, 1.5, 0.0), na::Vector3::zeros(), FlowClass::Jet);
        apply_buoyancy(&mut p, -8.0, 3.0, 3.0, 0.1);
        assert!(p.velocity.y < 0.0);
    }

    #[test]
    fn test_buoyancy_constant() {
        let expected = 10.0 / 293.0 * 9.81 * 4.0;
        assert!((buoyancy_accel(10.0) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_coanda_keeps_cool_jet_on_ceiling() {
        let attached = |class| {
            let mut p = jet(na::Vector3::new(0.5, 2.9, 0.0), na::Vector3::new(2.0, 0.0, 0.0), class);
            apply_buoyancy(&mut p, -6.0, 3.0, 3.0, 0.1);
            p.velocity.y
        };
        let ceiling_jet = attached(FlowClass::CeilingJet);
        let free_jet = attached(FlowClass::Jet);
        assert!(ceiling_jet > free_jet);
        // suppressed fall plus lift
        assert!(ceiling_jet > 0.0);
    }

    #[test]
    fn test_coanda_releases_slow_jets() {
        let p = jet(na::Vector3::new(0.5, 2.9, 0.0), na::Vector3::new(0.1, 0.0, 0.0), FlowClass::CeilingJet);
        assert!(!is_attached(&p, 3.0, 3.0));
        let p = jet(na::Vector3::new(0.5, 2.0, 0.0), na::Vector3::new(2.0, 0.0, 0.0), FlowClass::CeilingJet);
        assert!(!is_attached(&p, 3.0, 3.0));
    }

    #[test]
    fn test_drag_is_frame_rate_independent() {
        let mut a = jet(na::Vector3::zeros(), na::Vector3::new(1.0, 0.0, 0.0), FlowClass::Jet);
        let mut b = a.clone();
        apply_drag(&mut a, 1.0 / 30.0);
        apply_drag(&mut b, 1.0 / 60.0);
        apply_drag(&mut b, 1.0 / 60.0);
        assert!((a.velocity.x - b.velocity.x).abs() < 1e-5);
    }

    #[test]
    fn test_suction_pull_grows_near_source() {
        let mut far = jet(na::Vector3::new(0.0, 1.0, 0.0), na::Vector3::zeros(), FlowClass::Suction);
        far.source = na::Vector3::new(0.0, 3.0, 0.0);
        let mut near = far.clone();
        near.position = na::Vector3::new(0.0, 2.5, 0.0);

        assert!(!apply_suction(&mut far, 0.1));
        assert!(!apply_suction(&mut near, 0.1));
        assert!(far.velocity.y > 0.0);
        assert!(near.velocity.y > far.velocity.y);

        near.position = na::Vector3::new(0.0, 2.99, 0.0);
        assert!(apply_suction(&mut near, 0.1));
    }

    #[test]
    fn test_floor_contact_spreads_horizontally() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut p = jet(na::Vector3::new(0.2, -0.01, 0.0), na::Vector3::new(0.0, -2.0, 0.0), FlowClass::Jet);
        spread_on_floor(&mut p, &mut rng);
        assert_eq!(p.position.y, 0.0);
        assert_eq!(p.velocity.y, 0.0);
        assert!(p.velocity.x > 0.0);
    }

    #[test]
    fn test_wall_bounce_damps_and_reflects() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut p = jet(na::Vector3::new(3.2, 1.0, 0.0), na::Vector3::new(2.0, 0.0, 0.0), FlowClass::Jet);
        bounce_walls(&mut p, 3.0, 4.0, &mut rng);
        assert_eq!(p.position.x, 3.0);
        assert!((p.velocity.x + 2.0 * WALL_DAMPING).abs() < 1e-6);
    }
}
