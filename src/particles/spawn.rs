//! Spawn rules per flow type.

use super::{ColorTag, Emitter, FlowClass, FrameInput, SpawnState, Wave};
use crate::catalog::FlowType;
use nalgebra as na;
use rand::Rng;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

/// Particles released per frame for a nozzle exit velocity, before the
/// pool capacity cap
pub fn spawn_rate(v0: f32) -> usize {
    (5.0 + (v0.max(0.0) / 2.0) * 8.0).ceil() as usize
}

/// Plan-view release rate for one emitter
pub fn radial_spawn_rate(velocity: f32) -> usize {
    (1.0 + velocity.max(0.0) * 4.0).ceil() as usize
}

/// Shape of a discharge variant
#[derive(Debug, Clone, Copy, PartialEq)]
struct Profile {
    /// Half-angle of the discharge cone measured from straight down [rad]
    half_angle: f32,
    /// Tangential speed as a fraction of v0
    swirl: f32,
    drag: f32,
    wave: Wave,
}

fn profile(flow: FlowType) -> Profile {
    let deg = |d: f32| d.to_radians();
    let (half_angle, swirl, drag, amplitude, frequency) = match flow {
        FlowType::Vertical => (deg(12.0), 0.0, 0.985, 0.02, 2.5),
        FlowType::VerticalCompact => (deg(5.0), 0.0, 0.975, 0.01, 2.0),
        FlowType::VerticalSwirl => (deg(35.0), 0.45, 0.97, 0.08, 5.0),
        FlowType::VerticalConical => (deg(22.0), 0.0, 0.98, 0.03, 3.0),
        FlowType::VerticalWide => (deg(50.0), 0.1, 0.975, 0.04, 3.0),
        FlowType::Horizontal => (deg(88.0), 0.0, 0.988, 0.02, 2.0),
        FlowType::HorizontalSwirl => (deg(84.0), 0.35, 0.982, 0.06, 4.0),
        FlowType::FourWay => (deg(86.0), 0.0, 0.985, 0.03, 2.5),
        FlowType::Suction => (0.0, 0.0, 0.96, 0.01, 1.5),
    };
    Profile {
        half_angle,
        swirl,
        drag,
        wave: Wave {
            amplitude,
            frequency,
            phase: 0.0,
        },
    }
}

/// Spawns one tracer at the nozzle, `(0, diffuser_height, 0)` in
/// diffuser-centered room coordinates.
pub fn spawn_jet<R: Rng>(input: &FrameInput, rng: &mut R) -> SpawnState {
    let flow = input.flow_type;
    if flow.is_suction() {
        return spawn_suction(input, rng);
    }

    let profile = profile(flow);
    let nozzle = na::Vector3::new(0.0, input.diffuser_height, 0.0);
    let face_radius = input.face_width.max(0.02) / 2.0;

    let azimuth = match flow {
        // four lobes set diagonally so the side view shows two
        FlowType::FourWay => {
            FRAC_PI_4 + FRAC_PI_2 * rng.random_range(0..4) as f32 + rng.random_range(-0.15..0.15)
        }
        _ => rng.random_range(0.0..TAU),
    };
    let polar = if flow.is_ceiling_jet() {
        profile.half_angle + rng.random_range(-0.05..0.05)
    } else {
        // uniform over the cone's cross-section
        profile.half_angle * rng.random::<f32>().sqrt()
    };

    let radial = na::Vector3::new(azimuth.cos(), 0.0, azimuth.sin());
    let tangential = na::Vector3::new(-azimuth.sin(), 0.0, azimuth.cos());
    let direction = radial * polar.sin() + na::Vector3::new(0.0, -polar.cos(), 0.0);

    let speed = input.v0 * rng.random_range(0.85..1.0);
    let velocity = direction * speed + tangential * (profile.swirl * input.v0);

    let offset = radial * (face_radius * rng.random::<f32>().sqrt());
    let mut position = nozzle + offset;
    if flow.is_ceiling_jet() {
        position.y -= rng.random_range(0.0..0.03);
    }

    SpawnState {
        position,
        velocity,
        buoyancy: rng.random_range(0.8..1.2),
        drag: profile.drag,
        life: rng.random_range(2.5..4.5),
        wave: Wave {
            phase: rng.random_range(0.0..TAU),
            ..profile.wave
        },
        color: ColorTag::for_delta_t(input.delta_t),
        class: if flow.is_ceiling_jet() {
            FlowClass::CeilingJet
        } else {
            FlowClass::Jet
        },
        floor_spread: flow.spreads_on_floor(),
        source: nozzle,
    }
}

/// Spawns a tracer somewhere below the extract grille, at rest
fn spawn_suction<R: Rng>(input: &FrameInput, rng: &mut R) -> SpawnState {
    let profile = profile(FlowType::Suction);
    let nozzle = na::Vector3::new(0.0, input.diffuser_height, 0.0);

    let azimuth = rng.random_range(0.0..TAU);
    // hemisphere below the device
    let polar = rng.random_range(0.0..(PI * 0.45));
    let distance = rng.random_range(0.6..2.0_f32).min(input.diffuser_height.max(0.7) - 0.05);
    let direction = na::Vector3::new(
        polar.sin() * azimuth.cos(),
        -polar.cos(),
        polar.sin() * azimuth.sin(),
    );

    let mut position = nozzle + direction * distance.max(0.3);
    let half_width = input.room_width / 2.0;
    let half_length = input.room_length / 2.0;
    position.x = position.x.clamp(-half_width, half_width);
    position.z = position.z.clamp(-half_length, half_length);
    position.y = position.y.max(0.0);

    SpawnState {
        position,
        velocity: na::Vector3::zeros(),
        buoyancy: 0.0,
        drag: profile.drag,
        life: rng.random_range(3.0..5.0),
        wave: Wave {
            phase: rng.random_range(0.0..TAU),
            ..profile.wave
        },
        color: ColorTag::Extract,
        class: FlowClass::Suction,
        floor_spread: false,
        source: nozzle,
    }
}

/// Plan-view tracer: spreads outward over the work-zone plane from a supply
/// emitter, or converges from the surroundings onto an extract emitter.
/// `x`/`z` carry the plan coordinates.
pub fn spawn_radial<R: Rng>(emitter: &Emitter, rng: &mut R) -> SpawnState {
    let center = na::Vector3::new(emitter.x, 0.0, emitter.y);
    let angle = rng.random_range(0.0..TAU);
    let direction = na::Vector3::new(angle.cos(), 0.0, angle.sin());

    if emitter.suction {
        let distance = rng.random_range(0.8..1.6);
        return SpawnState {
            position: center + direction * distance,
            velocity: na::Vector3::zeros(),
            buoyancy: 0.0,
            drag: 0.96,
            life: rng.random_range(2.0..3.5),
            wave: Wave::default(),
            color: ColorTag::Extract,
            class: FlowClass::Suction,
            floor_spread: false,
            source: center,
        };
    }

    let speed = emitter.velocity.max(0.25) * rng.random_range(0.8..1.2);
    let reach = if emitter.radius > 0.0 {
        emitter.radius
    } else {
        0.3
    };
    SpawnState {
        position: center,
        velocity: direction * speed,
        buoyancy: 0.0,
        drag: 0.995,
        life: (reach / speed * rng.random_range(0.9..1.3)).clamp(0.4, 5.0),
        wave: Wave {
            amplitude: 0.03,
            frequency: 2.0,
            phase: rng.random_range(0.0..TAU),
        },
        color: ColorTag::Neutral,
        class: FlowClass::Radial,
        floor_spread: false,
        source: center,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use test_case::test_case;

    #[test_case(0.0, 5)]
    #[test_case(2.0, 13)]
    #[test_case(4.79, 25)]
    fn test_spawn_rate(v0: f32, expected: usize) {
        assert_eq!(spawn_rate(v0), expected);
    }

    #[test]
    fn test_vertical_jets_head_down() {
        let mut rng = StdRng::seed_from_u64(1);
        let input = FrameInput::default();
        for _ in 0..200 {
            let s = spawn_jet(&input, &mut rng);
            assert!(s.velocity.y < 0.0);
            assert_eq!(s.class, FlowClass::Jet);
            assert!(s.life > 0.0);
        }
    }

    #[test]
    fn test_compact_is_narrower_than_wide() {
        let mut rng = StdRng::seed_from_u64(2);
        let spread = |flow: FlowType, rng: &mut StdRng| {
            let input = FrameInput {
                flow_type: flow,
                ..FrameInput::default()
            };
            (0..500)
                .map(|_| {
                    let v = spawn_jet(&input, rng).velocity;
                    (v.x * v.x + v.z * v.z).sqrt() / -v.y
                })
                .fold(0.0_f32, f32::max)
        };
        let compact = spread(FlowType::VerticalCompact, &mut rng);
        let wide = spread(FlowType::VerticalWide, &mut rng);
        assert!(compact < wide);
        assert!(FlowType::VerticalCompact.is_vertical());
    }

    #[test]
    fn test_horizontal_jets_are_ceiling_jets() {
        let mut rng = StdRng::seed_from_u64(3);
        let input = FrameInput {
            flow_type: FlowType::Horizontal,
            ..FrameInput::default()
        };
        for _ in 0..100 {
            let s = spawn_jet(&input, &mut rng);
            assert_eq!(s.class, FlowClass::CeilingJet);
            let lateral = (s.velocity.x * s.velocity.x + s.velocity.z * s.velocity.z).sqrt();
            assert!(lateral > s.velocity.y.abs());
        }
    }

    #[test]
    fn test_four_way_uses_four_lobes() {
        let mut rng = StdRng::seed_from_u64(4);
        let input = FrameInput {
            flow_type: FlowType::FourWay,
            ..FrameInput::default()
        };
        let mut quadrants = [0usize; 4];
        for _ in 0..400 {
            let v = spawn_jet(&input, &mut rng).velocity;
            let q = match (v.x >= 0.0, v.z >= 0.0) {
                (true, true) => 0,
                (false, true) => 1,
                (false, false) => 2,
                (true, false) => 3,
            };
            quadrants[q] += 1;
        }
        assert!(quadrants.iter().all(|&n| n > 50));
    }

    #[test]
    fn test_suction_spawns_at_rest_below_device() {
        let mut rng = StdRng::seed_from_u64(5);
        let input = FrameInput {
            flow_type: FlowType::Suction,
            ..FrameInput::default()
        };
        for _ in 0..100 {
            let s = spawn_jet(&input, &mut rng);
            assert_eq!(s.class, FlowClass::Suction);
            assert_eq!(s.velocity, na::Vector3::zeros());
            assert!(s.position.y < input.diffuser_height);
            assert!(s.position.y >= 0.0);
        }
    }

    #[test]
    fn test_radial_supply_moves_outward() {
        let mut rng = StdRng::seed_from_u64(6);
        let emitter = Emitter {
            x: 2.0,
            y: 3.0,
            v0: 4.0,
            velocity: 0.8,
            radius: 1.2,
            suction: false,
        };
        let s = spawn_radial(&emitter, &mut rng);
        assert_eq!(s.class, FlowClass::Radial);
        assert_eq!(s.position, na::Vector3::new(2.0, 0.0, 3.0));
        assert!(s.velocity.norm() > 0.0);
    }
}
