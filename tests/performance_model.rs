use diffuser_viz::catalog::{Catalog, FlowType, ModePoint};
use diffuser_viz::performance::{
    calculate_performance, work_zone_velocity_and_coverage, DiffuserSetup, TERMINAL_VELOCITY,
};
use diffuser_viz::plan::PlacedDiffuser;
use diffuser_viz::settings::{RoomGeometry, Settings};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use test_case::test_case;

fn catalog() -> Catalog {
    Catalog::builtin().expect("built-in catalog")
}

/// Tables in a stable order
fn tables(catalog: &Catalog) -> Vec<(String, FlowType, String, Vec<ModePoint>)> {
    let mut tables: Vec<_> = catalog
        .tables()
        .map(|(m, f, s, p)| (m.to_string(), f, s.to_string(), p.to_vec()))
        .collect();
    tables.sort_by(|a, b| (&a.0, a.1.id(), &a.2).cmp(&(&b.0, b.1.id(), &b.2)));
    tables
}

fn setup(model: &str, flow_type: FlowType, size: &str, volume: f64) -> DiffuserSetup {
    DiffuserSetup {
        model: model.to_string(),
        flow_type,
        size: size.to_string(),
        volume,
        supply_temp: 20.0,
        room_temp: 24.0,
        diffuser_height: 3.0,
        work_zone_height: 1.8,
    }
}

#[test]
fn test_calibration_rows_are_returned_exactly() {
    let catalog = catalog();
    for (model, flow, size, points) in tables(&catalog) {
        for row in &points {
            let result = calculate_performance(&catalog, &model, flow, &size, row.volume).unwrap();
            assert_eq!(result.pressure, row.pressure, "{model}/{flow}/{size} at {}", row.volume);
            assert_eq!(result.noise, row.noise_db);
            match row.throw {
                Some(throw) => assert_eq!(result.throw_dist, throw),
                None => assert_eq!(result.throw_dist, (result.v0 / 2.0).sqrt()),
            }
        }
    }
}

#[test]
fn test_documented_scenario_is_feasible() {
    let result = setup("dpu-v", FlowType::Vertical, "160", 250.0).evaluate(&catalog());
    assert!(result.error.is_none());
    assert!(result.v0 > 0.0);
    assert!(result.throw_dist > 0.0);
    assert!(!result.out_of_range);
}

#[test_case("dpu-v", FlowType::Vertical, "250" ; "vertical nozzle in 250")]
#[test_case("dpu-v", FlowType::VerticalCompact, "315" ; "vertical nozzle in 315")]
#[test_case("dpu-k", FlowType::VerticalConical, "100" ; "conical nozzle in 100")]
#[test_case("dpu-s", FlowType::FourWay, "125" ; "multi slot in 125")]
fn test_excluded_sizes_are_infeasible(model: &str, flow: FlowType, size: &str) {
    let result = setup(model, flow, size, 600.0).evaluate(&catalog());
    assert!(result.error.is_some());
    assert_eq!(
        (result.v0, result.pressure, result.noise, result.throw_dist),
        (0.0, 0.0, 0.0, 0.0)
    );
    assert_eq!((result.workzone_velocity, result.coverage_radius), (0.0, 0.0));
}

#[test]
fn test_work_zone_at_nozzle_height_keeps_exit_velocity() {
    let mut s = setup("dpu-v", FlowType::Vertical, "160", 250.0);
    s.work_zone_height = s.diffuser_height;
    let result = s.evaluate(&catalog());
    assert_eq!(result.workzone_velocity, result.v0);
    assert_eq!(result.coverage_radius, 0.158 / 2.0);
}

#[test]
fn test_reevaluation_after_noop_update_is_identical() {
    let catalog = catalog();
    let mut settings = Settings::default();
    settings
        .diffusers
        .push(PlacedDiffuser::new(1, 1, 2.0, 2.0, "dpu-m", FlowType::VerticalSwirl, "200", 450.0));
    settings.refresh_placed(&catalog);
    let first = settings.diffusers[0].performance.clone();

    settings.room = RoomGeometry { ..settings.room };
    settings.refresh_placed(&catalog);
    assert_eq!(settings.diffusers[0].performance, first);
    assert!(first.is_some_and(|p| p.is_feasible()));
}

#[test]
fn test_warm_supply_shortens_vertical_throw_only() {
    let catalog = catalog();
    let mut cool = setup("dpu-v", FlowType::Vertical, "160", 300.0);
    let mut warm = cool.clone();
    cool.supply_temp = 16.0;
    warm.supply_temp = 32.0;
    assert!(warm.evaluate(&catalog).throw_dist < cool.evaluate(&catalog).throw_dist);

    let mut cool = setup("dpu-k", FlowType::Horizontal, "160", 300.0);
    let mut warm = cool.clone();
    cool.supply_temp = 16.0;
    warm.supply_temp = 32.0;
    assert_eq!(warm.evaluate(&catalog).throw_dist, cool.evaluate(&catalog).throw_dist);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn interpolation_stays_between_neighbours(table in 0usize..1000, row in 0usize..100, t in 0.0f64..1.0) {
        let catalog = catalog();
        let tables = tables(&catalog);
        let (model, flow, size, points) = &tables[table % tables.len()];
        prop_assume!(points.len() >= 2);
        let k = row % (points.len() - 1);
        let (lo, hi) = (points[k], points[k + 1]);
        let volume = lo.volume + (hi.volume - lo.volume) * t;

        let result = calculate_performance(&catalog, model, *flow, size, volume).unwrap();
        let within = |x: f64, a: f64, b: f64| x >= a.min(b) - 1e-9 && x <= a.max(b) + 1e-9;
        prop_assert!(within(result.pressure, lo.pressure, hi.pressure));
        prop_assert!(within(result.noise, lo.noise_db, hi.noise_db));
        if let (Some(a), Some(b)) = (lo.throw, hi.throw) {
            prop_assert!(within(result.throw_dist, a, b));
        }
    }

    #[test]
    fn work_zone_limits_and_monotonic_decay(
        v0 in 0.5f64..12.0,
        throw in 0.1f64..8.0,
        face in 0.05f64..0.4,
        d1 in 0.0f64..1.0,
        d2 in 0.0f64..1.0,
    ) {
        let at = |d: f64| work_zone_velocity_and_coverage(v0, throw, face, 3.0, 3.0 - d);

        let level = at(0.0);
        prop_assert_eq!(level.velocity, v0);
        prop_assert_eq!(level.coverage_radius, face / 2.0);

        let beyond = at(throw + 0.5);
        prop_assert_eq!(beyond.velocity, TERMINAL_VELOCITY);
        prop_assert_eq!(beyond.coverage_radius, 0.0);

        let (near, far) = (d1.min(d2) * throw, d1.max(d2) * throw);
        prop_assert!(at(near).velocity >= at(far).velocity - 1e-12);
    }
}
