//! Catalog-calibrated performance model and work-zone field function.

use crate::catalog::{Catalog, FlowType, ModePoint, SizeSpec};
use crate::error::PerformanceError;
use log::warn;
use serde::{Deserialize, Serialize};

/// Centerline velocity at the end of the throw [m/s]
pub const TERMINAL_VELOCITY: f64 = 0.2;

/// Radial growth of the jet per meter of vertical travel
pub const CONE_EXPANSION: f64 = 0.2;

/// Throw shortening per °C for warm vertical supply
pub const WARM_THROW_COEFF: f64 = 0.05;
pub const WARM_THROW_FLOOR: f64 = 0.4;

/// Throw lengthening per °C for cool vertical supply
pub const COOL_THROW_COEFF: f64 = 0.03;

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceResult {
    /// Nominal exit velocity [m/s]
    pub v0: f64,
    /// Pressure drop [Pa]
    pub pressure: f64,
    /// Sound power level [dB(A)]
    pub noise: f64,
    /// Throw distance [m]
    pub throw_dist: f64,
    /// Centerline velocity at the work-zone plane [m/s]
    pub workzone_velocity: f64,
    /// Radius of effective coverage at the work-zone plane [m]
    pub coverage_radius: f64,
    pub spec: Option<SizeSpec>,
    /// Volume outside the catalog range of the size
    pub out_of_range: bool,
    pub error: Option<PerformanceError>,
}

impl PerformanceResult {
    /// Zeroed result for a combination without catalog data
    pub fn infeasible(error: PerformanceError) -> Self {
        Self {
            v0: 0.0,
            pressure: 0.0,
            noise: 0.0,
            throw_dist: 0.0,
            workzone_velocity: 0.0,
            coverage_radius: 0.0,
            spec: None,
            out_of_range: false,
            error: Some(error),
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.error.is_none()
    }

    /// Face dimension `A` in meters, zero when infeasible
    pub fn face_width_m(&self) -> f64 {
        self.spec.map(|s| s.face_width_m()).unwrap_or(0.0)
    }
}

/// Work-zone centerline velocity and coverage radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkZone {
    pub velocity: f64,
    pub coverage_radius: f64,
}

/// Looks up catalog data for a combination and interpolates at `volume`.
///
/// The returned result carries the raw catalog throw; work-zone fields are
/// zero until [`DiffuserSetup::evaluate`] applies geometry and temperatures.
pub fn calculate_performance(
    catalog: &Catalog,
    model: &str,
    flow_type: FlowType,
    size: &str,
    volume: f64,
) -> Result<PerformanceResult, PerformanceError> {
    let spec = *catalog
        .size_spec(size)
        .ok_or_else(|| PerformanceError::UnknownSize(size.to_string()))?;

    if catalog.is_incompatible(model, size) {
        return Err(PerformanceError::IncompatibleSize {
            model: model.to_string(),
            size: size.to_string(),
        });
    }

    let points = catalog
        .table(model, flow_type, size)
        .ok_or_else(|| PerformanceError::NoCalibration {
            model: model.to_string(),
            flow_type: flow_type.to_string(),
            size: size.to_string(),
        })?;

    let v0 = exit_velocity(volume, spec.f0);
    let row = interpolate(points, volume);

    let throw_dist = match row.throw {
        Some(throw) => throw,
        None if flow_type.is_suction() => (v0 / 2.0).sqrt(),
        None => 0.0,
    };

    Ok(PerformanceResult {
        v0,
        pressure: row.pressure,
        noise: row.noise_db,
        throw_dist,
        workzone_velocity: 0.0,
        coverage_radius: 0.0,
        spec: Some(spec),
        out_of_range: !spec.accepts_volume(volume),
        error: None,
    })
}

/// `volume` [m³/h] through free area `f0` [m²] gives exit velocity [m/s]
pub fn exit_velocity(volume: f64, f0: f64) -> f64 {
    if f0 <= 0.0 {
        return 0.0;
    }
    volume / (3600.0 * f0)
}

/// Piecewise-linear interpolation over a non-empty table sorted by volume.
/// Volumes outside the table clamp to the first or last row.
pub fn interpolate(points: &[ModePoint], volume: f64) -> ModePoint {
    let first = points[0];
    let last = points[points.len() - 1];

    if volume <= first.volume {
        return ModePoint { volume, ..first };
    }
    if volume >= last.volume {
        return ModePoint { volume, ..last };
    }

    // first.volume < volume < last.volume, so upper is in 1..len
    let upper = points
        .iter()
        .position(|p| p.volume >= volume)
        .unwrap_or(points.len() - 1);
    let p1 = points[upper];
    if p1.volume == volume {
        return p1;
    }
    let p0 = points[upper - 1];

    let span = p1.volume - p0.volume;
    let t = if span == 0.0 {
        0.0
    } else {
        (volume - p0.volume) / span
    };
    let lerp = |a: f64, b: f64| a + (b - a) * t;

    ModePoint {
        volume,
        pressure: lerp(p0.pressure, p1.pressure),
        noise_db: lerp(p0.noise_db, p1.noise_db),
        throw: match (p0.throw, p1.throw) {
            (Some(a), Some(b)) => Some(lerp(a, b)),
            _ => None,
        },
    }
}

/// Multiplier applied to catalog throw for the supply/room temperature
/// difference `delta_t = supply - room` [°C].
///
/// Warm vertical supply is buoyed back toward the ceiling and falls short;
/// cool supply sinks and carries further.
pub fn buoyancy_throw_factor(flow_type: FlowType, delta_t: f64) -> f64 {
    if !flow_type.is_vertical() {
        return 1.0;
    }
    if delta_t > 0.0 {
        (1.0 - WARM_THROW_COEFF * delta_t).max(WARM_THROW_FLOOR)
    } else {
        1.0 + COOL_THROW_COEFF * -delta_t
    }
}

/// Centerline velocity and coverage radius at the work-zone plane.
///
/// `face_dimension` is in meters, heights are measured from the floor.
pub fn work_zone_velocity_and_coverage(
    v0: f64,
    throw: f64,
    face_dimension: f64,
    diffuser_height: f64,
    work_zone_height: f64,
) -> WorkZone {
    let d = diffuser_height - work_zone_height;
    let near_radius = face_dimension / 2.0;

    if d <= 0.0 {
        return WorkZone {
            velocity: v0,
            coverage_radius: near_radius,
        };
    }
    if d > throw {
        return WorkZone {
            velocity: TERMINAL_VELOCITY,
            coverage_radius: 0.0,
        };
    }

    // 0 < d <= throw, hence throw > 0
    let velocity = TERMINAL_VELOCITY + (v0 - TERMINAL_VELOCITY) * (1.0 - d / throw);
    WorkZone {
        velocity,
        coverage_radius: near_radius + CONE_EXPANSION * d,
    }
}

/// Centerline velocity along the jet axis as `[distance, velocity]` pairs,
/// linear from `v0` at the nozzle to the terminal velocity at the throw.
pub fn centerline_profile(v0: f64, throw: f64, samples: usize) -> Vec<[f64; 2]> {
    if throw <= 0.0 || samples < 2 {
        return vec![[0.0, v0]];
    }
    (0..samples)
        .map(|i| {
            let s = throw * i as f64 / (samples - 1) as f64;
            [s, TERMINAL_VELOCITY + (v0 - TERMINAL_VELOCITY) * (1.0 - s / throw)]
        })
        .collect()
}

/// Everything needed to evaluate one diffuser in its room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffuserSetup {
    pub model: String,
    pub flow_type: FlowType,
    pub size: String,
    /// [m³/h]
    pub volume: f64,
    /// [°C]
    pub supply_temp: f64,
    pub room_temp: f64,
    /// [m above floor]
    pub diffuser_height: f64,
    pub work_zone_height: f64,
}

impl DiffuserSetup {
    pub fn delta_t(&self) -> f64 {
        self.supply_temp - self.room_temp
    }

    /// Full evaluation: catalog lookup, buoyancy throw correction and
    /// work-zone field. Infeasible combinations come back with `error` set.
    pub fn evaluate(&self, catalog: &Catalog) -> PerformanceResult {
        let mut result = match calculate_performance(
            catalog,
            &self.model,
            self.flow_type,
            &self.size,
            self.volume,
        ) {
            Ok(result) => result,
            Err(err) => {
                warn!("Infeasible configuration: {}", err);
                return PerformanceResult::infeasible(err);
            }
        };

        result.throw_dist *= buoyancy_throw_factor(self.flow_type, self.delta_t());

        let zone = work_zone_velocity_and_coverage(
            result.v0,
            result.throw_dist,
            result.face_width_m(),
            self.diffuser_height,
            self.work_zone_height,
        );
        result.workzone_velocity = zone.velocity;
        result.coverage_radius = zone.coverage_radius;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(volume: f64, pressure: f64, noise_db: f64, throw: f64) -> ModePoint {
        ModePoint {
            volume,
            pressure,
            noise_db,
            throw: Some(throw),
        }
    }

    #[test]
    fn test_interpolate_midpoint() {
        let points = [row(100.0, 10.0, 30.0, 2.0), row(200.0, 30.0, 40.0, 4.0)];
        let mid = interpolate(&points, 150.0);
        assert!((mid.pressure - 20.0).abs() < 1e-9);
        assert!((mid.noise_db - 35.0).abs() < 1e-9);
        assert!((mid.throw.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_clamps_outside_table() {
        let points = [row(100.0, 10.0, 30.0, 2.0), row(200.0, 30.0, 40.0, 4.0)];
        assert_eq!(interpolate(&points, 10.0).pressure, 10.0);
        assert_eq!(interpolate(&points, 1000.0).pressure, 30.0);
    }

    #[test]
    fn test_interpolate_duplicate_volumes() {
        let points = [
            row(100.0, 10.0, 30.0, 2.0),
            row(100.0, 12.0, 31.0, 2.5),
            row(200.0, 30.0, 40.0, 4.0),
        ];
        let exact = interpolate(&points, 100.0);
        assert_eq!(exact.pressure, 10.0);
        assert!(interpolate(&points, 150.0).pressure.is_finite());
    }

    #[test]
    fn test_single_row_table() {
        let points = [row(100.0, 10.0, 30.0, 2.0)];
        assert_eq!(interpolate(&points, 50.0).throw, Some(2.0));
        assert_eq!(interpolate(&points, 150.0).throw, Some(2.0));
    }

    #[test]
    fn test_buoyancy_factor() {
        assert_eq!(buoyancy_throw_factor(FlowType::Vertical, 0.0), 1.0);
        assert!((buoyancy_throw_factor(FlowType::Vertical, 4.0) - 0.8).abs() < 1e-12);
        assert_eq!(buoyancy_throw_factor(FlowType::Vertical, 30.0), WARM_THROW_FLOOR);
        assert!((buoyancy_throw_factor(FlowType::Vertical, -4.0) - 1.12).abs() < 1e-12);
        assert_eq!(buoyancy_throw_factor(FlowType::Horizontal, 10.0), 1.0);
        assert_eq!(buoyancy_throw_factor(FlowType::Suction, -10.0), 1.0);
    }

    #[test]
    fn test_work_zone_linear_decay() {
        let zone = work_zone_velocity_and_coverage(5.0, 4.0, 0.2, 3.0, 1.0);
        // d = 2, half the throw
        assert!((zone.velocity - (0.2 + 4.8 * 0.5)).abs() < 1e-12);
        assert!((zone.coverage_radius - (0.1 + 0.4)).abs() < 1e-12);
    }

    #[test]
    fn test_work_zone_at_throw_boundary() {
        let zone = work_zone_velocity_and_coverage(5.0, 2.0, 0.2, 3.0, 1.0);
        assert!((zone.velocity - TERMINAL_VELOCITY).abs() < 1e-12);
        assert!(zone.coverage_radius > 0.0);
    }

    #[test]
    fn test_suction_throw_fallback() {
        let catalog = Catalog::builtin().unwrap();
        let result =
            calculate_performance(&catalog, "dpu-v", FlowType::Suction, "160", 300.0).unwrap();
        assert!((result.throw_dist - (result.v0 / 2.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_size() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(
            calculate_performance(&catalog, "dpu-v", FlowType::Vertical, "999", 300.0),
            Err(PerformanceError::UnknownSize("999".to_string()))
        );
    }

    #[test]
    fn test_no_calibration_for_flow_type() {
        let catalog = Catalog::builtin().unwrap();
        let err = calculate_performance(&catalog, "dpu-v", FlowType::FourWay, "160", 300.0)
            .unwrap_err();
        assert!(matches!(err, PerformanceError::NoCalibration { .. }));
    }

    #[test]
    fn test_out_of_range_flag() {
        let catalog = Catalog::builtin().unwrap();
        let low = calculate_performance(&catalog, "dpu-v", FlowType::Vertical, "160", 50.0).unwrap();
        assert!(low.out_of_range);
        let ok = calculate_performance(&catalog, "dpu-v", FlowType::Vertical, "160", 250.0).unwrap();
        assert!(!ok.out_of_range);
    }

    #[test]
    fn test_centerline_profile_endpoints() {
        let profile = centerline_profile(4.0, 2.0, 5);
        assert_eq!(profile.len(), 5);
        assert_eq!(profile[0][0], 0.0);
        assert!((profile[0][1] - 4.0).abs() < 1e-12);
        let [s, v] = profile[4];
        assert_eq!(s, 2.0);
        assert!((v - TERMINAL_VELOCITY).abs() < 1e-12);
        assert_eq!(centerline_profile(4.0, 0.0, 5), vec![[0.0, 4.0]]);
    }
}
