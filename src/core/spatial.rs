//! Geometric features over the aim subsequence.

use crate::core::record::Column;
use crate::core::subsequence::Subsequence;
use crate::scorepoint::Scorepoint;

/// Scale factor turning degrees per millisecond into revolutions per minute.
const DEGREES_PER_MS_TO_RPM: f64 = 60_000.0 / 360.0;

/// A point the cursor has to reach, in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimPoint {
    pub x: f64,
    pub y: f64,
    /// Nominal time in milliseconds
    pub time: f64,
}

impl AimPoint {
    pub fn new(x: f64, y: f64, time: f64) -> Self {
        Self { x, y, time }
    }

    fn from_scorepoint(point: &Scorepoint) -> Self {
        Self::new(point.map_x, point.map_y, point.map_time)
    }

    fn heading_from(&self, previous: &AimPoint) -> f64 {
        (self.y - previous.y).atan2(self.x - previous.x)
    }
}

/// Spatial feature columns, all of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialFeatures {
    pub distance: Column,
    /// Turn between consecutive movements, integral degrees in `[0, 180]`
    pub angle: Column,
    pub linear_velocity: Column,
    /// Turn rate in revolutions per minute
    pub angular_velocity: Column,
}

impl SpatialFeatures {
    fn scatter(&self, subsequence: &Subsequence) -> Self {
        Self {
            distance: subsequence.scatter(&self.distance),
            angle: subsequence.scatter(&self.angle),
            linear_velocity: subsequence.scatter(&self.linear_velocity),
            angular_velocity: subsequence.scatter(&self.angular_velocity),
        }
    }
}

/// Absolute change of heading at `points[i]`, folded into `[0, 180]` and
/// rounded to whole degrees.
fn turn_angle(previous: &AimPoint, current: &AimPoint, next: &AimPoint) -> f64 {
    let incoming = current.heading_from(previous);
    let outgoing = next.heading_from(current);

    let mut degrees = (outgoing - incoming).abs().to_degrees();
    if degrees > 180.0 {
        degrees = 360.0 - degrees;
    }
    degrees.round()
}

/// Compute spatial features over compact aim points.
pub fn compute_spatial(points: &[AimPoint]) -> SpatialFeatures {
    let m = points.len();
    if m == 0 {
        return SpatialFeatures::default();
    }

    let mut distance = vec![None; m];
    let mut angle = vec![None; m];
    let mut linear_velocity = vec![None; m];
    let mut angular_velocity = vec![None; m];

    distance[0] = Some(0.0);
    linear_velocity[0] = Some(0.0);

    for i in 1..m {
        let (a, b) = (&points[i - 1], &points[i]);
        let d = (b.x - a.x).hypot(b.y - a.y);
        let dt = b.time - a.time;

        distance[i] = Some(d);
        linear_velocity[i] = if dt != 0.0 { Some(d / dt) } else { None };
    }

    // First and last aim points have no turn.
    for i in 1..m.saturating_sub(1) {
        angle[i] = Some(turn_angle(&points[i - 1], &points[i], &points[i + 1]));
    }

    for i in 2..m {
        let span = points[i].time - points[i - 2].time;
        angular_velocity[i] = match angle[i] {
            Some(a) if span != 0.0 => Some(DEGREES_PER_MS_TO_RPM * a / span),
            _ => None,
        };
    }

    SpatialFeatures {
        distance,
        angle,
        linear_velocity,
        angular_velocity,
    }
}

/// Extract spatial features aligned to the full scorepoint sequence.
pub fn extract_spatial(points: &[Scorepoint]) -> SpatialFeatures {
    let aim = Subsequence::aim_targets(points);
    let aim_points = aim.gather(points, AimPoint::from_scorepoint);
    compute_spatial(&aim_points).scatter(&aim)
}
