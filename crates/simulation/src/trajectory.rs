//! Reference trajectories
//!
//! The reference is a pure function of time: no counters, no memory, so
//! comparison runs can sample it independently.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use simcore::{Pose, SimResult, Velocity};

use crate::config::{CaseConfig, CaseKind};

/// Reference pose and velocity at one instant. The velocity is expressed in
/// the reference's own frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reference {
    pub pose: Pose,
    pub velocity: Velocity,
}

/// Samples the reference of a validated case.
#[derive(Debug, Clone)]
pub struct TrajectoryGenerator {
    case: CaseConfig,
}

impl TrajectoryGenerator {
    pub fn new(case: &CaseConfig) -> SimResult<Self> {
        case.validate()?;
        Ok(Self { case: case.clone() })
    }

    pub fn reference(&self, t: f64) -> Reference {
        reference(t, &self.case)
    }
}

/// Reference at time `t` for `case`.
pub fn reference(t: f64, case: &CaseConfig) -> Reference {
    let start = case.reference_start;
    let v = case.commanded;

    match case.kind {
        CaseKind::Line => {
            let travelled = Velocity::new(v.vx, v.vy, 0.0).to_world(start.theta) * t;
            Reference {
                pose: Pose::new(start.x + travelled[0], start.y + travelled[1], start.theta),
                velocity: Velocity::new(v.vx, v.vy, 0.0),
            }
        }
        CaseKind::Circle => {
            let radius = (v.vx / v.omega).abs();
            let side = v.omega.signum();
            let heading = start.theta + v.omega * t;
            let normal = Vector2::new(-start.theta.sin(), start.theta.cos());
            let centre = start.position() + normal * (radius * side);
            let position = centre + Vector2::new(heading.sin(), -heading.cos()) * (radius * side);
            Reference {
                pose: Pose::new(position[0], position[1], heading),
                velocity: Velocity::new(v.vx, 0.0, v.omega),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_line_moves_along_start_heading() {
        let case = CaseConfig::line()
            .with_reference_start(Pose::new(1.0, 0.0, PI / 3.0))
            .with_commanded(Velocity::new(2.5, 0.0, 0.0));
        let r = reference(2.0, &case);
        assert_abs_diff_eq!(r.pose.x, 1.0 + 5.0 * (PI / 3.0).cos(), epsilon = 1e-12);
        assert_abs_diff_eq!(r.pose.y, 5.0 * (PI / 3.0).sin(), epsilon = 1e-12);
        assert_abs_diff_eq!(r.pose.theta, PI / 3.0, epsilon = 1e-12);
        assert_eq!(r.velocity, Velocity::new(2.5, 0.0, 0.0));
    }

    #[test]
    fn test_line_sideways_reference() {
        let case = CaseConfig::line().with_commanded(Velocity::new(0.0, 0.5, 0.0));
        let r = reference(4.0, &case);
        assert_abs_diff_eq!(r.pose.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.pose.y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circle_stays_on_radius() {
        let case = CaseConfig::circle();
        let centre = case.circle_centre().unwrap();
        for i in 0..40 {
            let r = reference(i as f64 * 0.5, &case);
            let distance = (r.pose.position() - centre).norm();
            assert_abs_diff_eq!(distance, 4.0, epsilon = 1e-9);
        }
        let start = reference(0.0, &case);
        assert_abs_diff_eq!(start.pose.x, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(start.pose.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_circle_heading_is_tangent() {
        let case = CaseConfig::circle();
        let (t, h) = (3.0, 1e-6);
        let a = reference(t, &case).pose;
        let b = reference(t + h, &case).pose;
        let travel = (b.y - a.y).atan2(b.x - a.x);
        assert_abs_diff_eq!(simcore::wrap_angle(travel - a.theta), 0.0, epsilon = 1e-5);
        // Quarter period later the reference has turned by 90°
        let quarter = (PI / 2.0) / case.commanded.omega;
        let q = reference(quarter, &case).pose;
        assert_abs_diff_eq!(q.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(q.y, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_clockwise_circle() {
        let case = CaseConfig::circle().with_commanded(Velocity::new(1.0, 0.0, -0.5));
        let centre = case.circle_centre().unwrap();
        assert_abs_diff_eq!(centre[0], 6.0, epsilon = 1e-12);
        let r = reference(1.0, &case);
        assert_abs_diff_eq!((r.pose.position() - centre).norm(), 2.0, epsilon = 1e-9);
        assert!(r.pose.theta < PI / 2.0);
    }
}
