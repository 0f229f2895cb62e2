use std::f64::consts::PI;

use nalgebra::{Rotation2, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Wraps an angle into (-π, π].
///
/// Non-finite input is returned unchanged so callers can still detect it.
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let wrapped = angle.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

// Kinematic state

/// Planar robot pose in the world frame. `theta` is kept in (-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: wrap_angle(theta),
        }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.theta)
    }

    /// Builds a pose from an integrator state, re-wrapping the heading.
    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }

    /// Error of this pose relative to `reference`, resolved in the reference frame:
    /// `e_x` along the reference heading, `e_y` to its left.
    pub fn tracking_error(&self, reference: &Pose) -> TrackingError {
        let delta = Rotation2::new(-reference.theta) * (self.position() - reference.position());
        TrackingError {
            e_x: delta[0],
            e_y: delta[1],
            e_theta: wrap_angle(self.theta - reference.theta),
        }
    }
}

/// Body-frame velocity: forward, leftward and yaw rate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl Velocity {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.vx, self.vy, self.omega)
    }

    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.vx, self.vy, self.omega]
    }

    /// Rotates the translational part by `angle`, leaving the yaw rate as is.
    pub fn rotated(&self, angle: f64) -> Self {
        let planar = Rotation2::new(angle) * Vector2::new(self.vx, self.vy);
        Self::new(planar[0], planar[1], self.omega)
    }

    /// Translational velocity expressed in the world frame for a robot at `heading`.
    pub fn to_world(&self, heading: f64) -> Vector2<f64> {
        Rotation2::new(heading) * Vector2::new(self.vx, self.vy)
    }

    pub fn norm_squared(&self) -> f64 {
        self.vx * self.vx + self.vy * self.vy + self.omega * self.omega
    }

    pub fn is_finite(&self) -> bool {
        self.vx.is_finite() && self.vy.is_finite() && self.omega.is_finite()
    }
}

impl std::ops::Add for Velocity {
    type Output = Velocity;

    fn add(self, rhs: Velocity) -> Velocity {
        Velocity::new(self.vx + rhs.vx, self.vy + rhs.vy, self.omega + rhs.omega)
    }
}

/// Angular velocities (rad/s) of the four wheels, ordered front-left,
/// front-right, rear-left, rear-right.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelState {
    pub speeds: [f64; 4],
}

impl WheelState {
    pub fn new(speeds: [f64; 4]) -> Self {
        Self { speeds }
    }

    pub fn to_vector(&self) -> Vector4<f64> {
        Vector4::from_column_slice(&self.speeds)
    }

    pub fn from_vector(v: &Vector4<f64>) -> Self {
        Self::new([v[0], v[1], v[2], v[3]])
    }

    /// Index and magnitude of the fastest wheel.
    pub fn fastest(&self) -> (usize, f64) {
        self.speeds
            .iter()
            .map(|s| s.abs())
            .enumerate()
            .fold((0, 0.0), |best, (i, s)| if s > best.1 { (i, s) } else { best })
    }

    pub fn is_finite(&self) -> bool {
        self.speeds.iter().all(|s| s.is_finite())
    }
}

/// Pose error resolved in the reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackingError {
    /// Along-track error (m)
    pub e_x: f64,
    /// Cross-track error (m)
    pub e_y: f64,
    /// Heading error (rad), wrapped
    pub e_theta: f64,
}

impl TrackingError {
    pub fn new(e_x: f64, e_y: f64, e_theta: f64) -> Self {
        Self { e_x, e_y, e_theta }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.e_x, self.e_y, self.e_theta]
    }

    pub fn from_array(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    /// Euclidean norm over all three components.
    pub fn norm(&self) -> f64 {
        (self.e_x * self.e_x + self.e_y * self.e_y + self.e_theta * self.e_theta).sqrt()
    }

    /// Position-only error magnitude.
    pub fn planar_norm(&self) -> f64 {
        self.e_x.hypot(self.e_y)
    }

    pub fn is_finite(&self) -> bool {
        self.e_x.is_finite() && self.e_y.is_finite() && self.e_theta.is_finite()
    }
}

/// Timing information for one simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimContext {
    pub dt: f64,
    pub t: f64,
    pub step: usize,
}

impl SimContext {
    pub fn new(dt: f64) -> Self {
        Self { dt, t: 0.0, step: 0 }
    }

    /// Context for step `step` on a uniform `dt` grid.
    pub fn at_step(dt: f64, step: usize) -> Self {
        Self {
            dt,
            t: step as f64 * dt,
            step,
        }
    }
}
