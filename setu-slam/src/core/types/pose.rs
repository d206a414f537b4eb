//! Planar rigid transforms.
//!
//! A [`Pose2D`] doubles as a pose (where a frame sits) and as a transform
//! (how to move points from that frame into its parent). Every correction
//! in the session is built by composing and inverting these.

use serde::{Deserialize, Serialize};

use super::Timestamped;
use crate::core::math::{angle_lerp, normalize_angle};

/// A 2D point in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared distance to another point (avoids sqrt).
    #[inline]
    pub fn distance_squared(&self, other: &Point2D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Position (x, y) in meters plus heading (theta) in radians.
///
/// Theta is kept in [-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    /// X position in meters
    pub x: f32,
    /// Y position in meters
    pub y: f32,
    /// Heading in radians, normalized to [-π, π]
    pub theta: f32,
}

impl Pose2D {
    /// Create a new pose with theta normalized to [-π, π].
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    #[inline]
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    /// Compose two transforms: `self ⊕ other`.
    ///
    /// ```text
    /// C = A ⊕ B:
    ///   C.x = A.x + B.x * cos(A.θ) - B.y * sin(A.θ)
    ///   C.y = A.y + B.x * sin(A.θ) + B.y * cos(A.θ)
    ///   C.θ = normalize(A.θ + B.θ)
    /// ```
    #[inline]
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            self.x + other.x * cos_t - other.y * sin_t,
            self.y + other.x * sin_t + other.y * cos_t,
            self.theta + other.theta,
        )
    }

    /// The transform that undoes this one, so `A ⊕ A⁻¹ = I`.
    #[inline]
    pub fn inverse(&self) -> Pose2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Pose2D::new(
            -self.x * cos_t - self.y * sin_t,
            self.x * sin_t - self.y * cos_t,
            -self.theta,
        )
    }

    /// `other` expressed in this pose's frame: `self⁻¹ ⊕ other`.
    #[inline]
    pub fn between(&self, other: &Pose2D) -> Pose2D {
        self.inverse().compose(other)
    }

    #[inline]
    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Squared planar distance between the two positions.
    #[inline]
    pub fn distance_squared(&self, other: &Pose2D) -> f32 {
        self.position().distance_squared(&other.position())
    }

    /// True when translation and rotation are both within `epsilon` of zero.
    pub fn is_identity(&self, epsilon: f32) -> bool {
        self.x.abs() <= epsilon && self.y.abs() <= epsilon && self.theta.abs() <= epsilon
    }

    /// Transform a point from this frame into the parent frame.
    #[inline]
    pub fn transform_point(&self, point: &Point2D) -> Point2D {
        let (sin_t, cos_t) = self.theta.sin_cos();
        Point2D::new(
            self.x + point.x * cos_t - point.y * sin_t,
            self.y + point.x * sin_t + point.y * cos_t,
        )
    }

    /// Interpolate between two timestamped poses.
    ///
    /// Returns `None` when `target_time_us` falls outside [start, end].
    /// Position is interpolated linearly, heading along the short arc.
    pub fn interpolate(
        start: &Timestamped<Pose2D>,
        end: &Timestamped<Pose2D>,
        target_time_us: u64,
    ) -> Option<Pose2D> {
        if target_time_us < start.timestamp_us || target_time_us > end.timestamp_us {
            return None;
        }
        if start.timestamp_us == end.timestamp_us {
            return Some(start.data);
        }

        let t = (target_time_us - start.timestamp_us) as f32
            / (end.timestamp_us - start.timestamp_us) as f32;

        Some(Pose2D {
            x: start.data.x + t * (end.data.x - start.data.x),
            y: start.data.y + t * (end.data.y - start.data.y),
            theta: angle_lerp(start.data.theta, end.data.theta, t),
        })
    }
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::identity()
    }
}
