//! Angle arithmetic shared by pose composition, odometry interpolation
//! and the graph solver.

use std::f32::consts::PI;

/// Wrap an angle into [-π, π].
///
/// # Example
/// ```
/// use setu_slam::core::math::normalize_angle;
/// use std::f32::consts::PI;
///
/// assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-6);
/// assert!((normalize_angle(-3.0 * PI) - (-PI)).abs() < 1e-6);
/// ```
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Double precision variant used inside the solver's linear system.
#[inline]
pub fn normalize_angle_f64(angle: f64) -> f64 {
    use std::f64::consts::PI as PI64;
    let mut a = angle % (2.0 * PI64);
    if a > PI64 {
        a -= 2.0 * PI64;
    } else if a < -PI64 {
        a += 2.0 * PI64;
    }
    a
}

/// Signed shortest rotation taking `a` onto `b`.
///
/// # Example
/// ```
/// use setu_slam::core::math::angle_diff;
/// use std::f32::consts::PI;
///
/// let diff = angle_diff(PI - 0.1, -PI + 0.1);
/// assert!((diff - 0.2).abs() < 1e-6);
/// ```
#[inline]
pub fn angle_diff(a: f32, b: f32) -> f32 {
    normalize_angle(b - a)
}

/// Interpolate between two headings along the short arc.
///
/// `t = 0` yields `a`, `t = 1` yields `b`.
#[inline]
pub fn angle_lerp(a: f32, b: f32, t: f32) -> f32 {
    normalize_angle(a + angle_diff(a, b) * t)
}
