//! Piecewise-linear keyframe curves for animated attributes.
//!
//! A [`LinearSpline`] stores `(t, value)` keyframes in ascending `t` order
//! and evaluates an interpolated value at an arbitrary parameter by blending
//! the bracketing pair with a caller-supplied blend function. Evaluation
//! outside the keyed range clamps to the nearest endpoint value; there is no
//! extrapolation.
//!
//! Particle effects use these curves to drive alpha, size, colour, and
//! velocity over a particle's normalized lifetime, but nothing here is
//! particle-specific: any `Copy` value with a blend function works.

use glam::{Vec2, Vec3};
use thiserror::Error;

/// Trait for types that can be interpolated linearly.
pub trait Interpolatable:
    Clone
    + Copy
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<f32, Output = Self>
{
}

impl Interpolatable for f32 {}
impl Interpolatable for Vec2 {}
impl Interpolatable for Vec3 {}

/// Linear interpolation between two values.
#[inline]
pub fn lerp<T: Interpolatable>(a: T, b: T, t: f32) -> T {
    a * (1.0 - t) + b * t
}

/// Blend function invoked with the fractional position inside a keyframe
/// interval and the bracketing pair of values.
///
/// A plain function pointer keeps splines `Debug` and `Clone` while still
/// letting callers choose per-curve blending (scalar lerp, colour lerp, a
/// stepped blend, ...).
pub type BlendFn<V> = fn(f32, V, V) -> V;

/// Errors from keyframe curve construction or evaluation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SplineError {
    /// The curve has no keyframes to evaluate.
    #[error("curve has no keyframes")]
    Empty,
    /// A keyframe does not strictly increase `t` over its predecessor.
    #[error("keyframe {index} breaks ascending `t` order")]
    NonAscending {
        /// Index the offending keyframe would have occupied.
        index: usize,
    },
}

/// A piecewise-linear curve over `(t, value)` keyframes.
///
/// Keyframes must be inserted in strictly ascending `t` order; out-of-order
/// or duplicate parameters are rejected at insertion rather than producing
/// undefined evaluation later. Strict ordering also guarantees every
/// keyframe interval has non-zero width, so evaluation never divides by
/// zero.
#[derive(Debug, Clone)]
pub struct LinearSpline<V> {
    keys: Vec<(f32, V)>,
    blend: BlendFn<V>,
}

impl<V: Copy> LinearSpline<V> {
    /// Creates an empty curve with the given blend function.
    pub fn new(blend: BlendFn<V>) -> Self {
        Self {
            keys: Vec::new(),
            blend,
        }
    }

    /// Builds a curve from a keyframe table.
    ///
    /// Fails with [`SplineError::Empty`] on an empty table and
    /// [`SplineError::NonAscending`] on an out-of-order entry, so a bad
    /// curve table surfaces at construction, not mid-simulation.
    pub fn from_keys(
        blend: BlendFn<V>,
        keys: impl IntoIterator<Item = (f32, V)>,
    ) -> Result<Self, SplineError> {
        let mut spline = Self::new(blend);
        for (t, value) in keys {
            spline.add_key(t, value)?;
        }
        if spline.is_empty() {
            return Err(SplineError::Empty);
        }
        Ok(spline)
    }

    /// Appends a keyframe.
    ///
    /// `t` must be finite and strictly greater than the last keyframe's
    /// parameter.
    pub fn add_key(&mut self, t: f32, value: V) -> Result<(), SplineError> {
        let index = self.keys.len();
        if !t.is_finite() {
            return Err(SplineError::NonAscending { index });
        }
        if let Some(&(last_t, _)) = self.keys.last() {
            if t <= last_t {
                return Err(SplineError::NonAscending { index });
            }
        }
        self.keys.push((t, value));
        Ok(())
    }

    /// Returns the number of keyframes.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the curve has no keyframes.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the keyed parameter range `(t_min, t_max)`, or `None` for an
    /// empty curve.
    pub fn domain(&self) -> Option<(f32, f32)> {
        let &(first, _) = self.keys.first()?;
        let (last, _) = self.keys[self.keys.len() - 1];
        Some((first, last))
    }

    /// Evaluates the curve at parameter `t`.
    ///
    /// At or outside the keyed range the endpoint value is returned exactly
    /// as stored, without invoking the blend function. Inside the range the
    /// bracketing pair `(k_i, k_{i+1})` with `k_i.t <= t < k_{i+1}.t` is
    /// blended at `frac = (t - k_i.t) / (k_{i+1}.t - k_i.t)`.
    ///
    /// Pure: repeated evaluation at the same `t` is bit-identical.
    pub fn evaluate(&self, t: f32) -> Result<V, SplineError> {
        let &(first_t, first_v) = self.keys.first().ok_or(SplineError::Empty)?;
        if t <= first_t {
            return Ok(first_v);
        }
        let (last_t, last_v) = self.keys[self.keys.len() - 1];
        if t >= last_t {
            return Ok(last_v);
        }

        // Linear scan; keyframe counts are small (authored tables).
        for pair in self.keys.windows(2) {
            let (t0, a) = pair[0];
            let (t1, b) = pair[1];
            if t < t1 {
                let frac = (t - t0) / (t1 - t0);
                return Ok((self.blend)(frac, a, b));
            }
        }
        Ok(last_v)
    }
}

impl<V: Interpolatable> LinearSpline<V> {
    /// Creates an empty curve blending with plain linear interpolation.
    pub fn linear() -> Self {
        Self::new(|t, a, b| lerp(a, b, t))
    }

    /// Builds a linearly-blended curve from a keyframe table.
    pub fn linear_keys(keys: impl IntoIterator<Item = (f32, V)>) -> Result<Self, SplineError> {
        Self::from_keys(|t, a, b| lerp(a, b, t), keys)
    }
}
