//! Built-in effect variants.
//!
//! Each variant is a spawn distribution plus a set of keyframe curves over
//! normalized particle age. Curve tables are validated in the constructor,
//! so a variant that constructs successfully can never fail a curve lookup
//! at simulation time.

use ember_color::LinearRgb;
use ember_spline::{LinearSpline, SplineError};
use glam::{Quat, Vec2, Vec3};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_8, PI};

use crate::{point_in_polygon, Effect, Particle, ParticleRng};

fn colour_ramp(
    keys: impl IntoIterator<Item = (f32, u32)>,
) -> Result<LinearSpline<LinearRgb>, SplineError> {
    LinearSpline::from_keys(
        |t, a: LinearRgb, b| a.lerp(b, t),
        keys.into_iter().map(|(t, hex)| (t, LinearRgb::from_hex(hex))),
    )
}

// ============================================================================
// SmokePuff
// ============================================================================

/// A dense puff of smoke billowing outward in the horizontal plane.
///
/// Particles spawn at the origin with a random planar heading, grow from
/// nothing, brighten then fade, and decelerate sharply after the initial
/// burst.
#[derive(Debug, Clone)]
pub struct SmokePuff {
    particle_life: f32,
    initial_speed: f32,
    spin_rate: f32,
    alpha: LinearSpline<f32>,
    colour: LinearSpline<LinearRgb>,
    size: LinearSpline<f32>,
    velocity_scale: LinearSpline<f32>,
}

impl SmokePuff {
    /// Creates the effect with its stock curve tables.
    pub fn new() -> Result<Self, SplineError> {
        Ok(Self {
            particle_life: 0.4,
            initial_speed: 15.0,
            spin_rate: 0.5,
            alpha: LinearSpline::linear_keys([(0.0, 0.0), (0.2, 0.7), (1.0, 0.0)])?,
            colour: colour_ramp([(0.0, 0xFFFFFF), (1.0, 0x999999)])?,
            size: LinearSpline::linear_keys([(0.0, 0.0), (1.0, 10.0)])?,
            velocity_scale: LinearSpline::linear_keys([(0.0, 3.0), (0.2, 1.0), (1.0, 0.0)])?,
        })
    }
}

impl Effect for SmokePuff {
    fn spawn(&self, rng: &mut ParticleRng) -> Particle {
        let rotation = rng.azimuth();
        let speed = rng.next_f32() * self.initial_speed;
        Particle {
            position: Vec3::ZERO,
            velocity: Vec3::new(rotation.cos(), 0.0, rotation.sin()) * speed,
            rotation,
            size: 0.0,
            colour: LinearRgb::WHITE,
            alpha: 1.0,
            life: self.particle_life,
            max_life: self.particle_life,
        }
    }

    fn refresh(&self, p: &mut Particle, elapsed: f32) -> Result<(), SplineError> {
        let t = p.normalized_age();
        p.rotation += elapsed * self.spin_rate;
        p.alpha = self.alpha.evaluate(t)?;
        p.size = self.size.evaluate(t)?;
        p.colour = self.colour.evaluate(t)?;
        p.position += p.velocity * (self.velocity_scale.evaluate(t)? * elapsed);
        Ok(())
    }
}

// ============================================================================
// Sparks
// ============================================================================

/// Hot sparks flung in every direction, cooling from white-hot to ember
/// orange as they shrink and slow.
#[derive(Debug, Clone)]
pub struct Sparks {
    min_speed: f32,
    max_speed: f32,
    min_life: f32,
    max_life: f32,
    alpha: LinearSpline<f32>,
    colour: LinearSpline<LinearRgb>,
    size: LinearSpline<f32>,
    velocity_scale: LinearSpline<f32>,
}

impl Sparks {
    /// Creates the effect with its stock curve tables.
    pub fn new() -> Result<Self, SplineError> {
        Ok(Self {
            min_speed: 4.0,
            max_speed: 12.0,
            min_life: 0.3,
            max_life: 0.8,
            // Opaque for most of the lifetime, then a sharp cutoff.
            alpha: LinearSpline::linear_keys([(0.0, 1.0), (0.7, 1.0), (1.0, 0.0)])?,
            colour: colour_ramp([(0.0, 0xFFF4D6), (0.5, 0xFF6A00), (1.0, 0x551100)])?,
            size: LinearSpline::linear_keys([(0.0, 0.35), (1.0, 0.05)])?,
            velocity_scale: LinearSpline::linear_keys([(0.0, 1.0), (1.0, 0.2)])?,
        })
    }
}

impl Effect for Sparks {
    fn spawn(&self, rng: &mut ParticleRng) -> Particle {
        let life = rng.range(self.min_life, self.max_life);
        let speed = rng.range(self.min_speed, self.max_speed);
        Particle {
            position: Vec3::ZERO,
            velocity: rng.unit_sphere() * speed,
            rotation: rng.azimuth(),
            size: 0.35,
            colour: LinearRgb::from_hex(0xFFF4D6),
            alpha: 1.0,
            life,
            max_life: life,
        }
    }

    fn refresh(&self, p: &mut Particle, elapsed: f32) -> Result<(), SplineError> {
        let t = p.normalized_age();
        p.alpha = self.alpha.evaluate(t)?;
        p.size = self.size.evaluate(t)?;
        p.colour = self.colour.evaluate(t)?;
        p.position += p.velocity * (self.velocity_scale.evaluate(t)? * elapsed);
        Ok(())
    }
}

// ============================================================================
// TwinkleStars
// ============================================================================

/// Stationary points of light scattered over the slanted faces of a square
/// pyramid, each twinkling through a rise-and-fade alpha cycle.
///
/// `dim` is both the base width and the height of the pyramid. Spawn points
/// are rejection-sampled inside one triangular face template and then
/// rotated onto one of the four faces.
#[derive(Debug, Clone)]
pub struct TwinkleStars {
    dim: f32,
    star_size: f32,
    min_life: f32,
    max_life: f32,
    alpha: LinearSpline<f32>,
}

impl TwinkleStars {
    /// Creates the effect over a pyramid of the default dimension (2.0).
    pub fn new() -> Result<Self, SplineError> {
        Self::with_dim(2.0)
    }

    /// Creates the effect over a pyramid of base width and height `dim`.
    pub fn with_dim(dim: f32) -> Result<Self, SplineError> {
        Ok(Self {
            dim,
            star_size: 0.25,
            min_life: 1.0,
            max_life: 4.0,
            alpha: LinearSpline::linear_keys([
                (0.0, 0.0),
                (0.25, 1.0),
                (0.75, 1.0),
                (1.0, 0.0),
            ])?,
        })
    }

    /// Samples a point inside the front-face triangle template.
    fn sample_face_point(&self, rng: &mut ParticleRng) -> Vec2 {
        let half = self.dim / 2.0;
        let bounds = [
            Vec2::new(-half, -half),
            Vec2::new(0.0, half),
            Vec2::new(half, -half),
        ];
        loop {
            let candidate = Vec2::new(rng.range(-half, half), rng.range(-half, half));
            if point_in_polygon(candidate, &bounds) {
                return candidate;
            }
        }
    }

    /// Rotates a template-face point onto one of the four pyramid faces.
    fn place_on_face(&self, point: Vec3, face: u32) -> Vec3 {
        let quarter = self.dim / 4.0;
        match face % 4 {
            0 => {
                Quat::from_axis_angle(Vec3::X, FRAC_PI_8) * point
                    + Vec3::new(0.0, -quarter, quarter)
            }
            1 => {
                let rotated = Quat::from_axis_angle(Vec3::Y, FRAC_PI_2) * point;
                Quat::from_axis_angle(Vec3::Z, -FRAC_PI_8) * rotated
                    + Vec3::new(quarter, -quarter, 0.0)
            }
            2 => {
                let rotated = Quat::from_axis_angle(Vec3::Y, PI) * point;
                Quat::from_axis_angle(Vec3::NEG_X, FRAC_PI_8) * rotated
                    + Vec3::new(0.0, -quarter, -quarter)
            }
            _ => {
                let rotated = Quat::from_axis_angle(Vec3::Y, PI * 1.5) * point;
                Quat::from_axis_angle(Vec3::Z, FRAC_PI_8) * rotated
                    + Vec3::new(-quarter, -quarter, 0.0)
            }
        }
    }
}

impl Effect for TwinkleStars {
    fn spawn(&self, rng: &mut ParticleRng) -> Particle {
        let face_point = self.sample_face_point(rng);
        let point = Vec3::new(face_point.x, face_point.y, -self.dim / 2.0);
        let face = (rng.next_f32() * 4.0) as u32;
        let life = rng.range(self.min_life, self.max_life);
        Particle {
            position: self.place_on_face(point, face),
            velocity: Vec3::ZERO,
            rotation: rng.azimuth(),
            size: self.star_size,
            colour: LinearRgb::WHITE,
            alpha: 0.0,
            life,
            max_life: life,
        }
    }

    fn refresh(&self, p: &mut Particle, _elapsed: f32) -> Result<(), SplineError> {
        p.alpha = self.alpha.evaluate(p.normalized_age())?;
        Ok(())
    }
}

// ============================================================================
// RocketExhaust
// ============================================================================

/// A downward exhaust plume that winds down with its emitter.
///
/// Pair with `EmitterParams::max_emitter_life` and the curve from
/// [`RocketExhaust::emit_rate`] so the batch size tapers to zero as the burn
/// ends.
#[derive(Debug, Clone)]
pub struct RocketExhaust {
    min_speed: f32,
    max_speed: f32,
    cone_spread: f32,
    min_life: f32,
    max_life: f32,
    alpha: LinearSpline<f32>,
    colour: LinearSpline<LinearRgb>,
    size: LinearSpline<f32>,
    velocity_scale: LinearSpline<f32>,
}

impl RocketExhaust {
    /// Creates the effect with its stock curve tables.
    pub fn new() -> Result<Self, SplineError> {
        Ok(Self {
            min_speed: 8.0,
            max_speed: 14.0,
            cone_spread: 0.35,
            min_life: 0.5,
            max_life: 1.0,
            alpha: LinearSpline::linear_keys([(0.0, 1.0), (1.0, 0.0)])?,
            colour: colour_ramp([(0.0, 0xFFFFFF), (1.0, 0x666666)])?,
            size: LinearSpline::linear_keys([(0.0, 0.5), (1.0, 3.0)])?,
            velocity_scale: LinearSpline::linear_keys([(0.0, 1.0), (1.0, 0.4)])?,
        })
    }

    /// Particles-per-batch over normalized emitter life: full thrust early,
    /// tapering to nothing at burnout.
    pub fn emit_rate() -> Result<LinearSpline<f32>, SplineError> {
        LinearSpline::linear_keys([(0.0, 6.0), (0.7, 4.0), (1.0, 0.0)])
    }
}

impl Effect for RocketExhaust {
    fn spawn(&self, rng: &mut ParticleRng) -> Particle {
        let azimuth = rng.azimuth();
        let radial = rng.next_f32() * self.cone_spread;
        let direction =
            Vec3::new(azimuth.cos() * radial, -1.0, azimuth.sin() * radial).normalize();
        let life = rng.range(self.min_life, self.max_life);
        Particle {
            position: Vec3::ZERO,
            velocity: direction * rng.range(self.min_speed, self.max_speed),
            rotation: rng.azimuth(),
            size: 0.5,
            colour: LinearRgb::WHITE,
            alpha: 1.0,
            life,
            max_life: life,
        }
    }

    fn refresh(&self, p: &mut Particle, elapsed: f32) -> Result<(), SplineError> {
        let t = p.normalized_age();
        p.alpha = self.alpha.evaluate(t)?;
        p.size = self.size.evaluate(t)?;
        p.colour = self.colour.evaluate(t)?;
        p.position += p.velocity * (self.velocity_scale.evaluate(t)? * elapsed);
        Ok(())
    }
}
