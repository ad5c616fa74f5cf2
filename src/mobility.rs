//! Point agents that wander inside their allowed zone.
use std::f64::consts::TAU;

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::EpiError;
use crate::zone::{Zone, ZoneId};

#[derive(Debug, Clone, PartialEq)]
pub struct MobileAgent {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub zone: ZoneId,
    pub conscripted: bool,
    /// Set for agents that had a neighbour in the last detection pass. Presentation only.
    pub highlighted: bool,
}

/// Per-tick speed distribution: `Normal(mu, sigma * mu)` metres per day spread over the ticks
/// of one day.
#[derive(Debug, Clone, Copy)]
pub struct Velocity {
    speed: Normal<f64>,
    steps_per_day: f64,
}

impl Velocity {
    /// # Errors
    ///
    /// Returns `EpiError::ConfigurationError` if the distribution cannot be built.
    pub fn new(mu: f64, sigma: f64, steps_per_day: f64) -> Result<Velocity, EpiError> {
        let speed = Normal::new(mu, (sigma * mu).abs()).map_err(|err| {
            EpiError::ConfigurationError(format!("movement speed mu={mu} sigma={sigma}: {err}"))
        })?;
        Ok(Velocity {
            speed,
            steps_per_day,
        })
    }

    /// Draws a step vector with a normal magnitude and a uniform direction.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let amplitude = self.speed.sample(rng) / self.steps_per_day;
        let angle = rng.random_range(0.0..TAU);
        (amplitude * angle.cos(), amplitude * angle.sin())
    }
}

impl MobileAgent {
    /// Places a new agent uniformly inside `zone` with a freshly drawn velocity.
    pub fn spawn<R: Rng + ?Sized>(
        id: usize,
        zone_id: ZoneId,
        zone: &Zone,
        velocity: &Velocity,
        conscripted: bool,
        rng: &mut R,
    ) -> MobileAgent {
        let (x, y) = zone.random_point(rng);
        let (dx, dy) = velocity.sample(rng);
        MobileAgent {
            id,
            x,
            y,
            dx,
            dy,
            zone: zone_id,
            conscripted,
            highlighted: false,
        }
    }

    /// Advances one tick inside `zone`. A velocity component is reversed when the step would
    /// leave the open interval of the zone on that axis, then the step is taken.
    pub fn step(&mut self, zone: &Zone) {
        if !zone.contains_x(self.x + self.dx) {
            self.dx = -self.dx;
        }
        if !zone.contains_y(self.y + self.dy) {
            self.dy = -self.dy;
        }
        self.x += self.dx;
        self.y += self.dy;
    }

    /// Moves the agent to `point` inside a new allowed zone. The velocity is kept.
    pub fn transfer(&mut self, zone: ZoneId, point: (f64, f64)) {
        self.zone = zone;
        (self.x, self.y) = point;
    }
}
