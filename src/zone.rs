//! Rectangular zones. The registry owns every zone; agents and teams refer to a zone by its
//! `ZoneId`.
use log::trace;
use rand::Rng;

use crate::error::EpiError;
use crate::hashing::HashMap;
use crate::parameters::ZoneConfig;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ZoneId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    name: String,
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl Zone {
    /// Builds a zone from its size and top-left anchor.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::ConfigurationError` if the width or height is not positive.
    pub fn new(
        name: &str,
        width: f64,
        height: f64,
        anchor_x: f64,
        anchor_y: f64,
    ) -> Result<Zone, EpiError> {
        let zone = Zone {
            name: name.to_string(),
            left: anchor_x,
            right: anchor_x + width,
            top: anchor_y,
            bottom: anchor_y - height,
        };
        if zone.left < zone.right && zone.bottom < zone.top {
            Ok(zone)
        } else {
            Err(EpiError::ConfigurationError(format!(
                "zone {name} has a degenerate extent {width} x {height}"
            )))
        }
    }

    /// Builds a zone from configuration, shifted right by `x_offset`.
    ///
    /// # Errors
    ///
    /// See [`Zone::new`].
    pub fn from_config(name: &str, config: &ZoneConfig, x_offset: f64) -> Result<Zone, EpiError> {
        Zone::new(
            name,
            config.width,
            config.height,
            config.top_left_point.x + x_offset,
            config.top_left_point.y,
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn left(&self) -> f64 {
        self.left
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.right
    }

    #[must_use]
    pub fn top(&self) -> f64 {
        self.top
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    /// Strict interior test on the horizontal axis.
    #[must_use]
    pub fn contains_x(&self, x: f64) -> bool {
        self.left < x && x < self.right
    }

    /// Strict interior test on the vertical axis.
    #[must_use]
    pub fn contains_y(&self, y: f64) -> bool {
        self.bottom < y && y < self.top
    }

    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.contains_x(x) && self.contains_y(y)
    }

    /// Uniform point inside the rectangle.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        (
            rng.random_range(self.left..self.right),
            rng.random_range(self.bottom..self.top),
        )
    }
}

#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
    by_name: HashMap<String, ZoneId>,
}

impl ZoneRegistry {
    #[must_use]
    pub fn new() -> ZoneRegistry {
        ZoneRegistry::default()
    }

    /// Adds a zone and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::ConfigurationError` if a zone with the same name exists.
    pub fn add(&mut self, zone: Zone) -> Result<ZoneId, EpiError> {
        if self.by_name.contains_key(zone.name()) {
            return Err(EpiError::ConfigurationError(format!(
                "zone {} is defined twice",
                zone.name()
            )));
        }
        let id = ZoneId(self.zones.len());
        trace!("registering zone {} as {id:?}", zone.name());
        self.by_name.insert(zone.name().to_string(), id);
        self.zones.push(zone);
        Ok(id)
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this registry.
    #[must_use]
    pub fn get(&self, id: ZoneId) -> &Zone {
        &self.zones[id.0]
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ZoneId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn name(&self, id: ZoneId) -> &str {
        self.get(id).name()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ZoneId, &Zone)> {
        self.zones
            .iter()
            .enumerate()
            .map(|(index, zone)| (ZoneId(index), zone))
    }
}
