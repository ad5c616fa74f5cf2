//! Model configuration. `ParametersValues` mirrors the JSON configuration file and is stored in
//! the context as the `Parameters` global property; it is validated once when set, so the engines
//! read it without re-checking ranges.
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::define_global_property;
use crate::error::EpiError;
use crate::global_properties::ContextGlobalPropertiesExt;

pub const SECONDS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;
pub const SECONDS_PER_HOUR: f64 = 60.0 * 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A rectangle given by its size in metres and its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneConfig {
    pub width: f64,
    pub height: f64,
    pub top_left_point: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repeat {
    pub times: usize,
    #[serde(default)]
    pub spatial_separation: f64,
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat {
            times: 1,
            spatial_separation: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    pub n_agents: usize,
    pub conscripted: bool,
    pub home_zone: ZoneConfig,
    /// Phase shift of the duty cycle in days. Ignored for civilians.
    #[serde(default)]
    pub rotation_offset: f64,
    #[serde(default)]
    pub repeat: Repeat,
}

impl TeamConfig {
    /// Names of the teams (and their home zones) this entry expands to.
    #[must_use]
    pub fn expanded_names(&self, name: &str) -> Vec<String> {
        if self.repeat.times > 1 {
            (0..self.repeat.times).map(|rep| format!("{name}_{rep}")).collect()
        } else {
            vec![name.to_string()]
        }
    }
}

/// Daily speed distribution. `sigma` is relative to `mu`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementSpeed {
    pub mu: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    pub days_min: f64,
    pub days_max: f64,
    pub contagious: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsymptomaticConfig {
    pub chance: f64,
    pub contagious: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfectionConfig {
    /// Contact radius in metres.
    pub radius: f64,
    pub incubating: StageConfig,
    pub pre_symptomatic: StageConfig,
    pub acute: StageConfig,
    pub asymptomatic: AsymptomaticConfig,
}

/// A value configured separately for conscripts and civilians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationValues {
    pub military: f64,
    pub civilian: f64,
}

impl PopulationValues {
    #[must_use]
    pub fn for_population(&self, conscripted: bool) -> f64 {
        if conscripted {
            self.military
        } else {
            self.civilian
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskEffectivenessConfig {
    pub wearer: f64,
    pub recipient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskConfig {
    pub coverage: PopulationValues,
    pub effectiveness: MaskEffectivenessConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineConfig {
    #[serde(rename = "use")]
    pub enabled: bool,
    #[serde(default)]
    pub chance_to_enter_if_exposed: f64,
    #[serde(default)]
    pub chance_to_enter_if_symptoms: f64,
    #[serde(default)]
    pub effectiveness: f64,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        QuarantineConfig {
            enabled: false,
            chance_to_enter_if_exposed: 0.0,
            chance_to_enter_if_symptoms: 0.0,
            effectiveness: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiallyInfected {
    pub conscripts_fraction: f64,
    pub civilians_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub start: f64,
    pub stop: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participants {
    pub conscripts: usize,
    pub civilians: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueConfig {
    #[serde(default = "default_venue_name")]
    pub name: String,
    pub opening_hours: OpeningHours,
    pub participants: Participants,
    pub zone: ZoneConfig,
}

fn default_venue_name() -> String {
    "sotilaskoti".to_string()
}

fn default_open_zone() -> String {
    "civilian".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParametersValues {
    /// Simulated days.
    pub simulation_duration: f64,
    /// Tick length in seconds.
    pub min_simulation_step: f64,
    pub days_on_duty: f64,
    pub days_off_duty: f64,
    /// Chance that a conscript stays in the home zone when the team goes off duty.
    #[serde(default)]
    pub dont_go_off_duty: f64,
    pub movement_speed: MovementSpeed,
    /// Home zone of the team that off-duty conscripts are sent to.
    #[serde(default = "default_open_zone")]
    pub open_zone: String,
    pub teams: IndexMap<String, TeamConfig>,
    pub infection: InfectionConfig,
    pub mask: MaskConfig,
    #[serde(default)]
    pub military_quarantine: QuarantineConfig,
    #[serde(default)]
    pub civilian_self_quarantine: QuarantineConfig,
    pub meetings_avoided: PopulationValues,
    pub initially_infected: InitiallyInfected,
    #[serde(default)]
    pub venue: Option<VenueConfig>,
}

impl ParametersValues {
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.simulation_duration * SECONDS_PER_DAY
    }

    #[must_use]
    pub fn steps_per_day(&self) -> f64 {
        SECONDS_PER_DAY / self.min_simulation_step
    }

    /// Number of ticks: one at every multiple of the step strictly before the end.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn tick_count(&self) -> usize {
        (self.duration_seconds() / self.min_simulation_step).ceil() as usize
    }

    #[must_use]
    pub fn quarantine(&self, conscripted: bool) -> &QuarantineConfig {
        if conscripted {
            &self.military_quarantine
        } else {
            &self.civilian_self_quarantine
        }
    }

    /// Whether a place counts as civilian ground for conscripts' mask use.
    #[must_use]
    pub fn is_civilian_place(&self, place: &str) -> bool {
        place == self.open_zone
            || self
                .venue
                .as_ref()
                .is_some_and(|venue| venue.name == place)
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), EpiError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EpiError::ConfigurationError(format!(
            "{name} must be a probability in [0, 1], got {value}"
        )))
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), EpiError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(EpiError::ConfigurationError(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

fn check_zone(name: &str, zone: &ZoneConfig) -> Result<(), EpiError> {
    check_positive(&format!("{name} zone width"), zone.width)?;
    check_positive(&format!("{name} zone height"), zone.height)
}

fn check_stage(name: &str, stage: &StageConfig) -> Result<(), EpiError> {
    check_positive(&format!("infection.{name}.daysMin"), stage.days_min)?;
    if stage.days_min > stage.days_max {
        return Err(EpiError::ConfigurationError(format!(
            "infection.{name}: daysMin {} exceeds daysMax {}",
            stage.days_min, stage.days_max
        )));
    }
    check_probability(&format!("infection.{name}.contagious"), stage.contagious)
}

fn check_quarantine(name: &str, quarantine: &QuarantineConfig) -> Result<(), EpiError> {
    check_probability(
        &format!("{name}.chanceToEnterIfExposed"),
        quarantine.chance_to_enter_if_exposed,
    )?;
    check_probability(
        &format!("{name}.chanceToEnterIfSymptoms"),
        quarantine.chance_to_enter_if_symptoms,
    )?;
    check_probability(&format!("{name}.effectiveness"), quarantine.effectiveness)
}

/// Checks ranges and cross-references of a configuration.
///
/// # Errors
///
/// Returns `EpiError::ConfigurationError` naming the first offending field.
pub fn validate_parameters(parameters: &ParametersValues) -> Result<(), EpiError> {
    check_positive("simulationDuration", parameters.simulation_duration)?;
    check_positive("minSimulationStep", parameters.min_simulation_step)?;
    if parameters.days_on_duty < 0.0 || parameters.days_off_duty < 0.0 {
        return Err(EpiError::ConfigurationError(
            "daysOnDuty and daysOffDuty must not be negative".to_string(),
        ));
    }
    check_positive(
        "daysOnDuty + daysOffDuty",
        parameters.days_on_duty + parameters.days_off_duty,
    )?;
    check_probability("dontGoOffDuty", parameters.dont_go_off_duty)?;

    let speed = &parameters.movement_speed;
    if !(speed.mu.is_finite() && speed.sigma.is_finite() && speed.sigma >= 0.0) {
        return Err(EpiError::ConfigurationError(format!(
            "movementSpeed needs a finite mu and a non-negative sigma, got mu={} sigma={}",
            speed.mu, speed.sigma
        )));
    }

    if parameters.teams.is_empty() {
        return Err(EpiError::ConfigurationError(
            "at least one team is required".to_string(),
        ));
    }
    let mut zone_names = Vec::new();
    for (name, team) in &parameters.teams {
        check_zone(name, &team.home_zone)?;
        if team.repeat.times == 0 {
            return Err(EpiError::ConfigurationError(format!(
                "team {name}: repeat.times must be at least 1"
            )));
        }
        zone_names.extend(team.expanded_names(name));
    }
    if !zone_names.contains(&parameters.open_zone) {
        return Err(EpiError::ConfigurationError(format!(
            "open zone {} is not the home zone of any team",
            parameters.open_zone
        )));
    }

    let infection = &parameters.infection;
    check_positive("infection.radius", infection.radius)?;
    check_stage("incubating", &infection.incubating)?;
    check_stage("preSymptomatic", &infection.pre_symptomatic)?;
    check_stage("acute", &infection.acute)?;
    check_probability("infection.asymptomatic.chance", infection.asymptomatic.chance)?;
    check_probability(
        "infection.asymptomatic.contagious",
        infection.asymptomatic.contagious,
    )?;

    check_probability("mask.coverage.military", parameters.mask.coverage.military)?;
    check_probability("mask.coverage.civilian", parameters.mask.coverage.civilian)?;
    check_probability("mask.effectiveness.wearer", parameters.mask.effectiveness.wearer)?;
    check_probability(
        "mask.effectiveness.recipient",
        parameters.mask.effectiveness.recipient,
    )?;
    check_quarantine("militaryQuarantine", &parameters.military_quarantine)?;
    check_quarantine("civilianSelfQuarantine", &parameters.civilian_self_quarantine)?;
    check_probability("meetingsAvoided.military", parameters.meetings_avoided.military)?;
    check_probability("meetingsAvoided.civilian", parameters.meetings_avoided.civilian)?;
    check_probability(
        "initiallyInfected.conscriptsFraction",
        parameters.initially_infected.conscripts_fraction,
    )?;
    check_probability(
        "initiallyInfected.civiliansFraction",
        parameters.initially_infected.civilians_fraction,
    )?;

    if let Some(venue) = &parameters.venue {
        let hours = &venue.opening_hours;
        if !(0.0 <= hours.start && hours.start < hours.stop && hours.stop <= 24.0) {
            return Err(EpiError::ConfigurationError(format!(
                "venue {} opening hours {}..{} must lie inside one day",
                venue.name, hours.start, hours.stop
            )));
        }
        check_zone(&venue.name, &venue.zone)?;
        if zone_names.contains(&venue.name) {
            return Err(EpiError::ConfigurationError(format!(
                "venue name {} clashes with a team zone",
                venue.name
            )));
        }
    }
    Ok(())
}

define_global_property!(Parameters, ParametersValues, validate_parameters);

pub trait ContextParametersExt {
    /// Loads a JSON configuration file and stores it as the `Parameters` global property.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or if validation rejects it.
    fn init_parameters(&mut self, file_path: &Path) -> Result<(), EpiError>;

    /// Returns the configured parameters.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::ConfigurationError` if no parameters were set.
    fn get_parameters(&self) -> Result<&ParametersValues, EpiError>;
}

impl ContextParametersExt for Context {
    fn init_parameters(&mut self, file_path: &Path) -> Result<(), EpiError> {
        let parameters_json = self.load_parameters_from_json::<ParametersValues>(file_path)?;
        self.set_global_property_value(Parameters, parameters_json)
    }

    fn get_parameters(&self) -> Result<&ParametersValues, EpiError> {
        self.get_global_property_value(Parameters).ok_or_else(|| {
            EpiError::ConfigurationError("model parameters have not been loaded".to_string())
        })
    }
}
