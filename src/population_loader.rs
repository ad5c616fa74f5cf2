//! Builds both populations from the configuration. The spatial and the infection populations
//! are generated separately but walk the teams in the same order, so agent ids line up.
use std::ops::Range;

use log::info;
use rand::Rng;

use crate::congregation::Venue;
use crate::duty::{DutyCycle, Team};
use crate::error::EpiError;
use crate::infection::{
    Infection, MaskEffectiveness, QuarantinePolicy, StageDurations, Transmissibility,
};
use crate::mobility::{MobileAgent, Velocity};
use crate::parameters::{ParametersValues, StageConfig, SECONDS_PER_DAY};
use crate::spatial_engine::{SpatialSettings, SpatialWorld};
use crate::transmission::InfectionAgent;
use crate::zone::{Zone, ZoneRegistry};

/// One team after repeats are expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamLayout {
    pub name: String,
    pub zone: Zone,
    pub members: Range<usize>,
    pub conscripted: bool,
    pub duty: Option<DutyCycle>,
}

/// Expands repeated teams and assigns consecutive agent ids in configuration order.
///
/// # Errors
///
/// Returns `EpiError::ConfigurationError` for a degenerate zone.
pub fn team_layouts(parameters: &ParametersValues) -> Result<Vec<TeamLayout>, EpiError> {
    let mut layouts = Vec::new();
    let mut next_id = 0;
    for (team_name, team) in &parameters.teams {
        for (rep, name) in team.expanded_names(team_name).into_iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let x_offset = rep as f64 * team.repeat.spatial_separation;
            let zone = Zone::from_config(&name, &team.home_zone, x_offset)?;
            let duty = team.conscripted.then(|| {
                DutyCycle::from_days(
                    parameters.days_on_duty,
                    parameters.days_off_duty,
                    team.rotation_offset,
                )
            });
            layouts.push(TeamLayout {
                name,
                zone,
                members: next_id..next_id + team.n_agents,
                conscripted: team.conscripted,
                duty,
            });
            next_id += team.n_agents;
        }
    }
    Ok(layouts)
}

/// Creates zones, teams and moving agents, plus the venue if one is configured.
///
/// # Errors
///
/// Returns `EpiError::ConfigurationError` for bad geometry, duplicate zone names, a missing open
/// zone or an unusable speed distribution.
pub fn build_spatial_world<R: Rng + ?Sized>(
    parameters: &ParametersValues,
    rng: &mut R,
) -> Result<SpatialWorld, EpiError> {
    let velocity = Velocity::new(
        parameters.movement_speed.mu,
        parameters.movement_speed.sigma,
        parameters.steps_per_day(),
    )?;
    let mut zones = ZoneRegistry::new();
    let mut teams = Vec::new();
    let mut agents = Vec::new();
    for layout in team_layouts(parameters)? {
        let zone_id = zones.add(layout.zone)?;
        for id in layout.members.clone() {
            agents.push(MobileAgent::spawn(
                id,
                zone_id,
                zones.get(zone_id),
                &velocity,
                layout.conscripted,
                rng,
            ));
        }
        teams.push(Team::new(
            layout.name,
            layout.members.collect(),
            layout.duty,
            zone_id,
        ));
    }

    let open_zone = zones.lookup(&parameters.open_zone).ok_or_else(|| {
        EpiError::ConfigurationError(format!("open zone {} does not exist", parameters.open_zone))
    })?;

    let venue = match &parameters.venue {
        Some(config) => {
            let zone_id = zones.add(Zone::from_config(&config.name, &config.zone, 0.0)?)?;
            Some(Venue::new(
                zone_id,
                config.opening_hours.start,
                config.opening_hours.stop,
                config.participants.conscripts,
                config.participants.civilians,
            ))
        }
        None => None,
    };

    info!(
        "spatial population: {} agents in {} teams, {} zones",
        agents.len(),
        teams.len(),
        zones.len()
    );
    let settings = SpatialSettings {
        dt: parameters.min_simulation_step,
        radius: parameters.infection.radius,
        stay_chance: parameters.dont_go_off_duty,
        ticks: parameters.tick_count(),
    };
    Ok(SpatialWorld::new(
        zones, teams, agents, open_zone, venue, settings,
    ))
}

fn stage_days<R: Rng + ?Sized>(stage: &StageConfig, rng: &mut R) -> f64 {
    rng.random_range(stage.days_min..=stage.days_max) * SECONDS_PER_DAY
}

/// Creates one infection agent per spatial agent with its own stage durations.
#[must_use]
pub fn build_infection_agents<R: Rng + ?Sized>(
    parameters: &ParametersValues,
    rng: &mut R,
) -> Vec<InfectionAgent> {
    let infection = &parameters.infection;
    let transmissibility = Transmissibility {
        incubating: infection.incubating.contagious,
        pre_symptomatic: infection.pre_symptomatic.contagious,
        symptomatic: infection.acute.contagious,
        asymptomatic: infection.asymptomatic.contagious,
    };
    let mask_effectiveness = MaskEffectiveness {
        wearer: parameters.mask.effectiveness.wearer,
        recipient: parameters.mask.effectiveness.recipient,
    };

    let mut agents = Vec::new();
    for team in parameters.teams.values() {
        let quarantine_config = parameters.quarantine(team.conscripted);
        let quarantine = if quarantine_config.enabled {
            QuarantinePolicy {
                on_exposure: quarantine_config.chance_to_enter_if_exposed,
                on_symptoms: quarantine_config.chance_to_enter_if_symptoms,
                effectiveness: quarantine_config.effectiveness,
            }
        } else {
            QuarantinePolicy::NONE
        };
        for _ in 0..team.repeat.times * team.n_agents {
            let durations = StageDurations {
                incubating: stage_days(&infection.incubating, rng),
                pre_symptomatic: stage_days(&infection.pre_symptomatic, rng),
                acute: stage_days(&infection.acute, rng),
            };
            agents.push(InfectionAgent {
                id: agents.len(),
                conscripted: team.conscripted,
                meeting_dropout: parameters.meetings_avoided.for_population(team.conscripted),
                transmitted: 0.0,
                meetings: 0,
                infection: Infection::new(
                    durations,
                    transmissibility,
                    infection.asymptomatic.chance,
                    parameters.mask.coverage.for_population(team.conscripted),
                    quarantine,
                    mask_effectiveness,
                ),
            });
        }
    }
    info!("infection population: {} agents", agents.len());
    agents
}

/// Gives every agent the configured initial infection of its population.
pub fn seed_initial_infections<R: Rng + ?Sized>(
    agents: &mut [InfectionAgent],
    parameters: &ParametersValues,
    rng: &mut R,
) {
    let initially = &parameters.initially_infected;
    for agent in agents {
        let fraction = if agent.conscripted {
            initially.conscripts_fraction
        } else {
            initially.civilians_fraction
        };
        agent.infection.seed_initial(fraction, rng);
    }
}
