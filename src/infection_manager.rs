//! The infection replay. Infection agents are generated from `Parameters` and every record of a
//! meeting log becomes one plan at its timestamp, so the plan queue replays the records in time
//! order and keeps log order among equal timestamps.
use log::{debug, info, trace};

use crate::context::{Context, ExecutionPhase};
use crate::define_data_plugin;
use crate::define_rng;
use crate::error::EpiError;
use crate::infection_report;
use crate::meeting_log::{MeetingLog, MeetingRecord};
use crate::parameters::{ContextParametersExt, PopulationValues, SECONDS_PER_DAY};
use crate::population_loader::{build_infection_agents, seed_initial_infections};
use crate::random::ContextRandomExt;
use crate::transmission::{pair_mut, process_meeting, InfectionAgent};

define_rng!(InfectionSetupRng);
define_rng!(DropoutRng);

#[derive(Default)]
struct InfectionData {
    agents: Vec<InfectionAgent>,
    mask_coverage: PopulationValues,
    end_time: f64,
    processed_meetings: usize,
    dropped_meetings: usize,
    reports_enabled: bool,
    error: Option<EpiError>,
}

define_data_plugin!(InfectionPlugin, InfectionData, InfectionData::default());

/// Counts of meetings seen by the replay so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStatistics {
    pub processed: usize,
    pub dropped: usize,
}

fn check_record(record: &MeetingRecord, population: usize) -> Result<(), EpiError> {
    if !record.timestamp.is_finite() || record.timestamp < 0.0 {
        return Err(EpiError::ConfigurationError(format!(
            "meeting record has invalid timestamp {}",
            record.timestamp
        )));
    }
    for meeting in &record.meetings {
        if meeting.a == meeting.b || meeting.a >= population || meeting.b >= population {
            return Err(EpiError::ConfigurationError(format!(
                "meeting ({}, {}) at t={} does not name two agents of a population of {population}",
                meeting.a, meeting.b, record.timestamp
            )));
        }
    }
    Ok(())
}

fn replay_record(context: &mut Context, record: &MeetingRecord) {
    let now = record.timestamp;
    trace!("t={now}: replaying {} meetings", record.meetings.len());
    for meeting in &record.meetings {
        let dropped = {
            let data = context.get_data(InfectionPlugin);
            let dropout = data.agents[meeting.a.min(meeting.b)].meeting_dropout;
            context.sample_bool(DropoutRng, dropout)
        };
        // Parameters are set once and were read by `init_infection`.
        let civilian_place = context
            .get_parameters()
            .is_ok_and(|parameters| parameters.is_civilian_place(&meeting.place));

        let data = context.get_data_mut(InfectionPlugin);
        if dropped {
            data.dropped_meetings += 1;
            continue;
        }
        let coverage = data.mask_coverage;
        let (a, b) = pair_mut(&mut data.agents, meeting.a, meeting.b);
        let result = process_meeting(now, a, b, &coverage, civilian_place);
        data.processed_meetings += 1;
        if let Err(error) = result {
            context.abort_replay(error);
            return;
        }
    }
}

pub trait ContextInfectionExt {
    /// Generates the infection population, seeds the initial infections and schedules the replay
    /// of `log`. Daily and summary reports are scheduled if `infection_report::init` ran first.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::ConfigurationError` if parameters are missing, or if a record has a bad
    /// timestamp or names agents outside the population.
    fn init_infection(&mut self, log: MeetingLog) -> Result<(), EpiError>;

    fn infection_agents(&self) -> &[InfectionAgent];

    fn replay_statistics(&self) -> ReplayStatistics;

    /// Time of the last scheduled replay event: the end of the configured run or the last record,
    /// whichever is later.
    fn replay_end_time(&self) -> f64;

    /// Stores `error` and stops the simulation after the current plan.
    fn abort_replay(&mut self, error: EpiError);

    /// Removes and returns the error that stopped the replay, if any.
    fn take_replay_error(&mut self) -> Option<EpiError>;

    /// Makes `init_infection` schedule the report plans.
    fn enable_infection_reports(&mut self);
}

impl ContextInfectionExt for Context {
    fn init_infection(&mut self, log: MeetingLog) -> Result<(), EpiError> {
        let (agents, mask_coverage, duration) = {
            let parameters = self.get_parameters()?;
            let mut agents =
                self.sample(InfectionSetupRng, |rng| build_infection_agents(parameters, rng));
            self.sample(InfectionSetupRng, |rng| {
                seed_initial_infections(&mut agents, parameters, rng);
            });
            (agents, parameters.mask.coverage, parameters.duration_seconds())
        };

        for record in log.records() {
            check_record(record, agents.len())?;
        }
        let last_timestamp = log.records().last().map_or(0.0, |record| record.timestamp);
        let end_time = duration.max(last_timestamp);

        let reports_enabled = {
            let data = self.get_data_mut(InfectionPlugin);
            data.agents = agents;
            data.mask_coverage = mask_coverage;
            data.end_time = end_time;
            data.processed_meetings = 0;
            data.dropped_meetings = 0;
            data.error = None;
            data.reports_enabled
        };

        debug!("scheduling replay of {} records", log.len());
        for record in log.into_records() {
            self.add_plan(record.timestamp, move |context| {
                replay_record(context, &record);
            });
        }

        if reports_enabled {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let days = (end_time / SECONDS_PER_DAY).ceil() as usize;
            for day in 1..=days {
                #[allow(clippy::cast_precision_loss)]
                let t = day as f64 * SECONDS_PER_DAY;
                self.add_plan_with_phase(
                    t,
                    move |context| {
                        if let Err(error) = infection_report::send_daily_snapshot(context, day) {
                            context.abort_replay(error);
                        }
                    },
                    ExecutionPhase::First,
                );
            }
            self.add_plan_with_phase(
                end_time,
                |context| {
                    if let Err(error) = infection_report::send_agent_summary(context) {
                        context.abort_replay(error);
                    }
                },
                ExecutionPhase::Last,
            );
        }
        Ok(())
    }

    fn infection_agents(&self) -> &[InfectionAgent] {
        self.try_get_data(InfectionPlugin)
            .map(|data| data.agents.as_slice())
            .unwrap_or_default()
    }

    fn replay_statistics(&self) -> ReplayStatistics {
        self.try_get_data(InfectionPlugin)
            .map(|data| ReplayStatistics {
                processed: data.processed_meetings,
                dropped: data.dropped_meetings,
            })
            .unwrap_or_default()
    }

    fn replay_end_time(&self) -> f64 {
        self.try_get_data(InfectionPlugin)
            .map_or(0.0, |data| data.end_time)
    }

    fn abort_replay(&mut self, error: EpiError) {
        info!("stopping infection replay at t={}: {error}", self.get_current_time());
        let data = self.get_data_mut(InfectionPlugin);
        if data.error.is_none() {
            data.error = Some(error);
        }
        self.shutdown();
    }

    fn take_replay_error(&mut self) -> Option<EpiError> {
        self.get_data_mut(InfectionPlugin).error.take()
    }

    fn enable_infection_reports(&mut self) {
        self.get_data_mut(InfectionPlugin).reports_enabled = true;
    }
}

/// Replays `log` against a fresh infection population. The context must hold `Parameters` and an
/// initialized random seed.
///
/// # Errors
///
/// Returns the error from `init_infection`, or the first error raised while replaying, such as an
/// `InvariantViolation` from a transfer.
pub fn run_infection(context: &mut Context, log: MeetingLog) -> Result<(), EpiError> {
    context.init_infection(log)?;
    context.execute();
    if let Some(error) = context.take_replay_error() {
        return Err(error);
    }
    let statistics = context.replay_statistics();
    info!(
        "infection replay finished: {} meetings processed, {} avoided",
        statistics.processed, statistics.dropped
    );
    Ok(())
}
