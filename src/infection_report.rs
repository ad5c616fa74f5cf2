use log::trace;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::define_report;
use crate::error::EpiError;
use crate::infection_manager::ContextInfectionExt;
use crate::report::ContextReportExt;

/// Stage masses of one agent at the end of a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStageReport {
    pub day: usize,
    pub agent: usize,
    pub conscripted: bool,
    pub incubating: f64,
    pub pre_symptomatic: f64,
    pub acute: f64,
    pub immune: f64,
}

define_report!(DailyStageReport);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummaryReport {
    pub agent: usize,
    pub conscripted: bool,
    pub meetings: usize,
    pub transmitted: f64,
}

define_report!(AgentSummaryReport);

/// Registers both infection reports and asks the replay to fill them.
///
/// # Errors
///
/// Returns `EpiError::IoError` if a report file cannot be created.
pub fn init(context: &mut Context) -> Result<(), EpiError> {
    trace!("initializing infection reports");
    context.add_report::<DailyStageReport>("daily_stages")?;
    context.add_report::<AgentSummaryReport>("agent_summary")?;
    context.enable_infection_reports();
    Ok(())
}

pub(crate) fn send_daily_snapshot(context: &Context, day: usize) -> Result<(), EpiError> {
    let now = context.get_current_time();
    trace!("daily snapshot for day {day} at t={now}");
    for agent in context.infection_agents() {
        let totals = agent.infection.stage_totals_at(now);
        context.send_report(DailyStageReport {
            day,
            agent: agent.id,
            conscripted: agent.conscripted,
            incubating: totals.incubating,
            pre_symptomatic: totals.pre_symptomatic,
            acute: totals.acute,
            immune: totals.immune,
        })?;
    }
    Ok(())
}

pub(crate) fn send_agent_summary(context: &Context) -> Result<(), EpiError> {
    for agent in context.infection_agents() {
        context.send_report(AgentSummaryReport {
            agent: agent.id,
            conscripted: agent.conscripted,
            meetings: agent.meetings,
            transmitted: agent.transmitted,
        })?;
    }
    Ok(())
}
