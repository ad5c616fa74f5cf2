//! A proximity-driven simulation of disease spread among conscripts and civilians.
//!
//! Agents move in straight lines inside rectangular zones and bounce off the walls. Conscripts
//! belong to teams that alternate between duty in their home zone and leave in an open civilian
//! zone, and an optional venue draws a few of them together with civilians every evening. Two
//! agents closer than the contact radius make a _meeting_; only the tick in which a pair comes
//! into range counts.
//!
//! A run has two phases, each driven by its own `Context`:
//! * The spatial engine (`spatial_engine`) steps the agents tick by tick and writes a
//!   `MeetingLog`: one record per tick that produced new meetings.
//! * The infection replay (`infection_manager`) walks the log in time order. Each agent's
//!   disease state is a set of probability masses in four stages (incubating, pre-symptomatic,
//!   acute, immune), and every meeting moves probability between the two agents, attenuated by
//!   masks and quarantine.
//!
//! The `Context` provides the services both phases share:
//! * Maintaining a notion of time and executing scheduled plans in time order
//! * Holding module-specific data in data plugins
//! * Independent, reproducible random streams
//! * Global properties (the model configuration) and CSV reports
pub mod context;
pub mod data_plugin;
pub mod error;
pub mod global_properties;
pub mod hashing;
pub mod log;
pub mod plan;
#[cfg(feature = "progress_bar")]
pub mod progress;
pub mod random;
pub mod report;
pub mod runner;

pub mod congregation;
pub mod duty;
pub mod infection;
pub mod infection_manager;
pub mod infection_report;
pub mod meeting_log;
pub mod meetings;
pub mod mobility;
pub mod parameters;
pub mod population_loader;
pub mod position_index;
pub mod spatial_engine;
pub mod transmission;
pub mod zone;

pub use context::{Context, ExecutionPhase};
pub use error::EpiError;
pub use global_properties::{ContextGlobalPropertiesExt, GlobalProperty};
pub use infection_manager::{run_infection, ContextInfectionExt};
pub use meeting_log::{Meeting, MeetingLog, MeetingRecord};
pub use parameters::{ContextParametersExt, Parameters, ParametersValues};
pub use random::{ContextRandomExt, RngId};
pub use report::{ContextReportExt, Report};
pub use runner::{run_with_args, BaseArgs, Phase, PhaseArgs};
pub use spatial_engine::{run_meetings, ContextSpatialExt};

// Re-exports for use in macros
pub use csv;
pub use rand;
