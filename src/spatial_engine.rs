//! The meeting generator. Each tick rotates duty teams, runs the venue, moves every agent one
//! step, restores the x order, detects agents in range and logs the pairs that just met.
//!
//! Random decisions are drawn into plans with a shared borrow of the world and applied
//! afterwards, so the random streams and the world are never borrowed mutably together.
use log::{debug, info, trace};
use rand::Rng;

use crate::congregation::{Venue, VenuePlan};
use crate::context::Context;
use crate::define_data_plugin;
use crate::define_rng;
use crate::duty::{plan_rotation, Relocation, RotationPlan, Team};
use crate::error::EpiError;
use crate::meeting_log::{Meeting, MeetingLog, MeetingRecord};
use crate::meetings::{detect_meetings, MeetingTracker};
use crate::mobility::MobileAgent;
use crate::parameters::ContextParametersExt;
use crate::population_loader::build_spatial_world;
use crate::position_index::OrderedPositionIndex;
use crate::random::ContextRandomExt;
use crate::zone::{ZoneId, ZoneRegistry};

define_rng!(PopulationRng);
define_rng!(DutyRng);
define_rng!(VenueRng);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpatialSettings {
    /// Tick length in seconds.
    pub dt: f64,
    pub radius: f64,
    pub stay_chance: f64,
    pub ticks: usize,
}

/// Read-only view of one agent for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub zone: String,
    pub conscripted: bool,
    pub highlighted: bool,
}

#[derive(Debug, Default)]
pub struct SpatialWorld {
    zones: ZoneRegistry,
    teams: Vec<Team>,
    agents: Vec<MobileAgent>,
    index: OrderedPositionIndex,
    tracker: MeetingTracker,
    venue: Option<Venue>,
    open_zone: ZoneId,
    settings: SpatialSettings,
    log: MeetingLog,
}

impl SpatialWorld {
    #[must_use]
    pub fn new(
        zones: ZoneRegistry,
        teams: Vec<Team>,
        agents: Vec<MobileAgent>,
        open_zone: ZoneId,
        venue: Option<Venue>,
        settings: SpatialSettings,
    ) -> SpatialWorld {
        let index = OrderedPositionIndex::new(&agents);
        SpatialWorld {
            zones,
            teams,
            agents,
            index,
            tracker: MeetingTracker::new(),
            venue,
            open_zone,
            settings,
            log: MeetingLog::new(),
        }
    }

    #[must_use]
    pub fn zones(&self) -> &ZoneRegistry {
        &self.zones
    }

    #[must_use]
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    #[must_use]
    pub fn agents(&self) -> &[MobileAgent] {
        &self.agents
    }

    #[must_use]
    pub fn index(&self) -> &OrderedPositionIndex {
        &self.index
    }

    #[must_use]
    pub fn venue(&self) -> Option<&Venue> {
        self.venue.as_ref()
    }

    #[must_use]
    pub fn open_zone(&self) -> ZoneId {
        self.open_zone
    }

    #[must_use]
    pub fn settings(&self) -> SpatialSettings {
        self.settings
    }

    #[must_use]
    pub fn meeting_log(&self) -> &MeetingLog {
        &self.log
    }

    pub fn take_meeting_log(&mut self) -> MeetingLog {
        std::mem::take(&mut self.log)
    }

    /// Time of tick `k`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn tick_time(&self, k: usize) -> f64 {
        k as f64 * self.settings.dt
    }

    pub fn plan_rotation<R: Rng + ?Sized>(&self, t: f64, rng: &mut R) -> RotationPlan {
        plan_rotation(
            &self.teams,
            &self.zones,
            self.open_zone,
            t,
            self.settings.dt,
            self.settings.stay_chance,
            rng,
        )
    }

    fn relocate(&mut self, relocation: Relocation) {
        trace!(
            "agent {} moves to {}",
            relocation.agent,
            self.zones.name(relocation.zone)
        );
        self.agents[relocation.agent].transfer(relocation.zone, relocation.point);
    }

    pub fn apply_rotation(&mut self, plan: RotationPlan) {
        for (team, zone) in plan.team_zones {
            self.teams[team].current_zone = zone;
        }
        for relocation in plan.relocations {
            self.relocate(relocation);
        }
    }

    /// `None` when no venue is configured.
    pub fn plan_venue<R: Rng + ?Sized>(&self, t: f64, rng: &mut R) -> Option<VenuePlan> {
        self.venue.as_ref().map(|venue| {
            venue.plan(
                t,
                self.settings.dt,
                &self.teams,
                &self.agents,
                &self.zones,
                rng,
            )
        })
    }

    pub fn apply_venue(&mut self, plan: VenuePlan) {
        let Some(venue) = self.venue.as_mut() else {
            return;
        };
        for relocation in venue.apply(plan) {
            self.relocate(relocation);
        }
    }

    /// Moves all agents, re-orders the index, detects contacts and logs the new ones at `t`.
    /// Returns the number of new meetings.
    pub fn advance(&mut self, t: f64) -> usize {
        for agent in &mut self.agents {
            agent.step(self.zones.get(agent.zone));
        }
        self.index.refresh(&self.agents);

        let snapshot = detect_meetings(&self.index, &self.agents, self.settings.radius);
        let participants = snapshot.participants();
        for agent in &mut self.agents {
            agent.highlighted = participants.contains(&agent.id);
        }

        let new_pairs = self.tracker.advance(snapshot);
        if new_pairs.is_empty() {
            return 0;
        }
        let meetings: Vec<Meeting> = new_pairs
            .into_iter()
            .map(|(pair, place)| Meeting {
                a: pair.low(),
                b: pair.high(),
                place: self.zones.name(place).to_string(),
            })
            .collect();
        let count = meetings.len();
        self.log.push(MeetingRecord {
            timestamp: t,
            meetings,
        });
        count
    }

    /// Runs a whole tick with a single random source.
    pub fn tick<R: Rng + ?Sized>(&mut self, t: f64, rng: &mut R) -> usize {
        let rotation = self.plan_rotation(t, rng);
        self.apply_rotation(rotation);
        if let Some(plan) = self.plan_venue(t, rng) {
            self.apply_venue(plan);
        }
        self.advance(t)
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.agents
            .iter()
            .map(|agent| AgentSnapshot {
                id: agent.id,
                x: agent.x,
                y: agent.y,
                zone: self.zones.name(agent.zone).to_string(),
                conscripted: agent.conscripted,
                highlighted: agent.highlighted,
            })
            .collect()
    }
}

define_data_plugin!(SpatialPlugin, SpatialWorld, SpatialWorld::default());

pub trait ContextSpatialExt {
    /// Builds the spatial population from the `Parameters` global property and schedules the
    /// first tick at time zero.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::ConfigurationError` if parameters are missing or unusable.
    fn init_spatial(&mut self) -> Result<(), EpiError>;

    fn spatial_world(&self) -> &SpatialWorld;

    fn agent_snapshots(&self) -> Vec<AgentSnapshot>;

    fn take_meeting_log(&mut self) -> MeetingLog;
}

fn run_tick(context: &mut Context, k: usize) {
    let (t, next_t, ticks) = {
        let world = context.get_data(SpatialPlugin);
        (
            world.tick_time(k),
            world.tick_time(k + 1),
            world.settings.ticks,
        )
    };

    let rotation = {
        let world = context.get_data(SpatialPlugin);
        context.sample(DutyRng, |rng| world.plan_rotation(t, rng))
    };
    context.get_data_mut(SpatialPlugin).apply_rotation(rotation);

    let venue_plan = {
        let world = context.get_data(SpatialPlugin);
        context.sample(VenueRng, |rng| world.plan_venue(t, rng))
    };
    if let Some(plan) = venue_plan {
        context.get_data_mut(SpatialPlugin).apply_venue(plan);
    }

    let new_meetings = context.get_data_mut(SpatialPlugin).advance(t);
    if new_meetings > 0 {
        trace!("t={t}: {new_meetings} new meetings");
    }

    if k + 1 < ticks {
        context.add_plan(next_t, move |context| run_tick(context, k + 1));
    } else {
        debug!("last tick at t={t}");
    }
}

impl ContextSpatialExt for Context {
    fn init_spatial(&mut self) -> Result<(), EpiError> {
        let world = {
            let parameters = self.get_parameters()?;
            self.sample(PopulationRng, |rng| build_spatial_world(parameters, rng))?
        };
        let ticks = world.settings.ticks;
        *self.get_data_mut(SpatialPlugin) = world;
        if ticks > 0 {
            self.add_plan(0.0, |context| run_tick(context, 0));
        }
        Ok(())
    }

    fn spatial_world(&self) -> &SpatialWorld {
        self.get_data(SpatialPlugin)
    }

    fn agent_snapshots(&self) -> Vec<AgentSnapshot> {
        self.try_get_data(SpatialPlugin)
            .map(SpatialWorld::snapshots)
            .unwrap_or_default()
    }

    fn take_meeting_log(&mut self) -> MeetingLog {
        self.get_data_mut(SpatialPlugin).take_meeting_log()
    }
}

/// Generates the meeting log for the configured scenario. The context must hold `Parameters`
/// and an initialized random seed.
///
/// # Errors
///
/// Returns the error from `init_spatial`.
pub fn run_meetings(context: &mut Context) -> Result<MeetingLog, EpiError> {
    context.init_spatial()?;
    context.execute();
    let log = context.take_meeting_log();
    info!(
        "meeting generation finished: {} records, {} meetings",
        log.len(),
        log.meeting_count()
    );
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duty::DutyCycle;
    use crate::global_properties::ContextGlobalPropertiesExt;
    use crate::parameters::tests::sample_parameters;
    use crate::parameters::Parameters;
    use crate::zone::Zone;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn settings(dt: f64, radius: f64, ticks: usize) -> SpatialSettings {
        SpatialSettings {
            dt,
            radius,
            stay_chance: 0.0,
            ticks,
        }
    }

    fn walker(id: usize, x: f64, dx: f64, zone: ZoneId) -> MobileAgent {
        MobileAgent {
            id,
            x,
            y: 50.0,
            dx,
            dy: 0.0,
            zone,
            conscripted: false,
            highlighted: false,
        }
    }

    #[test]
    fn two_agents_approaching_meet_once() {
        let mut zones = ZoneRegistry::new();
        let field = zones
            .add(Zone::new("field", 100.0, 100.0, 0.0, 100.0).unwrap())
            .unwrap();
        let radius = 5.0;
        // Start 2R apart, closing at 0.5 m per tick in total.
        let agents = vec![walker(0, 40.0, 0.25, field), walker(1, 50.0, -0.25, field)];
        let teams = vec![Team::new("walkers".to_string(), vec![0, 1], None, field)];
        let mut world =
            SpatialWorld::new(zones, teams, agents, field, None, settings(1.0, radius, 20));
        let mut rng = SmallRng::seed_from_u64(0);

        let mut events = Vec::new();
        for k in 0..20 {
            let t = world.tick_time(k);
            if world.tick(t, &mut rng) > 0 {
                events.push(k);
            }
        }
        // Distance after tick k is 10 - 0.5 (k + 1); it first drops below R at k = 10.
        assert_eq!(events, vec![10]);
        let log = world.meeting_log();
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.records()[0].meetings,
            vec![Meeting {
                a: 0,
                b: 1,
                place: "field".to_string()
            }]
        );
        assert!(world.agents().iter().all(|agent| agent.highlighted));
    }

    #[test]
    fn duty_team_follows_seven_day_cycle() {
        let day = 86_400.0;
        let dt = 3600.0;
        let mut zones = ZoneRegistry::new();
        let home = zones
            .add(Zone::new("barracks", 50.0, 50.0, 0.0, 50.0).unwrap())
            .unwrap();
        let open = zones
            .add(Zone::new("civilian", 50.0, 50.0, 100.0, 50.0).unwrap())
            .unwrap();
        let agents: Vec<MobileAgent> = (0..4).map(|id| walker(id, 10.0, 0.1, home)).collect();
        let teams = vec![Team::new(
            "platoon".to_string(),
            (0..4).collect(),
            Some(DutyCycle::from_days(7.0, 7.0, 0.0)),
            home,
        )];
        let mut world = SpatialWorld::new(zones, teams, agents, open, None, settings(dt, 1.0, 0));
        let mut rng = SmallRng::seed_from_u64(7);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = (28.0 * day / dt) as usize;
        for k in 0..ticks {
            let t = world.tick_time(k);
            world.tick(t, &mut rng);
            let expected = if t.rem_euclid(14.0 * day) < 7.0 * day {
                home
            } else {
                open
            };
            assert_eq!(world.teams()[0].current_zone, expected, "team zone at t={t}");
            for agent in world.agents() {
                assert_eq!(agent.zone, expected, "agent {} at t={t}", agent.id);
            }
        }
    }

    #[test]
    fn stay_chance_keeps_agents_home_on_leave() {
        let day = 86_400.0;
        let mut zones = ZoneRegistry::new();
        let home = zones
            .add(Zone::new("barracks", 50.0, 50.0, 0.0, 50.0).unwrap())
            .unwrap();
        let open = zones
            .add(Zone::new("civilian", 50.0, 50.0, 100.0, 50.0).unwrap())
            .unwrap();
        let agents: Vec<MobileAgent> = (0..3).map(|id| walker(id, 10.0, 0.1, home)).collect();
        let teams = vec![Team::new(
            "platoon".to_string(),
            (0..3).collect(),
            Some(DutyCycle::from_days(1.0, 1.0, 0.0)),
            home,
        )];
        let mut settings = settings(3600.0, 1.0, 0);
        settings.stay_chance = 1.0;
        let mut world = SpatialWorld::new(zones, teams, agents, open, None, settings);
        let mut rng = SmallRng::seed_from_u64(3);
        world.tick(0.0, &mut rng);
        world.tick(day, &mut rng);
        assert_eq!(world.teams()[0].current_zone, open);
        assert!(world.agents().iter().all(|agent| agent.zone == home));
    }

    #[test]
    fn context_run_produces_sorted_log() {
        let mut context = Context::new();
        context
            .set_global_property_value(Parameters, sample_parameters())
            .unwrap();
        context.init_random(42);
        let log = run_meetings(&mut context).unwrap();
        assert!(log.is_sorted());
        for record in log.records() {
            assert!(!record.meetings.is_empty());
            for meeting in &record.meetings {
                assert!(meeting.a < meeting.b);
                assert!(meeting.b < 10);
            }
        }
        let snapshots = context.agent_snapshots();
        assert_eq!(snapshots.len(), 10);
        assert!(context.spatial_world().index().is_sorted(context.spatial_world().agents()));
        // The venue queue is empty after the last closing edge of the run.
        assert!(context
            .spatial_world()
            .venue()
            .is_some_and(|venue| venue.queue().is_empty()));
    }

    #[test]
    fn same_seed_same_log() {
        let run = |seed| {
            let mut context = Context::new();
            context
                .set_global_property_value(Parameters, sample_parameters())
                .unwrap();
            context.init_random(seed);
            run_meetings(&mut context).unwrap()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn missing_parameters_is_configuration_error() {
        let mut context = Context::new();
        context.init_random(1);
        assert!(matches!(
            run_meetings(&mut context),
            Err(EpiError::ConfigurationError(_))
        ));
    }
}
