//! A shared venue that opens once a day. At opening a fixed number of agents is drawn from the
//! on-duty teams and from everyone else, moved in, and queued with their origin zone; at closing
//! the queue is emptied in arrival order and each agent returns to its origin.
use std::collections::VecDeque;

use log::debug;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::duty::{Relocation, Team};
use crate::mobility::MobileAgent;
use crate::parameters::{SECONDS_PER_DAY, SECONDS_PER_HOUR};
use crate::zone::{ZoneId, ZoneRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub agent: usize,
    pub origin: ZoneId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VenuePlan {
    /// New arrivals with their recorded origin and their point inside the venue.
    pub admissions: Vec<(QueueEntry, (f64, f64))>,
    /// Points in the origin zones for the whole queue, in FIFO order. Empty unless closing.
    pub releases: Vec<(f64, f64)>,
    pub closing: bool,
}

#[derive(Debug, Clone)]
pub struct Venue {
    pub zone: ZoneId,
    /// Opening and closing time of day in seconds.
    pub opens_at: f64,
    pub closes_at: f64,
    pub conscripts: usize,
    pub civilians: usize,
    queue: VecDeque<QueueEntry>,
}

/// True for the tick starting at `t` whose time of day covers `edge`. An edge at 24:00 is the
/// midnight of the following day.
fn crosses_time_of_day(edge: f64, t: f64, dt: f64) -> bool {
    let edge = edge.rem_euclid(SECONDS_PER_DAY);
    let day_time = t.rem_euclid(SECONDS_PER_DAY);
    edge <= day_time && day_time < edge + dt
}

impl Venue {
    /// `start` and `stop` are hours of the day.
    #[must_use]
    pub fn new(zone: ZoneId, start: f64, stop: f64, conscripts: usize, civilians: usize) -> Venue {
        Venue {
            zone,
            opens_at: start * SECONDS_PER_HOUR,
            closes_at: stop * SECONDS_PER_HOUR,
            conscripts,
            civilians,
            queue: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn is_opening(&self, t: f64, dt: f64) -> bool {
        crosses_time_of_day(self.opens_at, t, dt)
    }

    #[must_use]
    pub fn is_closing(&self, t: f64, dt: f64) -> bool {
        crosses_time_of_day(self.closes_at, t, dt)
    }

    #[must_use]
    pub fn queue(&self) -> &VecDeque<QueueEntry> {
        &self.queue
    }

    /// Decides arrivals and departures for the tick at `t`.
    ///
    /// On-duty teams are duty teams assigned to their home zone; every other team with members
    /// forms the second pool. Draws pick a uniform team, then a uniform member, with
    /// replacement. Origins are read before anyone moves.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        t: f64,
        dt: f64,
        teams: &[Team],
        agents: &[MobileAgent],
        zones: &ZoneRegistry,
        rng: &mut R,
    ) -> VenuePlan {
        let mut plan = VenuePlan::default();
        if self.is_opening(t, dt) {
            let (on_duty, others): (Vec<&Team>, Vec<&Team>) = teams
                .iter()
                .filter(|team| !team.members.is_empty())
                .partition(|team| team.is_on_duty());
            for (pool, draws) in [(&on_duty, self.conscripts), (&others, self.civilians)] {
                if pool.is_empty() {
                    continue;
                }
                for _ in 0..draws {
                    let Some(team) = pool.choose(rng) else {
                        break;
                    };
                    let Some(&agent) = team.members.choose(rng) else {
                        continue;
                    };
                    let entry = QueueEntry {
                        agent,
                        origin: agents[agent].zone,
                    };
                    plan.admissions
                        .push((entry, zones.get(self.zone).random_point(rng)));
                }
            }
            debug!("venue opens at t={t} with {} arrivals", plan.admissions.len());
        }
        if self.is_closing(t, dt) {
            plan.closing = true;
            let leaving = self
                .queue
                .iter()
                .chain(plan.admissions.iter().map(|(entry, _)| entry));
            plan.releases = leaving
                .map(|entry| zones.get(entry.origin).random_point(rng))
                .collect();
        }
        plan
    }

    /// Queues the admissions and, when closing, drains the queue. Returns the moves to apply in
    /// order: arrivals first, then departures in FIFO order.
    pub fn apply(&mut self, plan: VenuePlan) -> Vec<Relocation> {
        let mut moves = Vec::with_capacity(plan.admissions.len() + plan.releases.len());
        for (entry, point) in plan.admissions {
            self.queue.push_back(entry);
            moves.push(Relocation {
                agent: entry.agent,
                zone: self.zone,
                point,
            });
        }
        if plan.closing {
            debug!("venue closes, releasing {} agents", self.queue.len());
            let mut points = plan.releases.into_iter();
            while let Some(entry) = self.queue.pop_front() {
                let Some(point) = points.next() else {
                    break;
                };
                moves.push(Relocation {
                    agent: entry.agent,
                    zone: entry.origin,
                    point,
                });
            }
        }
        moves
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duty::DutyCycle;
    use crate::zone::Zone;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    struct Fixture {
        zones: ZoneRegistry,
        home: ZoneId,
        open: ZoneId,
        venue_zone: ZoneId,
        teams: Vec<Team>,
        agents: Vec<MobileAgent>,
    }

    fn fixture() -> Fixture {
        let mut zones = ZoneRegistry::new();
        let home = zones
            .add(Zone::new("company", 10.0, 10.0, 0.0, 10.0).unwrap())
            .unwrap();
        let open = zones
            .add(Zone::new("civilian", 10.0, 10.0, 20.0, 10.0).unwrap())
            .unwrap();
        let venue_zone = zones
            .add(Zone::new("sotilaskoti", 5.0, 5.0, 12.0, 10.0).unwrap())
            .unwrap();
        let teams = vec![
            Team::new(
                "company".to_string(),
                vec![0, 1, 2],
                Some(DutyCycle::from_days(1.0, 1.0, 0.0)),
                home,
            ),
            Team::new("civilian".to_string(), vec![3, 4], None, open),
        ];
        let agents = (0..5)
            .map(|id| MobileAgent {
                id,
                x: 1.0,
                y: 1.0,
                dx: 0.0,
                dy: 0.0,
                zone: if id < 3 { home } else { open },
                conscripted: id < 3,
                highlighted: false,
            })
            .collect();
        Fixture {
            zones,
            home,
            open,
            venue_zone,
            teams,
            agents,
        }
    }

    #[test]
    fn opening_and_closing_edges() {
        let venue = Venue::new(ZoneId(0), 18.0, 21.0, 1, 1);
        assert!(venue.is_opening(18.0 * 3600.0, 60.0));
        assert!(venue.is_opening(SECONDS_PER_DAY + 18.0 * 3600.0 + 59.0, 60.0));
        assert!(!venue.is_opening(18.0 * 3600.0 + 60.0, 60.0));
        assert!(venue.is_closing(2.0 * SECONDS_PER_DAY + 21.0 * 3600.0, 60.0));
        assert!(!venue.is_closing(20.0 * 3600.0, 60.0));
    }

    #[test]
    fn draws_from_both_pools_and_records_origin() {
        let fixture = fixture();
        let mut venue = Venue::new(fixture.venue_zone, 18.0, 21.0, 4, 3);
        let mut rng = SmallRng::seed_from_u64(8);
        let plan = venue.plan(
            18.0 * 3600.0,
            60.0,
            &fixture.teams,
            &fixture.agents,
            &fixture.zones,
            &mut rng,
        );
        assert_eq!(plan.admissions.len(), 7);
        assert!(!plan.closing);
        for (entry, _) in &plan.admissions[..4] {
            assert!(entry.agent < 3);
            assert_eq!(entry.origin, fixture.home);
        }
        for (entry, _) in &plan.admissions[4..] {
            assert!(entry.agent >= 3);
            assert_eq!(entry.origin, fixture.open);
        }
        let moves = venue.apply(plan);
        assert_eq!(moves.len(), 7);
        assert!(moves.iter().all(|m| m.zone == fixture.venue_zone));
        assert_eq!(venue.queue().len(), 7);
    }

    #[test]
    fn team_on_leave_counts_as_off_duty() {
        let mut fixture = fixture();
        fixture.teams[0].current_zone = fixture.open;
        let venue = Venue::new(fixture.venue_zone, 18.0, 21.0, 5, 5);
        let mut rng = SmallRng::seed_from_u64(9);
        let plan = venue.plan(
            18.0 * 3600.0,
            60.0,
            &fixture.teams,
            &fixture.agents,
            &fixture.zones,
            &mut rng,
        );
        // No on-duty pool, so only the five draws from the other teams happen.
        assert_eq!(plan.admissions.len(), 5);
    }

    #[test]
    fn queue_persists_until_closing_and_drains_fifo() {
        let fixture = fixture();
        let mut venue = Venue::new(fixture.venue_zone, 18.0, 21.0, 2, 1);
        let mut rng = SmallRng::seed_from_u64(10);
        let opening = venue.plan(
            18.0 * 3600.0,
            60.0,
            &fixture.teams,
            &fixture.agents,
            &fixture.zones,
            &mut rng,
        );
        let arrivals: Vec<QueueEntry> = opening.admissions.iter().map(|(e, _)| *e).collect();
        venue.apply(opening);

        let idle = venue.plan(
            19.0 * 3600.0,
            60.0,
            &fixture.teams,
            &fixture.agents,
            &fixture.zones,
            &mut rng,
        );
        assert_eq!(idle, VenuePlan::default());
        assert!(venue.apply(idle).is_empty());
        assert_eq!(venue.queue().len(), 3);

        let closing = venue.plan(
            21.0 * 3600.0,
            60.0,
            &fixture.teams,
            &fixture.agents,
            &fixture.zones,
            &mut rng,
        );
        let moves = venue.apply(closing);
        let departures: Vec<(usize, ZoneId)> = moves.iter().map(|m| (m.agent, m.zone)).collect();
        let expected: Vec<(usize, ZoneId)> = arrivals.iter().map(|e| (e.agent, e.origin)).collect();
        assert_eq!(departures, expected);
        assert!(venue.queue().is_empty());
    }

    #[test]
    fn midnight_closing_fires_at_the_day_boundary() {
        let venue = Venue::new(ZoneId(0), 18.0, 24.0, 1, 1);
        assert!(venue.is_closing(SECONDS_PER_DAY, 60.0));
        assert!(venue.is_closing(2.0 * SECONDS_PER_DAY + 59.0, 60.0));
        assert!(!venue.is_closing(SECONDS_PER_DAY - 60.0, 60.0));
    }

    #[test]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn queue_empties_every_night_when_closing_at_midnight() {
        let fixture = fixture();
        let mut venue = Venue::new(fixture.venue_zone, 18.0, 24.0, 2, 0);
        let mut rng = SmallRng::seed_from_u64(11);
        let dt = 60.0;
        let mut releases = 0;
        for tick in 0..(3.0 * SECONDS_PER_DAY / dt) as usize {
            let t = tick as f64 * dt;
            let plan = venue.plan(
                t,
                dt,
                &fixture.teams,
                &fixture.agents,
                &fixture.zones,
                &mut rng,
            );
            releases += usize::from(plan.closing && !plan.releases.is_empty());
            venue.apply(plan);
            assert!(venue.queue().len() <= 2, "queue grew to {}", venue.queue().len());
        }
        // Closed after the first two evenings; the third is still open at the end.
        assert_eq!(releases, 2);
        assert_eq!(venue.queue().len(), 2);
    }
}
