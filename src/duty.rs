//! Teams and duty rotation. Conscript teams alternate between their home zone and the open zone;
//! civilian teams have no duty cycle and are never moved.
use log::debug;
use rand::Rng;

use crate::parameters::SECONDS_PER_DAY;
use crate::zone::{ZoneId, ZoneRegistry};

/// Serving and leave periods with a phase shift, all in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyCycle {
    pub on: f64,
    pub off: f64,
    pub offset: f64,
}

impl DutyCycle {
    #[must_use]
    pub fn from_days(on: f64, off: f64, offset: f64) -> DutyCycle {
        DutyCycle {
            on: on * SECONDS_PER_DAY,
            off: off * SECONDS_PER_DAY,
            offset: offset * SECONDS_PER_DAY,
        }
    }

    /// Position of `t` inside the team's own cycle.
    #[must_use]
    pub fn subjective_time(&self, t: f64) -> f64 {
        (t + self.offset).rem_euclid(self.on + self.off)
    }

    #[must_use]
    pub fn is_serving(&self, t: f64) -> bool {
        self.subjective_time(t) < self.on
    }

    /// True on the tick where the serving period begins.
    #[must_use]
    pub fn starts_serving(&self, t: f64, dt: f64) -> bool {
        self.subjective_time(t) < dt
    }

    /// True on the tick where the leave period begins.
    #[must_use]
    pub fn starts_leave(&self, t: f64, dt: f64) -> bool {
        let st = self.subjective_time(t);
        self.on <= st && st < self.on + dt
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub name: String,
    pub members: Vec<usize>,
    pub duty: Option<DutyCycle>,
    pub home_zone: ZoneId,
    pub current_zone: ZoneId,
}

impl Team {
    #[must_use]
    pub fn new(
        name: String,
        members: Vec<usize>,
        duty: Option<DutyCycle>,
        home_zone: ZoneId,
    ) -> Team {
        Team {
            name,
            members,
            duty,
            home_zone,
            current_zone: home_zone,
        }
    }

    /// A duty team currently assigned to its home zone.
    #[must_use]
    pub fn is_on_duty(&self) -> bool {
        self.duty.is_some() && self.current_zone == self.home_zone
    }
}

/// One agent moved to a point inside a zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relocation {
    pub agent: usize,
    pub zone: ZoneId,
    pub point: (f64, f64),
}

/// Zone changes decided for one tick, applied after all random draws are made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotationPlan {
    pub team_zones: Vec<(usize, ZoneId)>,
    pub relocations: Vec<Relocation>,
}

impl RotationPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.team_zones.is_empty() && self.relocations.is_empty()
    }
}

fn relocate_all<R: Rng + ?Sized>(
    team: &Team,
    zone: ZoneId,
    zones: &ZoneRegistry,
    plan: &mut RotationPlan,
    rng: &mut R,
) {
    for &agent in &team.members {
        plan.relocations.push(Relocation {
            agent,
            zone,
            point: zones.get(zone).random_point(rng),
        });
    }
}

/// Decides the rotation for the tick at `t`.
///
/// At `t == 0` every duty team is placed straight into the zone of its current sub-period. Later
/// ticks act only on edges: entering service brings every member home, entering leave sends the
/// team to `open_zone` and each member goes unless its own draw with `stay_chance` keeps it home.
/// When both edges fall on one tick (a zero-length serving period) leave wins.
pub fn plan_rotation<R: Rng + ?Sized>(
    teams: &[Team],
    zones: &ZoneRegistry,
    open_zone: ZoneId,
    t: f64,
    dt: f64,
    stay_chance: f64,
    rng: &mut R,
) -> RotationPlan {
    let mut plan = RotationPlan::default();
    for (team_index, team) in teams.iter().enumerate() {
        let Some(duty) = team.duty else {
            continue;
        };
        if t == 0.0 {
            let zone = if duty.is_serving(t) {
                team.home_zone
            } else {
                open_zone
            };
            plan.team_zones.push((team_index, zone));
            relocate_all(team, zone, zones, &mut plan, rng);
        } else if duty.starts_leave(t, dt) {
            debug!("team {} goes on leave at t={t}", team.name);
            plan.team_zones.push((team_index, open_zone));
            for &agent in &team.members {
                if rng.random_bool(stay_chance) {
                    continue;
                }
                plan.relocations.push(Relocation {
                    agent,
                    zone: open_zone,
                    point: zones.get(open_zone).random_point(rng),
                });
            }
        } else if duty.starts_serving(t, dt) {
            debug!("team {} starts serving at t={t}", team.name);
            plan.team_zones.push((team_index, team.home_zone));
            relocate_all(team, team.home_zone, zones, &mut plan, rng);
        }
    }
    plan
}
