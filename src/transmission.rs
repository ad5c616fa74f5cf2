//! Pairwise exchange of infection probability when two agents meet.
use log::trace;

use crate::error::EpiError;
use crate::infection::{Infection, Stage};
use crate::parameters::PopulationValues;

/// Allowed rounding slack on the healthy probability.
const HEALTHY_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct InfectionAgent {
    pub id: usize,
    pub conscripted: bool,
    /// Share of detected meetings that never turn into contact.
    pub meeting_dropout: f64,
    /// Total probability dispatched to others.
    pub transmitted: f64,
    pub meetings: usize,
    pub infection: Infection,
}

/// Probability that the protection fails: nobody applies it, or it is applied and leaks.
fn leak(probability: f64, effectiveness: f64) -> f64 {
    (1.0 - probability) + probability * (1.0 - effectiveness)
}

impl Infection {
    /// Infection probability this agent sends to a contact, before the contact's own protection.
    #[must_use]
    pub fn dispatched_probability(&self) -> f64 {
        let totals = self.stage_totals();
        let mask = leak(self.mask_probability(), self.mask_effectiveness.wearer);
        let quarantine_exposed = leak(self.quarantine.on_exposure, self.quarantine.effectiveness);
        let quarantine_symptoms = leak(self.quarantine.on_symptoms, self.quarantine.effectiveness);
        let rates = self.transmissibility;

        let from_incubating = totals.incubating * rates.incubating * mask * quarantine_exposed;
        let from_pre_symptomatic =
            totals.pre_symptomatic * rates.pre_symptomatic * mask * quarantine_exposed;
        let from_asymptomatic = totals.acute
            * self.asymptomatic_fraction
            * rates.asymptomatic
            * mask
            * quarantine_exposed;
        let from_symptomatic = totals.acute
            * (1.0 - self.asymptomatic_fraction)
            * rates.symptomatic
            * quarantine_symptoms;
        from_incubating + from_pre_symptomatic + from_asymptomatic + from_symptomatic
    }

    /// Share of incoming probability that passes this agent's own mask.
    #[must_use]
    pub fn reception_modifier(&self) -> f64 {
        leak(self.mask_probability(), self.mask_effectiveness.recipient)
    }
}

impl InfectionAgent {
    /// Adds the share of `dispatched` that reaches this agent to its incubating stage at `now`
    /// and returns that share.
    ///
    /// # Errors
    ///
    /// Returns `EpiError::InvariantViolation` if the agent's healthy probability is outside
    /// `[0, 1]` by more than the rounding tolerance.
    pub fn receive(&mut self, now: f64, dispatched: f64) -> Result<f64, EpiError> {
        let healthy = self.infection.healthy_probability();
        if !(-HEALTHY_TOLERANCE..1.0 + HEALTHY_TOLERANCE).contains(&healthy) {
            return Err(EpiError::InvariantViolation {
                time: now,
                agent: self.id,
                detail: format!("healthy probability {healthy} is outside [0, 1]"),
            });
        }
        let received = dispatched * healthy * self.infection.reception_modifier();
        self.infection.inject(Stage::Incubating, now, received);
        Ok(received)
    }

    /// Mask use of conscripts depends on where they are; civilians keep theirs.
    pub fn update_mask(&mut self, coverage: &PopulationValues, civilian_place: bool) {
        if self.conscripted {
            self.infection
                .set_mask_probability(coverage.for_population(!civilian_place));
        }
    }
}

/// Processes one meeting between `a` and `b` at `now`: mask refresh, aging, then both transfers
/// computed from the state before either is applied.
///
/// # Errors
///
/// Propagates the `InvariantViolation` of either reception.
pub fn process_meeting(
    now: f64,
    a: &mut InfectionAgent,
    b: &mut InfectionAgent,
    coverage: &PopulationValues,
    civilian_place: bool,
) -> Result<(), EpiError> {
    for agent in [&mut *a, &mut *b] {
        agent.update_mask(coverage, civilian_place);
        agent.infection.age(now);
    }
    let from_a = a.infection.dispatched_probability();
    let from_b = b.infection.dispatched_probability();
    let into_b = b.receive(now, from_a)?;
    let into_a = a.receive(now, from_b)?;
    trace!(
        "t={now}: {} -> {} sent {from_a} received {into_b}; {} -> {} sent {from_b} received {into_a}",
        a.id,
        b.id,
        b.id,
        a.id
    );
    a.transmitted += from_a;
    b.transmitted += from_b;
    a.meetings += 1;
    b.meetings += 1;
    Ok(())
}

/// Mutable references to two distinct elements.
///
/// # Panics
///
/// Panics if `i == j` or either index is out of bounds.
pub fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    assert_ne!(i, j, "a meeting needs two distinct agents");
    if i < j {
        let (left, right) = items.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infection::{MaskEffectiveness, QuarantinePolicy, StageDurations, Transmissibility};
    use assert_approx_eq::assert_approx_eq;

    const DAY: f64 = 86_400.0;

    fn agent(id: usize, conscripted: bool) -> InfectionAgent {
        InfectionAgent {
            id,
            conscripted,
            meeting_dropout: 0.0,
            transmitted: 0.0,
            meetings: 0,
            infection: Infection::new(
                StageDurations {
                    incubating: 3.0 * DAY,
                    pre_symptomatic: 2.0 * DAY,
                    acute: 7.0 * DAY,
                },
                Transmissibility {
                    incubating: 0.05,
                    pre_symptomatic: 0.1,
                    symptomatic: 0.3,
                    asymptomatic: 0.2,
                },
                0.4,
                0.0,
                QuarantinePolicy::NONE,
                MaskEffectiveness {
                    wearer: 0.5,
                    recipient: 0.25,
                },
            ),
        }
    }

    #[test]
    fn no_attenuation_reduces_to_weighted_sum() {
        let mut sender = agent(0, true);
        sender.infection.inject(Stage::Incubating, 0.0, 0.1);
        sender.infection.inject(Stage::PreSymptomatic, 0.0, 0.2);
        sender.infection.inject(Stage::Acute, 0.0, 0.3);
        let expected = 0.1 * 0.05 + 0.2 * 0.1 + 0.3 * 0.4 * 0.2 + 0.3 * 0.6 * 0.3;
        assert_approx_eq!(sender.infection.dispatched_probability(), expected);
    }

    #[test]
    fn masks_and_quarantine_attenuate() {
        let mut sender = agent(0, true);
        sender.infection.set_mask_probability(0.5);
        sender.infection.quarantine = QuarantinePolicy {
            on_exposure: 0.2,
            on_symptoms: 0.8,
            effectiveness: 0.9,
        };
        sender.infection.inject(Stage::Incubating, 0.0, 0.1);
        sender.infection.inject(Stage::Acute, 0.0, 0.3);
        let mask = 0.5 + 0.5 * 0.5;
        let exposed = 0.8 + 0.2 * 0.1;
        let symptoms = 0.2 + 0.8 * 0.1;
        let expected = 0.1 * 0.05 * mask * exposed
            + 0.3 * 0.4 * 0.2 * mask * exposed
            + 0.3 * 0.6 * 0.3 * symptoms;
        assert_approx_eq!(sender.infection.dispatched_probability(), expected);
    }

    #[test]
    fn reception_scales_by_healthy_and_mask() {
        let mut receiver = agent(1, false);
        receiver.infection.inject(Stage::Immune, 0.0, 0.5);
        receiver.infection.set_mask_probability(1.0);
        let received = receiver.receive(100.0, 0.2).unwrap();
        assert_approx_eq!(received, 0.2 * 0.5 * 0.75);
        assert_approx_eq!(
            receiver.infection.ledger(Stage::Incubating).get(100.0).unwrap(),
            received
        );
    }

    #[test]
    fn overfull_state_is_an_invariant_violation() {
        let mut receiver = agent(4, false);
        receiver.infection.inject(Stage::Acute, 0.0, 0.7);
        receiver.infection.inject(Stage::Immune, 0.0, 0.5);
        let error = receiver.receive(42.0, 0.1).unwrap_err();
        assert!(matches!(
            error,
            EpiError::InvariantViolation { agent: 4, time, .. } if time == 42.0
        ));
    }

    #[test]
    fn meeting_uses_pre_transfer_state_both_ways() {
        let mut a = agent(0, false);
        let mut b = agent(1, false);
        a.infection.inject(Stage::Incubating, 0.0, 0.5);
        let coverage = PopulationValues {
            military: 0.0,
            civilian: 0.0,
        };
        process_meeting(10.0, &mut a, &mut b, &coverage, true).unwrap();

        let from_a = 0.5 * 0.05;
        assert_approx_eq!(a.transmitted, from_a);
        assert_approx_eq!(b.transmitted, 0.0);
        assert_approx_eq!(b.infection.stage_totals().incubating, from_a);
        // b had nothing when dispatches were computed, so a received nothing back. Applying the
        // transfers one after the other would instead let b pass on part of what it just got.
        assert_eq!(a.infection.ledger(Stage::Incubating).get(10.0), Some(0.0));
        assert_eq!((a.meetings, b.meetings), (1, 1));
    }

    #[test]
    fn conscript_mask_follows_place() {
        let coverage = PopulationValues {
            military: 0.9,
            civilian: 0.1,
        };
        let mut conscript = agent(0, true);
        let mut civilian = agent(1, false);
        civilian.infection.set_mask_probability(0.3);

        process_meeting(0.0, &mut conscript, &mut civilian, &coverage, true).unwrap();
        assert_approx_eq!(conscript.infection.mask_probability(), 0.1);
        assert_approx_eq!(civilian.infection.mask_probability(), 0.3);

        process_meeting(1.0, &mut conscript, &mut civilian, &coverage, false).unwrap();
        assert_approx_eq!(conscript.infection.mask_probability(), 0.9);
        assert_approx_eq!(civilian.infection.mask_probability(), 0.3);
    }

    #[test]
    fn pair_mut_returns_requested_order() {
        let mut values = vec![10, 20, 30];
        let (x, y) = pair_mut(&mut values, 2, 0);
        assert_eq!((*x, *y), (30, 10));
        let (x, y) = pair_mut(&mut values, 0, 1);
        *x += 1;
        *y += 1;
        assert_eq!(values, vec![11, 21, 30]);
    }
}
