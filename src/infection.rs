//! Per-agent disease state. The state is not a compartment: each stage holds probability mass
//! split into parts keyed by the time the part entered the stage, and parts mature into the next
//! stage once they have spent the agent's stage duration there.
use indexmap::IndexMap;
use log::trace;
use ordered_float::OrderedFloat;
use rand::Rng;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Incubating,
    PreSymptomatic,
    Acute,
    Immune,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Incubating,
        Stage::PreSymptomatic,
        Stage::Acute,
        Stage::Immune,
    ];

    fn index(self) -> usize {
        match self {
            Stage::Incubating => 0,
            Stage::PreSymptomatic => 1,
            Stage::Acute => 2,
            Stage::Immune => 3,
        }
    }
}

/// Probability mass per entry timestamp, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MassLedger {
    parts: IndexMap<OrderedFloat<f64>, f64>,
}

impl MassLedger {
    #[must_use]
    pub fn new() -> MassLedger {
        MassLedger::default()
    }

    /// Adds `mass` at `timestamp`, accumulating into an existing part with the same key.
    pub fn inject(&mut self, timestamp: f64, mass: f64) {
        *self.parts.entry(OrderedFloat(timestamp)).or_insert(0.0) += mass;
    }

    pub fn remove(&mut self, timestamp: f64) -> Option<f64> {
        self.parts.shift_remove(&OrderedFloat(timestamp))
    }

    #[must_use]
    pub fn get(&self, timestamp: f64) -> Option<f64> {
        self.parts.get(&OrderedFloat(timestamp)).copied()
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.parts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.parts.iter().map(|(timestamp, mass)| (timestamp.0, *mass))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Entry times of parts that have outlived `duration` at `now`.
    fn matured(&self, now: f64, duration: f64) -> Vec<f64> {
        self.parts
            .keys()
            .map(|timestamp| timestamp.0)
            .filter(|&timestamp| now > timestamp + duration)
            .collect()
    }
}

/// Stage durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageDurations {
    pub incubating: f64,
    pub pre_symptomatic: f64,
    pub acute: f64,
}

/// Base transmissibility of each infectious form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transmissibility {
    pub incubating: f64,
    pub pre_symptomatic: f64,
    pub symptomatic: f64,
    pub asymptomatic: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuarantinePolicy {
    pub on_exposure: f64,
    pub on_symptoms: f64,
    pub effectiveness: f64,
}

impl QuarantinePolicy {
    pub const NONE: QuarantinePolicy = QuarantinePolicy {
        on_exposure: 0.0,
        on_symptoms: 0.0,
        effectiveness: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskEffectiveness {
    pub wearer: f64,
    pub recipient: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTotals {
    pub incubating: f64,
    pub pre_symptomatic: f64,
    pub acute: f64,
    pub immune: f64,
}

impl StageTotals {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.incubating + self.pre_symptomatic + self.acute + self.immune
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Infection {
    pub durations: StageDurations,
    pub transmissibility: Transmissibility,
    pub asymptomatic_fraction: f64,
    pub quarantine: QuarantinePolicy,
    pub mask_effectiveness: MaskEffectiveness,
    mask_probability: f64,
    ledgers: [MassLedger; 4],
}

impl Infection {
    #[must_use]
    pub fn new(
        durations: StageDurations,
        transmissibility: Transmissibility,
        asymptomatic_fraction: f64,
        mask_probability: f64,
        quarantine: QuarantinePolicy,
        mask_effectiveness: MaskEffectiveness,
    ) -> Infection {
        Infection {
            durations,
            transmissibility,
            asymptomatic_fraction,
            quarantine,
            mask_effectiveness,
            mask_probability,
            ledgers: Default::default(),
        }
    }

    #[must_use]
    pub fn ledger(&self, stage: Stage) -> &MassLedger {
        &self.ledgers[stage.index()]
    }

    pub fn inject(&mut self, stage: Stage, timestamp: f64, mass: f64) {
        self.ledgers[stage.index()].inject(timestamp, mass);
    }

    #[must_use]
    pub fn mask_probability(&self) -> f64 {
        self.mask_probability
    }

    pub fn set_mask_probability(&mut self, mask_probability: f64) {
        self.mask_probability = mask_probability;
    }

    fn promote(&mut self, from: Stage, to: Stage, duration: f64, now: f64) {
        for entered in self.ledgers[from.index()].matured(now, duration) {
            if let Some(mass) = self.ledgers[from.index()].remove(entered) {
                trace!("promoting {mass} from {from:?} to {to:?} at {}", entered + duration);
                self.ledgers[to.index()].inject(entered + duration, mass);
            }
        }
    }

    /// Moves every part that has outlived its stage at `now` into the next stage, keyed at the
    /// time it matured. Stages are processed incubating, then pre-symptomatic, then acute, so a
    /// part can cross several stages in one call.
    pub fn age(&mut self, now: f64) {
        let durations = self.durations;
        self.promote(Stage::Incubating, Stage::PreSymptomatic, durations.incubating, now);
        self.promote(Stage::PreSymptomatic, Stage::Acute, durations.pre_symptomatic, now);
        self.promote(Stage::Acute, Stage::Immune, durations.acute, now);
    }

    /// Backdates the initial infection. `fraction` goes into the acute stage at a uniform time in
    /// the last acute period, and a proportional incubating mass, capped so the total stays at
    /// most one, at a uniform time in the last incubation period.
    pub fn seed_initial<R: Rng + ?Sized>(&mut self, fraction: f64, rng: &mut R) {
        let incubating_fraction =
            (self.durations.incubating / self.durations.acute * fraction).min(1.0 - fraction);
        let incubating_at = -rng.random_range(0.0..=self.durations.incubating);
        let acute_at = -rng.random_range(0.0..=self.durations.acute);
        self.inject(Stage::Incubating, incubating_at, incubating_fraction);
        self.inject(Stage::Acute, acute_at, fraction);
    }

    #[must_use]
    pub fn stage_totals(&self) -> StageTotals {
        StageTotals {
            incubating: self.ledger(Stage::Incubating).total(),
            pre_symptomatic: self.ledger(Stage::PreSymptomatic).total(),
            acute: self.ledger(Stage::Acute).total(),
            immune: self.ledger(Stage::Immune).total(),
        }
    }

    /// Stage totals as they would be after aging to `t`, without changing the state.
    #[must_use]
    pub fn stage_totals_at(&self, t: f64) -> StageTotals {
        let mut aged = self.clone();
        aged.age(t);
        aged.stage_totals()
    }

    /// Complement of the total mass in all four stages.
    #[must_use]
    pub fn healthy_probability(&self) -> f64 {
        1.0 - self.stage_totals().total()
    }
}
