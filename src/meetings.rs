//! Proximity detection over the x-ordered index and rising-edge tracking of contacts.
use indexmap::IndexMap;
use log::trace;

use crate::hashing::HashSet;
use crate::mobility::MobileAgent;
use crate::position_index::OrderedPositionIndex;
use crate::zone::ZoneId;

/// An unordered pair of agent ids, stored with the lower id first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeetingPair(usize, usize);

impl MeetingPair {
    #[must_use]
    pub fn new(a: usize, b: usize) -> MeetingPair {
        if a <= b {
            MeetingPair(a, b)
        } else {
            MeetingPair(b, a)
        }
    }

    #[must_use]
    pub fn low(&self) -> usize {
        self.0
    }

    #[must_use]
    pub fn high(&self) -> usize {
        self.1
    }
}

/// Every pair within the contact radius at one tick, in detection order, with the zone of the
/// later agent in x order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProximitySnapshot {
    pairs: IndexMap<MeetingPair, ZoneId>,
}

impl ProximitySnapshot {
    #[must_use]
    pub fn new() -> ProximitySnapshot {
        ProximitySnapshot::default()
    }

    pub fn insert(&mut self, pair: MeetingPair, place: ZoneId) {
        self.pairs.insert(pair, place);
    }

    #[must_use]
    pub fn contains(&self, pair: &MeetingPair) -> bool {
        self.pairs.contains_key(pair)
    }

    #[must_use]
    pub fn place(&self, pair: &MeetingPair) -> Option<ZoneId> {
        self.pairs.get(pair).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeetingPair, ZoneId)> + '_ {
        self.pairs.iter().map(|(pair, place)| (*pair, *place))
    }

    /// Ids of all agents with at least one neighbour.
    #[must_use]
    pub fn participants(&self) -> HashSet<usize> {
        self.pairs
            .keys()
            .flat_map(|pair| [pair.low(), pair.high()])
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Scans each agent backwards through the index while the x-gap stays below `radius` and
/// records every candidate whose distance is strictly below `radius`.
#[must_use]
pub fn detect_meetings(
    index: &OrderedPositionIndex,
    agents: &[MobileAgent],
    radius: f64,
) -> ProximitySnapshot {
    let order = index.as_slice();
    let mut snapshot = ProximitySnapshot::new();
    for (position, &anchor_id) in order.iter().enumerate() {
        let anchor = &agents[anchor_id];
        for &candidate_id in order[..position].iter().rev() {
            let candidate = &agents[candidate_id];
            let gap_x = anchor.x - candidate.x;
            if gap_x >= radius {
                break;
            }
            let gap_y = anchor.y - candidate.y;
            if gap_x.hypot(gap_y) < radius {
                snapshot.insert(MeetingPair::new(anchor_id, candidate_id), anchor.zone);
            }
        }
    }
    snapshot
}

/// Remembers the previous snapshot and reports only pairs that just came within range.
#[derive(Debug, Default)]
pub struct MeetingTracker {
    previous: ProximitySnapshot,
}

impl MeetingTracker {
    #[must_use]
    pub fn new() -> MeetingTracker {
        MeetingTracker::default()
    }

    /// Returns the pairs of `current` absent from the previous snapshot, in detection order,
    /// and makes `current` the new reference.
    pub fn advance(&mut self, current: ProximitySnapshot) -> Vec<(MeetingPair, ZoneId)> {
        let new_pairs: Vec<(MeetingPair, ZoneId)> = current
            .iter()
            .filter(|(pair, _)| !self.previous.contains(pair))
            .collect();
        trace!(
            "{} pairs in range, {} new",
            current.len(),
            new_pairs.len()
        );
        self.previous = current;
        new_pairs
    }

    #[must_use]
    pub fn previous(&self) -> &ProximitySnapshot {
        &self.previous
    }
}
