//! Agent ids ordered by ascending x. Agents move by at most one small step per tick, so the
//! order is restored with an insertion pass instead of a full sort.
use crate::mobility::MobileAgent;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedPositionIndex {
    order: Vec<usize>,
}

impl OrderedPositionIndex {
    /// Full stable sort of all agents by x.
    #[must_use]
    pub fn new(agents: &[MobileAgent]) -> OrderedPositionIndex {
        let mut order: Vec<usize> = (0..agents.len()).collect();
        order.sort_by(|&a, &b| agents[a].x.total_cmp(&agents[b].x));
        OrderedPositionIndex { order }
    }

    /// Restores ascending x order after agents moved. Each out-of-place id is walked back past
    /// its larger-x neighbours; ties keep their relative order.
    pub fn refresh(&mut self, agents: &[MobileAgent]) {
        for i in 1..self.order.len() {
            let mut j = i;
            while j > 0 && agents[self.order[j - 1]].x > agents[self.order[j]].x {
                self.order.swap(j - 1, j);
                j -= 1;
            }
        }
    }

    #[must_use]
    pub fn is_sorted(&self, agents: &[MobileAgent]) -> bool {
        self.order
            .windows(2)
            .all(|pair| agents[pair[0]].x <= agents[pair[1]].x)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mobility::Velocity;
    use crate::zone::{Zone, ZoneId};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn agents_at(xs: &[f64]) -> Vec<MobileAgent> {
        xs.iter()
            .enumerate()
            .map(|(id, &x)| MobileAgent {
                id,
                x,
                y: 0.0,
                dx: 0.0,
                dy: 0.0,
                zone: ZoneId(0),
                conscripted: false,
                highlighted: false,
            })
            .collect()
    }

    fn full_sort(agents: &[MobileAgent]) -> Vec<usize> {
        let mut ids: Vec<usize> = (0..agents.len()).collect();
        ids.sort_by(|&a, &b| agents[a].x.total_cmp(&agents[b].x));
        ids
    }

    #[test]
    fn initial_sort() {
        let agents = agents_at(&[3.0, 1.0, 2.0, 0.5]);
        let index = OrderedPositionIndex::new(&agents);
        assert_eq!(index.as_slice(), &[3, 1, 2, 0]);
        assert!(index.is_sorted(&agents));
    }

    #[test]
    fn refresh_after_local_swap() {
        let mut agents = agents_at(&[0.0, 1.0, 2.0, 3.0]);
        let mut index = OrderedPositionIndex::new(&agents);
        agents[1].x = 2.5;
        agents[3].x = 0.5;
        index.refresh(&agents);
        assert_eq!(index.as_slice(), &[0, 3, 2, 1]);
    }

    #[test]
    fn refresh_keeps_ties_stable() {
        let mut agents = agents_at(&[0.0, 1.0, 2.0]);
        let mut index = OrderedPositionIndex::new(&agents);
        agents[2].x = 1.0;
        index.refresh(&agents);
        assert_eq!(index.as_slice(), &[0, 1, 2]);
        agents[0].x = 1.0;
        index.refresh(&agents);
        assert_eq!(index.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn incremental_matches_full_sort_over_many_ticks() {
        let zone = Zone::new("field", 200.0, 200.0, 0.0, 200.0).unwrap();
        let velocity = Velocity::new(5000.0, 0.5, 1440.0).unwrap();
        let mut rng = SmallRng::seed_from_u64(17);
        let mut agents: Vec<MobileAgent> = (0..300)
            .map(|id| MobileAgent::spawn(id, ZoneId(0), &zone, &velocity, false, &mut rng))
            .collect();
        let mut index = OrderedPositionIndex::new(&agents);
        for _ in 0..200 {
            for agent in &mut agents {
                agent.step(&zone);
            }
            index.refresh(&agents);
            assert!(index.is_sorted(&agents));
            let expected: Vec<f64> = full_sort(&agents).iter().map(|&id| agents[id].x).collect();
            let actual: Vec<f64> = index.iter().map(|id| agents[id].x).collect();
            assert_eq!(actual, expected);
        }
        assert_eq!(index.len(), 300);
    }
}
