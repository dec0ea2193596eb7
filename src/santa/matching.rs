//! Local-search rounding of the hypergraph into a discrete allocation.
//!
//! # Algorithm
//!
//! 1. Greedy pass: each player takes its heaviest hyperedge whose items
//!    still have spare capacity.
//! 2. Augmentation: an unmatched player takes a free hyperedge if one
//!    exists; otherwise it takes a blocked hyperedge after displacing the
//!    blocking players, each of which must be re-matched along an
//!    alternating path of bounded length. Failed attempts roll back.
//! 3. If players remain unmatched, randomized restarts shuffle the player
//!    order and keep the best assignment.
//!
//! Every successful augmentation matches one more player without
//! unmatching anyone, so the loop ends after at most `n` improvements.
//!
//! # Reference
//!
//! Asadpour, Feige & Saberi (2012), "Santa Claus meets hypergraph
//! matchings", ACM Transactions on Algorithms 8(3).

use super::config::SantaConfig;
use super::hypergraph::Hypergraph;
use super::instance::Instance;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};

/// Discrete allocation: one item set per player.
///
/// # Examples
///
/// ```
/// use u_fairalloc::santa::{Allocation, Instance};
///
/// let inst = Instance::from_values(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
/// let mut alloc = Allocation::new(2);
/// alloc.assign(0, [0]);
/// alloc.assign(1, [1]);
/// assert!(alloc.respects_capacities(&inst));
/// assert_eq!(alloc.min_value(&inst), 1.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Allocation {
    bundles: Vec<BTreeSet<usize>>,
}

impl Allocation {
    /// Creates an allocation in which every player holds nothing.
    pub fn new(num_players: usize) -> Self {
        Self {
            bundles: vec![BTreeSet::new(); num_players],
        }
    }

    /// Adds `items` to player `p`'s bundle.
    pub fn assign(&mut self, p: usize, items: impl IntoIterator<Item = usize>) {
        self.bundles[p].extend(items);
    }

    pub fn num_players(&self) -> usize {
        self.bundles.len()
    }

    /// Items held by player `p`.
    pub fn bundle(&self, p: usize) -> &BTreeSet<usize> {
        &self.bundles[p]
    }

    /// Iterates over `(player, bundle)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &BTreeSet<usize>)> {
        self.bundles.iter().enumerate()
    }

    /// Value of player `p`'s bundle.
    pub fn value_of(&self, instance: &Instance, p: usize) -> f64 {
        instance.bundle_value(p, &self.bundles[p])
    }

    /// Smallest bundle value over all players (0 with no players).
    pub fn min_value(&self, instance: &Instance) -> f64 {
        if self.bundles.is_empty() {
            return 0.0;
        }
        (0..self.bundles.len())
            .map(|p| self.value_of(instance, p))
            .fold(f64::INFINITY, f64::min)
    }

    /// Number of players holding item `g`.
    pub fn holders(&self, g: usize) -> usize {
        self.bundles.iter().filter(|b| b.contains(&g)).count()
    }

    /// Whether no item exceeds its capacity and no player exceeds its own.
    pub fn respects_capacities(&self, instance: &Instance) -> bool {
        let players_ok = self
            .iter()
            .all(|(p, bundle)| bundle.len() <= instance.player_capacity(p));
        let items_ok =
            (0..instance.num_items()).all(|g| self.holders(g) <= instance.item_capacity(g));
        players_ok && items_ok
    }

    /// Converts to a `player name -> item names` map.
    pub fn to_named(&self, instance: &Instance) -> BTreeMap<String, BTreeSet<String>> {
        self.iter()
            .map(|(p, bundle)| {
                (
                    instance.player_name(p).to_string(),
                    bundle
                        .iter()
                        .map(|&g| instance.item_name(g).to_string())
                        .collect(),
                )
            })
            .collect()
    }
}

/// Result of the matcher.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchOutcome {
    pub allocation: Allocation,
    /// Players left with an empty bundle.
    pub unmatched: Vec<usize>,
    /// Index into `edges_of(p)` of the hyperedge chosen for each player.
    pub chosen: Vec<Option<usize>>,
}

impl MatchOutcome {
    /// Whether every player received a hyperedge.
    pub fn is_perfect(&self) -> bool {
        self.unmatched.is_empty()
    }
}

/// Finds a (near-)perfect hypergraph matching with default settings.
pub fn local_search_perfect_matching(graph: &Hypergraph) -> MatchOutcome {
    local_search_perfect_matching_with(graph, &SantaConfig::default())
}

/// Finds a (near-)perfect hypergraph matching using the augmenting depth,
/// restart count and seed from `config`.
///
/// Never fails: when no perfect matching is found the best partial one is
/// returned and the missing players are listed in
/// [`MatchOutcome::unmatched`].
pub fn local_search_perfect_matching_with(graph: &Hypergraph, config: &SantaConfig) -> MatchOutcome {
    let n = graph.num_players();
    let order: Vec<usize> = (0..n).collect();
    let mut best = local_search(graph, &order, config.max_augmenting_depth);

    if best.unmatched_count() > 0 && config.restarts > 0 {
        let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or(42));
        let mut shuffled = order;
        for restart in 0..config.restarts {
            shuffled.shuffle(&mut rng);
            let candidate = local_search(graph, &shuffled, config.max_augmenting_depth);
            if candidate.better_than(&best) {
                log::trace!(
                    "restart {restart}: {} unmatched",
                    candidate.unmatched_count()
                );
                best = candidate;
            }
            if best.unmatched_count() == 0 {
                break;
            }
        }
    }

    let outcome = best.into_outcome();
    if !outcome.is_perfect() {
        log::debug!("matching left {} players unmatched", outcome.unmatched.len());
    }
    outcome
}

fn local_search<'a>(graph: &'a Hypergraph, order: &[usize], depth: usize) -> MatchState<'a> {
    let mut state = MatchState::new(graph);

    for &p in order {
        if let Some(e) = (0..graph.edges_of(p).len()).find(|&e| state.is_free(p, e)) {
            state.take(p, e);
        }
    }

    loop {
        let mut improved = false;
        for &p in order {
            if state.assigned[p].is_some() || graph.edges_of(p).is_empty() {
                continue;
            }
            let mut visited = vec![false; graph.num_players()];
            if state.augment(p, depth, &mut visited) {
                improved = true;
            }
        }
        if !improved {
            break;
        }
    }
    state
}

#[derive(Clone)]
struct MatchState<'a> {
    graph: &'a Hypergraph,
    assigned: Vec<Option<usize>>,
    usage: Vec<usize>,
}

impl<'a> MatchState<'a> {
    fn new(graph: &'a Hypergraph) -> Self {
        Self {
            graph,
            assigned: vec![None; graph.num_players()],
            usage: vec![0; graph.num_items()],
        }
    }

    fn items(&self, p: usize, e: usize) -> &'a [usize] {
        self.graph.edges_of(p)[e].configuration.items()
    }

    fn is_free(&self, p: usize, e: usize) -> bool {
        self.items(p, e)
            .iter()
            .all(|&g| self.usage[g] < self.graph.item_capacity(g))
    }

    fn take(&mut self, p: usize, e: usize) {
        for &g in self.items(p, e) {
            self.usage[g] += 1;
        }
        self.assigned[p] = Some(e);
    }

    fn release(&mut self, p: usize) {
        if let Some(e) = self.assigned[p].take() {
            for &g in self.items(p, e) {
                self.usage[g] -= 1;
            }
        }
    }

    fn holds(&self, q: usize, g: usize) -> bool {
        self.assigned[q].is_some_and(|e| self.graph.edges_of(q)[e].configuration.contains(g))
    }

    /// Players to displace so that `p` can take edge `e`: one holder per
    /// saturated item. `None` if some saturated item is held only by
    /// visited players or has zero capacity.
    fn blockers(&self, p: usize, e: usize, visited: &[bool]) -> Option<Vec<usize>> {
        let mut out: Vec<usize> = Vec::new();
        for &g in self.items(p, e) {
            if self.usage[g] < self.graph.item_capacity(g) {
                continue;
            }
            if out.iter().any(|&q| self.holds(q, g)) {
                continue;
            }
            let q = (0..self.assigned.len()).find(|&q| q != p && !visited[q] && self.holds(q, g))?;
            out.push(q);
        }
        Some(out)
    }

    fn augment(&mut self, p: usize, depth: usize, visited: &mut [bool]) -> bool {
        visited[p] = true;
        let edges = self.graph.edges_of(p).len();

        if let Some(e) = (0..edges).find(|&e| self.is_free(p, e)) {
            self.take(p, e);
            return true;
        }
        if depth == 0 {
            return false;
        }

        for e in 0..edges {
            let Some(blockers) = self.blockers(p, e, visited) else {
                continue;
            };
            let assigned = self.assigned.clone();
            let usage = self.usage.clone();

            for &q in &blockers {
                self.release(q);
            }
            self.take(p, e);
            if blockers.iter().all(|&q| self.augment(q, depth - 1, visited)) {
                return true;
            }

            self.assigned = assigned;
            self.usage = usage;
        }
        false
    }

    fn unmatched_count(&self) -> usize {
        self.assigned.iter().filter(|a| a.is_none()).count()
    }

    fn min_matched_value(&self) -> f64 {
        self.assigned
            .iter()
            .enumerate()
            .filter_map(|(p, e)| e.map(|e| self.graph.edges_of(p)[e].value))
            .fold(f64::INFINITY, f64::min)
    }

    fn better_than(&self, other: &Self) -> bool {
        match self.unmatched_count().cmp(&other.unmatched_count()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => self.min_matched_value() > other.min_matched_value(),
        }
    }

    fn into_outcome(self) -> MatchOutcome {
        let mut allocation = Allocation::new(self.graph.num_players());
        let mut unmatched = Vec::new();
        for (p, e) in self.assigned.iter().enumerate() {
            match e {
                Some(e) => allocation.assign(p, self.items(p, *e).iter().copied()),
                None => unmatched.push(p),
            }
        }
        MatchOutcome {
            allocation,
            unmatched,
            chosen: self.assigned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::santa::configuration::Configuration;
    use crate::santa::hypergraph::Hyperedge;

    fn graph(num_items: usize, edges: &[(usize, &[usize], f64)], num_players: usize) -> Hypergraph {
        let mut g = Hypergraph::new(1.0, num_players, vec![1; num_items]);
        for &(player, items, weight) in edges {
            g.add_edge(Hyperedge {
                player,
                configuration: Configuration::new(items.to_vec()),
                weight,
                value: 1.0,
            });
        }
        g
    }

    fn assert_disjoint(outcome: &MatchOutcome, num_items: usize) {
        for g in 0..num_items {
            assert!(outcome.allocation.holders(g) <= 1, "item {g} allocated twice");
        }
    }

    #[test]
    fn test_disjoint_edges_matched_directly() {
        let h = graph(2, &[(0, &[0], 1.0), (1, &[1], 1.0)], 2);
        let outcome = local_search_perfect_matching(&h);
        assert!(outcome.is_perfect());
        assert_eq!(outcome.allocation.bundle(0), &BTreeSet::from([0]));
        assert_eq!(outcome.allocation.bundle(1), &BTreeSet::from([1]));
    }

    #[test]
    fn test_alternating_path_reassigns_blocker() {
        // Greedy gives item 0 to player 0 (its heavier edge); player 1 can
        // only use item 0, so player 0 must move to item 1.
        let h = graph(2, &[(0, &[0], 0.6), (0, &[1], 0.4), (1, &[0], 1.0)], 2);
        let config = SantaConfig::default().with_restarts(0);
        let outcome = local_search_perfect_matching_with(&h, &config);
        assert!(outcome.is_perfect());
        assert_eq!(outcome.allocation.bundle(0), &BTreeSet::from([1]));
        assert_eq!(outcome.allocation.bundle(1), &BTreeSet::from([0]));
    }

    #[test]
    fn test_depth_zero_cannot_reassign() {
        let h = graph(2, &[(0, &[0], 0.6), (0, &[1], 0.4), (1, &[0], 1.0)], 2);
        let config = SantaConfig::default()
            .with_max_augmenting_depth(0)
            .with_restarts(0);
        let outcome = local_search_perfect_matching_with(&h, &config);
        assert_eq!(outcome.unmatched, vec![1]);
    }

    #[test]
    fn test_longer_chain() {
        // p2 -> item 0 held by p0 -> item 1 held by p1 -> item 2 free
        let h = graph(
            3,
            &[
                (0, &[0], 0.9),
                (0, &[1], 0.1),
                (1, &[1], 0.9),
                (1, &[2], 0.1),
                (2, &[0], 1.0),
            ],
            3,
        );
        let config = SantaConfig::default().with_restarts(0);
        let outcome = local_search_perfect_matching_with(&h, &config);
        assert!(outcome.is_perfect());
        assert_disjoint(&outcome, 3);

        let shallow = config.with_max_augmenting_depth(1);
        let outcome = local_search_perfect_matching_with(&h, &shallow);
        assert_eq!(outcome.unmatched.len(), 1);
    }

    #[test]
    fn test_contended_item_single_winner() {
        let h = graph(1, &[(0, &[0], 1.0), (1, &[0], 1.0), (2, &[0], 1.0)], 3);
        let outcome = local_search_perfect_matching(&h);
        assert_eq!(outcome.allocation.holders(0), 1);
        assert_eq!(outcome.unmatched.len(), 2);
        assert!(!outcome.is_perfect());
    }

    #[test]
    fn test_multi_item_hyperedges() {
        let h = graph(
            4,
            &[
                (0, &[0, 1], 0.5),
                (0, &[2, 3], 0.5),
                (1, &[1, 2], 1.0),
                (2, &[3], 1.0),
            ],
            3,
        );
        let outcome = local_search_perfect_matching(&h);
        assert_disjoint(&outcome, 4);
        // Player 1's only edge overlaps both of player 0's options; one of
        // players 0/1 must stay unmatched unless player 2 gives up item 3.
        assert!(outcome.unmatched.len() <= 1);
    }

    #[test]
    fn test_item_capacity_two() {
        let mut h = Hypergraph::new(1.0, 2, vec![2]);
        for p in 0..2 {
            h.add_edge(Hyperedge {
                player: p,
                configuration: Configuration::new(vec![0]),
                weight: 1.0,
                value: 1.0,
            });
        }
        let outcome = local_search_perfect_matching(&h);
        assert!(outcome.is_perfect());
        assert_eq!(outcome.allocation.holders(0), 2);
    }

    #[test]
    fn test_isolated_player_stays_unmatched() {
        let h = graph(1, &[(0, &[0], 1.0)], 2);
        let outcome = local_search_perfect_matching(&h);
        assert_eq!(outcome.unmatched, vec![1]);
        assert_eq!(outcome.chosen, vec![Some(0), None]);
    }

    #[test]
    fn test_restarts_are_deterministic() {
        let h = graph(
            3,
            &[
                (0, &[0, 1], 1.0),
                (1, &[1, 2], 1.0),
                (2, &[0], 0.5),
                (2, &[2], 0.5),
            ],
            3,
        );
        let config = SantaConfig::default().with_seed(7);
        let a = local_search_perfect_matching_with(&h, &config);
        let b = local_search_perfect_matching_with(&h, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_allocation_named() {
        let inst = Instance::from_values(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let mut alloc = Allocation::new(2);
        alloc.assign(1, [1]);
        let named = alloc.to_named(&inst);
        assert!(named["P1"].is_empty());
        assert_eq!(named["P2"], BTreeSet::from(["G2".to_string()]));
        assert_eq!(alloc.min_value(&inst), 0.0);
    }

    #[test]
    fn test_capacity_violation_detected() {
        let inst = Instance::from_values(vec![vec![1.0], vec![1.0]]).unwrap();
        let mut alloc = Allocation::new(2);
        alloc.assign(0, [0]);
        alloc.assign(1, [0]);
        assert!(!alloc.respects_capacities(&inst));
    }
}
