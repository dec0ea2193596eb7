//! Hypergraph of candidate bundles built from a fractional solution.

use super::classify::ItemClasses;
use super::config::SantaConfig;
use super::configuration::Configuration;
use super::instance::Instance;
use super::lp::FractionalSolution;

/// A hyperedge joining one player to every item of one configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hyperedge {
    pub player: usize,
    pub configuration: Configuration,
    /// LP weight of this configuration for the player.
    pub weight: f64,
    /// Value of the configuration to the player.
    pub value: f64,
}

/// Bipartite hypergraph over players and items.
///
/// Edges are stored per player, sorted by descending weight (ties by
/// descending value, then by item list) so iteration order is stable.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hypergraph {
    threshold: f64,
    item_capacities: Vec<usize>,
    edges: Vec<Vec<Hyperedge>>,
}

impl Hypergraph {
    /// Creates an empty hypergraph over `num_players` players and the
    /// given item capacities.
    pub fn new(threshold: f64, num_players: usize, item_capacities: Vec<usize>) -> Self {
        Self {
            threshold,
            item_capacities,
            edges: vec![Vec::new(); num_players],
        }
    }

    /// Adds a hyperedge, keeping the player's edges ordered.
    pub fn add_edge(&mut self, edge: Hyperedge) {
        let list = &mut self.edges[edge.player];
        list.push(edge);
        list.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then(b.value.total_cmp(&a.value))
                .then_with(|| a.configuration.cmp(&b.configuration))
        });
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn num_players(&self) -> usize {
        self.edges.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_capacities.len()
    }

    pub fn item_capacity(&self, g: usize) -> usize {
        self.item_capacities[g]
    }

    /// Hyperedges incident to player `p`.
    pub fn edges_of(&self, p: usize) -> &[Hyperedge] {
        &self.edges[p]
    }

    pub fn num_edges(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    /// Players without any incident hyperedge.
    pub fn isolated_players(&self) -> Vec<usize> {
        (0..self.edges.len())
            .filter(|&p| self.edges[p].is_empty())
            .collect()
    }
}

/// Builds the hypergraph with default settings (at most one fat item per
/// hyperedge).
pub fn build_hypergraph(
    instance: &Instance,
    fractional: &FractionalSolution,
    classes: &ItemClasses,
    threshold: f64,
) -> Hypergraph {
    build_hypergraph_with(instance, fractional, classes, threshold, &SantaConfig::default())
}

/// Builds one hyperedge per (player, configuration) in the support of
/// `fractional` whose configuration holds at most `max_fat_items` fat items
/// and is worth at least `threshold` to the player.
pub fn build_hypergraph_with(
    instance: &Instance,
    fractional: &FractionalSolution,
    classes: &ItemClasses,
    threshold: f64,
    config: &SantaConfig,
) -> Hypergraph {
    let capacities = (0..instance.num_items())
        .map(|g| instance.item_capacity(g))
        .collect();
    let mut graph = Hypergraph::new(threshold, instance.num_players(), capacities);

    for p in 0..fractional.num_players().min(instance.num_players()) {
        for (configuration, weight) in fractional.player_weights(p) {
            if *weight <= 0.0 {
                continue;
            }
            if classes.fat_count(configuration.items()) > config.max_fat_items {
                continue;
            }
            if !configuration.is_valid_for(instance, p, threshold) {
                continue;
            }
            graph.add_edge(Hyperedge {
                player: p,
                configuration: configuration.clone(),
                weight: *weight,
                value: configuration.value(instance, p),
            });
        }
    }

    log::debug!(
        "hypergraph at threshold {threshold}: {} edges, {} isolated players",
        graph.num_edges(),
        graph.isolated_players().len()
    );
    graph
}
