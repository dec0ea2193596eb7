//! Configuration LP and the threshold feasibility oracle.
//!
//! # Formulation
//!
//! For a threshold `T`, with `C(p)` the candidate configurations of player
//! `p` (see [`Configuration`]):
//!
//! ```text
//! minimise   sum_p s_p
//! subject to sum_{C in C(p)} x_{p,C} + s_p = 1           for every player p
//!            sum_p sum_{C in C(p), g in C} x_{p,C} <= c_g  for every item g
//!            x, s >= 0
//! ```
//!
//! The slack makes the program always feasible, so an infeasible threshold
//! shows up as positive optimal slack instead of relying on the backend's
//! infeasibility detection.
//!
//! # Reference
//!
//! Bansal & Sviridenko (2006), "The Santa Claus problem", STOC.

use super::config::SantaConfig;
use super::configuration::{enumerate_configurations, Configuration, EnumerationLimits};
use super::error::SantaError;
use super::instance::Instance;
use good_lp::{
    default_solver, variable, variables, Expression, ResolutionError, Solution, SolverModel,
    Variable,
};
use std::time::{Duration, Instant};

/// Fractional assignment of configurations to players.
///
/// For every player the weights sum to 1. Weights at or below the LP
/// tolerance are dropped and the rest rescaled, so an item's load may
/// exceed its capacity by the rescaling factor: `item_load(g) <= cap(g) /
/// (1 - dropped_weight())`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FractionalSolution {
    threshold: f64,
    weights: Vec<Vec<(Configuration, f64)>>,
    dropped: f64,
}

impl FractionalSolution {
    pub(crate) fn new(threshold: f64, weights: Vec<Vec<(Configuration, f64)>>) -> Self {
        Self {
            threshold,
            weights,
            dropped: 0.0,
        }
    }

    pub(crate) fn with_dropped_weight(mut self, dropped: f64) -> Self {
        self.dropped = dropped;
        self
    }

    /// The threshold this solution was computed for.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn num_players(&self) -> usize {
        self.weights.len()
    }

    /// Weighted configurations of player `p`.
    pub fn player_weights(&self, p: usize) -> &[(Configuration, f64)] {
        &self.weights[p]
    }

    /// Total weight placed on configurations containing item `g`.
    pub fn item_load(&self, g: usize) -> f64 {
        self.weights
            .iter()
            .flatten()
            .filter(|(c, _)| c.contains(g))
            .map(|(_, w)| w)
            .sum()
    }

    /// Expected value of player `p` under its distribution.
    pub fn expected_value(&self, instance: &Instance, p: usize) -> f64 {
        self.weights[p]
            .iter()
            .map(|(c, w)| w * c.value(instance, p))
            .sum()
    }

    /// Largest weight removed from one player's distribution before
    /// rescaling (slack plus filtered configurations).
    pub fn dropped_weight(&self) -> f64 {
        self.dropped
    }

    /// Number of (player, configuration) pairs with positive weight.
    pub fn support_size(&self) -> usize {
        self.weights.iter().map(Vec::len).sum()
    }
}

/// Statistics of one LP solve, used for the probe trace.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LpStats {
    pub configurations: usize,
    pub solve_time_ms: u64,
}

/// Solves the configuration LP at `threshold` with default settings.
///
/// # Errors
///
/// - [`SantaError::Infeasible`] if no fractional solution reaches the threshold.
/// - [`SantaError::SolverUnavailable`] if the LP backend fails.
pub fn solve_configuration_lp(
    instance: &Instance,
    threshold: f64,
) -> Result<FractionalSolution, SantaError> {
    solve_configuration_lp_with(instance, threshold, &SantaConfig::default())
}

/// Solves the configuration LP at `threshold` using `config` for the
/// enumeration bounds, tolerance and per-probe time budget.
pub fn solve_configuration_lp_with(
    instance: &Instance,
    threshold: f64,
    config: &SantaConfig,
) -> Result<FractionalSolution, SantaError> {
    solve_with_stats(instance, threshold, config).map(|(solution, _)| solution)
}

/// Whether `threshold` is achievable under the LP relaxation.
///
/// # Examples
///
/// ```
/// use u_fairalloc::santa::{is_threshold_feasible, Instance};
///
/// let inst = Instance::from_values(vec![vec![1.0]]).unwrap();
/// assert!(is_threshold_feasible(&inst, 0.5));
/// assert!(!is_threshold_feasible(&inst, 1.5));
/// ```
pub fn is_threshold_feasible(instance: &Instance, threshold: f64) -> bool {
    is_threshold_feasible_with(instance, threshold, &SantaConfig::default())
}

/// [`is_threshold_feasible`] with an explicit configuration.
///
/// Every failure, including solver errors and timeouts, counts as
/// infeasible.
pub fn is_threshold_feasible_with(instance: &Instance, threshold: f64, config: &SantaConfig) -> bool {
    solve_with_stats(instance, threshold, config).is_ok()
}

pub(crate) fn solve_with_stats(
    instance: &Instance,
    threshold: f64,
    config: &SantaConfig,
) -> Result<(FractionalSolution, LpStats), SantaError> {
    let n = instance.num_players();

    if threshold <= 0.0 {
        let empty = vec![vec![(Configuration::new(Vec::new()), 1.0)]; n];
        return Ok((FractionalSolution::new(threshold, empty), LpStats::default()));
    }
    if n == 0 || instance.num_items() == 0 {
        return Err(SantaError::Infeasible { threshold });
    }

    let start = Instant::now();
    let deadline = config
        .probe_time_limit_ms
        .map(|ms| start + Duration::from_millis(ms));
    let timeout = || SantaError::SolverTimeout {
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    let limits = EnumerationLimits {
        max_size: config.max_configuration_size,
        max_configurations: config.max_configurations_per_player,
        max_nodes: config.max_enumeration_nodes,
        deadline,
    };

    let mut candidates: Vec<Vec<Configuration>> = Vec::with_capacity(n);
    for p in 0..n {
        let configs = enumerate_configurations(instance, p, threshold, &limits)
            .map_err(|_| timeout())?;
        if configs.is_empty() {
            log::trace!("player {p} has no configuration reaching {threshold}");
            return Err(SantaError::Infeasible { threshold });
        }
        candidates.push(configs);
    }
    let configurations: usize = candidates.iter().map(Vec::len).sum();

    let mut vars = variables!();
    let columns: Vec<Vec<Variable>> = candidates
        .iter()
        .map(|configs| configs.iter().map(|_| vars.add(variable().min(0.0))).collect())
        .collect();
    let slacks: Vec<Variable> = (0..n).map(|_| vars.add(variable().min(0.0))).collect();

    let objective = slacks
        .iter()
        .fold(Expression::from(0.0), |acc, &s| acc + s);
    let mut problem = vars.minimise(objective).using(default_solver);

    // Each player picks one configuration, or pays slack.
    for p in 0..n {
        let mut row = Expression::default();
        for &x in &columns[p] {
            row.add_mul(1.0, x);
        }
        row.add_mul(1.0, slacks[p]);
        problem = problem.with(row.eq(1.0));
    }

    // Item capacities.
    let mut item_rows: Vec<Option<Expression>> = vec![None; instance.num_items()];
    for (p, configs) in candidates.iter().enumerate() {
        for (c, &x) in configs.iter().zip(&columns[p]) {
            for &g in c.items() {
                item_rows[g]
                    .get_or_insert_with(Expression::default)
                    .add_mul(1.0, x);
            }
        }
    }
    for (g, row) in item_rows.into_iter().enumerate() {
        if let Some(row) = row {
            problem = problem.with(row.leq(instance.item_capacity(g) as f64));
        }
    }

    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Err(timeout());
    }

    let solution = match problem.solve() {
        Ok(solution) => solution,
        Err(ResolutionError::Infeasible) => return Err(SantaError::Infeasible { threshold }),
        Err(e) => return Err(SantaError::SolverUnavailable(e.to_string())),
    };

    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Err(timeout());
    }

    let total_slack: f64 = slacks.iter().map(|&s| solution.value(s)).sum();
    if !total_slack.is_finite() {
        return Err(SantaError::SolverUnavailable(format!(
            "non-finite slack {total_slack}"
        )));
    }
    if total_slack > config.lp_tolerance.max(1e-9) * n as f64 {
        log::trace!("threshold {threshold}: residual slack {total_slack}");
        return Err(SantaError::Infeasible { threshold });
    }

    let mut weights = Vec::with_capacity(n);
    let mut dropped: f64 = 0.0;
    for (p, configs) in candidates.into_iter().enumerate() {
        let mut row: Vec<(Configuration, f64)> = configs
            .into_iter()
            .zip(&columns[p])
            .map(|(c, &x)| (c, solution.value(x)))
            .filter(|(_, w)| *w > config.lp_tolerance)
            .collect();
        let sum: f64 = row.iter().map(|(_, w)| w).sum();
        if sum <= 0.0 {
            return Err(SantaError::SolverUnavailable(format!(
                "player {p} has no positive weight"
            )));
        }
        dropped = dropped.max(1.0 - sum);
        for (_, w) in &mut row {
            *w /= sum;
        }
        weights.push(row);
    }

    let stats = LpStats {
        configurations,
        solve_time_ms: start.elapsed().as_millis() as u64,
    };
    Ok((
        FractionalSolution::new(threshold, weights).with_dropped_weight(dropped.max(0.0)),
        stats,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capped(values: Vec<Vec<f64>>, cap: usize) -> Instance {
        let n = values.len();
        Instance::from_values(values)
            .unwrap()
            .with_player_capacities(vec![cap; n])
            .unwrap()
    }

    #[test]
    fn test_one_player_one_item() {
        let inst = Instance::from_values(vec![vec![1.0]]).unwrap();
        assert!(is_threshold_feasible(&inst, 0.5));
        assert!(is_threshold_feasible(&inst, 1.0));
        assert!(!is_threshold_feasible(&inst, 1.5));
    }

    #[test]
    fn test_one_player_one_item_not_enough() {
        let inst = Instance::from_values(vec![vec![0.2]]).unwrap();
        assert!(!is_threshold_feasible(&inst, 0.5));
    }

    #[test]
    fn test_zero_threshold_always_feasible() {
        let inst = Instance::from_values(vec![vec![0.0, 0.0], vec![0.0, 0.0]]).unwrap();
        assert!(is_threshold_feasible(&inst, 0.0));
    }

    #[test]
    fn test_no_items() {
        let inst = Instance::from_values(vec![vec![]]).unwrap();
        assert!(!is_threshold_feasible(&inst, 0.5));
        assert!(is_threshold_feasible(&inst, 0.0));
    }

    #[test]
    fn test_no_players() {
        let inst = Instance::from_values(Vec::new()).unwrap();
        assert!(is_threshold_feasible(&inst, 0.0));
        assert!(!is_threshold_feasible(&inst, 0.1));
    }

    #[test]
    fn test_identity_instance() {
        let inst = Instance::from_values(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let sol = solve_configuration_lp(&inst, 1.0).unwrap();
        assert_eq!(sol.num_players(), 2);
        assert_eq!(sol.player_weights(0), &[(Configuration::new(vec![0]), 1.0)]);
        assert_eq!(sol.player_weights(1), &[(Configuration::new(vec![1]), 1.0)]);
        assert!(!is_threshold_feasible(&inst, 1.01));
    }

    #[test]
    fn test_contended_item_is_infeasible() {
        let inst = Instance::from_values(vec![vec![1.0], vec![1.0]]).unwrap();
        assert!(matches!(
            solve_configuration_lp(&inst, 0.5),
            Err(SantaError::Infeasible { .. })
        ));
    }

    #[test]
    fn test_shared_item_with_capacity_two() {
        let inst = Instance::from_values(vec![vec![1.0], vec![1.0]])
            .unwrap()
            .with_item_capacities(vec![2])
            .unwrap();
        assert!(is_threshold_feasible(&inst, 1.0));
    }

    #[test]
    fn test_thin_items_combine() {
        // Player 0 needs two thin items, player 1 takes the fat one.
        let inst = capped(vec![vec![0.5, 0.5, 0.2], vec![0.1, 0.1, 1.0]], 2);
        let sol = solve_configuration_lp(&inst, 1.0).unwrap();
        assert!(sol.expected_value(&inst, 0) >= 1.0 - 1e-6);
        assert!(sol.expected_value(&inst, 1) >= 1.0 - 1e-6);
    }

    #[test]
    fn test_solution_invariants() {
        let inst = capped(
            vec![
                vec![0.6, 0.3, 0.3, 0.2, 0.1],
                vec![0.2, 0.6, 0.1, 0.4, 0.3],
                vec![0.1, 0.2, 0.6, 0.3, 0.5],
            ],
            3,
        );
        let sol = solve_configuration_lp(&inst, 0.6).unwrap();
        for p in 0..inst.num_players() {
            let total: f64 = sol.player_weights(p).iter().map(|(_, w)| w).sum();
            assert!((total - 1.0).abs() < 1e-9, "player {p} weights sum to {total}");
            for (c, w) in sol.player_weights(p) {
                assert!(*w > 0.0 && *w <= 1.0 + 1e-9);
                assert!(c.is_valid_for(&inst, p, 0.6));
            }
        }
        for g in 0..inst.num_items() {
            assert!(sol.item_load(g) <= inst.item_capacity(g) as f64 + 1e-6);
        }
        assert!(sol.support_size() >= inst.num_players());
    }

    fn mixed_fat_instance() -> Instance {
        capped(
            vec![
                vec![0.5, 0.5, 0.0, 0.6],
                vec![0.8, 0.8, 1.0, 0.0],
                vec![0.0, 0.0, 0.0, 1.2],
            ],
            2,
        )
    }

    #[test]
    fn test_feasibility_monotone_when_items_turn_fat() {
        // Items 0 and 1 become fat (for player 1) below 0.8, yet player 0
        // still needs both of them.
        let inst = mixed_fat_instance();
        assert!(is_threshold_feasible(&inst, 1.0));
        for t in [0.9, 0.8, 0.7, 0.55, 0.3] {
            assert!(is_threshold_feasible(&inst, t), "infeasible at {t}");
        }
        assert!(!is_threshold_feasible(&inst, 1.05));
    }

    #[test]
    fn test_item_load_within_rescaled_capacity() {
        let inst = capped(
            vec![
                vec![0.4, 0.3, 0.3, 0.2, 0.2],
                vec![0.3, 0.4, 0.2, 0.3, 0.2],
                vec![0.2, 0.3, 0.4, 0.2, 0.3],
            ],
            3,
        )
        .with_item_capacities(vec![1, 2, 1, 1, 2])
        .unwrap();
        let sol = solve_configuration_lp(&inst, 0.6).unwrap();
        let dropped = sol.dropped_weight();
        assert!((0.0..1.0).contains(&dropped));
        for g in 0..inst.num_items() {
            let bound = inst.item_capacity(g) as f64 / (1.0 - dropped);
            assert!(
                sol.item_load(g) <= bound + 1e-7,
                "item {g} load {} exceeds {bound}",
                sol.item_load(g)
            );
        }
    }

    #[test]
    fn test_expired_probe_budget() {
        let inst = capped(vec![vec![1.0; 40], vec![1.0; 40]], 40);
        let config = SantaConfig::default()
            .with_max_configuration_size(40)
            .with_max_configurations_per_player(usize::MAX)
            .with_max_enumeration_nodes(usize::MAX)
            .with_probe_time_limit_ms(0);
        let result = solve_configuration_lp_with(&inst, 20.0, &config);
        assert!(matches!(result, Err(SantaError::SolverTimeout { .. })));
        assert!(!is_threshold_feasible_with(&inst, 20.0, &config));
    }
}
