//! Threshold search and final rounding.
//!
//! # Algorithm
//!
//! 1. Bound the optimum by the weakest player's best attainable bundle
//! 2. Probe the bound itself, then bisect `[lo, hi]` with the feasibility
//!    oracle: feasible raises `lo`, anything else lowers `hi`
//! 3. Stop at the configured precision or probe budget; a spent budget
//!    does not stop the search before some positive threshold is confirmed
//! 4. Round the fractional solution of the best confirmed threshold once:
//!    classify → build hypergraph → local-search matching. If hyperedges
//!    over the fat-item limit cost players their match, the full LP support
//!    is matched as well and the better outcome kept

use super::classify::classify_items;
use super::config::SantaConfig;
use super::error::SantaError;
use super::hypergraph::build_hypergraph_with;
use super::instance::Instance;
use super::lp::{solve_with_stats, FractionalSolution, LpStats};
use super::matching::{local_search_perfect_matching_with, Allocation, MatchOutcome};
use super::trace::{ProbeOutcome, ProbeRecord, TraceSink};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a max-min allocation run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SantaResult {
    /// The discrete allocation.
    pub allocation: Allocation,

    /// Best threshold confirmed feasible by the configuration LP.
    pub threshold: f64,

    /// Smallest bundle value in `allocation` (0 if a player is unmatched).
    pub min_value: f64,

    /// Players the matcher could not serve; they hold empty bundles.
    pub unmatched: Vec<usize>,

    /// Whether the allocation misses some players.
    pub approximate: bool,

    /// Number of threshold probes executed.
    pub iterations: usize,

    /// Whether the search was cancelled externally.
    pub cancelled: bool,

    /// One record per probe, in execution order.
    pub probes: Vec<ProbeRecord>,
}

/// Executes the threshold search and rounding.
pub struct SantaRunner;

impl SantaRunner {
    /// Runs the solver without tracing or cancellation.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_fairalloc::santa::{Instance, SantaConfig, SantaRunner};
    ///
    /// let inst = Instance::from_values(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    /// let result = SantaRunner::run(&inst, &SantaConfig::default()).unwrap();
    /// assert!((result.threshold - 1.0).abs() < 1e-9);
    /// assert!(!result.approximate);
    /// assert!(result.allocation.bundle(0).contains(&0));
    /// assert!(result.allocation.bundle(1).contains(&1));
    /// ```
    pub fn run(instance: &Instance, config: &SantaConfig) -> Result<SantaResult, SantaError> {
        Self::run_with_trace(instance, config, &mut (), None)
    }

    /// Runs the solver, reporting every probe to `sink`.
    ///
    /// If `cancel` is set, the search stops before the next probe and
    /// rounds at the best threshold confirmed so far.
    pub fn run_with_trace<S: TraceSink + ?Sized>(
        instance: &Instance,
        config: &SantaConfig,
        sink: &mut S,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<SantaResult, SantaError> {
        config.validate().map_err(SantaError::InvalidConfig)?;
        if instance.num_players() == 0 {
            return Err(SantaError::InvalidInstance("instance has no players".into()));
        }

        let start = Instant::now();
        let deadline = config
            .time_limit_ms
            .map(|ms| start + Duration::from_millis(ms));

        let upper = instance.max_min_upper_bound();
        if upper <= 0.0 {
            log::debug!("some player cannot receive any value");
            return Err(SantaError::Infeasible { threshold: upper });
        }

        let mut lo = 0.0;
        let mut hi = upper;
        let mut best: Option<FractionalSolution> = None;
        let mut probes: Vec<ProbeRecord> = Vec::new();
        let mut cancelled = false;

        while probes.len() < config.max_iterations || best.is_none() {
            if let Some(ref flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    cancelled = true;
                    break;
                }
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(SantaError::SolverTimeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }

            let thresholds = if probes.is_empty() {
                vec![hi]
            } else {
                let budget = config.max_iterations.saturating_sub(probes.len()).max(1);
                bisection_points(lo, hi, probe_width(config).min(budget))
            };

            let mut round = evaluate(instance, &thresholds, config);
            round.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));

            // Ascending order: the last feasible probe is the largest one.
            let mut feasible: Option<(f64, FractionalSolution)> = None;
            let mut failed: Vec<f64> = Vec::new();
            for probe in round {
                let outcome = probe.outcome();
                let record = ProbeRecord {
                    iteration: probes.len(),
                    threshold: probe.threshold,
                    outcome,
                    configurations: probe.stats.configurations,
                    solve_time_ms: probe.elapsed_ms,
                };
                log::debug!(
                    "probe {}: T={} {:?} ({} configurations, {} ms)",
                    record.iteration,
                    record.threshold,
                    record.outcome,
                    record.configurations,
                    record.solve_time_ms
                );
                sink.record(&record);
                probes.push(record);

                match probe.result {
                    Ok(solution) => feasible = Some((probe.threshold, solution)),
                    Err(_) => failed.push(probe.threshold),
                }
            }

            if let Some((t, solution)) = feasible {
                lo = t;
                best = Some(solution);
            }
            hi = failed
                .into_iter()
                .filter(|&t| t > lo)
                .fold(hi, f64::min)
                .max(lo);

            if hi - lo <= config.precision {
                break;
            }
        }

        let Some(fractional) = best else {
            return Err(no_threshold_error(&probes, cancelled, hi, start));
        };

        let outcome = round(instance, &fractional, lo, config);
        let min_value = outcome.allocation.min_value(instance);

        log::debug!(
            "threshold {lo} after {} probes; min value {min_value}, {} unmatched",
            probes.len(),
            outcome.unmatched.len()
        );

        Ok(SantaResult {
            approximate: !outcome.unmatched.is_empty(),
            allocation: outcome.allocation,
            threshold: lo,
            min_value,
            unmatched: outcome.unmatched,
            iterations: probes.len(),
            cancelled,
            probes,
        })
    }
}

/// Runs the solver with default settings and returns a
/// `player name -> item names` map.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use u_fairalloc::santa::{santa_claus, Instance};
///
/// let valuations = BTreeMap::from([
///     ("P1".to_string(), BTreeMap::from([("G1".to_string(), 1.0)])),
///     ("P2".to_string(), BTreeMap::from([("G2".to_string(), 1.0)])),
/// ]);
/// let inst = Instance::from_named_valuations(&valuations, &BTreeMap::new(), &BTreeMap::new())
///     .unwrap();
/// let named = santa_claus(&inst).unwrap();
/// assert!(named["P1"].contains("G1"));
/// assert!(named["P2"].contains("G2"));
/// ```
pub fn santa_claus(instance: &Instance) -> Result<BTreeMap<String, BTreeSet<String>>, SantaError> {
    let result = SantaRunner::run(instance, &SantaConfig::default())?;
    Ok(result.allocation.to_named(instance))
}

fn round(
    instance: &Instance,
    fractional: &FractionalSolution,
    threshold: f64,
    config: &SantaConfig,
) -> MatchOutcome {
    let classes = classify_items(instance, threshold);
    let graph = build_hypergraph_with(instance, fractional, &classes, threshold, config);
    let outcome = local_search_perfect_matching_with(&graph, config);
    if outcome.is_perfect() || graph.num_edges() == fractional.support_size() {
        return outcome;
    }

    let relaxed = config.clone().with_max_fat_items(usize::MAX);
    let full = build_hypergraph_with(instance, fractional, &classes, threshold, &relaxed);
    let fallback = local_search_perfect_matching_with(&full, config);
    if fallback.unmatched.len() < outcome.unmatched.len() {
        log::debug!(
            "full LP support matched {} more players",
            outcome.unmatched.len() - fallback.unmatched.len()
        );
        fallback
    } else {
        outcome
    }
}

struct Probe {
    threshold: f64,
    result: Result<FractionalSolution, SantaError>,
    stats: LpStats,
    elapsed_ms: u64,
}

impl Probe {
    fn run(instance: &Instance, threshold: f64, config: &SantaConfig) -> Self {
        let start = Instant::now();
        let (result, stats) = match solve_with_stats(instance, threshold, config) {
            Ok((solution, stats)) => (Ok(solution), stats),
            Err(e) => (Err(e), LpStats::default()),
        };
        Self {
            threshold,
            result,
            stats,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn outcome(&self) -> ProbeOutcome {
        match &self.result {
            Ok(_) => ProbeOutcome::Feasible,
            Err(SantaError::SolverTimeout { .. }) => ProbeOutcome::Timeout,
            Err(SantaError::SolverUnavailable(_)) => ProbeOutcome::NumericalFailure,
            Err(_) => ProbeOutcome::Infeasible,
        }
    }
}

fn probe_width(config: &SantaConfig) -> usize {
    if cfg!(feature = "parallel") {
        config.parallel_probes
    } else {
        1
    }
}

/// `k` evenly spaced interior points of `(lo, hi)`.
fn bisection_points(lo: f64, hi: f64, k: usize) -> Vec<f64> {
    let k = k.max(1);
    let step = (hi - lo) / (k + 1) as f64;
    (1..=k).map(|i| lo + step * i as f64).collect()
}

#[cfg(feature = "parallel")]
fn evaluate(instance: &Instance, thresholds: &[f64], config: &SantaConfig) -> Vec<Probe> {
    thresholds
        .par_iter()
        .map(|&t| Probe::run(instance, t, config))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn evaluate(instance: &Instance, thresholds: &[f64], config: &SantaConfig) -> Vec<Probe> {
    thresholds
        .iter()
        .map(|&t| Probe::run(instance, t, config))
        .collect()
}

fn no_threshold_error(
    probes: &[ProbeRecord],
    cancelled: bool,
    hi: f64,
    start: Instant,
) -> SantaError {
    if cancelled {
        return SantaError::Cancelled;
    }
    let all = |o: ProbeOutcome| !probes.is_empty() && probes.iter().all(|r| r.outcome == o);
    if all(ProbeOutcome::NumericalFailure) {
        return SantaError::SolverUnavailable("LP failed at every probed threshold".into());
    }
    let any_infeasible = probes.iter().any(|r| r.outcome == ProbeOutcome::Infeasible);
    if !any_infeasible && probes.iter().any(|r| r.outcome == ProbeOutcome::Timeout) {
        return SantaError::SolverTimeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
    }
    SantaError::Infeasible { threshold: hi }
}
