//! Max-min fair allocation ("Santa Claus" problem).
//!
//! Given players, indivisible items and player-specific non-negative
//! values, find an allocation that maximizes the minimum total value any
//! player receives. The solver is a constant-factor approximation built on
//! the configuration LP.
//!
//! # Key Components
//!
//! - [`Instance`]: players, items, values, capacities
//! - [`is_threshold_feasible`] / [`solve_configuration_lp`]: LP feasibility
//!   oracle over bounded, inclusion-minimal [`Configuration`]s
//! - [`classify_items`]: fat/thin item partition for a threshold
//! - [`build_hypergraph`]: candidate bundles from the LP support
//! - [`local_search_perfect_matching`]: augmenting-path rounding into an
//!   [`Allocation`]
//! - [`SantaRunner`]: binary search over the threshold, then one rounding pass
//!
//! # Design
//!
//! The pipeline is fixed; tuning happens through [`SantaConfig`]. Probe
//! diagnostics go to a caller-supplied [`TraceSink`].
//!
//! # References
//!
//! - Bansal & Sviridenko (2006), "The Santa Claus problem", STOC
//! - Asadpour, Feige & Saberi (2012), "Santa Claus meets hypergraph
//!   matchings", ACM Transactions on Algorithms 8(3)

mod classify;
mod config;
mod configuration;
mod error;
mod hypergraph;
mod instance;
mod lp;
mod matching;
mod runner;
mod trace;

pub use classify::{classify_items, ItemClasses};
pub use config::SantaConfig;
pub use configuration::Configuration;
pub use error::SantaError;
pub use hypergraph::{build_hypergraph, build_hypergraph_with, Hyperedge, Hypergraph};
pub use instance::Instance;
pub use lp::{
    is_threshold_feasible, is_threshold_feasible_with, solve_configuration_lp,
    solve_configuration_lp_with, FractionalSolution,
};
pub use matching::{
    local_search_perfect_matching, local_search_perfect_matching_with, Allocation, MatchOutcome,
};
pub use runner::{santa_claus, SantaResult, SantaRunner};
pub use trace::{ProbeOutcome, ProbeRecord, TraceSink};
