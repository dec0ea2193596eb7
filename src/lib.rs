//! Max-min fair allocation of indivisible items.
//!
//! Provides the "Santa Claus" allocation engine:
//!
//! - **Configuration LP**: Threshold feasibility over bounded,
//!   inclusion-minimal bundles, solved with `good_lp`.
//! - **Fat/thin classification**: Items individually worth the threshold
//!   to some player versus items that only help in combination.
//! - **Hypergraph rounding**: Candidate bundles from the LP support, rounded
//!   by augmenting-path local search into a conflict-free allocation.
//! - **Threshold search**: Binary search on the max-min value with
//!   per-probe tracing, time budgets and cancellation.
//!
//! # Architecture
//!
//! This crate sits at Layer 2 (Algorithms) in the U-Engine ecosystem. It
//! owns no input format, user interface or persistence: callers build an
//! [`santa::Instance`] and present the returned [`santa::Allocation`].

pub mod santa;
