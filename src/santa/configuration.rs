//! Candidate configurations and their bounded enumeration.
//!
//! The configuration space is exponential in the number of items, so the
//! LP only ever sees configurations produced here: inclusion-minimal
//! bundles that reach the threshold, limited in size, count per player and
//! search effort.
//!
//! No fat-item limit is applied here. Every minimal bundle for `T` contains
//! a minimal bundle for any `T' < T`, so LP feasibility stays monotone in
//! the threshold; the fat rule belongs to the hypergraph.

use super::instance::Instance;
use std::time::Instant;

/// A candidate bundle of items for one player.
///
/// Items are kept sorted so equal bundles compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Configuration {
    items: Vec<usize>,
}

impl Configuration {
    pub fn new(mut items: Vec<usize>) -> Self {
        items.sort_unstable();
        items.dedup();
        Self { items }
    }

    pub fn items(&self) -> &[usize] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, g: usize) -> bool {
        self.items.binary_search(&g).is_ok()
    }

    /// Value of this bundle to player `p`.
    pub fn value(&self, instance: &Instance, p: usize) -> f64 {
        instance.bundle_value(p, &self.items)
    }

    /// Whether the bundle is worth at least `threshold` to player `p`.
    pub fn is_valid_for(&self, instance: &Instance, p: usize, threshold: f64) -> bool {
        reaches(self.value(instance, p), threshold)
    }
}

/// Absolute slack for comparing bundle sums, which are accumulated in
/// different orders in different places.
pub(crate) const VALUE_EPS: f64 = 1e-9;

#[inline]
pub(crate) fn reaches(sum: f64, threshold: f64) -> bool {
    sum >= threshold - VALUE_EPS
}

/// Limits applied while enumerating configurations.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EnumerationLimits {
    pub max_size: usize,
    pub max_configurations: usize,
    pub max_nodes: usize,
    pub deadline: Option<Instant>,
}

/// Why enumeration stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnumerationStop {
    Deadline,
}

/// Enumerates inclusion-minimal configurations of value `>= threshold`
/// for player `p`.
///
/// Items are explored in descending value order. Because every bundle is
/// built in that order, the last item added is the cheapest one, and the
/// bundle is minimal exactly when dropping it falls below the threshold.
pub(crate) fn enumerate_configurations(
    instance: &Instance,
    p: usize,
    threshold: f64,
    limits: &EnumerationLimits,
) -> Result<Vec<Configuration>, EnumerationStop> {
    let mut candidates: Vec<(usize, f64)> = instance
        .values_of(p)
        .iter()
        .enumerate()
        .filter(|&(g, &v)| v > 0.0 && instance.item_capacity(g) > 0)
        .map(|(g, &v)| (g, v))
        .collect();
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let max_size = limits.max_size.min(instance.player_capacity(p));
    if max_size == 0 || candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mut search = Search {
        candidates: &candidates,
        threshold,
        max_size,
        limits,
        nodes: 0,
        stack: Vec::with_capacity(max_size),
        found: Vec::new(),
    };
    search.extend(0, 0.0)?;
    Ok(search.found)
}

struct Search<'a> {
    candidates: &'a [(usize, f64)],
    threshold: f64,
    max_size: usize,
    limits: &'a EnumerationLimits,
    nodes: usize,
    stack: Vec<usize>,
    found: Vec<Configuration>,
}

impl Search<'_> {
    fn full(&self) -> bool {
        self.found.len() >= self.limits.max_configurations || self.nodes >= self.limits.max_nodes
    }

    fn extend(&mut self, start: usize, sum: f64) -> Result<(), EnumerationStop> {
        for i in start..self.candidates.len() {
            if self.full() {
                return Ok(());
            }
            self.nodes += 1;
            if self.nodes % 1024 == 0 {
                if let Some(deadline) = self.limits.deadline {
                    if Instant::now() >= deadline {
                        return Err(EnumerationStop::Deadline);
                    }
                }
            }

            let (g, v) = self.candidates[i];
            let slots = self.max_size - self.stack.len();
            // Values are sorted, so the best completion uses the next `slots` items.
            let reachable: f64 = self.candidates[i..].iter().take(slots).map(|c| c.1).sum();
            if !reaches(sum + reachable, self.threshold) {
                return Ok(());
            }

            let next = sum + v;
            self.stack.push(g);
            if reaches(next, self.threshold) {
                // `v` is the smallest value in the bundle
                if !reaches(next - v, self.threshold) {
                    self.found.push(Configuration::new(self.stack.clone()));
                }
            } else if self.stack.len() < self.max_size {
                self.extend(i + 1, next)?;
            }
            self.stack.pop();
        }
        Ok(())
    }
}
