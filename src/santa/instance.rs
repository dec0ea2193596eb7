//! Allocation instance: players, items, values, capacities.

use super::error::SantaError;
use std::collections::BTreeMap;

/// An immutable max-min allocation instance.
///
/// Players and items are addressed by index; names are kept for
/// presentation. `values[p][g]` is the value of item `g` to player `p`.
///
/// # Examples
///
/// ```
/// use u_fairalloc::santa::Instance;
///
/// let instance = Instance::from_values(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
/// assert_eq!(instance.num_players(), 2);
/// assert_eq!(instance.num_items(), 2);
/// assert_eq!(instance.player_name(0), "P1");
/// assert_eq!(instance.item_capacity(1), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instance {
    players: Vec<String>,
    items: Vec<String>,
    values: Vec<Vec<f64>>,
    player_capacities: Vec<usize>,
    item_capacities: Vec<usize>,
}

impl Instance {
    /// Creates an instance from explicit names, values and capacities.
    ///
    /// Rejects ragged value rows, negative or non-finite values, and
    /// capacity vectors whose length does not match.
    pub fn new(
        players: Vec<String>,
        items: Vec<String>,
        values: Vec<Vec<f64>>,
        player_capacities: Vec<usize>,
        item_capacities: Vec<usize>,
    ) -> Result<Self, SantaError> {
        if values.len() != players.len() {
            return Err(SantaError::InvalidInstance(format!(
                "expected {} value rows, got {}",
                players.len(),
                values.len()
            )));
        }
        for (p, row) in values.iter().enumerate() {
            if row.len() != items.len() {
                return Err(SantaError::InvalidInstance(format!(
                    "row {p} has {} values, expected {}",
                    row.len(),
                    items.len()
                )));
            }
            if let Some((g, v)) = row
                .iter()
                .enumerate()
                .find(|(_, v)| !v.is_finite() || **v < 0.0)
            {
                return Err(SantaError::InvalidInstance(format!(
                    "value of item {g} for player {p} must be finite and non-negative, got {v}"
                )));
            }
        }
        if player_capacities.len() != players.len() {
            return Err(SantaError::InvalidInstance(
                "player capacities length mismatch".into(),
            ));
        }
        if item_capacities.len() != items.len() {
            return Err(SantaError::InvalidInstance(
                "item capacities length mismatch".into(),
            ));
        }
        Ok(Self {
            players,
            items,
            values,
            player_capacities,
            item_capacities,
        })
    }

    /// Creates an instance from a value matrix with unit capacities.
    ///
    /// Players are named `P1..Pn` and items `G1..Gm`.
    pub fn from_values(values: Vec<Vec<f64>>) -> Result<Self, SantaError> {
        let n = values.len();
        let m = values.first().map_or(0, Vec::len);
        Self::new(
            (1..=n).map(|i| format!("P{i}")).collect(),
            (1..=m).map(|j| format!("G{j}")).collect(),
            values,
            vec![1; n],
            vec![1; m],
        )
    }

    /// Creates an instance from nested `player -> item -> value` maps.
    ///
    /// The item set is the union of all inner keys plus the keys of
    /// `item_capacities`. Missing values are 0 and missing capacities 1.
    pub fn from_named_valuations(
        valuations: &BTreeMap<String, BTreeMap<String, f64>>,
        player_capacities: &BTreeMap<String, usize>,
        item_capacities: &BTreeMap<String, usize>,
    ) -> Result<Self, SantaError> {
        let players: Vec<String> = valuations.keys().cloned().collect();
        let mut item_set: Vec<String> = valuations
            .values()
            .flat_map(|row| row.keys().cloned())
            .chain(item_capacities.keys().cloned())
            .collect();
        item_set.sort();
        item_set.dedup();

        let values = valuations
            .values()
            .map(|row| {
                item_set
                    .iter()
                    .map(|g| row.get(g).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();
        let pcaps = players
            .iter()
            .map(|p| player_capacities.get(p).copied().unwrap_or(1))
            .collect();
        let icaps = item_set
            .iter()
            .map(|g| item_capacities.get(g).copied().unwrap_or(1))
            .collect();

        Self::new(players, item_set, values, pcaps, icaps)
    }

    /// Replaces the player capacities.
    pub fn with_player_capacities(mut self, caps: Vec<usize>) -> Result<Self, SantaError> {
        if caps.len() != self.players.len() {
            return Err(SantaError::InvalidInstance(
                "player capacities length mismatch".into(),
            ));
        }
        self.player_capacities = caps;
        Ok(self)
    }

    /// Replaces the item capacities.
    pub fn with_item_capacities(mut self, caps: Vec<usize>) -> Result<Self, SantaError> {
        if caps.len() != self.items.len() {
            return Err(SantaError::InvalidInstance(
                "item capacities length mismatch".into(),
            ));
        }
        self.item_capacities = caps;
        Ok(self)
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn player_name(&self, p: usize) -> &str {
        &self.players[p]
    }

    pub fn item_name(&self, g: usize) -> &str {
        &self.items[g]
    }

    /// Value of item `g` to player `p`.
    #[inline]
    pub fn value(&self, p: usize, g: usize) -> f64 {
        self.values[p][g]
    }

    /// The value row of player `p`.
    pub fn values_of(&self, p: usize) -> &[f64] {
        &self.values[p]
    }

    pub fn player_capacity(&self, p: usize) -> usize {
        self.player_capacities[p]
    }

    pub fn item_capacity(&self, g: usize) -> usize {
        self.item_capacities[g]
    }

    /// Total value of `items` to player `p`.
    pub fn bundle_value<'a>(&self, p: usize, items: impl IntoIterator<Item = &'a usize>) -> f64 {
        items.into_iter().map(|&g| self.values[p][g]).sum()
    }

    /// Largest value player `p` can receive on its own: the sum of its
    /// `capacity` most valuable items (items with zero capacity excluded).
    pub fn best_attainable(&self, p: usize) -> f64 {
        let mut row: Vec<f64> = self.values[p]
            .iter()
            .zip(&self.item_capacities)
            .filter(|&(&v, &cap)| v > 0.0 && cap > 0)
            .map(|(&v, _)| v)
            .collect();
        row.sort_by(|a, b| b.total_cmp(a));
        row.iter().take(self.player_capacities[p]).sum()
    }

    /// Upper bound on the max-min value: no player can exceed its own
    /// best attainable bundle.
    pub fn max_min_upper_bound(&self) -> f64 {
        (0..self.num_players())
            .map(|p| self.best_attainable(p))
            .fold(f64::INFINITY, f64::min)
            .min(self.total_value())
    }

    fn total_value(&self) -> f64 {
        self.values.iter().flatten().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_defaults() {
        let inst = Instance::from_values(vec![vec![0.5, 1.0, 0.0]]).unwrap();
        assert_eq!(inst.num_players(), 1);
        assert_eq!(inst.num_items(), 3);
        assert_eq!(inst.item_name(2), "G3");
        assert_eq!(inst.player_capacity(0), 1);
        assert!((inst.value(0, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_negative_value() {
        let err = Instance::from_values(vec![vec![0.3, -0.2], vec![-0.1, 0.5]]);
        assert!(matches!(err, Err(SantaError::InvalidInstance(_))));
    }

    #[test]
    fn test_rejects_nan() {
        assert!(Instance::from_values(vec![vec![f64::NAN]]).is_err());
    }

    #[test]
    fn test_rejects_ragged_rows() {
        assert!(Instance::from_values(vec![vec![1.0, 2.0], vec![1.0]]).is_err());
    }

    #[test]
    fn test_capacity_length_mismatch() {
        let inst = Instance::from_values(vec![vec![1.0, 2.0]]).unwrap();
        assert!(inst.clone().with_item_capacities(vec![1]).is_err());
        assert!(inst.with_player_capacities(vec![1, 2]).is_err());
    }

    #[test]
    fn test_best_attainable_respects_capacity() {
        let inst = Instance::from_values(vec![vec![3.0, 1.0, 2.0]])
            .unwrap()
            .with_player_capacities(vec![2])
            .unwrap();
        assert!((inst.best_attainable(0) - 5.0).abs() < 1e-12);

        let inst = inst.with_item_capacities(vec![0, 1, 1]).unwrap();
        assert!((inst.best_attainable(0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_upper_bound_is_min_over_players() {
        let inst = Instance::from_values(vec![vec![4.0, 0.0], vec![0.0, 1.5]]).unwrap();
        assert!((inst.max_min_upper_bound() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_from_named_valuations() {
        let mut vals = BTreeMap::new();
        vals.insert(
            "P2".to_string(),
            BTreeMap::from([("G1".to_string(), 2.0)]),
        );
        vals.insert(
            "P1".to_string(),
            BTreeMap::from([("G2".to_string(), 1.0), ("G1".to_string(), 0.5)]),
        );
        let caps = BTreeMap::from([("P1".to_string(), 2)]);
        let inst = Instance::from_named_valuations(&vals, &caps, &BTreeMap::new()).unwrap();

        assert_eq!(inst.player_name(0), "P1");
        assert_eq!(inst.item_name(1), "G2");
        assert_eq!(inst.player_capacity(0), 2);
        assert_eq!(inst.player_capacity(1), 1);
        // P2 has no entry for G2
        assert_eq!(inst.value(1, 1), 0.0);
        assert_eq!(inst.value(1, 0), 2.0);
    }

    #[test]
    fn test_bundle_value() {
        let inst = Instance::from_values(vec![vec![0.25, 0.5, 1.0]]).unwrap();
        assert!((inst.bundle_value(0, &[0, 2]) - 1.25).abs() < 1e-12);
    }
}
