//! Fat/thin item classification.

use super::instance::Instance;
use std::collections::BTreeSet;

/// Partition of the items relative to a threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemClasses {
    /// Items worth at least the threshold to some player on their own.
    pub fat: BTreeSet<usize>,
    /// All remaining items.
    pub thin: BTreeSet<usize>,
}

impl ItemClasses {
    #[inline]
    pub fn is_fat(&self, g: usize) -> bool {
        self.fat.contains(&g)
    }

    /// Number of fat items in `items`.
    pub fn fat_count<'a>(&self, items: impl IntoIterator<Item = &'a usize>) -> usize {
        items.into_iter().filter(|g| self.fat.contains(g)).count()
    }
}

/// Classifies items as fat or thin relative to `threshold`.
///
/// Item `g` is fat iff some player `p` has `V[p][g] >= threshold`; the
/// boundary is inclusive.
///
/// # Examples
///
/// ```
/// use u_fairalloc::santa::{classify_items, Instance};
///
/// let inst = Instance::from_values(vec![vec![0.9, 0.1], vec![0.2, 0.9]]).unwrap();
/// let classes = classify_items(&inst, 0.9);
/// assert_eq!(classes.fat.len(), 2);
/// assert!(classes.thin.is_empty());
/// ```
pub fn classify_items(instance: &Instance, threshold: f64) -> ItemClasses {
    let mut classes = ItemClasses::default();
    for g in 0..instance.num_items() {
        let fat = (0..instance.num_players()).any(|p| instance.value(p, g) >= threshold);
        if fat {
            classes.fat.insert(g);
        } else {
            classes.thin.insert(g);
        }
    }
    classes
}
