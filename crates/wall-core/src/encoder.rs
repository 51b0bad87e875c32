//! # Interval Encoder
//!
//! Pure bookkeeping for the nested-set encoding. Nothing here touches
//! storage: each operation returns a plan (new bounds plus a [`Shift`]) that
//! the tree store executes inside one transaction.
//!
//! The whole forest shares one numbering. Roots follow each other by `left`,
//! and every bound in use is one of `1..=2n` for `n` stored messages.

use crate::models::{Bounds, Message, MessageId};

/// "Every bound value `>= from` moves by `delta`."
///
/// Applied to `left` and `right` independently, which is what lets an
/// ancestor's `right` grow while its `left` stays put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub from: i64,
    pub delta: i64,
}

impl Shift {
    pub fn apply_value(&self, value: i64) -> i64 {
        if value >= self.from {
            value + self.delta
        } else {
            value
        }
    }

    pub fn apply(&self, bounds: Bounds) -> Bounds {
        Bounds::new(self.apply_value(bounds.left), self.apply_value(bounds.right))
    }
}

/// Where a new reply goes and what has to move to make room for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildPlacement {
    pub bounds: Bounds,
    /// Opens a 2-wide gap at the parent's old `right`.
    pub shift: Shift,
}

/// What a subtree deletion removes and how the gap is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Every row enclosed by this interval goes, the target included.
    pub span: Bounds,
    pub shift: Shift,
}

impl Removal {
    pub fn removes(&self, bounds: &Bounds) -> bool {
        self.span.encloses(bounds)
    }

    pub fn row_count(&self) -> i64 {
        self.span.subtree_size()
    }
}

/// Bounds for a new root appended after every existing root.
///
/// `max_right` is the largest `right` in the forest, `None` when empty.
/// Nothing else moves.
pub fn place_root(max_right: Option<i64>) -> Bounds {
    let left = max_right.unwrap_or(0) + 1;
    Bounds::new(left, left + 1)
}

/// Bounds for a new last child of `parent`.
///
/// This is the expensive case: everything positioned at or after the
/// parent's `right` shifts, including later roots.
pub fn place_child(parent: Bounds) -> ChildPlacement {
    ChildPlacement {
        bounds: Bounds::new(parent.right, parent.right + 1),
        shift: Shift { from: parent.right, delta: 2 },
    }
}

/// Removal plan for `node` and all of its descendants.
pub fn remove_subtree(node: Bounds) -> Removal {
    Removal {
        span: node,
        shift: Shift { from: node.right + 1, delta: -node.width() },
    }
}

/// Checks the encoding of a complete forest.
///
/// Verifies that bounds use exactly `1..=2n`, that intervals nest or stay
/// disjoint, and that interval containment agrees with the stored parent
/// links. Returns a description of the first violation found.
pub fn verify_forest(messages: &[Message]) -> Result<(), String> {
    let mut values: Vec<i64> = messages
        .iter()
        .flat_map(|m| [m.bounds.left, m.bounds.right])
        .collect();
    values.sort_unstable();
    for (expected, value) in (1..).zip(values.iter()) {
        if *value != expected {
            return Err(format!("bound {expected} is missing or duplicated (found {value})"));
        }
    }

    let mut ordered: Vec<&Message> = messages.iter().collect();
    ordered.sort_by_key(|m| m.bounds.left);

    let mut open: Vec<(MessageId, Bounds)> = Vec::new();
    for message in ordered {
        let bounds = message.bounds;
        if bounds.left >= bounds.right {
            return Err(format!("message {} has inverted bounds {bounds:?}", message.id));
        }
        while matches!(open.last(), Some((_, top)) if top.right < bounds.left) {
            open.pop();
        }
        match open.last() {
            Some((parent_id, parent)) => {
                if !parent.contains(&bounds) {
                    return Err(format!(
                        "message {} {bounds:?} overlaps {parent_id} {parent:?}",
                        message.id
                    ));
                }
                if message.parent_id != Some(*parent_id) {
                    return Err(format!(
                        "message {} sits inside {parent_id} but points at {:?}",
                        message.id, message.parent_id
                    ));
                }
            }
            None => {
                if message.parent_id.is_some() {
                    return Err(format!("message {} has a parent but is not nested", message.id));
                }
            }
        }
        open.push((message.id, bounds));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_root_gets_one_two() {
        assert_eq!(place_root(None), Bounds::new(1, 2));
    }

    #[test]
    fn roots_append_after_the_last_right() {
        assert_eq!(place_root(Some(12)), Bounds::new(13, 14));
    }

    #[test]
    fn child_lands_at_parent_right() {
        // R(1,10) with children (2,5) and (6,9)
        let plan = place_child(Bounds::new(1, 10));
        assert_eq!(plan.bounds, Bounds::new(10, 11));
        assert_eq!(plan.shift.apply(Bounds::new(1, 10)), Bounds::new(1, 12));
        assert_eq!(plan.shift.apply(Bounds::new(2, 5)), Bounds::new(2, 5));
        assert_eq!(plan.shift.apply(Bounds::new(6, 9)), Bounds::new(6, 9));
        // a later root moves along
        assert_eq!(plan.shift.apply(Bounds::new(11, 12)), Bounds::new(13, 14));
    }

    #[test]
    fn removal_closes_the_gap() {
        let plan = remove_subtree(Bounds::new(6, 9));
        assert_eq!(plan.row_count(), 2);
        assert!(plan.removes(&Bounds::new(7, 8)));
        assert!(plan.removes(&Bounds::new(6, 9)));
        assert!(!plan.removes(&Bounds::new(2, 5)));
        assert_eq!(plan.shift.apply(Bounds::new(1, 12)), Bounds::new(1, 8));
        assert_eq!(plan.shift.apply(Bounds::new(10, 11)), Bounds::new(6, 7));
        assert_eq!(plan.shift.apply(Bounds::new(2, 5)), Bounds::new(2, 5));
    }
}
