//! Per-state binding constraints.
//!
//! For a concrete marking, each constrained variable of a transition can
//! only take colors that are actually present (shifted by the constraint
//! offset) in the pre-places it binds tokens from. Intersecting those
//! candidate sets collapses the binding space the generator has to walk,
//! often by orders of magnitude. The result is cached per (state,
//! transition) and dropped once the state is fully expanded.

use std::collections::BTreeMap;

use crate::net::binding::BindingCodec;
use crate::net::ids::{Color, TransitionId};

/// Values one variable may still take under a marking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PossibleValues {
    /// Unconstrained: the variable's whole domain.
    Any,
    /// Sorted, deduplicated candidate colors.
    Restricted(Vec<Color>),
}

impl PossibleValues {
    /// Number of candidates, given the variable's domain size.
    pub fn len(&self, domain: u32) -> u64 {
        match self {
            PossibleValues::Any => u64::from(domain),
            PossibleValues::Restricted(colors) => colors.len() as u64,
        }
    }

    /// Restricts to the intersection with `colors`, which must be sorted
    /// and deduplicated.
    pub fn intersect_sorted(&mut self, colors: &[Color]) {
        match self {
            PossibleValues::Any => *self = PossibleValues::Restricted(colors.to_vec()),
            PossibleValues::Restricted(existing) => {
                let mut merged = Vec::with_capacity(existing.len().min(colors.len()));
                let (mut i, mut j) = (0usize, 0usize);
                while i < existing.len() && j < colors.len() {
                    match existing[i].cmp(&colors[j]) {
                        std::cmp::Ordering::Less => i += 1,
                        std::cmp::Ordering::Greater => j += 1,
                        std::cmp::Ordering::Equal => {
                            merged.push(existing[i]);
                            i += 1;
                            j += 1;
                        }
                    }
                }
                *existing = merged;
            }
        }
    }

    /// The `digit`-th candidate in ascending color order.
    pub fn color_at(&self, digit: u64) -> Color {
        match self {
            PossibleValues::Any => digit as Color,
            PossibleValues::Restricted(colors) => colors[digit as usize],
        }
    }

    /// Digit of exactly `color`, if it is a candidate.
    pub fn digit_of(&self, color: Color, domain: u32) -> Option<u64> {
        match self {
            PossibleValues::Any => (color < domain).then_some(u64::from(color)),
            PossibleValues::Restricted(colors) => {
                colors.binary_search(&color).ok().map(|index| index as u64)
            }
        }
    }

    /// Smallest digit whose candidate is `>= color`, together with that
    /// candidate.
    pub fn digit_at_or_after(&self, color: Color, domain: u32) -> Option<(u64, Color)> {
        match self {
            PossibleValues::Any => (color < domain).then_some((u64::from(color), color)),
            PossibleValues::Restricted(colors) => {
                let index = colors.partition_point(|&candidate| candidate < color);
                colors.get(index).map(|&candidate| (index as u64, candidate))
            }
        }
    }
}

/// Candidate sets for one (state, transition) pair, parallel to the
/// transition's sorted variable list, plus the mixed-radix code over the
/// candidate counts.
#[derive(Debug, Clone)]
pub struct ConstraintData {
    pub possible: Vec<PossibleValues>,
    pub reduced: BindingCodec,
}

/// Cache of [`ConstraintData`] keyed by state id and transition. Keys pack
/// the low 48 bits of the state id above a 16-bit transition index, so one
/// range deletion evicts a whole state.
#[derive(Debug, Default)]
pub struct ConstraintCache {
    entries: BTreeMap<u64, ConstraintData>,
}

impl ConstraintCache {
    const STATE_MASK: u64 = 0xFFFF_FFFF_FFFF;
    const TRANSITION_MASK: u64 = 0xFFFF;

    pub fn new() -> Self {
        ConstraintCache::default()
    }

    fn key(state: u64, transition: TransitionId) -> u64 {
        ((state & Self::STATE_MASK) << 16)
            | (u64::from(transition.raw()) & Self::TRANSITION_MASK)
    }

    pub fn get_or_insert_with(
        &mut self,
        state: u64,
        transition: TransitionId,
        build: impl FnOnce() -> ConstraintData,
    ) -> &ConstraintData {
        self.entries
            .entry(Self::key(state, transition))
            .or_insert_with(build)
    }

    /// Drops every entry of `state`.
    pub fn forget_state(&mut self, state: u64) {
        let start = Self::key(state, TransitionId::new(0));
        let end = start | Self::TRANSITION_MASK;
        let keys: Vec<u64> = self.entries.range(start..=end).map(|(key, _)| *key).collect();
        for key in keys {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_narrows_and_preserves_order() {
        let mut values = PossibleValues::Any;
        values.intersect_sorted(&[1, 3, 5]);
        assert_eq!(values, PossibleValues::Restricted(vec![1, 3, 5]));

        values.intersect_sorted(&[0, 3, 4, 5]);
        assert_eq!(values, PossibleValues::Restricted(vec![3, 5]));
        assert_eq!(values.len(9), 2);

        values.intersect_sorted(&[4]);
        assert_eq!(values.len(9), 0);
    }

    #[test]
    fn digit_lookup_over_any_and_restricted() {
        let any = PossibleValues::Any;
        assert_eq!(any.digit_of(2, 4), Some(2));
        assert_eq!(any.digit_of(4, 4), None);
        assert_eq!(any.digit_at_or_after(1, 4), Some((1, 1)));
        assert_eq!(any.digit_at_or_after(4, 4), None);

        let restricted = PossibleValues::Restricted(vec![2, 5, 7]);
        assert_eq!(restricted.color_at(1), 5);
        assert_eq!(restricted.digit_of(5, 9), Some(1));
        assert_eq!(restricted.digit_of(4, 9), None);
        assert_eq!(restricted.digit_at_or_after(3, 9), Some((1, 5)));
        assert_eq!(restricted.digit_at_or_after(8, 9), None);
    }

    #[test]
    fn cache_evicts_exactly_one_state() {
        let mut cache = ConstraintCache::new();
        let data = || ConstraintData {
            possible: Vec::new(),
            reduced: BindingCodec::empty(),
        };
        cache.get_or_insert_with(7, TransitionId::new(0), data);
        cache.get_or_insert_with(7, TransitionId::new(3), data);
        cache.get_or_insert_with(8, TransitionId::new(0), data);
        assert_eq!(cache.len(), 3);

        cache.forget_state(7);
        assert_eq!(cache.len(), 1);
        cache.forget_state(8);
        assert!(cache.is_empty());
    }
}
