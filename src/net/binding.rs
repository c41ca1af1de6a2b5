//! Variable valuations and the mixed-radix index over them.
//!
//! A transition with variables `x: A, y: B` has `|A| * |B|` candidate
//! bindings. The checker never materializes that space; it addresses it
//! through a [`BindingIndex`] and decodes on demand, least significant
//! variable first.

use crate::net::ids::{BindingIndex, Color, VariableId};
use crate::net::index_vec::IndexVec;

/// Wraps `value` into `0..size`, treating the color domain as cyclic in both
/// directions. `size` must be positive.
pub fn signed_wrap(value: i64, size: u32) -> Color {
    let size = i64::from(size);
    (((value % size) + size) % size) as Color
}

/// One concrete valuation of variables. Sized to the whole net's variable
/// table; variables a transition does not use stay zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    values: IndexVec<VariableId, Color>,
}

impl Binding {
    pub fn zeroed(variable_count: usize) -> Self {
        Binding {
            values: IndexVec::from_vec(vec![0; variable_count]),
        }
    }

    pub fn value(&self, variable: VariableId) -> Color {
        self.values.get(variable).copied().unwrap_or(0)
    }

    pub fn set(&mut self, variable: VariableId, color: Color) {
        if let Some(slot) = self.values.get_mut(variable) {
            *slot = color;
        }
    }
}

/// Mixed-radix positional code over a fixed list of digit sizes, least
/// significant digit first.
///
/// The total is the product of all sizes; construction fails when that
/// product overflows [`BindingIndex`]. An empty size list encodes exactly
/// one index, the empty binding. Digits are only queried for indices below
/// [`BindingCodec::total`], so a codec with a zero-sized digit is never
/// decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingCodec {
    sizes: Vec<u64>,
    weights: Vec<u64>,
    total: BindingIndex,
}

impl BindingCodec {
    /// The code over no digits: exactly one index, the empty binding.
    pub fn empty() -> Self {
        BindingCodec {
            sizes: Vec::new(),
            weights: Vec::new(),
            total: 1,
        }
    }

    /// A code with no valid indices at all.
    pub fn vacant() -> Self {
        BindingCodec {
            sizes: vec![0],
            weights: vec![1],
            total: 0,
        }
    }

    pub fn new(sizes: Vec<u64>) -> Option<Self> {
        let mut weights = Vec::with_capacity(sizes.len());
        let mut total: BindingIndex = 1;
        for &size in &sizes {
            weights.push(total);
            total = total.checked_mul(size)?;
        }
        Some(BindingCodec {
            sizes,
            weights,
            total,
        })
    }

    pub fn total(&self) -> BindingIndex {
        self.total
    }

    pub fn digit_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn size(&self, digit: usize) -> u64 {
        self.sizes[digit]
    }

    /// The `digit`-th digit of `index`.
    pub fn digit(&self, index: BindingIndex, digit: usize) -> u64 {
        (index / self.weights[digit]) % self.sizes[digit]
    }

    pub fn encode(&self, digits: &[u64]) -> BindingIndex {
        digits.iter().zip(&self.weights).map(|(d, w)| d * w).sum()
    }

    pub fn decode(&self, index: BindingIndex, digits: &mut Vec<u64>) {
        digits.clear();
        for position in 0..self.sizes.len() {
            digits.push(self.digit(index, position));
        }
    }
}
