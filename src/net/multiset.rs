//! Colored token multisets.
//!
//! A token in a colored net is a sequence of colors, one per dimension of the
//! place's (possibly product) color domain. A place's content is a multiset
//! over such sequences, stored sparsely as a sorted vector of
//! `(sequence, count)` entries with a cached total cardinality.
//!
//! Counts are kept signed: subtraction may dip below zero mid-operation and
//! [`ColorMultiset::fix_negative`] clamps the affected entries back to zero,
//! matching the token-game rule that an arc never removes more tokens than a
//! place holds. All comparisons skip non-positive entries, so a multiset with
//! stale zero entries is equal to its [`ColorMultiset::shrink`]-ed form.
use std::fmt;
use std::ops::{AddAssign, MulAssign, SubAssign};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::ids::Color;

/// Signed token count. Negative values only appear transiently between a
/// subtraction and the following [`ColorMultiset::fix_negative`].
pub type TokenCount = i64;

/// One colored token: an ordered tuple of colors, compared lexicographically.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColorSequence(pub SmallVec<[Color; 2]>);

impl ColorSequence {
    pub fn new(colors: impl IntoIterator<Item = Color>) -> Self {
        Self(colors.into_iter().collect())
    }

    pub fn single(color: Color) -> Self {
        let mut colors = SmallVec::new();
        colors.push(color);
        Self(colors)
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn colors(&self) -> &[Color] {
        &self.0
    }
}

impl fmt::Debug for ColorSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, color) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{color}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for ColorSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Sparse multiset from color sequence to token count.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ColorMultiset {
    counts: Vec<(ColorSequence, TokenCount)>,
    cardinality: TokenCount,
}

impl ColorMultiset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a multiset from unsorted pairs, merging duplicate sequences.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ColorSequence, TokenCount)>) -> Self {
        let mut multiset = Self::new();
        for (sequence, count) in pairs {
            multiset.add_count(sequence, count);
        }
        multiset
    }

    pub fn count(&self, sequence: &ColorSequence) -> TokenCount {
        match self.position(sequence) {
            Ok(idx) => self.counts[idx].1,
            Err(_) => 0,
        }
    }

    pub fn set_count(&mut self, sequence: ColorSequence, count: TokenCount) {
        match self.position(&sequence) {
            Ok(idx) => {
                self.cardinality += count - self.counts[idx].1;
                self.counts[idx].1 = count;
            }
            Err(idx) => {
                self.cardinality += count;
                self.counts.insert(idx, (sequence, count));
            }
        }
    }

    pub fn add_count(&mut self, sequence: ColorSequence, count: TokenCount) {
        self.cardinality += count;
        match self.position(&sequence) {
            Ok(idx) => self.counts[idx].1 += count,
            Err(idx) => self.counts.insert(idx, (sequence, count)),
        }
    }

    /// Total number of tokens. Zero-clamped so a caller never observes the
    /// transient negative state between subtraction and `fix_negative`.
    pub fn total_count(&self) -> u64 {
        self.cardinality.max(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Raw entries, including any non-positive ones not yet shrunk away.
    pub fn entries(&self) -> &[(ColorSequence, TokenCount)] {
        &self.counts
    }

    /// Entries with a positive count, in sequence order.
    pub fn iter_positive(&self) -> impl Iterator<Item = (&ColorSequence, u64)> {
        self.counts
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(sequence, count)| (sequence, *count as u64))
    }

    /// Drops non-positive entries and releases excess capacity.
    pub fn shrink(&mut self) {
        self.counts.retain(|(_, count)| *count > 0);
        self.counts.shrink_to_fit();
    }

    /// Clamps negative entries to zero, restoring the cardinality invariant.
    pub fn fix_negative(&mut self) {
        for (_, count) in self.counts.iter_mut() {
            if *count < 0 {
                self.cardinality += -*count;
                *count = 0;
            }
        }
    }

    /// `self ⊆ other`: every positive count in `self` is covered by `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        if self.cardinality > other.cardinality {
            return false;
        }
        let mut lhs = self.counts.iter().filter(|(_, count)| *count > 0);
        let mut rhs = other.counts.iter().filter(|(_, count)| *count > 0);
        let mut a = lhs.next();
        let mut b = rhs.next();
        while let (Some((aseq, acount)), Some((bseq, bcount))) = (a, b) {
            match aseq.cmp(bseq) {
                std::cmp::Ordering::Equal => {
                    if acount > bcount {
                        return false;
                    }
                    a = lhs.next();
                    b = rhs.next();
                }
                // lhs holds a sequence rhs lacks
                std::cmp::Ordering::Less => return false,
                std::cmp::Ordering::Greater => b = rhs.next(),
            }
        }
        a.is_none()
    }

    /// `self ⊇ other`.
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    fn position(&self, sequence: &ColorSequence) -> Result<usize, usize> {
        self.counts
            .binary_search_by(|(candidate, _)| candidate.cmp(sequence))
    }
}

impl PartialEq for ColorMultiset {
    fn eq(&self, other: &Self) -> bool {
        if self.cardinality != other.cardinality {
            return false;
        }
        let mut lhs = self.counts.iter().filter(|(_, count)| *count != 0);
        let mut rhs = other.counts.iter().filter(|(_, count)| *count != 0);
        loop {
            match (lhs.next(), rhs.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a == b => {}
                _ => return false,
            }
        }
    }
}

impl Eq for ColorMultiset {}

impl AddAssign<&ColorMultiset> for ColorMultiset {
    fn add_assign(&mut self, other: &ColorMultiset) {
        let mut merged = Vec::with_capacity(self.counts.len() + other.counts.len());
        let mut lhs = std::mem::take(&mut self.counts).into_iter().peekable();
        let mut rhs = other.counts.iter().cloned().peekable();
        loop {
            match (lhs.peek(), rhs.peek()) {
                (Some((aseq, _)), Some((bseq, _))) => match aseq.cmp(bseq) {
                    std::cmp::Ordering::Equal => {
                        let (seq, acount) = lhs.next().unwrap();
                        let (_, bcount) = rhs.next().unwrap();
                        self.cardinality += bcount;
                        merged.push((seq, acount + bcount));
                    }
                    std::cmp::Ordering::Less => merged.push(lhs.next().unwrap()),
                    std::cmp::Ordering::Greater => {
                        let entry = rhs.next().unwrap();
                        self.cardinality += entry.1;
                        merged.push(entry);
                    }
                },
                (Some(_), None) => merged.push(lhs.next().unwrap()),
                (None, Some(_)) => {
                    let entry = rhs.next().unwrap();
                    self.cardinality += entry.1;
                    merged.push(entry);
                }
                (None, None) => break,
            }
        }
        self.counts = merged;
    }
}

impl SubAssign<&ColorMultiset> for ColorMultiset {
    fn sub_assign(&mut self, other: &ColorMultiset) {
        let mut merged = Vec::with_capacity(self.counts.len() + other.counts.len());
        let mut lhs = std::mem::take(&mut self.counts).into_iter().peekable();
        let mut rhs = other.counts.iter().cloned().peekable();
        loop {
            match (lhs.peek(), rhs.peek()) {
                (Some((aseq, _)), Some((bseq, _))) => match aseq.cmp(bseq) {
                    std::cmp::Ordering::Equal => {
                        let (seq, acount) = lhs.next().unwrap();
                        let (_, bcount) = rhs.next().unwrap();
                        self.cardinality -= bcount;
                        merged.push((seq, acount - bcount));
                    }
                    std::cmp::Ordering::Less => merged.push(lhs.next().unwrap()),
                    std::cmp::Ordering::Greater => {
                        let (seq, count) = rhs.next().unwrap();
                        self.cardinality -= count;
                        merged.push((seq, -count));
                    }
                },
                (Some(_), None) => merged.push(lhs.next().unwrap()),
                (None, Some(_)) => {
                    let (seq, count) = rhs.next().unwrap();
                    self.cardinality -= count;
                    merged.push((seq, -count));
                }
                (None, None) => break,
            }
        }
        self.counts = merged;
    }
}

impl MulAssign<TokenCount> for ColorMultiset {
    fn mul_assign(&mut self, factor: TokenCount) {
        for (_, count) in self.counts.iter_mut() {
            *count *= factor;
        }
        self.cardinality *= factor;
    }
}

impl fmt::Debug for ColorMultiset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (sequence, count) in self.counts.iter().filter(|(_, count)| *count != 0) {
            if !first {
                write!(f, " + ")?;
            }
            write!(f, "{count}'{sequence}")?;
            first = false;
        }
        if first {
            write!(f, "0")?;
        }
        Ok(())
    }
}

impl fmt::Display for ColorMultiset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
