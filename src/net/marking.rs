//! Markings and the compressed dedup encoding.
//!
//! A marking is one [`ColorMultiset`] per place. During search every explored
//! state keeps its own copy; the search engine deduplicates states by an
//! encoded byte key, never by the in-memory representation.
//!
//! The key layout is, per place in id order: for every positive entry in
//! sequence order a varint token count followed by one varint per tuple
//! component shifted by one (so no component byte is `0x00`), then a single
//! zero terminator byte for the place. Varints are 7 bits per byte with a
//! continuation bit. Sorted entries make the key stable: equal markings
//! always produce equal bytes.
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::net::ids::{Color, PlaceId};
use crate::net::index_vec::IndexVec;
use crate::net::multiset::{ColorMultiset, ColorSequence, TokenCount};

/// Keys above this size are truncated and the state space is no longer
/// guaranteed to be fully explored.
pub const MAX_ENCODING_BYTES: usize = u16::MAX as usize;

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct ColoredMarking {
    pub places: IndexVec<PlaceId, ColorMultiset>,
}

impl ColoredMarking {
    pub fn empty(place_count: usize) -> Self {
        Self {
            places: IndexVec::from_vec(vec![ColorMultiset::new(); place_count]),
        }
    }

    pub fn place(&self, place: PlaceId) -> &ColorMultiset {
        &self.places[place]
    }

    pub fn place_mut(&mut self, place: PlaceId) -> &mut ColorMultiset {
        &mut self.places[place]
    }

    /// Token count at one place, the quantity gamma queries compare against.
    pub fn place_count(&self, place: PlaceId) -> u64 {
        self.places[place].total_count()
    }

    pub fn total_tokens(&self) -> u64 {
        self.places.iter().map(ColorMultiset::total_count).sum()
    }

    pub fn shrink(&mut self) {
        for multiset in self.places.iter_mut() {
            multiset.shrink();
        }
    }

    /// Writes the dedup key into `buf` (cleared first). Returns `false` when
    /// the key hit [`MAX_ENCODING_BYTES`] and was truncated, in which case
    /// the search is no longer exhaustive.
    pub fn compressed_encode(&self, buf: &mut Vec<u8>) -> bool {
        buf.clear();
        for multiset in self.places.iter() {
            for (sequence, count) in multiset.iter_positive() {
                write_varint(buf, count);
                for &color in sequence.colors() {
                    write_varint(buf, u64::from(color) + 1);
                }
                if buf.len() >= MAX_ENCODING_BYTES {
                    buf.truncate(MAX_ENCODING_BYTES);
                    return false;
                }
            }
            buf.push(0);
            if buf.len() >= MAX_ENCODING_BYTES {
                buf.truncate(MAX_ENCODING_BYTES);
                return false;
            }
        }
        true
    }

    /// Rebuilds a marking from an untruncated key. `arities` gives the tuple
    /// width of each place's color domain.
    pub fn compressed_decode(
        bytes: &[u8],
        arities: &IndexVec<PlaceId, usize>,
    ) -> Result<Self, EngineError> {
        let mut marking = Self::empty(arities.len());
        let mut cursor = 0usize;
        for (place, &arity) in arities.iter_enumerated() {
            loop {
                let count = read_varint(bytes, &mut cursor)?;
                if count == 0 {
                    break;
                }
                let mut colors = Vec::with_capacity(arity);
                for _ in 0..arity {
                    let shifted = read_varint(bytes, &mut cursor)?;
                    if shifted == 0 || shifted - 1 > u64::from(Color::MAX) {
                        return Err(EngineError::UnknownEncoding);
                    }
                    colors.push((shifted - 1) as Color);
                }
                marking
                    .places[place]
                    .add_count(ColorSequence::new(colors), count as TokenCount);
            }
        }
        if cursor != bytes.len() {
            return Err(EngineError::UnknownEncoding);
        }
        Ok(marking)
    }
}

impl std::fmt::Display for ColoredMarking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (place, multiset) in self.places.iter_enumerated() {
            if place.raw() > 0 {
                write!(f, " | ")?;
            }
            write!(f, "p{}: {multiset}", place.raw())?;
        }
        Ok(())
    }
}

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn read_varint(bytes: &[u8], cursor: &mut usize) -> Result<u64, EngineError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*cursor).ok_or(EngineError::UnknownEncoding)?;
        *cursor += 1;
        if shift >= 64 {
            return Err(EngineError::UnknownEncoding);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(colors: &[Color]) -> ColorSequence {
        ColorSequence::new(colors.iter().copied())
    }

    fn arities(widths: &[usize]) -> IndexVec<PlaceId, usize> {
        IndexVec::from_vec(widths.to_vec())
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut a = ColoredMarking::empty(2);
        a.places[PlaceId::new(0)].add_count(seq(&[1, 2]), 3);
        a.places[PlaceId::new(1)].add_count(seq(&[0]), 1);

        // same content added in a different order
        let mut b = ColoredMarking::empty(2);
        b.places[PlaceId::new(1)].add_count(seq(&[0]), 1);
        b.places[PlaceId::new(0)].add_count(seq(&[1, 2]), 3);

        let mut key_a = Vec::new();
        let mut key_b = Vec::new();
        assert!(a.compressed_encode(&mut key_a));
        assert!(b.compressed_encode(&mut key_b));
        assert_eq!(hex::encode(&key_a), hex::encode(&key_b));
    }

    #[test]
    fn zero_entries_do_not_change_the_key() {
        let mut a = ColoredMarking::empty(1);
        a.places[PlaceId::new(0)].add_count(seq(&[1]), 2);
        let mut b = a.clone();
        b.places[PlaceId::new(0)].add_count(seq(&[3]), 0);

        let mut key_a = Vec::new();
        let mut key_b = Vec::new();
        a.compressed_encode(&mut key_a);
        b.compressed_encode(&mut key_b);
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn different_markings_have_different_keys() {
        let mut a = ColoredMarking::empty(2);
        a.places[PlaceId::new(0)].add_count(seq(&[1]), 1);
        let mut b = ColoredMarking::empty(2);
        b.places[PlaceId::new(1)].add_count(seq(&[1]), 1);

        let mut key_a = Vec::new();
        let mut key_b = Vec::new();
        a.compressed_encode(&mut key_a);
        b.compressed_encode(&mut key_b);
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn multi_byte_varints_round_trip() {
        let mut marking = ColoredMarking::empty(1);
        marking.places[PlaceId::new(0)].add_count(seq(&[200]), 300);

        let mut key = Vec::new();
        assert!(marking.compressed_encode(&mut key));
        // count 300 and color 201 both need two varint bytes, plus terminator
        assert_eq!(key.len(), 5);

        let decoded = ColoredMarking::compressed_decode(&key, &arities(&[1])).unwrap();
        assert_eq!(decoded, marking);
    }

    #[test]
    fn decode_round_trips_products_and_empty_places() {
        let mut marking = ColoredMarking::empty(3);
        marking.places[PlaceId::new(0)].add_count(seq(&[0, 4]), 2);
        marking.places[PlaceId::new(0)].add_count(seq(&[3, 1]), 1);
        marking.places[PlaceId::new(2)].add_count(seq(&[7]), 9);

        let mut key = Vec::new();
        assert!(marking.compressed_encode(&mut key));
        let decoded = ColoredMarking::compressed_decode(&key, &arities(&[2, 1, 1])).unwrap();
        assert_eq!(decoded, marking);
    }

    #[test]
    fn oversized_markings_truncate_and_flag() {
        let mut marking = ColoredMarking::empty(1);
        // enough distinct colors that the key must blow past the ceiling
        for color in 0..40_000u32 {
            marking.places[PlaceId::new(0)].add_count(seq(&[color]), 1);
        }
        let mut key = Vec::new();
        assert!(!marking.compressed_encode(&mut key));
        assert_eq!(key.len(), MAX_ENCODING_BYTES);
    }

    #[test]
    fn truncated_keys_fail_decoding() {
        let mut marking = ColoredMarking::empty(1);
        marking.places[PlaceId::new(0)].add_count(seq(&[1]), 1);
        let mut key = Vec::new();
        marking.compressed_encode(&mut key);
        key.pop();
        assert!(ColoredMarking::compressed_decode(&key, &arities(&[1])).is_err());
    }
}
