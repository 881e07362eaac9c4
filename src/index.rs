// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # Hierarchical Segment Indices
//!
//! Indexed segments open with a positional index that restores file order
//! after a round trip. The index is a primary field optionally followed by a
//! chain of levels, each introduced by a 4-slot marker:
//!
//! ```text
//! [ primary (20 bits) ][ MMMM | value (10 bits) ][ MMMM | value (10 bits) ] ...
//! ```
//!
//! Chain levels let a new segment be placed *between* two existing ones
//! without renumbering anything: `[7, 3]` sorts after `[7]` and before `[8]`.
//!
//! ## Ordering
//!
//! Indices compare lexicographically with missing trailing levels read as
//! zero. Consequently `[5]` and `[5, 0]` are the *same* position, and
//! [`HierarchicalIndex`] implements `Eq` and `Hash` accordingly.
//!
//! ## Ordinals
//!
//! At a fixed depth `d` every index is a mixed-radix number: the primary value
//! is the most significant digit and each level is a digit of radix
//! `2^(level_width - 4)`. [`IndexLayout::ordinal_at_depth`] maps an index
//! (padded or truncated to depth `d`) to that number and
//! [`IndexLayout::from_ordinal`] maps it back, which turns "find room between
//! two indices" into integer arithmetic.
//!
//! ```rust
//! use dnaver::index::{HierarchicalIndex, IndexLayout};
//!
//! let layout = IndexLayout::default();
//! let index = HierarchicalIndex::with_levels(7, [3]);
//! let segment = layout.connect(&index, &[true, false]).unwrap();
//! let (decoded, payload) = layout.divide(&segment).unwrap();
//! assert_eq!(decoded, index);
//! assert_eq!(payload, vec![true, false]);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{CapacityShortfall, CodecError, Result};
use crate::segment::{Segment, Slot, push_field};

/// Number of marker slots that open a chain level.
pub const MARKER_WIDTH: usize = 4;

/// Largest combined bit width an ordinal may need.
const MAX_ORDINAL_BITS: usize = 120;

// ============================================================================
// Hierarchical Index
// ============================================================================

/// A positional index: primary value plus zero or more chain levels.
#[derive(Debug, Clone)]
pub struct HierarchicalIndex(Vec<u64>);

impl HierarchicalIndex {
    /// A depth-zero index.
    pub fn new(primary: u64) -> Self {
        HierarchicalIndex(vec![primary])
    }

    /// An index with the given chain levels below `primary`.
    pub fn with_levels(primary: u64, levels: impl IntoIterator<Item = u64>) -> Self {
        let mut values = vec![primary];
        values.extend(levels);
        HierarchicalIndex(values)
    }

    /// Primary field value.
    #[inline]
    pub fn primary(&self) -> u64 {
        self.0[0]
    }

    /// Chain level values, outermost first.
    #[inline]
    pub fn levels(&self) -> &[u64] {
        &self.0[1..]
    }

    /// All values, primary first.
    #[inline]
    pub fn values(&self) -> &[u64] {
        &self.0
    }

    /// Number of chain levels.
    #[inline]
    pub fn depth(&self) -> usize {
        self.0.len() - 1
    }

    /// Values without trailing zero levels; equal indices share this form.
    fn canonical(&self) -> &[u64] {
        let mut end = self.0.len();
        while end > 1 && self.0[end - 1] == 0 {
            end -= 1;
        }
        &self.0[..end]
    }
}

impl PartialEq for HierarchicalIndex {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for HierarchicalIndex {}

impl Hash for HierarchicalIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl Ord for HierarchicalIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for level in 0..len {
            let a = self.0.get(level).copied().unwrap_or(0);
            let b = other.0.get(level).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for HierarchicalIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for HierarchicalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

// ============================================================================
// Index Layout
// ============================================================================

/// Field widths of the hierarchical index prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexLayout {
    /// Width of the primary field in bits.
    pub primary_width: usize,
    /// Width of one chain level: marker plus value.
    pub level_width: usize,
    /// Maximum number of chain levels.
    pub max_levels: usize,
}

impl Default for IndexLayout {
    fn default() -> Self {
        IndexLayout {
            primary_width: 20,
            level_width: 14,
            max_levels: 6,
        }
    }
}

impl IndexLayout {
    /// Checks the structural rules of the layout.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] when a level has no room for a
    /// value or the combined widths do not fit an ordinal.
    pub fn validate(&self) -> Result<()> {
        if self.primary_width == 0 || self.primary_width > 63 {
            return Err(CodecError::config(format!(
                "primary index width must be in 1..=63, got {}",
                self.primary_width
            )));
        }
        if self.level_width <= MARKER_WIDTH || self.value_width() > 63 {
            return Err(CodecError::config(format!(
                "chain level width must exceed the {}-slot marker, got {}",
                MARKER_WIDTH, self.level_width
            )));
        }
        let ordinal_bits = self.primary_width + self.max_levels * self.value_width();
        if ordinal_bits > MAX_ORDINAL_BITS {
            return Err(CodecError::config(format!(
                "index of {} value bits exceeds the {}-bit ordinal range",
                ordinal_bits, MAX_ORDINAL_BITS
            )));
        }
        Ok(())
    }

    /// Value bits of one chain level.
    #[inline]
    pub fn value_width(&self) -> usize {
        self.level_width.saturating_sub(MARKER_WIDTH)
    }

    /// Number of distinct values a chain level can hold.
    #[inline]
    pub fn level_radix(&self) -> u128 {
        1u128 << self.value_width()
    }

    /// Number of distinct primary values.
    #[inline]
    pub fn primary_capacity(&self) -> u128 {
        1u128 << self.primary_width
    }

    /// Number of distinct indices of exactly `depth` levels.
    pub fn depth_capacity(&self, depth: usize) -> u128 {
        self.primary_capacity() << (depth * self.value_width())
    }

    /// Slots occupied by an index of `depth` levels.
    #[inline]
    pub fn index_width(&self, depth: usize) -> usize {
        self.primary_width + depth * self.level_width
    }

    /// Slot position where the marker of chain level `level` (zero-based) starts.
    #[inline]
    pub fn chain_position(&self, level: usize) -> usize {
        self.index_width(level)
    }

    // ------------------------------------------------------------------------
    // Slot Encoding
    // ------------------------------------------------------------------------

    /// Encodes an index into slots.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::IndexCapacity`] if the index is deeper than
    /// `max_levels` or a value does not fit its field.
    pub fn encode(&self, index: &HierarchicalIndex) -> Result<Segment> {
        if index.depth() > self.max_levels {
            return Err(CapacityShortfall::DepthExceeded {
                depth: index.depth(),
                limit: self.max_levels,
            }
            .into());
        }
        check_fits(index.primary() as u128, self.primary_width)?;

        let mut bits = Vec::with_capacity(self.primary_width);
        push_field(&mut bits, index.primary() as u128, self.primary_width);
        let mut slots: Segment = bits.into_iter().map(Slot::Bit).collect();

        for &value in index.levels() {
            check_fits(value as u128, self.value_width())?;
            slots.extend([Slot::Marker; MARKER_WIDTH]);
            let mut bits = Vec::with_capacity(self.value_width());
            push_field(&mut bits, value as u128, self.value_width());
            slots.extend(bits.into_iter().map(Slot::Bit));
        }
        Ok(slots)
    }

    /// Prepends the encoded index to payload bits.
    pub fn connect(&self, index: &HierarchicalIndex, payload: &[bool]) -> Result<Segment> {
        let mut segment = self.encode(index)?;
        segment.extend(payload.iter().map(|&b| Slot::Bit(b)));
        Ok(segment)
    }

    /// Splits a segment into its index and payload bits.
    ///
    /// A chain level is read whenever four marker slots sit at the next
    /// expected chain position.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedSequence`] if the segment is shorter than
    /// its index, a chain marker is incomplete, or a marker appears where
    /// bits are expected.
    pub fn divide(&self, segment: &[Slot]) -> Result<(HierarchicalIndex, Vec<bool>)> {
        if segment.len() < self.primary_width {
            return Err(CodecError::malformed(format!(
                "segment of {} slots is shorter than the {}-bit primary index",
                segment.len(),
                self.primary_width
            )));
        }
        let primary = read_bits(&segment[..self.primary_width], "primary index")?;
        let mut values = vec![primary as u64];

        let mut pos = self.primary_width;
        while values.len() <= self.max_levels {
            let markers = segment[pos..]
                .iter()
                .take(MARKER_WIDTH)
                .take_while(|s| s.is_marker())
                .count();
            if markers == 0 {
                break;
            }
            if markers < MARKER_WIDTH || pos + self.level_width > segment.len() {
                return Err(CodecError::malformed(format!(
                    "incomplete chain level at slot {}",
                    pos
                )));
            }
            let value_start = pos + MARKER_WIDTH;
            let value = read_bits(&segment[value_start..pos + self.level_width], "chain level")?;
            values.push(value as u64);
            pos += self.level_width;
        }

        let payload = segment[pos..]
            .iter()
            .map(|s| {
                s.bit().ok_or_else(|| {
                    CodecError::malformed("marker slot inside payload".to_string())
                })
            })
            .collect::<Result<Vec<bool>>>()?;
        Ok((HierarchicalIndex(values), payload))
    }

    // ------------------------------------------------------------------------
    // Ordinals
    // ------------------------------------------------------------------------

    /// The index as a mixed-radix number at `depth`, padding missing levels
    /// with zero and ignoring levels deeper than `depth`.
    pub fn ordinal_at_depth(&self, index: &HierarchicalIndex, depth: usize) -> u128 {
        let radix = self.level_radix();
        let mut ordinal = index.primary() as u128;
        for level in 1..=depth {
            let value = index.values().get(level).copied().unwrap_or(0) as u128;
            ordinal = ordinal * radix + value;
        }
        ordinal
    }

    /// The index of exactly `depth` levels whose ordinal is `ordinal`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::IndexCapacity`] if the ordinal is beyond the
    /// capacity of that depth.
    pub fn from_ordinal(&self, ordinal: u128, depth: usize) -> Result<HierarchicalIndex> {
        if depth > self.max_levels {
            return Err(CapacityShortfall::DepthExceeded {
                depth,
                limit: self.max_levels,
            }
            .into());
        }
        if ordinal >= self.depth_capacity(depth) {
            return Err(CapacityShortfall::ValueOverflow {
                value: ordinal,
                width: self.primary_width + depth * self.value_width(),
            }
            .into());
        }
        let radix = self.level_radix();
        let mut rest = ordinal;
        let mut levels = vec![0u64; depth];
        for slot in levels.iter_mut().rev() {
            *slot = (rest % radix) as u64;
            rest /= radix;
        }
        Ok(HierarchicalIndex::with_levels(rest as u64, levels))
    }

    /// Encodes an integer position using the fewest chain levels that can
    /// represent it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dnaver::index::IndexLayout;
    ///
    /// let layout = IndexLayout::default();
    /// assert_eq!(layout.encode_value(42).unwrap().values(), &[42]);
    /// assert_eq!(layout.encode_value(1 << 20).unwrap().depth(), 1);
    /// ```
    pub fn encode_value(&self, value: u128) -> Result<HierarchicalIndex> {
        for depth in 0..=self.max_levels {
            if value < self.depth_capacity(depth) {
                return self.from_ordinal(value, depth);
            }
        }
        Err(CapacityShortfall::ValueOverflow {
            value,
            width: self.primary_width + self.max_levels * self.value_width(),
        }
        .into())
    }
}

fn check_fits(value: u128, width: usize) -> Result<()> {
    if value >> width != 0 {
        return Err(CapacityShortfall::ValueOverflow { value, width }.into());
    }
    Ok(())
}

fn read_bits(slots: &[Slot], field: &str) -> Result<u128> {
    slots.iter().try_fold(0u128, |acc, slot| match slot.bit() {
        Some(b) => Ok((acc << 1) | b as u128),
        None => Err(CodecError::malformed(format!("marker slot inside {}", field))),
    })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn idx(values: &[u64]) -> HierarchicalIndex {
        HierarchicalIndex::with_levels(values[0], values[1..].iter().copied())
    }

    // ========================================================================
    // Ordering Tests
    // ========================================================================

    #[test]
    fn test_padded_equality() {
        assert_eq!(idx(&[5]), idx(&[5, 0]));
        assert_eq!(idx(&[5, 0, 0]), idx(&[5]));
        assert_ne!(idx(&[5, 1]), idx(&[5]));

        let mut set = HashSet::new();
        set.insert(idx(&[5]));
        assert!(set.contains(&idx(&[5, 0])));
    }

    #[test]
    fn test_lexicographic_order() {
        let mut indices = vec![idx(&[8]), idx(&[7, 3]), idx(&[7]), idx(&[7, 0, 2]), idx(&[0, 9])];
        indices.sort();
        let expected = vec![idx(&[0, 9]), idx(&[7]), idx(&[7, 0, 2]), idx(&[7, 3]), idx(&[8])];
        assert_eq!(indices, expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(idx(&[3, 14]).to_string(), "[3, 14]");
    }

    // ========================================================================
    // Slot Encoding Tests
    // ========================================================================

    #[test]
    fn test_encode_widths_and_markers() {
        let layout = IndexLayout::default();
        let slots = layout.encode(&idx(&[1, 2])).unwrap();
        assert_eq!(slots.len(), 34);
        assert!(slots[20..24].iter().all(|s| s.is_marker()));
        assert_eq!(slots[19], Slot::Bit(true));
        assert_eq!(slots[32], Slot::Bit(true));
        assert_eq!(slots[33], Slot::Bit(false));
    }

    #[test]
    fn test_divide_recovers_index_and_payload() {
        let layout = IndexLayout::default();
        let payload: Vec<bool> = (0..92).map(|i| i % 5 == 0).collect();
        let index = idx(&[1000, 17, 1023]);
        let segment = layout.connect(&index, &payload).unwrap();
        assert_eq!(segment.len(), 140);
        let (decoded, bits) = layout.divide(&segment).unwrap();
        assert_eq!(decoded.values(), &[1000, 17, 1023]);
        assert_eq!(bits, payload);
    }

    #[test]
    fn test_encode_rejects_overflow() {
        let layout = IndexLayout::default();
        assert!(matches!(
            layout.encode(&idx(&[1 << 20])),
            Err(CodecError::IndexCapacity(CapacityShortfall::ValueOverflow { .. }))
        ));
        assert!(matches!(
            layout.encode(&idx(&[0, 1024])),
            Err(CodecError::IndexCapacity(CapacityShortfall::ValueOverflow { .. }))
        ));
        assert!(matches!(
            layout.encode(&idx(&[0, 0, 0, 0, 0, 0, 0, 1])),
            Err(CodecError::IndexCapacity(CapacityShortfall::DepthExceeded { .. }))
        ));
    }

    #[test]
    fn test_divide_rejects_partial_marker() {
        let layout = IndexLayout::default();
        let mut segment = layout.connect(&idx(&[3]), &vec![true; 120]).unwrap();
        segment[20] = Slot::Marker;
        segment[21] = Slot::Marker;
        assert!(matches!(
            layout.divide(&segment),
            Err(CodecError::MalformedSequence(_))
        ));
    }

    #[test]
    fn test_divide_rejects_short_segment() {
        let layout = IndexLayout::default();
        let segment = vec![Slot::Bit(false); 10];
        assert!(layout.divide(&segment).is_err());
    }

    // ========================================================================
    // Ordinal Tests
    // ========================================================================

    #[test]
    fn test_ordinal_padding_and_truncation() {
        let layout = IndexLayout::default();
        assert_eq!(layout.ordinal_at_depth(&idx(&[2]), 1), 2 * 1024);
        assert_eq!(layout.ordinal_at_depth(&idx(&[2, 5]), 1), 2 * 1024 + 5);
        assert_eq!(layout.ordinal_at_depth(&idx(&[2, 5, 9]), 1), 2 * 1024 + 5);
        assert_eq!(layout.ordinal_at_depth(&idx(&[2, 5]), 0), 2);
    }

    #[test]
    fn test_from_ordinal() {
        let layout = IndexLayout::default();
        assert_eq!(layout.from_ordinal(2 * 1024 + 5, 1).unwrap().values(), &[2, 5]);
        assert_eq!(layout.from_ordinal(7, 2).unwrap().values(), &[0, 0, 7]);
        assert!(layout.from_ordinal(1 << 20, 0).is_err());
    }

    #[test]
    fn test_encode_value_uses_minimal_depth() {
        let layout = IndexLayout::default();
        assert_eq!(layout.encode_value((1 << 20) - 1).unwrap().depth(), 0);
        assert_eq!(layout.encode_value(1 << 20).unwrap().depth(), 1);
        assert_eq!(layout.encode_value((1 << 30) - 1).unwrap().depth(), 1);
        assert_eq!(layout.encode_value(1 << 30).unwrap().depth(), 2);
        assert!(layout.encode_value(1 << 80).is_err());
    }

    #[test]
    fn test_layout_validation() {
        assert!(IndexLayout::default().validate().is_ok());
        let no_value = IndexLayout {
            level_width: 4,
            ..IndexLayout::default()
        };
        assert!(no_value.validate().is_err());
        let too_wide = IndexLayout {
            primary_width: 60,
            level_width: 24,
            max_levels: 6,
        };
        assert!(too_wide.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_primary_roundtrip(n in 0u64..(1 << 20)) {
            let layout = IndexLayout::default();
            let segment = layout.connect(&HierarchicalIndex::new(n), &[]).unwrap();
            let (decoded, payload) = layout.divide(&segment).unwrap();
            prop_assert_eq!(decoded.values(), &[n][..]);
            prop_assert!(payload.is_empty());
        }

        #[test]
        fn prop_ordinal_roundtrip(ordinal in 0u128..(1u128 << 40), depth in 2usize..=6) {
            let layout = IndexLayout::default();
            let index = layout.from_ordinal(ordinal, depth).unwrap();
            prop_assert_eq!(index.depth(), depth);
            prop_assert_eq!(layout.ordinal_at_depth(&index, depth), ordinal);
        }
    }
}
