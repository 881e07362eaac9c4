// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # Order Restoration
//!
//! After decoding, segments arrive in pairing order. Sorting them by their
//! hierarchical index (missing levels read as zero) restores file order.
//! Two segments that compare equal would make that order ambiguous, so a
//! duplicate is reported as corruption rather than resolved silently.

use crate::error::{CodecError, Result};
use crate::index::HierarchicalIndex;

/// A segment split into its index and raw payload frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSegment {
    /// Position of the segment in file order.
    pub index: HierarchicalIndex,
    /// Payload frame bits (still framed).
    pub frame: Vec<bool>,
}

impl IndexedSegment {
    /// Bundles an index with its payload frame.
    pub fn new(index: HierarchicalIndex, frame: Vec<bool>) -> Self {
        IndexedSegment { index, frame }
    }
}

/// Sorts segments into file order.
///
/// The sort is stable; equal indices are rejected.
///
/// # Errors
///
/// Returns [`CodecError::MalformedSequence`] if two segments share an index.
///
/// # Examples
///
/// ```rust
/// use dnaver::index::HierarchicalIndex;
/// use dnaver::order::{restore_order, IndexedSegment};
///
/// let segments = vec![
///     IndexedSegment::new(HierarchicalIndex::new(2), vec![]),
///     IndexedSegment::new(HierarchicalIndex::with_levels(0, [7]), vec![]),
///     IndexedSegment::new(HierarchicalIndex::new(1), vec![]),
/// ];
/// let sorted = restore_order(segments).unwrap();
/// let primaries: Vec<u64> = sorted.iter().map(|s| s.index.primary()).collect();
/// assert_eq!(primaries, vec![0, 1, 2]);
/// ```
pub fn restore_order(mut segments: Vec<IndexedSegment>) -> Result<Vec<IndexedSegment>> {
    segments.sort_by(|a, b| a.index.cmp(&b.index));
    if let Some(pair) = segments.windows(2).find(|w| w[0].index == w[1].index) {
        return Err(CodecError::malformed(format!(
            "duplicate index {} (also read as {})",
            pair[0].index, pair[1].index
        )));
    }
    Ok(segments)
}

/// Returns `true` if the segments are already strictly increasing by index.
pub fn is_file_ordered(segments: &[IndexedSegment]) -> bool {
    segments.windows(2).all(|w| w[0].index < w[1].index)
}

// ============================================================================
// Unit Tests
// ============================================================================
