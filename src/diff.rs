// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # Version Diff Engine
//!
//! Splices insert, delete and replace edits into an already indexed version
//! without renumbering the segments it does not touch.
//!
//! ## Pipeline
//!
//! 1. **Locate**: segments without content (fillers and pad frames) are
//!    dropped, then every [`ModificationOp`] is anchored by an excerpt of the
//!    prior content. The excerpt (followed by any content being removed) is
//!    searched byte-aligned; an empty anchor means the start of the file.
//! 2. **Span**: the segments touched by an edit are widened to whole
//!    *sorted pairs* (positions `2k`, `2k + 1`). Untouched content inside the
//!    widened span is carried into the new segments. See [`HeadCase`] and
//!    [`TailCase`].
//! 3. **Group**: spans that overlap or touch are merged, so neighbouring
//!    rewrites never compete for the same index gap.
//! 4. **Allocate**: the rewritten content is framed and given consecutive
//!    indices strictly between the surviving neighbours. If the gap is too
//!    small at the current chain depth, one more chain level is tried, up to
//!    the configured limit.
//! 5. **Assemble**: surviving segments and new segments are merged and put
//!    back into file order.
//!
//! ## Parity
//!
//! Spans always start and end on even sorted positions and every group emits
//! an even number of segments, all at one chain depth. Surviving pairs keep
//! their partner, and new segments pair among themselves.
//!
//! ```text
//! sorted:   [ s0 s1 | s2 s3 | s4 s5 ]
//! edit:                ^ inside s3 (odd)
//! span:            [ s2 s3 )          head: SplitOdd, tail: SplitOdd
//! content: s2 + s3[..cut] + new + s3[cut..]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CapacityShortfall, CodecError, Result};
use crate::index::{HierarchicalIndex, IndexLayout};
use crate::order::{IndexedSegment, restore_order};
use crate::segment::{
    SegmentLayout, ZERO_MARK, bits_to_bytes, bytes_to_bits, frame_content, unframe,
};

/// Free index slots kept in a gap beyond the segments placed in it.
pub const SAFETY_MARGIN: u128 = 3;

// ============================================================================
// Modification Operations
// ============================================================================

/// Kind of content modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditKind {
    /// Insert content right after the anchor.
    Insert,
    /// Remove content that immediately follows the anchor.
    Delete,
    /// Remove content following the anchor and put new content in its place.
    Replace,
}

/// One anchored edit against the prior version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationOp {
    /// What the edit does.
    pub kind: EditKind,
    /// Excerpt of the prior content that precedes the edit; empty means the
    /// start of the file.
    pub anchor: Vec<u8>,
    /// Content removed right after the anchor (delete, replace).
    pub removed: Vec<u8>,
    /// Content written in its place (insert, replace).
    pub inserted: Vec<u8>,
}

impl ModificationOp {
    /// Inserts `content` after `anchor`.
    pub fn insert(anchor: impl Into<Vec<u8>>, content: impl Into<Vec<u8>>) -> Self {
        ModificationOp {
            kind: EditKind::Insert,
            anchor: anchor.into(),
            removed: Vec::new(),
            inserted: content.into(),
        }
    }

    /// Deletes `content`, which must follow `anchor`.
    pub fn delete(anchor: impl Into<Vec<u8>>, content: impl Into<Vec<u8>>) -> Self {
        ModificationOp {
            kind: EditKind::Delete,
            anchor: anchor.into(),
            removed: content.into(),
            inserted: Vec::new(),
        }
    }

    /// Replaces `old` (which must follow `anchor`) with `new`.
    pub fn replace(
        anchor: impl Into<Vec<u8>>,
        old: impl Into<Vec<u8>>,
        new: impl Into<Vec<u8>>,
    ) -> Self {
        ModificationOp {
            kind: EditKind::Replace,
            anchor: anchor.into(),
            removed: old.into(),
            inserted: new.into(),
        }
    }

    /// Builds an edit from files: the anchor excerpt (absent means start of
    /// file) and one payload file per content field of `kind`. Replace takes
    /// the removed content first, then the inserted content.
    pub fn from_files(kind: EditKind, anchor: Option<&Path>, payloads: &[&Path]) -> Result<Self> {
        let expected = match kind {
            EditKind::Insert | EditKind::Delete => 1,
            EditKind::Replace => 2,
        };
        if payloads.len() != expected {
            return Err(CodecError::config(format!(
                "{:?} takes {} payload file(s), got {}",
                kind,
                expected,
                payloads.len()
            )));
        }
        let anchor = match anchor {
            Some(path) => std::fs::read(path)?,
            None => Vec::new(),
        };
        let first = std::fs::read(payloads[0])?;
        Ok(match kind {
            EditKind::Insert => ModificationOp::insert(anchor, first),
            EditKind::Delete => ModificationOp::delete(anchor, first),
            EditKind::Replace => {
                ModificationOp::replace(anchor, first, std::fs::read(payloads[1])?)
            }
        })
    }

    /// Content removed by this edit; always empty for inserts.
    pub fn removed_content(&self) -> &[u8] {
        match self.kind {
            EditKind::Insert => &[],
            EditKind::Delete | EditKind::Replace => &self.removed,
        }
    }

    /// Content added by this edit; always empty for deletes.
    pub fn inserted_content(&self) -> &[u8] {
        match self.kind {
            EditKind::Delete => &[],
            EditKind::Insert | EditKind::Replace => &self.inserted,
        }
    }

    fn is_noop(&self) -> bool {
        self.removed_content().is_empty() && self.inserted_content().is_empty()
    }
}

// ============================================================================
// Edge Classification
// ============================================================================

/// Where a content offset falls relative to the sorted segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePosition {
    /// Between segments; the value is the position of the first non-empty
    /// segment at or after the offset (or the segment count at end of file).
    Boundary(usize),
    /// Strictly inside the segment at this position.
    Inside(usize),
}

/// How the start of an edit widens its span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadCase {
    /// Starts on an even boundary; nothing is carried.
    Aligned,
    /// Starts on an odd boundary; the preceding partner is carried whole.
    PartnerCarry,
    /// Cuts an even-position segment; its left part is carried.
    SplitEven,
    /// Cuts an odd-position segment; its partner and left part are carried.
    SplitOdd,
}

/// How the end of an edit widens its span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailCase {
    /// Ends on an even boundary; nothing is carried.
    Aligned,
    /// Ends on an odd boundary; the following partner is carried whole.
    PartnerCarry,
    /// Cuts an even-position segment; its right part and partner are carried.
    SplitEven,
    /// Cuts an odd-position segment; its right part is carried.
    SplitOdd,
}

/// Classifies the start edge and returns the first sorted position of the span.
pub fn classify_head(edge: EdgePosition) -> (HeadCase, usize) {
    match edge {
        EdgePosition::Boundary(k) if k % 2 == 0 => (HeadCase::Aligned, k),
        EdgePosition::Boundary(k) => (HeadCase::PartnerCarry, k - 1),
        EdgePosition::Inside(p) if p % 2 == 0 => (HeadCase::SplitEven, p),
        EdgePosition::Inside(p) => (HeadCase::SplitOdd, p - 1),
    }
}

/// Classifies the end edge and returns the position just past the span.
///
/// `count` bounds the result for matrices that are not pair-complete.
pub fn classify_tail(edge: EdgePosition, count: usize) -> (TailCase, usize) {
    match edge {
        EdgePosition::Boundary(k) if k % 2 == 0 => (TailCase::Aligned, k),
        EdgePosition::Boundary(k) => (TailCase::PartnerCarry, (k + 1).min(count)),
        EdgePosition::Inside(q) if q % 2 == 0 => (TailCase::SplitEven, (q + 2).min(count)),
        EdgePosition::Inside(q) => (TailCase::SplitOdd, q + 1),
    }
}

/// Cumulative content offsets of the sorted segments.
#[derive(Debug, Clone)]
struct ContentMap {
    starts: Vec<usize>,
    lens: Vec<usize>,
    total: usize,
}

impl ContentMap {
    fn new(contents: &[&[bool]]) -> Self {
        let mut starts = Vec::with_capacity(contents.len());
        let mut lens = Vec::with_capacity(contents.len());
        let mut total = 0;
        for content in contents {
            starts.push(total);
            lens.push(content.len());
            total += content.len();
        }
        ContentMap {
            starts,
            lens,
            total,
        }
    }

    fn count(&self) -> usize {
        self.starts.len()
    }

    fn locate(&self, offset: usize) -> EdgePosition {
        let before = self.starts.partition_point(|&s| s < offset);
        if before > 0 && self.starts[before - 1] + self.lens[before - 1] > offset {
            return EdgePosition::Inside(before - 1);
        }
        let mut k = before;
        while k < self.count() && self.lens[k] == 0 {
            k += 1;
        }
        EdgePosition::Boundary(k)
    }

    /// Content offset where sorted position `position` begins.
    fn offset_of(&self, position: usize) -> usize {
        self.starts.get(position).copied().unwrap_or(self.total)
    }
}

// ============================================================================
// Index Gaps
// ============================================================================

/// Lower edge of the index gap a group is written into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LowerBound {
    /// Nothing survives before the group.
    FileStart,
    /// New indices must sort after this one.
    After(HierarchicalIndex),
}

/// Upper edge of the index gap a group is written into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpperBound {
    /// Nothing survives after the group.
    FileEnd,
    /// New indices must sort before this one.
    Before(HierarchicalIndex),
}

/// Indices and frames chosen for a group's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Chain depth of every new index.
    pub depth: usize,
    /// Ordinal of the first new index at that depth.
    pub first: u128,
    /// Payload frames, even in number.
    pub frames: Vec<Vec<bool>>,
}

/// Frames `content` at the shallowest chain depth whose gap between `lower`
/// and `upper` holds every frame plus [`SAFETY_MARGIN`] spare slots.
///
/// # Errors
///
/// Returns [`CodecError::IndexCapacity`] if the payload would become too
/// narrow for framing before a fitting depth is reached, or no depth up to
/// `max_levels` fits.
///
/// # Examples
///
/// ```rust
/// use dnaver::diff::{allocate, LowerBound, UpperBound};
/// use dnaver::index::HierarchicalIndex;
/// use dnaver::segment::SegmentLayout;
///
/// let layout = SegmentLayout::default();
/// let content = vec![true; 200];
/// // No room between [4] and [5] at depth 0, so one chain level is added.
/// let allocation = allocate(
///     &layout,
///     &LowerBound::After(HierarchicalIndex::new(4)),
///     &UpperBound::Before(HierarchicalIndex::new(5)),
///     &content,
/// )
/// .unwrap();
/// assert_eq!(allocation.depth, 1);
/// assert_eq!(allocation.frames.len() % 2, 0);
/// ```
pub fn allocate(
    layout: &SegmentLayout,
    lower: &LowerBound,
    upper: &UpperBound,
    content: &[bool],
) -> Result<Allocation> {
    let index_layout = require_index(layout)?;
    let mut needed = 0usize;
    for depth in 0..=index_layout.max_levels {
        let width = layout.payload_width(depth).unwrap_or(0);
        if width <= ZERO_MARK {
            return Err(CapacityShortfall::PayloadExhausted {
                depth,
                payload_width: width,
            }
            .into());
        }
        let mut frames = frame_content(content, width);
        if frames.len() % 2 == 1 {
            frames.push(vec![false; width]);
        }
        needed = frames.len();

        let first = match lower {
            LowerBound::FileStart => 0,
            LowerBound::After(index) => index_layout.ordinal_at_depth(index, depth) + 1,
        };
        let end = match upper {
            UpperBound::FileEnd => index_layout.depth_capacity(depth),
            UpperBound::Before(index) => index_layout.ordinal_at_depth(index, depth),
        };
        if end > first && end - first >= frames.len() as u128 + SAFETY_MARGIN {
            return Ok(Allocation {
                depth,
                first,
                frames,
            });
        }
    }
    Err(CapacityShortfall::LevelLimit {
        limit: index_layout.max_levels,
        needed: needed + SAFETY_MARGIN as usize,
    }
    .into())
}

fn require_index(layout: &SegmentLayout) -> Result<&IndexLayout> {
    layout
        .index
        .as_ref()
        .ok_or_else(|| CodecError::config("incremental encoding requires an indexed layout"))
}

// ============================================================================
// Diff Engine
// ============================================================================

/// An edit located in the prior content, in bit offsets.
#[derive(Debug, Clone)]
struct LocatedEdit {
    op: usize,
    start: usize,
    end: usize,
    replacement: Vec<bool>,
}

/// Contiguous rewrite span with the edits it absorbs.
#[derive(Debug, Clone)]
struct Group {
    start: usize,
    end: usize,
    edits: Vec<LocatedEdit>,
}

/// Summary of one applied batch of edits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// Number of rewrite groups after merging.
    pub groups: usize,
    /// Prior segments replaced.
    pub removed: usize,
    /// New segments written.
    pub added: usize,
    /// Deepest chain depth among new segments.
    pub max_depth: usize,
}

/// Result of [`DiffEngine::apply`].
#[derive(Debug, Clone)]
pub struct DiffOutcome {
    /// All segments of the new version, in file order.
    pub segments: Vec<IndexedSegment>,
    /// What changed.
    pub report: DiffReport,
}

/// Applies anchored edits to a sorted, indexed segment list.
#[derive(Debug, Clone)]
pub struct DiffEngine<'a> {
    layout: &'a SegmentLayout,
}

impl<'a> DiffEngine<'a> {
    /// Creates an engine for an indexed layout.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] for unindexed layouts.
    pub fn new(layout: &'a SegmentLayout) -> Result<Self> {
        require_index(layout)?;
        Ok(DiffEngine { layout })
    }

    /// Applies `ops` to `prior`, which must be in file order.
    ///
    /// All edits are located in the prior content; they do not see each
    /// other's results. An edit that removes and inserts nothing must still
    /// locate, but changes nothing.
    ///
    /// # Errors
    ///
    /// - [`CodecError::AnchorNotFound`] if an edit cannot be located.
    /// - [`CodecError::EditConflict`] if two edits overlap.
    /// - [`CodecError::IndexCapacity`] if a gap cannot hold its content.
    /// - [`CodecError::MalformedSequence`] if a prior frame is corrupt or
    ///   the result contains duplicate indices.
    pub fn apply(&self, prior: Vec<IndexedSegment>, ops: &[ModificationOp]) -> Result<DiffOutcome> {
        let prior = discard_empty(prior)?;
        let contents = prior
            .iter()
            .map(|segment| unframe(&segment.frame))
            .collect::<Result<Vec<&[bool]>>>()?;
        let map = ContentMap::new(&contents);
        let flat: Vec<bool> = contents.concat();
        let bytes = bits_to_bytes(&flat);

        let mut edits = Vec::with_capacity(ops.len());
        for (n, op) in ops.iter().enumerate() {
            let edit = locate(n, op, &bytes, flat.len())?;
            if !op.is_noop() {
                edits.push(edit);
            }
        }
        edits.sort_by_key(|e| (e.start, e.end, e.op));
        for pair in edits.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(CodecError::EditConflict {
                    first: pair[0].op,
                    second: pair[1].op,
                });
            }
        }

        let mut groups = plan_groups(&map, edits);
        let mut retained = vec![true; prior.len()];
        let mut added = Vec::new();
        let mut report = DiffReport::default();

        let mut g = 0;
        while g < groups.len() {
            let group = &groups[g];
            let lower = match group.start {
                0 => LowerBound::FileStart,
                s => LowerBound::After(prior[s - 1].index.clone()),
            };
            let upper = match prior.get(group.end) {
                Some(segment) => UpperBound::Before(segment.index.clone()),
                None => UpperBound::FileEnd,
            };
            let content = group_content(&flat, &map, group);

            let allocation = if content.is_empty() {
                None
            } else {
                match allocate(self.layout, &lower, &upper, &content) {
                    Ok(allocation) => Some(allocation),
                    Err(CodecError::IndexCapacity(shortfall))
                        if lower == LowerBound::FileStart && group.end < map.count() =>
                    {
                        warn!(
                            span_end = group.end,
                            reason = %shortfall,
                            "no room before the first surviving segment; absorbing the next pair"
                        );
                        absorb_next_pair(&mut groups, g, map.count());
                        continue;
                    }
                    Err(err) => return Err(err),
                }
            };

            let group = &groups[g];
            for flag in &mut retained[group.start..group.end] {
                *flag = false;
            }
            report.removed += group.end - group.start;

            if let Some(allocation) = allocation {
                let anchor_depth = bound_depth(&lower).max(upper_depth(&upper));
                if allocation.depth > anchor_depth {
                    warn!(
                        depth = allocation.depth,
                        anchor_depth, "extending index chain to fit edit"
                    );
                }
                debug!(
                    span_start = group.start,
                    span_end = group.end,
                    edits = group.edits.len(),
                    depth = allocation.depth,
                    frames = allocation.frames.len(),
                    "rewrote group"
                );
                report.max_depth = report.max_depth.max(allocation.depth);
                report.added += allocation.frames.len();
                let index_layout = require_index(self.layout)?;
                for (k, frame) in allocation.frames.into_iter().enumerate() {
                    let index =
                        index_layout.from_ordinal(allocation.first + k as u128, allocation.depth)?;
                    added.push(IndexedSegment::new(index, frame));
                }
            }
            g += 1;
        }
        report.groups = groups.len();

        let mut segments: Vec<IndexedSegment> = prior
            .into_iter()
            .zip(retained)
            .filter_map(|(segment, keep)| keep.then_some(segment))
            .collect();
        segments.extend(added);
        let segments = restore_order(segments)?;

        info!(
            groups = report.groups,
            removed = report.removed,
            added = report.added,
            segments = segments.len(),
            "applied edits"
        );
        Ok(DiffOutcome { segments, report })
    }
}

/// Drops segments without content: fillers and pad frames of earlier
/// versions. Pairing is redone from scratch, so they have no partner to keep.
fn discard_empty(prior: Vec<IndexedSegment>) -> Result<Vec<IndexedSegment>> {
    let before = prior.len();
    let mut kept = Vec::with_capacity(before);
    for segment in prior {
        if !unframe(&segment.frame)?.is_empty() {
            kept.push(segment);
        }
    }
    if kept.len() < before {
        debug!(discarded = before - kept.len(), "dropped empty prior segments");
    }
    Ok(kept)
}

fn locate(op_no: usize, op: &ModificationOp, bytes: &[u8], total: usize) -> Result<LocatedEdit> {
    let removed = op.removed_content();
    let found = if op.anchor.is_empty() {
        bytes.starts_with(removed).then_some(0)
    } else {
        let mut needle = op.anchor.clone();
        needle.extend_from_slice(removed);
        bytes.windows(needle.len()).position(|w| w == needle.as_slice())
    };
    let at = found.ok_or(CodecError::AnchorNotFound { op: op_no })?;
    let start = (at + op.anchor.len()) * 8;
    let end = start + removed.len() * 8;
    if end > total {
        return Err(CodecError::AnchorNotFound { op: op_no });
    }
    Ok(LocatedEdit {
        op: op_no,
        start,
        end,
        replacement: bytes_to_bits(op.inserted_content()),
    })
}

fn plan_groups(map: &ContentMap, edits: Vec<LocatedEdit>) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    for edit in edits {
        let (head, start) = classify_head(map.locate(edit.start));
        let (tail, end) = classify_tail(map.locate(edit.end), map.count());
        debug!(op = edit.op, ?head, ?tail, start, end, "classified edit");
        match groups.last_mut() {
            Some(last) if start <= last.end => {
                last.end = last.end.max(end);
                last.edits.push(edit);
            }
            _ => groups.push(Group {
                start,
                end,
                edits: vec![edit],
            }),
        }
    }
    groups
}

fn absorb_next_pair(groups: &mut Vec<Group>, g: usize, count: usize) {
    groups[g].end = (groups[g].end + 2).min(count);
    while g + 1 < groups.len() && groups[g + 1].start <= groups[g].end {
        let next = groups.remove(g + 1);
        groups[g].end = groups[g].end.max(next.end);
        groups[g].edits.extend(next.edits);
    }
}

fn group_content(flat: &[bool], map: &ContentMap, group: &Group) -> Vec<bool> {
    let mut cursor = map.offset_of(group.start);
    let to = map.offset_of(group.end);
    let mut content = Vec::with_capacity(to.saturating_sub(cursor));
    for edit in &group.edits {
        content.extend_from_slice(&flat[cursor..edit.start]);
        content.extend_from_slice(&edit.replacement);
        cursor = edit.end;
    }
    content.extend_from_slice(&flat[cursor..to]);
    content
}

fn bound_depth(lower: &LowerBound) -> usize {
    match lower {
        LowerBound::FileStart => 0,
        LowerBound::After(index) => index.depth(),
    }
}

fn upper_depth(upper: &UpperBound) -> usize {
    match upper {
        UpperBound::FileEnd => 0,
        UpperBound::Before(index) => index.depth(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
