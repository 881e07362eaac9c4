// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # Binary Segments and Payload Framing
//!
//! A file is cut into fixed-width binary segments before transcoding. Each
//! segment is a sequence of [`Slot`]s: ordinary bits, or the reserved marker
//! slots that introduce a chain level of a hierarchical index
//! (see [`crate::index`]).
//!
//! ## Segment Layout
//!
//! ```text
//! indexed:    [ primary index | (marker x4 | level value) * depth | payload frame ]
//! unindexed:  [ payload frame ]
//! ```
//!
//! The total length of every segment of one layout is constant. Each chain
//! level added to the index shrinks the payload frame by `level_width` bits.
//!
//! ## Payload Frames
//!
//! A payload frame of width `P` is either *full* or *marked*:
//!
//! | Kind | Layout | Content |
//! |------|--------|---------|
//! | full | `P` content bits, not starting with 15 zeros | all `P` bits |
//! | marked | `0 x15`, `n` as 7 bits, `P - 22 - n` zeros, `n` bits | trailing `n` bits |
//!
//! A full frame whose content would begin with fifteen zero bits is never
//! emitted; that content is carried by marked frames instead, so the two
//! kinds cannot be confused. An all-zero frame is the marked frame of length
//! zero and contributes nothing when decoded.
//!
//! Frames narrower than [`ZERO_MARK`] + 1 bits cannot carry the marker and use
//! *plain* framing: the final frame is zero-padded. Plain content is closed
//! with a single end-mark bit ([`push_end_mark`]) before framing, so padding
//! and trailing all-zero segments are cut off exactly on decode
//! ([`strip_end_mark`]).
//!
//! ```rust
//! use dnaver::segment::{bytes_to_bits, frame_content, unframe};
//!
//! let bits = bytes_to_bits(b"hi");
//! let frames = frame_content(&bits, 40);
//! assert_eq!(frames.len(), 1);
//! assert_eq!(unframe(&frames[0]).unwrap(), &bits[..]);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::index::IndexLayout;

// ============================================================================
// Slots
// ============================================================================

/// One position of a binary segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// An ordinary payload or index bit.
    Bit(bool),
    /// Part of the 4-slot marker that introduces a chain level.
    Marker,
}

impl Slot {
    /// Returns the bit carried by this slot, or `None` for a marker.
    #[inline]
    pub const fn bit(self) -> Option<bool> {
        match self {
            Slot::Bit(b) => Some(b),
            Slot::Marker => None,
        }
    }

    /// Returns `true` for a marker slot.
    #[inline]
    pub const fn is_marker(self) -> bool {
        matches!(self, Slot::Marker)
    }
}

/// A binary segment: index slots followed by a payload frame.
pub type Segment = Vec<Slot>;

/// Wraps plain bits as slots.
pub fn slots_from_bits(bits: &[bool]) -> Segment {
    bits.iter().map(|&b| Slot::Bit(b)).collect()
}

/// Counts the marker slots of a segment.
pub fn marker_count(segment: &[Slot]) -> usize {
    segment.iter().filter(|s| s.is_marker()).count()
}

// ============================================================================
// Byte <-> Bit Conversion
// ============================================================================

/// Unpacks bytes into bits, most significant bit first.
///
/// # Examples
///
/// ```rust
/// use dnaver::segment::bytes_to_bits;
///
/// let bits = bytes_to_bits(&[0b1000_0001]);
/// assert!(bits[0] && bits[7]);
/// assert_eq!(bits.iter().filter(|&&b| b).count(), 2);
/// ```
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1 == 1);
        }
    }
    bits
}

/// Packs bits into bytes, most significant bit first.
///
/// Trailing bits that do not complete a byte are dropped.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
        .collect()
}

/// Writes `value` as a big-endian field of `width` bits.
pub(crate) fn push_field(out: &mut Vec<bool>, value: u128, width: usize) {
    for shift in (0..width).rev() {
        out.push((value >> shift) & 1 == 1);
    }
}

/// Reads a big-endian field from bits.
pub(crate) fn read_field(bits: &[bool]) -> u128 {
    bits.iter().fold(0u128, |acc, &b| (acc << 1) | b as u128)
}

// ============================================================================
// Payload Framing
// ============================================================================

/// Length of the zero run that opens a marked frame.
pub const ZERO_RUN: usize = 15;

/// Width of the true-length field of a marked frame.
pub const LENGTH_FIELD: usize = 7;

/// Bits reserved by the truncation marker of a marked frame.
pub const ZERO_MARK: usize = ZERO_RUN + LENGTH_FIELD;

const MAX_MARKED_LEN: usize = (1 << LENGTH_FIELD) - 1;

/// Returns how many content bits a marked frame of `width` can carry.
///
/// Zero means the width is too narrow for marked framing.
#[inline]
pub fn marked_capacity(width: usize) -> usize {
    if width <= ZERO_MARK {
        0
    } else {
        (width - ZERO_MARK).min(MAX_MARKED_LEN)
    }
}

#[inline]
fn opens_with_zero_run(bits: &[bool]) -> bool {
    bits.len() >= ZERO_RUN && bits[..ZERO_RUN].iter().all(|&b| !b)
}

fn marked_frame(content: &[bool], width: usize) -> Vec<bool> {
    let mut frame = Vec::with_capacity(width);
    frame.resize(ZERO_RUN, false);
    push_field(&mut frame, content.len() as u128, LENGTH_FIELD);
    frame.resize(width - content.len(), false);
    frame.extend_from_slice(content);
    frame
}

/// Cuts content bits into payload frames of `width` bits.
///
/// Empty content yields no frames. Widths wider than [`ZERO_MARK`] use
/// full/marked framing; narrower widths zero-pad the final frame.
///
/// # Examples
///
/// ```rust
/// use dnaver::segment::frame_content;
///
/// // 100 bits in 80-bit frames: one full frame, then a marked one.
/// let bits = vec![true; 100];
/// let frames = frame_content(&bits, 80);
/// assert_eq!(frames.len(), 2);
/// assert!(frames.iter().all(|f| f.len() == 80));
/// assert!(frames[1][..15].iter().all(|&b| !b));
/// ```
pub fn frame_content(bits: &[bool], width: usize) -> Vec<Vec<bool>> {
    if width == 0 || bits.is_empty() {
        return Vec::new();
    }

    let capacity = marked_capacity(width);
    if capacity == 0 {
        return bits
            .chunks(width)
            .map(|chunk| {
                let mut frame = chunk.to_vec();
                frame.resize(width, false);
                frame
            })
            .collect();
    }

    let mut frames = Vec::with_capacity(bits.len() / width + 2);
    let mut rest = bits;
    while !rest.is_empty() {
        if rest.len() >= width && !opens_with_zero_run(rest) {
            frames.push(rest[..width].to_vec());
            rest = &rest[width..];
        } else {
            let take = rest.len().min(capacity);
            frames.push(marked_frame(&rest[..take], width));
            rest = &rest[take..];
        }
    }
    frames
}

/// Returns the number of frames [`frame_content`] would produce.
pub fn frame_count(bits: &[bool], width: usize) -> usize {
    frame_content(bits, width).len()
}

/// Recovers the content bits of a payload frame.
///
/// # Errors
///
/// Returns [`CodecError::MalformedSequence`] if a marked frame records a
/// length larger than it can hold.
pub fn unframe(frame: &[bool]) -> Result<&[bool]> {
    let width = frame.len();
    if marked_capacity(width) == 0 || !opens_with_zero_run(frame) {
        return Ok(frame);
    }
    let len = read_field(&frame[ZERO_RUN..ZERO_MARK]) as usize;
    if len > width - ZERO_MARK {
        return Err(CodecError::malformed(format!(
            "marked frame of width {} claims {} content bits",
            width, len
        )));
    }
    Ok(&frame[width - len..])
}

/// Closes non-empty plain content with a `1` bit; empty content stays empty.
pub fn push_end_mark(bits: &mut Vec<bool>) {
    if !bits.is_empty() {
        bits.push(true);
    }
}

/// Removes trailing zero bits and the end mark before them.
///
/// # Errors
///
/// Returns [`CodecError::MalformedSequence`] if non-empty bits carry no end
/// mark, or the content before it is not whole bytes.
pub fn strip_end_mark(bits: &[bool]) -> Result<&[bool]> {
    match bits.iter().rposition(|&b| b) {
        Some(mark) if mark % 8 == 0 => Ok(&bits[..mark]),
        Some(mark) => Err(CodecError::malformed(format!(
            "end mark at bit {} does not close a whole byte",
            mark
        ))),
        None if bits.is_empty() => Ok(bits),
        None => Err(CodecError::malformed("plain content has no end mark")),
    }
}

// ============================================================================
// Segment Layout
// ============================================================================

/// Widths of the payload and (optionally) the hierarchical index prefix.
///
/// The total segment length is `primary_width + payload_length` for indexed
/// layouts and `payload_length` otherwise; it does not change with chain depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLayout {
    /// Payload bits of a segment at chain depth zero.
    pub payload_length: usize,
    /// Index layout, or `None` when segments carry no index.
    pub index: Option<IndexLayout>,
}

impl Default for SegmentLayout {
    fn default() -> Self {
        SegmentLayout {
            payload_length: 120,
            index: Some(IndexLayout::default()),
        }
    }
}

impl SegmentLayout {
    /// A layout without index; order is carried by sequence position alone.
    pub fn unindexed(payload_length: usize) -> Self {
        SegmentLayout {
            payload_length,
            index: None,
        }
    }

    /// Checks the structural rules of the layout.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] when the payload cannot carry a
    /// truncation marker (or, unindexed, cannot be plainly framed without
    /// losing bytes) or the index layout is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.payload_length == 0 {
            return Err(CodecError::config("payload length must be positive"));
        }
        match &self.index {
            Some(index) => {
                index.validate()?;
                if self.payload_length <= ZERO_MARK {
                    return Err(CodecError::config(format!(
                        "indexed payload of {} bits cannot carry the {}-bit truncation marker",
                        self.payload_length, ZERO_MARK
                    )));
                }
            }
            None => {
                if self.payload_length > 8 && self.payload_length <= ZERO_MARK {
                    return Err(CodecError::config(format!(
                        "unindexed payload of {} bits is too wide for plain framing \
                         and too narrow for the truncation marker",
                        self.payload_length
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total number of slots in every segment of this layout.
    pub fn segment_length(&self) -> usize {
        self.index.as_ref().map_or(0, |i| i.primary_width) + self.payload_length
    }

    /// Payload frame width at a given chain depth, if any is left.
    pub fn payload_width(&self, depth: usize) -> Option<usize> {
        match &self.index {
            Some(index) => self
                .payload_length
                .checked_sub(depth * index.level_width)
                .filter(|&w| w > 0),
            None if depth == 0 => Some(self.payload_length),
            None => None,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Bit Conversion Tests
    // ========================================================================

    #[test]
    fn test_bytes_to_bits_msb_first() {
        let bits = bytes_to_bits(&[0xA0]);
        assert_eq!(
            bits,
            vec![true, false, true, false, false, false, false, false]
        );
    }

    #[test]
    fn test_bits_to_bytes_drops_partial_byte() {
        let mut bits = bytes_to_bits(b"ok");
        bits.extend([true, true, true]);
        assert_eq!(bits_to_bytes(&bits), b"ok");
    }

    #[test]
    fn test_field_roundtrip() {
        let mut bits = Vec::new();
        push_field(&mut bits, 97, 7);
        assert_eq!(bits.len(), 7);
        assert_eq!(read_field(&bits), 97);
    }

    // ========================================================================
    // Framing Tests
    // ========================================================================

    #[test]
    fn test_full_frames_for_aligned_content() {
        let bits: Vec<bool> = (0..240).map(|i| i % 3 == 0).collect();
        let frames = frame_content(&bits, 120);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], bits[..120]);
        assert_eq!(unframe(&frames[1]).unwrap(), &bits[120..]);
    }

    #[test]
    fn test_marked_frame_for_large_shortfall() {
        let bits = vec![true; 50];
        let frames = frame_content(&bits, 120);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 120);
        assert_eq!(read_field(&frames[0][ZERO_RUN..ZERO_MARK]), 50);
        assert_eq!(unframe(&frames[0]).unwrap(), &bits[..]);
    }

    #[test]
    fn test_small_shortfall_splits_into_marked_frames() {
        // 110 bits leave a shortfall of 10 < ZERO_MARK in a 120-bit frame.
        let bits = vec![true; 110];
        let frames = frame_content(&bits, 120);
        assert_eq!(frames.len(), 2);
        let recovered: Vec<bool> = frames
            .iter()
            .flat_map(|f| unframe(f).unwrap().to_vec())
            .collect();
        assert_eq!(recovered, bits);
    }

    #[test]
    fn test_leading_zero_run_is_never_a_full_frame() {
        let mut bits = vec![false; 20];
        bits.extend(vec![true; 200]);
        let frames = frame_content(&bits, 120);
        let recovered: Vec<bool> = frames
            .iter()
            .flat_map(|f| unframe(f).unwrap().to_vec())
            .collect();
        assert_eq!(recovered, bits);
        assert!(opens_with_zero_run(&frames[0]));
    }

    #[test]
    fn test_all_zero_frame_is_empty() {
        let frame = vec![false; 120];
        assert!(unframe(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_wide_frame_caps_marked_length() {
        assert_eq!(marked_capacity(400), 127);
        let bits = vec![true; 300];
        let frames = frame_content(&bits, 400);
        assert_eq!(frames.len(), 3);
        let total: usize = frames.iter().map(|f| unframe(f).unwrap().len()).sum();
        assert_eq!(total, 300);
    }

    #[test]
    fn test_plain_framing_pads_tail() {
        let bits = vec![true; 10];
        let frames = frame_content(&bits, 8);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], vec![true, true, false, false, false, false, false, false]);
        assert_eq!(unframe(&frames[1]).unwrap().len(), 8);
    }

    #[test]
    fn test_end_mark_survives_padding() {
        let mut bits = bytes_to_bits(&[0x41, 0x00]);
        push_end_mark(&mut bits);
        let frames = frame_content(&bits, 8);
        assert_eq!(frames.len(), 3);
        let mut decoded: Vec<bool> = frames.concat();
        // A trailing all-zero segment is cut off too.
        decoded.extend([false; 8]);
        assert_eq!(bits_to_bytes(strip_end_mark(&decoded).unwrap()), vec![0x41, 0x00]);
    }

    #[test]
    fn test_end_mark_errors() {
        let mut empty = Vec::new();
        push_end_mark(&mut empty);
        assert!(empty.is_empty());
        assert!(strip_end_mark(&empty).unwrap().is_empty());
        assert!(matches!(
            strip_end_mark(&[false; 16]),
            Err(CodecError::MalformedSequence(_))
        ));
        assert!(matches!(
            strip_end_mark(&[true, false, true, false]),
            Err(CodecError::MalformedSequence(_))
        ));
    }

    #[test]
    fn test_unframe_rejects_oversized_length() {
        let mut frame = vec![false; 30];
        // claim 100 content bits in a frame that has room for 8
        let mut field = Vec::new();
        push_field(&mut field, 100, LENGTH_FIELD);
        frame[ZERO_RUN..ZERO_MARK].copy_from_slice(&field);
        assert!(matches!(
            unframe(&frame),
            Err(CodecError::MalformedSequence(_))
        ));
    }

    // ========================================================================
    // Layout Tests
    // ========================================================================

    #[test]
    fn test_default_layout() {
        let layout = SegmentLayout::default();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.segment_length(), 140);
        assert_eq!(layout.payload_width(0), Some(120));
        assert_eq!(layout.payload_width(2), Some(92));
        assert_eq!(layout.payload_width(9), None);
    }

    #[test]
    fn test_layout_validation() {
        assert!(SegmentLayout::unindexed(8).validate().is_ok());
        assert!(SegmentLayout::unindexed(16).validate().is_err());
        assert!(SegmentLayout::unindexed(64).validate().is_ok());
        let narrow = SegmentLayout {
            payload_length: 20,
            index: Some(IndexLayout::default()),
        };
        assert!(narrow.validate().is_err());
    }
}
