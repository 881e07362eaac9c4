// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # Segment Pairing
//!
//! The transcoder consumes segments two at a time. The [`Pairer`] walks the
//! segment list in order, takes the first unpaired segment and searches up to
//! `search_count` later unpaired segments for a partner that
//!
//! 1. has the same lane shape (length and chain depth, so markers align),
//! 2. decodes back unambiguously in one of the two lane orientations, and
//! 3. passes the [`SequenceValidator`].
//!
//! When no partner qualifies a *filler* is synthesized: an all-zero payload
//! under a random unused primary of at least ten times the segment count. An
//! all-zero frame carries no content, so fillers vanish on decode. If no
//! filler passes the validator either, the first neighbour that round-trips
//! is taken instead.
//!
//! Without an index, order is carried by position alone, so segments are
//! paired strictly in sequence (upper, then lower) and an odd tail is
//! completed with an all-zero segment.
//!
//! Randomness comes from an owned [`StdRng`] seeded from
//! [`PairingConfig::seed`], so identical input always pairs identically.

use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CodecError, Result};
use crate::index::{HierarchicalIndex, IndexLayout, MARKER_WIDTH};
use crate::screening::SequenceValidator;
use crate::segment::{Segment, SegmentLayout, Slot, marker_count};
use crate::transcoder::Transcoder;

/// Filler primaries start at this multiple of the segment count.
const FILLER_FLOOR_FACTOR: u64 = 10;

// ============================================================================
// Configuration
// ============================================================================

/// Search budget and seed of the pairer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Candidates examined per segment before falling back to a filler.
    pub search_count: usize,
    /// Seed for filler index generation.
    pub seed: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        PairingConfig {
            search_count: 100,
            seed: 30,
        }
    }
}

impl PairingConfig {
    /// Checks that the search budget is usable.
    pub fn validate(&self) -> Result<()> {
        if self.search_count == 0 {
            return Err(CodecError::config("search count must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// Pairing Result
// ============================================================================

/// Output of [`Pairer::pair`].
#[derive(Debug, Clone, Default)]
pub struct Pairing {
    /// Segments as `[upper, lower, upper, lower, ...]`; always even.
    pub matrix: Vec<Segment>,
    /// One symbol sequence per lane pair.
    pub sequences: Vec<Vec<u8>>,
    /// Number of synthesized filler segments.
    pub fillers: usize,
    /// Candidates examined per accepted pairing, mapped to occurrence count.
    pub search_histogram: BTreeMap<usize, usize>,
}

// ============================================================================
// Pairer
// ============================================================================

/// Pairs segments for transcoding.
pub struct Pairer<'a> {
    transcoder: &'a Transcoder,
    validator: &'a dyn SequenceValidator,
    layout: &'a SegmentLayout,
    search_count: usize,
    rng: StdRng,
}

impl<'a> Pairer<'a> {
    /// Creates a pairer with a freshly seeded generator.
    pub fn new(
        transcoder: &'a Transcoder,
        validator: &'a dyn SequenceValidator,
        layout: &'a SegmentLayout,
        config: &PairingConfig,
    ) -> Self {
        Pairer {
            transcoder,
            validator,
            layout,
            search_count: config.search_count.max(1),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Pairs every segment exactly once, adding fillers where needed.
    ///
    /// # Errors
    ///
    /// - [`CodecError::PairingExhausted`] if a segment has neither a
    ///   decodable partner nor a decodable filler.
    /// - [`CodecError::MalformedSequence`] if a segment's index cannot be read.
    pub fn pair(&mut self, segments: Vec<Segment>) -> Result<Pairing> {
        let Some(index_layout) = self.layout.index.clone() else {
            return self.pair_in_order(segments);
        };
        let total = segments.len();
        let mut used = HashSet::new();
        for segment in &segments {
            let (index, _) = index_layout.divide(segment)?;
            used.insert(index);
        }
        let floor = (total as u64).saturating_mul(FILLER_FLOOR_FACTOR);

        let mut pool: Vec<Option<Segment>> = segments.into_iter().map(Some).collect();
        let mut pairing = Pairing {
            matrix: Vec::with_capacity(total + 1),
            sequences: Vec::with_capacity(total / 2 + 1),
            ..Pairing::default()
        };

        for cursor in 0..pool.len() {
            let Some(fixed) = pool[cursor].take() else {
                continue;
            };
            let shape = lane_shape(&fixed);

            let mut examined = 0;
            let mut accepted = None;
            let mut adjacent = None;
            for j in cursor + 1..pool.len() {
                if examined == self.search_count {
                    break;
                }
                let Some(candidate) = pool[j].as_ref() else {
                    continue;
                };
                examined += 1;
                if lane_shape(candidate) != shape {
                    continue;
                }
                if let Some(found) = self.try_orientations(&fixed, candidate, true)? {
                    accepted = Some((j, found));
                    break;
                }
                if adjacent.is_none() {
                    adjacent = self
                        .try_orientations(&fixed, candidate, false)?
                        .map(|found| (j, found));
                }
            }

            let chosen = match accepted {
                Some(accepted) => Partner::Candidate(accepted),
                None => {
                    let filler = self.synthesize_filler(&index_layout, &fixed, floor, &used)?;
                    match (filler, adjacent) {
                        (Some(filler), _) if filler.valid => Partner::Filler(filler),
                        // An invalid filler buys nothing over a real neighbour.
                        (_, Some(adjacent)) => Partner::Candidate(adjacent),
                        (Some(filler), None) => Partner::Filler(filler),
                        (None, None) => {
                            return Err(CodecError::PairingExhausted(format!(
                                "no partner or filler index in [{}, {}) gives a decodable sequence",
                                floor,
                                index_layout.primary_capacity()
                            )));
                        }
                    }
                }
            };

            let (partner, (sequence, fixed_upper)) = match chosen {
                Partner::Candidate((j, found)) => {
                    *pairing.search_histogram.entry(examined).or_insert(0) += 1;
                    let partner = pool[j].take().ok_or_else(|| {
                        CodecError::PairingExhausted(format!("segment {} was paired twice", j))
                    })?;
                    (partner, found)
                }
                Partner::Filler(filler) => {
                    pairing.fillers += 1;
                    used.insert(filler.index);
                    (filler.segment, filler.found)
                }
            };

            if fixed_upper {
                pairing.matrix.push(fixed);
                pairing.matrix.push(partner);
            } else {
                pairing.matrix.push(partner);
                pairing.matrix.push(fixed);
            }
            pairing.sequences.push(sequence);
        }

        debug!(
            segments = total,
            sequences = pairing.sequences.len(),
            fillers = pairing.fillers,
            histogram = ?pairing.search_histogram,
            "paired segments"
        );
        Ok(pairing)
    }

    /// Pairs neighbours as they come; lane order is the only order there is.
    fn pair_in_order(&self, segments: Vec<Segment>) -> Result<Pairing> {
        let total = segments.len();
        let mut pairing = Pairing {
            matrix: Vec::with_capacity(total + 1),
            sequences: Vec::with_capacity(total / 2 + 1),
            ..Pairing::default()
        };
        let mut lanes = segments.into_iter();
        while let Some(upper) = lanes.next() {
            let lower = match lanes.next() {
                Some(lower) => lower,
                None => {
                    pairing.fillers += 1;
                    vec![Slot::Bit(false); upper.len()]
                }
            };
            let sequence = self.transcoder.encode_pair(&upper, &lower)?;
            if !self.validator.is_valid(&sequence) {
                debug!(
                    pair = pairing.sequences.len(),
                    "unindexed pair fails screening; kept to preserve order"
                );
            }
            pairing.matrix.push(upper);
            pairing.matrix.push(lower);
            pairing.sequences.push(sequence);
        }
        debug!(
            segments = total,
            sequences = pairing.sequences.len(),
            fillers = pairing.fillers,
            "paired unindexed segments in order"
        );
        Ok(pairing)
    }

    /// Tries `fixed` as upper then as lower lane against `other`.
    ///
    /// With `require_valid` unset the validator is not consulted.
    fn try_orientations(
        &self,
        fixed: &[Slot],
        other: &[Slot],
        require_valid: bool,
    ) -> Result<Option<(Vec<u8>, bool)>> {
        let chain = self.layout.index.as_ref();
        for fixed_upper in [true, false] {
            let (upper, lower) = if fixed_upper {
                (fixed, other)
            } else {
                (other, fixed)
            };
            let sequence = self.transcoder.encode_pair(upper, lower)?;
            if !self.transcoder.round_trips(&sequence, upper, lower, chain) {
                continue;
            }
            if !require_valid || self.validator.is_valid(&sequence) {
                return Ok(Some((sequence, fixed_upper)));
            }
        }
        Ok(None)
    }

    /// Draws filler indices until one pairs validly with `fixed`.
    ///
    /// Returns the first valid draw, else the first draw that at least
    /// round-trips, else `None` (also when the index range is empty).
    fn synthesize_filler(
        &mut self,
        index_layout: &IndexLayout,
        fixed: &[Slot],
        floor: u64,
        used: &HashSet<HierarchicalIndex>,
    ) -> Result<Option<Filler>> {
        let ceiling = index_layout.primary_capacity() as u64;
        if floor >= ceiling {
            debug!(floor, ceiling, "filler index range is empty");
            return Ok(None);
        }
        let depth = marker_count(fixed) / MARKER_WIDTH;
        let payload_width = fixed.len().saturating_sub(index_layout.index_width(depth));

        let mut fallback = None;
        for _ in 0..self.search_count {
            let primary = self.rng.gen_range(floor..ceiling);
            let index = HierarchicalIndex::with_levels(primary, vec![0; depth]);
            if used.contains(&index) {
                continue;
            }
            let segment = index_layout.connect(&index, &vec![false; payload_width])?;
            if let Some(found) = self.try_orientations(fixed, &segment, true)? {
                return Ok(Some(Filler {
                    index,
                    segment,
                    found,
                    valid: true,
                }));
            }
            if fallback.is_none() {
                if let Some(found) = self.try_orientations(fixed, &segment, false)? {
                    fallback = Some(Filler {
                        index,
                        segment,
                        found,
                        valid: false,
                    });
                }
            }
        }
        Ok(fallback)
    }
}

/// A synthesized partner and its encoding with the fixed segment.
struct Filler {
    index: HierarchicalIndex,
    segment: Segment,
    found: (Vec<u8>, bool),
    valid: bool,
}

enum Partner {
    /// Pool position of a real segment and its encoding.
    Candidate((usize, (Vec<u8>, bool))),
    Filler(Filler),
}

/// Length and marker count: segments of equal shape have aligned markers.
fn lane_shape(segment: &[Slot]) -> (usize, usize) {
    (segment.len(), marker_count(segment))
}

// ============================================================================
// Unit Tests
// ============================================================================
