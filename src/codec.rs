// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # Codec Pipeline
//!
//! The public entry point: full encoding of a file, decoding of a version, and
//! incremental encoding of a new version from a prior one plus edits.
//!
//! ## Encode
//!
//! ```text
//! bytes -> bits -> frames -> [index | frame] segments -> pairer -> symbols
//! ```
//!
//! ## Decode
//!
//! ```text
//! symbols -> lane pairs -> (redundancy removed) -> divide -> sort -> unframe -> bytes
//! ```
//!
//! ## Incremental encode
//!
//! The prior version is decoded down to sorted [`IndexedSegment`]s, the
//! [`DiffEngine`] splices the edits in, and the result is paired and
//! transcoded again. Untouched segments keep their indices.
//!
//! ```rust
//! use dnaver::codec::{Codec, CodecModel};
//! use dnaver::diff::ModificationOp;
//!
//! let codec = Codec::new(CodecModel::default()).unwrap();
//! let v1 = codec.encode(b"The quick brown fox jumps over the lazy dog").unwrap();
//! assert_eq!(codec.decode(v1.sequences()).unwrap(), b"The quick brown fox jumps over the lazy dog");
//!
//! let op = ModificationOp::replace(b"quick ".to_vec(), b"brown".to_vec(), b"red".to_vec());
//! let v2 = codec.apply_edits(v1.sequences(), &[op]).unwrap();
//! assert_eq!(codec.decode(v2.sequences()).unwrap(), b"The quick red fox jumps over the lazy dog");
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::diff::{DiffEngine, ModificationOp};
use crate::error::{CodecError, Result};
use crate::index::{HierarchicalIndex, IndexLayout};
use crate::io;
use crate::order::{IndexedSegment, restore_order};
use crate::pairing::{Pairer, PairingConfig};
use crate::redundancy::Redundancy;
use crate::screening::SequenceValidator;
use crate::segment::{
    Segment, SegmentLayout, Slot, ZERO_MARK, bits_to_bytes, bytes_to_bits, frame_content,
    push_end_mark, slots_from_bits, strip_end_mark, unframe,
};
use crate::transcoder::{Transcoder, TranscoderConfig};

// ============================================================================
// Model
// ============================================================================

/// Everything needed to reproduce an encoding: rule set, layout and pairing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecModel {
    /// Transcoding rule and screening limits.
    pub transcoder: TranscoderConfig,
    /// Segment and index widths.
    pub layout: SegmentLayout,
    /// Pairing search budget and seed.
    pub pairing: PairingConfig,
}

impl CodecModel {
    /// Saves the model as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        io::write_bytes(path, &json)
    }

    /// Loads a model saved with [`CodecModel::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read(path)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

// ============================================================================
// Artifact
// ============================================================================

/// The symbol sequences of one version and the index of every segment in
/// file order (empty for unindexed layouts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionArtifact {
    sequences: Vec<Vec<u8>>,
    indices: Vec<HierarchicalIndex>,
    fillers: usize,
    size: usize,
}

impl VersionArtifact {
    /// Symbol sequences, one per lane pair.
    pub fn sequences(&self) -> &[Vec<u8>] {
        &self.sequences
    }

    /// Segment indices in file order, fillers included.
    pub fn indices(&self) -> &[HierarchicalIndex] {
        &self.indices
    }

    /// Number of filler segments added while pairing.
    pub fn fillers(&self) -> usize {
        self.fillers
    }

    /// Byte length of the content this version encodes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Consumes the artifact, returning its sequences.
    pub fn into_sequences(self) -> Vec<Vec<u8>> {
        self.sequences
    }
}

// ============================================================================
// Codec
// ============================================================================

/// A configured encoder/decoder.
///
/// The validator defaults to the transcoder's [`Screening`](crate::screening::Screening)
/// limits and there is no redundancy unless one is attached.
pub struct Codec {
    transcoder: Transcoder,
    layout: SegmentLayout,
    pairing: PairingConfig,
    validator: Box<dyn SequenceValidator>,
    redundancy: Option<Box<dyn Redundancy>>,
}

impl Codec {
    /// Validates `model` and builds a codec from it.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] if any part of the model is
    /// invalid.
    pub fn new(model: CodecModel) -> Result<Self> {
        model.layout.validate()?;
        model.pairing.validate()?;
        let transcoder = Transcoder::new(model.transcoder)?;
        let validator = Box::new(transcoder.screening().clone());
        Ok(Codec {
            transcoder,
            layout: model.layout,
            pairing: model.pairing,
            validator,
            redundancy: None,
        })
    }

    /// Replaces the sequence validator used while pairing.
    pub fn with_validator(mut self, validator: impl SequenceValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Applies `redundancy` around the transcoder.
    pub fn with_redundancy(mut self, redundancy: impl Redundancy + 'static) -> Self {
        self.redundancy = Some(Box::new(redundancy));
        self
    }

    /// The model this codec was built from.
    pub fn model(&self) -> CodecModel {
        CodecModel {
            transcoder: self.transcoder.config().clone(),
            layout: self.layout.clone(),
            pairing: self.pairing.clone(),
        }
    }

    /// The segment layout in use.
    pub fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    // ------------------------------------------------------------------------
    // Encoding
    // ------------------------------------------------------------------------

    /// Encodes `data` from scratch.
    ///
    /// # Errors
    ///
    /// - [`CodecError::IndexCapacity`] if the file needs more segments than
    ///   the primary field can number.
    /// - [`CodecError::PairingExhausted`] if pairing fails.
    pub fn encode(&self, data: &[u8]) -> Result<VersionArtifact> {
        let width = self
            .layout
            .payload_width(0)
            .ok_or_else(|| CodecError::config("layout has no payload"))?;
        let mut bits = bytes_to_bits(data);
        if self.is_plain() {
            push_end_mark(&mut bits);
        }
        let frames = frame_content(&bits, width);
        let segments = match &self.layout.index {
            Some(index_layout) => frames
                .iter()
                .enumerate()
                .map(|(i, frame)| index_layout.connect(&HierarchicalIndex::new(i as u64), frame))
                .collect::<Result<Vec<Segment>>>()?,
            None => frames.iter().map(|frame| slots_from_bits(frame)).collect(),
        };

        let artifact = self.emit(segments, data.len())?;
        info!(
            bytes = data.len(),
            segments = frames.len(),
            fillers = artifact.fillers,
            sequences = artifact.sequences.len(),
            "encoded file"
        );
        Ok(artifact)
    }

    /// Encodes a new version by applying `ops` to the version in `prior`.
    ///
    /// Segments outside the edited spans keep their indices.
    ///
    /// # Errors
    ///
    /// - [`CodecError::Configuration`] for unindexed layouts.
    /// - [`CodecError::AnchorNotFound`], [`CodecError::EditConflict`] or
    ///   [`CodecError::IndexCapacity`] from the diff engine.
    /// - [`CodecError::MalformedSequence`] if `prior` does not decode.
    pub fn apply_edits(
        &self,
        prior: &[Vec<u8>],
        ops: &[ModificationOp],
    ) -> Result<VersionArtifact> {
        let engine = DiffEngine::new(&self.layout)?;
        let index_layout = self.index_layout()?;
        let segments = self.read_indexed(prior)?;
        let outcome = engine.apply(segments, ops)?;
        let mut size = 0;
        for segment in &outcome.segments {
            size += unframe(&segment.frame)?.len();
        }

        let segments = outcome
            .segments
            .iter()
            .map(|s| index_layout.connect(&s.index, &s.frame))
            .collect::<Result<Vec<Segment>>>()?;
        let artifact = self.emit(segments, size / 8)?;
        info!(
            ops = ops.len(),
            groups = outcome.report.groups,
            removed = outcome.report.removed,
            added = outcome.report.added,
            max_depth = outcome.report.max_depth,
            sequences = artifact.sequences.len(),
            "encoded new version"
        );
        Ok(artifact)
    }

    /// Pairs, protects and transcodes a segment list.
    fn emit(&self, segments: Vec<Segment>, size: usize) -> Result<VersionArtifact> {
        let mut pairer = Pairer::new(
            &self.transcoder,
            self.validator.as_ref(),
            &self.layout,
            &self.pairing,
        );
        let pairing = pairer.pair(segments)?;

        let indices = match &self.layout.index {
            Some(index_layout) => {
                let mut indices = pairing
                    .matrix
                    .iter()
                    .map(|s| index_layout.divide(s).map(|(index, _)| index))
                    .collect::<Result<Vec<_>>>()?;
                indices.sort();
                indices
            }
            None => Vec::new(),
        };

        let sequences = match &self.redundancy {
            Some(redundancy) => {
                let chain = self.layout.index.as_ref();
                let matrix = redundancy.add_redundancy(pairing.matrix)?;
                matrix
                    .chunks_exact(2)
                    .enumerate()
                    .map(|(n, lanes)| {
                        let sequence = self.transcoder.encode_pair(&lanes[0], &lanes[1])?;
                        if !self.transcoder.round_trips(&sequence, &lanes[0], &lanes[1], chain) {
                            return Err(CodecError::PairingExhausted(format!(
                                "pair {} no longer decodes once redundancy is added",
                                n
                            )));
                        }
                        Ok(sequence)
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            None => pairing.sequences,
        };

        Ok(VersionArtifact {
            sequences,
            indices,
            fillers: pairing.fillers,
            size,
        })
    }

    // ------------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------------

    /// Decodes a version back to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedSequence`] for foreign symbols, lengths
    /// that do not match the layout, corrupt indices or frames, or duplicate
    /// indices.
    pub fn decode(&self, sequences: &[Vec<u8>]) -> Result<Vec<u8>> {
        let bits = match &self.layout.index {
            Some(_) => {
                let segments = self.read_indexed(sequences)?;
                let mut bits = Vec::new();
                for segment in &segments {
                    bits.extend_from_slice(unframe(&segment.frame)?);
                }
                bits
            }
            None => {
                let matrix = self.read_matrix(sequences)?;
                let mut bits = Vec::new();
                for segment in &matrix {
                    let frame = segment_bits(segment)?;
                    if self.is_plain() {
                        bits.extend_from_slice(&frame);
                    } else {
                        bits.extend_from_slice(unframe(&frame)?);
                    }
                }
                if self.is_plain() {
                    bits = strip_end_mark(&bits)?.to_vec();
                }
                bits
            }
        };
        let data = bits_to_bytes(&bits);
        info!(
            sequences = sequences.len(),
            bytes = data.len(),
            "decoded version"
        );
        Ok(data)
    }

    /// Splits sequences into lanes and strips redundancy.
    fn read_matrix(&self, sequences: &[Vec<u8>]) -> Result<Vec<Segment>> {
        let chain = self.layout.index.as_ref();
        let mut matrix = Vec::with_capacity(sequences.len() * 2);
        for (n, sequence) in sequences.iter().enumerate() {
            if sequence.len() != sequences[0].len() {
                return Err(CodecError::malformed(format!(
                    "sequence {} has length {}, expected {}",
                    n,
                    sequence.len(),
                    sequences[0].len()
                )));
            }
            let (upper, lower) = self.transcoder.decode_pair(sequence, chain)?;
            matrix.push(upper);
            matrix.push(lower);
        }
        if let Some(redundancy) = &self.redundancy {
            matrix = redundancy.remove_redundancy(matrix)?;
        }

        let expected = self.layout.segment_length();
        if let Some(segment) = matrix.iter().find(|s| s.len() != expected) {
            return Err(CodecError::malformed(format!(
                "segment of {} slots does not match the layout's {}",
                segment.len(),
                expected
            )));
        }
        debug!(sequences = sequences.len(), segments = matrix.len(), "read matrix");
        Ok(matrix)
    }

    /// Reads an indexed version into segments in file order.
    fn read_indexed(&self, sequences: &[Vec<u8>]) -> Result<Vec<IndexedSegment>> {
        let index_layout = self.index_layout()?;
        let segments = self
            .read_matrix(sequences)?
            .iter()
            .map(|segment| {
                let (index, frame) = index_layout.divide(segment)?;
                if Some(frame.len()) != self.layout.payload_width(index.depth()) {
                    return Err(CodecError::malformed(format!(
                        "segment {} carries a {}-bit payload",
                        index,
                        frame.len()
                    )));
                }
                Ok(IndexedSegment::new(index, frame))
            })
            .collect::<Result<Vec<_>>>()?;
        restore_order(segments)
    }

    /// Unindexed payloads too narrow for marked frames.
    fn is_plain(&self) -> bool {
        self.layout.index.is_none() && self.layout.payload_length <= ZERO_MARK
    }

    fn index_layout(&self) -> Result<&IndexLayout> {
        self.layout
            .index
            .as_ref()
            .ok_or_else(|| CodecError::config("operation requires an indexed layout"))
    }

    // ------------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------------

    /// Encodes the file at `input` and writes one sequence per line to `output`.
    pub fn encode_file(&self, input: &Path, output: &Path) -> Result<VersionArtifact> {
        let data = io::read_bytes(input)?;
        let artifact = self.encode(&data)?;
        io::write_symbol_lines(output, &artifact.sequences)?;
        Ok(artifact)
    }

    /// Decodes the symbol file at `input` into `output`, returning the byte count.
    pub fn decode_file(&self, input: &Path, output: &Path) -> Result<usize> {
        let sequences = io::read_symbol_lines(input)?;
        let data = self.decode(&sequences)?;
        io::write_bytes(output, &data)?;
        Ok(data.len())
    }

    /// Applies `ops` to the version stored at `prior` and writes the new
    /// version to `output`. Nothing is written if any edit fails.
    pub fn encode_version_file(
        &self,
        prior: &Path,
        ops: &[ModificationOp],
        output: &Path,
    ) -> Result<VersionArtifact> {
        let sequences = io::read_symbol_lines(prior)?;
        let artifact = self.apply_edits(&sequences, ops)?;
        io::write_symbol_lines(output, &artifact.sequences)?;
        Ok(artifact)
    }
}

fn segment_bits(segment: &[Slot]) -> Result<Vec<bool>> {
    segment
        .iter()
        .map(|slot| {
            slot.bit()
                .ok_or_else(|| CodecError::malformed("marker slot in unindexed segment"))
        })
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapacityShortfall;
    use crate::redundancy::EvenParity;
    use crate::screening::Screening;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn codec() -> Codec {
        Codec::new(CodecModel::default()).unwrap()
    }

    fn screening() -> Screening {
        Screening {
            max_homopolymer: Some(4),
            max_gc_content: 0.6,
            min_free_energy: None,
        }
    }

    fn screened_codec() -> Codec {
        let mut model = CodecModel::default();
        model.transcoder.screening = screening();
        Codec::new(model).unwrap()
    }

    /// Splices `op` into `content` the way the diff engine locates it.
    fn splice(content: &[u8], op: &ModificationOp) -> Vec<u8> {
        let mut needle = op.anchor.clone();
        needle.extend_from_slice(op.removed_content());
        let at = content
            .windows(needle.len())
            .position(|w| w == needle.as_slice())
            .unwrap()
            + op.anchor.len();
        let mut spliced = content[..at].to_vec();
        spliced.extend_from_slice(op.inserted_content());
        spliced.extend_from_slice(&content[at + op.removed_content().len()..]);
        spliced
    }

    /// Numbered tokens, so any 10-byte excerpt is unique.
    fn text(n: usize) -> Vec<u8> {
        (0..)
            .flat_map(|i: usize| format!("{:04} ", i).into_bytes())
            .take(n)
            .collect()
    }

    // ========================================================================
    // Full Encode / Decode Tests
    // ========================================================================

    #[test]
    fn test_roundtrip_default_model() {
        let codec = codec();
        let data = text(1000);
        let artifact = codec.encode(&data).unwrap();
        assert!(artifact.sequences().iter().all(|s| s.len() == 140));
        assert_eq!(codec.decode(artifact.sequences()).unwrap(), data);
    }

    #[test]
    fn test_empty_file() {
        let codec = codec();
        let artifact = codec.encode(b"").unwrap();
        assert!(artifact.sequences().is_empty());
        assert!(codec.decode(artifact.sequences()).unwrap().is_empty());
    }

    #[test]
    fn test_odd_segment_count_gets_one_filler() {
        let codec = codec();
        // 45 bytes = 3 full frames of 120 bits.
        let data = text(45);
        let artifact = codec.encode(&data).unwrap();
        assert_eq!(artifact.sequences().len(), 2);
        assert_eq!(artifact.fillers(), 1);
        assert_eq!(artifact.indices().len(), 4);
        assert_eq!(codec.decode(artifact.sequences()).unwrap(), data);
    }

    #[test]
    fn test_unindexed_plain_framing() {
        let model = CodecModel {
            layout: SegmentLayout::unindexed(8),
            ..CodecModel::default()
        };
        let codec = Codec::new(model).unwrap();
        let inputs: [&[u8]; 4] = [b"0123456789", b"012345678", b"01234567", b"ab\0\0\0"];
        for data in inputs {
            let artifact = codec.encode(data).unwrap();
            assert!(artifact.sequences().iter().all(|s| s.len() == 8));
            assert!(artifact.indices().is_empty());
            assert_eq!(artifact.size(), data.len());
            assert_eq!(codec.decode(artifact.sequences()).unwrap(), data);
        }
        assert!(codec.decode(codec.encode(b"").unwrap().sequences()).unwrap().is_empty());
    }

    #[test]
    fn test_unindexed_plain_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        let encoded = dir.path().join("in.dna");
        let output = dir.path().join("out.bin");
        let data = b"odd length!".to_vec();
        fs::write(&input, &data).unwrap();

        let model = CodecModel {
            layout: SegmentLayout::unindexed(8),
            ..CodecModel::default()
        };
        let codec = Codec::new(model).unwrap();
        codec.encode_file(&input, &encoded).unwrap();
        assert_eq!(codec.decode_file(&encoded, &output).unwrap(), data.len());
        assert_eq!(fs::read(&output).unwrap(), data);
    }

    #[test]
    fn test_unindexed_marked_framing() {
        let model = CodecModel {
            layout: SegmentLayout::unindexed(64),
            ..CodecModel::default()
        };
        let codec = Codec::new(model).unwrap();
        let data = text(77);
        let artifact = codec.encode(&data).unwrap();
        assert_eq!(codec.decode(artifact.sequences()).unwrap(), data);
    }

    #[test]
    fn test_leading_zero_content() {
        let codec = codec();
        let mut data = vec![0u8; 40];
        data.extend_from_slice(b"tail");
        let artifact = codec.encode(&data).unwrap();
        assert_eq!(codec.decode(artifact.sequences()).unwrap(), data);
    }

    #[test]
    fn test_mismatched_lengths_are_malformed() {
        let codec = codec();
        let mut sequences = codec.encode(&text(100)).unwrap().into_sequences();
        sequences[1].pop();
        assert!(matches!(
            codec.decode(&sequences),
            Err(CodecError::MalformedSequence(_))
        ));
    }

    #[test]
    fn test_foreign_symbol_is_malformed() {
        let codec = codec();
        let mut sequences = codec.encode(&text(30)).unwrap().into_sequences();
        sequences[0][5] = b'N';
        assert!(matches!(
            codec.decode(&sequences),
            Err(CodecError::MalformedSequence(_))
        ));
    }

    #[test]
    fn test_screened_encoding_adds_only_valid_fillers() {
        let codec = screened_codec();
        let screening = screening();
        // 600 bytes fill 40 segments.
        let data = text(600);
        let artifact = codec.encode(&data).unwrap();
        assert_eq!(codec.decode(artifact.sequences()).unwrap(), data);
        assert_eq!(artifact.sequences().len(), 20 + artifact.fillers() / 2);

        let valid = artifact
            .sequences()
            .iter()
            .filter(|s| screening.is_valid(s))
            .count();
        assert!(valid >= artifact.fillers());
    }

    #[test]
    fn test_rejecting_validator_needs_no_fillers() {
        let codec = codec().with_validator(|_: &[u8]| false);
        let data = text(600);
        let artifact = codec.encode(&data).unwrap();
        assert_eq!(artifact.fillers(), 0);
        assert_eq!(artifact.sequences().len(), 20);
        assert_eq!(codec.decode(artifact.sequences()).unwrap(), data);
    }

    #[test]
    fn test_invalid_model_is_rejected() {
        let mut model = CodecModel::default();
        model.layout.payload_length = 16;
        assert!(matches!(
            Codec::new(model),
            Err(CodecError::Configuration(_))
        ));
    }

    // ========================================================================
    // Incremental Encode Tests
    // ========================================================================

    #[test]
    fn test_insert_at_front() {
        let codec = codec();
        let v1 = text(60);
        let prior = codec.encode(&v1).unwrap();

        let op = ModificationOp::insert(b"".to_vec(), b"Hello, ".to_vec());
        let next = codec.apply_edits(prior.sequences(), &[op]).unwrap();

        let mut expected = b"Hello, ".to_vec();
        expected.extend_from_slice(&v1);
        assert_eq!(codec.decode(next.sequences()).unwrap(), expected);
        assert!(next.indices().iter().any(|i| i.depth() == 1));
    }

    #[test]
    fn test_untouched_segments_keep_indices() {
        let codec = codec();
        let v1 = text(300);
        let prior = codec.encode(&v1).unwrap();

        let op = ModificationOp::insert(&v1[150..170], b"!!".to_vec());
        let next = codec.apply_edits(prior.sequences(), &[op]).unwrap();

        let kept: Vec<_> = prior
            .indices()
            .iter()
            .filter(|i| next.indices().contains(i))
            .collect();
        assert!(kept.len() >= prior.indices().len() - 2);
        assert!(next.indices().contains(&HierarchicalIndex::new(0)));
    }

    #[test]
    fn test_replace_across_segment_boundary() {
        let codec = codec();
        let v1 = text(200);
        let prior = codec.encode(&v1).unwrap();

        // Bytes 10..20 straddle the first segment boundary (byte 15).
        let op = ModificationOp::replace(&v1[..10], v1[10..20].to_vec(), b"<swapped>".to_vec());
        let next = codec.apply_edits(prior.sequences(), &[op]).unwrap();

        let mut expected = v1[..10].to_vec();
        expected.extend_from_slice(b"<swapped>");
        expected.extend_from_slice(&v1[20..]);
        assert_eq!(codec.decode(next.sequences()).unwrap(), expected);
    }

    #[test]
    fn test_delete_then_insert_versions_chain() {
        let codec = codec();
        let v1 = text(150);
        let s1 = codec.encode(&v1).unwrap();

        let s2 = codec
            .apply_edits(s1.sequences(), &[ModificationOp::delete(&v1[..20], v1[20..50].to_vec())])
            .unwrap();
        let mut v2 = v1[..20].to_vec();
        v2.extend_from_slice(&v1[50..]);
        assert_eq!(codec.decode(s2.sequences()).unwrap(), v2);

        let s3 = codec
            .apply_edits(s2.sequences(), &[ModificationOp::insert(&v1[..20], b"**".to_vec())])
            .unwrap();
        let mut v3 = v1[..20].to_vec();
        v3.extend_from_slice(b"**");
        v3.extend_from_slice(&v1[50..]);
        assert_eq!(codec.decode(s3.sequences()).unwrap(), v3);
    }

    #[test]
    fn test_screened_version_chain() {
        let codec = screened_codec();
        let mut rng = StdRng::seed_from_u64(11);
        let mut content = text(600);
        let mut artifact = codec.encode(&content).unwrap();

        for round in 0..12 {
            let at = rng.gen_range(12..content.len() - 12);
            let anchor = content[at - 12..at].to_vec();
            let op = match round % 3 {
                0 => ModificationOp::insert(anchor, format!("<v{}>", round).into_bytes()),
                1 => ModificationOp::delete(anchor, content[at..at + 9].to_vec()),
                _ => ModificationOp::replace(anchor, content[at..at + 4].to_vec(), b"[r]".to_vec()),
            };
            let expected = splice(&content, &op);
            artifact = codec.apply_edits(artifact.sequences(), &[op]).unwrap();
            assert_eq!(codec.decode(artifact.sequences()).unwrap(), expected);
            assert_eq!(artifact.size(), expected.len());
            content = expected;
        }
    }

    #[test]
    fn test_capacity_failure_with_tight_index() {
        let mut model = CodecModel::default();
        model.layout.index = Some(IndexLayout {
            primary_width: 20,
            level_width: 6,
            max_levels: 1,
        });
        let codec = Codec::new(model).unwrap();
        let v1 = text(60);
        let prior = codec.encode(&v1).unwrap();

        let op = ModificationOp::insert(&v1[..30], text(200));
        assert!(matches!(
            codec.apply_edits(prior.sequences(), &[op]),
            Err(CodecError::IndexCapacity(CapacityShortfall::LevelLimit { .. }))
        ));
    }

    #[test]
    fn test_unindexed_layout_cannot_diff() {
        let model = CodecModel {
            layout: SegmentLayout::unindexed(64),
            ..CodecModel::default()
        };
        let codec = Codec::new(model).unwrap();
        let prior = codec.encode(&text(40)).unwrap();
        let op = ModificationOp::insert(b"".to_vec(), b"x".to_vec());
        assert!(matches!(
            codec.apply_edits(prior.sequences(), &[op]),
            Err(CodecError::Configuration(_))
        ));
    }

    #[test]
    fn test_any_sequence_order_decodes() {
        let codec = codec();
        let mut rng = StdRng::seed_from_u64(5);
        let data = text(700);
        let artifact = codec.encode(&data).unwrap();

        let mut reversed = artifact.sequences().to_vec();
        reversed.reverse();
        assert_eq!(codec.decode(&reversed).unwrap(), data);

        let mut shuffled = artifact.into_sequences();
        shuffled.shuffle(&mut rng);
        assert_eq!(codec.decode(&shuffled).unwrap(), data);

        let op = ModificationOp::replace(&data[300..312], data[312..330].to_vec(), b"middle".to_vec());
        let expected = splice(&data, &op);
        let next = codec.apply_edits(&shuffled, &[op]).unwrap();
        let mut shuffled = next.into_sequences();
        shuffled.shuffle(&mut rng);
        assert_eq!(codec.decode(&shuffled).unwrap(), expected);
        shuffled.reverse();
        assert_eq!(codec.decode(&shuffled).unwrap(), expected);
    }

    // ========================================================================
    // Redundancy Tests
    // ========================================================================

    /// Appends chain-marker slots, which decode as data past the index.
    struct TrailingMarkers;

    impl Redundancy for TrailingMarkers {
        fn add_redundancy(&self, matrix: Vec<Segment>) -> Result<Vec<Segment>> {
            Ok(matrix
                .into_iter()
                .map(|mut segment| {
                    segment.extend([Slot::Marker; 4]);
                    segment
                })
                .collect())
        }

        fn remove_redundancy(&self, matrix: Vec<Segment>) -> Result<Vec<Segment>> {
            Ok(matrix
                .into_iter()
                .map(|mut segment| {
                    segment.truncate(segment.len().saturating_sub(4));
                    segment
                })
                .collect())
        }
    }

    #[test]
    fn test_undecodable_redundancy_is_rejected() {
        let codec = codec().with_redundancy(TrailingMarkers);
        assert!(matches!(
            codec.encode(&text(60)),
            Err(CodecError::PairingExhausted(_))
        ));
    }

    #[test]
    fn test_parity_roundtrip_and_detection() {
        let codec = codec().with_redundancy(EvenParity);
        let data = text(90);
        let artifact = codec.encode(&data).unwrap();
        assert!(artifact.sequences().iter().all(|s| s.len() == 141));
        assert_eq!(codec.decode(artifact.sequences()).unwrap(), data);

        let op = ModificationOp::insert(&data[..40], b"++".to_vec());
        let next = codec.apply_edits(artifact.sequences(), &[op]).unwrap();
        let mut expected = data[..40].to_vec();
        expected.extend_from_slice(b"++");
        expected.extend_from_slice(&data[40..]);
        assert_eq!(codec.decode(next.sequences()).unwrap(), expected);

        // The parity symbol is last; changing it breaks at least one lane's parity.
        let mut corrupted = artifact.into_sequences();
        let last = corrupted[0].len() - 1;
        corrupted[0][last] = if corrupted[0][last] == b'A' { b'T' } else { b'A' };
        assert!(matches!(
            codec.decode(&corrupted),
            Err(CodecError::MalformedSequence(_))
        ));
    }

    // ========================================================================
    // Model and File Tests
    // ========================================================================

    #[test]
    fn test_model_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut model = CodecModel::default();
        model.pairing.seed = 7;
        model.layout.payload_length = 96;
        model.save(&path).unwrap();
        assert_eq!(CodecModel::load(&path).unwrap(), model);
        assert_eq!(Codec::new(model.clone()).unwrap().model(), model);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bin");
        let encoded = dir.path().join("v1.dna");
        let output = dir.path().join("out.bin");
        let data = text(500);
        fs::write(&input, &data).unwrap();

        let codec = codec();
        let artifact = codec.encode_file(&input, &encoded).unwrap();
        assert_eq!(io::read_symbol_lines(&encoded).unwrap(), artifact.sequences());
        assert_eq!(codec.decode_file(&encoded, &output).unwrap(), data.len());
        assert_eq!(fs::read(&output).unwrap(), data);
    }

    #[test]
    fn test_failed_version_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let prior = dir.path().join("v1.dna");
        let next = dir.path().join("v2.dna");
        let codec = codec();
        let artifact = codec.encode(&text(80)).unwrap();
        io::write_symbol_lines(&prior, artifact.sequences()).unwrap();

        let op = ModificationOp::insert(b"missing anchor".to_vec(), b"x".to_vec());
        let result = codec.encode_version_file(&prior, &[op], &next);
        assert!(matches!(result, Err(CodecError::AnchorNotFound { op: 0 })));
        assert!(!next.exists());
    }

    // ========================================================================
    // Property Tests
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..400)) {
            let codec = codec();
            let artifact = codec.encode(&data).unwrap();
            prop_assert_eq!(codec.decode(artifact.sequences()).unwrap(), data);
        }

        #[test]
        fn prop_shuffled_roundtrip(
            data in proptest::collection::vec(any::<u8>(), 1..400),
            seed in any::<u64>(),
        ) {
            let codec = codec();
            let mut sequences = codec.encode(&data).unwrap().into_sequences();
            sequences.shuffle(&mut StdRng::seed_from_u64(seed));
            prop_assert_eq!(codec.decode(&sequences).unwrap(), data);
        }

        #[test]
        fn prop_insert_matches_splice(
            len in 40usize..300,
            at in 0usize..1000,
            insert in proptest::collection::vec(any::<u8>(), 0..60),
        ) {
            let codec = codec();
            let v1 = text(len);
            let at = (at % (len - 10)) + 10;
            let prior = codec.encode(&v1).unwrap();
            let op = ModificationOp::insert(&v1[at - 10..at], insert.clone());
            let next = codec.apply_edits(prior.sequences(), &[op]).unwrap();

            let mut expected = v1[..at].to_vec();
            expected.extend_from_slice(&insert);
            expected.extend_from_slice(&v1[at..]);
            prop_assert_eq!(codec.decode(next.sequences()).unwrap(), expected);
        }
    }
}
