// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # Yin-Yang Transcoding
//!
//! Two binary segments of equal length (the *upper* and *lower* lanes) are
//! fused into one symbol sequence, one symbol per bit pair. The mapping is
//! context dependent: besides the two bits, each symbol depends on a
//! *support* symbol emitted earlier in the same sequence.
//!
//! ## Rule
//!
//! The rule is configured by two tables over the 4-symbol alphabet
//! (positions `A=0, C=1, G=2, T=3` for the default alphabet):
//!
//! - `base_reference[symbol]` is the *upper* bit a symbol stands for. Exactly
//!   two symbols carry a 1, so each upper bit leaves two candidates.
//! - `code_matrix[support][symbol]` is the *lower* bit a symbol stands for
//!   after a given support symbol. Within each row the two candidates of one
//!   upper bit must carry complementary lower bits, which makes the choice
//!   between them unique and invertible.
//!
//! | Upper | Lower | Emitted |
//! |-------|-------|---------|
//! | `u` | `l` | the candidate `c` with `base_reference[c] == u` and `code_matrix[s][c] == l` |
//!
//! The support symbol at position `i` is the symbol emitted at
//! `i - (support_spacing + 1)`, or the seed `support_symbols[i]` for the first
//! `support_spacing + 1` positions.
//!
//! ## Chain Markers
//!
//! When both lanes carry a chain-marker slot at a position the fixed
//! `marker_symbol` is emitted. Decoding reads a run of four marker symbols as
//! a chain marker only at the next expected chain position of the index
//! layout, which is why [`Transcoder::round_trips`] exists: a pair whose data
//! happens to spell such a run is rejected by the pairer.
//!
//! ```rust
//! use dnaver::segment::slots_from_bits;
//! use dnaver::transcoder::{Transcoder, TranscoderConfig};
//!
//! let transcoder = Transcoder::new(TranscoderConfig::default()).unwrap();
//! let upper = slots_from_bits(&[true, false, true, true]);
//! let lower = slots_from_bits(&[false, false, true, false]);
//! let sequence = transcoder.encode_pair(&upper, &lower).unwrap();
//! assert_eq!(sequence.len(), 4);
//! let (u, l) = transcoder.decode_pair(&sequence, None).unwrap();
//! assert_eq!((u, l), (upper, lower));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::index::{IndexLayout, MARKER_WIDTH};
use crate::screening::Screening;
use crate::segment::{Segment, Slot};

/// Sentinel for bytes outside the alphabet in the lookup table.
const INVALID: u8 = 0xFF;

// ============================================================================
// Configuration
// ============================================================================

/// The transcoding rule and its screening limits.
///
/// Defaults reproduce the canonical yin-yang rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// The four output symbols, by position.
    pub alphabet: String,
    /// Upper bit represented by each symbol.
    pub base_reference: [u8; 4],
    /// Lower bit represented by each symbol, per support symbol.
    pub code_matrix: [[u8; 4]; 4],
    /// Seed support symbols for the first positions of every sequence.
    pub support_symbols: String,
    /// Distance, minus one, between a position and its support symbol.
    pub support_spacing: usize,
    /// Symbol emitted for chain-marker positions.
    pub marker_symbol: char,
    /// Bit-balance acceptance threshold in `(0.5, 1.0)`.
    pub max_ratio: f64,
    /// Biochemical limits for emitted sequences.
    pub screening: Screening,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        TranscoderConfig {
            alphabet: "ACGT".to_string(),
            base_reference: [0, 1, 0, 1],
            code_matrix: [[1, 1, 0, 0], [1, 0, 0, 1], [1, 1, 0, 0], [1, 1, 0, 0]],
            support_symbols: "A".to_string(),
            support_spacing: 0,
            marker_symbol: 'T',
            max_ratio: 0.8,
            screening: Screening::default(),
        }
    }
}

// ============================================================================
// Transcoder
// ============================================================================

/// A validated transcoding rule with precomputed lookup tables.
#[derive(Debug, Clone)]
pub struct Transcoder {
    config: TranscoderConfig,
    /// Alphabet symbols by position.
    symbols: [u8; 4],
    /// ASCII byte to alphabet position, [`INVALID`] elsewhere.
    lookup: [u8; 256],
    /// `[support][upper][lower]` to emitted position.
    encode_table: [[[u8; 2]; 2]; 4],
    /// `[support][symbol]` to `(upper, lower)`.
    decode_table: [[(bool, bool); 4]; 4],
    /// Seed support positions.
    seeds: Vec<u8>,
    /// Position of the marker symbol.
    marker: u8,
}

impl Transcoder {
    /// Validates `config` and builds the lookup tables.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] if the alphabet is not four
    /// distinct ASCII symbols, `base_reference` does not hold exactly two
    /// ones, a `code_matrix` row pairs equal lower bits for one upper bit,
    /// the seed support symbols are too few or foreign, or `max_ratio`
    /// lies outside `(0.5, 1.0)`.
    pub fn new(config: TranscoderConfig) -> Result<Self> {
        let alphabet = config.alphabet.as_bytes();
        if alphabet.len() != 4 || !alphabet.is_ascii() {
            return Err(CodecError::config(format!(
                "alphabet must be four ASCII symbols, got {:?}",
                config.alphabet
            )));
        }
        let symbols = [alphabet[0], alphabet[1], alphabet[2], alphabet[3]];
        let mut lookup = [INVALID; 256];
        for (position, &symbol) in symbols.iter().enumerate() {
            if lookup[symbol as usize] != INVALID {
                return Err(CodecError::config(format!(
                    "alphabet symbol '{}' is repeated",
                    symbol as char
                )));
            }
            lookup[symbol as usize] = position as u8;
        }

        if config.base_reference.iter().any(|&b| b > 1)
            || config.base_reference.iter().filter(|&&b| b == 1).count() != 2
        {
            return Err(CodecError::config(format!(
                "base reference must hold exactly two ones, got {:?}",
                config.base_reference
            )));
        }

        let candidates = |upper: u8| -> [usize; 2] {
            let mut found = [0usize; 2];
            let mut n = 0;
            for (position, &bit) in config.base_reference.iter().enumerate() {
                if bit == upper && n < 2 {
                    found[n] = position;
                    n += 1;
                }
            }
            found
        };
        let by_upper = [candidates(0), candidates(1)];

        for (support, row) in config.code_matrix.iter().enumerate() {
            if row.iter().any(|&b| b > 1) {
                return Err(CodecError::config(format!(
                    "code matrix row {} holds a value other than 0 or 1",
                    support
                )));
            }
            for pair in &by_upper {
                if row[pair[0]] == row[pair[1]] {
                    return Err(CodecError::config(format!(
                        "code matrix row {} maps symbols {} and {} to the same lower bit",
                        support, symbols[pair[0]] as char, symbols[pair[1]] as char
                    )));
                }
            }
        }

        let seeds = config
            .support_symbols
            .bytes()
            .map(|b| match lookup[b as usize] {
                INVALID => Err(CodecError::config(format!(
                    "support symbol '{}' is not in the alphabet",
                    b as char
                ))),
                position => Ok(position),
            })
            .collect::<Result<Vec<u8>>>()?;
        if seeds.len() < config.support_spacing + 1 {
            return Err(CodecError::config(format!(
                "{} support symbols cannot seed a support spacing of {}",
                seeds.len(),
                config.support_spacing
            )));
        }

        let marker = u8::try_from(config.marker_symbol)
            .ok()
            .map(|b| lookup[b as usize])
            .filter(|&p| p != INVALID)
            .ok_or_else(|| {
                CodecError::config(format!(
                    "marker symbol '{}' is not in the alphabet",
                    config.marker_symbol
                ))
            })?;

        if !(config.max_ratio > 0.5 && config.max_ratio < 1.0) {
            return Err(CodecError::config(format!(
                "max ratio must be in (0.5, 1.0), got {}",
                config.max_ratio
            )));
        }
        config.screening.validate()?;

        let mut encode_table = [[[0u8; 2]; 2]; 4];
        let mut decode_table = [[(false, false); 4]; 4];
        for support in 0..4 {
            for upper in 0..2 {
                let [first, second] = by_upper[upper];
                for lower in 0..2 {
                    let chosen = if config.code_matrix[support][first] as usize == lower {
                        first
                    } else {
                        second
                    };
                    encode_table[support][upper][lower] = chosen as u8;
                }
            }
            for symbol in 0..4 {
                decode_table[support][symbol] = (
                    config.base_reference[symbol] == 1,
                    config.code_matrix[support][symbol] == 1,
                );
            }
        }

        Ok(Transcoder {
            config,
            symbols,
            lookup,
            encode_table,
            decode_table,
            seeds,
            marker,
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// The configured screening limits.
    pub fn screening(&self) -> &Screening {
        &self.config.screening
    }

    /// Alphabet position of `symbol`, if it belongs to the alphabet.
    #[inline]
    pub fn position_of(&self, symbol: u8) -> Option<u8> {
        match self.lookup[symbol as usize] {
            INVALID => None,
            position => Some(position),
        }
    }

    fn require_position(&self, symbol: u8) -> Result<u8> {
        self.position_of(symbol).ok_or_else(|| {
            CodecError::malformed(format!(
                "symbol '{}' is not in the alphabet",
                symbol.escape_ascii()
            ))
        })
    }

    /// Support position for sequence position `i` given the positions so far.
    #[inline]
    fn support_at(&self, emitted: &[u8], i: usize) -> usize {
        if i > self.config.support_spacing {
            emitted[i - self.config.support_spacing - 1] as usize
        } else {
            self.seeds[i] as usize
        }
    }

    // ------------------------------------------------------------------------
    // Single Symbols
    // ------------------------------------------------------------------------

    /// Maps one bit pair to a symbol after the given support symbol.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dnaver::transcoder::{Transcoder, TranscoderConfig};
    ///
    /// let t = Transcoder::new(TranscoderConfig::default()).unwrap();
    /// assert_eq!(t.encode_symbol(false, true, b'A').unwrap(), b'A');
    /// assert_eq!(t.encode_symbol(true, false, b'A').unwrap(), b'T');
    /// ```
    pub fn encode_symbol(&self, upper: bool, lower: bool, support: u8) -> Result<u8> {
        let support = self.require_position(support)? as usize;
        let position = self.encode_table[support][upper as usize][lower as usize];
        Ok(self.symbols[position as usize])
    }

    /// Maps a symbol back to its bit pair after the given support symbol.
    pub fn decode_symbol(&self, symbol: u8, support: u8) -> Result<(bool, bool)> {
        let support = self.require_position(support)? as usize;
        let position = self.require_position(symbol)? as usize;
        Ok(self.decode_table[support][position])
    }

    // ------------------------------------------------------------------------
    // Lane Pairs
    // ------------------------------------------------------------------------

    /// Fuses two lanes into one symbol sequence.
    ///
    /// A shorter lane is padded with fill bits, preferring 0, and a fill bit
    /// is rejected if its symbol would exceed the homopolymer limit.
    ///
    /// # Errors
    ///
    /// - [`CodecError::MalformedSequence`] if a chain marker sits on one lane only.
    /// - [`CodecError::PairingExhausted`] if neither fill bit is acceptable.
    pub fn encode_pair(&self, upper: &[Slot], lower: &[Slot]) -> Result<Vec<u8>> {
        let len = upper.len().max(lower.len());
        let mut emitted: Vec<u8> = Vec::with_capacity(len);

        for i in 0..len {
            let support = self.support_at(&emitted, i);
            let position = match (upper.get(i).copied(), lower.get(i).copied()) {
                (Some(Slot::Marker), Some(Slot::Marker)) => self.marker,
                (Some(Slot::Bit(u)), Some(Slot::Bit(l))) => {
                    self.encode_table[support][u as usize][l as usize]
                }
                (Some(Slot::Bit(u)), None) => self.fill(&emitted, support, i, |fill| (u, fill))?,
                (None, Some(Slot::Bit(l))) => self.fill(&emitted, support, i, |fill| (fill, l))?,
                _ => {
                    return Err(CodecError::malformed(format!(
                        "chain marker on one lane only at position {}",
                        i
                    )));
                }
            };
            emitted.push(position);
        }

        Ok(emitted.iter().map(|&p| self.symbols[p as usize]).collect())
    }

    fn fill(
        &self,
        emitted: &[u8],
        support: usize,
        i: usize,
        bits: impl Fn(bool) -> (bool, bool),
    ) -> Result<u8> {
        let limit = self.config.screening.max_homopolymer;
        for fill in [false, true] {
            let (u, l) = bits(fill);
            let position = self.encode_table[support][u as usize][l as usize];
            let run = 1 + emitted.iter().rev().take_while(|&&p| p == position).count();
            if limit.is_none_or(|max| run <= max) {
                return Ok(position);
            }
        }
        Err(CodecError::PairingExhausted(format!(
            "no fill bit keeps position {} within the homopolymer limit",
            i
        )))
    }

    /// Splits a symbol sequence back into its two lanes.
    ///
    /// With a `chain` layout, four marker symbols starting exactly at the next
    /// expected chain position become marker slots on both lanes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedSequence`] if a symbol is outside the
    /// alphabet.
    pub fn decode_pair(
        &self,
        sequence: &[u8],
        chain: Option<&IndexLayout>,
    ) -> Result<(Segment, Segment)> {
        let positions = sequence
            .iter()
            .map(|&s| self.require_position(s))
            .collect::<Result<Vec<u8>>>()?;

        let mut upper = Vec::with_capacity(positions.len());
        let mut lower = Vec::with_capacity(positions.len());
        let mut levels = 0;
        let mut i = 0;
        while i < positions.len() {
            if let Some(layout) = chain {
                if levels < layout.max_levels
                    && i == layout.chain_position(levels)
                    && i + MARKER_WIDTH <= positions.len()
                    && positions[i..i + MARKER_WIDTH].iter().all(|&p| p == self.marker)
                {
                    upper.extend([Slot::Marker; MARKER_WIDTH]);
                    lower.extend([Slot::Marker; MARKER_WIDTH]);
                    levels += 1;
                    i += MARKER_WIDTH;
                    continue;
                }
            }
            let support = self.support_at(&positions, i);
            let (u, l) = self.decode_table[support][positions[i] as usize];
            upper.push(Slot::Bit(u));
            lower.push(Slot::Bit(l));
            i += 1;
        }
        Ok((upper, lower))
    }

    /// Returns `true` if `sequence` decodes back to exactly `upper` and `lower`.
    pub fn round_trips(
        &self,
        sequence: &[u8],
        upper: &[Slot],
        lower: &[Slot],
        chain: Option<&IndexLayout>,
    ) -> bool {
        match self.decode_pair(sequence, chain) {
            Ok((u, l)) => u == upper && l == lower,
            Err(_) => false,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
