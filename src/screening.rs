// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # Sequence Screening
//!
//! Biochemical constraints on emitted symbol sequences. The pairer consults a
//! [`SequenceValidator`] when choosing partners; anything implementing the
//! trait can be plugged in, including plain closures.
//!
//! [`Screening`] is the built-in validator. It checks
//!
//! - the longest homopolymer run (a run of one repeated symbol), and
//! - the GC content, which must lie in `[1 - max_gc_content, max_gc_content]`.
//!
//! A free-energy threshold can be carried in the configuration so that it is
//! persisted with the model, but no folding model evaluates it here.
//!
//! ```rust
//! use dnaver::screening::{Screening, SequenceValidator};
//!
//! let screening = Screening {
//!     max_homopolymer: Some(3),
//!     max_gc_content: 0.6,
//!     min_free_energy: None,
//! };
//! assert!(screening.is_valid(b"ACGTAGCT"));
//! assert!(!screening.is_valid(b"AAAAGCGC"));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Acceptance test applied to candidate symbol sequences.
pub trait SequenceValidator {
    /// Returns `true` if `sequence` may be emitted.
    fn is_valid(&self, sequence: &[u8]) -> bool;
}

impl<F> SequenceValidator for F
where
    F: Fn(&[u8]) -> bool,
{
    fn is_valid(&self, sequence: &[u8]) -> bool {
        self(sequence)
    }
}

/// Homopolymer and GC-content limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screening {
    /// Longest permitted run of one symbol; `None` disables the check.
    pub max_homopolymer: Option<usize>,
    /// Upper GC-content bound in `[0.5, 1.0]`; the lower bound is its complement.
    pub max_gc_content: f64,
    /// Minimum free energy threshold, persisted but not evaluated.
    pub min_free_energy: Option<f64>,
}

impl Default for Screening {
    fn default() -> Self {
        Screening {
            max_homopolymer: None,
            max_gc_content: 1.0,
            min_free_energy: None,
        }
    }
}

impl Screening {
    /// Checks the limits themselves.
    pub fn validate(&self) -> Result<()> {
        if !(0.5..=1.0).contains(&self.max_gc_content) {
            return Err(CodecError::config(format!(
                "max GC content must be in [0.5, 1.0], got {}",
                self.max_gc_content
            )));
        }
        if self.max_homopolymer == Some(0) {
            return Err(CodecError::config("max homopolymer run must be positive"));
        }
        Ok(())
    }
}

impl SequenceValidator for Screening {
    fn is_valid(&self, sequence: &[u8]) -> bool {
        if let Some(limit) = self.max_homopolymer {
            if longest_run(sequence) > limit {
                return false;
            }
        }
        if self.max_gc_content < 1.0 && !sequence.is_empty() {
            let gc = gc_fraction(sequence);
            if gc > self.max_gc_content || gc < 1.0 - self.max_gc_content {
                return false;
            }
        }
        true
    }
}

/// Length of the longest run of a repeated symbol.
pub fn longest_run(sequence: &[u8]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for &symbol in sequence {
        if Some(symbol) == previous {
            current += 1;
        } else {
            current = 1;
            previous = Some(symbol);
        }
        longest = longest.max(current);
    }
    longest
}

/// Fraction of `G`/`C` symbols (case-insensitive).
pub fn gc_fraction(sequence: &[u8]) -> f64 {
    if sequence.is_empty() {
        return 0.0;
    }
    let gc = sequence
        .iter()
        .filter(|&&b| matches!(b, b'G' | b'g' | b'C' | b'c'))
        .count();
    gc as f64 / sequence.len() as f64
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_run() {
        assert_eq!(longest_run(b""), 0);
        assert_eq!(longest_run(b"A"), 1);
        assert_eq!(longest_run(b"ACCCGTT"), 3);
    }

    #[test]
    fn test_gc_fraction() {
        assert_eq!(gc_fraction(b"GCAT"), 0.5);
        assert_eq!(gc_fraction(b"gggg"), 1.0);
    }

    #[test]
    fn test_default_accepts_everything() {
        let screening = Screening::default();
        assert!(screening.is_valid(b"AAAAAAAAAAAA"));
        assert!(screening.is_valid(b"GGGGCCCC"));
    }

    #[test]
    fn test_gc_bounds() {
        let screening = Screening {
            max_gc_content: 0.6,
            ..Screening::default()
        };
        assert!(screening.is_valid(b"ACGT"));
        assert!(!screening.is_valid(b"GCGT"));
        assert!(!screening.is_valid(b"ATAT"));
    }

    #[test]
    fn test_validation() {
        assert!(Screening::default().validate().is_ok());
        let bad = Screening {
            max_gc_content: 0.3,
            ..Screening::default()
        };
        assert!(bad.validate().is_err());
        let zero = Screening {
            max_homopolymer: Some(0),
            ..Screening::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_closure_validator() {
        let no_t = |seq: &[u8]| !seq.contains(&b'T');
        assert!(no_t.is_valid(b"ACG"));
        assert!(!no_t.is_valid(b"ACGT"));
    }
}
