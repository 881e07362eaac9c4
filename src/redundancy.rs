// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # Redundancy Hook
//!
//! An optional transform applied to the paired segment matrix just before
//! transcoding, and undone right after decoding. Implementations may change
//! segment lengths, but they must do so uniformly and only *after* the
//! existing slots, so that chain markers keep their positions.
//!
//! [`EvenParity`] is a minimal implementation: one parity bit per segment,
//! which detects (but cannot correct) a single flipped bit.

use crate::error::{CodecError, Result};
use crate::segment::{Segment, Slot};

/// A reversible matrix transform around the transcoder.
pub trait Redundancy {
    /// Adds redundancy to every segment.
    fn add_redundancy(&self, matrix: Vec<Segment>) -> Result<Vec<Segment>>;

    /// Verifies and strips redundancy.
    fn remove_redundancy(&self, matrix: Vec<Segment>) -> Result<Vec<Segment>>;
}

/// Appends an even-parity bit computed over the bit slots of each segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvenParity;

fn parity(slots: &[Slot]) -> bool {
    slots
        .iter()
        .filter_map(|s| s.bit())
        .fold(false, |acc, b| acc ^ b)
}

impl Redundancy for EvenParity {
    fn add_redundancy(&self, matrix: Vec<Segment>) -> Result<Vec<Segment>> {
        Ok(matrix
            .into_iter()
            .map(|mut segment| {
                let bit = parity(&segment);
                segment.push(Slot::Bit(bit));
                segment
            })
            .collect())
    }

    fn remove_redundancy(&self, matrix: Vec<Segment>) -> Result<Vec<Segment>> {
        matrix
            .into_iter()
            .enumerate()
            .map(|(row, mut segment)| match segment.pop() {
                Some(Slot::Bit(stored)) if stored == parity(&segment) => Ok(segment),
                _ => Err(CodecError::malformed(format!(
                    "parity check failed for segment {}",
                    row
                ))),
            })
            .collect()
    }
}
