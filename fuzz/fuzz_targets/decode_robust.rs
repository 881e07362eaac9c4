// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Decode robustness fuzzing.
//!
//! Feeds arbitrary symbol lines to the decoder. Malformed input must come back
//! as an error, never a panic.

#![no_main]

use dnaver::segment::SegmentLayout;
use dnaver::{Codec, CodecModel};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Map bytes onto the alphabet most of the time so decoding gets past the
    // symbol check; keep a few raw bytes to exercise that path too.
    let symbols: Vec<u8> = data
        .iter()
        .map(|&b| if b < 0xF0 { b"ACGT"[(b % 4) as usize] } else { b })
        .collect();
    let sequences: Vec<Vec<u8>> = symbols.split(|&b| b == 0xFF).map(<[u8]>::to_vec).collect();

    let indexed = Codec::new(CodecModel::default()).expect("default model is valid");
    let _ = indexed.decode(&sequences);

    // Fixed-length lines that pass the length check reach index parsing.
    let fixed: Vec<Vec<u8>> = symbols
        .chunks_exact(140)
        .map(<[u8]>::to_vec)
        .collect();
    let _ = indexed.decode(&fixed);

    let plain = Codec::new(CodecModel {
        layout: SegmentLayout::unindexed(8),
        ..CodecModel::default()
    })
    .expect("unindexed model is valid");
    let lines: Vec<Vec<u8>> = symbols.chunks(8).map(<[u8]>::to_vec).collect();
    let _ = plain.decode(&lines);
});
