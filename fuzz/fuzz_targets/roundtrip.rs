// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Round-trip fuzzing: encode -> decode should produce the original bytes.
//!
//! This is the most important fuzz target as it covers framing, pairing
//! (including false chain markers in arbitrary payloads) and order restoration.

#![no_main]

use dnaver::segment::SegmentLayout;
use dnaver::{Codec, CodecModel};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let codec = Codec::new(CodecModel::default()).expect("default model is valid");

    let artifact = match codec.encode(data) {
        Ok(artifact) => artifact,
        Err(err) => panic!("encoding {} bytes failed: {}", data.len(), err),
    };

    let lengths: Vec<usize> = artifact.sequences().iter().map(Vec::len).collect();
    assert!(
        lengths.windows(2).all(|w| w[0] == w[1]),
        "Sequences differ in length: {:?}",
        lengths
    );

    let decoded = codec
        .decode(artifact.sequences())
        .expect("own output decodes");
    assert_eq!(
        decoded,
        data,
        "Round trip mismatch for {} input bytes",
        data.len()
    );

    // Plain framing must not leave padding bytes behind.
    let plain = Codec::new(CodecModel {
        layout: SegmentLayout::unindexed(8),
        ..CodecModel::default()
    })
    .expect("plain layout is valid");
    let artifact = plain.encode(data).expect("plain encode succeeds");
    assert_eq!(plain.decode(artifact.sequences()).expect("decodes"), data);
});
