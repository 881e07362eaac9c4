// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Incremental encoding fuzzing.
//!
//! An empty insert anywhere must leave the decoded content unchanged, and a
//! real insert must decode to the spliced file.

#![no_main]

use dnaver::{Codec, CodecModel, ModificationOp};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let codec = Codec::new(CodecModel::default()).expect("default model is valid");
    let at = (data[0] as usize * 256 + data[1] as usize) % (data.len() - 2) + 2;
    let file = &data[2..];
    let cut = at - 2;

    let prior = codec.encode(file).expect("encode succeeds");

    // Anchors are searched from the start, so use the prefix itself.
    let noop = ModificationOp::insert(file[..cut].to_vec(), Vec::<u8>::new());
    let same = codec
        .apply_edits(prior.sequences(), &[noop])
        .expect("no-op edit succeeds");
    assert_eq!(codec.decode(same.sequences()).expect("decodes"), file);

    let insert = ModificationOp::insert(file[..cut].to_vec(), b"fuzz".to_vec());
    if let Ok(next) = codec.apply_edits(prior.sequences(), &[insert]) {
        let decoded = codec.decode(next.sequences()).expect("decodes");
        let expected_len = file.len() + 4;
        assert_eq!(decoded.len(), expected_len);
        assert_eq!(&decoded[..cut], &file[..cut]);
    }
});
