// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # dnaver
//!
//! A yin-yang style DNA storage codec with hierarchical segment indices and
//! incremental (version-to-version) encoding.
//!
//! ## Features
//!
//! - **Rule-driven transcoding** of two binary segments into one symbol
//!   sequence, with a configurable alphabet and support rule
//! - **Sequence screening** for homopolymer runs and GC content, pluggable via
//!   [`screening::SequenceValidator`]
//! - **Hierarchical indices** with chain markers, so segments can be added
//!   between existing ones without renumbering
//! - **Incremental encoding**: insert, delete and replace edits touch only the
//!   segments around each edit
//! - **Optional redundancy** around the transcoder ([`redundancy::EvenParity`])
//! - **JSON model persistence** and atomic file output
//!
//! ## Quick Start
//!
//! ```rust
//! use dnaver::{Codec, CodecModel};
//!
//! let codec = Codec::new(CodecModel::default()).unwrap();
//! let artifact = codec.encode(b"hello, archive").unwrap();
//! for sequence in artifact.sequences() {
//!     assert!(sequence.iter().all(|s| b"ACGT".contains(s)));
//! }
//! assert_eq!(codec.decode(artifact.sequences()).unwrap(), b"hello, archive");
//! ```
//!
//! ## Versions
//!
//! ```rust
//! use dnaver::{Codec, CodecModel, ModificationOp};
//!
//! let codec = Codec::new(CodecModel::default()).unwrap();
//! let v1 = codec.encode(b"chapter one. chapter two.").unwrap();
//! let v2 = codec
//!     .apply_edits(v1.sequences(), &[ModificationOp::insert(b"one.".to_vec(), b" interlude.".to_vec())])
//!     .unwrap();
//! assert_eq!(
//!     codec.decode(v2.sequences()).unwrap(),
//!     b"chapter one. interlude. chapter two."
//! );
//! ```
//!
//! ## Segment Layout
//!
//! With the default layout every segment is 140 slots: a 20-bit primary
//! index followed by a 120-bit payload. Each chain level adds a 4-slot marker
//! and a 10-bit value and takes the same 14 slots from the payload, so all
//! segments of a version stay the same length.
//!
//! ```text
//! depth 0: [ primary:20 | payload:120                         ]
//! depth 1: [ primary:20 | TTTT | value:10 | payload:106        ]
//! depth 2: [ primary:20 | TTTT | value:10 | TTTT | value:10 | payload:92 ]
//! ```
//!
//! See the [`codec`], [`diff`], [`transcoder`] and [`index`] modules for the
//! complete API.

pub mod codec;
pub mod diff;
pub mod error;
pub mod index;
pub mod io;
pub mod order;
pub mod pairing;
pub mod redundancy;
pub mod screening;
pub mod segment;
pub mod transcoder;

pub use codec::{Codec, CodecModel, VersionArtifact};
pub use diff::{EditKind, ModificationOp};
pub use error::{CapacityShortfall, CodecError, Result};
