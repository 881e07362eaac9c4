// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! # File I/O
//!
//! Reading and writing the two file kinds the codec works with: raw byte
//! files and symbol-line files (one sequence per line).
//!
//! Every write goes through a temporary file in the destination directory
//! that is renamed over the target once complete, so a failed or interrupted
//! write never leaves a partial file behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;

/// Reads a whole file as bytes.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path)?)
}

/// Atomically writes `data` to `path`.
pub fn write_bytes(path: &Path, data: &[u8]) -> Result<()> {
    write_atomic(path, |out| out.write_all(data))
}

/// Reads one symbol sequence per line.
///
/// Blank lines are skipped and a trailing `\r` is removed, so files written
/// on any platform read the same.
///
/// # Examples
///
/// ```rust
/// use dnaver::io::{read_symbol_lines, write_symbol_lines};
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("v1.dna");
/// write_symbol_lines(&path, &[b"ACGT".to_vec(), b"TTGA".to_vec()]).unwrap();
/// assert_eq!(read_symbol_lines(&path).unwrap(), vec![b"ACGT".to_vec(), b"TTGA".to_vec()]);
/// ```
pub fn read_symbol_lines(path: &Path) -> Result<Vec<Vec<u8>>> {
    let raw = fs::read(path)?;
    Ok(raw
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(<[u8]>::to_vec)
        .collect())
}

/// Atomically writes each sequence on its own newline-terminated line.
pub fn write_symbol_lines(path: &Path, sequences: &[Vec<u8>]) -> Result<()> {
    write_atomic(path, |out| {
        for sequence in sequences {
            out.write_all(sequence)?;
            out.write_all(b"\n")?;
        }
        Ok(())
    })
}

fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&fs::File>) -> std::io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file());
        write(&mut out)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
