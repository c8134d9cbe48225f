// Copyright 2026 Spool Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! On-disk format definitions.
//!
//! A queue is one file: a fixed header followed by a circular ring region
//! holding length-prefixed elements. All integers are big-endian.
//!
//! Versioned header (32 bytes, top bit of the first word set):
//!
//! ```text
//! ┌────────────┬──────────────┬──────────────┬───────────────┬──────────────┐
//! │ flags (4B) │ fileLen (8B) │ elemCnt (4B) │ firstPos (8B) │ lastPos (8B) │
//! └────────────┴──────────────┴──────────────┴───────────────┴──────────────┘
//! ```
//!
//! Legacy header (16 bytes, top bit clear; read and written for files that
//! predate the versioned layout):
//!
//! ```text
//! ┌──────────────┬──────────────┬───────────────┬──────────────┐
//! │ fileLen (4B) │ elemCnt (4B) │ firstPos (4B) │ lastPos (4B) │
//! └──────────────┴──────────────┴───────────────┴──────────────┘
//! ```
//!
//! Each element is a 4-byte big-endian length prefix followed by that many
//! payload bytes, wrapping past the physical end of the file back to just
//! after the header when necessary.

use crate::error::{QueueError, Result};

/// Initial (and minimum) physical file size in bytes.
pub const INITIAL_LENGTH: u64 = 4096;

/// Versioned header length in bytes.
pub const HEADER_LENGTH: u64 = 32;

/// Legacy (pre-versioned) header length in bytes.
pub const LEGACY_HEADER_LENGTH: u64 = 16;

/// Length of an element's length prefix in bytes.
pub const ELEMENT_HEADER_LENGTH: u64 = 4;

/// First header word of the versioned layout. The top bit distinguishes it
/// from a legacy header, whose leading file length is always positive.
pub const VERSIONED_FLAG: u32 = 0x8000_0001;

/// Header layout resolved once at open; operations never re-branch on the
/// raw flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    Versioned,
    Legacy,
}

impl FormatVersion {
    /// Header length for this layout.
    #[must_use]
    pub const fn header_length(self) -> u64 {
        match self {
            Self::Versioned => HEADER_LENGTH,
            Self::Legacy => LEGACY_HEADER_LENGTH,
        }
    }
}

/// One element's location in the ring region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    /// Byte offset of the element's length prefix.
    pub position: u64,
    /// Payload length in bytes. Zero-length payloads are legal.
    pub length: u32,
}

impl Element {
    /// Sentinel for the empty queue: position 0 never addresses a real
    /// element (the header lives there).
    pub const NULL: Self = Self {
        position: 0,
        length: 0,
    };

    #[must_use]
    pub const fn new(position: u64, length: u32) -> Self {
        Self { position, length }
    }

    /// Total on-disk size of this element (prefix plus payload).
    #[must_use]
    pub const fn disk_size(self) -> u64 {
        ELEMENT_HEADER_LENGTH + self.length as u64
    }
}

/// Header fields as stored, before validation. Signed so corrupt values
/// survive decoding and can be named in errors.
#[derive(Debug, Clone, Copy)]
pub struct RawHeader {
    pub version: FormatVersion,
    pub file_length: i64,
    pub element_count: i32,
    pub first_position: i64,
    pub last_position: i64,
}

/// Decode a header from the start of the file.
///
/// `buf` holds the leading bytes of the file; the layout is chosen by the
/// top bit of the first word. Fails if the buffer cannot hold the resolved
/// layout.
pub fn decode_header(buf: &[u8]) -> Result<RawHeader> {
    if buf.len() < LEGACY_HEADER_LENGTH as usize {
        return Err(QueueError::Corrupt {
            detail: format!("header too short ({} bytes)", buf.len()),
        });
    }

    let versioned = buf[0] & 0x80 != 0;
    if versioned {
        if buf.len() < HEADER_LENGTH as usize {
            return Err(QueueError::Corrupt {
                detail: format!("versioned header too short ({} bytes)", buf.len()),
            });
        }
        Ok(RawHeader {
            version: FormatVersion::Versioned,
            file_length: read_i64(buf, 4),
            element_count: read_i32(buf, 12),
            first_position: read_i64(buf, 16),
            last_position: read_i64(buf, 24),
        })
    } else {
        Ok(RawHeader {
            version: FormatVersion::Legacy,
            file_length: i64::from(read_i32(buf, 0)),
            element_count: read_i32(buf, 4),
            first_position: i64::from(read_i32(buf, 8)),
            last_position: i64::from(read_i32(buf, 12)),
        })
    }
}

/// Encode a header into `buf`, returning the slice to write at offset 0.
///
/// The caller commits this with a single write; that write is the atomic
/// commit point for every mutating operation.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn encode_header(
    version: FormatVersion,
    file_length: u64,
    element_count: usize,
    first_position: u64,
    last_position: u64,
    buf: &mut [u8; HEADER_LENGTH as usize],
) -> &[u8] {
    match version {
        FormatVersion::Versioned => {
            buf[0..4].copy_from_slice(&VERSIONED_FLAG.to_be_bytes());
            buf[4..12].copy_from_slice(&(file_length as i64).to_be_bytes());
            buf[12..16].copy_from_slice(&(element_count as i32).to_be_bytes());
            buf[16..24].copy_from_slice(&(first_position as i64).to_be_bytes());
            buf[24..32].copy_from_slice(&(last_position as i64).to_be_bytes());
            &buf[..HEADER_LENGTH as usize]
        }
        FormatVersion::Legacy => {
            buf[0..4].copy_from_slice(&(file_length as i32).to_be_bytes());
            buf[4..8].copy_from_slice(&(element_count as i32).to_be_bytes());
            buf[8..12].copy_from_slice(&(first_position as i32).to_be_bytes());
            buf[12..16].copy_from_slice(&(last_position as i32).to_be_bytes());
            &buf[..LEGACY_HEADER_LENGTH as usize]
        }
    }
}

fn read_i32(buf: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    i32::from_be_bytes(bytes)
}

fn read_i64(buf: &[u8], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    i64::from_be_bytes(bytes)
}
