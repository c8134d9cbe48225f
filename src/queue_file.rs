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

//! The ring-buffer engine: a crash-safe FIFO byte queue in a single file.
//!
//! Elements are appended at the tail and removed from the head. The file is
//! treated as a circular byte region after the fixed header; elements may
//! straddle the physical end of the file. Every mutating operation writes
//! its data first and commits by rewriting the header in one write, so a
//! crash at any point leaves the previously committed element set intact
//! on reopen.
//!
//! ## Usage
//!
//! ```ignore
//! let mut queue = QueueFileBuilder::new("/path/to/queue").build()?;
//! queue.add(b"hello")?;
//! let head = queue.peek()?;
//! queue.remove()?;
//! ```

use std::fmt;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    error::{QueueError, Result},
    file::BackingFile,
    format::{
        ELEMENT_HEADER_LENGTH, Element, FormatVersion, HEADER_LENGTH, INITIAL_LENGTH, decode_header,
        encode_header,
    },
};

const ZEROES: [u8; 4096] = [0u8; 4096];

/// A crash-safe FIFO queue of byte payloads backed by a single file.
///
/// All methods take `&mut self`; the queue exclusively owns its backing
/// file and assumes one serialized caller. There is no internal locking
/// and no background work.
pub struct QueueFile {
    file: Box<dyn BackingFile>,
    /// Header layout resolved at open. Legacy files stay legacy on write.
    version: FormatVersion,
    header_length: u64,
    /// Total allocated file size as committed in the header. The header
    /// value is authoritative; the physical file may be longer after a
    /// failed growth.
    file_length: u64,
    element_count: usize,
    first: Element,
    last: Element,
    /// Overwrite removed element bytes with zeroes.
    zero: bool,
    /// Fixed-capacity overwrite mode: adding at capacity evicts the head.
    capacity: Option<usize>,
    /// Bumped by every structural mutation; cursors check it per step.
    generation: u64,
}

impl QueueFile {
    /// Open a queue over an arbitrary backing store.
    ///
    /// An empty backing is formatted as a fresh versioned queue. Otherwise
    /// the header is read and validated: an unaddressable stored length is
    /// hard corruption and fails the open; the caller should recreate the
    /// file.
    pub fn from_backing(
        mut file: Box<dyn BackingFile>,
        zero: bool,
        capacity: Option<usize>,
    ) -> Result<Self> {
        let mut physical = file.len()?;

        if physical == 0 {
            file.set_len(INITIAL_LENGTH)?;
            let mut buf = [0u8; HEADER_LENGTH as usize];
            let header = encode_header(FormatVersion::Versioned, INITIAL_LENGTH, 0, 0, 0, &mut buf);
            file.write_at(0, header)?;
            file.sync()?;
            physical = INITIAL_LENGTH;
            debug!("Formatted empty backing as a fresh queue");
        }

        let probe_len = physical.min(HEADER_LENGTH) as usize;
        let mut probe = [0u8; HEADER_LENGTH as usize];
        file.read_at(0, &mut probe[..probe_len])?;
        let raw = decode_header(&probe[..probe_len])?;

        let header_length = raw.version.header_length();
        if raw.file_length < header_length as i64 {
            return Err(QueueError::CorruptHeader {
                length: raw.file_length,
            });
        }
        if raw.file_length as u64 > physical {
            return Err(QueueError::Truncated {
                expected: raw.file_length,
                actual: physical,
            });
        }
        if raw.element_count < 0 {
            return Err(QueueError::Corrupt {
                detail: format!("negative element count ({}) in header", raw.element_count),
            });
        }
        if raw.first_position < 0 || raw.last_position < 0 {
            return Err(QueueError::Corrupt {
                detail: format!(
                    "negative element position ({}, {}) in header",
                    raw.first_position, raw.last_position
                ),
            });
        }

        let file_length = raw.file_length as u64;
        let first_position = raw.first_position as u64;
        let last_position = raw.last_position as u64;
        let element_count = raw.element_count as usize;

        if element_count > 0 {
            for position in [first_position, last_position] {
                if position < header_length || position >= file_length {
                    return Err(QueueError::Corrupt {
                        detail: format!("element position {position} outside the ring region"),
                    });
                }
            }
        }

        let mut queue = Self {
            file,
            version: raw.version,
            header_length,
            file_length,
            element_count,
            first: Element::NULL,
            last: Element::NULL,
            zero,
            capacity,
            generation: 0,
        };

        queue.first = queue.read_element(first_position)?;
        queue.last = queue.read_element(last_position)?;

        debug!(
            versioned = (raw.version == FormatVersion::Versioned),
            file_length,
            element_count,
            "Opened queue file"
        );

        Ok(queue)
    }

    /// Number of elements in the queue. O(1).
    #[must_use]
    pub const fn size(&self) -> usize {
        self.element_count
    }

    /// Whether the queue holds no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    /// Total allocated file size as committed in the header.
    #[must_use]
    pub const fn file_length(&self) -> u64 {
        self.file_length
    }

    /// Append `data` as one element at the tail.
    ///
    /// In fixed-capacity mode the oldest element is evicted first when the
    /// queue is full. Otherwise the file doubles in size until the element
    /// fits. The element is durable once this returns; a failure at any
    /// point leaves the previously committed state on disk.
    pub fn add(&mut self, data: &[u8]) -> Result<()> {
        let Ok(length) = i32::try_from(data.len()) else {
            return Err(QueueError::ElementTooLarge { size: data.len() });
        };

        if let Some(capacity) = self.capacity {
            if self.element_count == capacity && capacity > 0 {
                self.remove()?;
            }
        }

        self.expand_if_necessary(data.len() as u64)?;

        let was_empty = self.is_empty();
        let position = if was_empty {
            self.header_length
        } else {
            self.wrap_position(self.last.position + self.last.disk_size())
        };
        let new_last = Element::new(position, data.len() as u32);

        self.ring_write(position, &length.to_be_bytes())?;
        self.ring_write(position + ELEMENT_HEADER_LENGTH, data)?;
        self.file.sync()?;

        let first_position = if was_empty {
            position
        } else {
            self.first.position
        };
        self.write_header(
            self.file_length,
            self.element_count + 1,
            first_position,
            position,
        )?;

        self.last = new_last;
        if was_empty {
            self.first = new_last;
        }
        self.element_count += 1;
        self.generation += 1;
        Ok(())
    }

    /// Read the head element's payload without removing it.
    pub fn peek(&mut self) -> Result<Option<Bytes>> {
        if self.is_empty() {
            return Ok(None);
        }
        let mut data = vec![0u8; self.first.length as usize];
        self.ring_read(self.first.position + ELEMENT_HEADER_LENGTH, &mut data)?;
        Ok(Some(Bytes::from(data)))
    }

    /// Read up to `max` elements from the head in FIFO order.
    ///
    /// Returns all elements when `max` exceeds the queue size.
    pub fn peek_n(&mut self, max: usize) -> Result<Vec<Bytes>> {
        let n = max.min(self.element_count);
        let mut out = Vec::with_capacity(n);
        let mut position = self.first.position;
        for _ in 0..n {
            let element = self.read_element(position)?;
            let mut data = vec![0u8; element.length as usize];
            self.ring_read(element.position + ELEMENT_HEADER_LENGTH, &mut data)?;
            out.push(Bytes::from(data));
            position = self.wrap_position(element.position + element.disk_size());
        }
        Ok(out)
    }

    /// Remove the head element.
    pub fn remove(&mut self) -> Result<()> {
        self.remove_n(1)
    }

    /// Remove `n` elements from the head.
    ///
    /// Removing zero elements is a no-op, even on an empty queue. Removing
    /// from an empty queue or removing more elements than present is an
    /// error and leaves the queue untouched.
    pub fn remove_n(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        if self.is_empty() {
            return Err(QueueError::NoSuchElement);
        }
        if n == self.element_count {
            return self.clear();
        }
        if n > self.element_count {
            return Err(QueueError::RemoveTooMany {
                requested: n,
                count: self.element_count,
            });
        }

        let erase_start = self.first.position;
        let mut erase_total = 0u64;

        // Walk to the new head, reading each element header along the way.
        let mut position = self.first.position;
        let mut current = self.first;
        for _ in 0..n {
            erase_total += current.disk_size();
            position = self.wrap_position(position + current.disk_size());
            current = self.read_element(position)?;
        }

        // Commit before erasing: the vacated bytes are dead once the header
        // lands, and still live if it never does.
        self.write_header(
            self.file_length,
            self.element_count - n,
            current.position,
            self.last.position,
        )?;
        self.element_count -= n;
        self.first = current;
        self.generation += 1;

        if self.zero {
            self.ring_erase(erase_start, erase_total)?;
        }
        Ok(())
    }

    /// Reset the queue to empty and shrink the file back to its initial
    /// size. The header write is the commit point; interrupting the rest
    /// cannot corrupt the file.
    pub fn clear(&mut self) -> Result<()> {
        self.write_header(INITIAL_LENGTH, 0, 0, 0)?;

        if self.zero {
            let span = (INITIAL_LENGTH - self.header_length) as usize;
            self.file.write_at(self.header_length, &ZEROES[..span])?;
        }

        self.element_count = 0;
        self.first = Element::NULL;
        self.last = Element::NULL;
        if self.file_length > INITIAL_LENGTH {
            self.set_len(INITIAL_LENGTH)?;
        }
        self.file_length = INITIAL_LENGTH;
        self.generation += 1;
        Ok(())
    }

    /// Flush all buffered state to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()?;
        Ok(())
    }

    /// Create a detached cursor positioned at the head.
    ///
    /// The cursor is invalidated by any later `add`/`remove`/`clear`; a
    /// stale cursor reports [`QueueError::ConcurrentModification`] instead
    /// of reading through moved positions.
    #[must_use]
    pub const fn cursor(&self) -> ElementCursor {
        ElementCursor {
            next_index: 0,
            next_position: self.first.position,
            generation: self.generation,
        }
    }

    /// Borrowing iterator over element payloads, head to tail.
    pub fn iter(&mut self) -> Iter<'_> {
        Iter {
            cursor: self.cursor(),
            queue: self,
        }
    }

    /// Read the element header at `position`. Position 0 is the empty
    /// sentinel, not an element.
    fn read_element(&mut self, position: u64) -> Result<Element> {
        if position == 0 {
            return Ok(Element::NULL);
        }
        let mut buf = [0u8; ELEMENT_HEADER_LENGTH as usize];
        self.ring_read(position, &mut buf)?;
        let length = i32::from_be_bytes(buf);
        if length < 0 || ELEMENT_HEADER_LENGTH + length as u64 > self.file_length - self.header_length
        {
            return Err(QueueError::Corrupt {
                detail: format!("element length {length} at position {position} is invalid"),
            });
        }
        Ok(Element::new(position, length as u32))
    }

    /// Map a logical ring offset into the physical file.
    const fn wrap_position(&self, position: u64) -> u64 {
        if position < self.file_length {
            position
        } else {
            self.header_length + position - self.file_length
        }
    }

    /// Bytes consumed by the header plus all live elements.
    const fn used_bytes(&self) -> u64 {
        if self.element_count == 0 {
            return self.header_length;
        }
        if self.last.position >= self.first.position {
            // Contiguous: [first .. last+last.size), plus the header.
            (self.last.position - self.first.position) + self.last.disk_size() + self.header_length
        } else {
            // Wrapped: tail segment at the front, head segment to EOF.
            self.last.position + self.last.disk_size() + self.file_length - self.first.position
        }
    }

    const fn remaining_bytes(&self) -> u64 {
        self.file_length - self.used_bytes()
    }

    /// Double the file until `data_length` more bytes fit, relocating the
    /// wrapped portion of the ring so it stays logically contiguous.
    ///
    /// The header write is the commit point: a failure before it leaves the
    /// pre-growth header authoritative on reopen, even though the physical
    /// file may already be longer.
    fn expand_if_necessary(&mut self, data_length: u64) -> Result<()> {
        let element_length = ELEMENT_HEADER_LENGTH + data_length;
        let mut remaining = self.remaining_bytes();
        if remaining >= element_length {
            return Ok(());
        }

        let mut previous = self.file_length;
        let mut new_length = previous;
        while remaining < element_length {
            remaining += previous;
            new_length = previous << 1;
            previous = new_length;
        }

        debug!(
            old_length = self.file_length,
            new_length, "Growing queue file"
        );
        self.set_len(new_length)?;

        // If the ring wraps past the old EOF, move the wrapped prefix into
        // the newly appended region so the data stays contiguous.
        let end_of_last = self.wrap_position(self.last.position + self.last.disk_size());
        let mut moved = 0u64;
        if end_of_last <= self.first.position {
            moved = end_of_last - self.header_length;
            self.copy_region(self.header_length, self.file_length, moved)?;
            self.file.sync()?;
        }

        if self.last.position < self.first.position {
            let new_last_position = self.file_length + self.last.position - self.header_length;
            self.write_header(
                new_length,
                self.element_count,
                self.first.position,
                new_last_position,
            )?;
            self.last = Element::new(new_last_position, self.last.length);
        } else {
            self.write_header(
                new_length,
                self.element_count,
                self.first.position,
                self.last.position,
            )?;
        }

        self.file_length = new_length;

        if self.zero {
            self.ring_erase(self.header_length, moved)?;
        }
        Ok(())
    }

    /// Commit the given header fields in a single write, then fsync.
    fn write_header(
        &mut self,
        file_length: u64,
        element_count: usize,
        first_position: u64,
        last_position: u64,
    ) -> Result<()> {
        let mut buf = [0u8; HEADER_LENGTH as usize];
        let header = encode_header(
            self.version,
            file_length,
            element_count,
            first_position,
            last_position,
            &mut buf,
        );
        self.file.write_at(0, header)?;
        self.file.sync()?;
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.file.sync()?;
        Ok(())
    }

    /// Copy `count` bytes from `src` to `dst`. Both regions are physically
    /// contiguous; only growth relocation uses this.
    fn copy_region(&mut self, src: u64, dst: u64, count: u64) -> Result<()> {
        let mut buf = [0u8; 4096];
        let mut copied = 0u64;
        while copied < count {
            let chunk = (count - copied).min(buf.len() as u64) as usize;
            self.file.read_at(src + copied, &mut buf[..chunk])?;
            self.file.write_at(dst + copied, &buf[..chunk])?;
            copied += chunk as u64;
        }
        Ok(())
    }

    /// Read `buf.len()` bytes starting at logical `position`, splitting
    /// across the wrap boundary when needed.
    fn ring_read(&mut self, position: u64, buf: &mut [u8]) -> Result<()> {
        let position = self.wrap_position(position);
        if position + buf.len() as u64 <= self.file_length {
            self.file.read_at(position, buf)?;
        } else {
            let before_eof = (self.file_length - position) as usize;
            self.file.read_at(position, &mut buf[..before_eof])?;
            self.file
                .read_at(self.header_length, &mut buf[before_eof..])?;
        }
        Ok(())
    }

    /// Write `data` starting at logical `position`, splitting across the
    /// wrap boundary when needed.
    fn ring_write(&mut self, position: u64, data: &[u8]) -> Result<()> {
        let position = self.wrap_position(position);
        if position + data.len() as u64 <= self.file_length {
            self.file.write_at(position, data)?;
        } else {
            let before_eof = (self.file_length - position) as usize;
            self.file.write_at(position, &data[..before_eof])?;
            self.file.write_at(self.header_length, &data[before_eof..])?;
        }
        Ok(())
    }

    /// Overwrite `length` ring bytes starting at `position` with zeroes.
    fn ring_erase(&mut self, position: u64, length: u64) -> Result<()> {
        let mut position = position;
        let mut remaining = length;
        while remaining > 0 {
            let chunk = remaining.min(ZEROES.len() as u64);
            self.ring_write(position, &ZEROES[..chunk as usize])?;
            position += chunk;
            remaining -= chunk;
        }
        Ok(())
    }
}

impl fmt::Debug for QueueFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueFile")
            .field("zero", &self.zero)
            .field("length", &self.file_length)
            .field("size", &self.element_count)
            .field("first", &self.first)
            .field("last", &self.last)
            .finish()
    }
}

/// A detached read cursor over a [`QueueFile`].
///
/// The cursor does not borrow the queue; each step takes the queue by
/// `&mut` reference and checks the generation counter captured at creation.
/// Structural mutation of the queue behind the cursor's back turns every
/// later step into [`QueueError::ConcurrentModification`].
#[derive(Debug, Clone)]
pub struct ElementCursor {
    next_index: usize,
    next_position: u64,
    generation: u64,
}

impl ElementCursor {
    /// Whether another element is available.
    pub fn has_next(&self, queue: &QueueFile) -> Result<bool> {
        self.check(queue)?;
        Ok(self.next_index != queue.element_count)
    }

    /// Read the next element's payload, head to tail.
    ///
    /// Returns `Ok(None)` when the queue is exhausted. A structurally
    /// invalid element header ends iteration instead of failing: the
    /// readable prefix is served, the garbage after it is not.
    pub fn next(&mut self, queue: &mut QueueFile) -> Result<Option<Bytes>> {
        self.check(queue)?;
        if self.next_index >= queue.element_count {
            return Ok(None);
        }

        let element = match queue.read_element(self.next_position) {
            Ok(element) => element,
            Err(QueueError::Corrupt { detail }) => {
                warn!(
                    position = self.next_position,
                    detail = %detail,
                    "Stopping iteration at inconsistent element"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut data = vec![0u8; element.length as usize];
        queue.ring_read(element.position + ELEMENT_HEADER_LENGTH, &mut data)?;

        self.next_position = queue.wrap_position(element.position + element.disk_size());
        self.next_index += 1;
        Ok(Some(Bytes::from(data)))
    }

    /// Remove the element returned by the most recent [`next`](Self::next).
    ///
    /// Only legal while that element is still the queue head; anywhere else
    /// fails with [`QueueError::RemovalNotPermitted`]. On success the
    /// cursor re-arms against the queue's new generation.
    pub fn remove(&mut self, queue: &mut QueueFile) -> Result<()> {
        self.check(queue)?;
        if queue.is_empty() {
            return Err(QueueError::NoSuchElement);
        }
        if self.next_index != 1 {
            return Err(QueueError::RemovalNotPermitted);
        }
        queue.remove()?;
        self.generation = queue.generation;
        self.next_index -= 1;
        Ok(())
    }

    fn check(&self, queue: &QueueFile) -> Result<()> {
        if self.generation == queue.generation {
            Ok(())
        } else {
            Err(QueueError::ConcurrentModification)
        }
    }
}

/// Borrowing iterator over element payloads.
///
/// Holds the queue's `&mut` borrow for its lifetime, so invalidation is
/// statically impossible; interleaved mutation needs [`ElementCursor`].
pub struct Iter<'a> {
    cursor: ElementCursor,
    queue: &'a mut QueueFile,
}

impl Iterator for Iter<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next(self.queue).transpose()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::QueueFileBuilder;

    fn open(dir: &std::path::Path) -> QueueFile {
        QueueFileBuilder::new(dir.join("queue-file")).build().unwrap()
    }

    #[test]
    fn test_empty_queue_accounting() {
        let dir = tempdir().unwrap();
        let queue = open(dir.path());

        assert!(queue.is_empty());
        assert_eq!(queue.size(), 0);
        assert_eq!(queue.used_bytes(), HEADER_LENGTH);
        assert_eq!(queue.remaining_bytes(), INITIAL_LENGTH - HEADER_LENGTH);
    }

    #[test]
    fn test_wrap_position_maps_past_eof() {
        let dir = tempdir().unwrap();
        let queue = open(dir.path());

        assert_eq!(queue.wrap_position(100), 100);
        assert_eq!(queue.wrap_position(INITIAL_LENGTH), HEADER_LENGTH);
        assert_eq!(queue.wrap_position(INITIAL_LENGTH + 10), HEADER_LENGTH + 10);
    }

    #[test]
    fn test_used_bytes_tracks_adds() {
        let dir = tempdir().unwrap();
        let mut queue = open(dir.path());

        queue.add(&[1, 2, 3]).unwrap();
        assert_eq!(queue.used_bytes(), HEADER_LENGTH + 4 + 3);

        queue.add(&[4, 5]).unwrap();
        assert_eq!(queue.used_bytes(), HEADER_LENGTH + (4 + 3) + (4 + 2));
    }

    #[test]
    fn test_zero_length_element_is_legal() {
        let dir = tempdir().unwrap();
        let mut queue = open(dir.path());

        queue.add(&[]).unwrap();
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.peek().unwrap().unwrap().len(), 0);
        queue.remove().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_debug_format_names_structure() {
        let dir = tempdir().unwrap();
        let mut queue = open(dir.path());
        for i in 0..15u8 {
            queue.add(&vec![0u8; i as usize]).unwrap();
        }

        let repr = format!("{queue:?}");
        assert!(repr.contains("zero: true"));
        assert!(repr.contains("length: 4096"));
        assert!(repr.contains("size: 15"));
        assert!(repr.contains("position: 32, length: 0"));
    }
}
