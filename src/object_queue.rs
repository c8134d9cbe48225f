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

//! Typed queue layer.
//!
//! [`ObjectQueue`] presents a [`QueueFile`](crate::QueueFile) as a queue of
//! typed values through a caller-supplied [`Converter`]. It keeps no state
//! of its own: every operation delegates to the byte queue, serializing on
//! the way in and deserializing on the way out. Converter failures surface
//! per element and never skip data silently.

use std::marker::PhantomData;

use crate::{
    QueueFile, Result,
    error::QueueError,
    queue_file::ElementCursor,
};

/// Serialization boundary between typed values and stored bytes.
///
/// Supplied fresh at every open; nothing about the converter is persisted.
/// Both directions may fail, and failures propagate to the caller as
/// [`QueueError::Serialization`].
pub trait Converter<T> {
    /// Encode `value` into the bytes stored on disk.
    fn serialize(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode a stored payload back into a value.
    fn deserialize(&self, bytes: &[u8]) -> Result<T>;
}

/// A FIFO queue of typed values over a [`QueueFile`].
pub struct ObjectQueue<T, C> {
    queue_file: QueueFile,
    converter: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C: Converter<T>> ObjectQueue<T, C> {
    /// Wrap an open queue file with a converter.
    pub const fn new(queue_file: QueueFile, converter: C) -> Self {
        Self {
            queue_file,
            converter,
            _marker: PhantomData,
        }
    }

    /// Serialize `value` and append it at the tail.
    pub fn add(&mut self, value: &T) -> Result<()> {
        let bytes = self.converter.serialize(value)?;
        self.queue_file.add(&bytes)
    }

    /// Deserialize the head element without removing it.
    pub fn peek(&mut self) -> Result<Option<T>> {
        match self.queue_file.peek()? {
            Some(bytes) => Ok(Some(self.converter.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Deserialize up to `max` elements from the head, eagerly. A bad
    /// element fails the whole call rather than being deferred.
    pub fn peek_n(&mut self, max: usize) -> Result<Vec<T>> {
        self.queue_file
            .peek_n(max)?
            .iter()
            .map(|bytes| self.converter.deserialize(bytes))
            .collect()
    }

    /// Materialize every element in FIFO order.
    pub fn as_list(&mut self) -> Result<Vec<T>> {
        let n = self.queue_file.size();
        self.peek_n(n)
    }

    /// Remove the head element.
    pub fn remove(&mut self) -> Result<()> {
        self.queue_file.remove()
    }

    /// Remove `n` elements from the head.
    pub fn remove_n(&mut self, n: usize) -> Result<()> {
        self.queue_file.remove_n(n)
    }

    /// Reset the queue to empty.
    pub fn clear(&mut self) -> Result<()> {
        self.queue_file.clear()
    }

    /// Number of elements in the queue. O(1).
    #[must_use]
    pub const fn size(&self) -> usize {
        self.queue_file.size()
    }

    /// Whether the queue holds no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.queue_file.is_empty()
    }

    /// Create a detached typed cursor positioned at the head.
    #[must_use]
    pub const fn cursor(&self) -> ObjectCursor {
        ObjectCursor {
            inner: self.queue_file.cursor(),
        }
    }

    /// Borrowing iterator over deserialized values, head to tail.
    pub fn iter(&mut self) -> ObjectIter<'_, T, C> {
        ObjectIter {
            cursor: self.cursor(),
            queue: self,
        }
    }

    /// The underlying byte queue.
    pub const fn queue_file(&mut self) -> &mut QueueFile {
        &mut self.queue_file
    }

    /// Unwrap back into the underlying byte queue.
    pub fn into_queue_file(self) -> QueueFile {
        self.queue_file
    }
}

/// A detached read cursor over an [`ObjectQueue`].
///
/// Wraps the byte cursor and deserializes on each step. A deserialize
/// failure is returned without advancing, so the caller can retry or
/// [`skip`](Self::skip) past the bad element.
#[derive(Debug, Clone)]
pub struct ObjectCursor {
    inner: ElementCursor,
}

impl ObjectCursor {
    /// Whether another element is available.
    pub fn has_next<T, C: Converter<T>>(&self, queue: &ObjectQueue<T, C>) -> Result<bool> {
        self.inner.has_next(&queue.queue_file)
    }

    /// Read and deserialize the next element.
    pub fn next<T, C: Converter<T>>(&mut self, queue: &mut ObjectQueue<T, C>) -> Result<Option<T>> {
        // Step a scratch cursor; adopt it only once deserialization
        // succeeds, so a failure leaves this cursor where it was.
        let mut stepped = self.inner.clone();
        match stepped.next(&mut queue.queue_file)? {
            Some(bytes) => {
                let value = queue.converter.deserialize(&bytes)?;
                self.inner = stepped;
                Ok(Some(value))
            }
            None => {
                self.inner = stepped;
                Ok(None)
            }
        }
    }

    /// Remove the element returned by the most recent successful
    /// [`next`](Self::next). Undeserializable elements are dropped with
    /// [`skip`](Self::skip) instead.
    pub fn remove<T, C: Converter<T>>(&mut self, queue: &mut ObjectQueue<T, C>) -> Result<()> {
        self.inner.remove(&mut queue.queue_file)
    }

    /// Advance past the element at the cursor without deserializing it,
    /// e.g. after a deserialize failure left the cursor in place.
    pub fn skip<T, C: Converter<T>>(&mut self, queue: &mut ObjectQueue<T, C>) -> Result<()> {
        self.inner.next(&mut queue.queue_file)?;
        Ok(())
    }
}

/// Borrowing iterator over deserialized values.
pub struct ObjectIter<'a, T, C> {
    cursor: ObjectCursor,
    queue: &'a mut ObjectQueue<T, C>,
}

impl<T, C: Converter<T>> Iterator for ObjectIter<'_, T, C> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next(self.queue).transpose()
    }
}

/// Identity converter: payloads stored and returned as raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesConverter;

impl Converter<Vec<u8>> for BytesConverter {
    fn serialize(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// UTF-8 string converter. Deserialization fails on invalid UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringConverter;

impl Converter<String> for StringConverter {
    fn serialize(&self, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<String> {
        std::str::from_utf8(bytes)
            .map(ToOwned::to_owned)
            .map_err(|e| QueueError::Serialization {
                source: Box::new(e),
            })
    }
}
