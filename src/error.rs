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

use std::io;

/// Queue operation errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Filesystem I/O failure. The on-disk committed state is unchanged;
    /// the failed operation may be retried.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The stored file length makes the ring unaddressable. Unrecoverable;
    /// the caller should recreate the file.
    #[error("File is corrupt; length stored in header ({length}) is invalid.")]
    CorruptHeader { length: i64 },

    /// The physical file is shorter than the length recorded in the header.
    #[error("File is truncated. Expected length: {expected}, Actual length: {actual}")]
    Truncated { expected: i64, actual: u64 },

    /// Structural inconsistency beyond the header (bad element framing).
    #[error("File is corrupt; {detail}")]
    Corrupt { detail: String },

    /// Asked to remove more elements than the queue holds.
    #[error("Cannot remove more elements ({requested}) than present in queue ({count}).")]
    RemoveTooMany { requested: usize, count: usize },

    /// Element payloads are length-prefixed with a signed 32-bit integer.
    #[error("Element too large ({size} bytes).")]
    ElementTooLarge { size: usize },

    /// Removed or peeked past the end of the queue.
    #[error("Queue is empty.")]
    NoSuchElement,

    /// The queue was structurally modified behind an active cursor.
    #[error("Queue was modified while iterating.")]
    ConcurrentModification,

    /// Cursor removal attempted somewhere other than the queue head.
    #[error("Removal is only permitted from the head.")]
    RemovalNotPermitted,

    /// Converter failure in the typed layer, propagated per element.
    #[error("Serialization failed: {source}")]
    Serialization {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
