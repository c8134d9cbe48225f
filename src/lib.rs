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

//! A crash-safe, single-file FIFO byte queue with a typed object layer.
//!
//! [`QueueFile`] stores length-prefixed elements in a circular region of
//! one file, surviving process restarts and crashes: every mutation is
//! committed by a single atomic header write, so interrupted operations
//! roll back to the previous element set on reopen. [`ObjectQueue`] layers
//! a caller-supplied [`Converter`] on top to queue typed values.

pub mod builder;
pub mod error;
pub mod file;
pub mod format;
pub mod object_queue;
pub mod queue_file;

pub use builder::QueueFileBuilder;
pub use error::{QueueError, Result};
pub use file::{BackingFile, DataFile};
pub use object_queue::{
    BytesConverter, Converter, ObjectCursor, ObjectIter, ObjectQueue, StringConverter,
};
pub use queue_file::{ElementCursor, Iter, QueueFile};
