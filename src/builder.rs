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

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::debug;

use crate::{
    QueueFile, Result,
    file::{BackingFile, DataFile},
    format::{FormatVersion, HEADER_LENGTH, INITIAL_LENGTH, encode_header},
};

/// Builder for opening or creating a [`QueueFile`].
pub struct QueueFileBuilder {
    path: PathBuf,
    zero: bool,
    capacity: Option<usize>,
}

impl QueueFileBuilder {
    /// Start building a queue backed by the file at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            zero: true,
            capacity: None,
        }
    }

    /// Whether removed element bytes are overwritten with zeroes.
    /// Defaults to `true`.
    #[must_use]
    pub const fn zero(mut self, zero: bool) -> Self {
        self.zero = zero;
        self
    }

    /// Cap the queue at `capacity` elements. Adding past the cap evicts the
    /// oldest element instead of growing the file. Defaults to unbounded.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Open the queue, formatting a fresh file if none exists.
    ///
    /// A missing file is created atomically: a sibling `.tmp` file is
    /// written with an empty versioned header, fsynced, then renamed into
    /// place. A crash mid-creation leaves at worst a stray `.tmp`.
    pub fn build(self) -> Result<QueueFile> {
        if !self.path.exists() {
            debug!(path = ?self.path, "Formatting fresh queue file");

            let mut tmp_name: OsString = self.path.as_os_str().to_os_string();
            tmp_name.push(".tmp");
            let tmp_path = PathBuf::from(tmp_name);

            {
                let mut file = DataFile::create(&tmp_path, INITIAL_LENGTH)?;
                let mut buf = [0u8; HEADER_LENGTH as usize];
                let header =
                    encode_header(FormatVersion::Versioned, INITIAL_LENGTH, 0, 0, 0, &mut buf);
                file.write_at(0, header)?;
                file.sync()?;
            }

            std::fs::rename(&tmp_path, &self.path)?;
        }

        let file = DataFile::open(&self.path)?;
        QueueFile::from_backing(Box::new(file), self.zero, self.capacity)
    }
}
