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

//! Backing file store.
//!
//! [`BackingFile`] is the random-access seam the ring engine writes through:
//! positioned reads and writes, truncation, and fsync. [`DataFile`] is the
//! production implementation over [`std::fs::File`]; tests substitute
//! fault-injecting implementations to exercise the crash-atomicity contract.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Random-access file abstraction used by the queue engine.
///
/// All methods take `&mut self`: the engine owns its backing exclusively
/// and every operation runs from a single serialized caller.
pub trait BackingFile: Send {
    /// Read exactly `buf.len()` bytes starting at `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Write all of `data` starting at `offset`.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;

    /// Truncate or extend the file to `len` bytes.
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Current physical length in bytes.
    fn len(&mut self) -> io::Result<u64>;

    /// Flush data and metadata to stable storage.
    fn sync(&mut self) -> io::Result<()>;
}

/// Read/write data file backed by [`std::fs::File`].
pub struct DataFile {
    file: File,
    path: PathBuf,
}

impl DataFile {
    /// Create a new data file pre-allocated to `size` bytes, truncating any
    /// existing content.
    pub fn create<P: AsRef<Path>>(path: P, size: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(size)?;

        Ok(Self { file, path })
    }

    /// Open an existing data file for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self { file, path })
    }

    /// Get file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BackingFile for DataFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    fn len(&mut self) -> io::Result<u64> {
        self.file.metadata().map(|m| m.len())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}
