//! Block devices - raw byte I/O at file offsets.
//!
//! The block pipelines never touch a file directly; they go through the
//! [`BlockDevice`] trait:
//! - [`FileDevice`] - a single database file
//! - [`MemoryDevice`] - an in-memory byte vector (tests, benchmarks)

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::common::Result;

/// Positional byte I/O used by the block read and write pipelines.
///
/// Implementations must be safe to call from several threads at once; the
/// caller guarantees that concurrent writes never target overlapping ranges.
pub trait BlockDevice: Send + Sync {
    /// Fill `buf` with the bytes at `offset`.
    ///
    /// # Errors
    /// A read that cannot fill `buf` completely fails with
    /// `std::io::ErrorKind::UnexpectedEof`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write all of `data` at `offset`, extending the device if needed.
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Flush written data to stable storage.
    fn sync(&self) -> Result<()>;

    /// Current size of the device in bytes.
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// A block device backed by one file.
///
/// # File Layout
/// Blocks are laid out at multiples of the allocation unit:
/// ```text
/// ┌──────────┬────────────────────┬──────────┬─────────┐
/// │ Block 0  │ Block 1 (3 units)  │ Block 4  │  ...    │
/// └──────────┴────────────────────┴──────────┴─────────┘
/// Offset: 0  unit               4×unit
/// ```
///
/// # Thread Safety
/// The file handle sits behind a `Mutex`: every seek+read or seek+write pair
/// runs under the lock, so the device can be shared between threads.
pub struct FileDevice {
    file: Mutex<File>,
}

impl FileDevice {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }
}

impl BlockDevice for FileDevice {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file.lock().metadata()?.len())
    }
}

/// A block device held entirely in memory.
#[derive(Default)]
pub struct MemoryDevice {
    bytes: Mutex<Vec<u8>>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current device contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    /// Apply `f` to the raw device bytes.
    ///
    /// Used to simulate media corruption.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        f(&mut self.bytes.lock())
    }
}

impl BlockDevice for MemoryDevice {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let bytes = self.bytes.lock();
        let end = offset.saturating_add(buf.len() as u64);
        if end > bytes.len() as u64 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "short read: wanted {} bytes at offset {}, device holds {}",
                    buf.len(),
                    offset,
                    bytes.len()
                ),
            )
            .into());
        }
        let start = offset as usize;
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut bytes = self.bytes.lock();
        let Some((start, end)) = usize::try_from(offset)
            .ok()
            .and_then(|start| Some((start, start.checked_add(data.len())?)))
        else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "write of {} bytes at offset {} exceeds the address space",
                    data.len(),
                    offset
                ),
            )
            .into());
        };
        if end > bytes.len() {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.bytes.lock().len() as u64)
    }
}
