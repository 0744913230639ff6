//! POSIX shared memory segments.
//!
//! The mapping is modelled as raw bytes: every access goes through a
//! bounds-checked accessor and no typed reference into the region is ever
//! handed out, because the other process writes the same bytes concurrently.

use crate::error::TransportError;
use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use std::fs::File;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

/// Configuration for opening a shared memory segment.
#[derive(Debug, Clone)]
pub struct SharedMemoryConfig {
    /// Size of the segment in bytes.
    pub size: usize,
    /// Whether to create the segment if it doesn't exist.
    pub create: bool,
}

impl Default for SharedMemoryConfig {
    fn default() -> Self {
        Self {
            size: 4096,
            create: true,
        }
    }
}

impl SharedMemoryConfig {
    /// Creates a config for a segment of `size` bytes, created on demand.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Sets whether a missing segment is created.
    #[must_use]
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }
}

/// Named shared memory segment mapped read-write.
pub struct SharedMemory {
    _mmap: MmapMut,
    base: NonNull<u8>,
    size: usize,
    name: String,
}

// SAFETY: the mapping stays valid for the lifetime of `_mmap`, which moves
// together with `base`; cross-thread access is no different from the
// cross-process access the region exists for.
unsafe impl Send for SharedMemory {}

impl std::fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemory")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish()
    }
}

impl SharedMemory {
    /// Creates or opens the segment called `name` and maps it.
    ///
    /// A newly created segment is sized to `config.size` and reads as zeros.
    /// An existing segment must already have exactly that size.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if any of `shm_open`, `ftruncate`
    /// or `mmap` fails, and [`TransportError::CapacityMismatch`] if an existing
    /// segment has another size.
    pub fn open(name: &str, config: SharedMemoryConfig) -> Result<Self, TransportError> {
        let mut flags = OFlag::O_RDWR;
        if config.create {
            flags |= OFlag::O_CREAT;
        }

        let fd = shm_open(name, flags, Mode::from_bits_truncate(0o666))
            .map_err(|errno| TransportError::resource("shm_open", name, errno.into()))?;
        let file = File::from(fd);

        let current = file
            .metadata()
            .map_err(|err| TransportError::resource("shm fstat", name, err))?
            .len() as usize;

        if current == 0 {
            file.set_len(config.size as u64)
                .map_err(|err| TransportError::resource("shm ftruncate", name, err))?;
        } else if current != config.size {
            return Err(TransportError::CapacityMismatch {
                name: name.to_string(),
                expected: config.size,
                actual: current,
            });
        }

        // SAFETY: the segment is only ever resized while still empty, so the
        // mapping never outlives the object's length.
        let mut mmap = unsafe { MmapOptions::new().len(config.size).map_mut(&file) }
            .map_err(|err| TransportError::resource("shm mmap", name, err))?;

        let base = NonNull::new(mmap.as_mut_ptr())
            .ok_or_else(|| TransportError::invalid_state("mmap returned a null mapping"))?;

        tracing::debug!("Mapped shared memory {} ({} bytes)", name, config.size);

        Ok(Self {
            _mmap: mmap,
            base,
            size: config.size,
            name: name.to_string(),
        })
    }

    /// Removes the segment name. Existing mappings stay valid.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if `shm_unlink` fails.
    pub fn unlink(name: &str) -> Result<(), TransportError> {
        shm_unlink(name)
            .map_err(|errno| TransportError::resource("shm_unlink", name, errno.into()))?;
        tracing::debug!("Unlinked shared memory {}", name);
        Ok(())
    }

    /// Removes the segment name if it exists. Returns whether it existed.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] for failures other than `ENOENT`.
    pub fn unlink_if_exists(name: &str) -> Result<bool, TransportError> {
        match shm_unlink(name) {
            Ok(()) => Ok(true),
            Err(Errno::ENOENT) => Ok(false),
            Err(errno) => Err(TransportError::resource("shm_unlink", name, errno.into())),
        }
    }

    /// Returns the segment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the size of the mapped region.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    fn check(&self, offset: usize, len: usize, align: usize) -> Result<*mut u8, TransportError> {
        let in_bounds = offset
            .checked_add(len)
            .is_some_and(|end| end <= self.size);
        if !in_bounds || offset % align != 0 {
            return Err(TransportError::OutOfBounds {
                offset,
                len,
                size: self.size,
            });
        }
        // SAFETY: `offset + len <= size`, so the pointer stays inside the mapping.
        Ok(unsafe { self.base.as_ptr().add(offset) })
    }

    /// Reads an `i32` at `offset` (4-byte aligned).
    ///
    /// # Errors
    /// Returns [`TransportError::OutOfBounds`] for offsets outside the region.
    pub fn read_i32(&self, offset: usize) -> Result<i32, TransportError> {
        let ptr = self.check(offset, 4, 4)?;
        // SAFETY: in bounds and aligned; volatile because the peer writes it.
        Ok(unsafe { std::ptr::read_volatile(ptr as *const i32) })
    }

    /// Writes an `i32` at `offset` (4-byte aligned).
    ///
    /// # Errors
    /// Returns [`TransportError::OutOfBounds`] for offsets outside the region.
    pub fn write_i32(&self, offset: usize, value: i32) -> Result<(), TransportError> {
        let ptr = self.check(offset, 4, 4)?;
        // SAFETY: in bounds, aligned, and the mapping is writable.
        unsafe { std::ptr::write_volatile(ptr as *mut i32, value) };
        Ok(())
    }

    /// Atomically loads a `u64` control word at `offset` (8-byte aligned).
    ///
    /// # Errors
    /// Returns [`TransportError::OutOfBounds`] for offsets outside the region.
    pub fn load_u64(&self, offset: usize) -> Result<u64, TransportError> {
        Ok(self.atomic_u64(offset)?.load(Ordering::Acquire))
    }

    /// Atomically stores a `u64` control word at `offset` (8-byte aligned).
    ///
    /// # Errors
    /// Returns [`TransportError::OutOfBounds`] for offsets outside the region.
    pub fn store_u64(&self, offset: usize, value: u64) -> Result<(), TransportError> {
        self.atomic_u64(offset)?.store(value, Ordering::Release);
        Ok(())
    }

    /// Stores `new` at `offset` if the word currently holds `current`.
    ///
    /// Returns the previous value on failure.
    ///
    /// # Errors
    /// Returns [`TransportError::OutOfBounds`] for offsets outside the region.
    pub fn compare_exchange_u64(
        &self,
        offset: usize,
        current: u64,
        new: u64,
    ) -> Result<Result<u64, u64>, TransportError> {
        Ok(self
            .atomic_u64(offset)?
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire))
    }

    fn atomic_u64(&self, offset: usize) -> Result<&AtomicU64, TransportError> {
        let ptr = self.check(offset, 8, 8)?;
        // SAFETY: in bounds, 8-byte aligned (the mapping is page aligned), and
        // the reference does not outlive `&self`.
        Ok(unsafe { &*(ptr as *const AtomicU64) })
    }

    /// Copies `dst.len()` bytes starting at `offset` into `dst`.
    ///
    /// # Errors
    /// Returns [`TransportError::OutOfBounds`] for ranges outside the region.
    pub fn read_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<(), TransportError> {
        let ptr = self.check(offset, dst.len(), 1)?;
        // SAFETY: the source range is inside the mapping and cannot overlap `dst`.
        unsafe { std::ptr::copy_nonoverlapping(ptr, dst.as_mut_ptr(), dst.len()) };
        Ok(())
    }

    /// Copies `src` into the region starting at `offset`.
    ///
    /// # Errors
    /// Returns [`TransportError::OutOfBounds`] for ranges outside the region.
    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> Result<(), TransportError> {
        let ptr = self.check(offset, src.len(), 1)?;
        // SAFETY: the destination range is inside the writable mapping.
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), ptr, src.len()) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        format!("/ipcbench_shm_unit_{}_{}", tag, std::process::id())
    }

    #[test]
    fn test_shared_memory_config_default() {
        let config = SharedMemoryConfig::default();
        assert_eq!(config.size, 4096);
        assert!(config.create);

        let config = SharedMemoryConfig::new(64).create(false);
        assert_eq!(config.size, 64);
        assert!(!config.create);
    }

    #[test]
    fn test_shared_memory_create_and_reopen() {
        let name = unique("reopen");
        let shm = SharedMemory::open(&name, SharedMemoryConfig::new(256)).unwrap();
        assert_eq!(shm.size(), 256);
        assert_eq!(shm.read_i32(0).unwrap(), 0);

        shm.write_i32(4, 42).unwrap();
        shm.store_u64(8, 7).unwrap();

        let other = SharedMemory::open(&name, SharedMemoryConfig::new(256).create(false)).unwrap();
        assert_eq!(other.read_i32(4).unwrap(), 42);
        assert_eq!(other.load_u64(8).unwrap(), 7);

        SharedMemory::unlink(&name).unwrap();
    }

    #[test]
    fn test_shared_memory_size_mismatch() {
        let name = unique("mismatch");
        let _shm = SharedMemory::open(&name, SharedMemoryConfig::new(128)).unwrap();
        let err = SharedMemory::open(&name, SharedMemoryConfig::new(256)).unwrap_err();
        assert!(matches!(
            err,
            TransportError::CapacityMismatch {
                expected: 256,
                actual: 128,
                ..
            }
        ));
        SharedMemory::unlink(&name).unwrap();
    }

    #[test]
    fn test_shared_memory_open_missing_without_create() {
        let name = unique("missing");
        let err = SharedMemory::open(&name, SharedMemoryConfig::new(64).create(false)).unwrap_err();
        assert_eq!(err.os_error_code(), Some(libc::ENOENT));
        assert!(!SharedMemory::unlink_if_exists(&name).unwrap());
    }

    #[test]
    fn test_shared_memory_bounds() {
        let name = unique("bounds");
        let shm = SharedMemory::open(&name, SharedMemoryConfig::new(16)).unwrap();
        assert!(shm.read_i32(12).is_ok());
        assert!(matches!(
            shm.read_i32(16),
            Err(TransportError::OutOfBounds { .. })
        ));
        assert!(shm.write_i32(2, 1).is_err());
        assert!(shm.load_u64(12).is_err());
        assert!(shm.write_bytes(10, &[0u8; 7]).is_err());

        let mut buf = [0u8; 3];
        shm.write_bytes(13, b"abc").unwrap();
        shm.read_bytes(13, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        assert_eq!(shm.compare_exchange_u64(0, 0, 9).unwrap(), Ok(0));
        assert_eq!(shm.compare_exchange_u64(0, 0, 5).unwrap(), Err(9));

        SharedMemory::unlink(&name).unwrap();
    }
}
