//! POSIX named counting semaphores.

use crate::error::TransportError;
use std::ffi::CString;
use std::io;
use std::ptr::NonNull;

/// Permission bits for newly created semaphores.
const SEMAPHORE_MODE: libc::mode_t = 0o666;

/// Handle to a process-wide named semaphore.
///
/// The semaphore is created on first open with `initial` as its count; later
/// opens (from any process) attach to the existing one and ignore `initial`.
/// Dropping the handle closes it but never unlinks the name: removal is an
/// explicit, single-owner step ([`NamedSemaphore::unlink`]).
#[derive(Debug)]
pub struct NamedSemaphore {
    sem: NonNull<libc::sem_t>,
    name: String,
}

// SAFETY: a `sem_t` returned by `sem_open` is a process-shared object meant to
// be operated on from any thread; the handle holds no thread-local state.
unsafe impl Send for NamedSemaphore {}
// SAFETY: `sem_wait`/`sem_post`/`sem_getvalue` are thread-safe.
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Creates or opens the semaphore called `name`.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidName`] if `name` contains a NUL byte and
    /// [`TransportError::Resource`] if `sem_open` fails.
    pub fn open(name: &str, initial: u32) -> Result<Self, TransportError> {
        let c_name = c_name(name)?;

        // SAFETY: `c_name` is a valid NUL-terminated string; with O_CREAT the
        // variadic mode and value arguments are read as promoted unsigned ints.
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT,
                libc::c_uint::from(SEMAPHORE_MODE),
                libc::c_uint::from(initial),
            )
        };

        if sem == libc::SEM_FAILED {
            return Err(TransportError::last_os_error("semaphore open", name));
        }

        let sem = NonNull::new(sem)
            .ok_or_else(|| TransportError::last_os_error("semaphore open", name))?;

        tracing::debug!("Opened semaphore {} (initial {})", name, initial);

        Ok(Self {
            sem,
            name: name.to_string(),
        })
    }

    /// Returns the semaphore name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decrements the semaphore, blocking while it is zero.
    ///
    /// There is no timeout: if the peer never posts, this never returns.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if `sem_wait` fails.
    pub fn wait(&self) -> Result<(), TransportError> {
        loop {
            // SAFETY: `self.sem` is a live handle returned by `sem_open`.
            if unsafe { libc::sem_wait(self.sem.as_ptr()) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(TransportError::resource("semaphore wait", &self.name, err));
            }
        }
    }

    /// Decrements the semaphore if it is positive.
    ///
    /// Returns `false` instead of blocking when the count is zero.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if `sem_trywait` fails for any
    /// reason other than a zero count.
    pub fn try_wait(&self) -> Result<bool, TransportError> {
        loop {
            // SAFETY: `self.sem` is a live handle returned by `sem_open`.
            if unsafe { libc::sem_trywait(self.sem.as_ptr()) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => return Err(TransportError::resource("semaphore trywait", &self.name, err)),
            }
        }
    }

    /// Increments the semaphore, waking one waiter.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if `sem_post` fails.
    pub fn post(&self) -> Result<(), TransportError> {
        // SAFETY: `self.sem` is a live handle returned by `sem_open`.
        if unsafe { libc::sem_post(self.sem.as_ptr()) } != 0 {
            return Err(TransportError::last_os_error("semaphore post", &self.name));
        }
        Ok(())
    }

    /// Returns the current count.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if `sem_getvalue` fails.
    pub fn value(&self) -> Result<i32, TransportError> {
        let mut value: libc::c_int = 0;
        // SAFETY: `self.sem` is live and `value` is a valid out pointer.
        if unsafe { libc::sem_getvalue(self.sem.as_ptr(), &mut value) } != 0 {
            return Err(TransportError::last_os_error("semaphore getvalue", &self.name));
        }
        Ok(value)
    }

    /// Removes the name. Open handles stay usable until dropped.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] if `sem_unlink` fails, including
    /// when the name does not exist.
    pub fn unlink(name: &str) -> Result<(), TransportError> {
        let c_name = c_name(name)?;
        // SAFETY: `c_name` is a valid NUL-terminated string.
        if unsafe { libc::sem_unlink(c_name.as_ptr()) } != 0 {
            return Err(TransportError::last_os_error("semaphore unlink", name));
        }
        tracing::debug!("Unlinked semaphore {}", name);
        Ok(())
    }

    /// Removes the name if it exists. Returns whether it existed.
    ///
    /// # Errors
    /// Returns [`TransportError::Resource`] for failures other than `ENOENT`.
    pub fn unlink_if_exists(name: &str) -> Result<bool, TransportError> {
        match Self::unlink(name) {
            Ok(()) => Ok(true),
            Err(TransportError::Resource { source, .. })
                if source.raw_os_error() == Some(libc::ENOENT) =>
            {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // SAFETY: `self.sem` came from `sem_open` and is closed exactly once.
        if unsafe { libc::sem_close(self.sem.as_ptr()) } != 0 {
            tracing::warn!(
                "Closing semaphore {} failed: {}",
                self.name,
                io::Error::last_os_error()
            );
        }
    }
}

fn c_name(name: &str) -> Result<CString, TransportError> {
    CString::new(name).map_err(|_| TransportError::InvalidName {
        name: name.to_string(),
    })
}
