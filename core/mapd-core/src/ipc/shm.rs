//! SysV shared memory attach/detach.
//!
//! A [`SharedMemorySegment`] exists only while attached; `detach(self)`
//! consumes it and dropping it detaches. Every live mapping is recorded in a
//! process-wide registry, and the raw detach refuses addresses it does not
//! know about, so a mapping is never unmapped twice.

use super::handle::SharedMemoryHandle;
use crate::error::{MapdError, MapdResult};
use arrow::buffer::Buffer;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::{debug, warn};

static ATTACHED: Mutex<BTreeSet<usize>> = Mutex::new(BTreeSet::new());

/// Number of segments currently attached by this process.
pub fn attached_segments() -> usize {
    ATTACHED.lock().len()
}

/// Whether `addr` is a live mapping created by this module.
pub fn is_attached(addr: usize) -> bool {
    ATTACHED.lock().contains(&addr)
}

/// Attach the segment named by `key`, read-only. Returns its address.
#[cfg(unix)]
fn attach_raw(key: i32, size: usize) -> MapdResult<usize> {
    // SAFETY: plain syscalls; no memory is touched until shmat succeeds.
    let id = unsafe { libc::shmget(key, size, 0) };
    if id == -1 {
        return Err(MapdError::InvalidHandle(format!(
            "no shared memory segment for key {key} ({} bytes): {}",
            size,
            std::io::Error::last_os_error()
        )));
    }
    let addr = unsafe { libc::shmat(id, std::ptr::null(), libc::SHM_RDONLY) };
    if addr as isize == -1 {
        return Err(MapdError::InvalidHandle(format!(
            "cannot attach shared memory key {key}: {}",
            std::io::Error::last_os_error()
        )));
    }
    let addr = addr as usize;
    ATTACHED.lock().insert(addr);
    debug!(target: "ipc", key, size, addr, "attached shared memory");
    Ok(addr)
}

#[cfg(not(unix))]
fn attach_raw(key: i32, _size: usize) -> MapdResult<usize> {
    Err(MapdError::NotImplemented(format!(
        "shared memory key {key}: SysV IPC is only available on unix"
    )))
}

/// Detach a mapping created by this module.
///
/// Fails with `InvalidHandle` if `addr` is not a live mapping, which
/// includes a second detach of the same address.
///
/// # Safety
///
/// No slice or buffer borrowed from the mapping may be used afterwards.
#[cfg(unix)]
pub unsafe fn detach_raw(addr: usize) -> MapdResult<()> {
    if !ATTACHED.lock().remove(&addr) {
        return Err(MapdError::InvalidHandle(format!(
            "address {addr:#x} is not an attached shared memory segment"
        )));
    }
    // SAFETY: addr came from shmat and was still registered.
    if unsafe { libc::shmdt(addr as *const libc::c_void) } == -1 {
        return Err(MapdError::Io {
            source: std::io::Error::last_os_error(),
        });
    }
    debug!(target: "ipc", addr, "detached shared memory");
    Ok(())
}

/// # Safety
///
/// See the unix variant.
#[cfg(not(unix))]
pub unsafe fn detach_raw(addr: usize) -> MapdResult<()> {
    Err(MapdError::InvalidHandle(format!(
        "address {addr:#x} is not an attached shared memory segment"
    )))
}

/// Owner of one attached mapping.
#[derive(Debug)]
struct Mapping {
    addr: usize,
    len: usize,
    key: i32,
    attached: bool,
}

impl Mapping {
    fn release(&mut self) -> MapdResult<()> {
        if !self.attached {
            return Ok(());
        }
        self.attached = false;
        // SAFETY: the mapping owns the address and is being torn down.
        unsafe { detach_raw(self.addr) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(target: "ipc", key = self.key, error = %e, "failed to detach shared memory");
        }
    }
}

/// An attached, read-only shared memory segment.
#[derive(Debug)]
pub struct SharedMemorySegment {
    mapping: Mapping,
}

impl SharedMemorySegment {
    /// Look up the segment named by `handle` and map it read-only.
    pub fn attach(handle: &SharedMemoryHandle) -> MapdResult<Self> {
        let key = handle.sysv_key()?;
        let addr = attach_raw(key, handle.size())?;
        Ok(Self {
            mapping: Mapping {
                addr,
                len: handle.size(),
                key,
                attached: true,
            },
        })
    }

    pub fn key(&self) -> i32 {
        self.mapping.key
    }

    pub fn len(&self) -> usize {
        self.mapping.len
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.len == 0
    }

    /// Address of the mapping, for lifecycle diagnostics.
    pub fn addr(&self) -> usize {
        self.mapping.addr
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.mapping.len == 0 {
            return &[];
        }
        // SAFETY: the mapping is attached for the lifetime of &self and is
        // at least `len` bytes long (shmget checked the size).
        unsafe { std::slice::from_raw_parts(self.mapping.addr as *const u8, self.mapping.len) }
    }

    /// Zero-copy Arrow buffer over the segment. The segment stays attached
    /// until the buffer and every slice of it are dropped.
    pub fn into_buffer(self) -> Buffer {
        let len = self.mapping.len;
        let Some(ptr) = NonNull::new(self.mapping.addr as *mut u8) else {
            return Buffer::from_vec(Vec::<u8>::new());
        };
        let owner = Arc::new(self.mapping);
        // SAFETY: ptr..ptr+len stays mapped until `owner` drops.
        unsafe { Buffer::from_custom_allocation(ptr, len, owner) }
    }

    /// Detach now, reporting failures instead of logging them.
    pub fn detach(mut self) -> MapdResult<()> {
        self.mapping.release()
    }
}
