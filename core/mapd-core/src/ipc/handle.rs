//! Server-assigned shared memory handles.

use crate::error::{MapdError, MapdResult};
use serde::{Deserialize, Serialize};

/// Opaque key bytes plus the size of the region they name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedMemoryHandle {
    key: Vec<u8>,
    size: usize,
}

impl SharedMemoryHandle {
    pub fn new(key: impl Into<Vec<u8>>, size: usize) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }

    /// Handle for a SysV key, encoded the way the server sends it.
    pub fn from_sysv_key(key: i32, size: usize) -> Self {
        Self::new(key.to_le_bytes().to_vec(), size)
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// SysV IPC key: the handle bytes as a little-endian `u32`.
    pub fn sysv_key(&self) -> MapdResult<i32> {
        let bytes: [u8; 4] = self.key.as_slice().try_into().map_err(|_| {
            MapdError::InvalidHandle(format!(
                "expected a 4-byte shared memory key, got {} bytes",
                self.key.len()
            ))
        })?;
        Ok(i32::from_le_bytes(bytes))
    }
}

impl std::fmt::Display for SharedMemoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sysv_key() {
            Ok(key) => write!(f, "shm key {key} ({} bytes)", self.size),
            Err(_) => write!(f, "shm handle {:02x?} ({} bytes)", self.key, self.size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_little_endian() {
        let h = SharedMemoryHandle::new(vec![0x01, 0x02, 0x00, 0x00], 16);
        assert_eq!(h.sysv_key().unwrap(), 0x0201);
        assert_eq!(SharedMemoryHandle::from_sysv_key(-5, 1).sysv_key().unwrap(), -5);
    }

    #[test]
    fn wrong_length_is_invalid() {
        let h = SharedMemoryHandle::new(vec![1, 2], 16);
        assert!(matches!(h.sysv_key(), Err(MapdError::InvalidHandle(_))));
    }
}
