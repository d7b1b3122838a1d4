//! CUDA IPC import for `sql_execute_gdf` results.
//!
//! Same three steps as the CPU path, through the CUDA driver: open the
//! 64-byte IPC memory handle, copy the device bytes to host, close it. The
//! host copy is then read as an ordinary result stream.

use crate::error::{MapdError, MapdResult};
use arrow::buffer::Buffer;

#[cfg(feature = "gpu")]
use cudarc::driver::{CudaContext, sys};
#[cfg(feature = "gpu")]
use tracing::debug;

/// Size of a `CUipcMemHandle`.
pub const CUDA_IPC_HANDLE_LEN: usize = 64;

/// Device-side result buffer exported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuIpcHandle {
    pub handle: Vec<u8>,
    pub size: usize,
    pub device_id: i32,
}

impl GpuIpcHandle {
    pub fn new(handle: Vec<u8>, size: usize, device_id: i32) -> MapdResult<Self> {
        if handle.len() != CUDA_IPC_HANDLE_LEN {
            return Err(MapdError::InvalidHandle(format!(
                "CUDA IPC handle must be {CUDA_IPC_HANDLE_LEN} bytes, got {}",
                handle.len()
            )));
        }
        Ok(Self {
            handle,
            size,
            device_id,
        })
    }
}

#[cfg(feature = "gpu")]
fn gpu_err(context: &str, e: impl std::fmt::Debug) -> MapdError {
    MapdError::InvalidHandle(format!("{context}: {e:?}"))
}

/// Import the device buffer and copy it to host memory.
#[cfg(feature = "gpu")]
pub fn import_to_host(handle: &GpuIpcHandle) -> MapdResult<Buffer> {
    let ordinal = usize::try_from(handle.device_id)
        .map_err(|_| MapdError::Interface(format!("invalid device id {}", handle.device_id)))?;
    let ctx = CudaContext::new(ordinal).map_err(|e| gpu_err("cannot open CUDA device", e))?;
    ctx.bind_to_thread()
        .map_err(|e| gpu_err("cannot bind CUDA context", e))?;

    let mut raw = sys::CUipcMemHandle {
        reserved: [0; CUDA_IPC_HANDLE_LEN],
    };
    for (dst, src) in raw.reserved.iter_mut().zip(&handle.handle) {
        *dst = *src as _;
    }
    let mut dptr: sys::CUdeviceptr = 0;
    // SAFETY: raw is a full 64-byte handle and dptr is a valid out-pointer.
    unsafe {
        sys::cuIpcOpenMemHandle_v2(
            &mut dptr,
            raw,
            sys::CUipcMem_flags::CU_IPC_MEM_LAZY_ENABLE_PEER_ACCESS as u32,
        )
    }
    .result()
    .map_err(|e| gpu_err("cannot open CUDA IPC handle", e))?;
    debug!(target: "ipc", device = handle.device_id, size = handle.size, "opened CUDA IPC handle");

    let mut host = vec![0u8; handle.size];
    // SAFETY: the imported allocation is at least `size` bytes.
    let copied = unsafe { sys::cuMemcpyDtoH_v2(host.as_mut_ptr().cast(), dptr, handle.size) }
        .result()
        .map_err(|e| gpu_err("device to host copy failed", e));
    // SAFETY: dptr was opened above and is closed exactly once.
    let closed = unsafe { sys::cuIpcCloseMemHandle(dptr) }
        .result()
        .map_err(|e| gpu_err("cannot close CUDA IPC handle", e));
    copied?;
    closed?;
    Ok(Buffer::from_vec(host))
}

#[cfg(not(feature = "gpu"))]
pub fn import_to_host(handle: &GpuIpcHandle) -> MapdResult<Buffer> {
    Err(MapdError::NotImplemented(format!(
        "GPU result import on device {} requires the `gpu` feature",
        handle.device_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_length_is_checked() {
        assert!(GpuIpcHandle::new(vec![0; 64], 10, 0).is_ok());
        assert!(matches!(
            GpuIpcHandle::new(vec![0; 8], 10, 0),
            Err(MapdError::InvalidHandle(_))
        ));
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn import_without_feature_is_not_implemented() {
        let handle = GpuIpcHandle::new(vec![0; 64], 10, 0).unwrap();
        assert!(matches!(import_to_host(&handle), Err(MapdError::NotImplemented(_))));
    }
}
