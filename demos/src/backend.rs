//! Backend chosen at compile time from the crate features (`cuda`, `wgpu`, `ndarray`).

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        /// Backend the demos run on.
        pub type SelectedBackend = burn::backend::Cuda;
        /// Device of [`SelectedBackend`].
        pub type SelectedDevice = burn::backend::cuda::CudaDevice;
        const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        /// Backend the demos run on.
        pub type SelectedBackend = burn::backend::Wgpu;
        /// Device of [`SelectedBackend`].
        pub type SelectedDevice = burn::backend::wgpu::WgpuDevice;
        const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        /// Backend the demos run on.
        pub type SelectedBackend = burn::backend::NdArray;
        /// Device of [`SelectedBackend`].
        pub type SelectedDevice = burn::backend::ndarray::NdArrayDevice;
        const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}

/// Default device of the selected backend.
pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}

/// Human-readable backend name for logs.
pub const fn get_backend_name() -> &'static str {
    BACKEND_NAME
}
