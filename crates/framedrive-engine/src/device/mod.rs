//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - creating & configuring the swap surface and its back buffers
//! - replaying recorded frames through wgpu

mod backend;
mod context;
mod init;
mod surface;

pub use backend::WgpuBackend;
pub use context::GpuContext;
pub use init::{present_mode_for, GpuInit};
pub use surface::SwapSurface;

#[cfg(test)]
pub(crate) use context::tests::noop_context;
