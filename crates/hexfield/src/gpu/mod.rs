//! wgpu implementation of the host graphics primitives.
//!
//! - `context` owns the instance, device and swapchain for a winit window and
//!   implements [`GraphicsContext`](crate::host::GraphicsContext) on top of
//!   them. Shader stages go through naga first so compile errors come back as
//!   text, and uniform locations are the member offsets naga reflects.
//! - `uniforms` mirrors the fragment stage's std140 block.

mod context;
mod uniforms;

pub use context::{UniformSlot, WgpuBuffer, WgpuContext, WgpuProgram, WgpuShader};
