//! The narrow set of host primitives the kernel depends on.
//!
//! [`Surface`] is the drawing surface handed to [`FrameDriver::start`]: it
//! hands out a [`GraphicsContext`], reports its size, schedules redraws, and
//! tracks resize subscriptions. [`GraphicsContext`] is the compile/link/upload
//! /draw surface of a real-time graphics API. The wgpu implementation lives in
//! [`crate::gpu`]; tests drive the same code through recording fakes.
//!
//! [`FrameDriver::start`]: crate::driver::FrameDriver::start

use std::fmt;

use crate::error::HostError;

/// Pipeline stage a shader source targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Value written into a program uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
}

impl UniformValue {
    /// Raw little-endian bytes as laid out in a std140 block.
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            UniformValue::Float(value) => bytemuck::bytes_of(&value).to_vec(),
            UniformValue::Vec2(value) => bytemuck::bytes_of(&value).to_vec(),
        }
    }
}

/// Identifies one scheduled redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Identifies one resize subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub u64);

/// Compile, link, upload and draw primitives of a real-time graphics API.
pub trait GraphicsContext {
    type Shader;
    type Program;
    type Buffer;
    type UniformLocation: Clone + fmt::Debug;

    /// Compiles one stage. `Err` carries the compiler's diagnostic text.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String>;

    /// Links a vertex and fragment stage. `Err` carries the linker's log.
    fn link_program(
        &mut self,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
    ) -> Result<Self::Program, String>;

    fn upload_vertices(&mut self, vertices: &[[f32; 2]]) -> Result<Self::Buffer, HostError>;

    /// `None` when the program has no active uniform called `name`.
    fn uniform_location(&self, program: &Self::Program, name: &str)
        -> Option<Self::UniformLocation>;

    fn set_uniform(
        &mut self,
        program: &Self::Program,
        location: &Self::UniformLocation,
        value: UniformValue,
    );

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Draws `vertex_count` vertices from `buffer` as a triangle strip.
    fn draw_strip(
        &mut self,
        program: &Self::Program,
        buffer: &Self::Buffer,
        vertex_count: u32,
    ) -> Result<(), HostError>;

    fn delete_buffer(&mut self, buffer: Self::Buffer) -> Result<(), HostError>;
    fn delete_shader(&mut self, shader: Self::Shader) -> Result<(), HostError>;
    fn delete_program(&mut self, program: Self::Program) -> Result<(), HostError>;
}

/// A drawing surface able to provide a graphics context and display-refresh
/// scheduling.
pub trait Surface {
    type Context: GraphicsContext;

    /// Creates the real-time graphics context. `Err` means the capability is
    /// absent on this surface.
    fn acquire_context(&mut self) -> Result<Self::Context, HostError>;

    /// Current size in device pixels.
    fn size(&self) -> (u32, u32);

    /// Asks the host to deliver one more display-refresh tick.
    fn request_frame(&mut self) -> FrameToken;

    /// Withdraws a scheduled tick. Cancelling an already delivered or unknown
    /// token is a no-op.
    fn cancel_frame(&mut self, token: FrameToken) -> Result<(), HostError>;

    fn add_resize_listener(&mut self) -> ListenerToken;
    fn remove_resize_listener(&mut self, token: ListenerToken) -> Result<(), HostError>;
}
