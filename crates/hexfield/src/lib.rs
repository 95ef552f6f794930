//! Renderer crate for hexfield, an animated hexagonal tile background.
//!
//! The crate compiles a GLSL fragment program, feeds it a `resolution` and
//! `time` uniform pair and redraws it on every display refresh. The flow is:
//!
//! ```text
//!   CLI / embedder
//!          │ Surface (host window or test double)
//!          ▼
//!   FrameDriver::start ──▶ RenderContext::bootstrap ──▶ compile / link / upload quad
//!          │
//!          └─▶ on_frame(token, now) ──▶ set_time() ──▶ draw() ──▶ request_frame()
//! ```
//!
//! [`host`] defines the two traits the kernel needs from its environment.
//! [`gpu`] implements them on wgpu and [`window`] drives them from a winit
//! event loop. [`field`] evaluates the same pattern on the CPU, which backs
//! [`export`] and the property tests.

pub mod bootstrap;
pub mod compile;
pub mod driver;
pub mod error;
pub mod export;
pub mod field;
pub mod gpu;
pub mod host;
pub mod shader;
pub mod types;
pub mod window;

pub use bootstrap::{RenderContext, QUAD_VERTICES};
pub use driver::FrameDriver;
pub use error::{BootstrapError, HostError};
pub use export::{export_png, render_still};
pub use host::{FrameToken, GraphicsContext, ListenerToken, ShaderStage, Surface, UniformValue};
pub use shader::ShaderSources;
pub use types::{GpuPowerPreference, RendererConfig, MAX_SURFACE_DIMENSION};
pub use window::{run_preview, WindowSurface};
