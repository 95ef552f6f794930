use std::borrow::Cow;
use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use tracing::{debug, warn};
use wgpu::naga;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::compile::{parse_stage, reflect_uniforms, UniformBlock};
use crate::error::HostError;
use crate::host::{GraphicsContext, ShaderStage, UniformValue};
use crate::types::{GpuPowerPreference, RendererConfig};

use super::uniforms::{uniform_buffer_size, HexfieldUniforms};

/// A compiled stage together with the uniform block it declares.
pub struct WgpuShader {
    module: wgpu::ShaderModule,
    block: UniformBlock,
}

/// A render pipeline plus the uniform buffer bound at set 0, binding 0.
pub struct WgpuProgram {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    block: UniformBlock,
}

pub struct WgpuBuffer {
    buffer: wgpu::Buffer,
}

/// Byte offset of a uniform inside its program's uniform buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    offset: u32,
}

/// wgpu device and swapchain for one preview window.
pub struct WgpuContext {
    _instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    uniform_layout: wgpu::BindGroupLayout,
    viewport: (u32, u32),
}

impl WgpuContext {
    pub fn new(window: Arc<Window>, renderer: &RendererConfig) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let initial_size = window.inner_size();
        let surface = instance
            .create_surface(window)
            .context("failed to create rendering surface")?;

        let power_preference = match renderer.power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        debug!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("hexfield device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let fallback_format = *surface_caps
            .formats
            .first()
            .context("surface reports no supported formats")?;
        // The field is shaded in display space, so skip the sRGB encode.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .unwrap_or_else(|| {
                warn!(
                    ?fallback_format,
                    "no linear (non-sRGB) surface format available; falling back"
                );
                fallback_format
            });

        let present_mode = select_present_mode(&surface_caps.present_modes, renderer.vsync);
        debug!(?present_mode, vsync = renderer.vsync, "using present mode");

        let width = initial_size.width.max(1);
        let height = initial_size.height.max(1);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("hexfield uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            uniform_layout,
            viewport: (width, height),
        })
    }

    fn reconfigure(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    fn pop_validation_scope(&self) -> Option<String> {
        pollster::block_on(self.device.pop_error_scope()).map(|err| err.to_string())
    }
}

fn select_present_mode(modes: &[wgpu::PresentMode], vsync: bool) -> wgpu::PresentMode {
    let find = |wanted: wgpu::PresentMode| modes.iter().copied().find(|mode| *mode == wanted);
    let fifo = find(wgpu::PresentMode::Fifo).unwrap_or(wgpu::PresentMode::Fifo);
    if vsync {
        return fifo;
    }
    find(wgpu::PresentMode::Immediate)
        .or_else(|| find(wgpu::PresentMode::Mailbox))
        .unwrap_or(fifo)
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

fn host_error(err: wgpu::SurfaceError) -> HostError {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => HostError::SurfaceLost,
        wgpu::SurfaceError::OutOfMemory => HostError::OutOfMemory,
        wgpu::SurfaceError::Timeout => HostError::Timeout,
        other => HostError::Backend(other.to_string()),
    }
}

impl GraphicsContext for WgpuContext {
    type Shader = WgpuShader;
    type Program = WgpuProgram;
    type Buffer = WgpuBuffer;
    type UniformLocation = UniformSlot;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<WgpuShader, String> {
        // naga reports front end errors as text; wgpu would only panic or log them.
        let module = parse_stage(stage, source)?;
        let block = reflect_uniforms(&module);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "hexfield vertex shader",
                    ShaderStage::Fragment => "hexfield fragment shader",
                }),
                source: wgpu::ShaderSource::Glsl {
                    shader: Cow::Owned(source.to_owned()),
                    stage: naga_stage(stage),
                    defines: &[],
                },
            });
        if let Some(diagnostics) = self.pop_validation_scope() {
            return Err(diagnostics);
        }
        Ok(WgpuShader { module, block })
    }

    fn link_program(
        &mut self,
        vertex: &WgpuShader,
        fragment: &WgpuShader,
    ) -> Result<WgpuProgram, String> {
        let block = if fragment.block.size > 0 {
            fragment.block
        } else {
            vertex.block
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("hexfield pipeline layout"),
                bind_group_layouts: &[&self.uniform_layout],
                push_constant_ranges: &[],
            });
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("hexfield pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: Some("main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment.module,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            });

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("hexfield uniforms"),
            size: uniform_buffer_size(block.size),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let initial = HexfieldUniforms::new(self.viewport.0, self.viewport.1);
        self.queue
            .write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&initial));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("hexfield uniform bind group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        if let Some(diagnostics) = self.pop_validation_scope() {
            uniform_buffer.destroy();
            return Err(diagnostics);
        }

        Ok(WgpuProgram {
            pipeline,
            uniform_buffer,
            bind_group,
            block,
        })
    }

    fn upload_vertices(&mut self, vertices: &[[f32; 2]]) -> Result<WgpuBuffer, HostError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("hexfield quad"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        if pollster::block_on(self.device.pop_error_scope()).is_some() {
            return Err(HostError::OutOfMemory);
        }
        Ok(WgpuBuffer { buffer })
    }

    fn uniform_location(&self, program: &WgpuProgram, name: &str) -> Option<UniformSlot> {
        program
            .block
            .offset_of(name)
            .map(|offset| UniformSlot { offset })
    }

    fn set_uniform(&mut self, program: &WgpuProgram, location: &UniformSlot, value: UniformValue) {
        self.queue.write_buffer(
            &program.uniform_buffer,
            u64::from(location.offset),
            &value.to_bytes(),
        );
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.reconfigure(width, height);
    }

    fn draw_strip(
        &mut self,
        program: &WgpuProgram,
        buffer: &WgpuBuffer,
        vertex_count: u32,
    ) -> Result<(), HostError> {
        let frame = self.surface.get_current_texture().map_err(host_error)?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("hexfield frame"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("hexfield pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let width = self.viewport.0.min(self.config.width) as f32;
            let height = self.viewport.1.min(self.config.height) as f32;
            render_pass.set_viewport(0.0, 0.0, width, height, 0.0, 1.0);
            render_pass.set_pipeline(&program.pipeline);
            render_pass.set_bind_group(0, &program.bind_group, &[]);
            render_pass.set_vertex_buffer(0, buffer.buffer.slice(..));
            render_pass.draw(0..vertex_count, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: WgpuBuffer) -> Result<(), HostError> {
        buffer.buffer.destroy();
        Ok(())
    }

    fn delete_shader(&mut self, shader: WgpuShader) -> Result<(), HostError> {
        drop(shader);
        Ok(())
    }

    fn delete_program(&mut self, program: WgpuProgram) -> Result<(), HostError> {
        program.uniform_buffer.destroy();
        Ok(())
    }
}
