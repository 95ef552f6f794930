use tracing::{debug, error, warn};

use crate::error::{BootstrapError, HostError};
use crate::host::{GraphicsContext, ShaderStage, Surface, UniformValue};
use crate::shader::{ShaderSources, RESOLUTION_UNIFORM, TIME_UNIFORM};

/// Full clip-space square as a four vertex triangle strip.
pub const QUAD_VERTICES: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]];

struct Resources<C: GraphicsContext> {
    vertex: C::Shader,
    fragment: C::Shader,
    program: C::Program,
    quad: C::Buffer,
}

/// Uniform handles resolved once after linking. `None` means the program
/// does not expose the uniform and writes to it are dropped.
#[derive(Debug, Clone)]
pub struct UniformHandles<L> {
    pub resolution: Option<L>,
    pub time: Option<L>,
}

/// A linked program, its quad, and the uniforms that drive it.
///
/// Resources are released by [`RenderContext::teardown`] or, failing that,
/// when the value is dropped.
pub struct RenderContext<C: GraphicsContext> {
    context: C,
    resources: Option<Resources<C>>,
    uniforms: UniformHandles<C::UniformLocation>,
    resolution: (u32, u32),
}

impl<C: GraphicsContext> RenderContext<C> {
    /// Acquires a context from `surface`, compiles and links both stages,
    /// uploads the quad and resolves the uniforms.
    ///
    /// Nothing created along the way outlives a failure.
    pub fn bootstrap<S>(surface: &mut S, sources: &ShaderSources) -> Result<Self, BootstrapError>
    where
        S: Surface<Context = C>,
    {
        let mut context = surface
            .acquire_context()
            .map_err(|err| BootstrapError::ContextUnavailable(err.to_string()))?;
        debug!("acquired graphics context");

        let vertex = compile(&mut context, ShaderStage::Vertex, &sources.vertex)?;
        let fragment = match compile(&mut context, ShaderStage::Fragment, &sources.fragment) {
            Ok(fragment) => fragment,
            Err(err) => {
                release(context.delete_shader(vertex), "vertex shader");
                return Err(err);
            }
        };

        let program = match context.link_program(&vertex, &fragment) {
            Ok(program) => program,
            Err(diagnostics) => {
                error!(%diagnostics, "shader program failed to link");
                release(context.delete_shader(vertex), "vertex shader");
                release(context.delete_shader(fragment), "fragment shader");
                return Err(BootstrapError::ProgramLink { diagnostics });
            }
        };
        debug!("linked shader program");

        let quad = match context.upload_vertices(&QUAD_VERTICES) {
            Ok(quad) => quad,
            Err(err) => {
                release(context.delete_program(program), "program");
                release(context.delete_shader(vertex), "vertex shader");
                release(context.delete_shader(fragment), "fragment shader");
                return Err(BootstrapError::VertexUpload(err));
            }
        };

        let uniforms = UniformHandles {
            resolution: context.uniform_location(&program, RESOLUTION_UNIFORM),
            time: context.uniform_location(&program, TIME_UNIFORM),
        };
        if uniforms.resolution.is_none() {
            debug!(uniform = RESOLUTION_UNIFORM, "uniform not active; writes will be dropped");
        }
        if uniforms.time.is_none() {
            debug!(uniform = TIME_UNIFORM, "uniform not active; writes will be dropped");
        }

        Ok(Self {
            context,
            resources: Some(Resources {
                vertex,
                fragment,
                program,
                quad,
            }),
            uniforms,
            resolution: (0, 0),
        })
    }

    /// Updates the viewport and the `resolution` uniform. Zero sizes are
    /// clamped to one pixel.
    pub fn resize(&mut self, width: u32, height: u32) {
        let Some(resources) = self.resources.as_ref() else {
            return;
        };
        let (width, height) = (width.max(1), height.max(1));
        self.resolution = (width, height);
        self.context.set_viewport(width, height);
        if let Some(location) = self.uniforms.resolution.as_ref() {
            self.context.set_uniform(
                &resources.program,
                location,
                UniformValue::Vec2([width as f32, height as f32]),
            );
        }
    }

    pub fn set_time(&mut self, seconds: f32) {
        let Some(resources) = self.resources.as_ref() else {
            return;
        };
        if let Some(location) = self.uniforms.time.as_ref() {
            self.context
                .set_uniform(&resources.program, location, UniformValue::Float(seconds));
        }
    }

    /// Issues one draw of the quad. Does nothing after teardown.
    pub fn draw(&mut self) -> Result<(), HostError> {
        match self.resources.as_ref() {
            Some(resources) => self.context.draw_strip(
                &resources.program,
                &resources.quad,
                QUAD_VERTICES.len() as u32,
            ),
            None => Ok(()),
        }
    }

    /// Last size passed to [`RenderContext::resize`], `(0, 0)` before the first.
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn uniforms(&self) -> &UniformHandles<C::UniformLocation> {
        &self.uniforms
    }

    pub fn is_torn_down(&self) -> bool {
        self.resources.is_none()
    }

    /// Releases the quad, both shaders and the program.
    ///
    /// Every release is attempted; failures are logged and returned rather
    /// than propagated. Calling this again is a no-op.
    pub fn teardown(&mut self) -> Vec<HostError> {
        let Some(resources) = self.resources.take() else {
            return Vec::new();
        };
        let results = [
            (self.context.delete_buffer(resources.quad), "vertex buffer"),
            (self.context.delete_shader(resources.vertex), "vertex shader"),
            (
                self.context.delete_shader(resources.fragment),
                "fragment shader",
            ),
            (self.context.delete_program(resources.program), "program"),
        ];
        let failures: Vec<HostError> = results
            .into_iter()
            .filter_map(|(result, what)| {
                result
                    .map_err(|err| {
                        warn!(resource = what, error = %err, "failed to release GPU resource");
                        err
                    })
                    .err()
            })
            .collect();
        debug!(failures = failures.len(), "render context torn down");
        failures
    }
}

impl<C: GraphicsContext> Drop for RenderContext<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn compile<C: GraphicsContext>(
    context: &mut C,
    stage: ShaderStage,
    source: &str,
) -> Result<C::Shader, BootstrapError> {
    context.compile_shader(stage, source).map_err(|diagnostics| {
        error!(%stage, %diagnostics, "shader failed to compile");
        BootstrapError::ShaderCompile { stage, diagnostics }
    })
}

fn release(result: Result<(), HostError>, what: &'static str) {
    if let Err(err) = result {
        warn!(resource = what, error = %err, "failed to release GPU resource");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::host::{FrameToken, ListenerToken};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Compile(ShaderStage),
        Link,
        Upload(usize),
        Viewport(u32, u32),
        Uniform(&'static str, UniformValue),
        Draw(u32),
        DeleteBuffer,
        DeleteShader(ShaderStage),
        DeleteProgram,
        RequestFrame(FrameToken),
        CancelFrame(FrameToken),
        AddListener(ListenerToken),
        RemoveListener(ListenerToken),
    }

    #[derive(Default)]
    pub(crate) struct Script {
        pub no_context: bool,
        pub fail_stage: Option<ShaderStage>,
        pub fail_link: bool,
        pub fail_upload: bool,
        pub fail_delete_buffer: bool,
        pub fail_cancel: bool,
        pub missing_time: bool,
    }

    pub(crate) type Log = Rc<RefCell<Vec<Call>>>;

    pub(crate) struct FakeContext {
        log: Log,
        script: Rc<Script>,
    }

    impl FakeContext {
        fn record(&self, call: Call) {
            self.log.borrow_mut().push(call);
        }
    }

    impl GraphicsContext for FakeContext {
        type Shader = ShaderStage;
        type Program = ();
        type Buffer = usize;
        type UniformLocation = &'static str;

        fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderStage, String> {
            self.record(Call::Compile(stage));
            if self.script.fail_stage == Some(stage) || source.contains("syntax error") {
                return Err(format!("0:1: {stage} syntax error"));
            }
            Ok(stage)
        }

        fn link_program(&mut self, _: &ShaderStage, _: &ShaderStage) -> Result<(), String> {
            self.record(Call::Link);
            if self.script.fail_link {
                return Err("varying mismatch".into());
            }
            Ok(())
        }

        fn upload_vertices(&mut self, vertices: &[[f32; 2]]) -> Result<usize, HostError> {
            self.record(Call::Upload(vertices.len()));
            if self.script.fail_upload {
                return Err(HostError::OutOfMemory);
            }
            Ok(vertices.len())
        }

        fn uniform_location(&self, _: &(), name: &str) -> Option<&'static str> {
            match name {
                RESOLUTION_UNIFORM => Some(RESOLUTION_UNIFORM),
                TIME_UNIFORM if !self.script.missing_time => Some(TIME_UNIFORM),
                _ => None,
            }
        }

        fn set_uniform(&mut self, _: &(), location: &&'static str, value: UniformValue) {
            self.record(Call::Uniform(*location, value));
        }

        fn set_viewport(&mut self, width: u32, height: u32) {
            self.record(Call::Viewport(width, height));
        }

        fn draw_strip(&mut self, _: &(), _: &usize, vertex_count: u32) -> Result<(), HostError> {
            self.record(Call::Draw(vertex_count));
            Ok(())
        }

        fn delete_buffer(&mut self, _: usize) -> Result<(), HostError> {
            self.record(Call::DeleteBuffer);
            if self.script.fail_delete_buffer {
                return Err(HostError::AlreadyReleased("vertex buffer"));
            }
            Ok(())
        }

        fn delete_shader(&mut self, shader: ShaderStage) -> Result<(), HostError> {
            self.record(Call::DeleteShader(shader));
            Ok(())
        }

        fn delete_program(&mut self, _: ()) -> Result<(), HostError> {
            self.record(Call::DeleteProgram);
            Ok(())
        }
    }

    pub(crate) struct FakeSurface {
        pub log: Log,
        script: Rc<Script>,
        pub size: (u32, u32),
        next_token: u64,
    }

    impl FakeSurface {
        pub(crate) fn new(script: Script) -> Self {
            Self {
                log: Rc::default(),
                script: Rc::new(script),
                size: (800, 600),
                next_token: 0,
            }
        }

        fn record(&self, call: Call) {
            self.log.borrow_mut().push(call);
        }
    }

    impl Surface for FakeSurface {
        type Context = FakeContext;

        fn acquire_context(&mut self) -> Result<FakeContext, HostError> {
            if self.script.no_context {
                return Err(HostError::Backend("no adapter".into()));
            }
            Ok(FakeContext {
                log: self.log.clone(),
                script: self.script.clone(),
            })
        }

        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn request_frame(&mut self) -> FrameToken {
            self.next_token += 1;
            let token = FrameToken(self.next_token);
            self.record(Call::RequestFrame(token));
            token
        }

        fn cancel_frame(&mut self, token: FrameToken) -> Result<(), HostError> {
            self.record(Call::CancelFrame(token));
            if self.script.fail_cancel {
                return Err(HostError::Backend("cancel rejected".into()));
            }
            Ok(())
        }

        fn add_resize_listener(&mut self) -> ListenerToken {
            let token = ListenerToken(7);
            self.record(Call::AddListener(token));
            token
        }

        fn remove_resize_listener(&mut self, token: ListenerToken) -> Result<(), HostError> {
            self.record(Call::RemoveListener(token));
            Ok(())
        }
    }

    fn calls(log: &Log) -> Vec<Call> {
        log.borrow().clone()
    }

    #[test]
    fn bootstrap_compiles_links_and_uploads_quad() {
        let mut surface = FakeSurface::new(Script::default());
        let context = RenderContext::bootstrap(&mut surface, &ShaderSources::bundled()).unwrap();
        assert_eq!(
            calls(&surface.log),
            vec![
                Call::Compile(ShaderStage::Vertex),
                Call::Compile(ShaderStage::Fragment),
                Call::Link,
                Call::Upload(4),
            ]
        );
        assert!(context.uniforms().resolution.is_some());
        assert!(context.uniforms().time.is_some());
    }

    #[test]
    fn missing_context_is_reported() {
        let mut surface = FakeSurface::new(Script {
            no_context: true,
            ..Script::default()
        });
        let err = RenderContext::bootstrap(&mut surface, &ShaderSources::bundled())
            .err()
            .unwrap();
        assert!(matches!(err, BootstrapError::ContextUnavailable(_)));
        assert!(calls(&surface.log).is_empty());
    }

    #[test]
    fn fragment_failure_releases_vertex_stage_and_skips_link() {
        let mut surface = FakeSurface::new(Script {
            fail_stage: Some(ShaderStage::Fragment),
            ..Script::default()
        });
        let err = RenderContext::bootstrap(&mut surface, &ShaderSources::bundled())
            .err()
            .unwrap();
        match err {
            BootstrapError::ShaderCompile { stage, diagnostics } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(diagnostics.contains("syntax error"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        let log = calls(&surface.log);
        assert!(!log.contains(&Call::Link));
        assert_eq!(log.last(), Some(&Call::DeleteShader(ShaderStage::Vertex)));
    }

    #[test]
    fn link_failure_releases_both_stages() {
        let mut surface = FakeSurface::new(Script {
            fail_link: true,
            ..Script::default()
        });
        let err = RenderContext::bootstrap(&mut surface, &ShaderSources::bundled())
            .err()
            .unwrap();
        assert!(matches!(err, BootstrapError::ProgramLink { .. }));
        let log = calls(&surface.log);
        assert!(log.contains(&Call::DeleteShader(ShaderStage::Vertex)));
        assert!(log.contains(&Call::DeleteShader(ShaderStage::Fragment)));
        assert!(!log.iter().any(|call| matches!(call, Call::Upload(_))));
    }

    #[test]
    fn upload_failure_releases_program() {
        let mut surface = FakeSurface::new(Script {
            fail_upload: true,
            ..Script::default()
        });
        let err = RenderContext::bootstrap(&mut surface, &ShaderSources::bundled())
            .err()
            .unwrap();
        assert!(matches!(err, BootstrapError::VertexUpload(HostError::OutOfMemory)));
        assert!(calls(&surface.log).contains(&Call::DeleteProgram));
    }

    #[test]
    fn resize_sets_viewport_and_resolution() {
        let mut surface = FakeSurface::new(Script::default());
        let mut context = RenderContext::bootstrap(&mut surface, &ShaderSources::bundled()).unwrap();
        surface.log.borrow_mut().clear();
        context.resize(0, 720);
        assert_eq!(context.resolution(), (1, 720));
        assert_eq!(
            calls(&surface.log),
            vec![
                Call::Viewport(1, 720),
                Call::Uniform(RESOLUTION_UNIFORM, UniformValue::Vec2([1.0, 720.0])),
            ]
        );
    }

    #[test]
    fn writes_to_missing_uniform_are_dropped() {
        let mut surface = FakeSurface::new(Script {
            missing_time: true,
            ..Script::default()
        });
        let mut context = RenderContext::bootstrap(&mut surface, &ShaderSources::bundled()).unwrap();
        surface.log.borrow_mut().clear();
        context.set_time(1.5);
        context.draw().unwrap();
        assert_eq!(calls(&surface.log), vec![Call::Draw(4)]);
    }

    #[test]
    fn teardown_is_idempotent_and_best_effort() {
        let mut surface = FakeSurface::new(Script {
            fail_delete_buffer: true,
            ..Script::default()
        });
        let mut context = RenderContext::bootstrap(&mut surface, &ShaderSources::bundled()).unwrap();
        surface.log.borrow_mut().clear();

        let failures = context.teardown();
        assert_eq!(failures, vec![HostError::AlreadyReleased("vertex buffer")]);
        assert_eq!(
            calls(&surface.log),
            vec![
                Call::DeleteBuffer,
                Call::DeleteShader(ShaderStage::Vertex),
                Call::DeleteShader(ShaderStage::Fragment),
                Call::DeleteProgram,
            ]
        );

        assert!(context.teardown().is_empty());
        context.set_time(2.0);
        context.resize(640, 480);
        context.draw().unwrap();
        drop(context);
        assert_eq!(calls(&surface.log).len(), 4);
    }

    #[test]
    fn dropping_releases_resources() {
        let mut surface = FakeSurface::new(Script::default());
        let context = RenderContext::bootstrap(&mut surface, &ShaderSources::bundled()).unwrap();
        drop(context);
        assert!(calls(&surface.log).contains(&Call::DeleteProgram));
    }
}
