use crate::host::ShaderStage;

/// Reasons the render context could not be brought up.
///
/// Every variant is terminal for the surface it was raised against: the
/// caller renders nothing and does not retry.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("graphics context unavailable: {0}")]
    ContextUnavailable(String),
    #[error("failed to compile {stage} shader:\n{diagnostics}")]
    ShaderCompile {
        stage: ShaderStage,
        diagnostics: String,
    },
    #[error("failed to link shader program:\n{diagnostics}")]
    ProgramLink { diagnostics: String },
    #[error("failed to upload vertex data: {0}")]
    VertexUpload(#[source] HostError),
}

/// Failures reported by the host surface while rendering or releasing
/// resources.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("surface lost or outdated")]
    SurfaceLost,
    #[error("surface out of memory")]
    OutOfMemory,
    #[error("surface timed out acquiring a frame")]
    Timeout,
    #[error("resource already released: {0}")]
    AlreadyReleased(&'static str),
    #[error("{0}")]
    Backend(String),
}
