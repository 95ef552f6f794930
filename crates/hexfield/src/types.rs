use std::fmt;
use std::str::FromStr;

/// Largest width or height accepted for a surface or still frame. Matches
/// wgpu's default `max_texture_dimension_2d`.
pub const MAX_SURFACE_DIMENSION: u32 = 16384;

/// Which adapter the preview should ask wgpu for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    /// Integrated or otherwise power-saving adapter.
    #[default]
    Low,
    /// Discrete adapter when one is available.
    High,
}

impl fmt::Display for GpuPowerPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuPowerPreference::Low => f.write_str("low"),
            GpuPowerPreference::High => f.write_str("high"),
        }
    }
}

impl FromStr for GpuPowerPreference {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(GpuPowerPreference::Low),
            "high" => Ok(GpuPowerPreference::High),
            other => Err(format!("unknown GPU power preference '{other}' (expected low or high)")),
        }
    }
}

/// Settings for the preview window, resolved from CLI flags and the config
/// file.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Initial window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Optional frame-rate cap; `None` redraws on every refresh.
    pub target_fps: Option<f32>,
    /// Present with vsync (FIFO) when true, prefer immediate presentation otherwise.
    pub vsync: bool,
    pub power: GpuPowerPreference,
    pub title: String,
}

impl Default for RendererConfig {
    /// A 1280x720 vsynced window with no frame cap.
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            target_fps: None,
            vsync: true,
            power: GpuPowerPreference::default(),
            title: "hexfield".to_string(),
        }
    }
}

impl RendererConfig {
    /// Minimum spacing between redraws implied by `target_fps`.
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        self.target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| std::time::Duration::from_secs_f32(1.0 / fps))
    }
}
