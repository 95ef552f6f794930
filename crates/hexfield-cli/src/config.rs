use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hexfield::{GpuPowerPreference, RendererConfig, MAX_SURFACE_DIMENSION};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::cli::{parse_surface_size, RunArgs, StillArgs};

const DEFAULT_STILL_SIZE: (u32, u32) = (1920, 1080);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings read from `hexfield.toml`. Every key is optional; CLI flags win.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub window: WindowSection,
    pub still: StillSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSection {
    #[serde(deserialize_with = "deserialize_size_opt")]
    pub size: Option<(u32, u32)>,
    pub fps: Option<f32>,
    pub vsync: Option<bool>,
    #[serde(deserialize_with = "deserialize_power_opt")]
    pub gpu_power: Option<GpuPowerPreference>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StillSection {
    #[serde(deserialize_with = "deserialize_duration_opt")]
    pub time: Option<Duration>,
    #[serde(deserialize_with = "deserialize_size_opt")]
    pub size: Option<(u32, u32)>,
}

/// Fully resolved still-export request.
#[derive(Debug, Clone, PartialEq)]
pub struct StillPlan {
    pub size: (u32, u32),
    pub time: Duration,
    pub output: PathBuf,
}

impl FileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: FileConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, returning defaults when the file does not exist.
    pub fn load_optional(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Loads `path`, which must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(fps) = self.window.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "window.fps must be a non-negative number, got {fps}"
                )));
            }
        }
        for (key, size) in [("window.size", self.window.size), ("still.size", self.still.size)] {
            if let Some((width, height)) = size {
                let in_range = |value: u32| (1..=MAX_SURFACE_DIMENSION).contains(&value);
                if !in_range(width) || !in_range(height) {
                    return Err(ConfigError::Invalid(format!(
                        "{key} must be between 1x1 and {MAX_SURFACE_DIMENSION}x{MAX_SURFACE_DIMENSION}, got {width}x{height}"
                    )));
                }
            }
        }
        if matches!(self.window.title.as_deref(), Some(title) if title.trim().is_empty()) {
            return Err(ConfigError::Invalid("window.title must not be empty".into()));
        }
        Ok(())
    }

    /// Merges preview flags over the file's `[window]` section.
    pub fn renderer_config(&self, args: &RunArgs) -> RendererConfig {
        let defaults = RendererConfig::default();
        let target_fps = args
            .fps
            .or(self.window.fps)
            .filter(|fps| *fps > 0.0);
        RendererConfig {
            surface_size: args
                .size
                .or(self.window.size)
                .unwrap_or(defaults.surface_size),
            target_fps,
            vsync: args.vsync.or(self.window.vsync).unwrap_or(defaults.vsync),
            power: args
                .gpu_power
                .or(self.window.gpu_power)
                .unwrap_or(defaults.power),
            title: self.window.title.clone().unwrap_or(defaults.title),
        }
    }

    /// Merges `still` flags over the file's `[still]` section.
    pub fn still_plan(&self, args: &StillArgs) -> StillPlan {
        StillPlan {
            size: args
                .size
                .or(self.still.size)
                .unwrap_or(DEFAULT_STILL_SIZE),
            time: args.time.or(self.still.time).unwrap_or(Duration::ZERO),
            output: args.output.clone(),
        }
    }
}

fn deserialize_size_opt<'de, D>(deserializer: D) -> Result<Option<(u32, u32)>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|value| parse_surface_size(&value).map_err(de::Error::custom))
        .transpose()
}

fn deserialize_power_opt<'de, D>(deserializer: D) -> Result<Option<GpuPowerPreference>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|value| value.parse().map_err(de::Error::custom))
        .transpose()
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}
