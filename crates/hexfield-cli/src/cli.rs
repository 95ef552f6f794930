use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hexfield::{GpuPowerPreference, MAX_SURFACE_DIMENSION};

#[derive(Parser, Debug)]
#[command(
    name = "hexfield",
    author,
    version,
    about = "Animated hexagonal shader background",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Read settings from this TOML file instead of the default location.
    #[arg(long, value_name = "FILE", global = true, env = "HEXFIELD_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Preview window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Optional FPS cap for the preview (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Present with vsync (`true`) or prefer immediate presentation (`false`).
    #[arg(long, value_name = "BOOL")]
    pub vsync: Option<bool>,

    /// GPU adapter preference: `low` or `high`.
    #[arg(long, value_name = "low|high", value_parser = parse_gpu_power)]
    pub gpu_power: Option<GpuPowerPreference>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render one frame on the CPU and write it as PNG.
    Still(StillArgs),
    /// Inspect configuration locations.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct StillArgs {
    /// Point in the animation, as seconds (`2.5`) or a duration (`1m 2s`).
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    pub time: Option<Duration>,

    /// Output size (e.g. `1920x1080`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Destination PNG path.
    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration directory and file.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1920x1080".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size".to_string())?;

    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }
    if width > MAX_SURFACE_DIMENSION || height > MAX_SURFACE_DIMENSION {
        return Err(format!(
            "surface dimensions must not exceed {MAX_SURFACE_DIMENSION}x{MAX_SURFACE_DIMENSION}"
        ));
    }

    Ok((width, height))
}

pub fn parse_gpu_power(value: &str) -> Result<GpuPowerPreference, String> {
    value.parse()
}

/// Accepts bare seconds (`2.5`) or anything `humantime` understands (`2s 500ms`).
pub fn parse_time(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time must not be empty".to_string());
    }
    if let Ok(seconds) = trimmed.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(format!("time must be a non-negative number of seconds, got '{trimmed}'"));
        }
        return Ok(Duration::from_secs_f64(seconds));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid time '{trimmed}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_surface_sizes() {
        assert_eq!(parse_surface_size("1920x1080"), Ok((1920, 1080)));
        assert_eq!(parse_surface_size(" 640 X 480 "), Ok((640, 480)));
        assert!(parse_surface_size("1920").is_err());
        assert!(parse_surface_size("0x1080").is_err());
        assert!(parse_surface_size("widexhigh").is_err());
        assert_eq!(parse_surface_size("16384x16384"), Ok((16384, 16384)));
        assert!(parse_surface_size("16385x1").is_err());
        assert!(parse_surface_size("4294967295x4294967295").is_err());
    }

    #[test]
    fn parses_times_as_seconds_or_durations() {
        assert_eq!(parse_time("2.5"), Ok(Duration::from_millis(2500)));
        assert_eq!(parse_time("1m 2s"), Ok(Duration::from_secs(62)));
        assert_eq!(parse_time("750ms"), Ok(Duration::from_millis(750)));
        assert!(parse_time("-1").is_err());
        assert!(parse_time("soon").is_err());
    }

    #[test]
    fn still_subcommand_accepts_global_config() {
        let cli = Cli::try_parse_from([
            "hexfield",
            "still",
            "--time",
            "3s",
            "--output",
            "frame.png",
            "--config",
            "custom.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Some(Command::Still(args)) => {
                assert_eq!(args.time, Some(Duration::from_secs(3)));
                assert_eq!(args.output, PathBuf::from("frame.png"));
                assert_eq!(args.size, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn preview_flags_parse_without_subcommand() {
        let cli = Cli::try_parse_from([
            "hexfield",
            "--size",
            "800x600",
            "--fps",
            "30",
            "--vsync",
            "false",
            "--gpu-power",
            "high",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.size, Some((800, 600)));
        assert_eq!(cli.run.fps, Some(30.0));
        assert_eq!(cli.run.vsync, Some(false));
        assert_eq!(cli.run.gpu_power, Some(GpuPowerPreference::High));
    }
}
