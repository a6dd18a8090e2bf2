//
// cli.rs
// MedView-rs
//
// Defines the CLI surface with Clap, opens volumes through the background loader and dispatches commands.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dicom_pixeldata::WindowLevel;
use serde::Serialize;
use tracing::Level;

use crate::colormap::Colormap;
use crate::loader::{self, LoadOptions, LoadRequest};
use crate::normalization::{WindowPreset, WINDOW_PRESETS};
use crate::render::{export_png, render_slice, DisplaySettings};
use crate::stats;
use crate::volume::cache::DEFAULT_CACHE_CAPACITY;
use crate::volume::{SliceAxis, Volume, VolumeMetadata};

/// Command-line front-end over the volume models: inspect, render and measure slices.
#[derive(Parser)]
#[command(name = "medview")]
#[command(about = "Visualizador de volumes médicos (DICOM e NIfTI)", long_about = None)]
pub struct Cli {
    /// Log verbosity (written to stderr)
    #[arg(long, value_enum, default_value_t = LogLevel::Warn, global = true)]
    pub log_level: LogLevel,
    /// Decoded DICOM slices kept in memory
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, global = true)]
    pub cache_size: usize,
    #[command(subcommand)]
    pub command: Commands,
}

/// Exactly one of a DICOM series directory or a NIfTI file.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Directory holding one DICOM file per slice
    #[arg(short, long)]
    pub directory: Option<PathBuf>,
    /// NIfTI image (.nii or .nii.gz)
    #[arg(short, long)]
    pub image: Option<PathBuf>,
}

impl SourceArgs {
    pub fn request(&self) -> anyhow::Result<LoadRequest> {
        match (&self.directory, &self.image) {
            (Some(dir), None) => Ok(LoadRequest::DicomDirectory(dir.clone())),
            (None, Some(file)) => Ok(LoadRequest::NiftiFile(file.clone())),
            _ => Err(anyhow!("Provide either --directory or --image")),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print volume metadata and slice counts
    Info {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        json: bool,
    },
    /// Render one slice to a PNG file
    Render {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = AxisArg::Axial)]
        axis: AxisArg,
        /// Slice index (defaults to the middle slice)
        #[arg(long)]
        index: Option<usize>,
        /// Named window (brain, bone, lung, abdomen, soft-tissue)
        #[arg(long, conflicts_with_all = ["window_center", "window_width"])]
        preset: Option<WindowPreset>,
        #[arg(long, allow_negative_numbers = true)]
        window_center: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        window_width: Option<f64>,
        #[arg(long, default_value = "gray")]
        colormap: Colormap,
        #[arg(long, requires = "max_height", allow_negative_numbers = true)]
        max_width: Option<i64>,
        #[arg(long, requires = "max_width", allow_negative_numbers = true)]
        max_height: Option<i64>,
    },
    /// Intensity statistics and histogram of one slice
    Stats {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, value_enum, default_value_t = AxisArg::Axial)]
        axis: AxisArg,
        #[arg(long)]
        index: Option<usize>,
        #[arg(
            long,
            default_value_t = 16,
            value_parser = clap::value_parser!(u32).range(1..=stats::MAX_HISTOGRAM_BINS as i64)
        )]
        bins: u32,
        #[arg(long)]
        json: bool,
    },
    /// List the named window presets
    Presets,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum AxisArg {
    Sagittal,
    Coronal,
    Axial,
}

impl From<AxisArg> for SliceAxis {
    fn from(value: AxisArg) -> Self {
        match value {
            AxisArg::Sagittal => SliceAxis::Sagittal,
            AxisArg::Coronal => SliceAxis::Coronal,
            AxisArg::Axial => SliceAxis::Axial,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

pub fn init_logging(level: LogLevel) {
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::from(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub async fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once, set up logging, then dispatch.
    let cli = Cli::parse();
    init_logging(cli.log_level);
    execute(cli).await
}

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let options = LoadOptions {
        cache_capacity: cli.cache_size,
    };

    match cli.command {
        Commands::Info { source, json } => {
            let mut volume = open_volume(&source, options).await?;
            let report = info_report(&source, volume.as_mut())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_info(&report);
            }
        }
        Commands::Render {
            source,
            output,
            axis,
            index,
            preset,
            window_center,
            window_width,
            colormap,
            max_width,
            max_height,
        } => {
            let explicit = match preset {
                Some(preset) => Some(preset.window()),
                None => parse_window(window_center, window_width)?,
            };
            let mut volume = open_volume(&source, options).await?;
            let axis = SliceAxis::from(axis);
            let index = resolve_index(volume.as_ref(), axis, index)?;
            let slice = volume.get_slice(axis, index)?;

            // DICOM falls back to the window stored in the tags, NIfTI to min-max.
            let settings = DisplaySettings {
                window: explicit.or_else(|| volume.default_window()),
                colormap,
                fit: max_width.zip(max_height),
            };
            let image = render_slice(&slice.view(), &settings);
            export_png(&image, &output)?;
            println!(
                "Slice {} ({}) saved to {:?} [{}x{}]",
                index,
                axis,
                output,
                image.width(),
                image.height()
            );
        }
        Commands::Stats {
            source,
            axis,
            index,
            bins,
            json,
        } => {
            let mut volume = open_volume(&source, options).await?;
            let axis = SliceAxis::from(axis);
            let index = resolve_index(volume.as_ref(), axis, index)?;
            let slice = volume.get_slice(axis, index)?;

            let report = StatsReport {
                axis,
                index,
                statistics: stats::compute_stats(&slice),
                histogram: stats::histogram(&slice, bins as usize),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_stats(&report);
            }
        }
        Commands::Presets => {
            for (preset, center, width) in WINDOW_PRESETS {
                println!("{:<12} center {:>6} width {:>6}", preset.name(), center, width);
            }
        }
    }

    Ok(())
}

async fn open_volume(source: &SourceArgs, options: LoadOptions) -> anyhow::Result<Box<dyn Volume>> {
    let request = source.request()?;
    let path = request.path().to_path_buf();
    loader::load(request, options)
        .await
        .with_context(|| format!("Failed to load {:?}", path))
}

/// Requested index, or the middle slice of `axis`.
fn resolve_index(volume: &dyn Volume, axis: SliceAxis, index: Option<usize>) -> anyhow::Result<usize> {
    let count = volume.slice_count(axis);
    if count == 0 {
        bail!("Volume has no slices along the {} axis", axis);
    }
    Ok(index.unwrap_or(count / 2))
}

fn parse_window(center: Option<f64>, width: Option<f64>) -> anyhow::Result<Option<WindowLevel>> {
    // Window requires both center and width to make sense; reject mismatched input early.
    match (center, width) {
        (Some(c), Some(w)) => Ok(Some(WindowLevel {
            center: c,
            width: w,
        })),
        (None, None) => Ok(None),
        _ => Err(anyhow!(
            "Provide both --window-center and --window-width, or neither"
        )),
    }
}

#[derive(Debug, Serialize)]
struct SliceCounts {
    sagittal: usize,
    coronal: usize,
    axial: usize,
}

#[derive(Debug, Serialize)]
struct InfoReport {
    source: PathBuf,
    slices: SliceCounts,
    metadata: VolumeMetadata,
}

fn info_report(source: &SourceArgs, volume: &mut dyn Volume) -> anyhow::Result<InfoReport> {
    // DICOM metadata describes the current slice, so show the one a viewer would open on.
    let axis = volume.primary_axis();
    let index = resolve_index(volume, axis, None)?;
    volume.get_slice(axis, index)?;

    Ok(InfoReport {
        source: source.request()?.path().to_path_buf(),
        slices: SliceCounts {
            sagittal: volume.slice_count(SliceAxis::Sagittal),
            coronal: volume.slice_count(SliceAxis::Coronal),
            axial: volume.slice_count(SliceAxis::Axial),
        },
        metadata: volume.metadata(),
    })
}

fn print_info(report: &InfoReport) {
    println!("Source: {:?}", report.source);
    println!(
        "Slices: sagittal {} | coronal {} | axial {}",
        report.slices.sagittal, report.slices.coronal, report.slices.axial
    );
    for (key, value) in report.metadata.entries() {
        println!("  {}: {}", key, value);
    }
}

#[derive(Debug, Serialize)]
struct StatsReport {
    axis: SliceAxis,
    index: usize,
    statistics: Option<stats::SliceStatistics>,
    histogram: stats::Histogram,
}

fn print_stats(report: &StatsReport) {
    println!("Statistics for {} slice {}", report.axis, report.index);
    match &report.statistics {
        Some(s) => {
            println!("  Shape: {:?}", s.shape);
            println!("  Min:   {:.2}", s.min);
            println!("  Max:   {:.2}", s.max);
            println!("  Mean:  {:.2}", s.mean);
            println!("  StdDv: {:.2}", s.std_dev);
        }
        None => println!("  No finite samples"),
    }

    let histogram = &report.histogram;
    println!(
        "Histogram | bins: {} | total pixels: {}",
        histogram.bins.len(),
        histogram.total()
    );
    let width = histogram.bin_width();
    for (idx, (start, count)) in histogram
        .bin_starts()
        .into_iter()
        .zip(histogram.bins.iter())
        .take(16)
        .enumerate()
    {
        println!("  Bin {:03}: [{:.2}, {:.2}] -> {}", idx, start, start + width, count);
    }
    if histogram.bins.len() > 16 {
        println!("  ... {} more bins omitted", histogram.bins.len() - 16);
    }
}
