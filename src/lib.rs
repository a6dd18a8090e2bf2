//
// lib.rs
// MedView-rs
//
// Exposes the volume models, the display pipeline and the CLI entry point for binary and library consumers.
//
// Thales Matheus Mendonça Santos - November 2025

// Display pipeline building blocks.
pub mod colormap;
pub mod normalization;
pub mod render;
pub mod resize;
pub mod stats;

// Volume models and loading.
pub mod dicom_access;
pub mod error;
pub mod loader;
pub mod volume;

pub mod cli;

pub use cli::{run as run_cli, Cli, Commands};
pub use error::{DegenerateInputWarning, LoadError, SliceError};
pub use loader::{spawn_load, LoadEvent, LoadHandle, LoadRequest};
pub use volume::{DicomVolume, NiftiVolume, SliceAxis, Volume, VolumeMetadata};
