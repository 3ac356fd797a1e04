//! Core library for the Live Visualiser engine.
//!
//! The engine samples a live audio signal through an analyser and paints
//! either a frequency-bar spectrum or an oscilloscope trace onto a 2D drawing
//! surface at a bounded frame rate. Host collaborators (audio graph, drawing
//! surface, frame timing) are expressed as traits so the engine can run
//! against a browser-like host, a native canvas, or the headless software
//! implementations shipped in this crate.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod render;
pub mod timeline;

pub use analysis::{Analyser, SignalTap, SoftwareAnalyser};
pub use audio::{AudioNode, NodeId, PlaybackContext, SoftwareGraph, SoftwareSource, SourceNode};
pub use config::{ConfigOptions, VisualizationConfig, VisualizationMode};
pub use engine::{ConfigurationSnapshot, Visualiser};
pub use error::{Component, Result, VisualiserError};
pub use mapping::FrequencyMultiplierTable;
pub use render::{DrawRect, FrameStats, LineCap, LineJoin, RecordingSurface, RenderGraph, Surface};
pub use timeline::{AnimationState, FrameHandle, FrameScheduler, ManualScheduler};
