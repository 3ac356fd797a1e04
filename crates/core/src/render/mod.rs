//! Drawing surface abstraction and the two frame renderers.

pub mod bars;
pub mod oscilloscope;
pub mod recording;

use serde::{Deserialize, Serialize};

use crate::{
    analysis::SignalTap, config::VisualizationMode, mapping::FrequencyMultiplierTable, Analyser,
    Result, VisualizationConfig,
};

pub use recording::{DrawCommand, RecordingSurface};

/// Axis-aligned rectangle in surface units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DrawRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DrawRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering the whole of `surface`.
    pub fn full<S: Surface + ?Sized>(surface: &S) -> Self {
        Self::new(0.0, 0.0, surface.width(), surface.height())
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// 2D drawing surface with a canvas-style immediate path API.
pub trait Surface {
    fn width(&self) -> f32;
    fn height(&self) -> f32;
    fn set_size(&mut self, width: f32, height: f32);

    /// Surfaces that cannot clear a region are rejected at construction.
    fn supports_clear_rect(&self) -> bool {
        true
    }

    fn clear_rect(&mut self, rect: DrawRect);

    /// Discards the current path and starts a new one.
    fn begin_path(&mut self);
    fn rect(&mut self, rect: DrawRect);
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn fill(&mut self);
    fn stroke(&mut self);

    fn set_fill_style(&mut self, color: &str);
    fn set_stroke_style(&mut self, color: &str);
    fn set_line_width(&mut self, width: f32);
    fn set_line_cap(&mut self, cap: LineCap);
    fn set_line_join(&mut self, join: LineJoin);
}

/// Outcome of painting one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub mode: VisualizationMode,
    /// Bars added to the fill path (bars mode).
    pub bars: usize,
    /// Vertices in the stroked path (oscilloscope mode).
    pub points: usize,
}

/// Per-frame render pipeline: pulls a snapshot into persisted buffers and
/// hands it to the renderer selected by the current mode.
#[derive(Debug, Default)]
pub struct RenderGraph {
    tap: SignalTap,
    multipliers: FrequencyMultiplierTable,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        analyser: &mut dyn Analyser,
        area: DrawRect,
        config: &VisualizationConfig,
    ) -> Result<FrameStats> {
        let mode = config.mode();
        match mode {
            VisualizationMode::Bars => {
                let magnitudes = self.tap.frequency_snapshot(analyser)?;
                let multipliers = self.multipliers.for_bins(magnitudes.len());
                let bars = bars::draw_bars(surface, magnitudes, multipliers, area, config);
                Ok(FrameStats {
                    mode,
                    bars,
                    points: 0,
                })
            }
            VisualizationMode::Oscilloscope => {
                let samples = self.tap.time_domain_snapshot(analyser)?;
                let points = oscilloscope::draw_waveform(surface, samples, area, config);
                Ok(FrameStats {
                    mode,
                    bars: 0,
                    points,
                })
            }
        }
    }

    pub fn tap(&self) -> &SignalTap {
        &self.tap
    }

    pub fn multipliers(&self) -> &FrequencyMultiplierTable {
        &self.multipliers
    }

    /// Drops snapshot buffers and the derived cache.
    pub fn release(&mut self) {
        self.tap.release();
        self.multipliers.release();
    }
}
