use super::{DrawRect, LineCap, LineJoin, Surface};
use crate::VisualizationConfig;

const AMPLITUDE_SCALE: f32 = 0.4;
const MIDLINE: f32 = 128.0;

/// How many samples the waveform visits and how far apart they are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleLayout {
    pub max_points: usize,
    pub stride: usize,
    pub step_x: f32,
}

impl SampleLayout {
    /// At most two points per horizontal unit, never more than there are
    /// samples and never fewer than one.
    pub fn new(len: usize, draw_width: f32) -> Self {
        let width_points = (draw_width.max(0.0) * 2.0) as usize;
        let max_points = len.min(width_points).max(1);
        let stride = (len / max_points).max(1);
        Self {
            max_points,
            stride,
            step_x: draw_width / max_points as f32,
        }
    }
}

/// Strokes the time-domain snapshot as one continuous path.
///
/// Returns the number of vertices in the path.
pub fn draw_waveform<S: Surface + ?Sized>(
    surface: &mut S,
    samples: &[u8],
    area: DrawRect,
    config: &VisualizationConfig,
) -> usize {
    surface.begin_path();
    surface.set_line_width(config.thickness());
    surface.set_line_cap(LineCap::Round);
    surface.set_line_join(LineJoin::Round);
    surface.set_stroke_style(config.color());

    let layout = SampleLayout::new(samples.len(), area.width);
    let center_y = area.y + area.height / 2.0;
    let amplitude = area.height * config.multiplier() * AMPLITUDE_SCALE;
    let right = area.right();
    let mut x = area.x + config.x_offset();
    let mut points = 0;

    for sample in samples.iter().step_by(layout.stride).take(layout.max_points) {
        if x > right {
            break;
        }

        let y = center_y + (f32::from(*sample) - MIDLINE) / MIDLINE * amplitude + config.y_offset();
        if points == 0 {
            surface.move_to(x, y);
        } else {
            surface.line_to(x, y);
        }
        points += 1;
        x += layout.step_x;
    }

    surface.stroke();
    points
}
