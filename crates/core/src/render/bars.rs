use super::{DrawRect, Surface};
use crate::VisualizationConfig;

/// Space left between neighbouring bars.
pub const BAR_GUTTER: f32 = 1.0;
/// Bars at or below this height are not drawn.
pub const MIN_BAR_HEIGHT: f32 = 0.5;
const HEIGHT_SCALE: f32 = 0.5;

/// Height of a single bar for byte magnitude `value`.
pub fn bar_height(value: u8, area_height: f32, multiplier: f32, emphasis: f32) -> f32 {
    f32::from(value) / 255.0 * area_height * multiplier * HEIGHT_SCALE * emphasis
}

/// Adds one rectangle per visible bin to a single path and fills it once.
///
/// Returns the number of rectangles added.
pub fn draw_bars<S: Surface + ?Sized>(
    surface: &mut S,
    magnitudes: &[u8],
    multipliers: &[f32],
    area: DrawRect,
    config: &VisualizationConfig,
) -> usize {
    surface.begin_path();
    surface.set_fill_style(config.color());

    let mut painted = 0;
    let bins = magnitudes.len();
    if bins > 0 {
        let bar_width = area.width / bins as f32 * config.thickness();
        let baseline = area.bottom() + config.y_offset();
        let mut x = area.x + config.x_offset();

        for (value, emphasis) in magnitudes.iter().zip(multipliers) {
            let height = bar_height(*value, area.height, config.multiplier(), *emphasis);
            if height > MIN_BAR_HEIGHT {
                surface.rect(DrawRect::new(x, baseline - height, bar_width, height));
                painted += 1;
            }
            x += bar_width + BAR_GUTTER;
        }
    }

    surface.fill();
    painted
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        mapping::FrequencyMultiplierTable,
        render::{DrawCommand, RecordingSurface},
    };

    fn draw(
        surface: &mut RecordingSurface,
        magnitudes: &[u8],
        config: &VisualizationConfig,
    ) -> usize {
        let mut table = FrequencyMultiplierTable::new();
        let multipliers = table.for_bins(magnitudes.len()).to_vec();
        let area = DrawRect::full(surface);
        draw_bars(surface, magnitudes, &multipliers, area, config)
    }

    #[test]
    fn paints_all_bars_with_a_single_fill() {
        let mut surface = RecordingSurface::new(200.0, 100.0);
        let config = VisualizationConfig::default();
        let magnitudes: Vec<u8> = (0..32).map(|i| 40 + i * 6).collect();

        let painted = draw(&mut surface, &magnitudes, &config);

        assert_eq!(painted, 32);
        assert_eq!(surface.rects().len(), 32);
        assert_eq!(surface.fill_count(), 1);
        assert!(matches!(surface.commands().last(), Some(DrawCommand::Fill { .. })));
    }

    #[test]
    fn skips_bars_too_short_to_see() {
        let mut surface = RecordingSurface::new(64.0, 10.0);
        let config = VisualizationConfig::default();
        // 10 * 0.5 * 1.5 / 255 per step: a value of 1 stays below half a unit.
        let magnitudes = [0, 1, 0, 255];

        let painted = draw(&mut surface, &magnitudes, &config);

        assert_eq!(painted, 1);
        assert_eq!(surface.fill_count(), 1);
    }

    #[test]
    fn geometry_follows_width_thickness_and_offsets() {
        let mut surface = RecordingSurface::new(100.0, 50.0);
        let mut config = VisualizationConfig::default();
        config.set_thickness(0.5);
        config.set_x_offset(3.0);
        config.set_y_offset(-4.0);

        draw(&mut surface, &[255; 10], &config);

        let rects = surface.rects();
        assert_eq!(rects.len(), 10);
        let first = rects[0];
        assert_relative_eq!(first.width, 5.0);
        assert_relative_eq!(first.x, 3.0);
        assert_relative_eq!(first.height, 50.0 * 0.5 * 1.5);
        assert_relative_eq!(first.y + first.height, 46.0);
        assert_relative_eq!(rects[1].x, 3.0 + 5.0 + BAR_GUTTER);
        assert_relative_eq!(rects[9].height, 50.0 * 0.5 * 2.5);
    }

    #[test]
    fn bar_height_is_monotonic_in_value() {
        let mut previous = 0.0;
        for value in 0..=255u8 {
            let height = bar_height(value, 120.0, 1.3, 2.2);
            assert!(height >= previous);
            previous = height;
        }
    }

    #[test]
    fn empty_snapshot_still_fills_once() {
        let mut surface = RecordingSurface::new(10.0, 10.0);
        let painted = draw(&mut surface, &[], &VisualizationConfig::default());
        assert_eq!(painted, 0);
        assert_eq!(surface.fill_count(), 1);
    }
}
