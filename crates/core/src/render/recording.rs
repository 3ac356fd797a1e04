use serde::Serialize;

use super::{DrawRect, LineCap, LineJoin, Surface};

/// One call made against a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawCommand {
    Resize { width: f32, height: f32 },
    ClearRect { rect: DrawRect },
    BeginPath,
    Rect { rect: DrawRect },
    MoveTo { x: f32, y: f32 },
    LineTo { x: f32, y: f32 },
    /// Fill of the current path, with the number of shapes it contained.
    Fill { color: String, shapes: usize },
    /// Stroke of the current path, with the number of vertices it contained.
    Stroke { color: String, width: f32, points: usize },
}

/// Paint state carried between calls, mirroring a canvas context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceState {
    pub fill_style: String,
    pub stroke_style: String,
    pub line_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            fill_style: "#000000".to_string(),
            stroke_style: "#000000".to_string(),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
        }
    }
}

/// Headless [`Surface`] that records a serialisable display list.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingSurface {
    width: f32,
    height: f32,
    #[serde(skip)]
    clear_rect: bool,
    state: SurfaceState,
    commands: Vec<DrawCommand>,
    /// Number of segments (rects or vertices) in the current path.
    #[serde(skip)]
    open_path: usize,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            clear_rect: true,
            state: SurfaceState::default(),
            commands: Vec::new(),
            open_path: 0,
        }
    }

    /// A surface that reports no clear-rect support.
    pub fn without_clear_rect(width: f32, height: f32) -> Self {
        Self {
            clear_rect: false,
            ..Self::new(width, height)
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drops recorded commands, keeping paint state and the open path.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    pub fn open_path_len(&self) -> usize {
        self.open_path
    }

    pub fn fill_count(&self) -> usize {
        self.count(|command| matches!(command, DrawCommand::Fill { .. }))
    }

    pub fn stroke_count(&self) -> usize {
        self.count(|command| matches!(command, DrawCommand::Stroke { .. }))
    }

    pub fn clear_count(&self) -> usize {
        self.count(|command| matches!(command, DrawCommand::ClearRect { .. }))
    }

    pub fn rects(&self) -> Vec<DrawRect> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Rect { rect } => Some(*rect),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|command| predicate(*command)).count()
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn set_size(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        // Resizing a canvas resets its context.
        self.state = SurfaceState::default();
        self.open_path = 0;
        self.commands.push(DrawCommand::Resize { width, height });
    }

    fn supports_clear_rect(&self) -> bool {
        self.clear_rect
    }

    fn clear_rect(&mut self, rect: DrawRect) {
        self.commands.push(DrawCommand::ClearRect { rect });
    }

    fn begin_path(&mut self) {
        self.open_path = 0;
        self.commands.push(DrawCommand::BeginPath);
    }

    fn rect(&mut self, rect: DrawRect) {
        self.open_path += 1;
        self.commands.push(DrawCommand::Rect { rect });
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.open_path += 1;
        self.commands.push(DrawCommand::MoveTo { x, y });
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.open_path += 1;
        self.commands.push(DrawCommand::LineTo { x, y });
    }

    fn fill(&mut self) {
        self.commands.push(DrawCommand::Fill {
            color: self.state.fill_style.clone(),
            shapes: self.open_path,
        });
    }

    fn stroke(&mut self) {
        self.commands.push(DrawCommand::Stroke {
            color: self.state.stroke_style.clone(),
            width: self.state.line_width,
            points: self.open_path,
        });
    }

    fn set_fill_style(&mut self, color: &str) {
        self.state.fill_style = color.to_string();
    }

    fn set_stroke_style(&mut self, color: &str) {
        self.state.stroke_style = color.to_string();
    }

    fn set_line_width(&mut self, width: f32) {
        self.state.line_width = width;
    }

    fn set_line_cap(&mut self, cap: LineCap) {
        self.state.line_cap = cap;
    }

    fn set_line_join(&mut self, join: LineJoin) {
        self.state.line_join = join;
    }
}
