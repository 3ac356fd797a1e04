use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::Component,
    render::{DrawRect, FrameStats, RenderGraph, Surface},
    timeline::{AnimationState, FrameHandle, FrameScheduler, ManualScheduler},
    Analyser, AudioNode, ConfigOptions, NodeId, PlaybackContext, Result, SourceNode,
    VisualizationConfig, VisualizationMode, VisualiserError,
};

/// Full parameter snapshot returned by [`Visualiser::configuration`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSnapshot {
    #[serde(flatten)]
    pub config: VisualizationConfig,
    pub width: f32,
    pub height: f32,
    pub running: bool,
}

/// Audio graph connections owned by a live visualiser.
struct Wiring {
    /// The raw source, kept only when an analyser was derived for it.
    source: Option<Box<dyn AudioNode>>,
    analyser: Box<dyn Analyser>,
    destination: NodeId,
}

impl Wiring {
    fn connect(
        source: SourceNode,
        playback: &mut dyn PlaybackContext,
        destination: NodeId,
    ) -> Result<Self> {
        match source {
            SourceNode::Analyser(mut analyser) => {
                analyser.connect(destination)?;
                Ok(Self {
                    source: None,
                    analyser,
                    destination,
                })
            }
            SourceNode::Audio(mut node) => {
                let mut analyser = playback.create_analyser()?;
                if let Err(err) = node.connect(analyser.id()) {
                    release_quietly(analyser.as_mut());
                    return Err(err);
                }
                if let Err(err) = node.connect(destination) {
                    if let Err(undo) = node.disconnect(analyser.id()) {
                        warn!(%undo, "could not unpatch source after failed wiring");
                    }
                    release_quietly(analyser.as_mut());
                    return Err(err);
                }
                Ok(Self {
                    source: Some(node),
                    analyser,
                    destination,
                })
            }
        }
    }
}

fn release_quietly(analyser: &mut dyn Analyser) {
    if let Err(err) = analyser.release() {
        warn!(%err, analyser = %analyser.id(), "could not release analyser");
    }
}

/// Real-time spectrum / waveform visualiser.
///
/// Lifecycle errors (missing host capabilities, double start, starting after
/// [`Visualiser::destroy`]) are returned to the caller. Everything on the
/// frame path and every setter is fail-soft: problems are logged through
/// `tracing`, remembered in [`Visualiser::last_fault`], and resolved to a
/// default value or a full stop.
pub struct Visualiser<S: Surface, F: FrameScheduler> {
    surface: S,
    scheduler: F,
    config: VisualizationConfig,
    animation: AnimationState,
    render: RenderGraph,
    wiring: Option<Wiring>,
    destroyed: bool,
    last_fault: Option<String>,
    frames_painted: u64,
}

impl<S: Surface, F: FrameScheduler> Visualiser<S, F> {
    /// Validates the host collaborators and wires `source` into an analyser
    /// and into the playback destination, so audio keeps playing whether or
    /// not anything is drawn.
    ///
    /// `playback` is only borrowed while wiring.
    pub fn new(
        source: SourceNode,
        surface: S,
        playback: &mut dyn PlaybackContext,
        scheduler: F,
        options: &ConfigOptions,
    ) -> Result<Self> {
        if !source.is_connectable() {
            return Err(VisualiserError::missing(Component::Source, "connect"));
        }
        if !surface.supports_clear_rect() {
            return Err(VisualiserError::missing(Component::Surface, "clear_rect"));
        }
        let destination = playback
            .destination()
            .ok_or_else(|| VisualiserError::missing(Component::PlaybackContext, "destination"))?;

        let config = VisualizationConfig::from_options(options);
        let wiring = Wiring::connect(source, playback, destination)?;
        debug!(
            analyser = %wiring.analyser.id(),
            %destination,
            derived = wiring.source.is_some(),
            "visualiser wired"
        );

        let mut visualiser = Self {
            surface,
            scheduler,
            animation: AnimationState::new(config.target_frame_ms()),
            config,
            render: RenderGraph::new(),
            wiring: Some(wiring),
            destroyed: false,
            last_fault: None,
            frames_painted: 0,
        };
        visualiser.push_analyser_settings();
        Ok(visualiser)
    }

    /// Starts the render loop over `area`.
    pub fn start(&mut self, area: DrawRect) -> Result<()> {
        if self.destroyed {
            return Err(VisualiserError::Destroyed);
        }
        self.animation.begin(area, self.scheduler.now_ms())?;
        let handle = self.scheduler.request_frame();
        self.animation.set_pending(handle);
        debug!(?area, mode = %self.config.mode(), "visualiser started");
        Ok(())
    }

    /// Starts the render loop over the whole surface.
    pub fn start_full_surface(&mut self) -> Result<()> {
        self.start(DrawRect::full(&self.surface))
    }

    /// Stops the loop, cancels the pending frame and clears the surface.
    /// Does nothing when already idle.
    pub fn stop(&mut self) {
        if !self.animation.halt() {
            return;
        }
        if let Some(handle) = self.animation.take_pending() {
            self.scheduler.cancel(handle);
        }
        self.surface.clear_rect(DrawRect::full(&self.surface));
        debug!("visualiser stopped");
    }

    /// Frame callback for a handle previously issued by the scheduler.
    ///
    /// Returns the stats of the painted frame, or `None` if the callback was
    /// stale, throttled, or the render faulted.
    pub fn on_frame(&mut self, handle: FrameHandle, timestamp_ms: f64) -> Option<FrameStats> {
        if !self.animation.accept(handle) {
            return None;
        }

        let next = self.scheduler.request_frame();
        self.animation.set_pending(next);

        if !self.animation.should_paint(timestamp_ms) {
            return None;
        }

        match self.paint() {
            Ok(stats) => Some(stats),
            Err(err) => {
                self.report(&err);
                warn!("render fault, stopping visualiser");
                self.stop();
                None
            }
        }
    }

    fn paint(&mut self) -> Result<FrameStats> {
        let wiring = self.wiring.as_mut().ok_or(VisualiserError::Destroyed)?;
        self.surface.clear_rect(DrawRect::full(&self.surface));
        let stats = self.render.draw(
            &mut self.surface,
            wiring.analyser.as_mut(),
            self.animation.area(),
            &self.config,
        )?;
        self.frames_painted += 1;
        Ok(stats)
    }

    /// Switches between bars and oscilloscope by name. Unknown names select
    /// bars.
    pub fn set_type(&mut self, mode: &str) {
        self.set_mode(VisualizationMode::parse_or_default(mode));
    }

    /// A running loop is restarted over the full surface, even if it was
    /// started over a smaller rectangle.
    pub fn set_mode(&mut self, mode: VisualizationMode) {
        let previous = self.config.mode();
        if previous == mode {
            return;
        }
        self.config.set_mode(mode);
        self.apply_mode_change(previous);
    }

    fn apply_mode_change(&mut self, previous: VisualizationMode) {
        if previous == VisualizationMode::Oscilloscope {
            self.surface.begin_path();
        }
        if self.animation.is_running() {
            self.stop();
            if let Err(err) = self.start_full_surface() {
                self.report(&err);
            }
        }
    }

    pub fn set_frame_rate(&mut self, max_fps: f32) {
        self.config.set_max_fps(max_fps);
        self.animation.set_target_frame_ms(self.config.target_frame_ms());
    }

    /// Resizes the drawing surface. Negative sizes clamp to zero; non-finite
    /// sizes are ignored.
    pub fn set_size(&mut self, width: f32, height: f32) {
        if !width.is_finite() || !height.is_finite() {
            warn!(width, height, "ignoring non-finite surface size");
            return;
        }
        self.surface.set_size(width.max(0.0), height.max(0.0));
    }

    pub fn set_thickness(&mut self, thickness: f32) {
        self.config.set_thickness(thickness);
    }

    pub fn set_color(&mut self, color: &str) {
        self.config.set_color(color);
    }

    pub fn set_multiplier(&mut self, multiplier: f32) {
        self.config.set_multiplier(multiplier);
    }

    pub fn set_offset(&mut self, x_offset: f32, y_offset: f32) {
        self.config.set_x_offset(x_offset);
        self.config.set_y_offset(y_offset);
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        let value = self.config.set_sensitivity(sensitivity);
        if let Some(wiring) = self.wiring.as_mut() {
            wiring.analyser.set_smoothing_time_constant(value);
        }
    }

    pub fn set_min_decibels(&mut self, min_decibels: f32) {
        self.config.set_min_decibels(min_decibels);
        self.push_decibel_range();
    }

    pub fn set_max_decibels(&mut self, max_decibels: f32) {
        self.config.set_max_decibels(max_decibels);
        self.push_decibel_range();
    }

    pub fn set_fft_size(&mut self, fft_size: usize) {
        let value = self.config.set_fft_size(fft_size);
        if let Some(wiring) = self.wiring.as_mut() {
            wiring.analyser.set_fft_size(value);
        }
    }

    /// Stops a running loop, or starts an idle one over the full surface.
    pub fn toggle(&mut self) {
        if self.animation.is_running() {
            self.stop();
        } else if let Err(err) = self.start_full_surface() {
            self.report(&err);
        }
    }

    /// Restores every parameter to its default and pushes the analyser
    /// settings again.
    pub fn reset_to_defaults(&mut self) {
        let previous = self.config.mode();
        self.config = VisualizationConfig::default();
        self.animation.set_target_frame_ms(self.config.target_frame_ms());
        self.push_analyser_settings();
        if previous != self.config.mode() {
            self.apply_mode_change(previous);
        }
    }

    pub fn configuration(&self) -> ConfigurationSnapshot {
        ConfigurationSnapshot {
            config: self.config.clone(),
            width: self.surface.width(),
            height: self.surface.height(),
            running: self.animation.is_running(),
        }
    }

    /// Stops the loop, disconnects the source from the analyser and releases
    /// buffers. A derived analyser is handed back to the host. The source
    /// stays connected to the playback destination. Calling this again does
    /// nothing.
    pub fn destroy(&mut self) {
        self.stop();
        if let Some(mut wiring) = self.wiring.take() {
            if let Some(source) = wiring.source.as_mut() {
                if let Err(err) = source.disconnect(wiring.analyser.id()) {
                    self.report(&err);
                }
                if let Err(err) = wiring.analyser.release() {
                    self.report(&err);
                }
            }
            debug!(destination = %wiring.destination, "visualiser destroyed");
        }
        self.render.release();
        self.destroyed = true;
    }

    pub fn is_running(&self) -> bool {
        self.animation.is_running()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn animation(&self) -> &AnimationState {
        &self.animation
    }

    pub fn render_graph(&self) -> &RenderGraph {
        &self.render
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn scheduler(&self) -> &F {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut F {
        &mut self.scheduler
    }

    /// Most recent fail-soft diagnostic, if any.
    pub fn last_fault(&self) -> Option<&str> {
        self.last_fault.as_deref()
    }

    pub fn frames_painted(&self) -> u64 {
        self.frames_painted
    }

    fn push_analyser_settings(&mut self) {
        if let Some(wiring) = self.wiring.as_mut() {
            wiring.analyser.set_fft_size(self.config.fft_size());
            wiring
                .analyser
                .set_smoothing_time_constant(self.config.sensitivity());
        }
        self.push_decibel_range();
    }

    fn push_decibel_range(&mut self) {
        if let Some(wiring) = self.wiring.as_mut() {
            wiring
                .analyser
                .set_decibel_range(self.config.min_decibels(), self.config.max_decibels());
        }
    }

    fn report(&mut self, err: &VisualiserError) {
        warn!(%err, "visualiser fault");
        self.last_fault = Some(err.to_string());
    }
}

impl<S: Surface> Visualiser<S, ManualScheduler> {
    /// Advances the manual clock and delivers every due frame callback.
    pub fn advance(&mut self, delta_ms: f64) -> Vec<FrameStats> {
        let due = self.scheduler.advance(delta_ms);
        let now = self.scheduler.now_ms();
        due.into_iter()
            .filter_map(|handle| self.on_frame(handle, now))
            .collect()
    }
}

impl<S: Surface, F: FrameScheduler> fmt::Debug for Visualiser<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Visualiser")
            .field("config", &self.config)
            .field("animation", &self.animation)
            .field("wired", &self.wiring.is_some())
            .field("destroyed", &self.destroyed)
            .field("frames_painted", &self.frames_painted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::render::{DrawCommand, RecordingSurface};

    type Calls = Rc<RefCell<Vec<String>>>;

    struct FakeNode {
        id: NodeId,
        connectable: bool,
        rejects: Option<NodeId>,
        calls: Calls,
    }

    impl AudioNode for FakeNode {
        fn id(&self) -> NodeId {
            self.id
        }

        fn connect(&mut self, destination: NodeId) -> Result<()> {
            if self.rejects == Some(destination) {
                return Err(VisualiserError::msg("route refused"));
            }
            self.calls
                .borrow_mut()
                .push(format!("connect {} {}", self.id.0, destination.0));
            Ok(())
        }

        fn disconnect(&mut self, destination: NodeId) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("disconnect {} {}", self.id.0, destination.0));
            Ok(())
        }

        fn is_connectable(&self) -> bool {
            self.connectable
        }
    }

    struct Probe {
        fft_size: usize,
        smoothing: f32,
        range: (f32, f32),
        level: u8,
        fail: bool,
    }

    impl Default for Probe {
        fn default() -> Self {
            Self {
                fft_size: 2048,
                smoothing: 0.0,
                range: (0.0, 0.0),
                level: 200,
                fail: false,
            }
        }
    }

    struct FakeAnalyser {
        id: NodeId,
        probe: Rc<RefCell<Probe>>,
        calls: Calls,
    }

    impl AudioNode for FakeAnalyser {
        fn id(&self) -> NodeId {
            self.id
        }

        fn connect(&mut self, destination: NodeId) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("connect {} {}", self.id.0, destination.0));
            Ok(())
        }

        fn disconnect(&mut self, destination: NodeId) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("disconnect {} {}", self.id.0, destination.0));
            Ok(())
        }

        fn release(&mut self) -> Result<()> {
            self.calls.borrow_mut().push(format!("release {}", self.id.0));
            Ok(())
        }
    }

    impl Analyser for FakeAnalyser {
        fn fft_size(&self) -> usize {
            self.probe.borrow().fft_size
        }

        fn set_fft_size(&mut self, size: usize) {
            self.probe.borrow_mut().fft_size = size;
        }

        fn set_smoothing_time_constant(&mut self, value: f32) {
            self.probe.borrow_mut().smoothing = value;
        }

        fn set_decibel_range(&mut self, min_decibels: f32, max_decibels: f32) {
            self.probe.borrow_mut().range = (min_decibels, max_decibels);
        }

        fn byte_frequency_data(&mut self, out: &mut [u8]) -> Result<()> {
            let probe = self.probe.borrow();
            if probe.fail {
                return Err(VisualiserError::msg("analyser unplugged"));
            }
            out.fill(probe.level);
            Ok(())
        }

        fn byte_time_domain_data(&mut self, out: &mut [u8]) -> Result<()> {
            let probe = self.probe.borrow();
            if probe.fail {
                return Err(VisualiserError::msg("analyser unplugged"));
            }
            out.fill(probe.level);
            Ok(())
        }
    }

    struct FakeContext {
        destination: Option<NodeId>,
        created: usize,
        probe: Rc<RefCell<Probe>>,
        calls: Calls,
    }

    impl PlaybackContext for FakeContext {
        fn destination(&self) -> Option<NodeId> {
            self.destination
        }

        fn create_analyser(&mut self) -> Result<Box<dyn Analyser>> {
            self.created += 1;
            Ok(Box::new(FakeAnalyser {
                id: NodeId(10),
                probe: self.probe.clone(),
                calls: self.calls.clone(),
            }))
        }
    }

    type TestVisualiser = Visualiser<RecordingSurface, ManualScheduler>;

    struct Harness {
        visualiser: TestVisualiser,
        probe: Rc<RefCell<Probe>>,
        calls: Calls,
    }

    fn context() -> FakeContext {
        FakeContext {
            destination: Some(NodeId(0)),
            created: 0,
            probe: Rc::new(RefCell::new(Probe::default())),
            calls: Rc::default(),
        }
    }

    fn source(context: &FakeContext, connectable: bool) -> SourceNode {
        SourceNode::Audio(Box::new(FakeNode {
            id: NodeId(1),
            connectable,
            rejects: None,
            calls: context.calls.clone(),
        }))
    }

    fn harness(options: ConfigOptions) -> Harness {
        let mut context = context();
        let source = source(&context, true);
        let visualiser = Visualiser::new(
            source,
            RecordingSurface::new(200.0, 100.0),
            &mut context,
            ManualScheduler::new(),
            &options,
        )
        .unwrap();
        Harness {
            visualiser,
            probe: context.probe,
            calls: context.calls,
        }
    }

    #[test]
    fn rejects_missing_capabilities_in_order() {
        let mut ctx = context();
        let err = TestVisualiser::new(
            source(&ctx, false),
            RecordingSurface::without_clear_rect(10.0, 10.0),
            &mut ctx,
            ManualScheduler::new(),
            &ConfigOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            VisualiserError::MissingCapability {
                component: Component::Source,
                ..
            }
        ));

        let err = TestVisualiser::new(
            source(&ctx, true),
            RecordingSurface::without_clear_rect(10.0, 10.0),
            &mut ctx,
            ManualScheduler::new(),
            &ConfigOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            VisualiserError::MissingCapability {
                component: Component::Surface,
                capability: "clear_rect"
            }
        ));

        ctx.destination = None;
        let err = TestVisualiser::new(
            source(&ctx, true),
            RecordingSurface::new(10.0, 10.0),
            &mut ctx,
            ManualScheduler::new(),
            &ConfigOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "playback context is missing the `destination` capability"
        );
        assert_eq!(ctx.created, 0);
    }

    #[test]
    fn wires_source_through_derived_analyser_and_to_destination() {
        let harness = harness(ConfigOptions {
            fft_size: Some(2048.0),
            min_decibels: Some(-62.0),
            sensitivity: Some(0.5),
            ..Default::default()
        });

        assert_eq!(
            *harness.calls.borrow(),
            vec!["connect 1 10".to_string(), "connect 1 0".to_string()]
        );
        let probe = harness.probe.borrow();
        assert_eq!(probe.fft_size, 2048);
        assert_eq!(probe.smoothing, 0.5);
        assert_eq!(probe.range, (-62.0, -30.0));
    }

    #[test]
    fn failed_destination_route_unpatches_the_analyser() {
        let mut ctx = context();
        let node = FakeNode {
            id: NodeId(1),
            connectable: true,
            rejects: Some(NodeId(0)),
            calls: ctx.calls.clone(),
        };
        let err = TestVisualiser::new(
            SourceNode::Audio(Box::new(node)),
            RecordingSurface::new(10.0, 10.0),
            &mut ctx,
            ManualScheduler::new(),
            &ConfigOptions::default(),
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "route refused");
        assert_eq!(
            *ctx.calls.borrow(),
            vec![
                "connect 1 10".to_string(),
                "disconnect 1 10".to_string(),
                "release 10".to_string(),
            ]
        );
    }

    #[test]
    fn analyser_sources_are_used_directly() {
        let mut ctx = context();
        let analyser = FakeAnalyser {
            id: NodeId(7),
            probe: ctx.probe.clone(),
            calls: ctx.calls.clone(),
        };
        let mut visualiser = TestVisualiser::new(
            SourceNode::Analyser(Box::new(analyser)),
            RecordingSurface::new(10.0, 10.0),
            &mut ctx,
            ManualScheduler::new(),
            &ConfigOptions::default(),
        )
        .unwrap();

        assert_eq!(ctx.created, 0);
        assert_eq!(*ctx.calls.borrow(), vec!["connect 7 0".to_string()]);

        visualiser.destroy();
        assert_eq!(ctx.calls.borrow().len(), 1);
    }

    #[test]
    fn double_start_is_an_error() {
        let mut harness = harness(ConfigOptions::default());
        harness.visualiser.start_full_surface().unwrap();
        let err = harness.visualiser.start_full_surface().unwrap_err();
        assert!(matches!(err, VisualiserError::AlreadyRunning));
        assert!(harness.visualiser.is_running());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut harness = harness(ConfigOptions::default());
        let visualiser = &mut harness.visualiser;

        visualiser.stop();
        assert_eq!(visualiser.surface().clear_count(), 0);

        visualiser.start_full_surface().unwrap();
        visualiser.stop();
        visualiser.stop();
        assert_eq!(visualiser.surface().clear_count(), 1);
        assert_eq!(visualiser.scheduler().cancelled(), 1);
        assert!(visualiser.scheduler().pending().is_empty());
    }

    #[test]
    fn throttles_paints_to_max_fps() {
        let mut harness = harness(ConfigOptions {
            max_fps: Some(50.0),
            ..Default::default()
        });
        let visualiser = &mut harness.visualiser;
        visualiser.start_full_surface().unwrap();

        let painted: usize = (0..10).map(|_| visualiser.advance(10.0).len()).sum();

        // 100 ms at a 20 ms cap.
        assert_eq!(painted, 5);
        assert_eq!(visualiser.surface().fill_count(), 5);
        assert_eq!(visualiser.frames_painted(), 5);

        visualiser.set_frame_rate(100.0);
        let painted: usize = (0..10).map(|_| visualiser.advance(10.0).len()).sum();
        assert_eq!(painted, 10);
    }

    #[test]
    fn render_fault_stops_loop_but_allows_restart() {
        let mut harness = harness(ConfigOptions::default());
        harness.visualiser.start_full_surface().unwrap();
        harness.probe.borrow_mut().fail = true;

        assert!(harness.visualiser.advance(20.0).is_empty());
        assert!(!harness.visualiser.is_running());
        assert!(harness.visualiser.scheduler().pending().is_empty());
        assert!(harness
            .visualiser
            .last_fault()
            .unwrap()
            .contains("analyser unplugged"));
        assert!(matches!(
            harness.visualiser.surface().commands().last(),
            Some(DrawCommand::ClearRect { .. })
        ));

        harness.probe.borrow_mut().fail = false;
        harness.visualiser.start_full_surface().unwrap();
        assert_eq!(harness.visualiser.advance(20.0).len(), 1);
    }

    #[test]
    fn mode_switch_restarts_over_full_surface() {
        let mut harness = harness(ConfigOptions::default());
        let visualiser = &mut harness.visualiser;
        visualiser
            .start(DrawRect::new(10.0, 10.0, 50.0, 40.0))
            .unwrap();

        visualiser.set_type("oscilloscope");

        assert!(visualiser.is_running());
        assert_eq!(visualiser.animation().area(), DrawRect::new(0.0, 0.0, 200.0, 100.0));
        assert_eq!(visualiser.scheduler().cancelled(), 1);
        assert_eq!(visualiser.scheduler().pending().len(), 1);

        let stats = visualiser.advance(20.0);
        assert_eq!(stats[0].mode, VisualizationMode::Oscilloscope);
        assert!(visualiser.surface().open_path_len() > 0);

        visualiser.set_type("bars");
        assert_eq!(visualiser.surface().open_path_len(), 0);
        assert_eq!(visualiser.configuration().config.mode(), VisualizationMode::Bars);
    }

    #[test]
    fn leaving_oscilloscope_resets_path_while_idle() {
        let mut harness = harness(ConfigOptions {
            mode: Some("oscilloscope".to_string()),
            ..Default::default()
        });
        let visualiser = &mut harness.visualiser;
        visualiser.surface_mut().move_to(0.0, 0.0);

        visualiser.set_type("nonsense");

        assert_eq!(visualiser.surface().open_path_len(), 0);
        assert!(!visualiser.is_running());
        assert_eq!(visualiser.configuration().config.mode(), VisualizationMode::Bars);
    }

    #[test]
    fn stale_callbacks_are_ignored() {
        let mut harness = harness(ConfigOptions::default());
        let visualiser = &mut harness.visualiser;
        visualiser.start_full_surface().unwrap();
        let stale = visualiser.animation().pending().unwrap();
        visualiser.stop();

        assert!(visualiser.on_frame(stale, 1_000.0).is_none());
        assert_eq!(visualiser.surface().fill_count(), 0);
        assert_eq!(visualiser.scheduler().requested(), 1);
    }

    #[test]
    fn setters_after_destroy_never_fail() {
        let mut harness = harness(ConfigOptions::default());
        let visualiser = &mut harness.visualiser;
        visualiser.start_full_surface().unwrap();
        visualiser.advance(20.0);

        visualiser.destroy();
        visualiser.destroy();

        assert!(!visualiser.is_running());
        assert!(visualiser.is_destroyed());
        assert_eq!(
            harness
                .calls
                .borrow()
                .iter()
                .filter(|call| call.starts_with("disconnect"))
                .count(),
            1
        );
        assert!(harness.calls.borrow().contains(&"disconnect 1 10".to_string()));
        assert!(harness.calls.borrow().contains(&"release 10".to_string()));

        let visualiser = &mut harness.visualiser;
        visualiser.set_type("oscilloscope");
        visualiser.set_frame_rate(f32::NAN);
        visualiser.set_size(320.0, 240.0);
        visualiser.set_thickness(0.0);
        visualiser.set_color("");
        visualiser.set_sensitivity(4.0);
        visualiser.set_multiplier(-1.0);
        visualiser.set_min_decibels(-80.0);
        visualiser.set_max_decibels(-10.0);
        visualiser.set_fft_size(17);
        visualiser.reset_to_defaults();
        visualiser.toggle();

        assert!(!visualiser.is_running());
        assert!(visualiser.last_fault().unwrap().contains("destroyed"));
        assert!(matches!(
            visualiser.start_full_surface(),
            Err(VisualiserError::Destroyed)
        ));
        assert!(visualiser.render_graph().multipliers().is_empty());
    }

    #[test]
    fn toggle_flips_run_state() {
        let mut harness = harness(ConfigOptions::default());
        let visualiser = &mut harness.visualiser;

        visualiser.toggle();
        assert!(visualiser.is_running());
        visualiser.toggle();
        assert!(!visualiser.is_running());
    }

    #[test]
    fn setters_forward_to_analyser() {
        let mut harness = harness(ConfigOptions::default());
        harness.visualiser.set_sensitivity(0.25);
        harness.visualiser.set_fft_size(512);
        harness.visualiser.set_max_decibels(-20.0);
        harness.visualiser.set_min_decibels(-70.0);

        let probe = harness.probe.borrow();
        assert_eq!(probe.smoothing, 0.25);
        assert_eq!(probe.fft_size, 512);
        assert_eq!(probe.range, (-70.0, -20.0));
    }

    #[test]
    fn reset_restores_defaults_and_snapshot_reports_surface() {
        let mut harness = harness(ConfigOptions {
            color: Some("#123456".to_string()),
            multiplier: Some(3.0),
            ..Default::default()
        });
        let visualiser = &mut harness.visualiser;
        visualiser.set_size(640.0, 480.0);

        visualiser.reset_to_defaults();

        let snapshot = visualiser.configuration();
        assert_eq!(snapshot.config, VisualizationConfig::default());
        assert_eq!((snapshot.width, snapshot.height), (640.0, 480.0));
        assert!(!snapshot.running);
        assert_eq!(harness.probe.borrow().fft_size, 1024);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["fftSize"], 1024);
        assert_eq!(json["mode"], "bars");
        assert_eq!(json["width"], 640.0);
    }
}
