use std::{
    collections::VecDeque,
    f32::consts::PI,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use tracing::warn;

use crate::{
    audio::{connect_nodes, disconnect_nodes, release_node, SharedGraph},
    config::{DEFAULT_FFT_SIZE, DEFAULT_MAX_DECIBELS, DEFAULT_MIN_DECIBELS, DEFAULT_SENSITIVITY},
    AudioNode, NodeId, Result, VisualiserError,
};

/// Pull-based spectrum and waveform source the visualiser reads every frame.
///
/// Both pull operations fill a caller-owned buffer. Frequency data is one byte
/// per bin (`fft_size / 2` values) scaled over the configured decibel range;
/// time-domain data is one byte per sample (`fft_size` values) with 128 as the
/// zero line.
pub trait Analyser: AudioNode {
    fn fft_size(&self) -> usize;

    fn set_fft_size(&mut self, size: usize);

    /// Blending factor in `[0, 1]` between consecutive spectra.
    fn set_smoothing_time_constant(&mut self, value: f32);

    /// Floor and ceiling are set together so the range is never inverted
    /// between two calls.
    fn set_decibel_range(&mut self, min_decibels: f32, max_decibels: f32);

    fn frequency_bin_count(&self) -> usize {
        self.fft_size() / 2
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) -> Result<()>;

    fn byte_time_domain_data(&mut self, out: &mut [u8]) -> Result<()>;
}

/// Persisted snapshot buffers pulled from an [`Analyser`].
///
/// Buffers are sized from the analyser on every pull and only reallocated
/// when that size changes.
#[derive(Debug, Default)]
pub struct SignalTap {
    frequency: Vec<u8>,
    time_domain: Vec<u8>,
    allocations: usize,
}

impl SignalTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulls `frequency_bin_count` magnitudes.
    pub fn frequency_snapshot(&mut self, analyser: &mut dyn Analyser) -> Result<&[u8]> {
        let len = analyser.frequency_bin_count();
        if self.frequency.len() != len {
            self.frequency = vec![0; len];
            self.allocations += 1;
        }
        analyser.byte_frequency_data(&mut self.frequency)?;
        Ok(&self.frequency)
    }

    /// Pulls `fft_size` time-domain samples.
    pub fn time_domain_snapshot(&mut self, analyser: &mut dyn Analyser) -> Result<&[u8]> {
        let len = analyser.fft_size();
        if self.time_domain.len() != len {
            self.time_domain = vec![0; len];
            self.allocations += 1;
        }
        analyser.byte_time_domain_data(&mut self.time_domain)?;
        Ok(&self.time_domain)
    }

    /// Number of times either buffer has been (re)allocated.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn release(&mut self) {
        self.frequency = Vec::new();
        self.time_domain = Vec::new();
    }
}

/// Analyser node computed in-process with `realfft`.
///
/// Handles are cheap to clone and share the same analysis state, so a host can
/// keep one handle while the visualiser owns another.
#[derive(Clone)]
pub struct SoftwareAnalyser {
    id: NodeId,
    core: Arc<Mutex<AnalyserCore>>,
    graph: SharedGraph,
}

impl SoftwareAnalyser {
    pub(crate) fn new(id: NodeId, core: Arc<Mutex<AnalyserCore>>, graph: SharedGraph) -> Self {
        Self { id, core, graph }
    }

    /// Feeds samples straight into the analyser, bypassing graph routing.
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        self.lock()?.push_samples(samples);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, AnalyserCore>> {
        self.core
            .lock()
            .map_err(|_| VisualiserError::msg("analyser state has been poisoned"))
    }

    fn update(&self, what: &'static str, apply: impl FnOnce(&mut AnalyserCore)) {
        match self.lock() {
            Ok(mut core) => apply(&mut *core),
            Err(err) => warn!(%err, what, "analyser update dropped"),
        }
    }
}

impl AudioNode for SoftwareAnalyser {
    fn id(&self) -> NodeId {
        self.id
    }

    fn connect(&mut self, destination: NodeId) -> Result<()> {
        connect_nodes(&self.graph, self.id, destination)
    }

    fn disconnect(&mut self, destination: NodeId) -> Result<()> {
        disconnect_nodes(&self.graph, self.id, destination)
    }

    fn release(&mut self) -> Result<()> {
        release_node(&self.graph, self.id)
    }
}

impl Analyser for SoftwareAnalyser {
    fn fft_size(&self) -> usize {
        self.lock().map(|core| core.fft_size).unwrap_or(DEFAULT_FFT_SIZE)
    }

    fn set_fft_size(&mut self, size: usize) {
        self.update("fft size", |core| core.set_fft_size(size));
    }

    fn set_smoothing_time_constant(&mut self, value: f32) {
        self.update("smoothing", |core| core.smoothing = value.clamp(0.0, 1.0));
    }

    fn set_decibel_range(&mut self, min_decibels: f32, max_decibels: f32) {
        self.update("decibel range", |core| {
            if min_decibels < max_decibels {
                core.min_decibels = min_decibels;
                core.max_decibels = max_decibels;
            }
        });
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) -> Result<()> {
        self.lock()?.byte_frequency_data(out)
    }

    fn byte_time_domain_data(&mut self, out: &mut [u8]) -> Result<()> {
        self.lock()?.byte_time_domain_data(out)
    }
}

impl fmt::Debug for SoftwareAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareAnalyser")
            .field("id", &self.id)
            .finish()
    }
}

/// Shared analysis state behind every [`SoftwareAnalyser`] handle.
pub(crate) struct AnalyserCore {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    history: VecDeque<f32>,
    smoothed: Vec<f32>,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl AnalyserCore {
    pub(crate) fn new() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SENSITIVITY,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
            history: VecDeque::with_capacity(DEFAULT_FFT_SIZE),
            smoothed: vec![0.0; DEFAULT_FFT_SIZE / 2],
            fft_planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    fn set_fft_size(&mut self, size: usize) {
        if size < 2 || size == self.fft_size {
            return;
        }
        self.fft_size = size;
        self.smoothed = vec![0.0; size / 2];
        self.trim_history();
    }

    pub(crate) fn push_samples(&mut self, samples: &[f32]) {
        self.history.extend(samples.iter().copied());
        self.trim_history();
    }

    fn trim_history(&mut self) {
        if self.history.len() > self.fft_size {
            let overflow = self.history.len() - self.fft_size;
            self.history.drain(0..overflow);
        }
    }

    /// Most recent `fft_size` samples, oldest first. Missing leading samples
    /// read as silence.
    fn window_sample(&self, index: usize) -> f32 {
        let missing = self.fft_size - self.history.len();
        if index < missing {
            0.0
        } else {
            self.history[index - missing]
        }
    }

    fn byte_time_domain_data(&self, out: &mut [u8]) -> Result<()> {
        if out.len() != self.fft_size {
            return Err(VisualiserError::SnapshotLength {
                expected: self.fft_size,
                actual: out.len(),
            });
        }

        for (index, slot) in out.iter_mut().enumerate() {
            let scaled = 128.0 * (1.0 + self.window_sample(index));
            *slot = scaled.floor().clamp(0.0, 255.0) as u8;
        }
        Ok(())
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) -> Result<()> {
        let bins = self.fft_size / 2;
        if out.len() != bins {
            return Err(VisualiserError::SnapshotLength {
                expected: bins,
                actual: out.len(),
            });
        }

        let size = self.fft_size;
        let mut fft = self.take_fft(size);
        for (index, slot) in fft.input.iter_mut().enumerate() {
            *slot = self.window_sample(index) * blackman_value(index, size);
        }

        let processed = fft
            .plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch);
        if let Err(err) = processed {
            self.fft = Some(fft);
            return Err(err.into());
        }

        let scale = 1.0 / size as f32;
        let tau = self.smoothing;
        let range = self.max_decibels - self.min_decibels;
        for (bin, slot) in out.iter_mut().enumerate() {
            let magnitude = fft.spectrum[bin].norm() * scale;
            let smoothed = tau * self.smoothed[bin] + (1.0 - tau) * magnitude;
            self.smoothed[bin] = if smoothed.is_finite() { smoothed } else { 0.0 };

            let decibels = 20.0 * self.smoothed[bin].log10();
            let scaled = 255.0 / range * (decibels - self.min_decibels);
            // log10(0) is -inf, which lands here as silence.
            *slot = if scaled.is_finite() {
                scaled.floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }

        self.fft = Some(fft);
        Ok(())
    }

    /// Takes the cached FFT plan and buffers, rebuilding them when the size
    /// changed since the last pass.
    fn take_fft(&mut self, size: usize) -> FftResources {
        match self.fft.take() {
            Some(fft) if fft.size == size => fft,
            _ => {
                let plan = self.fft_planner.plan_fft_forward(size);
                let scratch = plan.make_scratch_vec();
                let spectrum = plan.make_output_vec();
                let input = plan.make_input_vec();
                FftResources {
                    size,
                    plan,
                    scratch,
                    spectrum,
                    input,
                }
            }
        }
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let phase = 2.0 * PI * index as f32 / len as f32;
    a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
}
