/// Per-bin emphasis applied by the bars renderer.
///
/// Higher bins carry less energy in typical music, so they are boosted more.
/// The table is keyed by bin count and rebuilt only when that count changes.
#[derive(Debug, Default, Clone)]
pub struct FrequencyMultiplierTable {
    bins: usize,
    values: Vec<f32>,
    rebuilds: usize,
}

impl FrequencyMultiplierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the multipliers for `bins` bins, rebuilding the cache if needed.
    pub fn for_bins(&mut self, bins: usize) -> &[f32] {
        if self.bins != bins || self.values.len() != bins {
            self.values.clear();
            self.values
                .extend((0..bins).map(|index| emphasis(index as f32 / bins as f32)));
            self.bins = bins;
            self.rebuilds += 1;
        }
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// How many times the table has been (re)built.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    pub fn release(&mut self) {
        self.bins = 0;
        self.values = Vec::new();
    }
}

/// Emphasis for a bin at normalised position `n` in `[0, 1)`.
pub fn emphasis(n: f32) -> f32 {
    if n <= 0.1 {
        1.5
    } else if n <= 0.3 {
        1.8
    } else if n <= 0.7 {
        2.2
    } else {
        2.5
    }
}
