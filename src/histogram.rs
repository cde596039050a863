//! Piece-time distribution binning.

use serde::Serialize;

pub const MIN_BINS: usize = 3;
pub const MAX_BINS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub width: f64,
    pub bins: Vec<Bin>,
}

impl Histogram {
    /// Bins `samples` into `clamp(round(sqrt(n)), 3, 8)` equal-width buckets.
    /// Returns `None` for an empty sample set.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let bin_count = bin_count(samples.len());
        // identical samples: unit-width bins, everything lands in the first
        let width = if max > min {
            (max - min) / bin_count as f64
        } else {
            1.0
        };

        let mut bins: Vec<Bin> = (0..bin_count)
            .map(|i| Bin {
                lower: min + i as f64 * width,
                count: 0,
            })
            .collect();
        for &sample in samples {
            bins[bin_index(sample, min, width, bin_count)].count += 1;
        }

        Some(Self {
            min,
            max,
            width,
            bins,
        })
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    /// `(label, count)` pairs for a bar chart, labelled by lower edge.
    pub fn labelled(&self) -> Vec<(String, u64)> {
        self.bins
            .iter()
            .map(|b| (format!("{:.0}s", b.lower), b.count as u64))
            .collect()
    }
}

pub fn bin_count(samples: usize) -> usize {
    ((samples as f64).sqrt().round() as usize).clamp(MIN_BINS, MAX_BINS)
}

/// Index of the bin holding `sample`; the maximum falls in the last bin.
pub fn bin_index(sample: f64, min: f64, width: f64, bin_count: usize) -> usize {
    let raw = ((sample - min) / width).floor();
    if raw <= 0.0 {
        0
    } else {
        (raw as usize).min(bin_count - 1)
    }
}
